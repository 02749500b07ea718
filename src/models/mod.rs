//! 数据模型

pub mod account;
pub mod history;

pub use account::{load_accounts, Account};
pub use history::{
    AccountHistory, DailySummary, HistoryDocument, SignRecord, SignStats, SignStatus,
    STAT_UNAVAILABLE,
};
