//! 业务能力层

pub mod history_store;
pub mod page;
pub mod session_store;

pub use history_store::{HistoryStore, JsonHistoryStore, MemoryHistoryStore};
pub use session_store::{FileSessionStore, SessionStore};
