//! # MT Auto Sign
//!
//! MT论坛多账号自动签到工具
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有 HTTP 客户端与会话 Cookie，只暴露能力
//! - `ForumHttp` - 唯一的网络资源 owner，实现 `ForumGateway`
//!
//! ### ② 业务能力层（Services）
//! - `services/page` - 论坛页面解析（签到状态 / formhash / 统计 / 登录表单）
//! - `services/session_store` - 按账号持久化 Cookie
//! - `services/history_store` - 签到历史与每日汇总的整文件读写
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/sign_flow` - 单账号签到状态机
//!   （登录 → 检测已签 → 签到 → 抓取统计 → 记录）
//! - `workflow/retry` - 各步骤共用的有界重试策略
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch` - 顺序遍历账号、插入随机延迟、写每日汇总
//!
//! 外部能力（验证码 OCR）在 `clients/` 中封装；所有依赖都显式注入，
//! 没有进程级单例。

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{CaptchaSolver, OcrClient};
pub use config::Config;
pub use error::{SignError, SignResult};
pub use infrastructure::{ForumGateway, ForumHttp};
pub use models::{Account, AccountHistory, DailySummary, SignRecord, SignStats, SignStatus};
pub use orchestrator::BatchRunner;
pub use services::{FileSessionStore, HistoryStore, JsonHistoryStore, MemoryHistoryStore, SessionStore};
pub use workflow::{RetryPolicy, SignFlow};
