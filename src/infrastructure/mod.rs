//! 基础设施层
//!
//! 持有 HTTP 客户端与会话 Cookie，只向上层暴露论坛访问能力。

pub mod forum_http;

pub use forum_http::{ForumGateway, ForumHttp};
