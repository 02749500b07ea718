//! 流程层

pub mod retry;
pub mod sign_flow;

pub use retry::RetryPolicy;
pub use sign_flow::SignFlow;
