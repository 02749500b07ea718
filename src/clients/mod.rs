//! 外部 API 客户端

pub mod ocr;

pub use ocr::{CaptchaSolver, OcrClient};
