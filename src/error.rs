//! 应用程序错误类型
//!
//! 把签到流程中捕获到的每一种情况显式分类：
//! - 可重试的瞬时网络错误（超时 / 连接错误）
//! - 不可重试（密码错误、验证码次数耗尽）
//! - 页面解析缺失（按步骤决定重试或降级）
//! - 其余未预料的错误（立即中止当前步骤）
//!
//! reqwest 错误在转换时就完成分类，各步骤根据分类分支，
//! 而不是根据错误文本匹配。

use thiserror::Error;

/// 签到流程错误
#[derive(Debug, Error)]
pub enum SignError {
    /// 请求超时（可重试）
    #[error("请求超时")]
    Timeout,

    /// 连接错误（可重试）
    #[error("连接错误: {0}")]
    Connection(String),

    /// 其他 HTTP 层错误（不重试）
    #[error("网络请求失败: {0}")]
    Http(String),

    /// 密码错误，不重试
    #[error("登录失败：密码错误")]
    InvalidCredentials,

    /// 验证码识别已达到最大尝试次数
    #[error("验证码识别已达到最大尝试次数 {attempts}")]
    CaptchaExhausted { attempts: u32 },

    /// 页面中找不到预期的元素
    #[error("页面解析失败：找不到{0}")]
    ParseMissing(&'static str),

    /// 文件读写错误
    #[error("文件操作失败: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 解析错误
    #[error("JSON解析失败: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他未预料的错误
    #[error("未预料的错误: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for SignError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SignError::Timeout
        } else if e.is_connect() {
            SignError::Connection(e.to_string())
        } else {
            SignError::Http(e.to_string())
        }
    }
}

impl SignError {
    /// 是否为可重试的瞬时网络错误
    ///
    /// 只有超时和连接错误会触发重试，其余错误一律中止当前步骤。
    pub fn is_retryable(&self) -> bool {
        matches!(self, SignError::Timeout | SignError::Connection(_))
    }

    /// 是否为页面解析缺失（部分步骤对其单独重试）
    pub fn is_parse_missing(&self) -> bool {
        matches!(self, SignError::ParseMissing(_))
    }
}

/// 签到流程结果类型
pub type SignResult<T> = Result<T, SignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_retryable() {
        assert!(SignError::Timeout.is_retryable());
        assert!(SignError::Connection("reset".to_string()).is_retryable());
    }

    #[test]
    fn test_non_transient_errors_not_retryable() {
        assert!(!SignError::Http("500".to_string()).is_retryable());
        assert!(!SignError::InvalidCredentials.is_retryable());
        assert!(!SignError::CaptchaExhausted { attempts: 3 }.is_retryable());
        assert!(!SignError::ParseMissing("签到按钮").is_retryable());
        assert!(!SignError::Unexpected("boom".to_string()).is_retryable());
    }

    #[test]
    fn test_parse_missing_classified() {
        assert!(SignError::ParseMissing("formhash").is_parse_missing());
        assert!(!SignError::InvalidCredentials.is_parse_missing());
    }

    #[test]
    fn test_display_includes_detail() {
        let e = SignError::CaptchaExhausted { attempts: 3 };
        assert!(e.to_string().contains('3'));
        let e = SignError::ParseMissing("登录表单元素");
        assert!(e.to_string().contains("登录表单元素"));
    }
}
