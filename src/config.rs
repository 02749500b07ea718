//! 程序配置
//!
//! 配置来自 `config.json`：文件不存在时写出默认配置并直接使用；
//! 文件存在但缺少某些键时，逐键应用默认值（由 serde 的 default 完成，
//! 加载后不再做分散的兜底查找）。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// 程序配置
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// 外部 API 配置
    #[serde(default)]
    pub api: ApiConfig,
    /// 请求与重试配置
    #[serde(default)]
    pub request: RequestConfig,
    /// 文件路径配置
    #[serde(default)]
    pub paths: PathsConfig,
    /// 签到间隔配置
    #[serde(default)]
    pub sign: SignConfig,
}

/// 外部 API 配置
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// 百度 OCR 配置
    #[serde(default)]
    pub baidu_ocr: BaiduOcrConfig,
}

/// 百度 OCR 凭据
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BaiduOcrConfig {
    pub api_key: String,
    pub secret_key: String,
}

impl Default for BaiduOcrConfig {
    fn default() -> Self {
        Self {
            api_key: "你的百度OCR API Key".to_string(),
            secret_key: "你的百度OCR Secret Key".to_string(),
        }
    }
}

/// 请求与重试配置
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestConfig {
    /// 单次请求超时（秒）
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// 每个步骤的最大尝试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 重试基础间隔（秒）
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    /// 单次登录过程中验证码识别的最大尝试次数
    #[serde(default = "default_captcha_max_attempts")]
    pub captcha_max_attempts: u32,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            captcha_max_attempts: default_captcha_max_attempts(),
        }
    }
}

/// 文件路径配置
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_accounts_file")]
    pub accounts_file: String,
    #[serde(default = "default_cookies_dir")]
    pub cookies_dir: String,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
    #[serde(default = "default_history_file")]
    pub history_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            accounts_file: default_accounts_file(),
            cookies_dir: default_cookies_dir(),
            logs_dir: default_logs_dir(),
            history_file: default_history_file(),
        }
    }
}

/// 签到间隔配置
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignConfig {
    /// 账号之间的随机延迟范围（秒）
    #[serde(default = "default_account_delay")]
    pub account_delay: DelayRange,
    /// 账号出错后的随机延迟范围（秒）
    #[serde(default = "default_error_delay")]
    pub error_delay: DelayRange,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            account_delay: default_account_delay(),
            error_delay: default_error_delay(),
        }
    }
}

/// 延迟范围（秒）
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: f64,
    pub max: f64,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    3
}

fn default_captcha_max_attempts() -> u32 {
    3
}

fn default_accounts_file() -> String {
    "accounts.json".to_string()
}

fn default_cookies_dir() -> String {
    "cookies".to_string()
}

fn default_logs_dir() -> String {
    "logs".to_string()
}

fn default_history_file() -> String {
    "sign_history.json".to_string()
}

fn default_account_delay() -> DelayRange {
    DelayRange { min: 5.0, max: 10.0 }
}

fn default_error_delay() -> DelayRange {
    DelayRange { min: 10.0, max: 15.0 }
}

impl Config {
    /// 加载配置文件
    ///
    /// 文件不存在时写出默认配置文件并返回默认配置；
    /// 解析失败时警告并回退到默认配置。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self::default();
            if let Err(e) = config.save(path) {
                warn!("写出默认配置文件失败: {}", e);
            }
            return config;
        }

        match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    warn!("解析配置文件失败: {}，将使用默认配置", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("读取配置文件失败: {}，将使用默认配置", e);
                Self::default()
            }
        }
    }

    /// 保存配置到文件
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.request.timeout, 30);
        assert_eq!(config.request.max_retries, 3);
        assert_eq!(config.request.retry_delay, 3);
        assert_eq!(config.request.captcha_max_attempts, 3);
        assert_eq!(config.paths.accounts_file, "accounts.json");
        assert_eq!(config.paths.history_file, "sign_history.json");
        assert_eq!(config.sign.account_delay.min, 5.0);
        assert_eq!(config.sign.error_delay.max, 15.0);
    }

    #[test]
    fn test_missing_keys_use_per_key_defaults() {
        // 只给出部分键，其余逐键取默认值
        let text = r#"{
            "request": { "timeout": 10 },
            "paths": { "cookies_dir": "my_cookies" }
        }"#;
        let config: Config = serde_json::from_str(text).unwrap();
        assert_eq!(config.request.timeout, 10);
        assert_eq!(config.request.max_retries, 3);
        assert_eq!(config.paths.cookies_dir, "my_cookies");
        assert_eq!(config.paths.logs_dir, "logs");
        assert_eq!(config.sign.account_delay.max, 10.0);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config::load(&path);
        assert_eq!(config.request.timeout, 30);
        assert!(path.exists());

        // 再次加载时读回同一份配置
        let reloaded = Config::load(&path);
        assert_eq!(reloaded.request.max_retries, config.request.max_retries);
    }

    #[test]
    fn test_load_malformed_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json at all").unwrap();

        let config = Config::load(&path);
        assert_eq!(config.request.timeout, 30);
    }
}
