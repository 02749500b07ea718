//! 百度 OCR 客户端 - 验证码识别能力
//!
//! 对上层来说这是一个黑盒能力：图片字节进、识别文本出，失败返回 None。
//! access_token 获取带固定间隔重试；识别请求本身只发一次，不重试。

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::Config;

const TOKEN_URL: &str = "https://aip.baidubce.com/oauth/2.0/token";
const RECOGNIZE_URL: &str = "https://aip.baidubce.com/rest/2.0/ocr/v1/accurate_basic";

/// 验证码识别能力
#[allow(async_fn_in_trait)]
pub trait CaptchaSolver {
    /// 识别验证码图片，失败返回 None
    async fn recognize(&self, image: &[u8]) -> Option<String>;
}

/// 百度 OCR 客户端
pub struct OcrClient {
    client: reqwest::Client,
    api_key: String,
    secret_key: String,
    max_retries: u32,
    retry_delay: std::time::Duration,
}

impl OcrClient {
    /// 从配置创建 OCR 客户端
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request.timeout))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api.baidu_ocr.api_key.clone(),
            secret_key: config.api.baidu_ocr.secret_key.clone(),
            max_retries: config.request.max_retries,
            retry_delay: std::time::Duration::from_secs(config.request.retry_delay),
        })
    }

    /// 获取百度 OCR API 的 access_token
    ///
    /// 固定间隔重试，不加抖动；重试耗尽返回 None。
    async fn get_access_token(&self) -> Option<String> {
        for attempt in 0..self.max_retries {
            match self.request_access_token().await {
                Ok(Some(token)) => return Some(token),
                Ok(None) => {}
                Err(e) if e.is_timeout() => {
                    warn!("获取access_token超时，第{}次尝试", attempt + 1);
                }
                Err(e) => {
                    error!("获取access_token出错: {}", e);
                }
            }

            if attempt < self.max_retries - 1 {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        error!("获取access_token失败，已达到最大重试次数");
        None
    }

    async fn request_access_token(&self) -> Result<Option<String>, reqwest::Error> {
        let response = self
            .client
            .post(TOKEN_URL)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.api_key.as_str()),
                ("client_secret", self.secret_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            error!("获取access_token失败: {}", response.status());
            return Ok(None);
        }

        let body: Value = response.json().await?;
        match body.get("access_token").and_then(|v| v.as_str()) {
            Some(token) => Ok(Some(token.to_string())),
            None => {
                error!("获取access_token失败: {}", body);
                Ok(None)
            }
        }
    }

    async fn request_recognition(&self, token: &str, image: &[u8]) -> Option<String> {
        // 图片先 base64 再 URL 编码，拼入表单体
        let encoded = urlencoding::encode(&BASE64.encode(image)).into_owned();
        let payload = format!(
            "image={}&detect_direction=false&paragraph=false&probability=false",
            encoded
        );

        let response = self
            .client
            .post(format!("{}?access_token={}", RECOGNIZE_URL, token))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                error!("验证码识别请求超时");
                return None;
            }
            Err(e) => {
                error!("验证码识别过程出错: {}", e);
                return None;
            }
        };

        let result: Value = match response.json().await {
            Ok(result) => result,
            Err(e) => {
                error!("验证码识别过程出错: {}", e);
                return None;
            }
        };

        let words = result
            .get("words_result")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|first| first.get("words"))
            .and_then(|v| v.as_str());

        match words {
            Some(words) => Some(words.to_string()),
            None => {
                error!("验证码识别失败: {}", result);
                None
            }
        }
    }
}

impl CaptchaSolver for OcrClient {
    async fn recognize(&self, image: &[u8]) -> Option<String> {
        let token = self.get_access_token().await?;
        let raw = self.request_recognition(&token, image).await?;
        let text = clean_captcha_text(&raw);
        info!("验证码识别结果: {}", text);
        Some(text)
    }
}

/// 清理识别文本：去除空白，只保留字母和数字
fn clean_captcha_text(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}
