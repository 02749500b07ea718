//! 论坛 HTTP 访问 - 基础设施层
//!
//! `ForumHttp` 是唯一持有 `reqwest::Client` 的模块，向上层只暴露
//! `ForumGateway` 能力。Cookie 以显式的名称→值映射管理，便于经由
//! SessionStore 持久化后在下次运行中复用。

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};

use crate::config::Config;
use crate::error::{SignError, SignResult};

/// 论坛站点根地址
pub const FORUM_BASE_URL: &str = "https://bbs.binmt.cc";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 论坛访问能力
///
/// 签到流程只依赖这组操作，测试中用脚本化的 mock 实现替换真实网络。
#[allow(async_fn_in_trait)]
pub trait ForumGateway {
    /// 获取论坛首页（用于登录状态探测）
    async fn fetch_home(&mut self) -> SignResult<String>;

    /// 获取签到页
    async fn fetch_sign_page(&mut self) -> SignResult<String>;

    /// 获取登录表单页
    async fn fetch_login_page(&mut self) -> SignResult<String>;

    /// 下载验证码图片（`src` 为页面内的相对地址）
    async fn fetch_captcha(&mut self, src: &str) -> SignResult<Vec<u8>>;

    /// 提交登录表单，返回响应正文
    async fn submit_login(&mut self, form: &[(String, String)]) -> SignResult<String>;

    /// 发起签到请求，返回 HTTP 状态码
    async fn submit_sign(&mut self, formhash: &str) -> SignResult<u16>;

    /// 当前会话 Cookie
    fn cookies(&self) -> &HashMap<String, String>;

    /// 替换会话 Cookie（从持久化会话恢复时使用）
    fn set_cookies(&mut self, cookies: HashMap<String, String>);
}

/// 基于 reqwest 的论坛访问实现
pub struct ForumHttp {
    client: reqwest::Client,
    base_url: String,
    cookies: HashMap<String, String>,
}

impl ForumHttp {
    /// 创建论坛客户端（超时来自配置，Cookie 初始为空）
    pub fn new(config: &Config) -> SignResult<Self> {
        Self::with_base_url(config, FORUM_BASE_URL)
    }

    /// 使用自定义站点地址创建（测试用）
    pub fn with_base_url(config: &Config, base_url: &str) -> SignResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Origin", HeaderValue::from_str(base_url).map_err(to_unexpected)?);
        headers.insert(
            "Referer",
            HeaderValue::from_str(&format!("{}/", base_url)).map_err(to_unexpected)?,
        );

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.request.timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            cookies: HashMap::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn apply_cookies(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.cookie_header() {
            Some(header) => request.header("Cookie", header),
            None => request,
        }
    }

    /// 从响应头吸收 Set-Cookie
    fn absorb_cookies(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(text) = value.to_str() else { continue };
            let pair = text.split(';').next().unwrap_or("");
            if let Some((name, value)) = pair.split_once('=') {
                self.cookies
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }

    async fn get_text(&mut self, path: &str) -> SignResult<String> {
        let request = self.apply_cookies(self.client.get(self.url(path)));
        let response = request.send().await?;
        self.absorb_cookies(response.headers());
        Ok(response.text().await?)
    }
}

fn to_unexpected(e: impl std::fmt::Display) -> SignError {
    SignError::Unexpected(e.to_string())
}

impl ForumGateway for ForumHttp {
    async fn fetch_home(&mut self) -> SignResult<String> {
        self.get_text("/").await
    }

    async fn fetch_sign_page(&mut self) -> SignResult<String> {
        self.get_text("/k_misign-sign.html").await
    }

    async fn fetch_login_page(&mut self) -> SignResult<String> {
        self.get_text("/member.php?mod=logging&action=login").await
    }

    async fn fetch_captcha(&mut self, src: &str) -> SignResult<Vec<u8>> {
        let request = self.apply_cookies(self.client.get(format!("{}/{}", self.base_url, src)));
        let response = request.send().await?;
        self.absorb_cookies(response.headers());
        if !response.status().is_success() {
            return Err(SignError::Unexpected(format!(
                "下载验证码图片失败: {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn submit_login(&mut self, form: &[(String, String)]) -> SignResult<String> {
        let url =
            self.url("/member.php?mod=logging&action=login&loginsubmit=yes&infloat=yes&handlekey=login");
        let request = self.apply_cookies(self.client.post(url)).form(form);
        let response = request.send().await?;
        self.absorb_cookies(response.headers());
        Ok(response.text().await?)
    }

    async fn submit_sign(&mut self, formhash: &str) -> SignResult<u16> {
        let url = self.url(&format!(
            "/plugin.php?id=k_misign:sign&operation=qiandao&formhash={}&format=empty",
            formhash
        ));
        let request = self
            .apply_cookies(self.client.get(url))
            .header("X-Requested-With", "XMLHttpRequest");
        let response = request.send().await?;
        self.absorb_cookies(response.headers());
        Ok(response.status().as_u16())
    }

    fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    fn set_cookies(&mut self, cookies: HashMap<String, String>) {
        self.cookies = cookies;
    }
}
