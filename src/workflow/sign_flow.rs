//! 单账号签到流程 - 流程层（核心状态机）
//!
//! 一个账号一次运行走完：登录 → 检测是否已签 → 签到 → 抓取统计 → 记录。
//! 每个步骤自带有界重试，把重试耗尽转成布尔/哨兵失败向上返回；
//! 只有真正未预料的错误才会穿透到 `run()`，在那里统一记录为
//! error 状态的历史条目。
//!
//! 所有依赖（论坛访问、验证码识别、会话与历史存储）都从外部注入，
//! 不持有任何全局状态。

use std::path::PathBuf;
use std::time::Instant;

use rand::Rng;
use tracing::{error, info, warn};

use crate::clients::CaptchaSolver;
use crate::config::Config;
use crate::error::{SignError, SignResult};
use crate::infrastructure::ForumGateway;
use crate::models::{Account, SignRecord, SignStats};
use crate::services::page;
use crate::services::{HistoryStore, SessionStore};
use crate::workflow::retry::RetryPolicy;

/// 单次登录尝试的结果
enum LoginAttempt {
    /// 登录成功
    Success,
    /// 验证码识别错误，换一个新表单重试
    WrongCaptcha,
    /// 验证码下载或识别失败，等固定间隔后重试
    CaptchaSoftFail,
}

/// 单账号签到流程
pub struct SignFlow<G: ForumGateway, C: CaptchaSolver> {
    account: Account,
    gateway: G,
    solver: C,
    policy: RetryPolicy,
    captcha_max_attempts: u32,
    /// 验证码图片临时文件所在目录
    captcha_dir: PathBuf,
}

impl<G: ForumGateway, C: CaptchaSolver> SignFlow<G, C> {
    /// 创建签到流程
    pub fn new(account: Account, config: &Config, gateway: G, solver: C) -> Self {
        Self {
            account,
            gateway,
            solver,
            policy: RetryPolicy::from_config(config),
            captcha_max_attempts: config.request.captcha_max_attempts,
            captcha_dir: PathBuf::from("."),
        }
    }

    /// 指定验证码图片临时目录
    pub fn with_captcha_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.captcha_dir = dir.into();
        self
    }

    fn username(&self) -> &str {
        &self.account.username
    }

    /// 访问底层论坛网关（测试中用于检查请求计数）
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// 主运行流程
    ///
    /// 登录 → (已签则跳过) → 签到 → 抓取统计 → 记录。无论走哪条路径，
    /// 结束时都会记录总耗时；未预料的错误在这里记录为 error 条目后
    /// 继续向上抛给批量运行器。
    pub async fn run<S, H>(&mut self, sessions: &S, history: &mut H) -> anyhow::Result<bool>
    where
        S: SessionStore,
        H: HistoryStore,
    {
        let current_date = chrono::Local::now().format("%Y-%m-%d");
        info!("[{}] 开始执行MT论坛自动签到 - {}", self.username(), current_date);
        let started = Instant::now();

        let result = self.run_inner(sessions, history).await;

        info!(
            "[{}] 签到任务结束，总耗时: {:.2}秒",
            self.username(),
            started.elapsed().as_secs_f64()
        );

        match result {
            Ok(success) => Ok(success),
            Err(e) => {
                error!("[{}] 签到过程出现未处理的异常: {}", self.username(), e);
                if let Err(record_err) =
                    history.append_record(self.username(), SignRecord::error(e.to_string()))
                {
                    error!("[{}] 添加签到记录失败: {}", self.username(), record_err);
                }
                Err(e)
            }
        }
    }

    async fn run_inner<S, H>(&mut self, sessions: &S, history: &mut H) -> anyhow::Result<bool>
    where
        S: SessionStore,
        H: HistoryStore,
    {
        info!("[{}] 正在执行登录...", self.username());
        if !self.login(sessions).await? {
            error!("[{}] 登录失败，请检查账号密码或网络连接", self.username());
            return Ok(false);
        }

        info!("[{}] 正在检查签到状态...", self.username());
        if self.check_signed().await {
            info!("[{}] 今日已完成签到，无需重复操作", self.username());
        } else {
            info!("[{}] 正在执行签到...", self.username());
            if !self.sign().await? {
                warn!("[{}] 签到未完成，可能出现异常", self.username());
                history.append_record(self.username(), SignRecord::failed())?;
                return Ok(false);
            }
        }

        info!("[{}] === 签到信息 ===", self.username());
        let stats = self.get_stats().await;
        self.log_stats(&stats);
        history.append_record(self.username(), SignRecord::success(&stats))?;

        Ok(true)
    }

    /// 执行登录
    ///
    /// 先尝试复用持久化会话；会话无效时走账号密码登录，
    /// 整个调用共享一个验证码尝试计数器。
    pub async fn login<S: SessionStore>(&mut self, sessions: &S) -> SignResult<bool> {
        if self.try_restore_session(sessions).await {
            info!("[{}] 使用Cookie登录成功", self.username());
            return Ok(true);
        }

        info!("[{}] Cookie无效或已过期，将使用账号密码登录", self.username());

        let mut captcha_attempts: u32 = 0;

        for attempt in 0..self.policy.max_retries {
            match self.login_attempt(&mut captcha_attempts).await {
                Ok(LoginAttempt::Success) => {
                    info!("[{}] 登录成功", self.username());
                    self.persist_session(sessions);
                    return Ok(true);
                }
                Ok(LoginAttempt::WrongCaptcha) => {
                    warn!("[{}] 验证码识别错误，重新尝试", self.username());
                    continue;
                }
                Ok(LoginAttempt::CaptchaSoftFail) => {
                    if self.policy.has_next(attempt) {
                        warn!(
                            "[{}] 验证码处理失败，{}秒后重试...",
                            self.username(),
                            self.policy.fixed_delay().as_secs()
                        );
                        self.policy.sleep_fixed().await;
                        continue;
                    }
                    return Ok(false);
                }
                Err(SignError::InvalidCredentials) => {
                    error!("[{}] 登录失败：密码错误", self.username());
                    return Ok(false);
                }
                Err(SignError::CaptchaExhausted { attempts }) => {
                    error!(
                        "[{}] 验证码识别已达到最大尝试次数 {}",
                        self.username(),
                        attempts
                    );
                    return Ok(false);
                }
                Err(e) if e.is_retryable() => {
                    warn!("[{}] 登录请求失败: {}，第{}次尝试", self.username(), e, attempt + 1);
                }
                Err(e) => {
                    error!("[{}] 登录过程出现错误: {}", self.username(), e);
                    return Ok(false);
                }
            }

            if self.policy.has_next(attempt) {
                let delay = self.policy.jittered_delay();
                info!("[{}] {:.2}秒后重试登录...", self.username(), delay.as_secs_f64());
                tokio::time::sleep(delay).await;
            }
        }

        error!(
            "[{}] 登录失败，已达到最大重试次数 {}",
            self.username(),
            self.policy.max_retries
        );
        Ok(false)
    }

    /// 加载持久化 Cookie 并探测登录状态
    async fn try_restore_session<S: SessionStore>(&mut self, sessions: &S) -> bool {
        match sessions.load(self.username()) {
            Ok(Some(cookies)) if !cookies.is_empty() => {
                info!("[{}] 已从本地加载Cookie", self.username());
                self.gateway.set_cookies(cookies);
                self.check_login_status().await
            }
            Ok(_) => {
                info!("[{}] 未找到Cookie文件，将进行账号登录", self.username());
                false
            }
            Err(e) => {
                error!("[{}] 加载Cookie失败: {}", self.username(), e);
                false
            }
        }
    }

    fn persist_session<S: SessionStore>(&self, sessions: &S) {
        match sessions.save(self.username(), self.gateway.cookies()) {
            Ok(()) => info!("[{}] Cookie已保存到本地", self.username()),
            Err(e) => error!("[{}] 保存Cookie失败: {}", self.username(), e),
        }
    }

    /// 一次完整的表单登录尝试（取表单 → 处理验证码 → 提交 → 判定）
    async fn login_attempt(&mut self, captcha_attempts: &mut u32) -> SignResult<LoginAttempt> {
        let html = self.gateway.fetch_login_page().await?;
        let form = page::parse_login_form(&html)?;
        let has_captcha = form.captcha.is_some();

        let mut payload: Vec<(String, String)> = vec![
            ("formhash".to_string(), form.formhash.clone()),
            ("referer".to_string(), "https://bbs.binmt.cc/".to_string()),
            ("username".to_string(), self.account.username.clone()),
            ("password".to_string(), self.account.password.clone()),
            ("cookietime".to_string(), form.cookietime.clone()),
            ("questionid".to_string(), self.account.questionid.to_string()),
            ("loginsubmit".to_string(), "登录".to_string()),
        ];

        // 设置了安全提问时附带答案
        if self.account.questionid > 0 && !self.account.answer.is_empty() {
            payload.push(("answer".to_string(), self.account.answer.clone()));
            info!(
                "[{}] 使用安全提问登录，提问ID: {}",
                self.username(),
                self.account.questionid
            );
        }

        // 随机 id 字段与固定字段名都要提交
        payload.push((form.username_field_id.clone(), self.account.username.clone()));
        payload.push((form.password_field_id.clone(), self.account.password.clone()));

        if let Some(captcha) = &form.captcha {
            info!(
                "[{}] 检测到需要输入验证码 (尝试 {}/{})",
                self.username(),
                *captcha_attempts + 1,
                self.captcha_max_attempts
            );

            if *captcha_attempts >= self.captcha_max_attempts {
                return Err(SignError::CaptchaExhausted {
                    attempts: self.captcha_max_attempts,
                });
            }
            *captcha_attempts += 1;

            let Some(src) = captcha.image_src.clone() else {
                error!("[{}] 未找到验证码图片", self.username());
                return Ok(LoginAttempt::CaptchaSoftFail);
            };

            let image = match self.gateway.fetch_captcha(&src).await {
                Ok(image) => image,
                Err(e) => {
                    warn!("[{}] 下载验证码图片失败: {}", self.username(), e);
                    return Ok(LoginAttempt::CaptchaSoftFail);
                }
            };

            self.save_captcha_scratch(&image);

            let Some(text) = self.solver.recognize(&image).await else {
                warn!("[{}] 验证码识别失败", self.username());
                return Ok(LoginAttempt::CaptchaSoftFail);
            };

            payload.push(("seccodehash".to_string(), captcha.idhash.clone()));
            payload.push(("seccodeverify".to_string(), text));
        }

        let body = self.gateway.submit_login(&payload).await?;

        if page::is_login_welcome(&body) || self.check_login_status().await {
            return Ok(LoginAttempt::Success);
        }

        if has_captcha && page::is_wrong_captcha(&body) {
            return Ok(LoginAttempt::WrongCaptcha);
        }

        if page::is_wrong_password(&body) {
            return Err(SignError::InvalidCredentials);
        }

        Err(SignError::Unexpected(
            "登录失败，请检查账号密码".to_string(),
        ))
    }

    /// 把验证码图片写到按用户名命名的临时文件（不做清理）
    fn save_captcha_scratch(&self, image: &[u8]) {
        let path = self
            .captcha_dir
            .join(format!("captcha_{}.jpg", self.username()));
        match std::fs::write(&path, image) {
            Ok(()) => info!(
                "[{}] 验证码图片已保存到: {}",
                self.username(),
                path.display()
            ),
            Err(e) => warn!("[{}] 保存验证码图片失败: {}", self.username(), e),
        }
    }

    /// 探测首页是否仍处于该账号的登录状态
    async fn check_login_status(&mut self) -> bool {
        match self.gateway.fetch_home().await {
            Ok(html) => page::is_home_logged_in(&html, self.username()),
            Err(e) => {
                error!("[{}] 检查登录状态失败: {}", self.username(), e);
                false
            }
        }
    }

    /// 检测今日是否已签到
    ///
    /// 瞬时网络错误按预算重试；其余错误按"未签"处理（论坛侧签到
    /// 操作幂等，重复提交会被签后复查拦下）。
    pub async fn check_signed(&mut self) -> bool {
        for attempt in 0..self.policy.max_retries {
            match self.gateway.fetch_sign_page().await {
                Ok(html) => return page::is_signed(&html),
                Err(e) if e.is_retryable() => {
                    warn!(
                        "[{}] 签到状态检测失败: {}，第{}次尝试",
                        self.username(),
                        e,
                        attempt + 1
                    );
                }
                Err(e) => {
                    error!("[{}] 签到状态检测失败: {}", self.username(), e);
                    return false;
                }
            }

            if self.policy.has_next(attempt) {
                let delay = self.policy.jittered_delay();
                info!("[{}] {:.2}秒后重试...", self.username(), delay.as_secs_f64());
                tokio::time::sleep(delay).await;
            }
        }

        error!("[{}] 签到状态检测失败，已达到最大重试次数", self.username());
        false
    }

    /// 获取签到按钮中的动态 formhash
    ///
    /// 返回 `Ok(None)` 表示今日已签、无需再取。
    pub async fn get_formhash(&mut self) -> SignResult<Option<String>> {
        for attempt in 0..self.policy.max_retries {
            if self.check_signed().await {
                info!("[{}] 今日已完成签到，无需重复操作", self.username());
                return Ok(None);
            }

            match self.gateway.fetch_sign_page().await {
                Ok(html) => match page::extract_sign_formhash(&html) {
                    Some(formhash) => {
                        info!("[{}] 成功获取formhash: {}", self.username(), formhash);
                        return Ok(Some(formhash));
                    }
                    None => {
                        error!("[{}] 无法从签到按钮中提取formhash", self.username());
                    }
                },
                Err(e) if e.is_retryable() => {
                    warn!(
                        "[{}] 获取formhash失败: {}，第{}次尝试",
                        self.username(),
                        e,
                        attempt + 1
                    );
                }
                Err(e) => return Err(e),
            }

            if self.policy.has_next(attempt) {
                let delay = self.policy.jittered_delay();
                info!(
                    "[{}] {:.2}秒后重试获取formhash...",
                    self.username(),
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
        }

        error!("[{}] 获取formhash失败，已达到最大重试次数", self.username());
        Err(SignError::ParseMissing("formhash"))
    }

    /// 执行签到
    ///
    /// 每轮尝试都重新获取 formhash、发起签到请求、等一段随机延迟，
    /// 再以"是否已签"的复查作为成功的唯一判据——HTTP 状态码不可信。
    pub async fn sign(&mut self) -> SignResult<bool> {
        if self.check_signed().await {
            info!("[{}] 签到状态检测：今日已签到", self.username());
            return Ok(true);
        }

        for attempt in 0..self.policy.max_retries {
            let formhash = match self.get_formhash().await {
                Ok(None) => return Ok(true),
                Ok(Some(formhash)) => formhash,
                Err(e) if e.is_retryable() || e.is_parse_missing() => {
                    warn!("[{}] 获取formhash失败: {}", self.username(), e);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            };

            info!(
                "[{}] 正在执行签到操作 (尝试 {}/{})",
                self.username(),
                attempt + 1,
                self.policy.max_retries
            );

            match self.gateway.submit_sign(&formhash).await {
                Ok(200) => {
                    // 等签到状态落地后再复查
                    let settle = std::time::Duration::from_secs_f64(
                        1.5 + rand::thread_rng().gen_range(0.0..1.0),
                    );
                    info!(
                        "[{}] 签到请求成功，等待 {:.2} 秒后检查签到状态...",
                        self.username(),
                        settle.as_secs_f64()
                    );
                    tokio::time::sleep(settle).await;

                    if self.check_signed().await {
                        info!("[{}] 签到成功确认", self.username());
                        return Ok(true);
                    }
                    warn!(
                        "[{}] 签到请求已发送，但签到状态未更新",
                        self.username()
                    );
                }
                Ok(status) => {
                    error!("[{}] 签到请求返回状态码: {}", self.username(), status);
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        "[{}] 签到请求失败: {}，第{}次尝试",
                        self.username(),
                        e,
                        attempt + 1
                    );
                }
                Err(e) => return Err(e),
            }

            if self.policy.has_next(attempt) {
                let delay = self.policy.jittered_delay();
                info!("[{}] {:.2}秒后重试签到...", self.username(), delay.as_secs_f64());
                tokio::time::sleep(delay).await;
            }
        }

        error!("[{}] 签到失败，已达到最大重试次数", self.username());
        Ok(false)
    }

    /// 抓取签到统计数据
    ///
    /// 缺字段不算失败：抓不全时整体重抓一次，仍不全就带着哨兵值返回。
    pub async fn get_stats(&mut self) -> SignStats {
        let mut last = SignStats::default();

        for attempt in 0..2 {
            match self.gateway.fetch_sign_page().await {
                Ok(html) => {
                    let stats = page::parse_stats(&html);
                    if stats.is_complete() {
                        return stats;
                    }
                    warn!("[{}] 部分统计数据获取失败", self.username());
                    last = stats;
                }
                Err(e) => {
                    warn!("[{}] 获取统计数据失败: {}", self.username(), e);
                }
            }

            if attempt == 0 {
                info!("[{}] 将重试获取统计数据...", self.username());
                self.policy.sleep_fixed().await;
            }
        }

        last
    }

    fn log_stats(&self, stats: &SignStats) {
        info!(
            "[{}] 连续签到: {} 天 | 今日排名: 第{} 位 | 签到等级: Lv{} | 本次积分: +{} | 总签到天数: {} 天",
            self.username(),
            stats.consecutive_days,
            stats.rank,
            stats.level,
            stats.reward,
            stats.total_days
        );
    }
}
