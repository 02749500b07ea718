//! 多账号批量签到 - 编排层
//!
//! ## 职责
//!
//! 1. **顺序执行**：严格按账号列表顺序逐个签到，账号之间插入随机延迟
//!    （论坛对请求频率敏感，顺序加延迟是正确性要求而不只是省资源）
//! 2. **资源注入**：通过工厂为每个账号构造独立的签到流程，
//!    账号之间不共享 HTTP 会话
//! 3. **全局统计**：汇总成功/失败数与积分奖励，写入每日汇总
//!
//! 单个账号失败不会中断整批；出现未处理异常的账号之后使用更长的
//! 延迟区间。

use std::time::Instant;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::clients::CaptchaSolver;
use crate::config::Config;
use crate::infrastructure::ForumGateway;
use crate::models::{Account, DailySummary, SignStatus};
use crate::services::{HistoryStore, SessionStore};
use crate::workflow::retry::uniform_delay;
use crate::workflow::SignFlow;

/// 多账号批量签到运行器
pub struct BatchRunner<'a> {
    config: &'a Config,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// 执行多账号签到
    ///
    /// `make_flow` 为每个账号构造一个全新的签到流程（独立会话）。
    /// 返回是否至少有一个账号签到成功。
    pub async fn run<G, C, F, S, H>(
        &self,
        accounts: &[Account],
        sessions: &S,
        history: &mut H,
        mut make_flow: F,
    ) -> Result<bool>
    where
        G: ForumGateway,
        C: CaptchaSolver,
        F: FnMut(&Account) -> Result<SignFlow<G, C>>,
        S: SessionStore,
        H: HistoryStore,
    {
        if accounts.is_empty() {
            warn!("没有可用的账号信息，请检查账号配置文件");
            return Ok(false);
        }

        let current_date = chrono::Local::now().format("%Y-%m-%d").to_string();
        info!("===== 开始执行MT论坛多账号自动签到 - {} =====", current_date);

        let started = Instant::now();
        let mut success_count = 0usize;
        let mut fail_count = 0usize;
        let mut total_rewards = 0u32;

        for (i, account) in accounts.iter().enumerate() {
            let mut errored = false;

            if !account.is_complete() {
                error!("账号信息不完整，跳过: {}", account.username);
                fail_count += 1;
            } else {
                info!(
                    "正在处理第 {}/{} 个账号: {}",
                    i + 1,
                    accounts.len(),
                    account.username
                );

                match self.run_account(account, sessions, history, &mut make_flow).await {
                    Ok(true) => {
                        success_count += 1;
                        total_rewards += latest_reward(history, &account.username);
                    }
                    Ok(false) => fail_count += 1,
                    Err(e) => {
                        error!(
                            "处理账号 {} 时出现未捕获的异常: {}",
                            account.username, e
                        );
                        fail_count += 1;
                        errored = true;
                    }
                }
            }

            // 最后一个账号之后不再延迟
            if i + 1 < accounts.len() {
                let range = if errored {
                    self.config.sign.error_delay
                } else {
                    self.config.sign.account_delay
                };
                let delay = uniform_delay(range.min, range.max);
                if errored {
                    info!("出现异常，等待 {:.2} 秒后继续...", delay.as_secs_f64());
                } else {
                    info!("等待 {:.2} 秒后处理下一个账号...", delay.as_secs_f64());
                }
                tokio::time::sleep(delay).await;
            }
        }

        let total_time = started.elapsed().as_secs_f64();

        info!("===== MT论坛多账号签到完成 - {} =====", current_date);
        info!("总账号数: {}", accounts.len());
        info!("成功签到: {}", success_count);
        info!("签到失败: {}", fail_count);
        info!("总积分奖励: {}", total_rewards);
        info!("总耗时: {:.2}秒", total_time);

        history.append_daily_summary(
            &current_date,
            DailySummary {
                total_accounts: accounts.len(),
                success_count,
                fail_count,
                total_rewards,
                execution_time: (total_time * 100.0).round() / 100.0,
            },
        )?;

        Ok(success_count > 0)
    }

    async fn run_account<G, C, F, S, H>(
        &self,
        account: &Account,
        sessions: &S,
        history: &mut H,
        make_flow: &mut F,
    ) -> Result<bool>
    where
        G: ForumGateway,
        C: CaptchaSolver,
        F: FnMut(&Account) -> Result<SignFlow<G, C>>,
        S: SessionStore,
        H: HistoryStore,
    {
        let mut flow = make_flow(account)?;
        flow.run(sessions, history).await
    }
}

/// 取账号最近一条成功记录的积分奖励
fn latest_reward<H: HistoryStore>(history: &H, username: &str) -> u32 {
    history
        .account_history(username)
        .and_then(|account| account.history.last())
        .filter(|record| record.status == SignStatus::Success)
        .map(|record| record.reward)
        .unwrap_or(0)
}
