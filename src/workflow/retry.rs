//! 有界重试策略
//!
//! 签到流程各步骤共用同一种重试形态：最多 `max_retries` 次尝试，
//! 两次尝试之间睡 `retry_delay + uniform(0, 2秒)`。只有瞬时网络错误
//! 触发重试，其余错误由各步骤自行分类处理。

use std::time::Duration;

use rand::Rng;

use crate::config::Config;

/// 重试策略参数
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// 最大尝试次数
    pub max_retries: u32,
    /// 基础重试间隔
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.request.max_retries,
            retry_delay: Duration::from_secs(config.request.retry_delay),
        }
    }

    /// 是否还有下一次尝试（attempt 从 0 计数）
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_retries
    }

    /// 基础间隔加 0~2 秒均匀抖动
    pub fn jittered_delay(&self) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.0..2.0);
        self.retry_delay + Duration::from_secs_f64(jitter)
    }

    /// 固定基础间隔，不加抖动
    pub fn fixed_delay(&self) -> Duration {
        self.retry_delay
    }

    /// 睡固定的重试间隔
    pub async fn sleep_fixed(&self) {
        tokio::time::sleep(self.fixed_delay()).await;
    }
}

/// 在 [min, max) 内取随机延迟（秒），负的边界按 0 处理
pub fn uniform_delay(min: f64, max: f64) -> Duration {
    let min = min.max(0.0);
    let max = max.max(0.0);
    if max <= min {
        return Duration::from_secs_f64(min);
    }
    Duration::from_secs_f64(rand::thread_rng().gen_range(min..max))
}
