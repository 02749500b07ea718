//! 签到历史数据模型
//!
//! 磁盘上的历史文档分两部分：`accounts` 按用户名记录逐次签到结果，
//! `summary` 按日期记录每日汇总。记录一经追加不再修改。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 签到结果状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignStatus {
    /// 签到成功（含当日已签）
    Success,
    /// 签到未完成
    Failed,
    /// 流程出现未预料的错误
    Error,
}

/// 从签到页抓取的统计数据
///
/// 各字段独立抓取，缺失的字段保留哨兵值 `"N/A"` 而不是让整次抓取失败。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignStats {
    /// 连续签到天数
    pub consecutive_days: String,
    /// 签到等级
    pub level: String,
    /// 本次积分奖励
    pub reward: String,
    /// 总签到天数
    pub total_days: String,
    /// 今日签到排名
    pub rank: String,
}

/// 统计字段缺失时的哨兵值
pub const STAT_UNAVAILABLE: &str = "N/A";

impl Default for SignStats {
    fn default() -> Self {
        Self {
            consecutive_days: STAT_UNAVAILABLE.to_string(),
            level: STAT_UNAVAILABLE.to_string(),
            reward: STAT_UNAVAILABLE.to_string(),
            total_days: STAT_UNAVAILABLE.to_string(),
            rank: STAT_UNAVAILABLE.to_string(),
        }
    }
}

impl SignStats {
    /// 是否所有字段都抓取成功
    pub fn is_complete(&self) -> bool {
        [
            &self.consecutive_days,
            &self.level,
            &self.reward,
            &self.total_days,
            &self.rank,
        ]
        .iter()
        .all(|v| *v != STAT_UNAVAILABLE)
    }
}

/// 单次签到记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignRecord {
    pub date: String,
    pub time: String,
    pub status: SignStatus,
    pub consecutive_days: u32,
    pub rank: u32,
    pub level: u32,
    pub reward: u32,
    pub total_days: u32,
    /// 出错时的错误信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SignRecord {
    fn stamped(status: SignStatus) -> Self {
        let now = chrono::Local::now();
        Self {
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            status,
            consecutive_days: 0,
            rank: 0,
            level: 0,
            reward: 0,
            total_days: 0,
            message: None,
        }
    }

    /// 构造成功记录，统计字段解析失败时取 0
    pub fn success(stats: &SignStats) -> Self {
        Self {
            consecutive_days: parse_stat(&stats.consecutive_days),
            rank: parse_stat(&stats.rank),
            level: parse_stat(&stats.level),
            reward: parse_stat(&stats.reward),
            total_days: parse_stat(&stats.total_days),
            ..Self::stamped(SignStatus::Success)
        }
    }

    /// 构造失败记录
    pub fn failed() -> Self {
        Self::stamped(SignStatus::Failed)
    }

    /// 构造异常记录
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::stamped(SignStatus::Error)
        }
    }
}

fn parse_stat(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}

/// 单个账号的签到历史
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountHistory {
    /// 按时间顺序追加的签到记录
    pub history: Vec<SignRecord>,
    /// 最近一次记录的日期
    pub last_sign: String,
    pub consecutive_days: u32,
    pub total_days: u32,
}

/// 每日签到汇总（同一天重跑时后写覆盖）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailySummary {
    pub total_accounts: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub total_rewards: u32,
    /// 本次运行耗时（秒）
    pub execution_time: f64,
}

/// 磁盘上的历史文档
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistoryDocument {
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountHistory>,
    #[serde(default)]
    pub summary: BTreeMap<String, DailySummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_complete() {
        let mut stats = SignStats {
            consecutive_days: "5".to_string(),
            level: "2".to_string(),
            reward: "10".to_string(),
            total_days: "50".to_string(),
            rank: "3".to_string(),
        };
        assert!(stats.is_complete());

        stats.rank = STAT_UNAVAILABLE.to_string();
        assert!(!stats.is_complete());
    }

    #[test]
    fn test_success_record_parses_stats() {
        let stats = SignStats {
            consecutive_days: "5".to_string(),
            level: "2".to_string(),
            reward: "10".to_string(),
            total_days: "50".to_string(),
            rank: "3".to_string(),
        };
        let record = SignRecord::success(&stats);
        assert_eq!(record.status, SignStatus::Success);
        assert_eq!(record.consecutive_days, 5);
        assert_eq!(record.reward, 10);
        assert_eq!(record.total_days, 50);
        assert_eq!(record.rank, 3);
    }

    #[test]
    fn test_unavailable_stat_defaults_to_zero() {
        let record = SignRecord::success(&SignStats::default());
        assert_eq!(record.reward, 0);
        assert_eq!(record.consecutive_days, 0);
    }

    #[test]
    fn test_error_record_keeps_message() {
        let record = SignRecord::error("连接被重置");
        assert_eq!(record.status, SignStatus::Error);
        assert_eq!(record.message.as_deref(), Some("连接被重置"));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SignStatus::Success).unwrap(),
            "\"success\""
        );
        assert_eq!(
            serde_json::to_string(&SignStatus::Error).unwrap(),
            "\"error\""
        );
    }

    #[test]
    fn test_document_round_trip() {
        let mut doc = HistoryDocument::default();
        doc.accounts
            .entry("alice".to_string())
            .or_default()
            .history
            .push(SignRecord::failed());
        doc.summary.insert(
            "2026-08-30".to_string(),
            DailySummary {
                total_accounts: 1,
                success_count: 0,
                fail_count: 1,
                total_rewards: 0,
                execution_time: 1.5,
            },
        );

        let text = serde_json::to_string(&doc).unwrap();
        let back: HistoryDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(back.accounts["alice"].history.len(), 1);
        assert_eq!(back.summary["2026-08-30"].fail_count, 1);
    }
}
