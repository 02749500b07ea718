//! 签到历史持久化 - 业务能力层
//!
//! 启动时整体读入历史文档，之后每追加一条记录就整体重写文件。
//! 仅适用于单进程单次运行的前提，不做并发写保护。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::error;

use crate::models::{AccountHistory, DailySummary, HistoryDocument, SignRecord};

/// 历史存取契约
pub trait HistoryStore {
    /// 追加一条签到记录并同步账号镜像字段
    fn append_record(&mut self, username: &str, record: SignRecord) -> Result<()>;

    /// 获取账号历史
    fn account_history(&self, username: &str) -> Option<&AccountHistory>;

    /// 写入某日汇总（同日重跑覆盖）
    fn append_daily_summary(&mut self, date: &str, summary: DailySummary) -> Result<()>;

    /// 获取某日汇总
    fn daily_summary(&self, date: &str) -> Option<&DailySummary>;
}

fn apply_record(doc: &mut HistoryDocument, username: &str, record: SignRecord) {
    let account = doc.accounts.entry(username.to_string()).or_default();
    account.last_sign = record.date.clone();
    account.consecutive_days = record.consecutive_days;
    account.total_days = record.total_days;
    account.history.push(record);
}

/// 基于单个 JSON 文件的历史存储
pub struct JsonHistoryStore {
    path: PathBuf,
    doc: HistoryDocument,
}

impl JsonHistoryStore {
    /// 打开历史文件；不存在时创建空文档，损坏时从空文档重新开始
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = Self::load(&path);
        let store = Self { path, doc };
        if !store.path.exists() {
            store.flush()?;
        }
        Ok(store)
    }

    fn load(path: &Path) -> HistoryDocument {
        if !path.exists() {
            return HistoryDocument::default();
        }
        match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(doc) => doc,
                Err(e) => {
                    error!("加载历史记录失败: {}", e);
                    HistoryDocument::default()
                }
            },
            Err(e) => {
                error!("加载历史记录失败: {}", e);
                HistoryDocument::default()
            }
        }
    }

    fn flush(&self) -> Result<()> {
        fs::write(&self.path, serde_json::to_string_pretty(&self.doc)?)?;
        Ok(())
    }
}

impl HistoryStore for JsonHistoryStore {
    fn append_record(&mut self, username: &str, record: SignRecord) -> Result<()> {
        apply_record(&mut self.doc, username, record);
        self.flush()
    }

    fn account_history(&self, username: &str) -> Option<&AccountHistory> {
        self.doc.accounts.get(username)
    }

    fn append_daily_summary(&mut self, date: &str, summary: DailySummary) -> Result<()> {
        self.doc.summary.insert(date.to_string(), summary);
        self.flush()
    }

    fn daily_summary(&self, date: &str) -> Option<&DailySummary> {
        self.doc.summary.get(date)
    }
}

/// 纯内存历史存储（测试用）
#[derive(Default)]
pub struct MemoryHistoryStore {
    doc: HistoryDocument,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append_record(&mut self, username: &str, record: SignRecord) -> Result<()> {
        apply_record(&mut self.doc, username, record);
        Ok(())
    }

    fn account_history(&self, username: &str) -> Option<&AccountHistory> {
        self.doc.accounts.get(username)
    }

    fn append_daily_summary(&mut self, date: &str, summary: DailySummary) -> Result<()> {
        self.doc.summary.insert(date.to_string(), summary);
        Ok(())
    }

    fn daily_summary(&self, date: &str) -> Option<&DailySummary> {
        self.doc.summary.get(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SignStats, SignStatus};

    fn stats() -> SignStats {
        SignStats {
            consecutive_days: "5".to_string(),
            level: "2".to_string(),
            reward: "10".to_string(),
            total_days: "50".to_string(),
            rank: "3".to_string(),
        }
    }

    #[test]
    fn test_append_updates_account_mirror_fields() {
        let mut store = MemoryHistoryStore::new();
        store
            .append_record("alice", SignRecord::success(&stats()))
            .unwrap();

        let history = store.account_history("alice").unwrap();
        assert_eq!(history.history.len(), 1);
        assert_eq!(history.consecutive_days, 5);
        assert_eq!(history.total_days, 50);
        assert_eq!(history.last_sign, history.history[0].date);
    }

    #[test]
    fn test_records_append_only() {
        let mut store = MemoryHistoryStore::new();
        store.append_record("alice", SignRecord::failed()).unwrap();
        store
            .append_record("alice", SignRecord::success(&stats()))
            .unwrap();

        let history = store.account_history("alice").unwrap();
        assert_eq!(history.history.len(), 2);
        assert_eq!(history.history[0].status, SignStatus::Failed);
        assert_eq!(history.history[1].status, SignStatus::Success);
    }

    #[test]
    fn test_summary_last_write_wins() {
        let mut store = MemoryHistoryStore::new();
        let first = DailySummary {
            total_accounts: 2,
            success_count: 1,
            fail_count: 1,
            total_rewards: 10,
            execution_time: 3.0,
        };
        let second = DailySummary {
            success_count: 2,
            fail_count: 0,
            total_rewards: 20,
            ..first.clone()
        };
        store.append_daily_summary("2026-08-30", first).unwrap();
        store.append_daily_summary("2026-08-30", second).unwrap();

        let summary = store.daily_summary("2026-08-30").unwrap();
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.total_rewards, 20);
    }

    #[test]
    fn test_json_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sign_history.json");

        {
            let mut store = JsonHistoryStore::open(&path).unwrap();
            store
                .append_record("alice", SignRecord::success(&stats()))
                .unwrap();
        }

        let store = JsonHistoryStore::open(&path).unwrap();
        let history = store.account_history("alice").unwrap();
        assert_eq!(history.history.len(), 1);
        assert_eq!(history.history[0].reward, 10);
    }

    #[test]
    fn test_json_store_open_creates_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sign_history.json");

        let store = JsonHistoryStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.account_history("alice").is_none());
    }

    #[test]
    fn test_json_store_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sign_history.json");
        std::fs::write(&path, "{{{").unwrap();

        let store = JsonHistoryStore::open(&path).unwrap();
        assert!(store.account_history("alice").is_none());
    }
}
