//! 会话持久化 - 业务能力层
//!
//! 每个账号一个 Cookie 文件（名称→值的扁平映射），下次运行时先尝试
//! 复用会话、跳过账号密码登录。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

/// 会话存取契约
pub trait SessionStore {
    /// 加载账号的持久化 Cookie，不存在时返回 None
    fn load(&self, username: &str) -> Result<Option<HashMap<String, String>>>;

    /// 保存账号的 Cookie
    fn save(&self, username: &str, cookies: &HashMap<String, String>) -> Result<()>;
}

/// 基于目录的会话存储，文件名为 `<用户名>_cookies.json`
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn cookie_file(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{}_cookies.json", username))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, username: &str) -> Result<Option<HashMap<String, String>>> {
        let path = self.cookie_file(username);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&self, username: &str, cookies: &HashMap<String, String>) -> Result<()> {
        ensure_dir(&self.dir)?;
        let path = self.cookie_file(username);
        fs::write(&path, serde_json::to_string(cookies)?)?;
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_absent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(store.load("alice").unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("cookies"));

        let mut cookies = HashMap::new();
        cookies.insert("auth".to_string(), "abc".to_string());
        cookies.insert("saltkey".to_string(), "s4lt".to_string());
        store.save("alice", &cookies).unwrap();

        let loaded = store.load("alice").unwrap().unwrap();
        assert_eq!(loaded, cookies);
    }

    #[test]
    fn test_accounts_do_not_share_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        let mut cookies = HashMap::new();
        cookies.insert("auth".to_string(), "alice-token".to_string());
        store.save("alice", &cookies).unwrap();

        assert!(store.load("bob").unwrap().is_none());
    }
}
