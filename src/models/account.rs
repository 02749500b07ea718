//! 账号模型与加载
//!
//! 账号列表来自 `accounts.json`（有序数组）。文件不存在时创建一份示例
//! 配置并返回空列表，提示用户修改后重新运行；格式错误同样返回空列表。

use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// 论坛账号
///
/// 一次运行中账号信息不可变，以用户名作为标识键。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
    /// 安全提问ID，0 表示未设置
    #[serde(default)]
    pub questionid: u32,
    /// 安全提问答案
    #[serde(default)]
    pub answer: String,
}

impl Account {
    /// 账号信息是否完整（用户名和密码都非空）
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// 从配置文件加载账号信息
///
/// 文件不存在时创建示例配置文件并返回空列表。
pub fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<Account>> {
    let path = path.as_ref();

    if !path.exists() {
        let example = vec![
            Account {
                username: "用户名1".to_string(),
                password: "密码1".to_string(),
                questionid: 0,
                answer: String::new(),
            },
            Account {
                username: "用户名2".to_string(),
                password: "密码2".to_string(),
                questionid: 1,
                answer: "安全问题答案".to_string(),
            },
        ];
        fs::write(path, serde_json::to_string_pretty(&example)?)?;
        warn!("账号配置文件不存在，已创建示例配置文件: {}", path.display());
        warn!("请修改配置文件后重新运行程序");
        return Ok(Vec::new());
    }

    let text = fs::read_to_string(path)?;
    let accounts: Vec<Account> = match serde_json::from_str(&text) {
        Ok(accounts) => accounts,
        Err(e) => {
            error!("账号配置文件格式错误，应为账号列表格式: {}", e);
            return Ok(Vec::new());
        }
    };

    if accounts.is_empty() {
        warn!("账号配置文件为空，请添加账号信息");
        return Ok(accounts);
    }

    info!("成功加载 {} 个账号", accounts.len());
    Ok(accounts)
}
