//! 日志初始化
//!
//! 同时输出到控制台和按日期命名的日志文件
//! （`<logs_dir>/mt_sign_<YYYY-MM-DD>.log`）。日志级别可用
//! `RUST_LOG` 覆盖，默认 info。

use std::fs;
use std::sync::Arc;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化日志
///
/// 日志目录或文件创建失败时退回纯控制台输出，不阻断程序运行。
pub fn init(logs_dir: &str) {
    let current_date = chrono::Local::now().format("%Y-%m-%d");
    let log_path = format!("{}/mt_sign_{}.log", logs_dir, current_date);

    let file = fs::create_dir_all(logs_dir)
        .and_then(|_| fs::OpenOptions::new().create(true).append(true).open(&log_path));

    match file {
        Ok(file) => {
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
                .try_init();
        }
        Err(e) => {
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer())
                .try_init();
            tracing::warn!("日志文件初始化失败: {}，仅输出到控制台", e);
        }
    }
}
