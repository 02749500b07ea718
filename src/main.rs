use std::process::ExitCode;

use tracing::{error, warn};

use mt_auto_sign::models::load_accounts;
use mt_auto_sign::services::{FileSessionStore, JsonHistoryStore};
use mt_auto_sign::utils::logging;
use mt_auto_sign::{BatchRunner, Config, ForumHttp, OcrClient, SignFlow};

#[tokio::main]
async fn main() -> ExitCode {
    // 加载配置（文件不存在时写出默认配置）
    let config = Config::load("config.json");

    // 初始化日志
    logging::init(&config.paths.logs_dir);

    // 加载账号
    let accounts = match load_accounts(&config.paths.accounts_file) {
        Ok(accounts) => accounts,
        Err(e) => {
            error!("加载账号配置失败: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if accounts.is_empty() {
        warn!("没有可用的账号信息，请检查账号配置文件");
        return ExitCode::FAILURE;
    }

    let sessions = FileSessionStore::new(&config.paths.cookies_dir);
    let mut history = match JsonHistoryStore::open(&config.paths.history_file) {
        Ok(history) => history,
        Err(e) => {
            error!("打开历史记录文件失败: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // 每个账号一个独立会话的签到流程
    let make_flow = |account: &mt_auto_sign::Account| {
        let gateway = ForumHttp::new(&config)?;
        let solver = OcrClient::new(&config)?;
        Ok(SignFlow::new(account.clone(), &config, gateway, solver))
    };

    let runner = BatchRunner::new(&config);
    match runner.run(&accounts, &sessions, &mut history, make_flow).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("批量签到执行失败: {}", e);
            ExitCode::FAILURE
        }
    }
}
