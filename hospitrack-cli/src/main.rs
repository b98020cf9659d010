//! HospiTrack 命令行客户端

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hospitrack_admin::{init_logging, ConfigManager, ConfigValidator};
use hospitrack_client::{ApiClient, Session};
use hospitrack_sync::DashboardEngine;
use tracing::{info, warn};

use crate::commands::{App, Command};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "hospitrack")]
#[command(about = "HospiTrack 医院运营看板命令行客户端")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 后端地址，覆盖配置与环境变量
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// 访问令牌（`hospitrack login` 的输出）
    #[arg(long, global = true, env = "HOSPITRACK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = ConfigManager::new(cli.config.as_deref()).context("Failed to load configuration")?;
    let mut config = manager.get_config().await;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.backend.base_url = base_url.clone();
    }
    ConfigValidator::new()
        .validate(&config)
        .context("Invalid command line overrides")?;

    init_logging(&config.logging)?;
    info!("后端地址: {}", config.backend.base_url);

    let session = Arc::new(match &cli.token {
        Some(token) => Session::with_token(token.clone()),
        None => Session::new(),
    });
    let client = ApiClient::new(config.client_config(), session)
        .context("Failed to create HTTP client")?
        .with_unauthorized_handler(|| warn!("会话已失效，请重新登录 (hospitrack login)"));

    let app = App {
        engine: DashboardEngine::new(client.clone()),
        client,
        config,
    };

    commands::run(&app, cli.command).await
}
