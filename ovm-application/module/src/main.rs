//! ovm_vm - Oracle VM 虚拟机管理模块

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ovm_module::{output, ModuleConfig, ModuleParams};
use ovm_restapi::{Credentials, OperationResult, OvmClient, Session};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "ovm_vm")]
#[command(about = "Oracle VM 虚拟机管理 - Ansible 模块", long_about = None)]
#[command(version)]
struct Cli {
    /// Ansible 写入的模块参数文件 (JSON)
    args_file: PathBuf,

    /// 日志级别
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// 配置文件路径 (默认 ~/.config/ovm/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 初始化日志，stdout 留给模块结果
    let log_level = cli.log_level.to_lowercase();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    format!(
                        "ovm_vm={},ovm_module={},ovm_restapi={}",
                        log_level, log_level, log_level
                    )
                    .into()
                }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("ovm_vm 模块启动");

    let result = match execute(&cli).await {
        Ok(result) => result,
        Err(e) => {
            error!("模块执行失败: {:#}", e);
            output::from_error(&e)
        }
    };

    output::emit(&result)
}

async fn execute(cli: &Cli) -> Result<OperationResult> {
    let params = ModuleParams::from_file(&cli.args_file)?;

    let mut config = ModuleConfig::load(cli.config.as_deref())?;
    config.apply_params(&params);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("收到中断信号，停止作业轮询");
                cancel.cancel();
            }
        }
    });

    ovm_module::run(&params, |params| {
        let session = Session::new(
            &params.ovm_host,
            Credentials::new(params.ovm_user.as_str(), params.ovm_pass.expose()),
            &config.session,
        )
        .context("创建 OVM 会话失败")?;

        Ok(OvmClient::new(Arc::new(session))
            .with_poll_policy(config.poll.clone())
            .with_cancellation(cancel))
    })
    .await
}
