//! Notification Tester CLI
//!
//! 推送通知诊断工具：注册设备、请求权限、发送和调度通知

use anyhow::Result;
use clap::{Parser, Subcommand};
use notification_tester::cli::{
    format_last_notification, format_output, format_scheduled, print_ack, run_interactive, PromptAnswer,
    Session,
};
use notification_tester::{Ack, PlatformFamily, PushToken, TesterConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "ntest")]
#[command(about = "Notification Tester - 推送通知诊断工具")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/notification-tester/config.json）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 模拟非物理设备
    #[arg(long, global = true)]
    emulator: bool,

    /// 覆盖平台系列
    #[arg(long, global = true, value_enum)]
    platform: Option<PlatformFamily>,

    /// 权限提示的回答方式
    #[arg(long, global = true, value_enum, default_value = "ask")]
    answer: PromptAnswer,

    /// 动作完成后等待下一条前台通知（秒）
    #[arg(long, global = true)]
    wait: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// 注册设备并输出推送 token
    Register,
    /// 请求通知权限（授权后刷新 token）
    RequestPermissions,
    /// 立即发送一条测试推送
    SendTest {
        /// 使用指定 token，而不是本机注册得到的 token
        #[arg(long)]
        token: Option<String>,
    },
    /// 调度 5 秒后的测试通知
    ScheduleTest,
    /// 调度 10 秒后的提醒
    ScheduleReminder,
    /// 调度 1 秒后的自定义通知
    SendCustom,
    /// 列出所有待投递通知
    ListScheduled {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 清除所有待投递通知
    ClearAll,
    /// 交互式菜单（默认）
    Interactive,
}

fn load_config(cli: &Cli) -> Result<TesterConfig> {
    let mut config = match &cli.config {
        Some(path) => TesterConfig::load_from(path)?,
        None => TesterConfig::auto_load()?,
    };
    if cli.emulator {
        config.device.physical = false;
    }
    if let Some(family) = cli.platform {
        config.device.family = family;
    }
    Ok(config)
}

async fn run_command(session: &mut Session, command: Commands) -> Ack {
    let startup = session.start().await;
    if startup.is_error() && !matches!(command, Commands::Register | Commands::Interactive) {
        print_ack(&startup);
    }

    match command {
        Commands::Register | Commands::Interactive => startup,
        Commands::RequestPermissions => session.tester.request_permissions().await,
        Commands::SendTest { token } => {
            if let Some(token) = token {
                session.tester.set_token(Some(PushToken::new(token)));
            }
            session.tester.send_test().await
        }
        Commands::ScheduleTest => session.tester.schedule_test().await,
        Commands::ScheduleReminder => session.tester.schedule_reminder().await,
        Commands::SendCustom => session.tester.send_custom().await,
        Commands::ListScheduled { json } => {
            let (ack, scheduled) = session.tester.list_scheduled().await;
            if json {
                println!("{}", format_output(&scheduled, true));
            } else if !scheduled.is_empty() {
                println!("{}", format_scheduled(&scheduled));
            }
            ack
        }
        Commands::ClearAll => session.tester.clear_all().await,
    }
}

async fn wait_for_notification(session: &mut Session, secs: u64) {
    let Some(listener) = session.tester.listener_mut() else {
        return;
    };
    info!(secs, "Waiting for the next foreground notification");
    match tokio::time::timeout(Duration::from_secs(secs), listener.next_notification()).await {
        Ok(Some(notification)) => println!("{}", format_last_notification(&notification)),
        _ => eprintln!("No notification received within {}s", secs),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug ntest list-scheduled
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("notification_tester=info,ntest=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let mut cli = Cli::parse();
    let config = load_config(&cli)?;
    let mut session = Session::build(config, cli.answer)?;

    let ack = match cli.command.take().unwrap_or(Commands::Interactive) {
        Commands::Interactive => {
            run_interactive(&mut session).await?;
            return Ok(());
        }
        command => run_command(&mut session, command).await,
    };

    print_ack(&ack);
    if let Some(secs) = cli.wait {
        wait_for_notification(&mut session, secs).await;
    }
    session.tester.shutdown();

    if ack.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
