//! 根据配置组装平台服务和测试器

use super::prompt::TerminalPrompt;
use crate::app::{Ack, NotificationTester};
use crate::config::{TesterConfig, TokenSource};
use crate::platform::{
    ExpoTokenService, PendingStore, PermissionPrompt, PlatformServices, ScriptedPrompt, SimulatedPlatform,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// 模拟 token 默认使用的项目 ID
pub const SIMULATED_PROJECT_ID: &str = "local-project";

/// 权限提示的回答方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PromptAnswer {
    /// 在终端询问
    #[default]
    Ask,
    /// 自动允许
    Allow,
    /// 自动拒绝
    Deny,
}

impl PromptAnswer {
    fn prompt(self) -> Arc<dyn PermissionPrompt> {
        match self {
            PromptAnswer::Ask => Arc::new(TerminalPrompt),
            PromptAnswer::Allow => Arc::new(ScriptedPrompt::always(true)),
            PromptAnswer::Deny => Arc::new(ScriptedPrompt::always(false)),
        }
    }
}

/// 一次 CLI 运行的会话
///
/// 待投递集合保存在 `~/.config/notification-tester/scheduled.json`，
/// 因此分开执行的子命令看到的是同一个集合。
pub struct Session {
    pub tester: NotificationTester,
    pub platform: SimulatedPlatform,
}

impl Session {
    pub fn build(config: TesterConfig, answer: PromptAnswer) -> Result<Self> {
        Self::build_with_store(config, answer, PendingStore::new(PendingStore::default_path()))
    }

    pub fn build_with_store(mut config: TesterConfig, answer: PromptAnswer, store: PendingStore) -> Result<Self> {
        let platform = SimulatedPlatform::with_store(config.device.clone(), answer.prompt(), store)
            .context("Failed to load scheduled notifications")?;
        let mut services = PlatformServices::simulated(platform.clone());

        match config.token_source {
            TokenSource::Simulated => {
                if config.project_id.is_none() {
                    config.project_id = Some(SIMULATED_PROJECT_ID.to_string());
                }
            }
            TokenSource::Remote => {
                config.require_project_id()?;
                let tokens = ExpoTokenService::new(&config).context("Failed to create token service")?;
                services = services.with_token_service(Arc::new(tokens));
            }
        }

        info!(
            family = ?config.device.family,
            physical = config.device.physical,
            token_source = ?config.token_source,
            "Notification tester session ready"
        );

        let tester = NotificationTester::new(&config, services).context("Failed to create notification tester")?;
        Ok(Self { tester, platform })
    }

    /// 启动测试器，然后投递或恢复之前留下的待投递通知
    pub async fn start(&mut self) -> Ack {
        let ack = self.tester.start().await;
        let delivered = self.platform.resume_pending();
        if delivered > 0 {
            info!(delivered, "Delivered notifications that came due while no session was running");
        }
        ack
    }
}
