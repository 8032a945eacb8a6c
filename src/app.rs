//! 用户动作边界
//!
//! 每个用户触发的动作都在这里结束：失败被捕获并转换为 `Ack`，
//! 不会继续向外传播，也不会自动重试。

use crate::config::TesterConfig;
use crate::dispatcher::{test_push_content, PushDispatcher};
use crate::error::Result;
use crate::listener::NotificationListener;
use crate::permission::{PermissionManager, PermissionOptions, PermissionStatus};
use crate::platform::{ForegroundPresentation, PlatformServices};
use crate::registrar::{DeviceRegistrar, RegistrationOutcome};
use crate::scheduler::Scheduler;
use crate::types::{NotificationRequest, PushToken, ReceivedNotification};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// 确认或错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckKind {
    Confirmation,
    Error,
}

/// 动作的同步回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub kind: AckKind,
    pub message: String,
}

impl Ack {
    pub fn confirm(message: impl Into<String>) -> Self {
        Self {
            kind: AckKind::Confirmation,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: AckKind::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == AckKind::Error
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub const MSG_PERMISSION_GRANTED: &str =
    "✅ Notification permissions granted! You can now test notifications.";
pub const MSG_PERMISSION_DENIED: &str =
    "❌ Notification permissions denied. Please enable them in your device settings.";
pub const MSG_NO_TOKEN: &str = "No push token available. Register the device first.";

/// 通知测试器
pub struct NotificationTester {
    services: PlatformServices,
    permissions: Arc<PermissionManager>,
    registrar: DeviceRegistrar,
    scheduler: Scheduler,
    dispatcher: PushDispatcher,
    listener: Option<NotificationListener>,
    token: Option<PushToken>,
}

impl NotificationTester {
    pub fn new(config: &TesterConfig, services: PlatformServices) -> Result<Self> {
        let permissions = Arc::new(PermissionManager::new(services.permissions.clone()));
        let registrar = DeviceRegistrar::new(
            services.device.clone(),
            services.channels.clone(),
            permissions.clone(),
            services.tokens.clone(),
            config.project_id.clone(),
        );
        let scheduler = Scheduler::new(services.scheduling.clone());
        let dispatcher = PushDispatcher::new(config)?;

        Ok(Self {
            services,
            permissions,
            registrar,
            scheduler,
            dispatcher,
            listener: None,
            token: None,
        })
    }

    /// 启动：先挂载事件监听，再注册设备
    ///
    /// 监听独立于注册流程，等待权限提示或 token 请求期间到达的通知不会丢失。
    pub async fn start(&mut self) -> Ack {
        if self.listener.is_none() {
            self.listener = Some(NotificationListener::attach(
                self.services.events.as_ref(),
                ForegroundPresentation::default(),
            ));
        }
        self.register().await
    }

    /// 解除事件监听
    pub fn shutdown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.detach();
        }
    }

    pub fn token(&self) -> Option<&PushToken> {
        self.token.as_ref()
    }

    /// 使用外部提供的 token（例如另一台设备的 token）
    pub fn set_token(&mut self, token: Option<PushToken>) {
        self.token = token;
    }

    pub fn last_notification(&self) -> Option<ReceivedNotification> {
        self.listener.as_ref().and_then(|l| l.last_notification())
    }

    pub fn listener_mut(&mut self) -> Option<&mut NotificationListener> {
        self.listener.as_mut()
    }

    pub async fn permission_status(&self) -> PermissionStatus {
        self.permissions.get_status().await
    }

    /// 重新注册，token 被本次结果覆盖
    pub async fn register(&mut self) -> Ack {
        let outcome = self.registrar.register().await;
        let ack = match &outcome {
            RegistrationOutcome::Registered(token) => Ack::confirm(format!("Push token: {}", token)),
            other => Ack::error(other.notice().unwrap_or_default()),
        };
        self.token = outcome.into_token();
        ack
    }

    pub async fn request_permissions(&mut self) -> Ack {
        info!("Manually requesting permissions");
        let outcome = self.permissions.request_permission(PermissionOptions::all()).await;

        if let Some(diagnostic) = outcome.diagnostic {
            return Ack::error(diagnostic);
        }

        if outcome.status.is_granted() {
            // 授权后刷新 token
            let refreshed = self.register().await;
            if refreshed.is_error() {
                return Ack::error(format!("{}\n{}", MSG_PERMISSION_GRANTED, refreshed.message));
            }
            Ack::confirm(MSG_PERMISSION_GRANTED)
        } else {
            Ack::error(MSG_PERMISSION_DENIED)
        }
    }

    pub async fn send_test(&self) -> Ack {
        let Some(token) = &self.token else {
            return Ack::error(MSG_NO_TOKEN);
        };

        match self.dispatcher.send_now(token, &test_push_content()).await {
            Ok(()) => Ack::confirm(format!("Test notification sent to {}", token)),
            Err(e) => {
                error!(error = %e, "Error sending push notification");
                Ack::error(format!("Error sending push notification: {}", e))
            }
        }
    }

    pub async fn schedule_test(&self) -> Ack {
        match self.scheduler.schedule_test_notification().await {
            Ok(_) => Ack::confirm("Notification scheduled for 5 seconds from now!"),
            Err(e) => Ack::error(format!("Error scheduling notification: {}", e)),
        }
    }

    pub async fn schedule_reminder(&self) -> Ack {
        match self.scheduler.schedule_reminder().await {
            Ok(_) => Ack::confirm("Reminder scheduled for 10 seconds from now!"),
            Err(e) => Ack::error(format!("Error scheduling reminder: {}", e)),
        }
    }

    pub async fn send_custom(&self) -> Ack {
        match self.scheduler.schedule_custom().await {
            Ok(_) => Ack::confirm("Custom notification scheduled!"),
            Err(e) => Ack::error(format!("Error sending custom notification: {}", e)),
        }
    }

    /// 列出待投递通知，详细内容写入日志
    pub async fn list_scheduled(&self) -> (Ack, Vec<NotificationRequest>) {
        match self.scheduler.list_scheduled().await {
            Ok(scheduled) => {
                for request in &scheduled {
                    info!(id = %request.identifier, title = %request.content.title, trigger = ?request.trigger, "Scheduled notification");
                }
                let ack = Ack::confirm(format!(
                    "Found {} scheduled notifications. Check console for details.",
                    scheduled.len()
                ));
                (ack, scheduled)
            }
            Err(e) => {
                error!(error = %e, "Error getting scheduled notifications");
                (Ack::error(format!("Error getting scheduled notifications: {}", e)), Vec::new())
            }
        }
    }

    pub async fn clear_all(&self) -> Ack {
        match self.scheduler.cancel_all().await {
            Ok(()) => Ack::confirm("All scheduled notifications cleared!"),
            Err(e) => {
                error!(error = %e, "Error clearing scheduled notifications");
                Ack::error(format!("Error clearing scheduled notifications: {}", e))
            }
        }
    }
}

impl Drop for NotificationTester {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceProfile;
    use crate::platform::{PermissionPrompt, ScriptedPrompt, SimulatedPlatform};
    use crate::types::NotificationContent;
    use async_trait::async_trait;
    use std::time::Duration;

    /// 用户迟迟不回答的权限提示
    struct SlowPrompt(Duration);

    #[async_trait]
    impl PermissionPrompt for SlowPrompt {
        async fn ask(&self, _options: &PermissionOptions) -> Result<bool> {
            tokio::time::sleep(self.0).await;
            Ok(true)
        }
    }

    fn tester(answers: Vec<bool>) -> (NotificationTester, SimulatedPlatform) {
        let config = TesterConfig {
            project_id: Some("proj".to_string()),
            ..TesterConfig::default()
        };
        let platform = SimulatedPlatform::new(DeviceProfile::default(), Arc::new(ScriptedPrompt::new(answers, false)));
        let tester = NotificationTester::new(&config, PlatformServices::simulated(platform.clone())).unwrap();
        (tester, platform)
    }

    #[tokio::test]
    async fn test_start_registers_and_attaches() {
        let (mut tester, platform) = tester(vec![true]);
        let ack = tester.start().await;

        assert!(!ack.is_error());
        assert!(tester.token().is_some());
        assert_eq!(platform.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_delivery_during_permission_prompt_is_kept() {
        let config = TesterConfig {
            project_id: Some("proj".to_string()),
            ..TesterConfig::default()
        };
        let platform = SimulatedPlatform::new(
            DeviceProfile::default(),
            Arc::new(SlowPrompt(Duration::from_millis(300))),
        );
        let mut tester = NotificationTester::new(&config, PlatformServices::simulated(platform.clone())).unwrap();

        let (ack, _) = tokio::join!(tester.start(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            platform.deliver_now(NotificationContent::new("while prompting", "body"));
        });
        assert!(!ack.is_error(), "{}", ack);

        let listener = tester.listener_mut().unwrap();
        let received = tokio::time::timeout(Duration::from_secs(2), listener.next_notification())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.request.content.title, "while prompting");
    }

    #[tokio::test]
    async fn test_send_test_without_token() {
        let (tester, _) = tester(vec![]);
        let ack = tester.send_test().await;
        assert_eq!(ack, Ack::error(MSG_NO_TOKEN));
    }

    #[tokio::test]
    async fn test_request_permissions_denied() {
        let (mut tester, _) = tester(vec![false]);
        let ack = tester.request_permissions().await;

        assert_eq!(ack, Ack::error(MSG_PERMISSION_DENIED));
        assert!(tester.token().is_none());
    }

    #[tokio::test]
    async fn test_request_permissions_granted_refreshes_token() {
        let (mut tester, _) = tester(vec![true]);
        let ack = tester.request_permissions().await;

        assert_eq!(ack, Ack::confirm(MSG_PERMISSION_GRANTED));
        assert!(tester.token().is_some());
    }

    #[tokio::test]
    async fn test_list_and_clear_acks() {
        let (tester, _) = tester(vec![]);
        tester.schedule_reminder().await;

        let (ack, scheduled) = tester.list_scheduled().await;
        assert_eq!(ack.message, "Found 1 scheduled notifications. Check console for details.");
        assert_eq!(scheduled.len(), 1);

        assert_eq!(tester.clear_all().await, Ack::confirm("All scheduled notifications cleared!"));
    }
}
