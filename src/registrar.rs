//! 设备注册 - 权限检查后获取推送 token
//!
//! 单次 `register()` 内部严格按顺序执行：
//! 1. 设备检查（非物理设备直接拒绝）
//! 2. 需要渠道的平台先创建 "default" 渠道
//! 3. 查询权限，未授权时请求一次
//! 4. 仍未授权则放弃
//! 5. 获取绑定项目的推送 token
//!
//! 每次调用都会重新检查权限，不缓存上一次的结果。

use crate::error::NotifyError;
use crate::permission::{PermissionManager, PermissionOptions};
use crate::platform::{ChannelBackend, DeviceInfo, PushTokenService};
use crate::types::{DeliveryChannel, PushToken};
use std::sync::Arc;
use tracing::{info, warn};

pub const MSG_PHYSICAL_DEVICE_REQUIRED: &str = "Must use physical device for Push Notifications";
pub const MSG_PERMISSION_REQUIRED: &str =
    "Notification permissions are required to test notifications. Please enable them in your device settings.";
pub const MSG_TOKEN_UNAVAILABLE: &str =
    "Error getting push token. Make sure you have an internet connection.";

/// 注册结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered(PushToken),
    /// 非物理设备
    DeviceUnsupported,
    /// 投递渠道创建失败
    ChannelSetupFailed(String),
    PermissionDenied,
    /// token 请求失败，可重新调用 `register()`
    TokenUnavailable(String),
}

impl RegistrationOutcome {
    pub fn token(&self) -> Option<&PushToken> {
        match self {
            RegistrationOutcome::Registered(token) => Some(token),
            _ => None,
        }
    }

    pub fn into_token(self) -> Option<PushToken> {
        match self {
            RegistrationOutcome::Registered(token) => Some(token),
            _ => None,
        }
    }

    /// 面向用户的提示
    pub fn notice(&self) -> Option<String> {
        match self {
            RegistrationOutcome::Registered(_) => None,
            RegistrationOutcome::DeviceUnsupported => Some(MSG_PHYSICAL_DEVICE_REQUIRED.to_string()),
            RegistrationOutcome::ChannelSetupFailed(cause) => {
                Some(format!("Error creating notification channel: {}", cause))
            }
            RegistrationOutcome::PermissionDenied => Some(MSG_PERMISSION_REQUIRED.to_string()),
            RegistrationOutcome::TokenUnavailable(_) => Some(MSG_TOKEN_UNAVAILABLE.to_string()),
        }
    }

    /// 对应的错误分类
    pub fn error(&self) -> Option<NotifyError> {
        match self {
            RegistrationOutcome::Registered(_) => None,
            RegistrationOutcome::DeviceUnsupported => Some(NotifyError::DeviceUnsupported),
            RegistrationOutcome::ChannelSetupFailed(cause) => Some(NotifyError::Subsystem(cause.clone())),
            RegistrationOutcome::PermissionDenied => Some(NotifyError::PermissionDenied),
            RegistrationOutcome::TokenUnavailable(cause) => Some(NotifyError::Transport(cause.clone())),
        }
    }
}

/// 设备注册器
pub struct DeviceRegistrar {
    device: Arc<dyn DeviceInfo>,
    channels: Arc<dyn ChannelBackend>,
    permissions: Arc<PermissionManager>,
    tokens: Arc<dyn PushTokenService>,
    project_id: Option<String>,
}

impl DeviceRegistrar {
    pub fn new(
        device: Arc<dyn DeviceInfo>,
        channels: Arc<dyn ChannelBackend>,
        permissions: Arc<PermissionManager>,
        tokens: Arc<dyn PushTokenService>,
        project_id: Option<String>,
    ) -> Self {
        Self {
            device,
            channels,
            permissions,
            tokens,
            project_id,
        }
    }

    pub async fn register(&self) -> RegistrationOutcome {
        if !self.device.is_physical_device() {
            warn!("Push registration refused: not a physical device");
            return RegistrationOutcome::DeviceUnsupported;
        }

        if self.channels.requires_delivery_channels() {
            let channel = DeliveryChannel::default_channel();
            if let Err(e) = self.channels.set_channel(&channel).await {
                warn!(channel = %channel.name, error = %e, "Failed to create delivery channel");
                return RegistrationOutcome::ChannelSetupFailed(e.to_string());
            }
            info!(channel = %channel.name, "Delivery channel ready");
        }

        let existing = self.permissions.get_status().await;
        info!(status = %existing, "Existing permission status");

        let status = if existing.is_granted() {
            existing
        } else {
            let outcome = self.permissions.request_permission(PermissionOptions::all()).await;
            if let Some(diagnostic) = &outcome.diagnostic {
                warn!(%diagnostic, "Permission request failed");
            }
            outcome.status
        };

        if !status.is_granted() {
            warn!(%status, "Push registration aborted: permission not granted");
            return RegistrationOutcome::PermissionDenied;
        }

        let Some(project_id) = self.project_id.as_deref().filter(|id| !id.is_empty()) else {
            warn!("Push registration aborted: no project_id configured");
            return RegistrationOutcome::TokenUnavailable("project_id is not configured".to_string());
        };

        info!(project_id, "Permissions granted, getting push token");
        match self.tokens.get_push_token(project_id).await {
            Ok(token) => {
                info!(%token, "Push token obtained");
                RegistrationOutcome::Registered(token)
            }
            Err(e) => {
                warn!(error = %e, "Error getting push token");
                RegistrationOutcome::TokenUnavailable(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceProfile;
    use crate::permission::PermissionStatus;
    use crate::error::Result;
    use crate::permission::PermissionOptions;
    use crate::platform::{PermissionBackend, PlatformFamily, ScriptedPrompt, SimulatedPlatform};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingChannels;

    #[async_trait]
    impl ChannelBackend for FailingChannels {
        fn requires_delivery_channels(&self) -> bool {
            true
        }

        async fn set_channel(&self, _channel: &DeliveryChannel) -> Result<()> {
            Err(NotifyError::Subsystem("channel service unavailable".to_string()))
        }
    }

    /// 记录权限子系统被调用的次数
    struct CountingPermissions {
        inner: SimulatedPlatform,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PermissionBackend for CountingPermissions {
        async fn get_permissions(&self) -> Result<PermissionStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_permissions().await
        }

        async fn request_permissions(&self, options: &PermissionOptions) -> Result<PermissionStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.request_permissions(options).await
        }
    }

    fn registrar(platform: &SimulatedPlatform, project_id: Option<&str>) -> DeviceRegistrar {
        let platform = Arc::new(platform.clone());
        DeviceRegistrar::new(
            platform.clone(),
            platform.clone(),
            Arc::new(PermissionManager::new(platform.clone())),
            platform,
            project_id.map(str::to_string),
        )
    }

    fn profile(physical: bool, family: PlatformFamily) -> DeviceProfile {
        DeviceProfile {
            physical,
            family,
            ..DeviceProfile::default()
        }
    }

    #[tokio::test]
    async fn test_android_creates_default_channel() {
        let platform = SimulatedPlatform::new(
            profile(true, PlatformFamily::Android),
            Arc::new(ScriptedPrompt::always(true)),
        );
        let outcome = registrar(&platform, Some("proj")).register().await;

        assert!(outcome.token().is_some());
        assert_eq!(platform.channel("default"), Some(DeliveryChannel::default_channel()));
    }

    #[tokio::test]
    async fn test_ios_skips_channel() {
        let platform = SimulatedPlatform::new(
            profile(true, PlatformFamily::Ios),
            Arc::new(ScriptedPrompt::always(true)),
        );
        let outcome = registrar(&platform, Some("proj")).register().await;

        assert!(outcome.token().is_some());
        assert!(platform.channel("default").is_none());
    }

    #[tokio::test]
    async fn test_channel_failure_stops_registration() {
        let prompt = Arc::new(ScriptedPrompt::always(true));
        let platform = SimulatedPlatform::new(profile(true, PlatformFamily::Android), prompt.clone());
        let permissions = Arc::new(CountingPermissions {
            inner: platform.clone(),
            calls: AtomicUsize::new(0),
        });
        let registrar = DeviceRegistrar::new(
            Arc::new(platform.clone()),
            Arc::new(FailingChannels),
            Arc::new(PermissionManager::new(permissions.clone())),
            Arc::new(platform.clone()),
            Some("proj".to_string()),
        );

        let outcome = registrar.register().await;

        assert_eq!(
            outcome,
            RegistrationOutcome::ChannelSetupFailed("notification subsystem failure: channel service unavailable".to_string())
        );
        assert_eq!(
            outcome.notice().as_deref(),
            Some("Error creating notification channel: notification subsystem failure: channel service unavailable")
        );
        assert!(matches!(outcome.error(), Some(NotifyError::Subsystem(_))));
        assert_eq!(permissions.calls.load(Ordering::SeqCst), 0);
        assert_eq!(prompt.asked(), 0);
        assert_eq!(platform.token_requests(), 0);
    }

    #[tokio::test]
    async fn test_already_granted_does_not_prompt() {
        let prompt = Arc::new(ScriptedPrompt::always(false));
        let platform = SimulatedPlatform::new(DeviceProfile::default(), prompt.clone());
        platform.set_permission(PermissionStatus::Granted);

        let outcome = registrar(&platform, Some("proj")).register().await;

        assert!(outcome.token().is_some());
        assert_eq!(prompt.asked(), 0);
    }

    #[tokio::test]
    async fn test_missing_project_id() {
        let platform = SimulatedPlatform::new(DeviceProfile::default(), Arc::new(ScriptedPrompt::always(true)));
        let outcome = registrar(&platform, None).register().await;

        assert!(matches!(outcome, RegistrationOutcome::TokenUnavailable(_)));
        assert_eq!(platform.token_requests(), 0);
    }

    #[tokio::test]
    async fn test_offline_token_fetch_is_non_fatal() {
        let platform = SimulatedPlatform::new(DeviceProfile::default(), Arc::new(ScriptedPrompt::always(true)));
        platform.set_offline(true);
        let registrar = registrar(&platform, Some("proj"));

        let outcome = registrar.register().await;
        assert!(matches!(outcome, RegistrationOutcome::TokenUnavailable(_)));
        assert_eq!(outcome.notice().as_deref(), Some(MSG_TOKEN_UNAVAILABLE));

        // 恢复网络后重新注册
        platform.set_offline(false);
        assert!(registrar.register().await.token().is_some());
    }

    #[test]
    fn test_outcome_error_mapping() {
        assert_eq!(RegistrationOutcome::PermissionDenied.error(), Some(NotifyError::PermissionDenied));
        assert_eq!(
            RegistrationOutcome::Registered(PushToken::new("t")).error(),
            None
        );
    }
}
