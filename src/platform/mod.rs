//! 平台抽象层 - 操作系统通知子系统的 trait 边界
//!
//! 核心模块只依赖这些 trait：
//! - `PermissionBackend`：系统权限
//! - `PushTokenService`：推送 token 服务
//! - `SchedulingBackend`：本地调度子系统
//! - `ChannelBackend`：投递渠道（仅部分平台需要）
//! - `DeviceInfo`：设备信息
//! - `NotificationEvents`：前台投递和用户交互事件流

pub mod expo;
pub mod simulated;
pub mod store;

use crate::error::Result;
use crate::permission::{PermissionOptions, PermissionStatus};
use crate::types::{
    DeliveryChannel, NotificationContent, NotificationRequest, NotificationResponse, PushToken,
    ReceivedNotification, ScheduleId, Trigger,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

pub use expo::ExpoTokenService;
pub use simulated::{PermissionPrompt, ScriptedPrompt, SimulatedPlatform};
pub use store::PendingStore;

/// 系统权限子系统
#[async_trait]
pub trait PermissionBackend: Send + Sync {
    async fn get_permissions(&self) -> Result<PermissionStatus>;

    /// 若状态未确定则弹出系统提示
    async fn request_permissions(&self, options: &PermissionOptions) -> Result<PermissionStatus>;
}

/// 推送 token 服务
#[async_trait]
pub trait PushTokenService: Send + Sync {
    async fn get_push_token(&self, project_id: &str) -> Result<PushToken>;
}

/// 调度子系统（待投递集合的唯一数据源）
#[async_trait]
pub trait SchedulingBackend: Send + Sync {
    async fn schedule(&self, content: &NotificationContent, trigger: &Trigger) -> Result<ScheduleId>;

    async fn all_scheduled(&self) -> Result<Vec<NotificationRequest>>;

    async fn cancel_all(&self) -> Result<()>;
}

/// 投递渠道子系统
#[async_trait]
pub trait ChannelBackend: Send + Sync {
    /// 该平台是否要求先创建渠道
    fn requires_delivery_channels(&self) -> bool;

    /// 创建或更新渠道（幂等）
    async fn set_channel(&self, channel: &DeliveryChannel) -> Result<()>;
}

pub trait DeviceInfo: Send + Sync {
    fn is_physical_device(&self) -> bool;
}

/// 前台展示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundPresentation {
    pub show_banner: bool,
    pub show_list: bool,
    pub play_sound: bool,
    pub set_badge: bool,
}

impl Default for ForegroundPresentation {
    fn default() -> Self {
        Self {
            show_banner: true,
            show_list: true,
            play_sound: true,
            set_badge: false,
        }
    }
}

/// 通知事件源
pub trait NotificationEvents: Send + Sync {
    fn subscribe_received(&self) -> broadcast::Receiver<ReceivedNotification>;

    fn subscribe_responses(&self) -> broadcast::Receiver<NotificationResponse>;

    fn set_foreground_presentation(&self, presentation: ForegroundPresentation);
}

/// 核心模块使用的全部平台服务
#[derive(Clone)]
pub struct PlatformServices {
    pub permissions: Arc<dyn PermissionBackend>,
    pub tokens: Arc<dyn PushTokenService>,
    pub scheduling: Arc<dyn SchedulingBackend>,
    pub channels: Arc<dyn ChannelBackend>,
    pub device: Arc<dyn DeviceInfo>,
    pub events: Arc<dyn NotificationEvents>,
}

impl PlatformServices {
    /// 全部由模拟平台提供
    pub fn simulated(platform: SimulatedPlatform) -> Self {
        let platform = Arc::new(platform);
        Self {
            permissions: platform.clone(),
            tokens: platform.clone(),
            scheduling: platform.clone(),
            channels: platform.clone(),
            device: platform.clone(),
            events: platform,
        }
    }

    /// 替换 token 服务
    pub fn with_token_service(mut self, tokens: Arc<dyn PushTokenService>) -> Self {
        self.tokens = tokens;
        self
    }
}

/// 平台系列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Android,
    Ios,
    Desktop,
}

impl PlatformFamily {
    pub fn requires_delivery_channels(self) -> bool {
        matches!(self, PlatformFamily::Android)
    }

    /// 原生推送服务类型
    pub fn native_token_type(self) -> &'static str {
        match self {
            PlatformFamily::Android => "fcm",
            PlatformFamily::Ios | PlatformFamily::Desktop => "apns",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_capability() {
        assert!(PlatformFamily::Android.requires_delivery_channels());
        assert!(!PlatformFamily::Ios.requires_delivery_channels());
        assert!(!PlatformFamily::Desktop.requires_delivery_channels());
    }

    #[test]
    fn test_default_presentation() {
        let p = ForegroundPresentation::default();
        assert!(p.show_banner && p.show_list && p.play_sound);
        assert!(!p.set_badge);
    }
}
