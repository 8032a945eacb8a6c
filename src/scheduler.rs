//! 调度器 - 创建、查询和清除待投递的本地通知
//!
//! 待投递集合只存在于通知子系统中，这里不做本地缓存，每次查询都重新获取。
//! 不在本地校验 trigger，无效 trigger 由子系统拒绝。

use crate::error::Result;
use crate::platform::SchedulingBackend;
use crate::types::{NotificationContent, NotificationRequest, ScheduleId, Trigger};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 内置预设
pub mod presets {
    use crate::types::{NotificationContent, Trigger, DEFAULT_CHANNEL};

    /// 测试通知延迟（秒）
    pub const TEST_NOTIFICATION_DELAY_SECS: i64 = 5;
    /// 提醒延迟（秒）
    pub const REMINDER_DELAY_SECS: i64 = 10;
    /// 自定义通知间隔（秒）
    pub const CUSTOM_INTERVAL_SECS: u64 = 1;

    /// 5 秒后的测试通知
    pub fn test_notification() -> (NotificationContent, Trigger) {
        let content = NotificationContent::new(
            "Scheduled Notification! 📅",
            "This notification was scheduled 5 seconds ago",
        )
        .with_data("data", "goes here");
        (content, Trigger::in_seconds(TEST_NOTIFICATION_DELAY_SECS))
    }

    /// 10 秒后的提醒
    pub fn reminder() -> (NotificationContent, Trigger) {
        let content = NotificationContent::new("Reminder! ⏰", "This is your scheduled reminder")
            .with_data("data", "reminder data");
        (content, Trigger::in_seconds(REMINDER_DELAY_SECS))
    }

    /// 绑定 default 渠道、1 秒后触发的自定义通知
    pub fn custom_notification() -> (NotificationContent, Trigger) {
        let content = NotificationContent::new(
            "Custom Notification 🎯",
            "This is a custom notification with special formatting!",
        )
        .with_data("custom", true)
        .with_sound("default");
        (
            content,
            Trigger::interval_on_channel(CUSTOM_INTERVAL_SECS, DEFAULT_CHANNEL),
        )
    }
}

/// 通知调度器
pub struct Scheduler {
    backend: Arc<dyn SchedulingBackend>,
}

impl Scheduler {
    pub fn new(backend: Arc<dyn SchedulingBackend>) -> Self {
        Self { backend }
    }

    pub async fn schedule(&self, content: NotificationContent, trigger: Trigger) -> Result<ScheduleId> {
        debug!(?trigger, title = %content.title, "Scheduling notification");
        match self.backend.schedule(&content, &trigger).await {
            Ok(id) => {
                info!(id = %id, title = %content.title, "Notification scheduled");
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, "Failed to schedule notification");
                Err(e)
            }
        }
    }

    /// 调用时刻的快照
    pub async fn list_scheduled(&self) -> Result<Vec<NotificationRequest>> {
        let scheduled = self.backend.all_scheduled().await?;
        debug!(count = scheduled.len(), "Fetched scheduled notifications");
        Ok(scheduled)
    }

    pub async fn cancel_all(&self) -> Result<()> {
        self.backend.cancel_all().await?;
        info!("All scheduled notifications cleared");
        Ok(())
    }

    pub async fn schedule_test_notification(&self) -> Result<ScheduleId> {
        let (content, trigger) = presets::test_notification();
        self.schedule(content, trigger).await
    }

    pub async fn schedule_reminder(&self) -> Result<ScheduleId> {
        let (content, trigger) = presets::reminder();
        self.schedule(content, trigger).await
    }

    pub async fn schedule_custom(&self) -> Result<ScheduleId> {
        let (content, trigger) = presets::custom_notification();
        self.schedule(content, trigger).await
    }
}
