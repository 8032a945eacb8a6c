//! 通知相关的核心数据类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 推送 token（设备 + 项目唯一）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PushToken(String);

impl PushToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PushToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 调度标识（由通知子系统分配）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(String);

impl ScheduleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 通知内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    /// 任意键值 payload
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    /// 平台声音提示
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

impl NotificationContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: serde_json::Map::new(),
            sound: None,
        }
    }

    /// 添加 payload 字段
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }
}

/// 触发条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// 绝对时间
    Date { at: DateTime<Utc> },
    /// 相对秒数，可绑定投递渠道
    TimeInterval {
        seconds: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<String>,
    },
}

impl Trigger {
    pub fn at(at: DateTime<Utc>) -> Self {
        Trigger::Date { at }
    }

    /// 从现在起 `seconds` 秒后的绝对时间
    pub fn in_seconds(seconds: i64) -> Self {
        Trigger::Date {
            at: Utc::now() + chrono::Duration::seconds(seconds),
        }
    }

    pub fn interval(seconds: u64) -> Self {
        Trigger::TimeInterval {
            seconds,
            channel_id: None,
        }
    }

    pub fn interval_on_channel(seconds: u64, channel_id: impl Into<String>) -> Self {
        Trigger::TimeInterval {
            seconds,
            channel_id: Some(channel_id.into()),
        }
    }
}

/// 已调度的通知请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub identifier: ScheduleId,
    pub content: NotificationContent,
    pub trigger: Trigger,
}

/// 前台投递事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedNotification {
    pub request: NotificationRequest,
    pub received_at: DateTime<Utc>,
}

/// 默认点击动作
pub const DEFAULT_ACTION_IDENTIFIER: &str = "default";

/// 用户交互（点击）事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub notification: ReceivedNotification,
    pub action_identifier: String,
}

/// 投递渠道重要性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Min,
    Low,
    Default,
    High,
    Max,
}

/// 投递渠道（仅部分平台需要）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryChannel {
    pub name: String,
    pub importance: Importance,
    pub vibration_pattern: Vec<u64>,
    pub light_color: String,
}

/// 默认渠道名
pub const DEFAULT_CHANNEL: &str = "default";

impl DeliveryChannel {
    /// "default" 渠道
    pub fn default_channel() -> Self {
        Self {
            name: DEFAULT_CHANNEL.to_string(),
            importance: Importance::Max,
            vibration_pattern: vec![0, 250, 250, 250],
            light_color: "#FF231F7C".to_string(),
        }
    }
}
