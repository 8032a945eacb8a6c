//! 推送分发 - 立即向远程投递端点发送一条推送
//!
//! 单次 POST，不重试，不解析响应体。传输层错误返回给调用方，
//! 由动作边界转换为用户可见的提示。

use crate::config::TesterConfig;
use crate::error::{NotifyError, Result};
use crate::types::{NotificationContent, PushToken};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// 默认声音
pub const DEFAULT_SOUND: &str = "default";

/// 推送消息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub sound: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl PushMessage {
    pub fn new(token: &PushToken, content: &NotificationContent) -> Self {
        Self {
            to: token.as_str().to_string(),
            sound: content.sound.clone().unwrap_or_else(|| DEFAULT_SOUND.to_string()),
            title: content.title.clone(),
            body: content.body.clone(),
            data: content.data.clone(),
        }
    }
}

/// "Send Test Notification" 的内容
pub fn test_push_content() -> NotificationContent {
    NotificationContent::new("Test Notification", "This is a test notification from your app!")
        .with_data("someData", "goes here")
}

/// 推送分发器
#[derive(Debug)]
pub struct PushDispatcher {
    client: Client,
    endpoint: String,
}

impl PushDispatcher {
    pub fn new(config: &TesterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.push_endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn send_now(&self, token: &PushToken, content: &NotificationContent) -> Result<()> {
        let message = PushMessage::new(token, content);
        debug!(endpoint = %self.endpoint, ?message, "Sending push message");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .header("Accept-Encoding", "gzip, deflate")
            .header("Content-Type", "application/json")
            .json(&message)
            .send()
            .await?;

        info!(to = %message.to, status = %response.status(), "Push message sent");
        Ok(())
    }
}
