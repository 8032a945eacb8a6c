//! 远程 token 服务客户端
//!
//! 用原生推送 token 向 token 端点换取绑定项目的推送 token。

use super::PushTokenService;
use crate::config::{DeviceProfile, TesterConfig};
use crate::error::{NotifyError, Result};
use crate::types::PushToken;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// token 请求载荷
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest<'a> {
    #[serde(rename = "type")]
    pub token_type: &'a str,
    pub device_id: &'a str,
    pub development: bool,
    pub app_id: &'a str,
    pub device_token: &'a str,
    pub project_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    data: Option<TokenData>,
    #[serde(default)]
    errors: Vec<TokenError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenData {
    expo_push_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    message: String,
}

/// 远程 token 服务
#[derive(Debug)]
pub struct ExpoTokenService {
    client: Client,
    endpoint: String,
    device: DeviceProfile,
}

impl ExpoTokenService {
    pub fn new(config: &TesterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.token_endpoint.clone(),
            device: config.device.clone(),
        })
    }
}

#[async_trait]
impl PushTokenService for ExpoTokenService {
    async fn get_push_token(&self, project_id: &str) -> Result<PushToken> {
        let device_token = self.device.device_token.as_deref().ok_or_else(|| {
            NotifyError::Config("device.device_token is required for remote token requests".to_string())
        })?;

        let payload = TokenRequest {
            token_type: self.device.family.native_token_type(),
            device_id: &self.device.device_id,
            development: cfg!(debug_assertions),
            app_id: &self.device.app_id,
            device_token,
            project_id,
        };
        debug!(endpoint = %self.endpoint, ?payload, "Requesting push token");

        let response: TokenResponse = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        parse_token_response(response).map(|token| {
            info!(%token, "Obtained push token from remote service");
            token
        })
    }
}

fn parse_token_response(response: TokenResponse) -> Result<PushToken> {
    if let Some(data) = response.data {
        return Ok(PushToken::new(data.expo_push_token));
    }
    let message = response
        .errors
        .into_iter()
        .map(|e| e.message)
        .collect::<Vec<_>>()
        .join("; ");
    Err(NotifyError::Transport(if message.is_empty() {
        "token response contained no token".to_string()
    } else {
        message
    }))
}
