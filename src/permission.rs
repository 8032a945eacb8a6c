//! 权限管理 - 查询和请求系统通知权限

use crate::platform::PermissionBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// 通知权限状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Undetermined,
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PermissionStatus::Undetermined => "undetermined",
            PermissionStatus::Granted => "granted",
            PermissionStatus::Denied => "denied",
        };
        f.write_str(s)
    }
}

/// 请求的权限能力（平台可能只授予其中一部分，这里不做校验）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionOptions {
    pub alert: bool,
    pub badge: bool,
    pub sound: bool,
    pub announcements: bool,
}

impl PermissionOptions {
    /// 完整能力集
    pub fn all() -> Self {
        Self {
            alert: true,
            badge: true,
            sound: true,
            announcements: true,
        }
    }
}

/// 权限请求结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOutcome {
    pub status: PermissionStatus,
    /// 底层失败时的诊断信息
    pub diagnostic: Option<String>,
}

/// 权限管理器
pub struct PermissionManager {
    backend: Arc<dyn PermissionBackend>,
}

impl PermissionManager {
    pub fn new(backend: Arc<dyn PermissionBackend>) -> Self {
        Self { backend }
    }

    /// 查询当前权限状态（无副作用）
    ///
    /// 查询失败时记录日志并返回 `Undetermined`，不会被提升为 granted。
    pub async fn get_status(&self) -> PermissionStatus {
        match self.backend.get_permissions().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Failed to query permission status");
                PermissionStatus::Undetermined
            }
        }
    }

    /// 请求权限，可能弹出系统提示
    ///
    /// 底层失败时返回 `Denied` 和诊断信息。这个结果不会写入系统，之后的
    /// `get_status()` 仍报告子系统保存的状态（通常是 `Undetermined`）。
    pub async fn request_permission(&self, options: PermissionOptions) -> PermissionOutcome {
        info!(?options, "Requesting notification permissions");
        match self.backend.request_permissions(&options).await {
            Ok(status) => {
                info!(%status, "Permission request finished");
                PermissionOutcome {
                    status,
                    diagnostic: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Error requesting permissions");
                PermissionOutcome {
                    status: PermissionStatus::Denied,
                    diagnostic: Some(format!("Error requesting permissions: {}", e)),
                }
            }
        }
    }
}
