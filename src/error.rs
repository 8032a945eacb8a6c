//! 错误类型
//!
//! 所有用户动作在 `NotificationTester` 边界处被捕获并转换为 `Ack`，
//! 不会继续向外传播。

use thiserror::Error;

/// 通知测试器错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    /// 用户拒绝了通知权限（或之前已拒绝）
    #[error("notification permission not granted")]
    PermissionDenied,

    /// 非物理设备（模拟器）
    #[error("physical device required")]
    DeviceUnsupported,

    /// 网络错误（获取 token、send-now）
    #[error("transport failure: {0}")]
    Transport(String),

    /// 通知子系统错误（例如无效的 trigger）
    #[error("notification subsystem failure: {0}")]
    Subsystem(String),

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            NotifyError::Subsystem("bad trigger".to_string()).to_string(),
            "notification subsystem failure: bad trigger"
        );
        assert_eq!(NotifyError::DeviceUnsupported.to_string(), "physical device required");
    }
}
