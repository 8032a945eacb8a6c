//! 配置加载
//!
//! 读取优先级：
//! 1. 配置文件 `~/.config/notification-tester/config.json`
//! 2. 环境变量 `NTEST_PROJECT_ID`、`NTEST_PUSH_ENDPOINT` 覆盖对应字段
//! 3. 默认值

use crate::error::{NotifyError, Result};
use crate::platform::PlatformFamily;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 远程推送投递端点
pub const DEFAULT_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

/// 远程 token 端点
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://exp.host/--/api/v2/push/getExpoPushToken";

/// 默认 HTTP 超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// token 来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    /// 由模拟平台本地生成
    #[default]
    Simulated,
    /// 请求远程 token 服务
    Remote,
}

/// 设备信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub device_id: String,
    /// 是否为物理设备
    pub physical: bool,
    pub family: PlatformFamily,
    /// 原生推送 token（仅 remote 模式需要）
    pub device_token: Option<String>,
    pub app_id: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            device_id: "ntest-device".to_string(),
            physical: true,
            family: PlatformFamily::Android,
            device_token: None,
            app_id: "com.example.notificationtester".to_string(),
        }
    }
}

/// 测试器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    /// 部署项目 ID（token 绑定）
    pub project_id: Option<String>,
    pub push_endpoint: String,
    pub token_endpoint: String,
    pub timeout_secs: u64,
    pub token_source: TokenSource,
    pub device: DeviceProfile,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            push_endpoint: DEFAULT_PUSH_ENDPOINT.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            token_source: TokenSource::default(),
            device: DeviceProfile::default(),
        }
    }
}

impl TesterConfig {
    /// 默认配置文件路径
    pub fn path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("notification-tester")
            .join("config.json")
    }

    /// 从默认位置和环境变量加载
    pub fn auto_load() -> Result<Self> {
        let mut config = Self::load_from(&Self::path())?;
        config.apply_env();
        Ok(config)
    }

    /// 从指定文件加载；文件不存在时使用默认值
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| NotifyError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| NotifyError::Config(format!("invalid {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(project_id) = std::env::var("NTEST_PROJECT_ID") {
            if !project_id.is_empty() {
                self.project_id = Some(project_id);
            }
        }
        if let Ok(endpoint) = std::env::var("NTEST_PUSH_ENDPOINT") {
            if !endpoint.is_empty() {
                self.push_endpoint = endpoint;
            }
        }
    }

    /// 获取 token 前必须配置 project_id
    pub fn require_project_id(&self) -> Result<&str> {
        self.project_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| NotifyError::Config("project_id is required to obtain a push token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = TesterConfig::default();
        assert_eq!(config.push_endpoint, DEFAULT_PUSH_ENDPOINT);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.token_source, TokenSource::Simulated);
        assert!(config.device.physical);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = TesterConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, TesterConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"project_id": "proj-1", "device": {"physical": false, "family": "ios"}}"#,
        )
        .unwrap();

        let config = TesterConfig::load_from(&path).unwrap();
        assert_eq!(config.project_id.as_deref(), Some("proj-1"));
        assert!(!config.device.physical);
        assert_eq!(config.device.family, PlatformFamily::Ios);
        assert_eq!(config.device.device_id, "ntest-device");
        assert_eq!(config.push_endpoint, DEFAULT_PUSH_ENDPOINT);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let err = TesterConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)));
    }

    #[test]
    fn test_require_project_id() {
        let mut config = TesterConfig::default();
        assert!(config.require_project_id().is_err());

        config.project_id = Some("proj-1".to_string());
        assert_eq!(config.require_project_id().unwrap(), "proj-1");
    }
}
