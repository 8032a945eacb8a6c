//! 待投递集合存储 - 本地 JSON 文件读写
//!
//! 模拟平台用它让待投递集合跨进程保留：一次 `ntest schedule-test`
//! 写入的条目可以被之后的 `ntest list-scheduled` 或 `ntest clear-all` 看到。

use crate::error::{NotifyError, Result};
use crate::types::NotificationRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 待投递条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub request: NotificationRequest,
    /// 到期时间
    pub due_at: DateTime<Utc>,
}

/// 文件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendingSnapshot {
    /// 下一个分配的调度序号
    pub next_id: u64,
    pub entries: Vec<PendingEntry>,
}

impl Default for PendingSnapshot {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

/// 待投递集合存储
#[derive(Debug, Clone)]
pub struct PendingStore {
    path: PathBuf,
}

impl PendingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 默认存储文件路径
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("notification-tester")
            .join("scheduled.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取快照；文件不存在时返回空集合
    pub fn load(&self) -> Result<PendingSnapshot> {
        if !self.path.exists() {
            return Ok(PendingSnapshot::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| self.error("read", e))?;
        let snapshot = serde_json::from_str(&content).map_err(|e| self.error("parse", e))?;
        Ok(snapshot)
    }

    /// 写入快照（临时文件 + rename）
    pub fn save(&self, snapshot: &PendingSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.error("create directory for", e))?;
        }

        let json = serde_json::to_string_pretty(snapshot).map_err(|e| self.error("serialize", e))?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json).map_err(|e| self.error("write", e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| self.error("replace", e))?;

        debug!(path = %self.path.display(), entries = snapshot.entries.len(), "Pending set saved");
        Ok(())
    }

    fn error(&self, action: &str, e: impl std::fmt::Display) -> NotifyError {
        NotifyError::Subsystem(format!("failed to {} {}: {}", action, self.path.display(), e))
    }
}
