//! 终端权限提示

use crate::error::{NotifyError, Result};
use crate::permission::PermissionOptions;
use crate::platform::PermissionPrompt;
use async_trait::async_trait;
use dialoguer::Confirm;

/// 在终端中询问用户是否允许通知
pub struct TerminalPrompt;

fn describe(options: &PermissionOptions) -> String {
    let mut wanted = Vec::new();
    if options.alert {
        wanted.push("alerts");
    }
    if options.badge {
        wanted.push("badges");
    }
    if options.sound {
        wanted.push("sounds");
    }
    if options.announcements {
        wanted.push("announcements");
    }
    if wanted.is_empty() {
        "\"Notification Tester\" would like to send you notifications".to_string()
    } else {
        format!(
            "\"Notification Tester\" would like to send you notifications ({})",
            wanted.join(", ")
        )
    }
}

#[async_trait]
impl PermissionPrompt for TerminalPrompt {
    async fn ask(&self, options: &PermissionOptions) -> Result<bool> {
        let text = describe(options);
        tokio::task::spawn_blocking(move || Confirm::new().with_prompt(text).default(true).interact())
            .await
            .map_err(|e| NotifyError::Subsystem(format!("permission prompt aborted: {}", e)))?
            .map_err(|e| NotifyError::Subsystem(format!("permission prompt failed: {}", e)))
    }
}
