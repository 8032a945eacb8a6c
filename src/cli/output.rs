//! Output formatting for CLI commands

use crate::app::{Ack, AckKind};
use crate::types::{NotificationRequest, ReceivedNotification};
use serde::Serialize;

/// Format output as JSON or plain text based on --json flag
pub fn format_output<T: Serialize>(data: &T, json: bool) -> String {
    if json {
        serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
    } else {
        serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string())
    }
}

/// 回执写到 stdout，错误写到 stderr
pub fn print_ack(ack: &Ack) {
    match ack.kind {
        AckKind::Confirmation => println!("{}", ack.message),
        AckKind::Error => eprintln!("{}", ack.message),
    }
}

/// 待投递通知列表
pub fn format_scheduled(scheduled: &[NotificationRequest]) -> String {
    scheduled
        .iter()
        .map(|r| format!("  {} | {} | {}", r.identifier, r.content.title, format_output(&r.trigger, false)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// "Last Notification" 区块
pub fn format_last_notification(notification: &ReceivedNotification) -> String {
    format!(
        "Last Notification\n  Title: {}\n  Body: {}",
        notification.request.content.title, notification.request.content.body
    )
}
