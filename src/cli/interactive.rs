//! 交互式菜单 - 每个菜单项对应一个用户动作

use super::output::{format_last_notification, format_scheduled, print_ack};
use super::session::Session;
use crate::app::Ack;
use anyhow::{Context, Result};
use dialoguer::Select;
use tracing::debug;

/// 菜单项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    RequestPermissions,
    SendTest,
    ScheduleTest,
    ScheduleReminder,
    CheckScheduled,
    ClearAll,
    SendCustom,
    OpenLast,
    Quit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 9] = [
        MenuAction::RequestPermissions,
        MenuAction::SendTest,
        MenuAction::ScheduleTest,
        MenuAction::ScheduleReminder,
        MenuAction::CheckScheduled,
        MenuAction::ClearAll,
        MenuAction::SendCustom,
        MenuAction::OpenLast,
        MenuAction::Quit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuAction::RequestPermissions => "Request Notification Permissions",
            MenuAction::SendTest => "Send Test Notification",
            MenuAction::ScheduleTest => "Schedule Notification (5s)",
            MenuAction::ScheduleReminder => "Schedule Reminder (10s)",
            MenuAction::CheckScheduled => "Check Scheduled Notifications",
            MenuAction::ClearAll => "Clear All Scheduled",
            MenuAction::SendCustom => "Send Custom Notification",
            MenuAction::OpenLast => "Open Last Notification",
            MenuAction::Quit => "Quit",
        }
    }
}

fn print_header(session: &Session) {
    println!("\n🔔 Notification Tester");
    match session.tester.token() {
        Some(token) => println!("Push Token: {}", token),
        None => println!("Push Token: (none)"),
    }
    if let Some(notification) = session.tester.last_notification() {
        println!("{}", format_last_notification(&notification));
    }
}

async fn choose() -> Result<MenuAction> {
    let labels: Vec<&str> = MenuAction::ALL.iter().map(|a| a.label()).collect();
    let index = tokio::task::spawn_blocking(move || {
        Select::new()
            .with_prompt("Choose an action")
            .items(&labels)
            .default(0)
            .interact()
    })
    .await
    .context("Menu task failed")?
    .context("Failed to read menu selection")?;

    Ok(MenuAction::ALL[index])
}

/// 运行菜单直到用户退出
pub async fn run_interactive(session: &mut Session) -> Result<()> {
    print_ack(&session.start().await);

    loop {
        print_header(session);
        let action = choose().await?;
        debug!(?action, "Menu action selected");

        let ack = match action {
            MenuAction::RequestPermissions => session.tester.request_permissions().await,
            MenuAction::SendTest => session.tester.send_test().await,
            MenuAction::ScheduleTest => session.tester.schedule_test().await,
            MenuAction::ScheduleReminder => session.tester.schedule_reminder().await,
            MenuAction::CheckScheduled => {
                let (ack, scheduled) = session.tester.list_scheduled().await;
                if !scheduled.is_empty() {
                    println!("{}", format_scheduled(&scheduled));
                }
                ack
            }
            MenuAction::ClearAll => session.tester.clear_all().await,
            MenuAction::SendCustom => session.tester.send_custom().await,
            MenuAction::OpenLast => match session.tester.last_notification() {
                Some(notification) => {
                    session.platform.tap(&notification);
                    Ack::confirm(format!("Opened \"{}\"", notification.request.content.title))
                }
                None => Ack::error("No notification received yet"),
            },
            MenuAction::Quit => break,
        };
        print_ack(&ack);
    }

    session.tester.shutdown();
    Ok(())
}
