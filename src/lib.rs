//! Notification Tester - 推送通知诊断客户端
//!
//! 注册设备、请求通知权限、发送和调度通知、查询和清除待投递通知。

pub mod app;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod permission;
pub mod platform;
pub mod registrar;
pub mod scheduler;
pub mod types;

pub use app::{Ack, AckKind, NotificationTester};
pub use config::{DeviceProfile, TesterConfig, TokenSource};
pub use dispatcher::{PushDispatcher, PushMessage};
pub use error::{NotifyError, Result};
pub use listener::NotificationListener;
pub use permission::{PermissionManager, PermissionOptions, PermissionOutcome, PermissionStatus};
pub use platform::{PlatformFamily, PlatformServices, SimulatedPlatform};
pub use registrar::{DeviceRegistrar, RegistrationOutcome};
pub use scheduler::Scheduler;
pub use types::{
    DeliveryChannel, NotificationContent, NotificationRequest, NotificationResponse, PushToken,
    ReceivedNotification, ScheduleId, Trigger,
};
