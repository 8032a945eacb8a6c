//! 通知事件监听 - 前台投递流和用户交互流
//!
//! 两个订阅在 `attach` 时建立，在 `NotificationListener` 被 drop（或显式
//! `detach`）时各自解除一次。两个流相互独立，不保证顺序，同一条通知可能
//! 在两个流中各出现一次。
//!
//! "最近一条通知" 只由前台投递订阅写入，显示层通过 `last_notification()`
//! 读取或通过 `next_notification()` 等待下一条。

use crate::platform::{ForegroundPresentation, NotificationEvents};
use crate::types::{NotificationResponse, ReceivedNotification};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 交互事件缓冲大小
const RESPONSE_BUFFER: usize = 32;

/// 单个事件流订阅，drop 时解除
pub struct Subscription {
    stream: &'static str,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    fn spawn(stream: &'static str, task: JoinHandle<()>) -> Self {
        info!(stream, "Subscription attached");
        Self {
            stream,
            task: Some(task),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!(stream = self.stream, "Subscription detached");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// 通知事件监听器
pub struct NotificationListener {
    received: Subscription,
    responses: Subscription,
    last: watch::Receiver<Option<ReceivedNotification>>,
    response_rx: mpsc::Receiver<NotificationResponse>,
}

impl NotificationListener {
    /// 安装前台展示方式并订阅两个事件流（需要在 tokio runtime 中调用）
    pub fn attach(events: &dyn NotificationEvents, presentation: ForegroundPresentation) -> Self {
        events.set_foreground_presentation(presentation);

        let (last_tx, last) = watch::channel(None);
        let received = Subscription::spawn(
            "received",
            tokio::spawn(pump_received(events.subscribe_received(), last_tx)),
        );

        let (response_tx, response_rx) = mpsc::channel(RESPONSE_BUFFER);
        let responses = Subscription::spawn(
            "response",
            tokio::spawn(pump_responses(events.subscribe_responses(), response_tx)),
        );

        Self {
            received,
            responses,
            last,
            response_rx,
        }
    }

    /// 最近一次收到的前台通知
    pub fn last_notification(&self) -> Option<ReceivedNotification> {
        self.last.borrow().clone()
    }

    /// 等待下一条前台通知；订阅已解除时返回 None
    pub async fn next_notification(&mut self) -> Option<ReceivedNotification> {
        self.last.changed().await.ok()?;
        self.last.borrow_and_update().clone()
    }

    /// 等待下一条交互事件
    pub async fn next_response(&mut self) -> Option<NotificationResponse> {
        self.response_rx.recv().await
    }

    pub fn is_attached(&self) -> bool {
        self.received.is_attached() && self.responses.is_attached()
    }

    /// 显式解除两个订阅
    pub fn detach(self) {
        drop(self);
    }
}

async fn pump_received(
    mut rx: broadcast::Receiver<ReceivedNotification>,
    last: watch::Sender<Option<ReceivedNotification>>,
) {
    loop {
        match rx.recv().await {
            Ok(notification) => {
                debug!(id = %notification.request.identifier, "Foreground delivery event");
                last.send_replace(Some(notification));
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Foreground delivery stream lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn pump_responses(
    mut rx: broadcast::Receiver<NotificationResponse>,
    tx: mpsc::Sender<NotificationResponse>,
) {
    loop {
        match rx.recv().await {
            Ok(response) => {
                info!(
                    id = %response.notification.request.identifier,
                    action = %response.action_identifier,
                    "Notification response"
                );
                if tx.try_send(response).is_err() {
                    debug!("Response consumer not keeping up, dropping event");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Response stream lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
