//! 进程内模拟平台
//!
//! 在没有真实移动设备时模拟操作系统通知子系统：权限提示、投递渠道、
//! 待投递集合（tokio 定时器到期后推送到前台事件流）以及本地 token 生成。
//!
//! 配置了 `PendingStore` 时，待投递集合以存储文件为准，每次读写前重新加载，
//! 因此多个进程看到的是同一个集合。

use super::store::{PendingEntry, PendingSnapshot, PendingStore};
use super::{
    ChannelBackend, DeviceInfo, ForegroundPresentation, NotificationEvents, PermissionBackend,
    PushTokenService,
};
use crate::config::DeviceProfile;
use crate::error::{NotifyError, Result};
use crate::permission::{PermissionOptions, PermissionStatus};
use crate::types::{
    DeliveryChannel, NotificationContent, NotificationRequest, NotificationResponse, PushToken,
    ReceivedNotification, ScheduleId, Trigger, DEFAULT_ACTION_IDENTIFIER,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 事件流缓冲大小
const EVENT_BUFFER: usize = 32;

/// 最长 interval（一年）
const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

/// 系统权限提示（由用户回答）
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    /// 返回 true 表示用户允许
    async fn ask(&self, options: &PermissionOptions) -> Result<bool>;
}

/// 预设答案的权限提示（测试和非交互模式使用）
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<bool>>,
    fallback: bool,
    asked: AtomicUsize,
}

impl ScriptedPrompt {
    /// 按顺序返回 `answers`，用完后返回 `fallback`
    pub fn new(answers: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            fallback,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn always(answer: bool) -> Self {
        Self::new([], answer)
    }

    /// 弹出提示的次数
    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionPrompt for ScriptedPrompt {
    async fn ask(&self, _options: &PermissionOptions) -> Result<bool> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        let mut answers = self.answers.lock().unwrap_or_else(|e| e.into_inner());
        Ok(answers.pop_front().unwrap_or(self.fallback))
    }
}

#[derive(Debug)]
struct State {
    permission: PermissionStatus,
    pending: Vec<PendingEntry>,
    timers: HashMap<ScheduleId, JoinHandle<()>>,
    channels: HashMap<String, DeliveryChannel>,
    presentation: ForegroundPresentation,
    next_id: u64,
}

struct Inner {
    profile: DeviceProfile,
    prompt: Arc<dyn PermissionPrompt>,
    store: Option<PendingStore>,
    state: Mutex<State>,
    received_tx: broadcast::Sender<ReceivedNotification>,
    response_tx: broadcast::Sender<NotificationResponse>,
    offline: AtomicBool,
    token_requests: AtomicUsize,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 以存储文件为准同步待投递集合，撤销已不在集合中的定时器
    fn refresh(&self, state: &mut State) {
        let Some(store) = &self.store else {
            return;
        };
        match store.load() {
            Ok(snapshot) => {
                state.next_id = state.next_id.max(snapshot.next_id);
                state.pending = snapshot.entries;
                let pending = &state.pending;
                state.timers.retain(|id, timer| {
                    let keep = pending.iter().any(|e| &e.request.identifier == id);
                    if !keep {
                        timer.abort();
                    }
                    keep
                });
            }
            Err(e) => warn!(error = %e, "Failed to reload pending set, using in-memory copy"),
        }
    }

    fn persist(&self, state: &State) -> Result<()> {
        match &self.store {
            Some(store) => store.save(&PendingSnapshot {
                next_id: state.next_id,
                entries: state.pending.clone(),
            }),
            None => Ok(()),
        }
    }

    /// 到期投递：仍在待投递集合中才会触发（cancel_all 之后不会投递）
    fn deliver_due(&self, identifier: &ScheduleId) {
        let (request, presentation) = {
            let mut state = self.state();
            self.refresh(&mut state);
            state.timers.remove(identifier);
            let Some(pos) = state.pending.iter().position(|e| &e.request.identifier == identifier) else {
                debug!(id = %identifier, "Scheduled notification was cancelled before delivery");
                return;
            };
            let entry = state.pending.remove(pos);
            if let Err(e) = self.persist(&state) {
                warn!(error = %e, "Failed to save pending set after delivery");
            }
            (entry.request, state.presentation)
        };
        self.present(request, presentation);
    }

    fn present(&self, request: NotificationRequest, presentation: ForegroundPresentation) -> ReceivedNotification {
        let received = ReceivedNotification {
            request,
            received_at: Utc::now(),
        };
        info!(
            id = %received.request.identifier,
            title = %received.request.content.title,
            banner = presentation.show_banner,
            sound = presentation.play_sound,
            "Notification received"
        );
        // 没有订阅者时丢弃
        let _ = self.received_tx.send(received.clone());
        received
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
    }
}

/// 为待投递条目挂定时器（调用方持有状态锁，定时器到期前无法完成投递）
///
/// 定时器只持有弱引用，平台被释放后到期也不会投递。
fn arm_timer(inner: &Arc<Inner>, state: &mut State, identifier: ScheduleId, delay: Duration) {
    let task_inner = Arc::downgrade(inner);
    let due = identifier.clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(inner) = task_inner.upgrade() {
            inner.deliver_due(&due);
        }
    });
    if let Some(previous) = state.timers.insert(identifier, timer) {
        previous.abort();
    }
}

/// 模拟平台，实现全部平台 trait
#[derive(Clone)]
pub struct SimulatedPlatform {
    inner: Arc<Inner>,
}

impl SimulatedPlatform {
    pub fn new(profile: DeviceProfile, prompt: Arc<dyn PermissionPrompt>) -> Self {
        Self::build(profile, prompt, None, PendingSnapshot::default())
    }

    /// 待投递集合保存在 `store` 中，跨进程可见
    pub fn with_store(
        profile: DeviceProfile,
        prompt: Arc<dyn PermissionPrompt>,
        store: PendingStore,
    ) -> Result<Self> {
        let snapshot = store.load()?;
        info!(path = %store.path().display(), entries = snapshot.entries.len(), "Loaded pending set");
        Ok(Self::build(profile, prompt, Some(store), snapshot))
    }

    fn build(
        profile: DeviceProfile,
        prompt: Arc<dyn PermissionPrompt>,
        store: Option<PendingStore>,
        snapshot: PendingSnapshot,
    ) -> Self {
        let (received_tx, _) = broadcast::channel(EVENT_BUFFER);
        let (response_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(Inner {
                profile,
                prompt,
                store,
                state: Mutex::new(State {
                    permission: PermissionStatus::Undetermined,
                    pending: snapshot.entries,
                    timers: HashMap::new(),
                    channels: HashMap::new(),
                    presentation: ForegroundPresentation::default(),
                    next_id: snapshot.next_id.max(1),
                }),
                received_tx,
                response_tx,
                offline: AtomicBool::new(false),
                token_requests: AtomicUsize::new(0),
            }),
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.inner.profile
    }

    /// 模拟用户在系统设置中修改权限
    pub fn set_permission(&self, status: PermissionStatus) {
        self.inner.state().permission = status;
    }

    /// 模拟断网：token 请求返回 transport 错误
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// token 服务被调用的次数
    pub fn token_requests(&self) -> usize {
        self.inner.token_requests.load(Ordering::SeqCst)
    }

    /// 两个事件流上的订阅者总数
    pub fn subscriber_count(&self) -> usize {
        self.inner.received_tx.receiver_count() + self.inner.response_tx.receiver_count()
    }

    pub fn channel(&self, name: &str) -> Option<DeliveryChannel> {
        self.inner.state().channels.get(name).cloned()
    }

    /// 恢复上次进程留下的待投递条目：已到期的立即投递，其余重新挂定时器
    ///
    /// 需要在 tokio runtime 中、事件监听挂载之后调用。返回立即投递的条数。
    pub fn resume_pending(&self) -> usize {
        let now = Utc::now();
        let (overdue, armed) = {
            let mut state = self.inner.state();
            self.inner.refresh(&mut state);
            let unarmed: Vec<(ScheduleId, DateTime<Utc>)> = state
                .pending
                .iter()
                .filter(|e| !state.timers.contains_key(&e.request.identifier))
                .map(|e| (e.request.identifier.clone(), e.due_at))
                .collect();

            let mut overdue = Vec::new();
            let mut armed = 0;
            for (identifier, due_at) in unarmed {
                match (due_at - now).to_std() {
                    Ok(delay) if !delay.is_zero() => {
                        arm_timer(&self.inner, &mut state, identifier, delay);
                        armed += 1;
                    }
                    _ => overdue.push(identifier),
                }
            }
            (overdue, armed)
        };

        for identifier in &overdue {
            self.inner.deliver_due(identifier);
        }
        info!(overdue = overdue.len(), armed, "Pending set resumed");
        overdue.len()
    }

    /// 模拟一条远程推送在前台到达
    pub fn deliver_now(&self, content: NotificationContent) -> ReceivedNotification {
        let (request, presentation) = {
            let mut state = self.inner.state();
            let identifier = ScheduleId::new(format!("remote-{}", state.next_id));
            state.next_id += 1;
            let request = NotificationRequest {
                identifier,
                content,
                trigger: Trigger::interval(0),
            };
            (request, state.presentation)
        };
        self.inner.present(request, presentation)
    }

    /// 模拟用户点击通知
    pub fn tap(&self, notification: &ReceivedNotification) {
        let response = NotificationResponse {
            notification: notification.clone(),
            action_identifier: DEFAULT_ACTION_IDENTIFIER.to_string(),
        };
        let _ = self.inner.response_tx.send(response);
    }

    fn simulated_token(&self, project_id: &str) -> PushToken {
        let mut hasher = DefaultHasher::new();
        self.inner.profile.device_id.hash(&mut hasher);
        project_id.hash(&mut hasher);
        PushToken::new(format!("ExponentPushToken[{:016x}]", hasher.finish()))
    }

    fn validate(trigger: &Trigger) -> Result<Duration> {
        match trigger {
            Trigger::Date { at } => {
                let delay = *at - Utc::now();
                delay
                    .to_std()
                    .map_err(|_| NotifyError::Subsystem(format!("date trigger {} is in the past", at)))
            }
            Trigger::TimeInterval { seconds, .. } => {
                if *seconds == 0 {
                    Err(NotifyError::Subsystem(
                        "time interval trigger seconds must be greater than 0".to_string(),
                    ))
                } else if *seconds > MAX_INTERVAL_SECS {
                    Err(NotifyError::Subsystem(format!(
                        "time interval trigger of {} seconds is too large",
                        seconds
                    )))
                } else {
                    Ok(Duration::from_secs(*seconds))
                }
            }
        }
    }
}

#[async_trait]
impl PermissionBackend for SimulatedPlatform {
    async fn get_permissions(&self) -> Result<PermissionStatus> {
        Ok(self.inner.state().permission)
    }

    async fn request_permissions(&self, options: &PermissionOptions) -> Result<PermissionStatus> {
        let current = self.inner.state().permission;
        if current != PermissionStatus::Undetermined {
            // 已确定的状态不会再弹出提示
            return Ok(current);
        }

        let allowed = self.inner.prompt.ask(options).await?;
        let status = if allowed {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        self.inner.state().permission = status;
        Ok(status)
    }
}

#[async_trait]
impl PushTokenService for SimulatedPlatform {
    async fn get_push_token(&self, project_id: &str) -> Result<PushToken> {
        self.inner.token_requests.fetch_add(1, Ordering::SeqCst);
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("network is unreachable".to_string()));
        }
        Ok(self.simulated_token(project_id))
    }
}

#[async_trait]
impl super::SchedulingBackend for SimulatedPlatform {
    async fn schedule(&self, content: &NotificationContent, trigger: &Trigger) -> Result<ScheduleId> {
        let delay = Self::validate(trigger)?;

        let due_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

        let mut state = self.inner.state();
        self.inner.refresh(&mut state);
        if let Trigger::TimeInterval { channel_id: Some(channel_id), .. } = trigger {
            if !state.channels.contains_key(channel_id) {
                warn!(channel = %channel_id, "Trigger references a channel that was never created");
            }
        }

        let identifier = ScheduleId::new(format!("sched-{}", state.next_id));
        state.next_id += 1;
        state.pending.push(PendingEntry {
            request: NotificationRequest {
                identifier: identifier.clone(),
                content: content.clone(),
                trigger: trigger.clone(),
            },
            due_at,
        });
        if let Err(e) = self.inner.persist(&state) {
            state.pending.pop();
            return Err(e);
        }

        arm_timer(&self.inner, &mut state, identifier.clone(), delay);
        Ok(identifier)
    }

    async fn all_scheduled(&self) -> Result<Vec<NotificationRequest>> {
        let mut state = self.inner.state();
        self.inner.refresh(&mut state);
        Ok(state.pending.iter().map(|e| e.request.clone()).collect())
    }

    async fn cancel_all(&self) -> Result<()> {
        let mut state = self.inner.state();
        self.inner.refresh(&mut state);
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
        state.pending.clear();
        self.inner.persist(&state)
    }
}

#[async_trait]
impl ChannelBackend for SimulatedPlatform {
    fn requires_delivery_channels(&self) -> bool {
        self.inner.profile.family.requires_delivery_channels()
    }

    async fn set_channel(&self, channel: &DeliveryChannel) -> Result<()> {
        self.inner
            .state()
            .channels
            .insert(channel.name.clone(), channel.clone());
        Ok(())
    }
}

impl DeviceInfo for SimulatedPlatform {
    fn is_physical_device(&self) -> bool {
        self.inner.profile.physical
    }
}

impl NotificationEvents for SimulatedPlatform {
    fn subscribe_received(&self) -> broadcast::Receiver<ReceivedNotification> {
        self.inner.received_tx.subscribe()
    }

    fn subscribe_responses(&self) -> broadcast::Receiver<NotificationResponse> {
        self.inner.response_tx.subscribe()
    }

    fn set_foreground_presentation(&self, presentation: ForegroundPresentation) {
        self.inner.state().presentation = presentation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SchedulingBackend;
    use tempfile::TempDir;

    fn platform(prompt: ScriptedPrompt) -> SimulatedPlatform {
        SimulatedPlatform::new(DeviceProfile::default(), Arc::new(prompt))
    }

    #[tokio::test]
    async fn test_request_prompts_only_when_undetermined() {
        let prompt = Arc::new(ScriptedPrompt::always(true));
        let platform = SimulatedPlatform::new(DeviceProfile::default(), prompt.clone());

        let first = platform.request_permissions(&PermissionOptions::all()).await.unwrap();
        let second = platform.request_permissions(&PermissionOptions::all()).await.unwrap();

        assert_eq!(first, PermissionStatus::Granted);
        assert_eq!(second, PermissionStatus::Granted);
        assert_eq!(prompt.asked(), 1);
    }

    #[tokio::test]
    async fn test_invalid_triggers_rejected() {
        let platform = platform(ScriptedPrompt::always(true));
        let content = NotificationContent::new("t", "b");

        let zero = platform.schedule(&content, &Trigger::interval(0)).await;
        assert!(matches!(zero, Err(NotifyError::Subsystem(_))));

        let past = platform.schedule(&content, &Trigger::in_seconds(-60)).await;
        assert!(matches!(past, Err(NotifyError::Subsystem(_))));

        assert!(platform.all_scheduled().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identifiers_are_unique() {
        let platform = platform(ScriptedPrompt::always(true));
        let content = NotificationContent::new("t", "b");

        let a = platform.schedule(&content, &Trigger::interval(60)).await.unwrap();
        let b = platform.schedule(&content, &Trigger::interval(60)).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_token_is_stable_per_device_and_project() {
        let platform = platform(ScriptedPrompt::always(true));

        let a = platform.get_push_token("proj-a").await.unwrap();
        let again = platform.get_push_token("proj-a").await.unwrap();
        let b = platform.get_push_token("proj-b").await.unwrap();

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("ExponentPushToken["));
        assert_eq!(platform.token_requests(), 3);
    }

    #[tokio::test]
    async fn test_offline_token_request_fails() {
        let platform = platform(ScriptedPrompt::always(true));
        platform.set_offline(true);

        let err = platform.get_push_token("proj").await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }

    #[tokio::test]
    async fn test_due_notification_is_delivered_and_removed() {
        let platform = platform(ScriptedPrompt::always(true));
        let mut received = platform.subscribe_received();
        let content = NotificationContent::new("soon", "body");

        platform.schedule(&content, &Trigger::interval(1)).await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), received.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(event.request.content, content);
        assert!(platform.all_scheduled().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_notification_is_not_delivered() {
        let platform = platform(ScriptedPrompt::always(true));
        let mut received = platform.subscribe_received();

        platform
            .schedule(&NotificationContent::new("never", "body"), &Trigger::interval(1))
            .await
            .unwrap();
        platform.cancel_all().await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(1500), received.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancel_all_aborts_timers() {
        let platform = platform(ScriptedPrompt::always(true));
        let content = NotificationContent::new("later", "body");
        assert_eq!(Arc::weak_count(&platform.inner), 0);

        platform.schedule(&content, &Trigger::interval(3600)).await.unwrap();
        platform.schedule(&content, &Trigger::interval(MAX_INTERVAL_SECS)).await.unwrap();
        assert_eq!(Arc::weak_count(&platform.inner), 2);

        platform.cancel_all().await.unwrap();
        for _ in 0..50 {
            if Arc::weak_count(&platform.inner) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(Arc::weak_count(&platform.inner), 0);
        assert!(platform.inner.state().timers.is_empty());
    }

    #[tokio::test]
    async fn test_pending_set_is_shared_through_store() {
        let dir = TempDir::new().unwrap();
        let store = PendingStore::new(dir.path().join("scheduled.json"));
        let first = SimulatedPlatform::with_store(DeviceProfile::default(), Arc::new(ScriptedPrompt::always(true)), store.clone()).unwrap();
        let second = SimulatedPlatform::with_store(DeviceProfile::default(), Arc::new(ScriptedPrompt::always(true)), store).unwrap();

        let id = first
            .schedule(&NotificationContent::new("shared", "body"), &Trigger::interval(600))
            .await
            .unwrap();
        let seen = second.all_scheduled().await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].identifier, id);

        // 另一个实例清除后，本实例的定时器也被撤销
        second.cancel_all().await.unwrap();
        assert!(first.all_scheduled().await.unwrap().is_empty());
        assert!(first.inner.state().timers.is_empty());

        let next = second
            .schedule(&NotificationContent::new("next", "body"), &Trigger::interval(600))
            .await
            .unwrap();
        assert_ne!(next, id);
    }

    #[tokio::test]
    async fn test_resume_delivers_overdue_and_rearms_future() {
        let dir = TempDir::new().unwrap();
        let store = PendingStore::new(dir.path().join("scheduled.json"));
        let entry = |id: &str, title: &str, due_at| PendingEntry {
            request: NotificationRequest {
                identifier: ScheduleId::new(id),
                content: NotificationContent::new(title, "body"),
                trigger: Trigger::interval(10),
            },
            due_at,
        };
        store
            .save(&PendingSnapshot {
                next_id: 7,
                entries: vec![
                    entry("sched-5", "overdue", Utc::now() - chrono::Duration::seconds(30)),
                    entry("sched-6", "future", Utc::now() + chrono::Duration::seconds(600)),
                ],
            })
            .unwrap();

        let platform = SimulatedPlatform::with_store(DeviceProfile::default(), Arc::new(ScriptedPrompt::always(true)), store.clone()).unwrap();
        let mut received = platform.subscribe_received();

        assert_eq!(platform.resume_pending(), 1);
        assert_eq!(received.try_recv().unwrap().request.content.title, "overdue");

        let remaining = platform.all_scheduled().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].content.title, "future");
        assert_eq!(store.load().unwrap().entries.len(), 1);
        assert!(platform.inner.state().timers.contains_key(&ScheduleId::new("sched-6")));

        let id = platform
            .schedule(&NotificationContent::new("new", "body"), &Trigger::interval(60))
            .await
            .unwrap();
        assert_eq!(id, ScheduleId::new("sched-7"));
    }
}
