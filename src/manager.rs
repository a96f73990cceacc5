/// 呼叫会话管理器
///
/// "手机此刻在做什么"的唯一权威：
/// - 独占当前的设备注册和当前呼叫
/// - 本地操作和 SDK 异步事件都在同一把写锁内完成 "读取 -> 校验 -> 修改 -> 通知"
/// - 每次状态迁移后恰好通知一次订阅者
/// - 观察者通过快照读取状态，不会与写者竞争锁
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::call::{CallSession, CallState};
use crate::config::Config;
use crate::device::{DeviceRegistration, DeviceState, SoundOptions};
use crate::error::{SessionError, SessionResult};
use crate::notify::{StatusListener, Subscribers, SubscriptionHandle};
use crate::sdk::{ConnectionHandle, EventSender, SdkEvent, TelephonySdk, TokenProvider};
use crate::utils::classify_target;

/// 写锁保护的可变状态
struct SessionState {
    device: DeviceRegistration,
    /// 只保存活动呼叫，终止的呼叫在通知之后立即清除
    call: Option<CallSession>,
}

/// 一次发布的状态：设备和呼叫总是成对替换，观察者不会读到新旧混合的组合
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub device: Arc<DeviceRegistration>,
    pub call: Option<Arc<CallSession>>,
}

impl Snapshot {
    fn capture(state: &SessionState) -> Self {
        Self {
            device: Arc::new(state.device.clone()),
            call: state.call.clone().map(Arc::new),
        }
    }
}

pub struct SessionManager {
    config: Config,
    sdk: Arc<dyn TelephonySdk>,
    state: Mutex<SessionState>,
    snapshot: ArcSwap<Snapshot>,
    subscribers: Subscribers,
    events_tx: EventSender,
    cancel_token: CancellationToken,
}

impl SessionManager {
    /// 创建会话管理器并启动事件处理任务
    ///
    /// 必须在 tokio 运行时内调用
    pub fn new(config: Config, sdk: Arc<dyn TelephonySdk>) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let state = SessionState {
            device: DeviceRegistration::new(config.sounds),
            call: None,
        };

        let manager = Arc::new(Self {
            config,
            sdk,
            snapshot: ArcSwap::from_pointee(Snapshot::capture(&state)),
            state: Mutex::new(state),
            subscribers: Subscribers::new(),
            events_tx,
            cancel_token: cancel_token.clone(),
        });

        Self::start_event_pump(Arc::downgrade(&manager), events_rx, cancel_token);
        manager
    }

    /// 启动事件处理任务，逐个消费 SDK 事件
    fn start_event_pump(
        manager: Weak<SessionManager>,
        mut events: mpsc::UnboundedReceiver<SdkEvent>,
        cancel_token: CancellationToken,
    ) {
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    event = events.recv() => event,
                    _ = cancel_token.cancelled() => None,
                };
                let Some(event) = event else {
                    break;
                };
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.handle_event(event).await;
            }
            debug!("SDK 事件处理任务退出");
        });
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// SDK 事件投递地址
    pub fn event_sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    // ---- 快照读取 ----

    /// 最近一次发布的设备和呼叫
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// 当前设备注册快照
    pub fn device_state(&self) -> Arc<DeviceRegistration> {
        self.snapshot.load().device.clone()
    }

    /// 当前呼叫快照，没有呼叫时为 None
    pub fn call_state(&self) -> Option<Arc<CallSession>> {
        self.snapshot.load().call.clone()
    }

    /// 用于界面显示的状态文本
    pub fn status_line(&self) -> String {
        let snapshot = self.snapshot();
        let call = match &snapshot.call {
            Some(call) if call.muted => format!("{} ({}, muted)", call.state, call.target),
            Some(call) => format!("{} ({})", call.state, call.target),
            None => CallState::Idle.to_string(),
        };
        format!("Device: {} | Call: {}", snapshot.device.state, call)
    }

    // ---- 订阅 ----

    pub fn subscribe<L>(&self, listener: L) -> SubscriptionHandle
    where
        L: StatusListener + 'static,
    {
        self.subscribers.subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.subscribers.unsubscribe(handle)
    }

    // ---- 提交 ----

    async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    fn publish(&self, state: &SessionState) {
        self.snapshot.store(Arc::new(Snapshot::capture(state)));
    }

    /// 发布一次状态迁移并通知订阅者；终止的呼叫在通知之后清除
    fn commit(&self, state: &mut SessionState) {
        self.publish(state);
        self.subscribers.notify();

        if state.call.as_ref().is_some_and(|call| call.state.is_terminal()) {
            state.call = None;
            self.publish(state);
        }
    }

    // ---- 设备注册 ----

    /// 获取令牌并注册设备
    ///
    /// 令牌获取失败时设备进入 Failed，管理器仍可继续读取状态
    pub async fn start(&self, provider: &dyn TokenProvider) -> SessionResult<()> {
        let current = self.device_state().state;
        if current != DeviceState::Unregistered {
            return Err(SessionError::invalid_device_transition(current, "start"));
        }

        match provider.fetch_auth_token(&self.config.token_endpoint).await {
            Ok(token) => self.initialize(&token).await,
            Err(e) => {
                error!("获取令牌失败: {}", e);
                let mut state = self.lock().await;
                // 获取令牌期间设备可能已被注册，过期的失败不能覆盖它
                if state.device.state != DeviceState::Unregistered {
                    warn!("设备已处于 {}，忽略过期的令牌错误", state.device.state);
                } else if state.device.fail_any(None, e.to_string()) {
                    self.commit(&mut state);
                }
                Err(e.into())
            }
        }
    }

    /// 用令牌注册设备: Unregistered -> Registering
    ///
    /// 注册结果（Registered / RegistrationFailed）随后通过 SDK 事件到达
    pub async fn initialize(&self, token: &str) -> SessionResult<()> {
        let mut state = self.lock().await;
        if !state.device.begin_registering() {
            return Err(SessionError::invalid_device_transition(
                state.device.state,
                "initialize",
            ));
        }
        self.commit(&mut state);

        info!("正在注册设备...");
        match self.sdk.register_device(token, self.events_tx.clone()).await {
            Ok(handle) => {
                info!("设备注册句柄: {}", handle);
                state.device.handle = Some(handle);
                self.sdk.set_sounds(&handle, state.device.sounds).await;
                self.publish(&state);
                Ok(())
            }
            Err(e) => {
                error!("设备注册失败: {}", e);
                if state.device.registration_failed(Some(e.code), e.message.clone()) {
                    self.commit(&mut state);
                }
                Err(e.into())
            }
        }
    }

    /// Stopped -> Listening
    pub async fn start_listening(&self) -> SessionResult<()> {
        let mut state = self.lock().await;
        if state.device.state != DeviceState::Stopped {
            return Err(SessionError::invalid_device_transition(
                state.device.state,
                "start_listening",
            ));
        }
        let handle = state.device.handle.ok_or(SessionError::DeviceNotReady {
            state: state.device.state,
        })?;

        match self.sdk.listen(&handle).await {
            Ok(()) => {
                state.device.listen_started();
                self.commit(&mut state);
                Ok(())
            }
            Err(e) => {
                error!("开始监听失败: {}", e);
                if state.device.fail_any(Some(e.code), e.message.clone()) {
                    self.commit(&mut state);
                }
                Err(e.into())
            }
        }
    }

    /// Listening -> Stopped
    pub async fn stop_listening(&self) -> SessionResult<()> {
        let mut state = self.lock().await;
        if state.device.state != DeviceState::Listening {
            return Err(SessionError::invalid_device_transition(
                state.device.state,
                "stop_listening",
            ));
        }
        if let Some(handle) = state.device.handle {
            self.sdk.unlisten(&handle).await;
        }
        state.device.listen_stopped();
        self.commit(&mut state);
        Ok(())
    }

    /// 设置提示音开关（透传，不是状态迁移，不通知）
    pub async fn set_sounds(&self, sounds: SoundOptions) -> SessionResult<()> {
        self.update_sounds(|current| *current = sounds).await
    }

    pub async fn set_incoming_sound_enabled(&self, enabled: bool) -> SessionResult<()> {
        self.update_sounds(|sounds| sounds.incoming = enabled).await
    }

    pub async fn set_outgoing_sound_enabled(&self, enabled: bool) -> SessionResult<()> {
        self.update_sounds(|sounds| sounds.outgoing = enabled).await
    }

    pub async fn set_disconnect_sound_enabled(&self, enabled: bool) -> SessionResult<()> {
        self.update_sounds(|sounds| sounds.disconnect = enabled).await
    }

    async fn update_sounds<F>(&self, update: F) -> SessionResult<()>
    where
        F: FnOnce(&mut SoundOptions),
    {
        let mut state = self.lock().await;
        if state.device.is_failed() {
            return Err(SessionError::DeviceNotReady {
                state: DeviceState::Failed,
            });
        }
        update(&mut state.device.sounds);
        debug!("提示音: {:?}", state.device.sounds);

        // 注册前只保存，注册成功时统一下发
        if let Some(handle) = state.device.handle {
            self.sdk.set_sounds(&handle, state.device.sounds).await;
        }
        self.publish(&state);
        Ok(())
    }

    // ---- 呼叫控制 ----

    /// 发起外呼: Idle -> Connecting
    pub async fn place_call(&self, target: &str) -> SessionResult<ConnectionHandle> {
        let target = classify_target(target)?;
        info!("📞发起呼叫到: {}", target);

        let mut state = self.lock().await;
        if !state.device.is_listening() {
            warn!("设备未就绪: {}", state.device.state);
            return Err(SessionError::DeviceNotReady {
                state: state.device.state,
            });
        }
        if state.call.as_ref().is_some_and(|call| call.is_active()) {
            return Err(SessionError::AlreadyInCall);
        }

        let handle = self
            .sdk
            .connect(&self.config.source_id, target.as_str())
            .await
            .map_err(|e| {
                error!("呼叫发起失败: {}", e);
                e
            })?;

        state.call = Some(CallSession::outbound(handle, target.as_str()));
        self.commit(&mut state);
        Ok(handle)
    }

    /// 本端挂断: Connecting/Ringing/Connected -> Disconnected
    ///
    /// 没有活动呼叫时返回 InvalidStateTransition
    pub async fn hang_up(&self) -> SessionResult<()> {
        let mut state = self.lock().await;
        let mut next = Self::current_call(&state, "hang_up")?;
        next.hang_up()?;

        self.sdk.disconnect(&next.handle).await;
        state.call = Some(next);
        self.commit(&mut state);
        Ok(())
    }

    /// 接听来电: Ringing -> Connected
    pub async fn accept_incoming(&self) -> SessionResult<()> {
        let mut state = self.lock().await;
        let mut next = Self::current_call(&state, "accept_incoming")?;
        next.accept()?;

        self.sdk.accept(&next.handle).await;
        state.call = Some(next);
        self.commit(&mut state);
        Ok(())
    }

    /// 拒接来电: Ringing -> Disconnected
    pub async fn reject_incoming(&self) -> SessionResult<()> {
        let mut state = self.lock().await;
        let mut next = Self::current_call(&state, "reject_incoming")?;
        next.reject()?;

        self.sdk.reject(&next.handle).await;
        state.call = Some(next);
        self.commit(&mut state);
        Ok(())
    }

    /// 静音开关，只在 Connected 时可用
    pub async fn set_muted(&self, muted: bool) -> SessionResult<()> {
        let mut state = self.lock().await;
        let mut next = state.call.clone().ok_or(SessionError::NotConnected)?;
        next.set_muted(muted)?;

        self.sdk.set_muted(&next.handle, muted).await;
        state.call = Some(next);
        self.commit(&mut state);
        Ok(())
    }

    /// 拨号/挂断切换：有活动呼叫时挂断，否则拨打 `target`
    pub async fn toggle_call(&self, target: &str) -> SessionResult<()> {
        match self.call_state() {
            Some(call) if call.is_active() => self.hang_up().await,
            _ => self.place_call(target).await.map(|_| ()),
        }
    }

    fn current_call(state: &SessionState, operation: &'static str) -> SessionResult<CallSession> {
        state
            .call
            .clone()
            .ok_or_else(|| SessionError::invalid_call_transition(CallState::Idle, operation))
    }

    /// 挂断活动呼叫并停止事件处理
    pub async fn shutdown(&self) {
        info!("正在关闭会话管理器...");
        let mut state = self.lock().await;
        if let Some(mut call) = state.call.clone() {
            if call.hang_up().is_ok() {
                self.sdk.disconnect(&call.handle).await;
                state.call = Some(call);
                self.commit(&mut state);
            }
        }
        self.cancel_token.cancel();
    }

    // ---- SDK 事件 ----

    /// 处理一个 SDK 事件
    ///
    /// 事件处理任务调用此方法；平台胶水代码也可以直接调用
    pub async fn handle_event(&self, event: SdkEvent) {
        debug!("SDK 事件: {:?}", event);
        let mut state = self.lock().await;

        let changed = match event {
            SdkEvent::Registered => state.device.registered(),
            SdkEvent::RegistrationFailed { code, message } => {
                state.device.registration_failed(Some(code), message)
            }
            SdkEvent::ListenStarted => state.device.listen_started(),
            SdkEvent::ListenStopped => state.device.listen_stopped(),
            SdkEvent::ListenFailed { code, message } => state.device.fail_any(Some(code), message),
            SdkEvent::IncomingConnection { handle, from } => {
                self.on_incoming(&mut state, handle, from).await;
                false
            }
            SdkEvent::Connected { handle } => {
                Self::matching_call(&mut state, &handle).is_some_and(|call| call.connected())
            }
            SdkEvent::Disconnected { handle } => Self::matching_call(&mut state, &handle)
                .is_some_and(|call| call.remote_disconnected()),
            SdkEvent::DisconnectedWithError {
                handle,
                code,
                message,
            } => Self::matching_call(&mut state, &handle)
                .is_some_and(|call| call.failed(code, message)),
        };

        if changed {
            self.commit(&mut state);
        }
    }

    fn matching_call<'a>(
        state: &'a mut SessionState,
        handle: &ConnectionHandle,
    ) -> Option<&'a mut CallSession> {
        match state.call.as_mut() {
            Some(call) if call.handle == *handle => Some(call),
            _ => {
                debug!("忽略非当前呼叫的事件: {}", handle);
                None
            }
        }
    }

    /// 来电处理
    ///
    /// 已接通的呼叫会先被强制挂断（先通知），再进入新来电的 Ringing（再通知）
    async fn on_incoming(&self, state: &mut SessionState, handle: ConnectionHandle, from: String) {
        info!("收到来电: {} ({})", from, handle);

        if !state.device.is_listening() {
            warn!("设备未在监听 ({})，拒绝来电", state.device.state);
            self.sdk.reject(&handle).await;
            return;
        }

        if let Some(mut current) = state.call.clone() {
            if current.state != CallState::Connected {
                warn!("当前呼叫处于 {}，拒绝新来电", current.state);
                self.sdk.reject(&handle).await;
                return;
            }

            info!("挂断当前呼叫 {} 以接入新来电", current.handle);
            self.sdk.disconnect(&current.handle).await;
            current.remote_disconnected();
            state.call = Some(current);
            self.commit(state);
        }

        state.call = Some(CallSession::inbound(handle, from));
        self.commit(state);

        if self.config.auto_answer {
            if let Some(call) = state.call.as_mut() {
                if call.accept().is_ok() {
                    info!("自动接听: {}", handle);
                    self.sdk.accept(&handle).await;
                    self.commit(state);
                }
            }
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
