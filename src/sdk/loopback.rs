/// 进程内模拟 SDK
///
/// 不连接任何网络：记录收到的每条指令，并允许调用方模拟对端事件
/// （来电、接听、挂断）。命令行演示和测试都使用它
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::traits::{ConnectionHandle, EventSender, RegistrationHandle, SdkEvent, TelephonySdk};
use crate::device::SoundOptions;
use crate::error::{ConnectError, ListenError, RegistrationError};

/// SDK 收到的指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkCommand {
    RegisterDevice { token: String },
    Listen,
    Unlisten,
    SetSounds(SoundOptions),
    Connect { source_id: String, target: String },
    Accept(ConnectionHandle),
    Reject(ConnectionHandle),
    Disconnect(ConnectionHandle),
    SetMuted(ConnectionHandle, bool),
}

/// 模拟行为配置
#[derive(Debug, Clone, Default)]
pub struct LoopbackOptions {
    /// 注册成功后立即发送 Registered 和 ListenStarted
    pub auto_register: bool,
    /// 外呼后立即发送 Connected
    pub auto_answer: bool,
    pub fail_registration: Option<RegistrationError>,
    pub fail_listen: Option<ListenError>,
    pub fail_connect: Option<ConnectError>,
}

#[derive(Default)]
struct LoopbackInner {
    events: Option<EventSender>,
    commands: Vec<SdkCommand>,
    last_connection: Option<ConnectionHandle>,
}

pub struct LoopbackSdk {
    options: LoopbackOptions,
    inner: Mutex<LoopbackInner>,
}

impl LoopbackSdk {
    pub fn new(options: LoopbackOptions) -> Self {
        Self {
            options,
            inner: Mutex::new(LoopbackInner::default()),
        }
    }

    /// 注册成功后自动进入监听的模拟 SDK
    pub fn auto() -> Self {
        Self::new(LoopbackOptions {
            auto_register: true,
            ..Default::default()
        })
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackInner> {
        // 记录数据在 panic 后仍可用
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, command: SdkCommand) {
        debug!("loopback sdk: {:?}", command);
        self.lock().commands.push(command);
    }

    /// 向管理器投递事件；设备尚未注册时返回 false
    pub fn emit(&self, event: SdkEvent) -> bool {
        let inner = self.lock();
        match &inner.events {
            Some(sender) => sender.send(event).is_ok(),
            None => {
                warn!("loopback sdk: 设备未注册，丢弃事件 {:?}", event);
                false
            }
        }
    }

    /// 模拟来电，返回新连接句柄
    pub fn simulate_incoming(&self, from: &str) -> ConnectionHandle {
        let handle = ConnectionHandle::new();
        self.lock().last_connection = Some(handle);
        info!("loopback sdk: 模拟来电 {} ({})", from, handle);
        self.emit(SdkEvent::IncomingConnection {
            handle,
            from: from.to_string(),
        });
        handle
    }

    /// 模拟对端接听
    pub fn simulate_answer(&self, handle: ConnectionHandle) -> bool {
        self.emit(SdkEvent::Connected { handle })
    }

    /// 模拟对端挂断
    pub fn simulate_hangup(&self, handle: ConnectionHandle) -> bool {
        self.emit(SdkEvent::Disconnected { handle })
    }

    /// 模拟带错误的断开
    pub fn simulate_error(&self, handle: ConnectionHandle, code: i32, message: &str) -> bool {
        self.emit(SdkEvent::DisconnectedWithError {
            handle,
            code,
            message: message.to_string(),
        })
    }

    /// 最近一次外呼或来电的连接句柄
    pub fn last_connection(&self) -> Option<ConnectionHandle> {
        self.lock().last_connection
    }

    /// 到目前为止收到的全部指令
    pub fn commands(&self) -> Vec<SdkCommand> {
        self.lock().commands.clone()
    }
}

impl Default for LoopbackSdk {
    fn default() -> Self {
        Self::new(LoopbackOptions::default())
    }
}

#[async_trait]
impl TelephonySdk for LoopbackSdk {
    async fn register_device(
        &self,
        token: &str,
        events: EventSender,
    ) -> Result<RegistrationHandle, RegistrationError> {
        self.record(SdkCommand::RegisterDevice {
            token: token.to_string(),
        });

        if let Some(err) = &self.options.fail_registration {
            return Err(err.clone());
        }

        self.lock().events = Some(events);

        if self.options.auto_register {
            self.emit(SdkEvent::Registered);
            self.emit(SdkEvent::ListenStarted);
        }
        Ok(RegistrationHandle::new())
    }

    async fn listen(&self, _device: &RegistrationHandle) -> Result<(), ListenError> {
        self.record(SdkCommand::Listen);
        match &self.options.fail_listen {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn unlisten(&self, _device: &RegistrationHandle) {
        self.record(SdkCommand::Unlisten);
    }

    async fn set_sounds(&self, _device: &RegistrationHandle, sounds: SoundOptions) {
        self.record(SdkCommand::SetSounds(sounds));
    }

    async fn connect(&self, source_id: &str, target: &str) -> Result<ConnectionHandle, ConnectError> {
        self.record(SdkCommand::Connect {
            source_id: source_id.to_string(),
            target: target.to_string(),
        });

        if let Some(err) = &self.options.fail_connect {
            return Err(err.clone());
        }

        let handle = ConnectionHandle::new();
        self.lock().last_connection = Some(handle);
        if self.options.auto_answer {
            self.emit(SdkEvent::Connected { handle });
        }
        Ok(handle)
    }

    async fn accept(&self, connection: &ConnectionHandle) {
        self.record(SdkCommand::Accept(*connection));
    }

    async fn reject(&self, connection: &ConnectionHandle) {
        self.record(SdkCommand::Reject(*connection));
    }

    async fn disconnect(&self, connection: &ConnectionHandle) {
        self.record(SdkCommand::Disconnect(*connection));
    }

    async fn set_muted(&self, connection: &ConnectionHandle, muted: bool) {
        self.record(SdkCommand::SetMuted(*connection, muted));
    }
}
