/// 协作方 SDK 接口定义
///
/// 信令、媒体和设备注册都委托给外部电话 SDK，这里只定义管理器需要的能力
use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::device::SoundOptions;
use crate::error::{ConnectError, ListenError, NetworkError, RegistrationError};

/// SDK 连接句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(Uuid);

impl ConnectionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// SDK 设备注册句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationHandle(Uuid);

impl RegistrationHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistrationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device-{}", self.0)
    }
}

/// SDK 异步事件
///
/// 设备监听、连接监听和初始化监听的回调统一为一个事件类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkEvent {
    Registered,
    RegistrationFailed { code: i32, message: String },
    ListenStarted,
    ListenStopped,
    ListenFailed { code: i32, message: String },
    IncomingConnection { handle: ConnectionHandle, from: String },
    Connected { handle: ConnectionHandle },
    Disconnected { handle: ConnectionHandle },
    DisconnectedWithError {
        handle: ConnectionHandle,
        code: i32,
        message: String,
    },
}

/// 事件投递地址，注册时交给 SDK
pub type EventSender = mpsc::UnboundedSender<SdkEvent>;

/// 令牌服务
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// 从令牌服务获取认证令牌
    async fn fetch_auth_token(&self, endpoint: &str) -> Result<String, NetworkError>;
}

/// 电话 SDK 能力集
#[async_trait]
pub trait TelephonySdk: Send + Sync {
    /// 用令牌注册设备
    ///
    /// # 参数
    /// - `token`: 认证令牌
    /// - `events`: SDK 的所有异步事件都投递到这里
    async fn register_device(
        &self,
        token: &str,
        events: EventSender,
    ) -> Result<RegistrationHandle, RegistrationError>;

    /// 开始监听来电
    async fn listen(&self, device: &RegistrationHandle) -> Result<(), ListenError>;

    /// 停止监听来电
    async fn unlisten(&self, device: &RegistrationHandle);

    /// 提示音开关
    async fn set_sounds(&self, device: &RegistrationHandle, sounds: SoundOptions);

    /// 发起外呼
    async fn connect(&self, source_id: &str, target: &str) -> Result<ConnectionHandle, ConnectError>;

    async fn accept(&self, connection: &ConnectionHandle);

    async fn reject(&self, connection: &ConnectionHandle);

    async fn disconnect(&self, connection: &ConnectionHandle);

    async fn set_muted(&self, connection: &ConnectionHandle, muted: bool);
}
