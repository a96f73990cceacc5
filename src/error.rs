use thiserror::Error;

use crate::call::CallState;
use crate::device::DeviceState;

/// 获取令牌失败（HTTP 令牌服务）
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("令牌请求失败: {0}")]
    Request(#[from] reqwest::Error),

    #[error("令牌服务返回状态码 {status}: {body}")]
    Status { status: u16, body: String },

    #[error("令牌服务返回空令牌")]
    EmptyToken,

    #[error("令牌请求超时: {duration}ms")]
    Timeout { duration: u64 },
}

/// 设备注册失败，携带 SDK 提供的错误码和消息
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("注册失败: {code} {message}")]
pub struct RegistrationError {
    pub code: i32,
    pub message: String,
}

impl RegistrationError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// 监听失败，携带 SDK 提供的错误码和消息
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("监听失败: {code} {message}")]
pub struct ListenError {
    pub code: i32,
    pub message: String,
}

impl ListenError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// 外呼连接无法发起
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("呼叫发起失败: {code} {message}")]
pub struct ConnectError {
    pub code: i32,
    pub message: String,
}

impl ConnectError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    Missing(String),
}

/// 会话管理器操作的Result类型别名
pub type SessionResult<T> = Result<T, SessionError>;

/// 会话管理器错误类型
///
/// 本地前置条件错误不会修改任何状态；协作方错误已被记录到对应实体的 Failed 状态
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("网络错误: {0}")]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Listen(#[from] ListenError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("已有进行中的呼叫")]
    AlreadyInCall,

    #[error("状态 {state} 下不允许操作 {operation}")]
    InvalidStateTransition {
        state: String,
        operation: &'static str,
    },

    #[error("呼叫未接通")]
    NotConnected,

    #[error("设备未就绪: {state}")]
    DeviceNotReady { state: DeviceState },

    #[error("呼叫目标无效: {target}")]
    InvalidTarget { target: String },
}

impl SessionError {
    /// 呼叫状态非法迁移
    pub fn invalid_call_transition(state: CallState, operation: &'static str) -> Self {
        SessionError::InvalidStateTransition {
            state: state.to_string(),
            operation,
        }
    }

    /// 设备状态非法迁移
    pub fn invalid_device_transition(state: DeviceState, operation: &'static str) -> Self {
        SessionError::InvalidStateTransition {
            state: state.to_string(),
            operation,
        }
    }

    pub fn invalid_target(target: impl Into<String>) -> Self {
        SessionError::InvalidTarget {
            target: target.into(),
        }
    }

    /// 判断错误是否可恢复（不需要重建注册即可重试）
    pub fn is_recoverable(&self) -> bool {
        match self {
            SessionError::Network(_) => false,
            SessionError::Registration(_) => false,
            SessionError::Listen(_) => false,
            SessionError::Connect(_) => true,
            SessionError::Config(_) => false,
            SessionError::AlreadyInCall => true,
            SessionError::InvalidStateTransition { .. } => true,
            SessionError::NotConnected => true,
            SessionError::DeviceNotReady { .. } => true,
            SessionError::InvalidTarget { .. } => true,
        }
    }

    /// 获取标准错误代码，用于日志分析
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::Network(_) => "NETWORK_ERROR",
            SessionError::Registration(_) => "REGISTRATION_FAILED",
            SessionError::Listen(_) => "LISTEN_FAILED",
            SessionError::Connect(_) => "CONNECT_FAILED",
            SessionError::Config(_) => "CONFIG_ERROR",
            SessionError::AlreadyInCall => "ALREADY_IN_CALL",
            SessionError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            SessionError::NotConnected => "NOT_CONNECTED",
            SessionError::DeviceNotReady { .. } => "DEVICE_NOT_READY",
            SessionError::InvalidTarget { .. } => "INVALID_TARGET",
        }
    }

    /// 获取 SDK 错误码（如果有）
    pub fn collaborator_code(&self) -> Option<i32> {
        match self {
            SessionError::Registration(e) => Some(e.code),
            SessionError::Listen(e) => Some(e.code),
            SessionError::Connect(e) => Some(e.code),
            _ => None,
        }
    }
}
