/// 呼叫会话状态机
///
/// 每个会话从拨号/来电开始，到 Disconnected 或 Failed 结束；
/// 终止后的会话不会被复用，下一通呼叫总是新建会话
use std::fmt;

use tracing::info;

use crate::error::{SessionError, SessionResult};
use crate::sdk::ConnectionHandle;

/// 呼叫状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    Idle,
    Connecting,
    /// 来电未接听
    Ringing,
    Connected,
    Disconnected,
    Failed,
}

impl CallState {
    /// 是否为活动状态（Connecting/Ringing/Connected）
    pub fn is_active(self) -> bool {
        matches!(
            self,
            CallState::Connecting | CallState::Ringing | CallState::Connected
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Disconnected | CallState::Failed)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CallState::Idle => "Idle",
            CallState::Connecting => "Connecting",
            CallState::Ringing => "Ringing",
            CallState::Connected => "Connected",
            CallState::Disconnected => "Disconnected",
            CallState::Failed => "Failed",
        };
        f.write_str(text)
    }
}

/// 呼叫方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallDirection {
    Outbound,
    Inbound,
}

/// 一通呼叫
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    pub handle: ConnectionHandle,
    pub state: CallState,
    pub direction: CallDirection,
    /// 外呼目标，或来电的 From 字段
    pub target: String,
    pub muted: bool,
    pub error_code: Option<i32>,
    pub error_message: Option<String>,
}

impl CallSession {
    /// 新建外呼会话，初始状态 Connecting
    pub fn outbound(handle: ConnectionHandle, target: impl Into<String>) -> Self {
        Self::with_state(handle, CallState::Connecting, CallDirection::Outbound, target.into())
    }

    /// 新建来电会话，初始状态 Ringing
    pub fn inbound(handle: ConnectionHandle, from: impl Into<String>) -> Self {
        Self::with_state(handle, CallState::Ringing, CallDirection::Inbound, from.into())
    }

    fn with_state(
        handle: ConnectionHandle,
        state: CallState,
        direction: CallDirection,
        target: String,
    ) -> Self {
        Self {
            handle,
            state,
            direction,
            target,
            muted: false,
            error_code: None,
            error_message: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Connecting -> Connected（SDK 通知已接通）
    ///
    /// 返回 false 表示不是一次迁移
    pub fn connected(&mut self) -> bool {
        if self.state != CallState::Connecting {
            return false;
        }
        self.move_to(CallState::Connected);
        true
    }

    /// Ringing -> Connected
    pub fn accept(&mut self) -> SessionResult<()> {
        self.require(CallState::Ringing, "accept_incoming")?;
        self.move_to(CallState::Connected);
        Ok(())
    }

    /// Ringing -> Disconnected
    pub fn reject(&mut self) -> SessionResult<()> {
        self.require(CallState::Ringing, "reject_incoming")?;
        self.move_to(CallState::Disconnected);
        Ok(())
    }

    /// Connecting/Ringing/Connected -> Disconnected（本端挂断）
    pub fn hang_up(&mut self) -> SessionResult<()> {
        if !self.is_active() {
            return Err(SessionError::invalid_call_transition(self.state, "hang_up"));
        }
        self.move_to(CallState::Disconnected);
        Ok(())
    }

    /// 对端挂断
    pub fn remote_disconnected(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.move_to(CallState::Disconnected);
        true
    }

    /// 带错误的断开，进入 Failed
    pub fn failed(&mut self, code: i32, message: impl Into<String>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.error_code = Some(code);
        self.error_message = Some(message.into());
        self.move_to(CallState::Failed);
        true
    }

    /// 静音只在 Connected 时有意义
    pub fn set_muted(&mut self, muted: bool) -> SessionResult<()> {
        if self.state != CallState::Connected {
            return Err(SessionError::NotConnected);
        }
        self.muted = muted;
        Ok(())
    }

    fn require(&self, expected: CallState, operation: &'static str) -> SessionResult<()> {
        if self.state != expected {
            return Err(SessionError::invalid_call_transition(self.state, operation));
        }
        Ok(())
    }

    fn move_to(&mut self, next: CallState) {
        info!("呼叫 {} 状态: {} -> {}", self.handle, self.state, next);
        self.state = next;
        if next != CallState::Connected {
            self.muted = false;
        }
    }
}
