/// 设备注册状态机
///
/// 设备在启动时凭令牌创建一次，注册成功后进入 Listening，
/// 进入 Failed 后不可复活，需要新的注册对象
use std::fmt;

use tracing::{debug, info, warn};

use crate::sdk::RegistrationHandle;

/// 设备注册状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Unregistered,
    Registering,
    Listening,
    Stopped,
    Failed,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeviceState::Unregistered => "Unregistered",
            DeviceState::Registering => "Registering",
            DeviceState::Listening => "Listening",
            DeviceState::Stopped => "Stopped",
            DeviceState::Failed => "Failed",
        };
        f.write_str(text)
    }
}

/// 提示音开关，直接透传给 SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundOptions {
    pub incoming: bool,
    pub outgoing: bool,
    pub disconnect: bool,
}

impl Default for SoundOptions {
    fn default() -> Self {
        Self {
            incoming: true,
            outgoing: true,
            disconnect: true,
        }
    }
}

/// 设备注册
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistration {
    pub state: DeviceState,
    pub sounds: SoundOptions,
    /// SDK 返回的注册句柄（注册成功前为空）
    pub handle: Option<RegistrationHandle>,
    pub error_code: Option<i32>,
    pub error_message: Option<String>,
}

impl DeviceRegistration {
    pub fn new(sounds: SoundOptions) -> Self {
        Self {
            state: DeviceState::Unregistered,
            sounds,
            handle: None,
            error_code: None,
            error_message: None,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.state == DeviceState::Listening
    }

    pub fn is_failed(&self) -> bool {
        self.state == DeviceState::Failed
    }

    pub fn incoming_sound_enabled(&self) -> bool {
        self.sounds.incoming
    }

    pub fn outgoing_sound_enabled(&self) -> bool {
        self.sounds.outgoing
    }

    pub fn disconnect_sound_enabled(&self) -> bool {
        self.sounds.disconnect
    }

    /// Unregistered -> Registering
    pub fn begin_registering(&mut self) -> bool {
        self.advance(&[DeviceState::Unregistered], DeviceState::Registering)
    }

    /// Registering -> Listening（注册成功）
    pub fn registered(&mut self) -> bool {
        self.advance(&[DeviceState::Registering], DeviceState::Listening)
    }

    /// Registering/Stopped -> Listening（开始监听）
    pub fn listen_started(&mut self) -> bool {
        self.advance(
            &[DeviceState::Registering, DeviceState::Stopped],
            DeviceState::Listening,
        )
    }

    /// Listening -> Stopped
    pub fn listen_stopped(&mut self) -> bool {
        self.advance(&[DeviceState::Listening], DeviceState::Stopped)
    }

    /// Registering -> Failed（注册错误）
    pub fn registration_failed(&mut self, code: Option<i32>, message: impl Into<String>) -> bool {
        if self.state != DeviceState::Registering {
            debug!("忽略注册失败事件: 当前状态 {}", self.state);
            return false;
        }
        self.fail(code, message.into());
        true
    }

    /// 任意状态 -> Failed（监听错误、令牌获取失败）
    pub fn fail_any(&mut self, code: Option<i32>, message: impl Into<String>) -> bool {
        if self.state == DeviceState::Failed {
            debug!("设备已处于 Failed 状态");
            return false;
        }
        self.fail(code, message.into());
        true
    }

    fn fail(&mut self, code: Option<i32>, message: String) {
        warn!("设备注册失败: {} -> Failed ({:?} {})", self.state, code, message);
        self.state = DeviceState::Failed;
        self.error_code = code;
        self.error_message = Some(message);
    }

    fn advance(&mut self, from: &[DeviceState], to: DeviceState) -> bool {
        if !from.contains(&self.state) {
            debug!("设备状态 {} 不能迁移到 {}", self.state, to);
            return false;
        }
        info!("设备状态: {} -> {}", self.state, to);
        self.state = to;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_then_listen() {
        let mut device = DeviceRegistration::new(SoundOptions::default());
        assert!(device.begin_registering());
        assert!(device.registered());
        assert!(device.is_listening());
        // 已在 Listening，重复事件不算迁移
        assert!(!device.listen_started());
    }

    #[test]
    fn test_stop_and_restart() {
        let mut device = DeviceRegistration::new(SoundOptions::default());
        device.begin_registering();
        device.listen_started();
        assert!(device.listen_stopped());
        assert_eq!(device.state, DeviceState::Stopped);
        assert!(device.listen_started());
        assert_eq!(device.state, DeviceState::Listening);
    }

    #[test]
    fn test_registration_failed_only_while_registering() {
        let mut device = DeviceRegistration::new(SoundOptions::default());
        assert!(!device.registration_failed(Some(500), "server error"));
        assert_eq!(device.state, DeviceState::Unregistered);

        device.begin_registering();
        assert!(device.registration_failed(Some(500), "server error"));
        assert_eq!(device.state, DeviceState::Failed);
        assert_eq!(device.error_code, Some(500));
        assert_eq!(device.error_message.as_deref(), Some("server error"));
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut device = DeviceRegistration::new(SoundOptions::default());
        device.begin_registering();
        device.registered();
        assert!(device.fail_any(Some(31000), "listen error"));

        assert!(!device.begin_registering());
        assert!(!device.listen_started());
        assert!(!device.registered());
        assert!(!device.fail_any(Some(1), "again"));
        assert_eq!(device.error_code, Some(31000));
    }

    #[test]
    fn test_cannot_begin_twice() {
        let mut device = DeviceRegistration::new(SoundOptions::default());
        assert!(device.begin_registering());
        assert!(!device.begin_registering());
    }
}
