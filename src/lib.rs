// 声明所有模块
pub mod call;
pub mod config;
pub mod device;
pub mod error;
pub mod manager;
pub mod notify;
pub mod sdk;
pub mod utils;

use std::sync::Arc;

/// 重新导出thiserror错误类型
pub use crate::error::{
    ConfigError, ConnectError, ListenError, NetworkError, RegistrationError, SessionError,
    SessionResult,
};

/// 主要API重新导出，简化使用
pub use crate::call::{CallDirection, CallSession, CallState};
pub use crate::config::Config as SessionConfig;
pub use crate::device::{DeviceRegistration, DeviceState, SoundOptions};
pub use crate::manager::{SessionManager, Snapshot};
pub use crate::notify::{StatusListener, SubscriptionHandle};
pub use crate::sdk::{
    ConnectionHandle, HttpTokenProvider, LoopbackSdk, RegistrationHandle, SdkEvent, TelephonySdk,
    TokenProvider,
};

/// 库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 便捷函数：用令牌服务地址和主叫标识创建会话管理器（尚未注册）
pub fn create_session_manager(
    token_endpoint: &str,
    source_id: &str,
    sdk: Arc<dyn TelephonySdk>,
) -> SessionResult<Arc<SessionManager>> {
    let config = SessionConfig::new(token_endpoint, source_id)?;
    Ok(SessionManager::new(config, sdk))
}

/// 便捷函数：创建会话管理器，通过 HTTP 获取令牌并注册设备
///
/// 令牌获取或注册失败时返回错误，此时设备已处于 Failed 状态
pub async fn connect_device(
    config: SessionConfig,
    sdk: Arc<dyn TelephonySdk>,
) -> SessionResult<Arc<SessionManager>> {
    let provider = HttpTokenProvider::new(config.token_timeout)?;
    let manager = SessionManager::new(config, sdk);
    manager.start(&provider).await?;
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_create_session_manager() {
        let sdk: Arc<dyn TelephonySdk> = Arc::new(LoopbackSdk::default());
        let manager =
            create_session_manager("https://example.com/Client/Token", "+12152407664", sdk)
                .unwrap();
        assert_eq!(manager.device_state().state, DeviceState::Unregistered);
        assert!(manager.call_state().is_none());
    }

    #[tokio::test]
    async fn test_create_session_manager_bad_config() {
        let sdk: Arc<dyn TelephonySdk> = Arc::new(LoopbackSdk::default());
        let result = create_session_manager("not a url", "+12152407664", sdk);
        assert!(matches!(result, Err(SessionError::Config(_))));
    }
}
