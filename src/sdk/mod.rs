/// 协作方 SDK 模块
///
/// ## 设计
///
/// - `TelephonySdk` trait: 外部电话 SDK 的能力集（注册、监听、呼叫控制）
/// - `TokenProvider` trait: 获取认证令牌
/// - `HttpTokenProvider`: 基于 HTTP GET 的令牌服务
/// - `LoopbackSdk`: 进程内模拟 SDK，用于命令行演示和测试
///
/// SDK 的所有回调统一为 `SdkEvent`，通过注册时交出的 `EventSender` 投递
///
/// ## 使用示例
///
/// ```rust,no_run
/// use call_session::sdk::*;
/// use std::sync::Arc;
///
/// let sdk: Arc<dyn TelephonySdk> = Arc::new(LoopbackSdk::auto());
/// ```

mod loopback;
mod token;
mod traits;

// 导出公共接口
pub use loopback::{LoopbackOptions, LoopbackSdk, SdkCommand};
pub use token::HttpTokenProvider;
pub use traits::{
    ConnectionHandle, EventSender, RegistrationHandle, SdkEvent, TelephonySdk, TokenProvider,
};
