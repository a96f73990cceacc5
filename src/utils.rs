/// 工具函数模块
///
/// 日志初始化与呼叫目标解析
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::Level;

use crate::error::{SessionError, SessionResult};

/// 初始化日志输出
///
/// `level` 取值 trace/debug/info/warn/error，无法识别时使用 info。
/// 重复调用不会报错
pub fn initialize_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// 呼叫目标：电话号码或客户端名
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Phone(String),
    Client(String),
}

impl Target {
    pub fn as_str(&self) -> &str {
        match self {
            Target::Phone(number) => number,
            Target::Client(name) => name,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn phone_regex() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[0-9]{3,15}$").expect("valid phone pattern"))
}

fn client_regex() -> &'static Regex {
    static CLIENT: OnceLock<Regex> = OnceLock::new();
    CLIENT.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.-]*$").expect("valid client pattern"))
}

/// 解析呼叫目标
///
/// 电话号码会去掉空格、横线和括号，例如 "+1 (555) 123-4567" -> "+15551234567"
///
/// # 示例
/// ```rust
/// use call_session::utils::{classify_target, Target};
///
/// let target = classify_target("+1 (555) 123-4567").unwrap();
/// assert_eq!(target, Target::Phone("+15551234567".to_string()));
/// ```
pub fn classify_target(raw: &str) -> SessionResult<Target> {
    let trimmed = raw.trim();

    let compact: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if phone_regex().is_match(&compact) {
        return Ok(Target::Phone(compact));
    }

    if client_regex().is_match(trimmed) {
        return Ok(Target::Client(trimmed.to_string()));
    }

    Err(SessionError::invalid_target(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_phone() {
        assert_eq!(
            classify_target("+15551234567").unwrap(),
            Target::Phone("+15551234567".to_string())
        );
        assert_eq!(
            classify_target(" 555-1234 ").unwrap(),
            Target::Phone("5551234".to_string())
        );
    }

    #[test]
    fn test_classify_client() {
        assert_eq!(
            classify_target("xamarin").unwrap(),
            Target::Client("xamarin".to_string())
        );
        assert_eq!(
            classify_target("support.desk_2").unwrap(),
            Target::Client("support.desk_2".to_string())
        );
    }

    #[test]
    fn test_classify_invalid() {
        assert!(classify_target("").is_err());
        assert!(classify_target("   ").is_err());
        assert!(classify_target("alice bob").is_err());
        assert!(classify_target("+12").is_err());
        let err = classify_target("@@").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TARGET");
    }

    #[test]
    fn test_initialize_logging_twice() {
        initialize_logging("debug");
        initialize_logging("not-a-level");
    }
}
