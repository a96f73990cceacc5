use std::time::Duration;

use crate::device::SoundOptions;
use crate::error::ConfigError;

/// 默认令牌请求超时
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// 会话管理器配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 令牌服务地址（http/https）
    pub token_endpoint: String,

    /// 外呼时使用的固定主叫标识
    pub source_id: String,

    /// 令牌请求超时
    pub token_timeout: Duration,

    /// 初始提示音开关
    pub sounds: SoundOptions,

    /// 来电自动接听
    pub auto_answer: bool,
}

impl Config {
    pub fn new(token_endpoint: &str, source_id: &str) -> Result<Self, ConfigError> {
        let token_endpoint = token_endpoint.trim();
        let source_id = source_id.trim();

        if token_endpoint.is_empty() {
            return Err(ConfigError::Missing("token_endpoint".to_string()));
        }
        if source_id.is_empty() {
            return Err(ConfigError::Missing("source_id".to_string()));
        }
        if !token_endpoint.starts_with("http://") && !token_endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "token_endpoint must be an http(s) URL: {}",
                token_endpoint
            )));
        }

        Ok(Self {
            token_endpoint: token_endpoint.to_string(),
            source_id: source_id.to_string(),
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
            sounds: SoundOptions::default(),
            auto_answer: false,
        })
    }

    pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout = timeout;
        self
    }

    pub fn with_sounds(mut self, sounds: SoundOptions) -> Self {
        self.sounds = sounds;
        self
    }

    pub fn with_auto_answer(mut self, auto_answer: bool) -> Self {
        self.auto_answer = auto_answer;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_defaults() {
        let config = Config::new("https://example.com/Client/Token", "+12152407664").unwrap();
        assert_eq!(config.token_timeout, DEFAULT_TOKEN_TIMEOUT);
        assert!(!config.auto_answer);
        assert_eq!(config.sounds, SoundOptions::default());
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(
            Config::new("", "+12152407664"),
            Err(ConfigError::Missing(_))
        ));
        assert!(matches!(
            Config::new("https://example.com", "  "),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            Config::new("ftp://example.com/token", "+12152407664"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_builders() {
        let config = Config::new("http://localhost:8080/token", "xamarin")
            .unwrap()
            .with_token_timeout(Duration::from_secs(3))
            .with_auto_answer(true)
            .with_sounds(SoundOptions {
                incoming: false,
                outgoing: true,
                disconnect: false,
            });

        assert_eq!(config.token_timeout, Duration::from_secs(3));
        assert!(config.auto_answer);
        assert!(!config.sounds.incoming);
    }
}
