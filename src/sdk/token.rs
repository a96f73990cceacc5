/// HTTP 令牌服务
///
/// 对令牌地址发起 GET，响应体（去掉首尾空白）即为令牌
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use super::traits::TokenProvider;
use crate::error::NetworkError;

#[derive(Clone)]
pub struct HttpTokenProvider {
    client: Client,
    timeout: Duration,
}

impl HttpTokenProvider {
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder().build()?;
        Ok(Self { client, timeout })
    }

    async fn request_token(&self, endpoint: &str) -> Result<String, NetworkError> {
        let response = self.client.get(endpoint).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("令牌服务返回 {}: {}", status, body);
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token = response.text().await?.trim().to_string();
        if token.is_empty() {
            return Err(NetworkError::EmptyToken);
        }
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch_auth_token(&self, endpoint: &str) -> Result<String, NetworkError> {
        info!("正在获取令牌: {}", endpoint);

        let token = tokio::time::timeout(self.timeout, self.request_token(endpoint))
            .await
            .map_err(|_| NetworkError::Timeout {
                duration: self.timeout.as_millis() as u64,
            })??;

        debug!("令牌长度: {}", token.len());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider() -> HttpTokenProvider {
        HttpTokenProvider::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_token_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/Client/Token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("abc.def.ghi\n"))
            .mount(&mock_server)
            .await;

        let endpoint = format!("{}/Client/Token", mock_server.uri());
        let token = provider().fetch_auth_token(&endpoint).await.unwrap();
        assert_eq!(token, "abc.def.ghi");
    }

    #[tokio::test]
    async fn test_fetch_token_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/Client/Token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&mock_server)
            .await;

        let endpoint = format!("{}/Client/Token", mock_server.uri());
        let result = provider().fetch_auth_token(&endpoint).await;

        match result {
            Err(NetworkError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_token_empty_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/Client/Token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   "))
            .mount(&mock_server)
            .await;

        let endpoint = format!("{}/Client/Token", mock_server.uri());
        let result = provider().fetch_auth_token(&endpoint).await;
        assert!(matches!(result, Err(NetworkError::EmptyToken)));
    }

    #[tokio::test]
    async fn test_fetch_token_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/Client/Token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let provider = HttpTokenProvider::new(Duration::from_millis(100)).unwrap();
        let endpoint = format!("{}/Client/Token", mock_server.uri());
        let result = provider.fetch_auth_token(&endpoint).await;
        assert!(matches!(result, Err(NetworkError::Timeout { duration: 100 })));
    }
}
