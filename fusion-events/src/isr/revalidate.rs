//! Outbound revalidation requests

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum RevalidateError {
    /// The request never produced a response
    #[error("revalidation request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failure reported by a `Revalidator` that does not go through reqwest
    #[error("revalidation failed: {0}")]
    Other(String),
}

/// Asks the front-end to regenerate one path
#[async_trait]
pub trait Revalidator: Send + Sync {
    async fn revalidate(&self, path: &str) -> Result<(), RevalidateError>;
}

/// `GET <url>?path=<path>` against the site's revalidation endpoint
///
/// Only network-level failures count; the response status and body are not
/// inspected.
#[derive(Debug, Clone)]
pub struct HttpRevalidator {
    url: String,
    client: Client,
}

impl HttpRevalidator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RevalidateError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(url, client))
    }

    /// Uses a preconfigured client (proxies, TLS, ...)
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, RevalidateError> {
        Self::new(config.revalidate_url.clone(), config.http_timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Revalidator for HttpRevalidator {
    async fn revalidate(&self, path: &str) -> Result<(), RevalidateError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("path", path)])
            .send()
            .await?;

        tracing::debug!(path, status = %response.status(), "Revalidation request sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_keeps_url() {
        let config = Config::new("http://localhost:3001/api/revalidate");
        let revalidator = HttpRevalidator::from_config(&config).unwrap();
        assert_eq!(revalidator.url(), "http://localhost:3001/api/revalidate");
    }

    #[tokio::test]
    async fn test_sends_one_get_with_encoded_path() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            let head = String::from_utf8(head).unwrap();
            head.lines().next().unwrap_or_default().to_string()
        });

        let revalidator = HttpRevalidator::new(
            format!("http://{}/api/revalidate", addr),
            Duration::from_secs(2),
        )
        .unwrap();

        // Status codes are not inspected
        revalidator.revalidate("/category/C%23").await.unwrap();

        let request_line = server.await.unwrap();
        assert_eq!(
            request_line,
            "GET /api/revalidate?path=%2Fcategory%2FC%2523 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let revalidator =
            HttpRevalidator::new("http://127.0.0.1:9/api/revalidate", Duration::from_millis(500))
                .unwrap();

        let err = revalidator.revalidate("/about").await.unwrap_err();
        assert!(matches!(err, RevalidateError::RequestFailed(_)));
    }
}
