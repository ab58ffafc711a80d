//! HTTP snapshot fetcher using `reqwest`.
//!
//! Used by the poll loop: `GET /api/games/{id}` returns the snapshot JSON on
//! success and `{"error": "..."}` with a non-2xx status otherwise.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::ClientError;
use crate::error_codes::ActionRejection;
use crate::protocol::ErrorBody;
use crate::transport::SnapshotFetcher;

/// [`SnapshotFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the HTTP client cannot be built
    /// (e.g. no TLS backend available).
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    /// Reuse an existing client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ClientError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::Fetch(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Fetch(e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .map(|b| b.error)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Unable to load game status.".to_string());
        tracing::debug!(url = %url, status = status.as_u16(), message = %message, "snapshot fetch rejected");
        Err(ClientError::Authority {
            status: status.as_u16(),
            rejection: ActionRejection::classify(status.as_u16(), &message),
            message,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and return the URL to fetch.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/api/games/g1")
    }

    #[tokio::test]
    async fn success_returns_body() {
        let url = serve_once("200 OK", r#"{"phase":"lobby"}"#).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        assert_eq!(fetcher.fetch(&url).await.unwrap(), r#"{"phase":"lobby"}"#);
    }

    #[tokio::test]
    async fn error_body_is_classified() {
        let url = serve_once("404 Not Found", r#"{"error":"game not found"}"#).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        match fetcher.fetch(&url).await.unwrap_err() {
            ClientError::Authority {
                status,
                message,
                rejection,
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "game not found");
                assert_eq!(rejection, ActionRejection::NotFound);
            }
            other => panic!("expected authority error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_error_body_gets_fallback_message() {
        let url = serve_once("500 Internal Server Error", "oops").await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(
            matches!(err, ClientError::Authority { ref message, .. } if message == "Unable to load game status.")
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fetch_error() {
        let fetcher = HttpFetcher::new(Duration::from_secs(2)).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:1/api/games/g1").await.unwrap_err();
        assert!(matches!(err, ClientError::Fetch(_) | ClientError::Timeout));
    }
}
