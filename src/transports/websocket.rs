//! WebSocket push subscription using `tokio-tungstenite`.
//!
//! [`WebSocketPush`] is a [`PushChannel`] over one WebSocket connection and
//! [`WebSocketConnector`] opens them for the connection loop. Both `ws://`
//! and `wss://` URLs are supported; TLS is handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! The authority never expects anything from the client on this socket, so
//! only the read half is used (besides the close handshake).

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::ClientError;
use crate::transport::{PushChannel, PushConnector};

/// Underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A push subscription backed by a WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](PushChannel::recv) is cancel-safe: a frame is only taken from
/// the stream when the future completes.
#[derive(Debug)]
pub struct WebSocketPush {
    stream: WsStream,
    closed: bool,
}

impl WebSocketPush {
    /// Open a subscription to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::PushConnect`] if the URL is invalid or the
    /// handshake fails.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        tracing::debug!(url = %url, "opening push subscription");

        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ClientError::PushConnect(e.to_string()))?;

        tracing::info!(url = %url, "push subscription established");

        Ok(Self::from_stream(stream))
    }

    /// Same as [`connect`](Self::connect), bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] if the deadline elapses first.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self, ClientError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    /// Wrap an already-established stream (custom TLS, headers, proxies).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl PushChannel for WebSocketPush {
    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        if self.closed {
            return None;
        }
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Some(Err(ClientError::PushReceive(e.to_string()))),
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "push subscription closed by authority");
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // tungstenite answers pings itself.
                }
                Message::Binary(_) => {
                    tracing::warn!("skipping binary push frame");
                }
                Message::Frame(_) => {
                    tracing::debug!("skipping raw push frame");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| ClientError::PushReceive(e.to_string()))
    }
}

/// Opens [`WebSocketPush`] subscriptions for the connection loop.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    connect_timeout: Option<Duration>,
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every handshake by `timeout`.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl PushConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn PushChannel>, ClientError> {
        let push = match self.connect_timeout {
            Some(timeout) => WebSocketPush::connect_with_timeout(url, timeout).await?,
            None => WebSocketPush::connect(url).await?,
        };
        Ok(Box::new(push))
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
    use futures_util::SinkExt;
    use tokio::net::TcpListener;

    #[test]
    fn websocket_push_is_send_and_debug() {
        fn assert_traits<T: Send + std::fmt::Debug>() {}
        assert_traits::<WebSocketPush>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketPush::connect("not-a-valid-url").await.unwrap_err();
        assert!(matches!(err, ClientError::PushConnect(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let err = WebSocketPush::connect("ws://127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, ClientError::PushConnect(_)));
    }

    /// Start a local WebSocket server running `handler` on one connection.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}/ws/games/g1?role=display")
    }

    #[tokio::test]
    async fn recv_yields_text_frames_in_order() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"phase":"lobby"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"phase":"drawings"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut push = WebSocketPush::connect(&url).await.unwrap();
        assert_eq!(push.recv().await.unwrap().unwrap(), r#"{"phase":"lobby"}"#);
        assert_eq!(
            push.recv().await.unwrap().unwrap(),
            r#"{"phase":"drawings"}"#
        );
        assert!(push.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("after_binary".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut push = WebSocketPush::connect(&url).await.unwrap();
        assert_eq!(push.recv().await.unwrap().unwrap(), "after_binary");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_ends_recv() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut push = WebSocketPush::connect(&url).await.unwrap();
        push.close().await.unwrap();
        push.close().await.unwrap();
        assert!(push.recv().await.is_none());
    }

    #[tokio::test]
    async fn connector_applies_timeout() {
        let connector = WebSocketConnector::new().with_connect_timeout(Duration::from_millis(50));
        // Non-routable address.
        let err = connector.connect("ws://192.0.2.1:1").await.err().unwrap();
        assert!(matches!(err, ClientError::Timeout | ClientError::PushConnect(_)));
    }

    #[tokio::test]
    async fn connector_opens_boxed_channel() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text("hello".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut push = WebSocketConnector::new().connect(&url).await.unwrap();
        assert_eq!(push.recv().await.unwrap().unwrap(), "hello");
    }
}
