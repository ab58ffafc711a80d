//! Concrete transports behind feature gates.
//!
//! | Feature                | Provides |
//! |------------------------|----------|
//! | `transport-websocket`  | [`WebSocketPush`], [`WebSocketConnector`] |
//! | `transport-http`       | [`HttpFetcher`] |
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), picture_this_client::ClientError> {
//! use picture_this_client::transport::{PushChannel, SnapshotFetcher};
//! use picture_this_client::{HttpFetcher, WebSocketPush};
//!
//! let mut push = WebSocketPush::connect("ws://localhost:8080/ws/games/g1?role=display").await?;
//! if let Some(Ok(frame)) = push.recv().await {
//!     println!("pushed: {frame}");
//! }
//!
//! let fetcher = HttpFetcher::new(std::time::Duration::from_secs(10))?;
//! let snapshot = fetcher.fetch("http://localhost:8080/api/games/g1").await?;
//! println!("fetched: {snapshot}");
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-http")]
pub mod http;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketPush};

#[cfg(feature = "transport-http")]
pub use http::HttpFetcher;
