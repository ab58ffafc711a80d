//! Transport seams for receiving authority state.
//!
//! The engine is receive-only: actions are submitted by a separate request
//! path. State arrives over two channels:
//!
//! - a persistent push subscription ([`PushChannel`], opened by a
//!   [`PushConnector`]) delivering JSON text frames, and
//! - a one-shot snapshot fetch ([`SnapshotFetcher`]) used by the poll loop
//!   while push is unavailable.
//!
//! Connection parameters are plain URLs; see
//! [`Endpoints`](crate::connection::Endpoints) for how they are derived.
//!
//! # Implementing a custom push channel
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use picture_this_client::error::ClientError;
//! use picture_this_client::transport::PushChannel;
//! use tokio::sync::mpsc;
//!
//! struct ChannelPush(mpsc::Receiver<String>);
//!
//! #[async_trait]
//! impl PushChannel for ChannelPush {
//!     async fn recv(&mut self) -> Option<Result<String, ClientError>> {
//!         // `mpsc::Receiver::recv` is cancel-safe.
//!         self.0.recv().await.map(Ok)
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ClientError> {
//!         self.0.close();
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ClientError;

/// An open push subscription delivering text frames.
///
/// # Cancel Safety
///
/// [`recv`](PushChannel::recv) **MUST** be cancel-safe: it is polled inside
/// `tokio::select!` next to the poll and reconnect timers. Dropping the future
/// before it completes must not lose a frame.
#[async_trait]
pub trait PushChannel: Send + 'static {
    /// Receive the next frame.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame
    /// - `Some(Err(e))`: the subscription failed
    ///   (e.g. [`ClientError::PushReceive`])
    /// - `None`: the subscription was closed by the authority
    async fn recv(&mut self) -> Option<Result<String, ClientError>>;

    /// Close the subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources are released
    /// either way.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Opens push subscriptions.
#[async_trait]
pub trait PushConnector: Send + Sync + 'static {
    /// Open a subscription to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::PushConnect`] (or a more specific error) when
    /// the subscription cannot be established.
    async fn connect(&self, url: &str) -> Result<Box<dyn PushChannel>, ClientError>;
}

/// Fetches one full snapshot as raw JSON text.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync + 'static {
    /// Fetch `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Fetch`] when no response arrived and
    /// [`ClientError::Authority`] for a non-2xx response.
    async fn fetch(&self, url: &str) -> Result<String, ClientError>;
}
