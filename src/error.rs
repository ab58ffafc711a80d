//! Error types for the Picture This client engine.

use thiserror::Error;

use crate::error_codes::ActionRejection;

/// Errors that can occur inside the client engine and its transports.
///
/// None of these escape the steady-state engine: the connection loop and the
/// effect sequencer log and absorb them. They surface from the seams
/// ([`PushConnector`](crate::transport::PushConnector),
/// [`SnapshotFetcher`](crate::transport::SnapshotFetcher),
/// [`AudioSink`](crate::sequencer::AudioSink),
/// [`IdentityStore`](crate::memory::IdentityStore)) so implementors can report
/// what went wrong.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to establish the push subscription.
    #[error("push connect error: {0}")]
    PushConnect(String),

    /// Failed to receive a frame from the push subscription.
    #[error("push receive error: {0}")]
    PushReceive(String),

    /// The push connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// A snapshot fetch failed before a response arrived.
    #[error("snapshot fetch error: {0}")]
    Fetch(String),

    /// The authority answered a request with a non-2xx status.
    #[error("authority returned {status}: {message}")]
    Authority {
        /// HTTP status code.
        status: u16,
        /// The `error` field of the response body, or a fallback message.
        message: String,
        /// Classification of the rejection.
        rejection: ActionRejection,
    },

    /// Failed to serialize or deserialize a JSON payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// The audio output refused to start a cue.
    #[error("playback rejected for cue {key}: {reason}")]
    PlaybackRejected {
        /// Catalog key of the cue.
        key: String,
        /// Reason reported by the audio output.
        reason: String,
    },

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for client engine operations.
pub type Result<T> = std::result::Result<T, ClientError>;
