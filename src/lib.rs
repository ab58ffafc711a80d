//! # Picture This Client
//!
//! Live state synchronization and effect sequencing for the screens of the
//! Picture This party game (display, player, audience, host and the home
//! lobby).
//!
//! The authority owns the game. Each screen receives its state as full
//! snapshots, over a push subscription with a poll fallback, and derives
//! everything else locally:
//!
//! - **reconciliation**: [`SnapshotStore`] diffs successive snapshots into a
//!   [`Transition`], tolerating duplicate and stale deliveries;
//! - **effects**: [`EffectSequencer`] turns transitions into ambient loops,
//!   narrated voice cues and one-shot stings on an [`AudioSink`];
//! - **projection**: [`ViewProjector`] renders a [`ViewModel`] for the
//!   viewer's role.
//!
//! [`RoleClient`] ties these together for one screen; [`RoleClientHandle`]
//! runs it against a live connection.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`PushConnector`] and
//!   [`SnapshotFetcher`] for any backend
//! - **WebSocket push built-in**: default `transport-websocket` feature
//!   provides `WebSocketConnector`
//! - **HTTP polling built-in**: default `transport-http` feature provides
//!   `HttpFetcher`
//! - **Deterministic core**: everything but the loops is driven by a single
//!   [`ClientEvent`] enum
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use picture_this_client::{ClientConfig, ClientUpdate, HttpFetcher, Role, RoleClientHandle,
//!     WebSocketConnector};
//!
//! let config = ClientConfig::new("http://localhost:8080", "g1", Role::Display);
//! let fetcher = HttpFetcher::new(config.connection.fetch_timeout)?;
//! let (mut client, mut updates) = RoleClientHandle::start(
//!     config,
//!     Box::new(speakers),
//!     Arc::new(WebSocketConnector::new()),
//!     Some(Arc::new(fetcher)),
//!     None,
//! )?;
//!
//! while let Some(update) = updates.recv().await {
//!     if let ClientUpdate::View(view) = update {
//!         println!("{} {}", view.stage.title, view.timer);
//!     }
//! }
//! ```

pub mod client;
pub mod connection;
pub mod countdown;
pub mod cue;
pub mod error;
pub mod error_codes;
pub mod event;
pub mod fragment;
pub mod memory;
pub mod projector;
pub mod protocol;
pub mod sequencer;
pub mod snapshot;
pub mod store;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{ClientConfig, ClientUpdate, RoleClient, RoleClientHandle};
pub use connection::{ConnectionConfig, ConnectionState, Endpoints, TransportHandle};
pub use countdown::Countdown;
pub use cue::{Channel, CueCatalog, CueKey, CueRequest};
pub use error::ClientError;
pub use error_codes::ActionRejection;
pub use event::{ActionOutcome, ClientEvent, TransportEvent};
pub use fragment::FragmentResolver;
pub use memory::{
    IdentityStore, InMemoryIdentityStore, JsonFileIdentityStore, SubmissionMemory,
    ViewerCredential, ViewerSession,
};
pub use projector::{Role, ViewModel, ViewProjector, Viewer};
pub use protocol::{parse_frame, Frame, WireSnapshot};
pub use sequencer::{AudioSink, EffectSequencer};
pub use snapshot::{Phase, RevealStage, Snapshot};
pub use store::{SnapshotStore, Transition};
pub use transport::{PushChannel, PushConnector, SnapshotFetcher};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketPush};

#[cfg(feature = "transport-http")]
pub use transports::HttpFetcher;
