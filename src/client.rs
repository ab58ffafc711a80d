//! Role client: one explicit context per screen.
//!
//! [`RoleClient`] owns the whole pipeline for one viewer of one game
//! (fragment resolution, reconciliation, effect sequencing, countdown and
//! projection) and is driven by [`ClientEvent`]s through a single
//! [`handle`](RoleClient::handle) method. It does no I/O of its own besides
//! the [`AudioSink`] and the [`IdentityStore`], which makes it fully
//! deterministic under test.
//!
//! [`RoleClientHandle::start`] wires a `RoleClient` to a live connection and
//! a tick timer in a background dispatch loop and emits [`ClientUpdate`]s on
//! a bounded channel.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ClientConfig::new("http://localhost:8080", "g1", Role::Display);
//! let (mut client, mut updates) = RoleClientHandle::start(
//!     config,
//!     Box::new(MySpeakers::default()),
//!     Arc::new(WebSocketConnector::new()),
//!     Some(Arc::new(HttpFetcher::new(Duration::from_secs(10))?)),
//!     None,
//! )?;
//!
//! client.interaction()?;
//! while let Some(update) = updates.recv().await {
//!     match update {
//!         ClientUpdate::View(view) => render(&view),
//!         ClientUpdate::Connection(state) => show_indicator(state),
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::connection::{ConnectionConfig, ConnectionState, Endpoints, TransportHandle};
use crate::countdown::Countdown;
use crate::cue::{CueCatalog, CueKey, CueRequest};
use crate::error::{ClientError, Result};
use crate::error_codes::ActionRejection;
use crate::event::{ActionOutcome, ClientEvent, TransportEvent};
use crate::fragment::FragmentResolver;
use crate::memory::{IdentityStore, SubmissionMemory, ViewerCredential, ViewerSession};
use crate::projector::{GameCard, Role, ViewModel, ViewProjector, Viewer};
use crate::protocol::{parse_frame, Frame, PlayerId};
use crate::sequencer::{AudioSink, EffectSequencer};
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use crate::transport::{PushConnector, SnapshotFetcher};

/// Default interval of the local countdown tick.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration of a [`RoleClient`].
///
/// # Example
///
/// ```
/// use picture_this_client::client::ClientConfig;
/// use picture_this_client::Role;
///
/// let config = ClientConfig::new("http://localhost:8080", "g1", Role::Player)
///     .with_viewer_id(7);
/// assert_eq!(config.viewer_id, Some(7));
/// assert_eq!(config.tick_interval, std::time::Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `http(s)://host[:port]` of the authority.
    pub base_url: String,
    /// Game to follow. Ignored for [`Role::Lobby`].
    pub game_id: String,
    pub role: Role,
    /// Player id of a player or host screen. Audience members get theirs
    /// from the stored credential instead.
    pub viewer_id: Option<PlayerId>,
    /// Interval of the countdown tick. Defaults to **1 second**.
    pub tick_interval: Duration,
    pub connection: ConnectionConfig,
    pub catalog: CueCatalog,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, game_id: impl Into<String>, role: Role) -> Self {
        Self {
            base_url: base_url.into(),
            game_id: game_id.into(),
            role,
            viewer_id: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            connection: ConnectionConfig::default(),
            catalog: CueCatalog::default(),
        }
    }

    /// Read `PICTURE_THIS_URL`, `PICTURE_THIS_GAME` and `PICTURE_THIS_ROLE`.
    ///
    /// `PICTURE_THIS_GAME` may be omitted for the `lobby` role.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when a variable is missing or the role
    /// is unknown.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let base_url = var("PICTURE_THIS_URL")
            .ok_or_else(|| ClientError::Config("PICTURE_THIS_URL is not set".into()))?;
        let role_name = var("PICTURE_THIS_ROLE").unwrap_or_else(|| "display".to_string());
        let role = Role::parse(&role_name)
            .ok_or_else(|| ClientError::Config(format!("unknown role {role_name:?}")))?;
        let game_id = match (var("PICTURE_THIS_GAME"), role) {
            (Some(id), _) => id,
            (None, Role::Lobby) => String::new(),
            (None, _) => {
                return Err(ClientError::Config("PICTURE_THIS_GAME is not set".into()));
            }
        };
        Ok(Self::new(base_url, game_id, role))
    }

    #[must_use]
    pub fn with_viewer_id(mut self, viewer_id: PlayerId) -> Self {
        self.viewer_id = Some(viewer_id);
        self
    }

    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: CueCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// URLs derived from `base_url`, `game_id` and `role`.
    ///
    /// # Errors
    ///
    /// See [`Endpoints::for_role`].
    pub fn endpoints(&self) -> Result<Endpoints> {
        Endpoints::for_role(&self.base_url, &self.game_id, self.role)
    }
}

// ── Updates ─────────────────────────────────────────────────────────

/// Output of [`RoleClient::handle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientUpdate {
    /// A new view of the game (boxed to keep the enum small).
    View(Box<ViewModel>),
    /// A new home roster.
    Home(Vec<GameCard>),
    Connection(ConnectionState),
    /// Cues accepted by the sequencer for the last transition.
    Cues(Vec<CueRequest>),
    /// A user-visible message about a rejected action.
    Notice {
        rejection: ActionRejection,
        message: String,
    },
}

// ── RoleClient ──────────────────────────────────────────────────────

/// Deterministic per-screen state machine.
pub struct RoleClient {
    role: Role,
    viewer_id: Option<PlayerId>,
    resolver: FragmentResolver,
    store: SnapshotStore,
    sequencer: EffectSequencer,
    countdown: Countdown,
    projector: ViewProjector,
    session: Option<ViewerSession>,
    connection: ConnectionState,
    view: Option<ViewModel>,
    now: OffsetDateTime,
}

impl std::fmt::Debug for RoleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleClient")
            .field("role", &self.role)
            .field("viewer_id", &self.viewer_id())
            .field("connection", &self.connection)
            .field("phase", &self.store.current().map(|s| s.phase))
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}

impl RoleClient {
    /// Build a client for `config`.
    ///
    /// Participants (player and audience screens) restore their identity
    /// from `identity` when one is given.
    pub fn new(
        config: &ClientConfig,
        sink: Box<dyn AudioSink>,
        identity: Option<Box<dyn IdentityStore>>,
    ) -> Self {
        let session = identity
            .filter(|_| config.role.is_participant())
            .map(|store| ViewerSession::restore(config.game_id.clone(), store));
        Self {
            role: config.role,
            viewer_id: config.viewer_id,
            resolver: FragmentResolver::new(),
            store: SnapshotStore::new(),
            sequencer: EffectSequencer::new(sink, config.catalog.clone()),
            countdown: Countdown::new(),
            projector: ViewProjector::new(),
            session,
            connection: ConnectionState::Connecting,
            view: None,
            now: OffsetDateTime::now_utc(),
        }
    }

    /// Process one event, in arrival order.
    pub fn handle(&mut self, event: ClientEvent) -> Vec<ClientUpdate> {
        match event {
            ClientEvent::Transport(TransportEvent::Message(text)) => self.on_message(&text),
            ClientEvent::Transport(TransportEvent::StateChanged(state)) => {
                if state == self.connection {
                    return Vec::new();
                }
                self.connection = state;
                vec![ClientUpdate::Connection(state)]
            }
            ClientEvent::Tick(now) => self.on_tick(now),
            ClientEvent::Interaction => {
                self.sequencer.on_interaction();
                Vec::new()
            }
            ClientEvent::PlaybackFinished(key) => {
                self.sequencer.on_voice_finished(&key);
                Vec::new()
            }
            ClientEvent::PlaybackFailed { key, reason } => {
                self.sequencer.on_voice_failed(&key, &reason);
                Vec::new()
            }
            ClientEvent::AmbientFailed { key, reason } => {
                self.sequencer.on_ambient_failed(&key, &reason);
                Vec::new()
            }
            ClientEvent::Action(outcome) => self.on_action(outcome),
            ClientEvent::Credential(credential) => self.on_credential(credential),
        }
    }

    /// Forget the game (navigation away). Audio stops.
    pub fn leave(&mut self) {
        self.store.clear();
        self.sequencer.silence();
        self.countdown = Countdown::new();
        self.view = None;
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn role(&self) -> Role {
        self.role
    }

    /// The stored credential's id, else the configured one.
    pub fn viewer_id(&self) -> Option<PlayerId> {
        self.session
            .as_ref()
            .and_then(ViewerSession::viewer_id)
            .or(self.viewer_id)
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.store.current()
    }

    /// The last projected view.
    pub fn view(&self) -> Option<&ViewModel> {
        self.view.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn sequencer(&self) -> &EffectSequencer {
        &self.sequencer
    }

    pub fn session(&self) -> Option<&ViewerSession> {
        self.session.as_ref()
    }

    // ── Event handlers ──────────────────────────────────────────────

    fn on_message(&mut self, text: &str) -> Vec<ClientUpdate> {
        let frames = match parse_frame(text) {
            Ok(frames) => frames,
            Err(e) => {
                debug!(error = %e, "dropping malformed frame");
                return Vec::new();
            }
        };

        let mut updates = Vec::new();
        let mut fragments = Vec::new();
        for frame in frames {
            match frame {
                Frame::Snapshot(wire) => match Snapshot::from_wire(&wire) {
                    Some(snapshot) => updates.extend(self.apply(snapshot)),
                    None => debug!(phase = %wire.phase, "dropping snapshot with unknown phase"),
                },
                Frame::Fragment(fragment) => fragments.push(fragment),
                Frame::Home(home) => {
                    updates.push(ClientUpdate::Home(self.projector.project_home(&home)));
                }
            }
        }

        if !fragments.is_empty() {
            match self.resolver.resolve(self.store.current(), &fragments) {
                Some(snapshot) => updates.extend(self.apply(snapshot)),
                None => debug!(count = fragments.len(), "dropping unresolvable fragments"),
            }
        }
        updates
    }

    /// Reconcile `snapshot` and emit the resulting cues and view.
    fn apply(&mut self, snapshot: Snapshot) -> Vec<ClientUpdate> {
        let reconciled = self.store.reconcile(snapshot);
        if !reconciled.changed {
            return Vec::new();
        }

        let mut updates = Vec::new();
        let cues = self
            .sequencer
            .on_transition(&reconciled.transition, reconciled.snapshot);
        if !cues.is_empty() {
            updates.push(ClientUpdate::Cues(cues));
        }
        if !reconciled.transition.regressed {
            self.countdown.sync(reconciled.snapshot);
        }
        updates.extend(self.reproject());
        updates
    }

    fn on_tick(&mut self, now: OffsetDateTime) -> Vec<ClientUpdate> {
        self.now = now;
        let mut updates = Vec::new();
        if self.countdown.tick(now) {
            if let Some(cue) = self.sequencer.on_timer_elapsed() {
                updates.push(ClientUpdate::Cues(vec![cue]));
            }
        }
        let timer = self.countdown.display(now);
        if self.view.as_ref().is_some_and(|v| v.timer != timer) {
            updates.extend(self.reproject());
        }
        updates
    }

    fn on_action(&mut self, outcome: ActionOutcome) -> Vec<ClientUpdate> {
        let Some(session) = self.session.as_mut() else {
            debug!(?outcome, "ignoring action outcome without a viewer session");
            return Vec::new();
        };

        let mut updates = Vec::new();
        let persisted = match outcome {
            ActionOutcome::Submitted {
                round,
                drawing_index,
            } => session.mark_submitted(round, drawing_index),
            ActionOutcome::Rejected {
                rejection,
                round,
                drawing_index,
            } => {
                updates.push(ClientUpdate::Notice {
                    rejection,
                    message: rejection.description().to_string(),
                });
                session.apply_rejection(rejection, round, drawing_index)
            }
        };
        if let Err(e) = persisted {
            warn!(error = %e, "failed to persist viewer identity");
        }
        updates.extend(self.reproject());
        updates
    }

    fn on_credential(&mut self, credential: ViewerCredential) -> Vec<ClientUpdate> {
        let Some(session) = self.session.as_mut() else {
            debug!("ignoring credential without a viewer session");
            return Vec::new();
        };
        if let Err(e) = session.join(credential) {
            warn!(error = %e, "failed to persist viewer identity");
        }
        self.reproject()
    }

    /// Project the held snapshot; emits only when the view changed.
    fn reproject(&mut self) -> Vec<ClientUpdate> {
        let Some(snapshot) = self.store.current() else {
            return Vec::new();
        };
        let viewer = Viewer::new(self.role, self.viewer_id());
        let memory = self
            .session
            .as_ref()
            .map(ViewerSession::memory)
            .unwrap_or_else(SubmissionMemory::new);
        let view = self.projector.project(snapshot, &viewer, &memory, self.now);
        if self.view.as_ref() == Some(&view) {
            return Vec::new();
        }
        self.view = Some(view.clone());
        vec![ClientUpdate::View(Box::new(view))]
    }
}

// ── Live handle ─────────────────────────────────────────────────────

/// A [`RoleClient`] running against a live connection.
///
/// Dropping the handle aborts the dispatch loop and the connection loop.
pub struct RoleClientHandle {
    cmd_tx: mpsc::UnboundedSender<ClientEvent>,
    state: watch::Receiver<ConnectionState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl RoleClientHandle {
    /// Connect and start dispatching.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the endpoints cannot be derived
    /// from `config`.
    pub fn start(
        config: ClientConfig,
        sink: Box<dyn AudioSink>,
        connector: Arc<dyn PushConnector>,
        fetcher: Option<Arc<dyn SnapshotFetcher>>,
        identity: Option<Box<dyn IdentityStore>>,
    ) -> Result<(Self, mpsc::Receiver<ClientUpdate>)> {
        let endpoints = config.endpoints()?;
        let client = RoleClient::new(&config, sink, identity);

        let (transport, transport_rx) =
            TransportHandle::connect(connector, fetcher, endpoints, config.connection.clone());
        let state = transport.subscribe();

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) =
            mpsc::channel(config.connection.event_channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let shutdown_timeout = config.connection.shutdown_timeout;
        let task = tokio::spawn(dispatch_loop(
            client,
            transport,
            transport_rx,
            cmd_rx,
            update_tx,
            config.tick_interval,
            shutdown_rx,
        ));

        let handle = Self {
            cmd_tx,
            state,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
            // The dispatch loop shuts the connection down first.
            shutdown_timeout: shutdown_timeout.saturating_mul(2),
        };
        Ok((handle, update_rx))
    }

    /// Report the first viewer interaction (unlocks audio).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportClosed`] if the dispatch loop exited.
    pub fn interaction(&self) -> Result<()> {
        self.send(ClientEvent::Interaction)
    }

    /// Report that voice cue `key` finished.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportClosed`] if the dispatch loop exited.
    pub fn playback_finished(&self, key: CueKey) -> Result<()> {
        self.send(ClientEvent::PlaybackFinished(key))
    }

    /// Report that voice cue `key` could not be played.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportClosed`] if the dispatch loop exited.
    pub fn playback_failed(&self, key: CueKey, reason: impl Into<String>) -> Result<()> {
        self.send(ClientEvent::PlaybackFailed {
            key,
            reason: reason.into(),
        })
    }

    /// Report that the ambient loop `key` stopped on an error.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportClosed`] if the dispatch loop exited.
    pub fn ambient_failed(&self, key: CueKey, reason: impl Into<String>) -> Result<()> {
        self.send(ClientEvent::AmbientFailed {
            key,
            reason: reason.into(),
        })
    }

    /// Report the outcome of an action submitted elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportClosed`] if the dispatch loop exited.
    pub fn action_outcome(&self, outcome: ActionOutcome) -> Result<()> {
        self.send(ClientEvent::Action(outcome))
    }

    /// Record the credential returned by a join.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportClosed`] if the dispatch loop exited.
    pub fn credential(&self, credential: ViewerCredential) -> Result<()> {
        self.send(ClientEvent::Credential(credential))
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Stop the connection and the dispatch loop.
    ///
    /// After this the update receiver yields `None` once drained.
    pub async fn shutdown(&mut self) {
        debug!("RoleClientHandle: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("dispatch loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("dispatch loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("dispatch loop aborted: {join_err}");
                    }
                }
            }
        }
    }

    fn send(&self, event: ClientEvent) -> Result<()> {
        self.cmd_tx
            .send(event)
            .map_err(|_| ClientError::TransportClosed)
    }
}

impl std::fmt::Debug for RoleClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleClientHandle")
            .field("connection", &self.connection_state())
            .field("has_task", &self.task.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for RoleClientHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Dispatch loop ───────────────────────────────────────────────────

/// Merge connection events, commands and ticks into one ordered stream.
async fn dispatch_loop(
    mut client: RoleClient,
    mut transport: TransportHandle,
    mut transport_rx: mpsc::Receiver<TransportEvent>,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientEvent>,
    update_tx: mpsc::Sender<ClientUpdate>,
    tick_interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(role = %client.role(), "dispatch loop started");

    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let event = tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                transport.shutdown().await;
                drain(&mut client, &mut transport_rx, &update_tx).await;
                break;
            }

            cmd = cmd_rx.recv() => match cmd {
                Some(event) => event,
                None => {
                    debug!("command channel closed, shutting down dispatch loop");
                    transport.shutdown().await;
                    drain(&mut client, &mut transport_rx, &update_tx).await;
                    break;
                }
            },

            incoming = transport_rx.recv() => match incoming {
                Some(event) => ClientEvent::Transport(event),
                None => {
                    debug!("connection loop ended");
                    break;
                }
            },

            _ = ticker.tick() => ClientEvent::Tick(OffsetDateTime::now_utc()),
        };

        for update in client.handle(event) {
            emit_update(&update_tx, update).await;
        }
    }

    debug!("dispatch loop exited");
}

/// Deliver whatever the connection loop emitted while shutting down.
async fn drain(
    client: &mut RoleClient,
    transport_rx: &mut mpsc::Receiver<TransportEvent>,
    update_tx: &mpsc::Sender<ClientUpdate>,
) {
    while let Ok(event) = transport_rx.try_recv() {
        for update in client.handle(ClientEvent::Transport(event)) {
            emit_update(update_tx, update).await;
        }
    }
}

/// Emit an update. Connection changes are always delivered; anything else is
/// dropped with a warning when the consumer falls behind.
async fn emit_update(update_tx: &mpsc::Sender<ClientUpdate>, update: ClientUpdate) {
    if matches!(update, ClientUpdate::Connection(_)) {
        if update_tx.send(update).await.is_err() {
            debug!("update channel closed, receiver dropped");
        }
        return;
    }
    match update_tx.try_send(update) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "update channel full, dropping update: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("update channel closed, receiver dropped");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use crate::memory::InMemoryIdentityStore;
    use crate::projector::RolePanel;
    use crate::snapshot::Phase;

    struct NullSink;

    impl AudioSink for NullSink {
        fn start_ambient(&mut self, _key: &CueKey, _asset: &str) -> Result<()> {
            Ok(())
        }
        fn pause_ambient(&mut self) {}
        fn resume_ambient(&mut self) -> Result<()> {
            Ok(())
        }
        fn stop_ambient(&mut self) {}
        fn start_voice(&mut self, _key: &CueKey, _asset: &str) -> Result<()> {
            Ok(())
        }
        fn play_sting(&mut self, _key: &CueKey, _asset: &str) -> Result<()> {
            Ok(())
        }
    }

    fn client(role: Role) -> RoleClient {
        let config = ClientConfig::new("http://localhost", "g1", role).with_viewer_id(1);
        RoleClient::new(&config, Box::new(NullSink), None)
    }

    fn message(json: &str) -> ClientEvent {
        ClientEvent::Transport(TransportEvent::Message(json.to_string()))
    }

    fn views(updates: &[ClientUpdate]) -> Vec<&ViewModel> {
        updates
            .iter()
            .filter_map(|u| match u {
                ClientUpdate::View(v) => Some(v.as_ref()),
                _ => None,
            })
            .collect()
    }

    const LOBBY: &str = r#"{"game_id":"g1","phase":"lobby","join_code":"ABCD","players":["Ann","Bo"],"player_ids":[1,2],"host_id":1}"#;

    #[test]
    fn config_builders() {
        let config = ClientConfig::new("http://h", "g1", Role::Audience)
            .with_tick_interval(Duration::from_millis(500))
            .with_connection(ConnectionConfig::default().with_poll_interval(Duration::from_secs(9)));
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(config.connection.poll_interval, Duration::from_secs(9));
        assert_eq!(
            config.endpoints().unwrap().push_url,
            "ws://h/ws/games/g1?role=audience"
        );
    }

    #[test]
    fn snapshot_produces_view_once() {
        let mut client = client(Role::Display);
        let updates = client.handle(message(LOBBY));
        let v = views(&updates);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].phase, Phase::Lobby);
        assert_eq!(v[0].join_code, "ABCD");

        assert!(client.handle(message(LOBBY)).is_empty());
    }

    #[test]
    fn malformed_and_unknown_frames_are_dropped() {
        let mut client = client(Role::Display);
        assert!(client.handle(message("{not json")).is_empty());
        assert!(client.handle(message(r#"{"phase":"dancing"}"#)).is_empty());
        assert!(client.handle(message(r#"[1, "x", null]"#)).is_empty());
        assert!(client.snapshot().is_none());
    }

    #[test]
    fn batch_frames_are_applied_in_order() {
        let mut client = client(Role::Display);
        let batch = format!(
            "[{LOBBY}, {}]",
            r#"{"game_id":"g1","phase":"drawings","current_round":1,"players":["Ann","Bo"],"player_ids":[1,2]}"#
        );
        client.handle(message(&batch));
        assert_eq!(client.snapshot().unwrap().phase, Phase::Drawings);
    }

    #[test]
    fn home_frames_project_roster() {
        let mut client = client(Role::Lobby);
        let updates = client.handle(message(
            r#"{"games":[{"game_id":"g1","phase":"lobby","players":2,"join_code":"ABCD"}]}"#,
        ));
        match updates.as_slice() {
            [ClientUpdate::Home(cards)] => assert_eq!(cards.len(), 1),
            other => panic!("unexpected updates {other:?}"),
        }
    }

    #[test]
    fn connection_changes_keep_view() {
        let mut client = client(Role::Display);
        client.handle(message(LOBBY));
        let updates = client.handle(ClientEvent::Transport(TransportEvent::StateChanged(
            ConnectionState::Disconnected,
        )));
        assert_eq!(
            updates,
            vec![ClientUpdate::Connection(ConnectionState::Disconnected)]
        );
        assert!(client.view().is_some());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn rejection_surfaces_notice_and_expires_session() {
        let config = ClientConfig::new("http://localhost", "g1", Role::Audience);
        let mut client = RoleClient::new(
            &config,
            Box::new(NullSink),
            Some(Box::new(InMemoryIdentityStore::new())),
        );
        client.handle(ClientEvent::Credential(ViewerCredential {
            viewer_id: 42,
            token: "t".into(),
            name: "Zed".into(),
        }));
        assert_eq!(client.viewer_id(), Some(42));

        let updates = client.handle(
            ActionOutcome::Rejected {
                rejection: ActionRejection::SessionExpired,
                round: 1,
                drawing_index: 0,
            }
            .into(),
        );
        assert!(updates
            .iter()
            .any(|u| matches!(u, ClientUpdate::Notice { rejection: ActionRejection::SessionExpired, .. })));
        assert_eq!(client.viewer_id(), None);
    }

    #[test]
    fn submission_disables_form() {
        let config = ClientConfig::new("http://localhost", "g1", Role::Audience);
        let mut client = RoleClient::new(
            &config,
            Box::new(NullSink),
            Some(Box::new(InMemoryIdentityStore::new())),
        );
        client.handle(ClientEvent::Credential(ViewerCredential {
            viewer_id: 42,
            token: "t".into(),
            name: "Zed".into(),
        }));
        client.handle(message(
            r#"{"game_id":"g1","phase":"guesses-votes","current_round":1,"players":["Ann","Bo"],"player_ids":[1,2],
                "vote_focus":{"drawing_index":0,"drawing_owner":1,"options":["a","b"]}}"#,
        ));
        let enabled = |c: &RoleClient| match &c.view().unwrap().panel {
            RolePanel::Audience(p) => p.action.as_ref().unwrap().enabled,
            other => panic!("unexpected panel {other:?}"),
        };
        assert!(enabled(&client));

        client.handle(
            ActionOutcome::Submitted {
                round: 1,
                drawing_index: 0,
            }
            .into(),
        );
        assert!(!enabled(&client));
    }

    #[test]
    fn leave_forgets_game() {
        let mut client = client(Role::Display);
        client.handle(message(LOBBY));
        client.leave();
        assert!(client.snapshot().is_none());
        assert!(client.view().is_none());
        assert!(!client.handle(message(LOBBY)).is_empty());
    }
}
