//! Push subscription with poll fallback and fixed-delay reconnect.
//!
//! [`TransportHandle::connect`] spawns a background connection loop and
//! returns a bounded [`mpsc::Receiver<TransportEvent>`]. The loop:
//!
//! - opens the push subscription and, until the first pushed frame arrives,
//!   fetches a full snapshot every `poll_interval` so the viewer is never
//!   left without state;
//! - on open, fetches once and cancels any pending reconnect;
//! - on the first pushed frame, stops polling;
//! - on close or error, resumes polling immediately and schedules a
//!   reconnect after `reconnect_delay`, indefinitely.
//!
//! Frames are forwarded verbatim; parsing (and dropping of malformed frames)
//! is the consumer's job. Connection faults never escape the loop, they only
//! show up as [`ConnectionState`] changes.
//!
//! # Example
//!
//! ```rust,ignore
//! let endpoints = Endpoints::for_role("http://localhost:8080", "g1", Role::Display)?;
//! let (mut handle, mut events) = TransportHandle::connect(
//!     Arc::new(WebSocketConnector::new()),
//!     Some(Arc::new(HttpFetcher::new(Duration::from_secs(10))?)),
//!     endpoints,
//!     ConnectionConfig::default(),
//! );
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::event::TransportEvent;
use crate::projector::Role;
use crate::transport::{PushChannel, PushConnector, SnapshotFetcher};

/// Default interval of the fallback poll loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default delay before a reconnect attempt.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Default timeout of a single snapshot fetch.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── State ───────────────────────────────────────────────────────────

/// Health of the link to the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Neither push nor poll is delivering.
    Disconnected,
    /// First subscription attempt in progress, nothing delivered yet.
    Connecting,
    /// The push subscription is open.
    LivePush,
    /// Push is down but polling succeeds.
    LivePoll,
}

impl ConnectionState {
    /// `true` while state is arriving by either path.
    pub fn is_live(self) -> bool {
        matches!(self, Self::LivePush | Self::LivePoll)
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// Timing and buffering of the connection loop.
///
/// # Example
///
/// ```
/// use picture_this_client::connection::ConnectionConfig;
/// use std::time::Duration;
///
/// let config = ConnectionConfig::default()
///     .with_poll_interval(Duration::from_secs(5))
///     .with_event_channel_capacity(0);
/// assert_eq!(config.poll_interval, Duration::from_secs(5));
/// assert_eq!(config.event_channel_capacity, 1);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Interval of the fallback poll loop. Defaults to **3 seconds**.
    pub poll_interval: Duration,
    /// Fixed delay before each reconnect attempt. Defaults to **2 seconds**.
    /// Retries never stop and never back off.
    pub reconnect_delay: Duration,
    /// Timeout applied by fetchers built from this config. Defaults to
    /// **10 seconds**.
    pub fetch_timeout: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// Frames are dropped (with a warning) when the consumer falls behind.
    /// State changes are always delivered.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long [`TransportHandle::shutdown`] waits before aborting the loop.
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Endpoints ───────────────────────────────────────────────────────

/// URLs the connection loop talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Push subscription URL (`ws://` or `wss://`).
    pub push_url: String,
    /// Snapshot URL polled while push is down. `None` disables polling.
    pub snapshot_url: Option<String>,
}

impl Endpoints {
    /// Endpoints for viewing game `game_id` as `role`.
    ///
    /// The [`Role::Lobby`] viewer subscribes to the home roster instead and
    /// ignores `game_id`.
    ///
    /// ```
    /// use picture_this_client::connection::Endpoints;
    /// use picture_this_client::Role;
    ///
    /// let e = Endpoints::for_role("https://pt.example/", "g1", Role::Audience).unwrap();
    /// assert_eq!(e.push_url, "wss://pt.example/ws/games/g1?role=audience");
    /// assert_eq!(e.snapshot_url.as_deref(), Some("https://pt.example/api/games/g1"));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for a base URL that is not
    /// `http(s)://` or `ws(s)://`, or a game id that is empty or contains
    /// characters outside `[A-Za-z0-9_-]`.
    pub fn for_role(base_url: &str, game_id: &str, role: Role) -> Result<Self> {
        if role == Role::Lobby {
            return Self::home(base_url);
        }
        validate_game_id(game_id)?;
        let (http, ws) = split_base(base_url)?;
        Ok(Self {
            push_url: format!("{ws}/ws/games/{game_id}?role={}", role.as_str()),
            snapshot_url: Some(format!("{http}/api/games/{game_id}")),
        })
    }

    /// Endpoints of the home roster. There is no snapshot to poll.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for an unsupported base URL.
    pub fn home(base_url: &str) -> Result<Self> {
        let (_, ws) = split_base(base_url)?;
        Ok(Self {
            push_url: format!("{ws}/ws/home"),
            snapshot_url: None,
        })
    }
}

fn validate_game_id(game_id: &str) -> Result<()> {
    let valid = !game_id.is_empty()
        && game_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ClientError::Config(format!("invalid game id {game_id:?}")))
    }
}

/// Split a base URL into its HTTP and WebSocket forms.
fn split_base(base_url: &str) -> Result<(String, String)> {
    let base = base_url.trim().trim_end_matches('/');
    let pairs = [
        ("https://", "https://", "wss://"),
        ("http://", "http://", "ws://"),
        ("wss://", "https://", "wss://"),
        ("ws://", "http://", "ws://"),
    ];
    for (prefix, http, ws) in pairs {
        if let Some(host) = base.strip_prefix(prefix) {
            if host.is_empty() {
                break;
            }
            return Ok((format!("{http}{host}"), format!("{ws}{host}")));
        }
    }
    Err(ClientError::Config(format!(
        "unsupported base url {base_url:?}"
    )))
}

// ── Handle ──────────────────────────────────────────────────────────

/// Owner of a running connection loop.
///
/// Dropping the handle aborts the loop. Prefer
/// [`shutdown`](Self::shutdown) to close the push subscription cleanly.
pub struct TransportHandle {
    state: watch::Receiver<ConnectionState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl TransportHandle {
    /// Spawn the connection loop.
    ///
    /// Must be called within a tokio runtime. `fetcher` may be `None` to run
    /// push-only (or when `endpoints.snapshot_url` is `None`).
    pub fn connect(
        connector: Arc<dyn PushConnector>,
        fetcher: Option<Arc<dyn SnapshotFetcher>>,
        endpoints: Endpoints,
        config: ConnectionConfig,
    ) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let fetch = match (fetcher, endpoints.snapshot_url) {
            (Some(fetcher), Some(url)) => Some((fetcher, url)),
            _ => None,
        };
        let shutdown_timeout = config.shutdown_timeout;
        let link = Link {
            connector,
            push_url: endpoints.push_url,
            fetch,
            config,
            event_tx,
            state_tx,
        };
        let task = tokio::spawn(connection_loop(link, shutdown_rx));

        let handle = Self {
            state: state_rx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
            shutdown_timeout,
        };
        (handle, event_rx)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Close the push subscription and stop the loop.
    ///
    /// The loop gets `shutdown_timeout` to exit before it is aborted.
    pub async fn shutdown(&mut self) {
        debug!("TransportHandle: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("connection loop aborted: {join_err}");
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("state", &self.state())
            .field("has_task", &self.task.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        // No executor to drive a graceful close from here.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Connection loop ─────────────────────────────────────────────────

type ConnectFuture = Pin<Box<dyn Future<Output = Result<Box<dyn PushChannel>>> + Send>>;
type FetchFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

struct Link {
    connector: Arc<dyn PushConnector>,
    push_url: String,
    fetch: Option<(Arc<dyn SnapshotFetcher>, String)>,
    config: ConnectionConfig,
    event_tx: mpsc::Sender<TransportEvent>,
    state_tx: watch::Sender<ConnectionState>,
}

impl Link {
    fn connect(&self) -> ConnectFuture {
        let connector = Arc::clone(&self.connector);
        let url = self.push_url.clone();
        Box::pin(async move { connector.connect(&url).await })
    }

    fn fetch(&self) -> Option<FetchFuture> {
        let (fetcher, url) = self.fetch.as_ref()?;
        let fetcher = Arc::clone(fetcher);
        let url = url.clone();
        Some(Box::pin(async move { fetcher.fetch(&url).await }))
    }

    fn poll_timer(&self) -> Interval {
        let mut timer = tokio::time::interval(self.config.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    /// Publish a state change. Changes are never dropped.
    async fn set_state(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
        if !changed {
            return;
        }
        info!(?state, "connection state changed");
        if self
            .event_tx
            .send(TransportEvent::StateChanged(state))
            .await
            .is_err()
        {
            debug!("event channel closed, receiver dropped");
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }
}

/// Await the future in `slot`, or forever when the slot is empty.
async fn occupied<F>(slot: &mut Option<F>) -> F::Output
where
    F: Future + Unpin,
{
    match slot.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn recv_push(push: &mut Option<Box<dyn PushChannel>>) -> Option<Result<String>> {
    match push.as_mut() {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}

/// Background loop multiplexing subscription, poll and reconnect timers.
///
/// Exits on shutdown or when the event receiver is dropped.
async fn connection_loop(link: Link, mut shutdown_rx: oneshot::Receiver<()>) {
    debug!(url = %link.push_url, "connection loop started");

    let mut push: Option<Box<dyn PushChannel>> = None;
    let mut connecting: Option<ConnectFuture> = Some(link.connect());
    let mut fetching: Option<FetchFuture> = None;
    let mut reconnect: Option<Pin<Box<tokio::time::Sleep>>> = None;
    let mut polling = link.fetch.is_some();
    let mut poll_timer = link.poll_timer();

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                if let Some(mut channel) = push.take() {
                    let _ = channel.close().await;
                }
                link.set_state(ConnectionState::Disconnected).await;
                break;
            }

            () = link.event_tx.closed() => {
                debug!("event channel closed, stopping connection loop");
                if let Some(mut channel) = push.take() {
                    let _ = channel.close().await;
                }
                break;
            }

            opened = occupied(&mut connecting) => {
                connecting = None;
                match opened {
                    Ok(channel) => {
                        debug!(url = %link.push_url, "push subscription open");
                        push = Some(channel);
                        reconnect = None;
                        link.set_state(ConnectionState::LivePush).await;
                        if fetching.is_none() {
                            fetching = link.fetch();
                        }
                    }
                    Err(e) => {
                        warn!(url = %link.push_url, error = %e, "push subscription failed");
                        if link.state() != ConnectionState::LivePoll {
                            link.set_state(ConnectionState::Disconnected).await;
                        }
                        polling = link.fetch.is_some();
                        reconnect = Some(Box::pin(tokio::time::sleep(link.config.reconnect_delay)));
                    }
                }
            }

            incoming = recv_push(&mut push) => {
                match incoming {
                    Some(Ok(text)) => {
                        if polling {
                            debug!("push delivering, poll loop stopped");
                            polling = false;
                        }
                        if fetching.take().is_some() {
                            debug!("in-flight fetch superseded by push frame");
                        }
                        emit_event(&link.event_tx, TransportEvent::Message(text));
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "push subscription failed");
                        push = None;
                        fall_back(&link, &mut polling, &mut poll_timer, &mut reconnect).await;
                    }
                    None => {
                        debug!("push subscription closed");
                        push = None;
                        fall_back(&link, &mut polling, &mut poll_timer, &mut reconnect).await;
                    }
                }
            }

            () = occupied(&mut reconnect) => {
                reconnect = None;
                if push.is_none() && connecting.is_none() {
                    debug!(url = %link.push_url, "reconnecting push subscription");
                    connecting = Some(link.connect());
                }
            }

            _ = poll_timer.tick(), if polling && fetching.is_none() => {
                fetching = link.fetch();
            }

            fetched = occupied(&mut fetching) => {
                fetching = None;
                match fetched {
                    Ok(body) => {
                        if push.is_none() {
                            link.set_state(ConnectionState::LivePoll).await;
                        }
                        emit_event(&link.event_tx, TransportEvent::Message(body));
                    }
                    Err(e) => {
                        warn!(error = %e, "snapshot fetch failed");
                        if push.is_none() && link.state() == ConnectionState::LivePoll {
                            link.set_state(ConnectionState::Disconnected).await;
                        }
                    }
                }
            }
        }
    }

    debug!("connection loop exited");
}

/// Push went away: poll right now and retry the subscription later.
async fn fall_back(
    link: &Link,
    polling: &mut bool,
    poll_timer: &mut Interval,
    reconnect: &mut Option<Pin<Box<tokio::time::Sleep>>>,
) {
    link.set_state(ConnectionState::Disconnected).await;
    if link.fetch.is_some() {
        *polling = true;
        poll_timer.reset_at(Instant::now());
    }
    if reconnect.is_none() {
        *reconnect = Some(Box::pin(tokio::time::sleep(link.config.reconnect_delay)));
    }
}

/// Forward a frame. If the channel is full, log a warning and drop it so the
/// loop never blocks on a slow consumer.
fn emit_event(event_tx: &mpsc::Sender<TransportEvent>, event: TransportEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("event channel full, dropping frame");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
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
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    // ── Mocks ───────────────────────────────────────────────────────

    /// Replays scripted frames, then hangs (or closes if `close_after`).
    struct ScriptedPush {
        frames: VecDeque<String>,
        close_after: bool,
    }

    #[async_trait]
    impl PushChannel for ScriptedPush {
        async fn recv(&mut self) -> Option<Result<String>> {
            match self.frames.pop_front() {
                Some(frame) => Some(Ok(frame)),
                None if self.close_after => None,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// Hands out scripted sessions; `None` entries fail to connect.
    struct ScriptedConnector {
        sessions: StdMutex<VecDeque<Option<ScriptedPush>>>,
        attempts: Arc<AtomicUsize>,
    }

    impl ScriptedConnector {
        fn new(sessions: Vec<Option<ScriptedPush>>) -> (Arc<Self>, Arc<AtomicUsize>) {
            let attempts = Arc::new(AtomicUsize::new(0));
            let connector = Arc::new(Self {
                sessions: StdMutex::new(sessions.into()),
                attempts: Arc::clone(&attempts),
            });
            (connector, attempts)
        }
    }

    #[async_trait]
    impl PushConnector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn PushChannel>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let next = self.sessions.lock().unwrap().pop_front().flatten();
            match next {
                Some(push) => Ok(Box::new(push)),
                None => Err(ClientError::PushConnect("refused".into())),
            }
        }
    }

    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SnapshotFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!(r#"{{"phase":"drawings","poll":{n}}}"#))
        }
    }

    /// Answers only after `delay`, with an older body.
    struct SlowFetcher {
        delay: Duration,
    }

    #[async_trait]
    impl SnapshotFetcher for SlowFetcher {
        async fn fetch(&self, _url: &str) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            Ok("polled".to_string())
        }
    }

    fn endpoints() -> Endpoints {
        Endpoints::for_role("http://localhost:8080", "g1", Role::Display).unwrap()
    }

    fn fetcher() -> (Arc<dyn SnapshotFetcher>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher: Arc<dyn SnapshotFetcher> = Arc::new(CountingFetcher {
            calls: Arc::clone(&calls),
        });
        (fetcher, calls)
    }

    fn push(frames: &[&str], close_after: bool) -> Option<ScriptedPush> {
        Some(ScriptedPush {
            frames: frames.iter().map(|f| (*f).to_string()).collect(),
            close_after,
        })
    }

    // ── Endpoints ───────────────────────────────────────────────────

    #[test]
    fn endpoints_switch_scheme() {
        let e = Endpoints::for_role("http://h:1", "abc", Role::Player).unwrap();
        assert_eq!(e.push_url, "ws://h:1/ws/games/abc?role=player");
        assert_eq!(e.snapshot_url.as_deref(), Some("http://h:1/api/games/abc"));

        let e = Endpoints::for_role("wss://h/", "abc", Role::Host).unwrap();
        assert_eq!(e.push_url, "wss://h/ws/games/abc?role=host");
        assert_eq!(e.snapshot_url.as_deref(), Some("https://h/api/games/abc"));
    }

    #[test]
    fn lobby_role_subscribes_to_home() {
        let e = Endpoints::for_role("http://h", "", Role::Lobby).unwrap();
        assert_eq!(e.push_url, "ws://h/ws/home");
        assert!(e.snapshot_url.is_none());
    }

    #[test]
    fn endpoints_reject_bad_input() {
        assert!(matches!(
            Endpoints::for_role("ftp://h", "g1", Role::Display),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            Endpoints::for_role("http://h", "../etc", Role::Display),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(Endpoints::home("http://"), Err(ClientError::Config(_))));
    }

    // ── Config ──────────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    // ── Loop ────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn push_frames_are_forwarded_and_stop_polling() {
        let (connector, _) = ScriptedConnector::new(vec![push(&["a", "b"], false)]);
        let (fetcher, calls) = fetcher();
        let (mut handle, mut events) =
            TransportHandle::connect(connector, Some(fetcher), endpoints(), ConnectionConfig::default());

        let mut frames = Vec::new();
        while frames.len() < 2 {
            match events.recv().await.unwrap() {
                TransportEvent::Message(m) if m == "a" || m == "b" => frames.push(m),
                _ => {}
            }
        }
        assert_eq!(frames, ["a", "b"]);
        assert_eq!(handle.state(), ConnectionState::LivePush);

        tokio::time::sleep(Duration::from_secs(30)).await;
        // At most the initial poll and the fetch on open.
        assert!(calls.load(Ordering::SeqCst) <= 2, "polling must stop once push delivers");

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn push_frame_discards_fetch_in_flight() {
        let (connector, _) = ScriptedConnector::new(vec![push(&["pushed"], false)]);
        let fetcher: Arc<dyn SnapshotFetcher> = Arc::new(SlowFetcher {
            delay: Duration::from_secs(1),
        });
        let (mut handle, mut events) =
            TransportHandle::connect(connector, Some(fetcher), endpoints(), ConnectionConfig::default());

        tokio::time::sleep(Duration::from_secs(10)).await;

        let mut messages = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let TransportEvent::Message(m) = event {
                messages.push(m);
            }
        }
        assert_eq!(messages, ["pushed"]);
        assert_eq!(handle.state(), ConnectionState::LivePush);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refused_push_polls_and_retries_every_delay() {
        let (connector, attempts) = ScriptedConnector::new(vec![None, None, None]);
        let (fetcher, calls) = fetcher();
        let (mut handle, mut events) =
            TransportHandle::connect(connector, Some(fetcher), endpoints(), ConnectionConfig::default());

        tokio::time::sleep(Duration::from_millis(6_500)).await;
        // t=0, 3, 6
        assert!(calls.load(Ordering::SeqCst) >= 3);
        // t=0, 2, 4, 6
        assert!(attempts.load(Ordering::SeqCst) >= 4);
        assert_eq!(handle.state(), ConnectionState::LivePoll);

        let mut saw_poll_frame = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, TransportEvent::Message(ref m) if m.contains("\"poll\"")) {
                saw_poll_frame = true;
            }
        }
        assert!(saw_poll_frame);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn close_resumes_polling_then_reconnects() {
        let (connector, attempts) =
            ScriptedConnector::new(vec![push(&["first"], true), push(&["second"], false)]);
        let (fetcher, calls) = fetcher();
        let (mut handle, mut events) =
            TransportHandle::connect(connector, Some(fetcher), endpoints(), ConnectionConfig::default());

        let mut states = Vec::new();
        loop {
            match events.recv().await.unwrap() {
                TransportEvent::StateChanged(s) => states.push(s),
                TransportEvent::Message(m) if m == "second" => break,
                TransportEvent::Message(_) => {}
            }
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(states.contains(&ConnectionState::Disconnected));
        assert_eq!(states.last(), Some(&ConnectionState::LivePush));
        // open fetch, resume fetch, second open fetch
        assert!(calls.load(Ordering::SeqCst) >= 2);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_emits_disconnected() {
        let (connector, _) = ScriptedConnector::new(vec![push(&[], false)]);
        let (mut handle, mut events) =
            TransportHandle::connect(connector, None, endpoints(), ConnectionConfig::default());

        assert_eq!(
            events.recv().await.unwrap(),
            TransportEvent::StateChanged(ConnectionState::LivePush)
        );
        handle.shutdown().await;
        assert_eq!(
            events.recv().await.unwrap(),
            TransportEvent::StateChanged(ConnectionState::Disconnected)
        );
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_receiver_stops_loop() {
        let (connector, _) = ScriptedConnector::new(vec![push(&[], false)]);
        let (mut handle, events) =
            TransportHandle::connect(connector, None, endpoints(), ConnectionConfig::default());
        drop(events);
        let task = handle.task.take().unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop should exit")
            .unwrap();
    }
}
