#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration-style tests for the live [`RoleClientHandle`].
//!
//! Uses the scripted push channels and fetchers from `tests/common` to drive
//! the connection loop and the dispatch loop together, including push to
//! poll failover and reconnect.

mod common;

use std::sync::Arc;
use std::time::Duration;

use picture_this_client::{
    ClientConfig, ClientError, ClientUpdate, ConnectionConfig, ConnectionState, CueKey, Phase,
    Role, RoleClientHandle, SnapshotFetcher,
};
use tokio::sync::mpsc::Receiver;
use tokio::time::Instant;

use common::{AudioLog, MockConnector, MockFetcher, MockPush, RecordingSink, SnapshotJson, Step};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn start(
    role: Role,
    connector: Arc<MockConnector>,
    fetcher: Option<Arc<MockFetcher>>,
) -> (RoleClientHandle, Receiver<ClientUpdate>, AudioLog) {
    let (sink, log) = RecordingSink::new();
    let config = ClientConfig::new("http://localhost:8080", "g1", role);
    let fetcher = fetcher.map(|f| f as Arc<dyn SnapshotFetcher>);
    let (handle, updates) =
        RoleClientHandle::start(config, Box::new(sink), connector, fetcher, None).unwrap();
    (handle, updates, log)
}

fn frame(json: &SnapshotJson) -> Step {
    Step::Frame(json.build())
}

/// Receive updates until `pred` matches one, returning everything seen.
async fn until(
    updates: &mut Receiver<ClientUpdate>,
    pred: impl Fn(&ClientUpdate) -> bool,
) -> Vec<(Instant, ClientUpdate)> {
    let mut seen = Vec::new();
    let deadline = Duration::from_secs(60);
    tokio::time::timeout(deadline, async {
        while let Some(update) = updates.recv().await {
            let done = pred(&update);
            seen.push((Instant::now(), update));
            if done {
                return;
            }
        }
        panic!("update channel closed early");
    })
    .await
    .expect("expected update did not arrive");
    seen
}

fn is_state(state: ConnectionState) -> impl Fn(&ClientUpdate) -> bool {
    move |u| *u == ClientUpdate::Connection(state)
}

// ════════════════════════════════════════════════════════════════════
// Failover
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn push_close_falls_back_to_polling_then_reconnects() {
    let drawings = SnapshotJson::lobby().phase("drawings").round(1);
    let connector = MockConnector::new(vec![
        Some(MockPush::new(vec![frame(&drawings), Step::Close])),
        None,
        Some(MockPush::new(vec![])),
    ]);
    let fetcher = MockFetcher::new(Some(drawings.build()));
    let (mut client, mut updates, _log) = start(Role::Display, Arc::clone(&connector), Some(fetcher));

    let mut seen = until(&mut updates, is_state(ConnectionState::Disconnected)).await;
    let dropped_at = seen.last().unwrap().0;

    let polled = until(&mut updates, is_state(ConnectionState::LivePoll)).await;
    let poll_at = polled.last().unwrap().0;
    assert!(poll_at - dropped_at <= Duration::from_secs(3));
    seen.extend(polled);

    seen.extend(until(&mut updates, is_state(ConnectionState::LivePush)).await);
    assert!(connector.attempts() >= 3);

    // Every view along the way shows the game, never an empty state.
    let views: Vec<_> = seen
        .iter()
        .filter_map(|(_, u)| match u {
            ClientUpdate::View(v) => Some(v),
            _ => None,
        })
        .collect();
    assert!(!views.is_empty());
    for view in views {
        assert_eq!(view.phase, Phase::Drawings);
        assert_eq!(view.players.len(), 2);
    }

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn refused_push_still_delivers_state_by_polling() {
    let connector = MockConnector::new(vec![]);
    let fetcher = MockFetcher::new(Some(SnapshotJson::lobby().build()));
    let (mut client, mut updates, _log) =
        start(Role::Display, Arc::clone(&connector), Some(Arc::clone(&fetcher)));

    let seen = until(&mut updates, |u| matches!(u, ClientUpdate::View(_))).await;
    assert!(seen
        .iter()
        .any(|(_, u)| *u == ClientUpdate::Connection(ConnectionState::LivePoll)));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(fetcher.calls() >= 3);
    assert!(connector.attempts() >= 5);
    assert_eq!(client.connection_state(), ConnectionState::LivePoll);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failing_poll_reports_disconnected() {
    let connector = MockConnector::new(vec![]);
    let fetcher = MockFetcher::new(None);
    let (mut client, mut updates, _log) = start(Role::Display, connector, Some(Arc::clone(&fetcher)));

    until(&mut updates, is_state(ConnectionState::Disconnected)).await;

    fetcher.set(Some(SnapshotJson::lobby().build()));
    until(&mut updates, is_state(ConnectionState::LivePoll)).await;

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Frames
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let connector = MockConnector::new(vec![Some(MockPush::new(vec![
        Step::Frame("<div>not json</div>".into()),
        Step::Frame(r#"{"phase":"nope"}"#.into()),
        frame(&SnapshotJson::lobby()),
    ]))]);
    let (mut client, mut updates, _log) = start(Role::Display, connector, None);

    let seen = until(&mut updates, |u| matches!(u, ClientUpdate::View(_))).await;
    let Some((_, ClientUpdate::View(view))) = seen.last() else {
        panic!("expected a view");
    };
    assert_eq!(view.phase, Phase::Lobby);
    assert_eq!(view.join_code, "ABCD");

    client.shutdown().await;
}

#[tokio::test]
async fn lobby_role_receives_home_roster() {
    let connector = MockConnector::new(vec![Some(MockPush::new(vec![Step::Frame(
        r#"{"games":[{"id":"g1","phase":"lobby","players":3,"join_code":"ABCD"},
                     {"id":"g2","phase":"drawings","players":4,"join_code":"WXYZ"}]}"#
            .into(),
    )]))]);
    let fetcher = MockFetcher::new(None);
    let (mut client, mut updates, _log) =
        start(Role::Lobby, connector, Some(Arc::clone(&fetcher)));

    let seen = until(&mut updates, |u| matches!(u, ClientUpdate::Home(_))).await;
    let Some((_, ClientUpdate::Home(cards))) = seen.last() else {
        panic!("expected home roster");
    };
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].join_code, "ABCD");
    // The home roster has nothing to poll.
    assert_eq!(fetcher.calls(), 0);

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Commands
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn interaction_starts_desired_ambient() {
    let connector = MockConnector::new(vec![Some(MockPush::new(vec![frame(&SnapshotJson::lobby())]))]);
    let (mut client, mut updates, log) = start(Role::Display, connector, None);

    until(&mut updates, |u| matches!(u, ClientUpdate::View(_))).await;
    assert!(log.entries().is_empty());

    client.interaction().unwrap();
    for _ in 0..100 {
        if !log.entries().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(log.entries(), ["ambient ambient_lobby"]);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn playback_callbacks_advance_voice_queue() {
    let base = SnapshotJson::lobby().round(1);
    let connector = MockConnector::new(vec![Some(MockPush::new(vec![
        frame(&base),
        frame(&base.clone().phase("drawings")),
        frame(&base.clone().phase("guesses")),
    ]))]);
    let (mut client, mut updates, log) = start(Role::Display, connector, None);
    client.interaction().unwrap();

    until(&mut updates, |u| {
        matches!(u, ClientUpdate::View(v) if v.phase == Phase::Guesses)
    })
    .await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(log.voices(), ["phase_drawings"]);

    client.playback_finished(CueKey::new("phase_drawings")).unwrap();
    for _ in 0..100 {
        if log.voices().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(log.voices(), ["phase_drawings", "phase_guesses"]);

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn shutdown_reports_disconnected_and_closes_updates() {
    let connector = MockConnector::new(vec![Some(MockPush::new(vec![]))]);
    let (mut client, mut updates, _log) = start(Role::Display, connector, None);

    until(&mut updates, is_state(ConnectionState::LivePush)).await;
    client.shutdown().await;

    let mut last_state = None;
    while let Some(update) = updates.recv().await {
        if let ClientUpdate::Connection(state) = update {
            last_state = Some(state);
        }
    }
    assert_eq!(last_state, Some(ConnectionState::Disconnected));
    assert!(matches!(
        client.interaction(),
        Err(ClientError::TransportClosed)
    ));
}

#[tokio::test]
async fn invalid_base_url_is_rejected() {
    let (sink, _log) = RecordingSink::new();
    let config = ClientConfig::new("ftp://localhost", "g1", Role::Display);
    let err = RoleClientHandle::start(
        config,
        Box::new(sink),
        MockConnector::new(vec![]),
        None,
        None,
    )
    .err()
    .unwrap();
    assert!(matches!(err, ClientError::Config(_)));
}

#[tokio::test]
async fn small_update_capacity_does_not_stall() {
    let frames = (0..20)
        .map(|n| frame(&SnapshotJson::lobby().players(&["Ann", "Bo"]).round(n)))
        .collect();
    let connector = MockConnector::new(vec![Some(MockPush::new(frames))]);
    let (sink, _log) = RecordingSink::new();
    let config = ClientConfig::new("http://localhost", "g1", Role::Display)
        .with_connection(ConnectionConfig::default().with_event_channel_capacity(1));
    let (mut client, mut updates) =
        RoleClientHandle::start(config, Box::new(sink), connector, None, None).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    // Something was delivered and the loops are still responsive.
    assert!(updates.recv().await.is_some());
    tokio::time::timeout(Duration::from_secs(5), client.shutdown())
        .await
        .expect("shutdown should not hang");
}
