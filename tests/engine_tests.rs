#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Engine behavior tests: reconciliation, effect sequencing and projection
//! driven through the deterministic [`RoleClient`] and its components.

mod common;

use picture_this_client::event::TransportEvent;
use picture_this_client::projector::RolePanel;
use picture_this_client::sequencer::{AmbientState, VoiceState};
use picture_this_client::{
    ClientConfig, ClientEvent, ClientUpdate, CueCatalog, CueKey, EffectSequencer, Role,
    RoleClient, Snapshot, SnapshotStore, SubmissionMemory, ViewProjector, Viewer, WireSnapshot,
};
use time::OffsetDateTime;

use common::{AudioLog, RecordingSink, SnapshotJson};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn snapshot(json: &SnapshotJson) -> Snapshot {
    let wire: WireSnapshot = serde_json::from_str(&json.build()).unwrap();
    Snapshot::from_wire(&wire).unwrap()
}

fn display_client() -> (RoleClient, AudioLog) {
    let (sink, log) = RecordingSink::new();
    let config = ClientConfig::new("http://localhost", "g1", Role::Display);
    let mut client = RoleClient::new(&config, Box::new(sink), None);
    client.handle(ClientEvent::Interaction);
    (client, log)
}

fn deliver(client: &mut RoleClient, json: &SnapshotJson) -> Vec<ClientUpdate> {
    client.handle(ClientEvent::Transport(TransportEvent::Message(json.build())))
}

fn finish(client: &mut RoleClient, key: &str) {
    client.handle(ClientEvent::PlaybackFinished(CueKey::new(key)));
}

fn sequencer(catalog: CueCatalog) -> (EffectSequencer, AudioLog) {
    let (sink, log) = RecordingSink::new();
    (EffectSequencer::new(Box::new(sink), catalog), log)
}

fn stings(log: &AudioLog) -> Vec<String> {
    log.entries()
        .iter()
        .filter_map(|e| e.strip_prefix("sting ").map(str::to_string))
        .collect()
}

// ════════════════════════════════════════════════════════════════════
// Idempotence
// ════════════════════════════════════════════════════════════════════

#[test]
fn duplicate_delivery_has_no_effect() {
    let (mut client, log) = display_client();
    let lobby = SnapshotJson::lobby();
    let drawings = lobby.clone().phase("drawings").round(1);

    deliver(&mut client, &lobby);
    let first = deliver(&mut client, &drawings);
    assert!(!first.is_empty());
    let audio = log.entries();

    let second = deliver(&mut client, &drawings);
    assert!(second.is_empty(), "duplicate produced {second:?}");
    assert_eq!(log.entries(), audio);
}

// ════════════════════════════════════════════════════════════════════
// Forward progress
// ════════════════════════════════════════════════════════════════════

#[test]
fn round_start_only_fires_on_forward_progress() {
    let mut store = SnapshotStore::new();
    let base = SnapshotJson::lobby().phase("drawings");

    let mut started = Vec::new();
    for (round, drawn) in [(3, 0), (3, 1), (2, 0), (4, 0)] {
        let r = store.reconcile(snapshot(&base.clone().round(round).drawings(drawn)));
        started.push(r.transition.round_started);
    }
    assert_eq!(started, [None, None, None, Some(4)]);
    // The stale snapshot was still applied.
    assert_eq!(store.current().unwrap().round_number, 4);
}

#[test]
fn stale_snapshot_is_applied_without_cues() {
    let (mut client, log) = display_client();
    let base = SnapshotJson::lobby();
    deliver(&mut client, &base.clone().phase("results").round(3));
    log.take();

    let updates = deliver(&mut client, &base.clone().phase("drawings").round(2));
    assert!(updates.iter().all(|u| !matches!(u, ClientUpdate::Cues(_))));
    assert!(log.voices().is_empty());
    assert_eq!(client.snapshot().unwrap().round_number, 2);
}

#[test]
fn fresh_state_after_stale_delivery_does_not_replay_cues() {
    let (mut client, log) = display_client();
    let base = SnapshotJson::lobby();
    let results = base.clone().phase("results").round(2);
    let drawings = base.clone().phase("drawings").round(3);

    deliver(&mut client, &results);
    deliver(&mut client, &drawings);
    finish(&mut client, "phase_drawings");

    // Poll and push race: an old body lands, then the fresh one again.
    deliver(&mut client, &results);
    let updates = deliver(&mut client, &drawings);
    assert!(updates.iter().all(|u| !matches!(u, ClientUpdate::Cues(_))));
    finish(&mut client, "phase_drawings");

    assert_eq!(log.voices(), ["phase_drawings"]);
    assert_eq!(client.view().unwrap().phase, picture_this_client::Phase::Drawings);
}

// ════════════════════════════════════════════════════════════════════
// Voice and ambient arbitration
// ════════════════════════════════════════════════════════════════════

#[test]
fn voice_cues_play_in_turn_and_ambient_follows_current_phase() {
    let catalog = CueCatalog::default().with_asset("reveal_joke_A", "/audio/joke_a.mp3");
    let (mut seq, log) = sequencer(catalog);
    let mut store = SnapshotStore::new();
    seq.on_interaction();

    let guesses = SnapshotJson::lobby().phase("guesses").round(1);
    let r = store.reconcile(snapshot(&guesses));
    seq.on_transition(&r.transition, r.snapshot);
    assert_eq!(*seq.ambient(), AmbientState::Playing(CueKey::new("ambient_guesses")));

    assert!(seq.enqueue_voice(CueKey::new("phase_guesses")));
    assert!(seq.enqueue_voice(CueKey::new("reveal_joke_A")));
    assert_eq!(*seq.ambient(), AmbientState::Paused(CueKey::new("ambient_guesses")));

    seq.on_voice_finished(&CueKey::new("phase_guesses"));
    assert_eq!(*seq.voice(), VoiceState::Playing(CueKey::new("reveal_joke_A")));

    // The phase moves on while narration is still playing.
    let r = store.reconcile(snapshot(&guesses.clone().phase("guesses-votes")));
    seq.on_transition(&r.transition, r.snapshot);
    seq.on_voice_finished(&CueKey::new("reveal_joke_A"));
    seq.on_voice_finished(&CueKey::new("phase_votes"));

    assert_eq!(
        log.entries(),
        [
            "ambient ambient_guesses",
            "pause",
            "voice phase_guesses",
            "voice reveal_joke_A",
            "voice phase_votes",
            "stop",
            "ambient ambient_votes",
        ]
    );
    assert_eq!(*seq.voice(), VoiceState::Idle);
}

#[test]
fn same_ambient_resumes_after_voice() {
    let (mut seq, log) = sequencer(CueCatalog::default());
    let mut store = SnapshotStore::new();
    seq.on_interaction();
    let r = store.reconcile(snapshot(&SnapshotJson::lobby()));
    seq.on_transition(&r.transition, r.snapshot);

    seq.enqueue_voice(CueKey::new("phase_drawings"));
    seq.on_voice_finished(&CueKey::new("phase_drawings"));
    assert_eq!(
        log.entries(),
        ["ambient ambient_lobby", "pause", "voice phase_drawings", "resume"]
    );
}

#[test]
fn consecutive_duplicate_voice_cue_plays_once() {
    let (mut seq, log) = sequencer(CueCatalog::default());
    assert!(seq.enqueue_voice(CueKey::new("phase_results")));
    assert!(!seq.enqueue_voice(CueKey::new("phase_results")));
    assert_eq!(seq.queued().count(), 1);

    seq.on_interaction();
    seq.on_voice_finished(&CueKey::new("phase_results"));
    assert_eq!(log.voices(), ["phase_results"]);
}

#[test]
fn refused_voice_cue_does_not_wedge_channel() {
    let (sink, log) = RecordingSink::new();
    let mut seq = EffectSequencer::new(Box::new(sink.refusing("phase_guesses")), CueCatalog::default());
    seq.on_interaction();
    seq.enqueue_voice(CueKey::new("phase_guesses"));
    assert_eq!(*seq.voice(), VoiceState::Idle);

    seq.enqueue_voice(CueKey::new("phase_votes"));
    assert_eq!(log.voices(), ["phase_votes"]);
}

#[test]
fn playback_failure_moves_to_next_cue() {
    let (mut client, log) = display_client();
    let base = SnapshotJson::lobby().round(1);
    deliver(&mut client, &base.clone().phase("drawings"));
    deliver(&mut client, &base.clone().phase("guesses"));
    deliver(&mut client, &base.clone().phase("guesses-votes"));
    assert_eq!(log.voices(), ["phase_guesses"]);

    client.handle(ClientEvent::PlaybackFailed {
        key: CueKey::new("phase_guesses"),
        reason: "decode error".into(),
    });
    assert_eq!(log.voices(), ["phase_guesses", "phase_votes"]);
}

#[test]
fn nothing_plays_before_first_interaction() {
    let (sink, log) = RecordingSink::new();
    let config = ClientConfig::new("http://localhost", "g1", Role::Display);
    let mut client = RoleClient::new(&config, Box::new(sink), None);

    let base = SnapshotJson::lobby();
    deliver(&mut client, &base);
    deliver(&mut client, &base.clone().phase("drawings").round(1));
    deliver(&mut client, &base.clone().phase("drawings").round(1).players(&["Ann", "Bo", "Cy"]));
    assert!(log.entries().is_empty());
    assert!(!client.sequencer().is_unlocked());

    client.handle(ClientEvent::Interaction);
    // The join sting was not kept; the interlude was.
    assert_eq!(log.entries(), ["voice phase_drawings"]);

    // The desired ambient starts once the voice channel is free.
    finish(&mut client, "phase_drawings");
    assert_eq!(log.entries(), ["voice phase_drawings", "ambient ambient_drawings"]);
}

// ════════════════════════════════════════════════════════════════════
// Scenarios
// ════════════════════════════════════════════════════════════════════

#[test]
fn player_join_fires_sting_and_grows_roster() {
    let (mut client, log) = display_client();
    let lobby = SnapshotJson::lobby();
    deliver(&mut client, &lobby);

    let updates = deliver(&mut client, &lobby.clone().players(&["Ann", "Bo", "Cy"]));
    let cues = updates
        .iter()
        .find_map(|u| match u {
            ClientUpdate::Cues(cues) => Some(cues.clone()),
            _ => None,
        })
        .expect("cues for the join");
    assert!(cues.iter().any(|c| c.key.as_str() == "sting_join"));
    assert_eq!(stings(&log), ["sting_join"]);
    assert_eq!(client.view().unwrap().players.len(), 3);
}

#[test]
fn all_submitted_edge_fires_once() {
    let (mut client, log) = display_client();
    let votes = SnapshotJson::lobby().phase("guesses-votes").round(1);
    deliver(&mut client, &votes.clone().votes(2, 3));
    log.take();

    deliver(&mut client, &votes.clone().votes(3, 3));
    deliver(&mut client, &votes.clone().votes(3, 3));
    // Still complete after an unrelated change.
    deliver(&mut client, &votes.clone().votes(3, 3).ends_at("2030-01-01T00:00:00Z"));

    let fired: Vec<_> = stings(&log)
        .into_iter()
        .filter(|s| s == "sting_all_submitted")
        .collect();
    assert_eq!(fired.len(), 1);
}

#[test]
fn reveal_sequence_enqueues_narration_in_order() {
    let (mut client, log) = display_client();
    let base = SnapshotJson::lobby().round(3);
    deliver(&mut client, &base.clone().phase("guesses-votes"));
    deliver(&mut client, &base.clone().phase("results").reveal("guesses", 0, ""));
    finish(&mut client, "phase_results");
    finish(&mut client, "reveal_guesses");
    assert_eq!(log.voices(), ["phase_results", "reveal_guesses"]);
    log.take();

    let mut enqueued = Vec::new();
    for step in [
        base.clone().phase("results").reveal("votes", 0, ""),
        base.clone().phase("results").reveal("joke", 0, "X"),
        // Echo from the poll loop.
        base.clone().phase("results").reveal("joke", 0, "X"),
        base.clone().phase("complete"),
    ] {
        for update in deliver(&mut client, &step) {
            if let ClientUpdate::Cues(cues) = update {
                enqueued.extend(
                    cues.into_iter()
                        .filter(|c| c.channel == picture_this_client::Channel::Voice)
                        .map(|c| c.key.to_string()),
                );
            }
        }
    }
    assert_eq!(enqueued, ["reveal_votes", "reveal_joke:X", "phase_complete"]);

    finish(&mut client, "reveal_votes");
    finish(&mut client, "reveal_joke:X");
    finish(&mut client, "phase_complete");
    assert_eq!(log.voices(), ["reveal_votes", "reveal_joke:X", "phase_complete"]);
}

#[test]
fn timer_sting_fires_once_per_phase_and_round() {
    let (mut client, log) = display_client();
    let t0 = OffsetDateTime::from_unix_timestamp(1_900_000_000).unwrap();
    let deadline = (t0 + time::Duration::seconds(2))
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap();

    client.handle(ClientEvent::Tick(t0));
    deliver(
        &mut client,
        &SnapshotJson::lobby().phase("drawings").round(1).ends_at(&deadline),
    );
    log.take();

    client.handle(ClientEvent::Tick(t0 + time::Duration::seconds(1)));
    assert_eq!(client.view().unwrap().timer, "00:01");
    client.handle(ClientEvent::Tick(t0 + time::Duration::seconds(3)));
    client.handle(ClientEvent::Tick(t0 + time::Duration::seconds(4)));
    assert_eq!(stings(&log), ["sting_timer_elapsed"]);
    assert_eq!(client.view().unwrap().timer, "00:00");
}

// ════════════════════════════════════════════════════════════════════
// Projection
// ════════════════════════════════════════════════════════════════════

#[test]
fn own_drawing_is_never_judged() {
    let snap = snapshot(
        &SnapshotJson::lobby()
            .phase("guesses-votes")
            .round(1)
            .vote_focus(0, 1, &[1, 2]),
    );
    let mut memory = SubmissionMemory::new();
    let projector = ViewProjector::new();
    let now = OffsetDateTime::now_utc();

    for viewer in [Viewer::new(Role::Player, Some(1)), Viewer::new(Role::Audience, Some(1))] {
        for submitted in [false, true] {
            if submitted {
                memory.mark(1, 0);
            }
            let view = projector.project(&snap, &viewer, &memory, now);
            let form = match view.panel {
                RolePanel::Player(p) => p.action,
                RolePanel::Audience(p) => p.action,
                other => panic!("unexpected panel {other:?}"),
            };
            assert!(!form.expect("vote form").enabled);
        }
        memory = SubmissionMemory::new();
    }

    let other = projector.project(&snap, &Viewer::new(Role::Player, Some(2)), &memory, now);
    let RolePanel::Player(panel) = other.panel else {
        panic!("expected player panel");
    };
    assert!(panel.action.unwrap().enabled);
}

#[test]
fn view_survives_disconnect() {
    let (mut client, _log) = display_client();
    deliver(&mut client, &SnapshotJson::lobby().phase("drawings").round(1));
    let before = client.view().cloned();

    client.handle(ClientEvent::Transport(TransportEvent::StateChanged(
        picture_this_client::ConnectionState::Disconnected,
    )));
    assert_eq!(client.view().cloned(), before);
}
