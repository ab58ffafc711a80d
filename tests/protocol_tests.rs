#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol decoding tests for the Picture This client.
//!
//! Feeds JSON fixtures shaped like real authority output through
//! [`parse_frame`] and [`Snapshot::from_wire`], and checks the JSON shape of
//! the types the client serializes for its own consumers.

use picture_this_client::error_codes::ActionRejection;
use picture_this_client::protocol::{ErrorBody, Frame, WireSnapshot};
use picture_this_client::snapshot::{FocusKind, Phase, RevealStage, Snapshot};
use picture_this_client::{parse_frame, ConnectionState, TransportEvent};

// ════════════════════════════════════════════════════════════════════
// Helper
// ════════════════════════════════════════════════════════════════════

/// Parse a single snapshot frame and normalize it.
fn snapshot(text: &str) -> Option<Snapshot> {
    let frames = parse_frame(text).expect("fixture is JSON");
    assert_eq!(frames.len(), 1, "fixture should hold one frame");
    let Frame::Snapshot(wire) = &frames[0] else {
        panic!("expected a snapshot frame, got {:?}", frames[0]);
    };
    Snapshot::from_wire(wire)
}

// ════════════════════════════════════════════════════════════════════
// Fixtures
// ════════════════════════════════════════════════════════════════════

const VOTES_FIXTURE: &str = r#"{
    "game_id": "g-42",
    "join_code": "QZXW",
    "phase": "guesses-votes",
    "phase_ends_at": "2026-03-01T20:15:30Z",
    "players": ["Ann", "Bo", "Cy"],
    "player_ids": [11, 12, 13],
    "host_id": 11,
    "max_players": 8,
    "total_rounds": 3,
    "current_round": 2,
    "audience_count": 4,
    "counts": {"prompts": 3, "drawings": 3, "guesses": 6, "votes": 1},
    "vote_required_count": 6,
    "vote_submitted_count": 2,
    "vote_focus": {
        "drawing_index": 1,
        "drawing_owner": 12,
        "drawing_image": "/static/drawings/g-42/1.png",
        "voter_id": 13,
        "required_player_ids": [11, 13],
        "pending_player_ids": [13],
        "required_count": 2,
        "submitted_count": 1,
        "options": [
            {"id": "prompt", "text": "a cat in a hat", "type": "prompt"},
            {"id": "guess-11", "text": "a dog on a log", "type": "guess", "owner_id": 11}
        ]
    },
    "scores": [
        {"player_id": 11, "player_name": "Ann", "score": 500},
        {"player_id": 12, "player_name": "Bo", "score": 250}
    ]
}"#;

const JOKE_FIXTURE: &str = r#"{
    "game_id": "g-42",
    "phase": "results",
    "players": ["Ann", "Bo"],
    "player_ids": [11, 12],
    "current_round": 1,
    "total_rounds": 3,
    "reveal": {
        "stage": "joke",
        "drawing_index": 0,
        "drawing_owner": 11,
        "drawing_owner_name": "Ann",
        "drawing_image": "/static/drawings/g-42/0.png",
        "prompt": "a cat in a hat",
        "guesses": [{"player_id": 12, "player_name": "Bo", "text": "a hat cat"}],
        "votes": [{"player_id": 12, "player_name": "Bo", "text": "a cat in a hat", "type": "prompt"}],
        "score_deltas": [{"player_id": 12, "player_name": "Bo", "delta": 1000}],
        "joke": "The cat was a purr-fessional.",
        "joke_audio": "/static/audio/jokes/g-42-0.mp3"
    }
}"#;

// ════════════════════════════════════════════════════════════════════
// Snapshot normalization
// ════════════════════════════════════════════════════════════════════

#[test]
fn votes_fixture_normalizes() {
    let s = snapshot(VOTES_FIXTURE).unwrap();

    assert_eq!(s.game_id, "g-42");
    assert_eq!(s.join_code, "QZXW");
    assert_eq!(s.phase, Phase::GuessesVotes);
    assert_eq!(s.round_number, 2);
    assert_eq!(s.total_rounds, 3);
    assert!(s.phase_ends_at.is_some());

    assert_eq!(s.players.len(), 3);
    assert!(s.players[0].is_host);
    assert!(!s.players[1].is_host);
    assert_eq!(s.player_name(13), Some("Cy"));

    assert_eq!(s.counts.drawings.submitted, 3);
    assert_eq!(s.counts.drawings.required, 3);
    assert_eq!(s.counts.votes.submitted, 2);
    assert_eq!(s.counts.votes.required, 6);

    let focus = s.focus.as_ref().unwrap();
    assert_eq!(focus.kind, FocusKind::Vote);
    assert_eq!(focus.drawing_index, 1);
    assert_eq!(focus.owner, Some(12));
    assert_eq!(focus.actor, Some(13));
    assert!(focus.targets(13));
    assert!(!focus.targets(12));
    assert_eq!(focus.options.len(), 2);
    assert_eq!(focus.options[0].id, "prompt");
    assert_eq!(focus.options[1].text, "a dog on a log");

    assert_eq!(s.scores.len(), 2);
    assert_eq!(s.scores[0].score, 500);
    assert!(s.reveal.is_none());
}

#[test]
fn joke_fixture_carries_narration() {
    let s = snapshot(JOKE_FIXTURE).unwrap();
    let reveal = s.reveal.as_ref().unwrap();
    assert_eq!(reveal.stage, RevealStage::Joke);
    assert_eq!(reveal.drawing_index, 0);
    assert_eq!(reveal.narration(), Some("/static/audio/jokes/g-42-0.mp3"));
    assert_eq!(reveal.payload.score_deltas[0].delta, 1000);
    assert!(s.focus.is_none());
}

#[test]
fn narration_only_on_joke_stage() {
    let text = JOKE_FIXTURE.replace(r#""stage": "joke""#, r#""stage": "votes""#);
    let s = snapshot(&text).unwrap();
    let reveal = s.reveal.unwrap();
    assert_eq!(reveal.stage, RevealStage::Votes);
    assert_eq!(reveal.narration(), None);
}

#[test]
fn reveal_outside_results_is_ignored() {
    let text = JOKE_FIXTURE.replace(r#""phase": "results""#, r#""phase": "drawings""#);
    let s = snapshot(&text).unwrap();
    assert_eq!(s.phase, Phase::Drawings);
    assert!(s.reveal.is_none());
}

#[test]
fn focus_only_for_matching_phase() {
    // A vote focus left over in the guesses phase is not the active focus.
    let text = VOTES_FIXTURE.replace(r#""phase": "guesses-votes""#, r#""phase": "guesses""#);
    let s = snapshot(&text).unwrap();
    assert_eq!(s.phase, Phase::Guesses);
    assert!(s.focus.is_none());
}

#[test]
fn legacy_turn_field_becomes_guess_focus() {
    let s = snapshot(
        r#"{"phase":"guesses","players":["Ann","Bo"],"player_ids":[1,2],
            "guess_turn":{"drawing_index":0,"drawing_owner":1,"guesser_id":2}}"#,
    )
    .unwrap();
    let focus = s.focus.unwrap();
    assert_eq!(focus.kind, FocusKind::Guess);
    assert_eq!(focus.actor, Some(2));
}

#[test]
fn negative_drawing_index_drops_focus() {
    let s = snapshot(r#"{"phase":"guesses","guess_focus":{"drawing_index":-1}}"#).unwrap();
    assert!(s.focus.is_none());
}

#[test]
fn legacy_votes_phase_name_is_accepted() {
    let s = snapshot(r#"{"phase":"votes"}"#).unwrap();
    assert_eq!(s.phase, Phase::GuessesVotes);
}

#[test]
fn unknown_phase_does_not_normalize() {
    assert!(snapshot(r#"{"phase":"intermission"}"#).is_none());
}

#[test]
fn missing_host_and_deadline() {
    let s = snapshot(r#"{"phase":"lobby","players":["Ann"],"phase_ends_at":"soon"}"#).unwrap();
    assert_eq!(s.host_id, None);
    assert!(!s.players[0].is_host);
    assert!(s.phase_ends_at.is_none());
}

#[test]
fn guess_progress_falls_back_to_counts() {
    let s = snapshot(
        r#"{"phase":"guesses","counts":{"guesses":2},"guess_required_count":4}"#,
    )
    .unwrap();
    assert_eq!(s.counts.guesses.submitted, 2);
    assert_eq!(s.counts.guesses.required, 4);
    assert!(!s.counts.guesses.is_complete());
}

#[test]
fn paused_game_remembers_interrupted_phase() {
    let s = snapshot(r#"{"phase":"paused","paused_phase":"drawings"}"#).unwrap();
    assert_eq!(s.phase, Phase::Paused);
    assert_eq!(s.paused_phase, Some(Phase::Drawings));
}

#[test]
fn wire_snapshot_serializes_back_to_authority_field_names() {
    let frames = parse_frame(r#"{"phase":"guesses","guess_turn":{"drawing_index":3}}"#).unwrap();
    let Frame::Snapshot(wire) = &frames[0] else {
        panic!("expected snapshot");
    };
    let value = serde_json::to_value(wire.as_ref()).unwrap();
    assert_eq!(value["guess_focus"]["drawing_index"], 3);
    let again: WireSnapshot = serde_json::from_value(value).unwrap();
    assert_eq!(&again, wire.as_ref());
}

// ════════════════════════════════════════════════════════════════════
// Batches
// ════════════════════════════════════════════════════════════════════

#[test]
fn batch_preserves_order_and_skips_unknown_items() {
    let text = format!(
        r##"[{VOTES_FIXTURE}, {{"type":"ping"}}, {{"type":"html","target":"#joinCode","html":"ZZZZ"}}, {JOKE_FIXTURE}]"##
    );
    let frames = parse_frame(&text).unwrap();
    assert_eq!(frames.len(), 3);
    assert!(matches!(&frames[0], Frame::Snapshot(s) if s.phase == "guesses-votes"));
    assert!(matches!(&frames[1], Frame::Fragment(f) if f.target == "#joinCode"));
    assert!(matches!(&frames[2], Frame::Snapshot(s) if s.phase == "results"));
}

#[test]
fn empty_batch_yields_nothing() {
    assert!(parse_frame("[]").unwrap().is_empty());
    assert!(parse_frame("{}").unwrap().is_empty());
}

#[test]
fn truncated_json_is_an_error() {
    assert!(parse_frame(&VOTES_FIXTURE[..40]).is_err());
}

// ════════════════════════════════════════════════════════════════════
// Rejections
// ════════════════════════════════════════════════════════════════════

#[test]
fn error_body_classifies() {
    let body: ErrorBody = serde_json::from_str(r#"{"error":"Vote already submitted"}"#).unwrap();
    let kind = ActionRejection::classify(409, &body.error);
    assert_eq!(kind, ActionRejection::AlreadySubmitted);
    assert!(!kind.invalidates_identity());

    let expired = ActionRejection::classify(401, "Invalid audience authentication");
    assert_eq!(expired, ActionRejection::SessionExpired);
    assert!(expired.invalidates_identity());

    assert_eq!(ActionRejection::classify(404, "game not found"), ActionRejection::NotFound);
    assert_eq!(ActionRejection::classify(500, "boom"), ActionRejection::Other);
}

#[test]
fn rejection_serializes_screaming_snake_case() {
    let json = serde_json::to_string(&ActionRejection::SessionExpired).unwrap();
    assert_eq!(json, r#""SESSION_EXPIRED""#);
    assert_eq!(ActionRejection::SessionExpired.to_string(), "SESSION_EXPIRED");
}

// ════════════════════════════════════════════════════════════════════
// Client-side JSON shapes
// ════════════════════════════════════════════════════════════════════

#[test]
fn transport_event_json_shape() {
    let event = TransportEvent::StateChanged(ConnectionState::LivePoll);
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "state_changed");
    assert_eq!(value["data"], "live_poll");
}
