//! Wire types for the Picture This authority.
//!
//! These mirror the JSON the authority emits on `GET /api/games/{id}` and on
//! the `/ws/games/{id}` and `/ws/home` push subscriptions. Every field is
//! defaulted so that older or partial payloads still decode; turning them into
//! a trustworthy [`Snapshot`](crate::snapshot::Snapshot) is the job of
//! [`Snapshot::from_wire`](crate::snapshot::Snapshot::from_wire).
//!
//! Push frames come in three shapes: a JSON snapshot, an HTML fragment
//! (`{"type":"html", ...}`), or an array batch of either. [`parse_frame`]
//! classifies them without failing on shapes it does not recognize.

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ── Type aliases ────────────────────────────────────────────────────

/// Identifier of a player or audience member, as assigned by the authority.
pub type PlayerId = i64;

/// Identifier of a game (an opaque string chosen by the authority).
pub type GameId = String;

// ── Snapshot payload ────────────────────────────────────────────────

/// Full game snapshot as delivered by the authority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireSnapshot {
    pub game_id: GameId,
    pub join_code: String,
    pub phase: String,
    /// Phase that was active when the game was paused.
    pub paused_phase: String,
    /// RFC 3339 deadline of the current phase; empty when untimed.
    pub phase_ends_at: String,
    /// Display names, index-aligned with `player_ids`.
    pub players: Vec<String>,
    pub player_ids: Vec<PlayerId>,
    pub host_id: PlayerId,
    pub max_players: u32,
    pub lobby_locked: bool,
    pub total_rounds: u32,
    pub current_round: u32,
    pub audience_count: u32,
    pub counts: WireCounts,
    pub guess_required_count: u32,
    pub guess_submitted_count: u32,
    pub vote_required_count: u32,
    pub vote_submitted_count: u32,
    #[serde(alias = "guess_turn")]
    pub guess_focus: Option<WireFocus>,
    #[serde(alias = "vote_turn")]
    pub vote_focus: Option<WireFocus>,
    pub reveal: Option<WireReveal>,
    pub scores: Vec<WireScore>,
}

/// Per-activity submission tallies for the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireCounts {
    pub prompts: u32,
    pub drawings: u32,
    pub guesses: u32,
    pub votes: u32,
}

/// The drawing currently being guessed or voted on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireFocus {
    pub drawing_index: i64,
    pub drawing_owner: Option<PlayerId>,
    pub drawing_image: String,
    /// Next player expected to guess (guess focus only).
    pub guesser_id: Option<PlayerId>,
    /// Next player expected to vote (vote focus only).
    pub voter_id: Option<PlayerId>,
    pub required_player_ids: Vec<PlayerId>,
    pub pending_player_ids: Vec<PlayerId>,
    pub required_count: u32,
    pub submitted_count: u32,
    pub options: Vec<WireOption>,
}

/// A vote option: either bare text (legacy) or a structured choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireOption {
    Text(String),
    Choice(WireChoice),
}

impl WireOption {
    /// Display text of the option.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Choice(choice) => &choice.text,
        }
    }

    /// Identifier to submit when picking this option.
    pub fn id(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Choice(choice) if choice.id.is_empty() => &choice.text,
            Self::Choice(choice) => &choice.id,
        }
    }
}

/// Structured vote option, also used in reveal payloads with vote tallies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireChoice {
    pub id: String,
    pub text: String,
    /// `"prompt"` for the real prompt, `"guess"` for a player's fake.
    #[serde(rename = "type")]
    pub kind: String,
    pub owner_id: Option<PlayerId>,
    pub owner_name: String,
    pub player_votes: Vec<WireEntry>,
    pub audience_count: u32,
}

/// Results-phase reveal payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireReveal {
    pub stage: String,
    pub drawing_index: i64,
    pub drawing_owner: Option<PlayerId>,
    pub drawing_owner_name: String,
    pub drawing_image: String,
    pub prompt: String,
    pub guesses: Vec<WireEntry>,
    pub votes: Vec<WireEntry>,
    pub audience_votes: Vec<WireAudienceVote>,
    pub options: Vec<WireChoice>,
    pub score_deltas: Vec<WireScoreDelta>,
    pub joke: String,
    /// Narration asset for the joke stage.
    pub joke_audio: String,
}

/// A guess or vote attributed to a player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireEntry {
    pub player_id: Option<PlayerId>,
    pub player_name: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Aggregated audience votes for one option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireAudienceVote {
    pub text: String,
    pub count: u32,
}

/// Points gained by a player on the revealed drawing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireScoreDelta {
    pub player_id: Option<PlayerId>,
    pub player_name: String,
    pub delta: i64,
}

/// Running score of one player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireScore {
    pub player_id: PlayerId,
    pub player_name: String,
    pub score: i64,
}

// ── Fragments ───────────────────────────────────────────────────────

/// How a fragment replaces its target region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Swap {
    /// Replace the target's children.
    #[default]
    Inner,
    /// Replace the target element itself.
    Outer,
}

/// Targeted partial update addressed to a named UI region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlFragment {
    /// CSS selector of the target region (e.g. `#gameStatus`).
    pub target: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub swap: Swap,
}

// ── Home roster ─────────────────────────────────────────────────────

/// Payload of the `/ws/home` roster subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeUpdate {
    pub games: Vec<GameSummary>,
}

/// One open game in the home roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSummary {
    pub id: GameId,
    pub join_code: String,
    pub phase: String,
    pub players: u32,
}

/// Body of a non-2xx authority response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub error: String,
}

// ── Frame classification ────────────────────────────────────────────

/// One decoded push or poll message.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A full game snapshot (boxed to reduce enum size).
    Snapshot(Box<WireSnapshot>),
    /// An HTML fragment update.
    Fragment(HtmlFragment),
    /// A home roster update.
    Home(HomeUpdate),
}

/// Decode a raw text frame into zero or more [`Frame`]s.
///
/// Batches (JSON arrays) are flattened in order. Items that are neither a
/// snapshot, a fragment nor a home update are skipped.
///
/// # Errors
///
/// Returns [`ClientError::Serialization`](crate::ClientError::Serialization)
/// if the text is not JSON at all.
pub fn parse_frame(text: &str) -> Result<Vec<Frame>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let mut frames = Vec::new();
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                if let Some(frame) = classify(item) {
                    frames.push(frame);
                }
            }
        }
        other => {
            if let Some(frame) = classify(other) {
                frames.push(frame);
            }
        }
    }
    Ok(frames)
}

fn classify(value: serde_json::Value) -> Option<Frame> {
    let object = value.as_object()?;
    if object.get("type").and_then(serde_json::Value::as_str) == Some("html") {
        return serde_json::from_value::<HtmlFragment>(value)
            .ok()
            .map(Frame::Fragment);
    }
    if object.contains_key("phase") {
        return serde_json::from_value::<WireSnapshot>(value)
            .ok()
            .map(|snapshot| Frame::Snapshot(Box::new(snapshot)));
    }
    if object.contains_key("games") {
        return serde_json::from_value::<HomeUpdate>(value).ok().map(Frame::Home);
    }
    None
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

    #[test]
    fn snapshot_frame_decodes_with_missing_fields() {
        let frames = parse_frame(r#"{"phase":"lobby","players":["Ann","Bo"]}"#).unwrap();
        assert_eq!(frames.len(), 1);
        let Frame::Snapshot(snapshot) = &frames[0] else {
            panic!("expected snapshot, got {:?}", frames[0]);
        };
        assert_eq!(snapshot.phase, "lobby");
        assert_eq!(snapshot.players, vec!["Ann", "Bo"]);
        assert!(snapshot.reveal.is_none());
    }

    #[test]
    fn null_focus_decodes_as_none() {
        let frames = parse_frame(r#"{"phase":"guesses","guess_focus":null}"#).unwrap();
        let Frame::Snapshot(snapshot) = &frames[0] else {
            panic!("expected snapshot");
        };
        assert!(snapshot.guess_focus.is_none());
    }

    #[test]
    fn legacy_turn_fields_alias_focus() {
        let frames =
            parse_frame(r#"{"phase":"guesses","guess_turn":{"drawing_index":2,"guesser_id":7}}"#)
                .unwrap();
        let Frame::Snapshot(snapshot) = &frames[0] else {
            panic!("expected snapshot");
        };
        let focus = snapshot.guess_focus.as_ref().unwrap();
        assert_eq!(focus.drawing_index, 2);
        assert_eq!(focus.guesser_id, Some(7));
    }

    #[test]
    fn fragment_and_batch_frames() {
        let text = r##"[
            {"type":"html","target":"#gameStatus","html":"guesses","swap":"inner"},
            {"type":"html","target":"#joinCode","html":"ABCD"},
            {"something":"else"},
            42
        ]"##;
        let frames = parse_frame(text).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(matches!(
            &frames[0],
            Frame::Fragment(HtmlFragment { target, swap: Swap::Inner, .. }) if target == "#gameStatus"
        ));
        assert!(matches!(&frames[1], Frame::Fragment(f) if f.swap == Swap::Inner));
    }

    #[test]
    fn home_update_frame() {
        let frames =
            parse_frame(r#"{"games":[{"id":"g1","join_code":"QWER","phase":"lobby","players":3}]}"#)
                .unwrap();
        let Frame::Home(update) = &frames[0] else {
            panic!("expected home update");
        };
        assert_eq!(update.games[0].players, 3);
    }

    #[test]
    fn non_json_is_an_error() {
        assert!(parse_frame("<div>hi</div>").is_err());
    }

    #[test]
    fn vote_options_accept_text_and_objects() {
        let text = r#"{"phase":"guesses-votes","vote_focus":{"drawing_index":0,
            "options":["plain",{"id":"prompt","text":"a cat","type":"prompt"}]}}"#;
        let frames = parse_frame(text).unwrap();
        let Frame::Snapshot(snapshot) = &frames[0] else {
            panic!("expected snapshot");
        };
        let options = &snapshot.vote_focus.as_ref().unwrap().options;
        assert_eq!(options[0].text(), "plain");
        assert_eq!(options[0].id(), "plain");
        assert_eq!(options[1].text(), "a cat");
        assert_eq!(options[1].id(), "prompt");
    }
}
