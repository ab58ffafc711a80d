//! Domain model of the authoritative game state.
//!
//! A [`Snapshot`] is the normalized, typed view of one [`WireSnapshot`]. The
//! client never mutates it; every delivery replaces it wholesale.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::protocol::{GameId, PlayerId, WireFocus, WireOption, WireReveal, WireSnapshot};

// ── Phase ───────────────────────────────────────────────────────────

/// Phase of a match.
///
/// The normal progression is `lobby → drawings → guesses → guesses-votes →
/// results → drawings | complete`. `paused` is entered by the authority when
/// players must reclaim their seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Lobby,
    Drawings,
    Guesses,
    GuessesVotes,
    Results,
    Complete,
    Paused,
}

impl Phase {
    /// Parse the authority's phase name. The legacy name `votes` maps to
    /// [`Phase::GuessesVotes`].
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "lobby" => Some(Self::Lobby),
            "drawings" => Some(Self::Drawings),
            "guesses" => Some(Self::Guesses),
            "guesses-votes" | "votes" => Some(Self::GuessesVotes),
            "results" => Some(Self::Results),
            "complete" => Some(Self::Complete),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }

    /// The authority's name for this phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Drawings => "drawings",
            Self::Guesses => "guesses",
            Self::GuessesVotes => "guesses-votes",
            Self::Results => "results",
            Self::Complete => "complete",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which piece of a drawing's results is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevealStage {
    Guesses,
    Votes,
    Joke,
}

impl RevealStage {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "guesses" => Some(Self::Guesses),
            "votes" => Some(Self::Votes),
            "joke" => Some(Self::Joke),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guesses => "guesses",
            Self::Votes => "votes",
            Self::Joke => "joke",
        }
    }
}

// ── Roster and progress ─────────────────────────────────────────────

/// A seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub is_host: bool,
}

/// An activity whose submissions are tallied per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Drawings,
    Guesses,
    Votes,
}

impl Activity {
    pub const ALL: [Activity; 3] = [Activity::Drawings, Activity::Guesses, Activity::Votes];
}

/// Submitted/required tally for one activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub submitted: u32,
    pub required: u32,
}

impl Progress {
    /// Returns `true` once every required submission is in.
    pub fn is_complete(&self) -> bool {
        self.required > 0 && self.submitted >= self.required
    }
}

/// Tallies for the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub drawings: Progress,
    pub guesses: Progress,
    pub votes: Progress,
}

impl Counts {
    pub fn get(&self, activity: Activity) -> Progress {
        match activity {
            Activity::Drawings => self.drawings,
            Activity::Guesses => self.guesses,
            Activity::Votes => self.votes,
        }
    }
}

// ── Focus and reveal ────────────────────────────────────────────────

/// Whether the focus collects guesses or votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusKind {
    Guess,
    Vote,
}

/// A selectable vote option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOption {
    pub id: String,
    pub text: String,
}

/// The single drawing currently being guessed or voted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Focus {
    pub kind: FocusKind,
    pub drawing_index: u32,
    /// Author of the drawing under judgement.
    pub owner: Option<PlayerId>,
    pub image: String,
    /// Player whose turn it is, when the authority designates one.
    pub actor: Option<PlayerId>,
    /// Players who still owe a submission on this drawing.
    pub pending: Vec<PlayerId>,
    pub options: Vec<VoteOption>,
}

impl Focus {
    fn from_wire(kind: FocusKind, wire: &WireFocus) -> Option<Self> {
        let drawing_index = u32::try_from(wire.drawing_index).ok()?;
        let actor = match kind {
            FocusKind::Guess => wire.guesser_id,
            FocusKind::Vote => wire.voter_id,
        };
        Some(Self {
            kind,
            drawing_index,
            owner: wire.drawing_owner,
            image: wire.drawing_image.clone(),
            actor,
            pending: wire.pending_player_ids.clone(),
            options: wire.options.iter().map(vote_option).collect(),
        })
    }

    /// Returns `true` if `viewer` is expected to act on this focus.
    pub fn targets(&self, viewer: PlayerId) -> bool {
        self.actor == Some(viewer) || self.pending.contains(&viewer)
    }
}

fn vote_option(option: &WireOption) -> VoteOption {
    VoteOption {
        id: option.id().to_string(),
        text: option.text().to_string(),
    }
}

/// Results-phase sub-state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reveal {
    pub stage: RevealStage,
    pub drawing_index: u32,
    /// Full reveal payload (guesses, votes, options, score deltas, joke).
    pub payload: WireReveal,
}

impl Reveal {
    /// Narration asset to play, present only on the joke stage.
    pub fn narration(&self) -> Option<&str> {
        if self.stage == RevealStage::Joke && !self.payload.joke_audio.is_empty() {
            Some(&self.payload.joke_audio)
        } else {
            None
        }
    }
}

/// Running score of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub player_id: PlayerId,
    pub player_name: String,
    pub score: i64,
}

// ── Snapshot ────────────────────────────────────────────────────────

/// The authoritative state as last observed.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub game_id: GameId,
    pub join_code: String,
    pub phase: Phase,
    /// Phase interrupted by a pause.
    pub paused_phase: Option<Phase>,
    pub round_number: u32,
    pub total_rounds: u32,
    pub phase_ends_at: Option<OffsetDateTime>,
    pub players: Vec<Player>,
    pub host_id: Option<PlayerId>,
    pub max_players: u32,
    pub lobby_locked: bool,
    pub audience_count: u32,
    pub counts: Counts,
    pub focus: Option<Focus>,
    pub reveal: Option<Reveal>,
    pub scores: Vec<Score>,
}

impl Snapshot {
    /// Normalize a wire snapshot.
    ///
    /// Returns `None` when the phase is not recognizable; such payloads are
    /// dropped by the caller.
    pub fn from_wire(wire: &WireSnapshot) -> Option<Self> {
        let phase = Phase::parse(&wire.phase)?;
        let host_id = (wire.host_id != 0).then_some(wire.host_id);

        let players: Vec<Player> = wire
            .players
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let id = wire.player_ids.get(index).copied().unwrap_or_default();
                Player {
                    id,
                    display_name: name.clone(),
                    is_host: host_id.is_some_and(|host| host == id),
                }
            })
            .collect();

        let seated = u32::try_from(players.len()).unwrap_or(u32::MAX);
        let counts = Counts {
            drawings: Progress {
                submitted: wire.counts.drawings,
                required: seated,
            },
            guesses: Progress {
                submitted: fallback(wire.guess_submitted_count, wire.counts.guesses),
                required: wire.guess_required_count,
            },
            votes: Progress {
                submitted: fallback(wire.vote_submitted_count, wire.counts.votes),
                required: wire.vote_required_count,
            },
        };

        let focus = match phase {
            Phase::Guesses => wire
                .guess_focus
                .as_ref()
                .and_then(|f| Focus::from_wire(FocusKind::Guess, f)),
            Phase::GuessesVotes => wire
                .vote_focus
                .as_ref()
                .and_then(|f| Focus::from_wire(FocusKind::Vote, f)),
            _ => None,
        };

        let reveal = match (phase, wire.reveal.as_ref()) {
            (Phase::Results, Some(reveal)) => {
                RevealStage::parse(&reveal.stage).and_then(|stage| {
                    Some(Reveal {
                        stage,
                        drawing_index: u32::try_from(reveal.drawing_index).ok()?,
                        payload: reveal.clone(),
                    })
                })
            }
            _ => None,
        };

        Some(Self {
            game_id: wire.game_id.clone(),
            join_code: wire.join_code.clone(),
            phase,
            paused_phase: Phase::parse(&wire.paused_phase),
            round_number: wire.current_round,
            total_rounds: wire.total_rounds,
            phase_ends_at: parse_deadline(&wire.phase_ends_at),
            players,
            host_id,
            max_players: wire.max_players,
            lobby_locked: wire.lobby_locked,
            audience_count: wire.audience_count,
            counts,
            focus,
            reveal,
            scores: wire
                .scores
                .iter()
                .map(|s| Score {
                    player_id: s.player_id,
                    player_name: s.player_name.clone(),
                    score: s.score,
                })
                .collect(),
        })
    }

    /// Look up a player's display name.
    pub fn player_name(&self, id: PlayerId) -> Option<&str> {
        self.players
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.display_name.as_str())
    }
}

fn fallback(primary: u32, secondary: u32) -> u32 {
    if primary > 0 {
        primary
    } else {
        secondary
    }
}

fn parse_deadline(raw: &str) -> Option<OffsetDateTime> {
    if raw.is_empty() {
        return None;
    }
    OffsetDateTime::parse(raw, &Rfc3339).ok()
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
    use crate::protocol::WireCounts;

    fn wire(phase: &str) -> WireSnapshot {
        WireSnapshot {
            phase: phase.into(),
            players: vec!["Ann".into(), "Bo".into(), "Cy".into()],
            player_ids: vec![1, 2, 3],
            host_id: 1,
            current_round: 1,
            ..Default::default()
        }
    }

    #[test]
    fn phase_names_round_trip() {
        for phase in [
            Phase::Lobby,
            Phase::Drawings,
            Phase::Guesses,
            Phase::GuessesVotes,
            Phase::Results,
            Phase::Complete,
            Phase::Paused,
        ] {
            assert_eq!(Phase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(Phase::parse("votes"), Some(Phase::GuessesVotes));
        assert_eq!(Phase::parse("intermission"), None);
    }

    #[test]
    fn unknown_phase_is_not_a_snapshot() {
        assert!(Snapshot::from_wire(&wire("warmup")).is_none());
    }

    #[test]
    fn roster_marks_host() {
        let snapshot = Snapshot::from_wire(&wire("lobby")).unwrap();
        assert_eq!(snapshot.players.len(), 3);
        assert!(snapshot.players[0].is_host);
        assert!(!snapshot.players[1].is_host);
        assert_eq!(snapshot.player_name(2), Some("Bo"));
    }

    #[test]
    fn drawings_required_is_seated_players() {
        let mut w = wire("drawings");
        w.counts = WireCounts {
            drawings: 2,
            ..Default::default()
        };
        let snapshot = Snapshot::from_wire(&w).unwrap();
        assert_eq!(
            snapshot.counts.drawings,
            Progress {
                submitted: 2,
                required: 3
            }
        );
        assert!(!snapshot.counts.drawings.is_complete());
    }

    #[test]
    fn focus_follows_phase() {
        let mut w = wire("guesses");
        w.guess_focus = Some(WireFocus {
            drawing_index: 1,
            drawing_owner: Some(2),
            guesser_id: Some(3),
            ..Default::default()
        });
        w.vote_focus = Some(WireFocus::default());
        let snapshot = Snapshot::from_wire(&w).unwrap();
        let focus = snapshot.focus.unwrap();
        assert_eq!(focus.kind, FocusKind::Guess);
        assert_eq!(focus.drawing_index, 1);
        assert!(focus.targets(3));
        assert!(!focus.targets(1));
    }

    #[test]
    fn negative_focus_index_means_no_focus() {
        let mut w = wire("guesses-votes");
        w.vote_focus = Some(WireFocus {
            drawing_index: -1,
            ..Default::default()
        });
        assert!(Snapshot::from_wire(&w).unwrap().focus.is_none());
    }

    #[test]
    fn reveal_only_in_results() {
        let mut w = wire("results");
        w.reveal = Some(WireReveal {
            stage: "joke".into(),
            drawing_index: 0,
            joke_audio: "/static/audio/joke.mp3".into(),
            ..Default::default()
        });
        let snapshot = Snapshot::from_wire(&w).unwrap();
        let reveal = snapshot.reveal.as_ref().unwrap();
        assert_eq!(reveal.stage, RevealStage::Joke);
        assert_eq!(reveal.narration(), Some("/static/audio/joke.mp3"));

        w.phase = "complete".into();
        assert!(Snapshot::from_wire(&w).unwrap().reveal.is_none());
    }

    #[test]
    fn deadline_parses_rfc3339() {
        let mut w = wire("drawings");
        w.phase_ends_at = "2026-01-01T00:01:30Z".into();
        let snapshot = Snapshot::from_wire(&w).unwrap();
        assert_eq!(snapshot.phase_ends_at.unwrap().unix_timestamp(), 1_767_225_690);

        w.phase_ends_at = "soon".into();
        assert!(Snapshot::from_wire(&w).unwrap().phase_ends_at.is_none());
    }
}
