//! Snapshot to view-model projection.
//!
//! [`ViewProjector::project`] is a pure function of the snapshot, the viewer,
//! the viewer's [`SubmissionMemory`] and the current time. It produces the
//! stage block shared by every role plus a role-specific panel. No state is
//! kept between calls; the scoreboard rule in particular is computed from the
//! snapshot each time.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::countdown::{format_remaining, remaining_seconds};
use crate::memory::SubmissionMemory;
use crate::protocol::{GameSummary, HomeUpdate, PlayerId, WireReveal};
use crate::snapshot::{Focus, FocusKind, Phase, RevealStage, Score, Snapshot, VoteOption};

const FALLBACK_NAME: &str = "Player";

// ── Viewer ──────────────────────────────────────────────────────────

/// Which screen a client drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Home screen listing open games.
    Lobby,
    /// Shared room screen.
    Display,
    Player,
    Audience,
    Host,
}

impl Role {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "lobby" | "home" => Some(Self::Lobby),
            "display" => Some(Self::Display),
            "player" => Some(Self::Player),
            "audience" => Some(Self::Audience),
            "host" => Some(Self::Host),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Display => "display",
            Self::Player => "player",
            Self::Audience => "audience",
            Self::Host => "host",
        }
    }

    /// Players and audience members submit actions of their own.
    pub fn is_participant(self) -> bool {
        matches!(self, Self::Player | Self::Audience)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is looking at the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub role: Role,
    /// Player or audience id once joined.
    pub id: Option<PlayerId>,
}

impl Viewer {
    pub fn new(role: Role, id: Option<PlayerId>) -> Self {
        Self { role, id }
    }
}

// ── View model ──────────────────────────────────────────────────────

/// Everything a role screen renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub role: Role,
    pub phase: Phase,
    pub join_code: String,
    /// `Round N of M`, or `--`.
    pub round_label: String,
    /// `MM:SS`, or `--:--`.
    pub timer: String,
    pub stage: StageView,
    pub players: Vec<PlayerRow>,
    /// Standings shown between rounds.
    pub scoreboard: Option<ScoreboardView>,
    /// Standings shown once the game is complete.
    pub final_scores: Option<Vec<String>>,
    pub panel: RolePanel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageView {
    pub title: String,
    pub status: String,
    pub image: Option<String>,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRow {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
}

impl PlayerRow {
    /// Name with a trailing `*` for the host.
    pub fn label(&self) -> String {
        if self.is_host {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreboardView {
    pub title: String,
    pub status: String,
    pub entries: Vec<String>,
}

/// Role-specific part of the screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RolePanel {
    /// Display and lobby screens have no controls.
    None,
    Player(PlayerPanel),
    Audience(AudiencePanel),
    Host(HostPanel),
}

/// Guess or vote form for the current focus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionForm {
    pub kind: FocusKind,
    pub drawing_index: u32,
    pub image: Option<String>,
    pub options: Vec<VoteOption>,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerPanel {
    pub is_host: bool,
    /// The drawing canvas is open.
    pub can_draw: bool,
    pub status: String,
    pub action: Option<ActionForm>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudiencePanel {
    pub joined: bool,
    pub status: String,
    pub action: Option<ActionForm>,
}

/// Visibility and availability of one control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Control {
    pub visible: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KickControl {
    pub player_id: PlayerId,
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostPanel {
    pub start: Control,
    pub advance: Control,
    pub end: Control,
    pub settings_enabled: bool,
    pub kick: Vec<KickControl>,
    /// `Players: n/max. Open|Locked lobby.`
    pub lobby_status: String,
    pub host_status: String,
}

/// One joinable game on the home screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameCard {
    pub id: String,
    pub join_code: String,
    pub phase: String,
    pub players: u32,
    pub joinable: bool,
}

// ── Projection ──────────────────────────────────────────────────────

/// Maps snapshots to view models.
#[derive(Debug, Default, Clone, Copy)]
pub struct ViewProjector;

impl ViewProjector {
    pub fn new() -> Self {
        Self
    }

    /// Project `snapshot` for `viewer` at time `now`.
    pub fn project(
        &self,
        snapshot: &Snapshot,
        viewer: &Viewer,
        memory: &SubmissionMemory,
        now: OffsetDateTime,
    ) -> ViewModel {
        let players = snapshot
            .players
            .iter()
            .map(|p| PlayerRow {
                id: p.id,
                name: p.display_name.clone(),
                is_host: p.is_host,
            })
            .collect();

        let panel = match viewer.role {
            Role::Lobby | Role::Display => RolePanel::None,
            Role::Player => RolePanel::Player(player_panel(snapshot, viewer, memory)),
            Role::Audience => RolePanel::Audience(audience_panel(snapshot, viewer, memory)),
            Role::Host => RolePanel::Host(host_panel(snapshot)),
        };

        ViewModel {
            role: viewer.role,
            phase: snapshot.phase,
            join_code: if snapshot.join_code.is_empty() {
                "Unavailable".to_string()
            } else {
                snapshot.join_code.clone()
            },
            round_label: round_label(snapshot),
            timer: format_remaining(snapshot.phase_ends_at.map(|d| remaining_seconds(d, now))),
            stage: stage(snapshot),
            players,
            scoreboard: scoreboard(snapshot),
            final_scores: (snapshot.phase == Phase::Complete).then(|| score_lines(&snapshot.scores)),
            panel,
        }
    }

    /// Project the home roster.
    pub fn project_home(&self, update: &HomeUpdate) -> Vec<GameCard> {
        update.games.iter().map(game_card).collect()
    }
}

fn game_card(game: &GameSummary) -> GameCard {
    GameCard {
        id: game.id.clone(),
        join_code: game.join_code.clone(),
        phase: game.phase.clone(),
        players: game.players,
        joinable: Phase::parse(&game.phase) == Some(Phase::Lobby),
    }
}

fn round_label(snapshot: &Snapshot) -> String {
    if snapshot.round_number > 0 && snapshot.total_rounds > 0 {
        format!("Round {} of {}", snapshot.round_number, snapshot.total_rounds)
    } else {
        "--".to_string()
    }
}

/// Shown when a new round has started and nobody has drawn yet.
fn scoreboard(snapshot: &Snapshot) -> Option<ScoreboardView> {
    let between_rounds = snapshot.phase == Phase::Drawings
        && snapshot.round_number > 1
        && snapshot.counts.drawings.submitted == 0;
    between_rounds.then(|| ScoreboardView {
        title: "Scoreboard".to_string(),
        status: "Current standings after the last round.".to_string(),
        entries: score_lines(&snapshot.scores),
    })
}

fn score_lines(scores: &[Score]) -> Vec<String> {
    scores
        .iter()
        .map(|s| format!("{}: {}", display_name(&s.player_name), s.score))
        .collect()
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        FALLBACK_NAME
    } else {
        name
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

// ── Stage ───────────────────────────────────────────────────────────

fn stage(snapshot: &Snapshot) -> StageView {
    let simple = |title: &str, status: String| StageView {
        title: title.to_string(),
        status,
        ..StageView::default()
    };
    match snapshot.phase {
        Phase::Lobby => simple(
            "Waiting for players",
            "Share the join code so everyone can join.".to_string(),
        ),
        Phase::Drawings => simple("Drawing round", "Players are drawing their prompts.".to_string()),
        Phase::Guesses => focus_stage(snapshot, FocusKind::Guess),
        Phase::GuessesVotes => focus_stage(snapshot, FocusKind::Vote),
        Phase::Results => results_stage(snapshot),
        Phase::Complete => simple("Game complete", "Thanks for playing!".to_string()),
        Phase::Paused => {
            let status = match snapshot.paused_phase {
                Some(during) => format!(
                    "Game paused during {during}. Players should rejoin and claim their name."
                ),
                None => "Game is paused. Players should rejoin and claim their name.".to_string(),
            };
            simple("Game paused", status)
        }
    }
}

fn focus_stage(snapshot: &Snapshot, kind: FocusKind) -> StageView {
    let (title, progress, noun) = match kind {
        FocusKind::Guess => ("Guessing prompts", snapshot.counts.guesses, "guesses"),
        FocusKind::Vote => ("Vote for the real prompt", snapshot.counts.votes, "votes"),
    };

    let Some(focus) = snapshot.focus.as_ref().filter(|f| f.kind == kind) else {
        let status = if progress.required > 0 {
            format!(
                "All {noun} submitted ({}/{}).",
                progress.submitted, progress.required
            )
        } else {
            match kind {
                FocusKind::Guess => "Waiting for votes.".to_string(),
                FocusKind::Vote => "Waiting for reveal.".to_string(),
            }
        };
        return StageView {
            title: title.to_string(),
            status,
            ..StageView::default()
        };
    };

    let owner = focus.owner.and_then(|id| snapshot.player_name(id));
    let mut status = match (kind, owner) {
        (FocusKind::Guess, Some(name)) => format!("Collecting guesses for {name}'s drawing."),
        (FocusKind::Guess, None) => "Collecting guesses.".to_string(),
        (FocusKind::Vote, Some(name)) => format!("Vote on the real prompt for {name}'s drawing."),
        (FocusKind::Vote, None) => "Voting on prompts.".to_string(),
    };
    if progress.required > 0 {
        status.push_str(&format!(
            " ({}/{} submitted)",
            progress.submitted, progress.required
        ));
    }
    if !focus.pending.is_empty() {
        status.push_str(&format!(" {} left on this drawing.", focus.pending.len()));
    }
    if let Some(next) = focus.actor.and_then(|id| snapshot.player_name(id)) {
        status.push_str(&format!(" Next up: {next}."));
    }

    StageView {
        title: title.to_string(),
        status,
        image: non_empty(&focus.image),
        options: focus.options.iter().map(|o| o.text.clone()).collect(),
    }
}

fn results_stage(snapshot: &Snapshot) -> StageView {
    let Some(reveal) = snapshot.reveal.as_ref() else {
        return StageView {
            title: "Drawing results".to_string(),
            status: "Reviewing answers and votes.".to_string(),
            ..StageView::default()
        };
    };
    let status = match reveal.stage {
        RevealStage::Guesses => "Revealing guesses.",
        RevealStage::Votes => "Revealing votes.",
        RevealStage::Joke => "Narrator is reading the joke.",
    };
    StageView {
        title: "Drawing results".to_string(),
        status: status.to_string(),
        image: non_empty(&reveal.payload.drawing_image),
        options: reveal_lines(reveal.stage, &reveal.payload),
    }
}

/// Text lines describing a reveal.
pub fn reveal_lines(stage: RevealStage, reveal: &WireReveal) -> Vec<String> {
    let mut lines = Vec::new();
    match stage {
        RevealStage::Guesses => {
            for guess in &reveal.guesses {
                lines.push(format!("{}: {}", display_name(&guess.player_name), guess.text));
            }
        }
        RevealStage::Votes | RevealStage::Joke => {
            if reveal.options.is_empty() {
                if !reveal.prompt.is_empty() {
                    lines.push(format!("Prompt: {}", reveal.prompt));
                }
                for vote in &reveal.votes {
                    lines.push(format!("{}: {}", display_name(&vote.player_name), vote.text));
                }
                for vote in &reveal.audience_votes {
                    lines.push(format!("Audience: {} ({})", vote.text, vote.count));
                }
            } else {
                for option in &reveal.options {
                    if option.kind == "prompt" {
                        lines.push(format!("Prompt: {}", option.text));
                    } else {
                        lines.push(format!(
                            "{} wrote: {}",
                            display_name(&option.owner_name),
                            option.text
                        ));
                    }
                    if !option.player_votes.is_empty() {
                        let voters: Vec<&str> = option
                            .player_votes
                            .iter()
                            .map(|v| display_name(&v.player_name))
                            .collect();
                        lines.push(format!("Picked by: {}", voters.join(", ")));
                    }
                    if option.audience_count > 0 {
                        lines.push(format!("Audience picks: {}", option.audience_count));
                    }
                }
            }
            if stage == RevealStage::Joke && !reveal.joke.is_empty() {
                lines.push(format!("Joke: {}", reveal.joke));
            }
        }
    }
    if !reveal.score_deltas.is_empty() {
        lines.push("Score changes:".to_string());
        for entry in &reveal.score_deltas {
            lines.push(format!("{}: +{}", display_name(&entry.player_name), entry.delta));
        }
    }
    lines
}

// ── Role panels ─────────────────────────────────────────────────────

/// Build the form for `focus`; enabled only for a targeted viewer who does
/// not own the drawing and has not acted on it yet.
fn action_form(
    snapshot: &Snapshot,
    focus: &Focus,
    viewer_id: PlayerId,
    targeted: bool,
    memory: &SubmissionMemory,
) -> ActionForm {
    let own_drawing = focus.owner == Some(viewer_id);
    let submitted = memory.has_submitted(snapshot.round_number, focus.drawing_index);
    ActionForm {
        kind: focus.kind,
        drawing_index: focus.drawing_index,
        image: non_empty(&focus.image),
        options: focus.options.clone(),
        enabled: targeted && !own_drawing && !submitted,
    }
}

fn player_panel(snapshot: &Snapshot, viewer: &Viewer, memory: &SubmissionMemory) -> PlayerPanel {
    let is_host = viewer.id.is_some() && viewer.id == snapshot.host_id;
    let can_draw = snapshot.phase == Phase::Drawings;

    let (status, action) = match (snapshot.focus.as_ref(), viewer.id) {
        (Some(focus), Some(id)) => {
            let form = action_form(snapshot, focus, id, focus.targets(id), memory);
            let status = if focus.owner == Some(id) {
                match focus.kind {
                    FocusKind::Guess => "This is your drawing, no guessing needed.",
                    FocusKind::Vote => "This is your drawing, no voting needed.",
                }
            } else if memory.has_submitted(snapshot.round_number, focus.drawing_index) {
                "Submitted. Waiting for the others."
            } else if form.enabled {
                match focus.kind {
                    FocusKind::Guess => "Your turn to guess.",
                    FocusKind::Vote => "Your turn to vote.",
                }
            } else {
                match focus.kind {
                    FocusKind::Guess => "Waiting for the next guess.",
                    FocusKind::Vote => "Waiting for the next vote.",
                }
            };
            (status.to_string(), Some(form))
        }
        (_, None) => ("Join the game to play.".to_string(), None),
        (None, Some(_)) => {
            let status = match snapshot.phase {
                Phase::Lobby if is_host => {
                    "You're the host. Start the game when at least two players have joined."
                }
                Phase::Lobby => "Waiting for the host to begin.",
                Phase::Drawings => "Draw your prompt.",
                Phase::Guesses | Phase::GuessesVotes => "Waiting for the next drawing.",
                Phase::Results => "Results are on the big screen.",
                Phase::Complete => "Game over. Thanks for playing!",
                Phase::Paused => "Game paused. Rejoin and claim your name.",
            };
            (status.to_string(), None)
        }
    };

    PlayerPanel {
        is_host,
        can_draw,
        status,
        action,
    }
}

fn audience_panel(snapshot: &Snapshot, viewer: &Viewer, memory: &SubmissionMemory) -> AudiencePanel {
    let Some(id) = viewer.id else {
        return AudiencePanel {
            joined: false,
            status: "Join the audience to vote.".to_string(),
            action: None,
        };
    };
    if snapshot.phase != Phase::GuessesVotes {
        return AudiencePanel {
            joined: true,
            status: "Waiting for the voting phase.".to_string(),
            action: None,
        };
    }
    let Some(focus) = snapshot.focus.as_ref() else {
        return AudiencePanel {
            joined: true,
            status: "Waiting for the next drawing.".to_string(),
            action: None,
        };
    };

    // The audience votes on every drawing.
    let form = action_form(snapshot, focus, id, true, memory);
    let status = if memory.has_submitted(snapshot.round_number, focus.drawing_index) {
        "Vote submitted for this drawing. Waiting for the next one."
    } else if focus.owner == Some(id) {
        "This is your drawing, no voting needed."
    } else {
        "Pick the prompt you think is real."
    };
    AudiencePanel {
        joined: true,
        status: status.to_string(),
        action: Some(form),
    }
}

fn host_panel(snapshot: &Snapshot) -> HostPanel {
    let phase = snapshot.phase;
    let in_lobby = phase == Phase::Lobby;
    let seated = snapshot.players.len();
    let can_advance = !in_lobby && phase != Phase::Complete;

    let max = if snapshot.max_players > 0 {
        snapshot.max_players.to_string()
    } else {
        "∞".to_string()
    };
    let lock = if snapshot.lobby_locked { "Locked" } else { "Open" };

    let host_status = if !in_lobby {
        "Use Advance to move to the next stage when everyone is ready."
    } else if seated < 2 {
        "Waiting for at least two players to join."
    } else {
        "Ready to start when everyone is here."
    };

    HostPanel {
        start: Control {
            visible: in_lobby,
            enabled: in_lobby && seated >= 2,
        },
        advance: Control {
            visible: can_advance,
            enabled: can_advance,
        },
        end: Control {
            visible: phase != Phase::Complete,
            enabled: phase != Phase::Complete,
        },
        settings_enabled: in_lobby && snapshot.host_id.is_some(),
        kick: snapshot
            .players
            .iter()
            .map(|p| KickControl {
                player_id: p.id,
                label: if p.is_host {
                    format!("{}*", p.display_name)
                } else {
                    p.display_name.clone()
                },
                enabled: in_lobby && !p.is_host,
            })
            .collect(),
        lobby_status: format!("Players: {seated}/{max}. {lock} lobby."),
        host_status: host_status.to_string(),
    }
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
    use crate::protocol::{
        WireAudienceVote, WireChoice, WireCounts, WireEntry, WireFocus, WireScore,
        WireScoreDelta, WireSnapshot,
    };

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_767_225_600).unwrap()
    }

    fn wire(phase: &str) -> WireSnapshot {
        WireSnapshot {
            phase: phase.into(),
            join_code: "ABCD".into(),
            players: vec!["Ann".into(), "Bo".into(), "Cy".into()],
            player_ids: vec![1, 2, 3],
            host_id: 1,
            current_round: 1,
            total_rounds: 3,
            ..Default::default()
        }
    }

    fn project(w: &WireSnapshot, viewer: Viewer, memory: &SubmissionMemory) -> ViewModel {
        let snapshot = Snapshot::from_wire(w).unwrap();
        ViewProjector::new().project(&snapshot, &viewer, memory, now())
    }

    fn display(w: &WireSnapshot) -> ViewModel {
        project(w, Viewer::new(Role::Display, None), &SubmissionMemory::new())
    }

    #[test]
    fn lobby_stage_and_header() {
        let view = display(&wire("lobby"));
        assert_eq!(view.stage.title, "Waiting for players");
        assert_eq!(view.round_label, "Round 1 of 3");
        assert_eq!(view.timer, "--:--");
        assert_eq!(view.players.len(), 3);
        assert_eq!(view.players[0].label(), "Ann*");
        assert!(view.scoreboard.is_none());
        assert_eq!(view.panel, RolePanel::None);
    }

    #[test]
    fn timer_counts_down_to_deadline() {
        let mut w = wire("drawings");
        w.phase_ends_at = "2026-01-01T00:01:05Z".into();
        assert_eq!(display(&w).timer, "01:05");
    }

    #[test]
    fn guess_focus_status_suffixes() {
        let mut w = wire("guesses");
        w.guess_required_count = 4;
        w.guess_submitted_count = 1;
        w.guess_focus = Some(WireFocus {
            drawing_index: 0,
            drawing_owner: Some(2),
            drawing_image: "/img/0.png".into(),
            guesser_id: Some(3),
            pending_player_ids: vec![1, 3],
            ..Default::default()
        });
        let view = display(&w);
        assert_eq!(view.stage.title, "Guessing prompts");
        assert_eq!(
            view.stage.status,
            "Collecting guesses for Bo's drawing. (1/4 submitted) 2 left on this drawing. Next up: Cy."
        );
        assert_eq!(view.stage.image.as_deref(), Some("/img/0.png"));
    }

    #[test]
    fn votes_without_focus_report_completion() {
        let mut w = wire("guesses-votes");
        w.vote_required_count = 3;
        w.vote_submitted_count = 3;
        let view = display(&w);
        assert_eq!(view.stage.status, "All votes submitted (3/3).");

        let view = display(&wire("guesses-votes"));
        assert_eq!(view.stage.status, "Waiting for reveal.");
    }

    #[test]
    fn reveal_lines_for_options_and_joke() {
        let reveal = WireReveal {
            options: vec![
                WireChoice {
                    text: "a cat".into(),
                    kind: "prompt".into(),
                    player_votes: vec![WireEntry {
                        player_name: "Bo".into(),
                        ..Default::default()
                    }],
                    audience_count: 2,
                    ..Default::default()
                },
                WireChoice {
                    text: "a dog".into(),
                    kind: "guess".into(),
                    owner_name: "Cy".into(),
                    ..Default::default()
                },
            ],
            joke: "Purrfect.".into(),
            score_deltas: vec![WireScoreDelta {
                player_name: "Bo".into(),
                delta: 100,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            reveal_lines(RevealStage::Joke, &reveal),
            vec![
                "Prompt: a cat",
                "Picked by: Bo",
                "Audience picks: 2",
                "Cy wrote: a dog",
                "Joke: Purrfect.",
                "Score changes:",
                "Bo: +100",
            ]
        );
    }

    #[test]
    fn reveal_lines_without_options() {
        let reveal = WireReveal {
            prompt: "a cat".into(),
            votes: vec![WireEntry {
                player_name: String::new(),
                text: "a dog".into(),
                ..Default::default()
            }],
            audience_votes: vec![WireAudienceVote {
                text: "a cat".into(),
                count: 4,
            }],
            ..Default::default()
        };
        assert_eq!(
            reveal_lines(RevealStage::Votes, &reveal),
            vec!["Prompt: a cat", "Player: a dog", "Audience: a cat (4)"]
        );
    }

    #[test]
    fn scoreboard_between_rounds_only() {
        let mut w = wire("drawings");
        w.current_round = 2;
        w.scores = vec![WireScore {
            player_id: 1,
            player_name: "Ann".into(),
            score: 300,
        }];
        let board = display(&w).scoreboard.unwrap();
        assert_eq!(board.entries, vec!["Ann: 300"]);

        w.counts = WireCounts {
            drawings: 1,
            ..Default::default()
        };
        assert!(display(&w).scoreboard.is_none());

        let mut first = wire("drawings");
        first.current_round = 1;
        assert!(display(&first).scoreboard.is_none());
    }

    #[test]
    fn final_scores_on_complete() {
        let mut w = wire("complete");
        w.scores = vec![WireScore {
            player_id: 2,
            player_name: "Bo".into(),
            score: 900,
        }];
        let view = display(&w);
        assert_eq!(view.stage.status, "Thanks for playing!");
        assert_eq!(view.final_scores, Some(vec!["Bo: 900".to_string()]));
    }

    #[test]
    fn paused_names_the_interrupted_phase() {
        let mut w = wire("paused");
        w.paused_phase = "drawings".into();
        let view = display(&w);
        assert_eq!(view.stage.title, "Game paused");
        assert_eq!(
            view.stage.status,
            "Game paused during drawings. Players should rejoin and claim their name."
        );
    }

    fn vote_focus(owner: i64) -> WireSnapshot {
        let mut w = wire("guesses-votes");
        w.vote_focus = Some(WireFocus {
            drawing_index: 1,
            drawing_owner: Some(owner),
            pending_player_ids: vec![1, 2, 3],
            options: vec![crate::protocol::WireOption::Text("a cat".into())],
            ..Default::default()
        });
        w
    }

    #[test]
    fn self_judgement_disables_the_form() {
        let view = project(
            &vote_focus(2),
            Viewer::new(Role::Player, Some(2)),
            &SubmissionMemory::new(),
        );
        let RolePanel::Player(panel) = view.panel else {
            panic!("expected player panel");
        };
        assert!(!panel.action.unwrap().enabled);
        assert_eq!(panel.status, "This is your drawing, no voting needed.");
    }

    #[test]
    fn targeted_player_can_vote_until_submitted() {
        let viewer = Viewer::new(Role::Player, Some(3));
        let mut memory = SubmissionMemory::new();
        let view = project(&vote_focus(2), viewer, &memory);
        let RolePanel::Player(panel) = view.panel else {
            panic!("expected player panel");
        };
        assert!(panel.action.unwrap().enabled);

        memory.mark(1, 1);
        let view = project(&vote_focus(2), viewer, &memory);
        let RolePanel::Player(panel) = view.panel else {
            panic!("expected player panel");
        };
        assert!(!panel.action.unwrap().enabled);
    }

    #[test]
    fn audience_panel_follows_memory() {
        let viewer = Viewer::new(Role::Audience, Some(40));
        let mut memory = SubmissionMemory::new();
        let view = project(&vote_focus(2), viewer, &memory);
        let RolePanel::Audience(panel) = view.panel else {
            panic!("expected audience panel");
        };
        assert_eq!(panel.status, "Pick the prompt you think is real.");
        assert!(panel.action.unwrap().enabled);

        memory.mark(1, 1);
        let view = project(&vote_focus(2), viewer, &memory);
        let RolePanel::Audience(panel) = view.panel else {
            panic!("expected audience panel");
        };
        assert!(!panel.action.unwrap().enabled);

        let view = project(&wire("drawings"), viewer, &memory);
        let RolePanel::Audience(panel) = view.panel else {
            panic!("expected audience panel");
        };
        assert_eq!(panel.status, "Waiting for the voting phase.");
    }

    #[test]
    fn host_controls_follow_phase() {
        let mut w = wire("lobby");
        w.max_players = 0;
        let view = project(&w, Viewer::new(Role::Host, Some(1)), &SubmissionMemory::new());
        let RolePanel::Host(panel) = view.panel else {
            panic!("expected host panel");
        };
        assert!(panel.start.visible && panel.start.enabled);
        assert!(!panel.advance.visible);
        assert!(panel.end.visible);
        assert!(!panel.kick[0].enabled);
        assert!(panel.kick[1].enabled);
        assert_eq!(panel.lobby_status, "Players: 3/∞. Open lobby.");

        let mut w = wire("results");
        w.max_players = 8;
        w.lobby_locked = true;
        let view = project(&w, Viewer::new(Role::Host, Some(1)), &SubmissionMemory::new());
        let RolePanel::Host(panel) = view.panel else {
            panic!("expected host panel");
        };
        assert!(!panel.start.visible);
        assert!(panel.advance.enabled);
        assert!(panel.kick.iter().all(|k| !k.enabled));
        assert_eq!(panel.lobby_status, "Players: 3/8. Locked lobby.");
    }

    #[test]
    fn start_needs_two_players() {
        let mut w = wire("lobby");
        w.players.truncate(1);
        w.player_ids.truncate(1);
        let view = project(&w, Viewer::new(Role::Host, Some(1)), &SubmissionMemory::new());
        let RolePanel::Host(panel) = view.panel else {
            panic!("expected host panel");
        };
        assert!(panel.start.visible);
        assert!(!panel.start.enabled);
        assert_eq!(panel.host_status, "Waiting for at least two players to join.");
    }

    #[test]
    fn home_roster_marks_lobbies_joinable() {
        let update = HomeUpdate {
            games: vec![
                GameSummary {
                    id: "g1".into(),
                    join_code: "QWER".into(),
                    phase: "lobby".into(),
                    players: 2,
                },
                GameSummary {
                    id: "g2".into(),
                    join_code: "ZXCV".into(),
                    phase: "drawings".into(),
                    players: 4,
                },
            ],
        };
        let cards = ViewProjector::new().project_home(&update);
        assert!(cards[0].joinable);
        assert!(!cards[1].joinable);
    }

    #[test]
    fn role_names_parse() {
        assert_eq!(Role::parse("Audience"), Some(Role::Audience));
        assert_eq!(Role::parse("home"), Some(Role::Lobby));
        assert_eq!(Role::parse("referee"), None);
    }
}
