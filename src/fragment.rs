//! Resolution of HTML fragment updates into snapshots.
//!
//! Some roles receive in-place fragment updates instead of JSON snapshots.
//! The fragments are rendered UI regions, but a few of them carry state the
//! engine needs: `#gameStatus` holds the phase name, `#joinCode` the join code,
//! and the `#displayContent` region exposes `data-*` attributes
//! (`data-phase`, `data-phase-ends-at`, `data-current-round`,
//! `data-reveal-stage`, `data-reveal-drawing-index`, `data-reveal-joke-audio`).
//!
//! [`FragmentResolver::resolve`] merges those values onto the last known
//! snapshot. Fragments addressed to any other region resolve to nothing and
//! are dropped by the caller.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::protocol::{HtmlFragment, WireReveal};
use crate::snapshot::{Phase, Reveal, RevealStage, Snapshot};

const TARGET_STATUS: &str = "#gameStatus";
const TARGET_JOIN_CODE: &str = "#joinCode";
const TARGET_DISPLAY: &str = "#displayContent";

/// Merges recognizable fragments onto a base snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct FragmentResolver;

impl FragmentResolver {
    pub fn new() -> Self {
        Self
    }

    /// Apply `fragments` in order on top of `base`.
    ///
    /// Returns `None` when there is no base snapshot or when none of the
    /// fragments addresses a region carrying state.
    pub fn resolve(&self, base: Option<&Snapshot>, fragments: &[HtmlFragment]) -> Option<Snapshot> {
        let mut merged = base?.clone();
        let mut recognized = false;
        for fragment in fragments {
            recognized |= apply(&mut merged, fragment);
        }
        recognized.then_some(merged)
    }
}

fn apply(snapshot: &mut Snapshot, fragment: &HtmlFragment) -> bool {
    match fragment.target.as_str() {
        TARGET_STATUS => match Phase::parse(&text_content(&fragment.html)) {
            Some(phase) => {
                set_phase(snapshot, phase);
                true
            }
            None => false,
        },
        TARGET_JOIN_CODE => {
            let code = text_content(&fragment.html);
            if code.is_empty() {
                return false;
            }
            snapshot.join_code = code;
            true
        }
        TARGET_DISPLAY => apply_display(snapshot, &fragment.html),
        other => {
            tracing::trace!(target = %other, "fragment carries no engine state");
            false
        }
    }
}

fn apply_display(snapshot: &mut Snapshot, html: &str) -> bool {
    let Some(phase) = attribute(html, "data-phase").and_then(|p| Phase::parse(&p)) else {
        return false;
    };
    set_phase(snapshot, phase);

    snapshot.phase_ends_at = attribute(html, "data-phase-ends-at")
        .and_then(|raw| OffsetDateTime::parse(&raw, &Rfc3339).ok());

    if let Some(round) = attribute(html, "data-current-round").and_then(|r| r.parse().ok()) {
        snapshot.round_number = round;
    }

    let stage = attribute(html, "data-reveal-stage").and_then(|s| RevealStage::parse(&s));
    let index = attribute(html, "data-reveal-drawing-index").and_then(|i| i.parse::<u32>().ok());
    snapshot.reveal = match (phase, stage, index) {
        (Phase::Results, Some(stage), Some(drawing_index)) => Some(Reveal {
            stage,
            drawing_index,
            payload: WireReveal {
                stage: stage.as_str().to_string(),
                drawing_index: i64::from(drawing_index),
                joke_audio: attribute(html, "data-reveal-joke-audio").unwrap_or_default(),
                ..Default::default()
            },
        }),
        _ => None,
    };
    true
}

/// Focus and reveal belong to a phase; drop them when it changes.
fn set_phase(snapshot: &mut Snapshot, phase: Phase) {
    if snapshot.phase != phase {
        snapshot.focus = None;
        snapshot.reveal = None;
    }
    snapshot.phase = phase;
}

/// Extract a double-quoted attribute value from the first tag that has it.
fn attribute(html: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=\"");
    for (at, _) in html.match_indices(&needle) {
        let preceded_by_space = at == 0
            || html
                .get(..at)
                .and_then(|head| head.chars().next_back())
                .is_some_and(char::is_whitespace);
        if !preceded_by_space {
            continue;
        }
        let rest = html.get(at + needle.len()..)?;
        let end = rest.find('"')?;
        return rest.get(..end).map(unescape);
    }
    None
}

/// Strip tags and decode the common entities.
fn text_content(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    unescape(text.trim())
}

fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
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
    use crate::protocol::{Swap, WireSnapshot};

    fn base(phase: &str) -> Snapshot {
        Snapshot::from_wire(&WireSnapshot {
            phase: phase.into(),
            join_code: "OLD1".into(),
            current_round: 1,
            ..Default::default()
        })
        .unwrap()
    }

    fn fragment(target: &str, html: &str) -> HtmlFragment {
        HtmlFragment {
            target: target.into(),
            html: html.into(),
            swap: Swap::Inner,
        }
    }

    #[test]
    fn status_fragment_changes_phase() {
        let resolver = FragmentResolver::new();
        let merged = resolver
            .resolve(Some(&base("lobby")), &[fragment("#gameStatus", " drawings ")])
            .unwrap();
        assert_eq!(merged.phase, Phase::Drawings);
        assert_eq!(merged.join_code, "OLD1");
    }

    #[test]
    fn join_code_is_unescaped() {
        let merged = FragmentResolver::new()
            .resolve(Some(&base("lobby")), &[fragment("#joinCode", "A&amp;B")])
            .unwrap();
        assert_eq!(merged.join_code, "A&B");
    }

    #[test]
    fn ui_only_fragments_do_not_resolve() {
        let resolver = FragmentResolver::new();
        let result = resolver.resolve(
            Some(&base("lobby")),
            &[fragment("#playerList", "<li>Ann</li>"), fragment("#lobbyStatus", "Open")],
        );
        assert!(result.is_none());
    }

    #[test]
    fn no_base_means_nothing_to_merge() {
        assert!(FragmentResolver::new()
            .resolve(None, &[fragment("#gameStatus", "lobby")])
            .is_none());
    }

    #[test]
    fn unknown_phase_text_is_ignored() {
        assert!(FragmentResolver::new()
            .resolve(Some(&base("lobby")), &[fragment("#gameStatus", "loading")])
            .is_none());
    }

    #[test]
    fn display_content_attributes() {
        let html = r#"<section id="displayContent" data-phase="results"
            data-phase-ends-at="2026-01-01T00:00:10Z" data-current-round="2"
            data-reveal-stage="joke" data-reveal-drawing-index="1"
            data-reveal-joke-audio="/static/audio/j1.mp3"></section>"#;
        let merged = FragmentResolver::new()
            .resolve(Some(&base("guesses-votes")), &[HtmlFragment {
                target: "#displayContent".into(),
                html: html.into(),
                swap: Swap::Outer,
            }])
            .unwrap();
        assert_eq!(merged.phase, Phase::Results);
        assert_eq!(merged.round_number, 2);
        assert!(merged.phase_ends_at.is_some());
        let reveal = merged.reveal.unwrap();
        assert_eq!(reveal.stage, RevealStage::Joke);
        assert_eq!(reveal.drawing_index, 1);
        assert_eq!(reveal.narration(), Some("/static/audio/j1.mp3"));
    }

    #[test]
    fn attribute_requires_exact_name() {
        let html = r#"<div xdata-phase="lobby" data-phase-ends-at="x" data-phase="drawings">"#;
        assert_eq!(attribute(html, "data-phase").as_deref(), Some("drawings"));
    }
}
