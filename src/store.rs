//! Snapshot reconciliation.
//!
//! [`SnapshotStore`] holds the latest and previous [`Snapshot`] and derives a
//! [`Transition`] for every delivery. The authority is the only writer, so the
//! incoming snapshot always wins; the store's job is to decide which changes
//! are worth reacting to.
//!
//! Two deliveries of the same state (common while push and poll overlap
//! during failover) yield an empty transition the second time. A snapshot
//! whose round is lower than the last effective one is applied but produces
//! no effects, unless it is back in the lobby (a new game). Effects are
//! always diffed against the last effective snapshot, so a stale delivery
//! followed by a repeat of the fresh state fires nothing twice. Round starts
//! are detected against a high-water mark.

use serde::Serialize;

use crate::snapshot::{Activity, Phase, RevealStage, Snapshot};

/// Phase edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseChange {
    /// `None` for the first snapshot of a session.
    pub from: Option<Phase>,
    pub to: Phase,
}

/// A new reveal stage (or a new drawing) came on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevealChange {
    pub round: u32,
    pub stage: RevealStage,
    pub drawing_index: u32,
    /// Narration asset when the stage is `joke`.
    pub narration: Option<String>,
}

/// Change in the number of seated players.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RosterDelta {
    pub joined: usize,
    pub left: usize,
}

/// What changed between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub phase_change: Option<PhaseChange>,
    /// Round number that just started (forward progress only).
    pub round_started: Option<u32>,
    pub reveal_change: Option<RevealChange>,
    /// Activities whose submitted count increased.
    pub progressed: Vec<Activity>,
    /// Activities whose submitted count just reached the required count.
    pub all_submitted: Vec<Activity>,
    pub roster: RosterDelta,
    /// The incoming snapshot was older than the held one.
    pub regressed: bool,
}

impl Transition {
    /// Returns `true` if the transition carries nothing that triggers effects.
    pub fn is_empty(&self) -> bool {
        self.phase_change.is_none()
            && self.round_started.is_none()
            && self.reveal_change.is_none()
            && self.progressed.is_empty()
            && self.all_submitted.is_empty()
            && self.roster == RosterDelta::default()
    }

    /// Pure diff of two snapshots, without the round high-water rule.
    pub fn between(previous: Option<&Snapshot>, current: &Snapshot) -> Self {
        let Some(previous) = previous else {
            return Self {
                phase_change: Some(PhaseChange {
                    from: None,
                    to: current.phase,
                }),
                ..Self::default()
            };
        };

        let mut transition = Self::default();
        if previous.phase != current.phase {
            transition.phase_change = Some(PhaseChange {
                from: Some(previous.phase),
                to: current.phase,
            });
        }

        if let Some(reveal) = &current.reveal {
            let same_reveal = previous.reveal.as_ref().is_some_and(|prior| {
                prior.stage == reveal.stage
                    && prior.drawing_index == reveal.drawing_index
                    && previous.round_number == current.round_number
            });
            if !same_reveal {
                transition.reveal_change = Some(RevealChange {
                    round: current.round_number,
                    stage: reveal.stage,
                    drawing_index: reveal.drawing_index,
                    narration: reveal.narration().map(str::to_string),
                });
            }
        }

        if previous.round_number == current.round_number {
            for activity in Activity::ALL {
                let before = previous.counts.get(activity);
                let after = current.counts.get(activity);
                if after.submitted > before.submitted {
                    transition.progressed.push(activity);
                }
                if after.is_complete() && !before.is_complete() {
                    transition.all_submitted.push(activity);
                }
            }
        }

        let (before, after) = (previous.players.len(), current.players.len());
        transition.roster = RosterDelta {
            joined: after.saturating_sub(before),
            left: before.saturating_sub(after),
        };
        transition
    }
}

/// Result of [`SnapshotStore::reconcile`].
#[derive(Debug)]
pub struct Reconciled<'a> {
    /// The snapshot now held as the source of truth.
    pub snapshot: &'a Snapshot,
    pub transition: Transition,
    /// `false` when the delivery was field-identical to the held snapshot.
    pub changed: bool,
}

/// Holds the latest reconciled snapshot and the one before it.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: Option<Snapshot>,
    previous: Option<Snapshot>,
    /// Last snapshot that was not stale; effects are diffed against it.
    baseline: Option<Snapshot>,
    highest_round: Option<u32>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `incoming` as the new source of truth and describe the change.
    pub fn reconcile(&mut self, incoming: Snapshot) -> Reconciled<'_> {
        let changed = self.current.as_ref() != Some(&incoming);
        let transition = if !changed {
            Transition::default()
        } else {
            self.derive(&incoming)
        };
        if changed && !transition.regressed {
            self.baseline = Some(incoming.clone());
        }

        self.previous = self.current.take();
        let snapshot = &*self.current.insert(incoming);
        Reconciled {
            snapshot,
            transition,
            changed,
        }
    }

    fn derive(&mut self, incoming: &Snapshot) -> Transition {
        let new_game = incoming.phase == Phase::Lobby;
        if let Some(held) = &self.baseline {
            if incoming.round_number < held.round_number && !new_game {
                tracing::debug!(
                    held = held.round_number,
                    incoming = incoming.round_number,
                    "stale snapshot applied without effects"
                );
                return Transition {
                    regressed: true,
                    ..Transition::default()
                };
            }
        }

        let mut transition = Transition::between(self.baseline.as_ref(), incoming);
        match self.highest_round {
            Some(_) if new_game => self.highest_round = Some(incoming.round_number),
            Some(highest) if incoming.round_number > highest => {
                transition.round_started = Some(incoming.round_number);
                self.highest_round = Some(incoming.round_number);
            }
            Some(_) => {}
            None => self.highest_round = Some(incoming.round_number),
        }
        transition
    }

    /// The snapshot currently held.
    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    /// The snapshot held before the last reconcile.
    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    /// Forget everything (navigation away from the game).
    pub fn clear(&mut self) {
        *self = Self::default();
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
    use crate::protocol::{WireCounts, WireReveal, WireSnapshot};

    fn snap(phase: &str, round: u32, players: usize) -> Snapshot {
        let names = (0..players).map(|i| format!("P{i}")).collect();
        let ids = (1..=players as i64).collect();
        Snapshot::from_wire(&WireSnapshot {
            phase: phase.into(),
            current_round: round,
            players: names,
            player_ids: ids,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn first_snapshot_reports_entry_phase() {
        let mut store = SnapshotStore::new();
        let out = store.reconcile(snap("lobby", 0, 2));
        assert!(out.changed);
        assert_eq!(
            out.transition.phase_change,
            Some(PhaseChange {
                from: None,
                to: Phase::Lobby
            })
        );
        assert_eq!(out.transition.round_started, None);
    }

    #[test]
    fn duplicate_delivery_is_empty() {
        let mut store = SnapshotStore::new();
        store.reconcile(snap("drawings", 1, 3));
        let out = store.reconcile(snap("drawings", 1, 3));
        assert!(!out.changed);
        assert!(out.transition.is_empty());
        assert!(store.previous().is_some());
    }

    #[test]
    fn roster_growth_and_shrink() {
        let mut store = SnapshotStore::new();
        store.reconcile(snap("lobby", 0, 2));
        let out = store.reconcile(snap("lobby", 0, 3));
        assert_eq!(out.transition.roster, RosterDelta { joined: 1, left: 0 });
        let out = store.reconcile(snap("lobby", 0, 1));
        assert_eq!(out.transition.roster, RosterDelta { joined: 0, left: 2 });
    }

    #[test]
    fn round_regression_is_applied_without_effects() {
        let mut store = SnapshotStore::new();
        let mut started = Vec::new();
        for round in [3, 3, 2, 4] {
            let out = store.reconcile(snap("drawings", round, 3));
            if let Some(r) = out.transition.round_started {
                started.push(r);
            }
            if round == 2 {
                assert!(out.transition.regressed);
                assert!(out.transition.is_empty());
                assert_eq!(out.snapshot.round_number, 2);
            }
        }
        assert_eq!(started, vec![4]);
    }

    #[test]
    fn stale_round_then_same_round_does_not_restart() {
        let mut store = SnapshotStore::new();
        store.reconcile(snap("drawings", 2, 3));
        store.reconcile(snap("drawings", 3, 3));
        store.reconcile(snap("results", 2, 3));
        let out = store.reconcile(snap("drawings", 3, 3));
        assert!(out.changed);
        assert_eq!(out.transition, Transition::default());
    }

    #[test]
    fn repeat_after_stale_delivery_is_diffed_against_fresh_state() {
        let mut store = SnapshotStore::new();
        store.reconcile(snap("results", 2, 3));
        store.reconcile(snap("drawings", 3, 3));

        let stale = store.reconcile(snap("results", 2, 2));
        assert!(stale.transition.regressed);
        assert_eq!(stale.snapshot.phase, Phase::Results);

        // Real progress after the stale delivery is measured from round 3.
        let out = store.reconcile(snap("drawings", 3, 4));
        assert_eq!(out.transition.phase_change, None);
        assert_eq!(out.transition.roster, RosterDelta { joined: 1, left: 0 });
        assert_eq!(store.previous().unwrap().phase, Phase::Results);
    }

    #[test]
    fn lobby_starts_a_new_game() {
        let mut store = SnapshotStore::new();
        store.reconcile(snap("complete", 3, 3));
        let out = store.reconcile(snap("lobby", 0, 3));
        assert!(!out.transition.regressed);
        assert!(out.transition.phase_change.is_some());
        let out = store.reconcile(snap("drawings", 1, 3));
        assert_eq!(out.transition.round_started, Some(1));
    }

    #[test]
    fn all_submitted_fires_on_the_edge_only() {
        let with_votes = |submitted: u32| {
            let mut w = WireSnapshot {
                phase: "guesses-votes".into(),
                current_round: 1,
                vote_required_count: 3,
                vote_submitted_count: submitted,
                ..Default::default()
            };
            w.counts = WireCounts {
                votes: submitted,
                ..Default::default()
            };
            Snapshot::from_wire(&w).unwrap()
        };
        let mut store = SnapshotStore::new();
        store.reconcile(with_votes(2));
        let out = store.reconcile(with_votes(3));
        assert_eq!(out.transition.all_submitted, vec![Activity::Votes]);
        assert_eq!(out.transition.progressed, vec![Activity::Votes]);
        let out = store.reconcile(with_votes(3));
        assert!(out.transition.all_submitted.is_empty());
    }

    #[test]
    fn reveal_stage_change_carries_narration() {
        let reveal = |stage: &str, audio: &str| {
            Snapshot::from_wire(&WireSnapshot {
                phase: "results".into(),
                current_round: 1,
                reveal: Some(WireReveal {
                    stage: stage.into(),
                    drawing_index: 0,
                    joke_audio: audio.into(),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap()
        };
        let mut store = SnapshotStore::new();
        store.reconcile(reveal("votes", ""));
        let out = store.reconcile(reveal("joke", "/a/x.mp3"));
        let change = out.transition.reveal_change.unwrap();
        assert_eq!(change.stage, RevealStage::Joke);
        assert_eq!(change.narration.as_deref(), Some("/a/x.mp3"));
    }

    #[test]
    fn clear_forgets_state() {
        let mut store = SnapshotStore::new();
        store.reconcile(snap("lobby", 0, 1));
        store.clear();
        assert!(store.current().is_none());
        assert!(store.previous().is_none());
    }
}
