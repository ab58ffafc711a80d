//! Local countdown derived from the phase deadline.
//!
//! The authority only sends the absolute deadline; the client re-derives the
//! remaining time once per tick. [`Countdown::tick`] also reports the moment
//! the countdown reaches zero, at most once per `(phase, round)`.

use std::collections::HashSet;

use time::OffsetDateTime;

use crate::snapshot::{Phase, Snapshot};

/// Placeholder shown when there is no deadline.
pub const NO_DEADLINE: &str = "--:--";

/// Whole seconds left until `deadline`, rounded and clamped at zero.
pub fn remaining_seconds(deadline: OffsetDateTime, now: OffsetDateTime) -> u64 {
    let left = (deadline - now).as_seconds_f64().round();
    if left <= 0.0 {
        0
    } else {
        // Float-to-int `as` saturates; `left` is finite and positive here.
        left as u64
    }
}

/// `MM:SS`, or `--:--` without a deadline.
pub fn format_remaining(seconds: Option<u64>) -> String {
    match seconds {
        Some(seconds) => format!("{:02}:{:02}", seconds / 60, seconds % 60),
        None => NO_DEADLINE.to_string(),
    }
}

/// Tracks the deadline of the current phase.
#[derive(Debug, Default)]
pub struct Countdown {
    deadline: Option<OffsetDateTime>,
    key: Option<(Phase, u32)>,
    /// Set once a tick has seen time left for the current key.
    armed: bool,
    fired: HashSet<(Phase, u32)>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow the deadline of `snapshot`.
    pub fn sync(&mut self, snapshot: &Snapshot) {
        let key = (snapshot.phase, snapshot.round_number);
        if self.key != Some(key) {
            self.key = Some(key);
            self.armed = false;
        }
        self.deadline = snapshot.phase_ends_at;
    }

    pub fn remaining(&self, now: OffsetDateTime) -> Option<u64> {
        self.deadline.map(|deadline| remaining_seconds(deadline, now))
    }

    pub fn display(&self, now: OffsetDateTime) -> String {
        format_remaining(self.remaining(now))
    }

    /// Advance to `now`; returns `true` exactly when the countdown has just
    /// elapsed for the current `(phase, round)`.
    ///
    /// A deadline that is already past when first observed never fires.
    pub fn tick(&mut self, now: OffsetDateTime) -> bool {
        let (Some(key), Some(left)) = (self.key, self.remaining(now)) else {
            return false;
        };
        if left > 0 {
            self.armed = true;
            return false;
        }
        if !self.armed || !self.fired.insert(key) {
            return false;
        }
        tracing::debug!(phase = %key.0, round = key.1, "countdown elapsed");
        true
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
    use crate::protocol::WireSnapshot;
    use time::Duration;

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_767_225_600 + secs).unwrap()
    }

    fn snap(phase: &str, round: u32, ends: &str) -> Snapshot {
        Snapshot::from_wire(&WireSnapshot {
            phase: phase.into(),
            current_round: round,
            phase_ends_at: ends.into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_remaining(Some(90)), "01:30");
        assert_eq!(format_remaining(Some(5)), "00:05");
        assert_eq!(format_remaining(None), "--:--");
    }

    #[test]
    fn remaining_rounds_and_clamps() {
        let deadline = at(10);
        assert_eq!(remaining_seconds(deadline, at(0)), 10);
        assert_eq!(remaining_seconds(deadline, at(0) + Duration::milliseconds(400)), 10);
        assert_eq!(remaining_seconds(deadline, at(0) + Duration::milliseconds(600)), 9);
        assert_eq!(remaining_seconds(deadline, at(30)), 0);
    }

    #[test]
    fn elapsed_fires_once_per_phase_and_round() {
        let mut countdown = Countdown::new();
        countdown.sync(&snap("drawings", 1, "2026-01-01T00:00:02Z"));
        assert!(!countdown.tick(at(0)));
        assert_eq!(countdown.display(at(0)), "00:02");
        assert!(countdown.tick(at(2)));
        assert!(!countdown.tick(at(3)));

        // Duplicate snapshot for the same phase and round.
        countdown.sync(&snap("drawings", 1, "2026-01-01T00:00:02Z"));
        assert!(!countdown.tick(at(4)));

        countdown.sync(&snap("drawings", 2, "2026-01-01T00:00:06Z"));
        assert!(!countdown.tick(at(5)));
        assert!(countdown.tick(at(6)));
    }

    #[test]
    fn past_deadline_on_arrival_does_not_fire() {
        let mut countdown = Countdown::new();
        countdown.sync(&snap("guesses", 1, "2026-01-01T00:00:02Z"));
        assert!(!countdown.tick(at(10)));
        assert_eq!(countdown.display(at(10)), "00:00");
    }

    #[test]
    fn no_deadline_shows_placeholder() {
        let mut countdown = Countdown::new();
        countdown.sync(&snap("lobby", 0, ""));
        assert_eq!(countdown.display(at(0)), NO_DEADLINE);
        assert!(!countdown.tick(at(0)));
    }
}
