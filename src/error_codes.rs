//! Classification of action rejections returned by the authority.
//!
//! The authority answers rejected actions with a non-2xx status and a body of
//! the form `{"error": "..."}`. Only a handful of those rejections change what
//! the client must do next, so they are recognized here by status and message
//! text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the authority rejected an action.
///
/// Use [`ActionRejection::classify`] to derive it from a response and
/// [`description()`](ActionRejection::description) for a human-readable
/// explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionRejection {
    /// The viewer already acted on this focus; treat it as submitted.
    AlreadySubmitted,
    /// The viewer's credential is no longer valid; re-authentication needed.
    SessionExpired,
    /// The game (or the targeted resource) no longer exists.
    NotFound,
    /// The request was malformed or not allowed in the current phase.
    InvalidInput,
    /// Any other rejection.
    Other,
}

impl ActionRejection {
    /// Classify a rejection from its HTTP status and `error` message.
    ///
    /// ```
    /// use picture_this_client::ActionRejection;
    ///
    /// let kind = ActionRejection::classify(409, "vote already submitted");
    /// assert_eq!(kind, ActionRejection::AlreadySubmitted);
    /// ```
    pub fn classify(status: u16, message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        match status {
            409 if message.contains("already submitted") => Self::AlreadySubmitted,
            409 | 401 | 403
                if message.contains("audience member not found")
                    || message.contains("invalid audience authentication")
                    || message.contains("invalid player authentication")
                    || message.contains("session expired") =>
            {
                Self::SessionExpired
            }
            404 => Self::NotFound,
            400 | 409 | 422 => Self::InvalidInput,
            _ => Self::Other,
        }
    }

    /// Returns `true` if the viewer identity must be discarded.
    pub fn invalidates_identity(self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns a human-readable description of this rejection.
    pub fn description(self) -> &'static str {
        match self {
            Self::AlreadySubmitted => "Already recorded for this drawing.",
            Self::SessionExpired => "Session expired. Please join again.",
            Self::NotFound => "The game could not be found.",
            Self::InvalidInput => "The request was not accepted right now.",
            Self::Other => "The request failed.",
        }
    }
}

impl fmt::Display for ActionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AlreadySubmitted => "ALREADY_SUBMITTED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Other => "OTHER",
        };
        f.write_str(name)
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

    #[test]
    fn already_submitted_requires_conflict_status() {
        assert_eq!(
            ActionRejection::classify(409, "Vote already submitted"),
            ActionRejection::AlreadySubmitted
        );
        assert_eq!(
            ActionRejection::classify(500, "vote already submitted"),
            ActionRejection::Other
        );
    }

    #[test]
    fn audience_auth_failures_expire_the_session() {
        for message in ["audience member not found", "invalid audience authentication"] {
            let kind = ActionRejection::classify(409, message);
            assert_eq!(kind, ActionRejection::SessionExpired);
            assert!(kind.invalidates_identity());
        }
    }

    #[test]
    fn other_conflicts_are_invalid_input() {
        let kind = ActionRejection::classify(409, "not your turn");
        assert_eq!(kind, ActionRejection::InvalidInput);
        assert!(!kind.invalidates_identity());
    }

    #[test]
    fn not_found_and_fallback() {
        assert_eq!(ActionRejection::classify(404, "game not found"), ActionRejection::NotFound);
        assert_eq!(ActionRejection::classify(503, ""), ActionRejection::Other);
    }

    #[test]
    fn serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ActionRejection::SessionExpired).unwrap();
        assert_eq!(json, "\"SESSION_EXPIRED\"");
        assert_eq!(ActionRejection::SessionExpired.to_string(), "SESSION_EXPIRED");
    }

    #[test]
    fn every_rejection_has_a_description() {
        for kind in [
            ActionRejection::AlreadySubmitted,
            ActionRejection::SessionExpired,
            ActionRejection::NotFound,
            ActionRejection::InvalidInput,
            ActionRejection::Other,
        ] {
            assert!(!kind.description().is_empty());
        }
    }
}
