//! Events consumed by the role client's dispatch loop.
//!
//! Every source of change (push frames, poll results, connection state, the
//! 1 Hz tick, the first viewer interaction, playback callbacks and action
//! outcomes) is funneled into one [`ClientEvent`] stream and handled strictly
//! in arrival order.

use serde::Serialize;
use time::OffsetDateTime;

use crate::connection::ConnectionState;
use crate::cue::CueKey;
use crate::error_codes::ActionRejection;
use crate::memory::ViewerCredential;

/// Output of the connection loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TransportEvent {
    /// The connection moved to a new state.
    StateChanged(ConnectionState),
    /// A raw frame from the push subscription or a poll fetch.
    Message(String),
}

/// Outcome of an action submitted by the external request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The authority accepted the submission for `(round, drawing_index)`.
    Submitted { round: u32, drawing_index: u32 },
    /// The authority rejected it.
    Rejected {
        rejection: ActionRejection,
        round: u32,
        drawing_index: u32,
    },
}

/// A single input to [`RoleClient::handle`](crate::client::RoleClient::handle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Transport(TransportEvent),
    /// Local countdown tick.
    Tick(OffsetDateTime),
    /// The viewer interacted with the page (unlocks audio).
    Interaction,
    /// A voice cue played to completion.
    PlaybackFinished(CueKey),
    /// A voice cue could not be played.
    PlaybackFailed { key: CueKey, reason: String },
    /// The ambient loop could not be played.
    AmbientFailed { key: CueKey, reason: String },
    Action(ActionOutcome),
    /// A (re)join returned a credential.
    Credential(ViewerCredential),
}

impl From<TransportEvent> for ClientEvent {
    fn from(event: TransportEvent) -> Self {
        Self::Transport(event)
    }
}

impl From<ActionOutcome> for ClientEvent {
    fn from(outcome: ActionOutcome) -> Self {
        Self::Action(outcome)
    }
}
