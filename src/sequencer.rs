//! Effect sequencing.
//!
//! The [`EffectSequencer`] turns [`Transition`]s into cue playback on an
//! [`AudioSink`]. The output has two exclusive channels:
//!
//! - **ambient**: one looping track chosen from the phase (and reveal stage).
//!   Changing the desired loop stops the old one and starts the new one from
//!   the beginning; asking for the loop already playing does nothing.
//! - **voice**: one-shot narration, played one at a time from a FIFO queue.
//!   Ambient is paused while a voice cue plays and resumes (or switches to
//!   whatever is desired by then) once the voice channel is idle again.
//!
//! Stings are fire-and-forget and bypass both channels.
//!
//! Until the viewer has interacted once, nothing starts: voice cues wait in
//! the queue, the desired ambient loop is remembered and re-attempted at the
//! first interaction, and stings are dropped.
//!
//! Playback completion is reported back through
//! [`on_voice_finished`](EffectSequencer::on_voice_finished) and
//! [`on_voice_failed`](EffectSequencer::on_voice_failed). A cue that fails to
//! start never wedges the channel; the next queued cue is tried instead.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::cue::{CueCatalog, CueKey, CueRequest, Sting};
use crate::error::Result;
use crate::snapshot::{RevealStage, Snapshot};
use crate::store::Transition;

/// Audio output driven by the sequencer.
///
/// Implementations start playback and return immediately. Voice completion
/// is reported asynchronously by the embedding application.
pub trait AudioSink: Send + 'static {
    /// Start `asset` as a looping ambient track from the beginning.
    fn start_ambient(&mut self, key: &CueKey, asset: &str) -> Result<()>;

    /// Pause the ambient track, keeping its position.
    fn pause_ambient(&mut self);

    /// Resume the paused ambient track.
    fn resume_ambient(&mut self) -> Result<()>;

    /// Stop the ambient track and rewind it.
    fn stop_ambient(&mut self);

    /// Start a one-shot voice cue.
    fn start_voice(&mut self, key: &CueKey, asset: &str) -> Result<()>;

    /// Play a one-shot sting over whatever else is playing.
    fn play_sting(&mut self, key: &CueKey, asset: &str) -> Result<()>;
}

/// State of the ambient channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AmbientState {
    Silent,
    Playing(CueKey),
    /// Held while a voice cue plays.
    Paused(CueKey),
}

/// State of the voice channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VoiceState {
    Idle,
    Playing(CueKey),
}

/// Maps transitions to cues and arbitrates the audio output.
pub struct EffectSequencer {
    sink: Box<dyn AudioSink>,
    catalog: CueCatalog,
    ambient: AmbientState,
    desired_ambient: Option<CueKey>,
    voice: VoiceState,
    queue: VecDeque<CueKey>,
    /// `(round, drawing_index)` pairs whose joke has been narrated.
    narrated: HashSet<(u32, u32)>,
    unlocked: bool,
}

impl std::fmt::Debug for EffectSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectSequencer")
            .field("ambient", &self.ambient)
            .field("desired_ambient", &self.desired_ambient)
            .field("voice", &self.voice)
            .field("queue", &self.queue)
            .field("unlocked", &self.unlocked)
            .finish_non_exhaustive()
    }
}

impl EffectSequencer {
    pub fn new(sink: Box<dyn AudioSink>, catalog: CueCatalog) -> Self {
        Self {
            sink,
            catalog,
            ambient: AmbientState::Silent,
            desired_ambient: None,
            voice: VoiceState::Idle,
            queue: VecDeque::new(),
            narrated: HashSet::new(),
            unlocked: false,
        }
    }

    // ── Inputs ──────────────────────────────────────────────────────

    /// React to a reconciled transition.
    ///
    /// `snapshot` is the state the transition led to. Returns the cues that
    /// were accepted (voice cues enqueued, stings fired, ambient switched).
    pub fn on_transition(&mut self, transition: &Transition, snapshot: &Snapshot) -> Vec<CueRequest> {
        let mut accepted = Vec::new();
        if transition.is_empty() {
            return accepted;
        }

        let desired = self
            .catalog
            .ambient_for(snapshot.phase, snapshot.reveal.as_ref().map(|r| r.stage));
        if desired != self.desired_ambient {
            if let Some(key) = &desired {
                accepted.push(CueRequest::ambient(key.clone()));
            }
            self.desired_ambient = desired;
        }

        if let Some(change) = transition.phase_change {
            // Joining mid-phase does not replay the interlude.
            if change.from.is_some() {
                if let Some(key) = self.catalog.interlude_for_phase(change.to) {
                    if self.enqueue_voice(key.clone()) {
                        accepted.push(CueRequest::voice(key));
                    }
                }
            }
        }

        if let Some(reveal) = &transition.reveal_change {
            let first_narration = reveal.stage != RevealStage::Joke
                || self.narrated.insert((reveal.round, reveal.drawing_index));
            if first_narration {
                if let Some(key) = self
                    .catalog
                    .reveal_cue(reveal.stage, reveal.narration.as_deref())
                {
                    if self.enqueue_voice(key.clone()) {
                        accepted.push(CueRequest::voice(key));
                    }
                }
            }
        }

        let mut stings = Vec::new();
        if transition.roster.joined > 0 {
            stings.push(Sting::Join);
        }
        if transition.roster.left > 0 {
            stings.push(Sting::Leave);
        }
        stings.extend(transition.progressed.iter().copied().map(Sting::Submitted));
        if !transition.all_submitted.is_empty() {
            stings.push(Sting::AllSubmitted);
        }
        stings.sort_by_key(|s| std::cmp::Reverse(s.priority()));
        for sting in stings {
            if self.play_sting(sting) {
                accepted.push(CueRequest::sting(sting.key(), sting.priority()));
            }
        }

        self.pump();
        self.sync_ambient();
        accepted
    }

    /// Queue a voice cue.
    ///
    /// Returns `false` when the cue is the tail of the queue (or, with an
    /// empty queue, the cue currently playing) and was therefore not queued
    /// again.
    pub fn enqueue_voice(&mut self, key: CueKey) -> bool {
        let echo = match self.queue.back() {
            Some(tail) => *tail == key,
            None => self.voice == VoiceState::Playing(key.clone()),
        };
        if echo {
            tracing::debug!(cue = %key, "voice cue already queued");
            return false;
        }
        tracing::debug!(cue = %key, queued = self.queue.len() + 1, "voice cue queued");
        self.queue.push_back(key);
        self.pump();
        self.sync_ambient();
        true
    }

    /// First interaction from the viewer. Later calls are no-ops.
    pub fn on_interaction(&mut self) {
        if self.unlocked {
            return;
        }
        tracing::debug!(queued = self.queue.len(), "audio unlocked");
        self.unlocked = true;
        self.pump();
        self.sync_ambient();
    }

    /// The voice cue `key` played to completion.
    pub fn on_voice_finished(&mut self, key: &CueKey) {
        if self.voice != VoiceState::Playing(key.clone()) {
            tracing::debug!(cue = %key, "ignoring completion of a cue that is not playing");
            return;
        }
        self.voice = VoiceState::Idle;
        self.pump();
        self.sync_ambient();
    }

    /// The voice cue `key` failed mid-playback.
    pub fn on_voice_failed(&mut self, key: &CueKey, reason: &str) {
        if self.voice != VoiceState::Playing(key.clone()) {
            return;
        }
        tracing::warn!(cue = %key, reason, "voice cue failed");
        self.voice = VoiceState::Idle;
        self.pump();
        self.sync_ambient();
    }

    /// The ambient track `key` stopped on its own (asset error, blocked).
    ///
    /// The channel falls back to silent; the loop is re-attempted the next
    /// time ambient is synchronized.
    pub fn on_ambient_failed(&mut self, key: &CueKey, reason: &str) {
        let current = match &self.ambient {
            AmbientState::Playing(k) | AmbientState::Paused(k) => k == key,
            AmbientState::Silent => false,
        };
        if current {
            tracing::warn!(cue = %key, reason, "ambient cue failed");
            self.ambient = AmbientState::Silent;
        }
    }

    /// The local countdown reached zero.
    pub fn on_timer_elapsed(&mut self) -> Option<CueRequest> {
        let sting = Sting::TimerElapsed;
        self.play_sting(sting)
            .then(|| CueRequest::sting(sting.key(), sting.priority()))
    }

    /// Stop everything and forget queued cues.
    pub fn silence(&mut self) {
        self.queue.clear();
        self.voice = VoiceState::Idle;
        if self.ambient != AmbientState::Silent {
            self.sink.stop_ambient();
            self.ambient = AmbientState::Silent;
        }
        self.desired_ambient = None;
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn ambient(&self) -> &AmbientState {
        &self.ambient
    }

    pub fn voice(&self) -> &VoiceState {
        &self.voice
    }

    /// Voice cues waiting to play, in order.
    pub fn queued(&self) -> impl Iterator<Item = &CueKey> {
        self.queue.iter()
    }

    /// Ambient loop the current state calls for.
    pub fn desired_ambient(&self) -> Option<&CueKey> {
        self.desired_ambient.as_ref()
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    // ── Channel arbitration ─────────────────────────────────────────

    fn play_sting(&mut self, sting: Sting) -> bool {
        let key = sting.key();
        if !self.unlocked {
            tracing::debug!(cue = %key, "sting dropped before first interaction");
            return false;
        }
        let Some(asset) = self.catalog.asset(&key) else {
            tracing::warn!(cue = %key, "sting has no asset");
            return false;
        };
        if let Err(e) = self.sink.play_sting(&key, &asset) {
            tracing::warn!(cue = %key, error = %e, "sting failed to start");
            return false;
        }
        true
    }

    /// Start the next queued voice cue if the channel is free.
    fn pump(&mut self) {
        if !self.unlocked || self.voice != VoiceState::Idle {
            return;
        }
        while let Some(key) = self.queue.pop_front() {
            let Some(asset) = self.catalog.asset(&key) else {
                tracing::warn!(cue = %key, "voice cue has no asset");
                continue;
            };
            self.hold_ambient();
            match self.sink.start_voice(&key, &asset) {
                Ok(()) => {
                    tracing::debug!(cue = %key, "voice cue started");
                    self.voice = VoiceState::Playing(key);
                    return;
                }
                Err(e) => {
                    tracing::warn!(cue = %key, error = %e, "voice cue failed to start");
                }
            }
        }
    }

    fn hold_ambient(&mut self) {
        if let AmbientState::Playing(key) = &self.ambient {
            self.sink.pause_ambient();
            self.ambient = AmbientState::Paused(key.clone());
        }
    }

    /// Bring the ambient channel in line with the desired loop.
    fn sync_ambient(&mut self) {
        if !self.unlocked {
            return;
        }
        if self.voice != VoiceState::Idle {
            self.hold_ambient();
            return;
        }

        let desired = self.desired_ambient.clone();
        match (&self.ambient, desired) {
            (AmbientState::Playing(current), Some(want)) if *current == want => {}
            (AmbientState::Paused(current), Some(want)) if *current == want => {
                match self.sink.resume_ambient() {
                    Ok(()) => self.ambient = AmbientState::Playing(want),
                    Err(e) => {
                        tracing::warn!(cue = %want, error = %e, "ambient failed to resume");
                        self.sink.stop_ambient();
                        self.ambient = AmbientState::Silent;
                    }
                }
            }
            (_, None) => {
                if self.ambient != AmbientState::Silent {
                    self.sink.stop_ambient();
                    self.ambient = AmbientState::Silent;
                }
            }
            (_, Some(want)) => {
                if self.ambient != AmbientState::Silent {
                    self.sink.stop_ambient();
                    self.ambient = AmbientState::Silent;
                }
                let Some(asset) = self.catalog.asset(&want) else {
                    tracing::warn!(cue = %want, "ambient cue has no asset");
                    return;
                };
                match self.sink.start_ambient(&want, &asset) {
                    Ok(()) => {
                        tracing::debug!(cue = %want, "ambient started");
                        self.ambient = AmbientState::Playing(want);
                    }
                    Err(e) => tracing::warn!(cue = %want, error = %e, "ambient failed to start"),
                }
            }
        }
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
    use crate::error::ClientError;
    use crate::protocol::WireSnapshot;
    use crate::store::SnapshotStore;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Log(Arc<Mutex<Vec<String>>>);

    impl Log {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    struct Sink {
        log: Log,
        reject_voice: Option<String>,
    }

    impl AudioSink for Sink {
        fn start_ambient(&mut self, key: &CueKey, _: &str) -> Result<()> {
            self.log.0.lock().unwrap().push(format!("ambient:{key}"));
            Ok(())
        }
        fn pause_ambient(&mut self) {
            self.log.0.lock().unwrap().push("pause".into());
        }
        fn resume_ambient(&mut self) -> Result<()> {
            self.log.0.lock().unwrap().push("resume".into());
            Ok(())
        }
        fn stop_ambient(&mut self) {
            self.log.0.lock().unwrap().push("stop".into());
        }
        fn start_voice(&mut self, key: &CueKey, _: &str) -> Result<()> {
            if self.reject_voice.as_deref() == Some(key.as_str()) {
                return Err(ClientError::PlaybackRejected {
                    key: key.to_string(),
                    reason: "blocked".into(),
                });
            }
            self.log.0.lock().unwrap().push(format!("voice:{key}"));
            Ok(())
        }
        fn play_sting(&mut self, key: &CueKey, _: &str) -> Result<()> {
            self.log.0.lock().unwrap().push(format!("sting:{key}"));
            Ok(())
        }
    }

    fn sequencer(reject_voice: Option<&str>) -> (EffectSequencer, Log) {
        let log = Log::default();
        let sink = Sink {
            log: log.clone(),
            reject_voice: reject_voice.map(String::from),
        };
        (EffectSequencer::new(Box::new(sink), CueCatalog::new()), log)
    }

    fn snap(phase: &str, players: usize) -> Snapshot {
        Snapshot::from_wire(&WireSnapshot {
            phase: phase.into(),
            current_round: 1,
            players: (0..players).map(|i| format!("P{i}")).collect(),
            player_ids: (1..=players as i64).collect(),
            ..Default::default()
        })
        .unwrap()
    }

    fn feed(store: &mut SnapshotStore, seq: &mut EffectSequencer, s: Snapshot) -> Vec<CueRequest> {
        let out = store.reconcile(s);
        seq.on_transition(&out.transition, out.snapshot)
    }

    #[test]
    fn nothing_plays_before_interaction() {
        let (mut seq, log) = sequencer(None);
        let mut store = SnapshotStore::new();
        feed(&mut store, &mut seq, snap("lobby", 2));
        feed(&mut store, &mut seq, snap("lobby", 3));
        feed(&mut store, &mut seq, snap("drawings", 3));
        assert!(log.take().is_empty());
        assert_eq!(seq.queued().count(), 1);

        seq.on_interaction();
        assert_eq!(log.take(), vec!["voice:phase_drawings"]);
        assert_eq!(seq.ambient(), &AmbientState::Silent);

        seq.on_voice_finished(&CueKey::new("phase_drawings"));
        assert_eq!(log.take(), vec!["ambient:ambient_drawings"]);
    }

    #[test]
    fn interaction_reattempts_desired_ambient() {
        let (mut seq, log) = sequencer(None);
        let mut store = SnapshotStore::new();
        feed(&mut store, &mut seq, snap("lobby", 1));
        seq.on_interaction();
        seq.on_interaction();
        assert_eq!(log.take(), vec!["ambient:ambient_lobby"]);
    }

    #[test]
    fn same_phase_does_not_restart_ambient() {
        let (mut seq, log) = sequencer(None);
        seq.on_interaction();
        let mut store = SnapshotStore::new();
        feed(&mut store, &mut seq, snap("lobby", 1));
        feed(&mut store, &mut seq, snap("lobby", 2));
        assert_eq!(log.take(), vec!["ambient:ambient_lobby", "sting:sting_join"]);
    }

    #[test]
    fn rejected_voice_does_not_wedge_the_channel() {
        let (mut seq, log) = sequencer(Some("phase_guesses"));
        seq.on_interaction();
        assert!(seq.enqueue_voice(CueKey::new("phase_guesses")));
        assert!(seq.enqueue_voice(CueKey::new("phase_votes")));
        assert_eq!(seq.voice(), &VoiceState::Playing(CueKey::new("phase_votes")));
        assert_eq!(log.take(), vec!["voice:phase_votes"]);
    }

    #[test]
    fn failure_callback_moves_to_next_cue() {
        let (mut seq, log) = sequencer(None);
        seq.on_interaction();
        seq.enqueue_voice(CueKey::new("phase_results"));
        seq.enqueue_voice(CueKey::new("reveal_guesses"));
        seq.on_voice_failed(&CueKey::new("phase_results"), "decode error");
        assert_eq!(
            log.take(),
            vec!["voice:phase_results", "voice:reveal_guesses"]
        );
    }

    #[test]
    fn stale_completion_is_ignored() {
        let (mut seq, _log) = sequencer(None);
        seq.on_interaction();
        seq.enqueue_voice(CueKey::new("phase_results"));
        seq.on_voice_finished(&CueKey::new("phase_votes"));
        assert_eq!(seq.voice(), &VoiceState::Playing(CueKey::new("phase_results")));
    }

    #[test]
    fn ambient_failure_is_retried_on_next_sync() {
        let (mut seq, log) = sequencer(None);
        seq.on_interaction();
        let mut store = SnapshotStore::new();
        feed(&mut store, &mut seq, snap("lobby", 1));
        seq.on_ambient_failed(&CueKey::new("ambient_lobby"), "network");
        assert_eq!(seq.ambient(), &AmbientState::Silent);
        feed(&mut store, &mut seq, snap("lobby", 2));
        assert_eq!(
            log.take(),
            vec!["ambient:ambient_lobby", "sting:sting_join", "ambient:ambient_lobby"]
        );
    }

    #[test]
    fn joke_narrated_once_per_drawing() {
        let (mut seq, _log) = sequencer(None);
        let t = Transition {
            reveal_change: Some(crate::store::RevealChange {
                round: 1,
                stage: RevealStage::Joke,
                drawing_index: 0,
                narration: Some("/j.mp3".into()),
            }),
            ..Default::default()
        };
        let s = snap("results", 1);
        assert_eq!(seq.on_transition(&t, &s).len(), 2);
        // Ambient is unchanged the second time and the joke is not requeued.
        assert!(seq.on_transition(&t, &s).is_empty());
    }

    #[test]
    fn silence_stops_everything() {
        let (mut seq, log) = sequencer(None);
        seq.on_interaction();
        let mut store = SnapshotStore::new();
        feed(&mut store, &mut seq, snap("lobby", 1));
        seq.silence();
        assert_eq!(seq.ambient(), &AmbientState::Silent);
        assert_eq!(log.take(), vec!["ambient:ambient_lobby", "stop"]);
    }
}
