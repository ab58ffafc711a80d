#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Picture This client integration tests.
//!
//! Provides scripted push channels and fetchers, a recording [`AudioSink`]
//! and builders for snapshot JSON as the authority sends it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use picture_this_client::{AudioSink, ClientError, CueKey, PushChannel, PushConnector, SnapshotFetcher};
use serde_json::{json, Value};

// ── Push ────────────────────────────────────────────────────────────

/// One scripted step of a push subscription.
pub enum Step {
    Frame(String),
    Fail(String),
    Close,
}

/// A push channel replaying scripted steps, then hanging until closed.
pub struct MockPush {
    steps: VecDeque<Step>,
    closed: bool,
}

impl MockPush {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            closed: false,
        }
    }
}

#[async_trait]
impl PushChannel for MockPush {
    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        if self.closed {
            return None;
        }
        match self.steps.pop_front() {
            Some(Step::Frame(text)) => Some(Ok(text)),
            Some(Step::Fail(reason)) => Some(Err(ClientError::PushReceive(reason))),
            Some(Step::Close) => None,
            // Nothing left to say; stay open until shutdown.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.closed = true;
        Ok(())
    }
}

/// Hands out scripted sessions in order. `None` entries (and running out)
/// refuse the connection.
pub struct MockConnector {
    sessions: StdMutex<VecDeque<Option<MockPush>>>,
    pub attempts: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(sessions: Vec<Option<MockPush>>) -> Arc<Self> {
        Arc::new(Self {
            sessions: StdMutex::new(sessions.into()),
            attempts: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushConnector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn PushChannel>, ClientError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.sessions.lock().unwrap().pop_front().flatten();
        match next {
            Some(push) => Ok(Box::new(push)),
            None => Err(ClientError::PushConnect("connection refused".into())),
        }
    }
}

// ── Fetch ───────────────────────────────────────────────────────────

/// Serves whatever body is currently set, counting requests.
pub struct MockFetcher {
    body: StdMutex<Option<String>>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new(body: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            body: StdMutex::new(body),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, body: Option<String>) {
        *self.body.lock().unwrap() = body;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotFetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.body
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClientError::Fetch("service unavailable".into()))
    }
}

// ── Audio ───────────────────────────────────────────────────────────

/// Shared log of sink calls, e.g. `"voice phase_guesses"`.
#[derive(Default, Clone)]
pub struct AudioLog(Arc<StdMutex<Vec<String>>>);

impl AudioLog {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    /// Keys of voice cues started so far.
    pub fn voices(&self) -> Vec<String> {
        self.entries()
            .iter()
            .filter_map(|e| e.strip_prefix("voice ").map(str::to_string))
            .collect()
    }

    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }
}

/// An [`AudioSink`] that records calls and can refuse chosen voice cues.
#[derive(Default)]
pub struct RecordingSink {
    log: AudioLog,
    refuse: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> (Self, AudioLog) {
        let log = AudioLog::default();
        let sink = Self {
            log: log.clone(),
            refuse: Vec::new(),
        };
        (sink, log)
    }

    /// Refuse to start voice cue `key`.
    pub fn refusing(mut self, key: &str) -> Self {
        self.refuse.push(key.to_string());
        self
    }
}

impl AudioSink for RecordingSink {
    fn start_ambient(&mut self, key: &CueKey, _asset: &str) -> Result<(), ClientError> {
        self.log.push(format!("ambient {key}"));
        Ok(())
    }

    fn pause_ambient(&mut self) {
        self.log.push("pause".into());
    }

    fn resume_ambient(&mut self) -> Result<(), ClientError> {
        self.log.push("resume".into());
        Ok(())
    }

    fn stop_ambient(&mut self) {
        self.log.push("stop".into());
    }

    fn start_voice(&mut self, key: &CueKey, _asset: &str) -> Result<(), ClientError> {
        if self.refuse.iter().any(|r| r == key.as_str()) {
            return Err(ClientError::PlaybackRejected {
                key: key.to_string(),
                reason: "blocked".into(),
            });
        }
        self.log.push(format!("voice {key}"));
        Ok(())
    }

    fn play_sting(&mut self, key: &CueKey, _asset: &str) -> Result<(), ClientError> {
        self.log.push(format!("sting {key}"));
        Ok(())
    }
}

// ── Snapshot JSON builders ──────────────────────────────────────────

/// Builder for snapshot JSON, starting from a two-player lobby.
#[derive(Clone)]
pub struct SnapshotJson(Value);

impl SnapshotJson {
    pub fn lobby() -> Self {
        Self(json!({
            "game_id": "g1",
            "join_code": "ABCD",
            "phase": "lobby",
            "players": ["Ann", "Bo"],
            "player_ids": [1, 2],
            "host_id": 1,
            "max_players": 8,
            "total_rounds": 3,
            "current_round": 0,
        }))
    }

    pub fn phase(mut self, phase: &str) -> Self {
        self.0["phase"] = json!(phase);
        self
    }

    pub fn round(mut self, round: u32) -> Self {
        self.0["current_round"] = json!(round);
        self
    }

    pub fn players(mut self, names: &[&str]) -> Self {
        let ids: Vec<usize> = (1..=names.len()).collect();
        self.0["players"] = json!(names);
        self.0["player_ids"] = json!(ids);
        self
    }

    pub fn drawings(mut self, submitted: u32) -> Self {
        self.0["counts"] = json!({ "drawings": submitted });
        self
    }

    pub fn votes(mut self, submitted: u32, required: u32) -> Self {
        self.0["vote_submitted_count"] = json!(submitted);
        self.0["vote_required_count"] = json!(required);
        self
    }

    pub fn vote_focus(mut self, drawing_index: u32, owner: i64, pending: &[i64]) -> Self {
        self.0["vote_focus"] = json!({
            "drawing_index": drawing_index,
            "drawing_owner": owner,
            "drawing_image": format!("/drawings/{drawing_index}.png"),
            "pending_player_ids": pending,
            "options": ["a cat", "a hat"],
        });
        self
    }

    pub fn reveal(mut self, stage: &str, drawing_index: u32, joke_audio: &str) -> Self {
        self.0["reveal"] = json!({
            "stage": stage,
            "drawing_index": drawing_index,
            "prompt": "a cat",
            "joke": "Purrfect.",
            "joke_audio": joke_audio,
        });
        self
    }

    pub fn ends_at(mut self, rfc3339: &str) -> Self {
        self.0["phase_ends_at"] = json!(rfc3339);
        self
    }

    pub fn build(&self) -> String {
        self.0.to_string()
    }
}
