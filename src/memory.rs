//! Viewer identity and submission memory.
//!
//! Whether the viewer already acted on a drawing is the one piece of state
//! that cannot be derived from snapshots. It is keyed by
//! `(round, focus index)` and persisted together with the viewer's join
//! credential, per game, so it survives reconnects and reloads.
//!
//! The memory is only mutated in response to a confirmed submission (or an
//! "already submitted" rejection). A rejoin that hands out a different token
//! starts from an empty memory; a session-expired rejection discards the
//! identity entirely.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::error_codes::ActionRejection;
use crate::protocol::PlayerId;

/// Per-drawing "already acted" flags, keyed `"{round}:{index}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionMemory(BTreeMap<String, bool>);

impl SubmissionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(round: u32, focus_index: u32) -> String {
        format!("{round}:{focus_index}")
    }

    pub fn has_submitted(&self, round: u32, focus_index: u32) -> bool {
        self.0
            .get(&Self::key(round, focus_index))
            .copied()
            .unwrap_or(false)
    }

    pub fn mark(&mut self, round: u32, focus_index: u32) {
        self.0.insert(Self::key(round, focus_index), true);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Credential handed out by the authority when a viewer joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerCredential {
    #[serde(alias = "audience_id", alias = "player_id")]
    pub viewer_id: PlayerId,
    pub token: String,
    #[serde(default)]
    pub name: String,
}

/// What is persisted for one viewer in one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIdentity {
    #[serde(flatten)]
    pub credential: ViewerCredential,
    #[serde(default)]
    pub submitted: SubmissionMemory,
}

// ── Persistence ─────────────────────────────────────────────────────

/// Storage for [`StoredIdentity`] records addressed by game.
pub trait IdentityStore: Send + 'static {
    fn load(&self, game_id: &str) -> Result<Option<StoredIdentity>>;
    fn save(&mut self, game_id: &str, identity: &StoredIdentity) -> Result<()>;
    fn clear(&mut self, game_id: &str) -> Result<()>;
}

/// Process-local store, mostly for tests and ephemeral viewers.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    records: HashMap<String, StoredIdentity>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn load(&self, game_id: &str) -> Result<Option<StoredIdentity>> {
        Ok(self.records.get(game_id).cloned())
    }

    fn save(&mut self, game_id: &str, identity: &StoredIdentity) -> Result<()> {
        self.records.insert(game_id.to_string(), identity.clone());
        Ok(())
    }

    fn clear(&mut self, game_id: &str) -> Result<()> {
        self.records.remove(game_id);
        Ok(())
    }
}

/// One JSON file per game, named `{prefix}_{game_id}.json`.
#[derive(Debug, Clone)]
pub struct JsonFileIdentityStore {
    dir: PathBuf,
    prefix: String,
}

impl JsonFileIdentityStore {
    /// Store records under `dir` with the `pt_audience` prefix.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "pt_audience".to_string(),
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn path(&self, game_id: &str) -> Result<PathBuf> {
        let safe = !game_id.is_empty()
            && game_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(ClientError::Config(format!(
                "game id {game_id:?} cannot be used as a file name"
            )));
        }
        Ok(self.dir.join(format!("{}_{game_id}.json", self.prefix)))
    }
}

impl IdentityStore for JsonFileIdentityStore {
    fn load(&self, game_id: &str) -> Result<Option<StoredIdentity>> {
        let path = self.path(game_id)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable identity");
                Ok(None)
            }
        }
    }

    fn save(&mut self, game_id: &str, identity: &StoredIdentity) -> Result<()> {
        let path = self.path(game_id)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(path, serde_json::to_vec(identity)?)?;
        Ok(())
    }

    fn clear(&mut self, game_id: &str) -> Result<()> {
        match std::fs::remove_file(self.path(game_id)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// The viewer's identity in one game, backed by an [`IdentityStore`].
pub struct ViewerSession {
    game_id: String,
    store: Box<dyn IdentityStore>,
    identity: Option<StoredIdentity>,
}

impl std::fmt::Debug for ViewerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerSession")
            .field("game_id", &self.game_id)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl ViewerSession {
    /// Restore the viewer's identity for `game_id`, if one was stored.
    pub fn restore(game_id: impl Into<String>, store: Box<dyn IdentityStore>) -> Self {
        let game_id = game_id.into();
        let identity = match store.load(&game_id) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(game_id = %game_id, error = %e, "failed to load identity");
                None
            }
        };
        Self {
            game_id,
            store,
            identity,
        }
    }

    pub fn credential(&self) -> Option<&ViewerCredential> {
        self.identity.as_ref().map(|i| &i.credential)
    }

    pub fn viewer_id(&self) -> Option<PlayerId> {
        self.credential().map(|c| c.viewer_id)
    }

    /// Submission memory of the current identity (empty without one).
    pub fn memory(&self) -> SubmissionMemory {
        self.identity
            .as_ref()
            .map(|i| i.submitted.clone())
            .unwrap_or_default()
    }

    pub fn has_submitted(&self, round: u32, focus_index: u32) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|i| i.submitted.has_submitted(round, focus_index))
    }

    /// Record the credential returned by a (re)join.
    ///
    /// Memory carries over only when the token is unchanged.
    pub fn join(&mut self, credential: ViewerCredential) -> Result<()> {
        let submitted = match self.identity.take() {
            Some(previous) if previous.credential.token == credential.token => previous.submitted,
            _ => SubmissionMemory::new(),
        };
        let identity = StoredIdentity {
            credential,
            submitted,
        };
        self.store.save(&self.game_id, &identity)?;
        self.identity = Some(identity);
        Ok(())
    }

    /// Record a confirmed submission on `(round, focus_index)`.
    pub fn mark_submitted(&mut self, round: u32, focus_index: u32) -> Result<()> {
        let Some(identity) = self.identity.as_mut() else {
            return Ok(());
        };
        identity.submitted.mark(round, focus_index);
        self.store.save(&self.game_id, identity)
    }

    /// Forget the identity (session expired).
    pub fn invalidate(&mut self) -> Result<()> {
        self.identity = None;
        self.store.clear(&self.game_id)
    }

    /// Apply the consequences of a rejected action on `(round, focus_index)`.
    pub fn apply_rejection(
        &mut self,
        rejection: ActionRejection,
        round: u32,
        focus_index: u32,
    ) -> Result<()> {
        match rejection {
            ActionRejection::AlreadySubmitted => self.mark_submitted(round, focus_index),
            r if r.invalidates_identity() => {
                tracing::info!(game_id = %self.game_id, "viewer session expired");
                self.invalidate()
            }
            _ => Ok(()),
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

    fn credential(token: &str) -> ViewerCredential {
        ViewerCredential {
            viewer_id: 9,
            token: token.into(),
            name: "Viv".into(),
        }
    }

    #[test]
    fn memory_is_keyed_by_round_and_index() {
        let mut memory = SubmissionMemory::new();
        memory.mark(2, 1);
        assert!(memory.has_submitted(2, 1));
        assert!(!memory.has_submitted(1, 2));
        assert_eq!(serde_json::to_string(&memory).unwrap(), r#"{"2:1":true}"#);
    }

    #[test]
    fn rejoin_with_same_token_keeps_memory() {
        let mut session = ViewerSession::restore("g1", Box::new(InMemoryIdentityStore::new()));
        session.join(credential("t1")).unwrap();
        session.mark_submitted(1, 0).unwrap();

        session.join(credential("t1")).unwrap();
        assert!(session.has_submitted(1, 0));

        session.join(credential("t2")).unwrap();
        assert!(!session.has_submitted(1, 0));
    }

    #[test]
    fn rejections_update_the_session() {
        let mut session = ViewerSession::restore("g1", Box::new(InMemoryIdentityStore::new()));
        session.join(credential("t1")).unwrap();
        session
            .apply_rejection(ActionRejection::AlreadySubmitted, 1, 3)
            .unwrap();
        assert!(session.has_submitted(1, 3));

        session
            .apply_rejection(ActionRejection::InvalidInput, 1, 4)
            .unwrap();
        assert!(session.credential().is_some());

        session
            .apply_rejection(ActionRejection::SessionExpired, 1, 4)
            .unwrap();
        assert!(session.credential().is_none());
        assert!(session.memory().is_empty());
    }

    #[test]
    fn marking_without_identity_is_a_no_op() {
        let mut session = ViewerSession::restore("g1", Box::new(InMemoryIdentityStore::new()));
        session.mark_submitted(1, 0).unwrap();
        assert!(!session.has_submitted(1, 0));
    }

    #[test]
    fn stored_identity_accepts_audience_field_names() {
        let raw = r#"{"audience_id":4,"token":"abc","name":"Al","submitted":{"1:0":true}}"#;
        let identity: StoredIdentity = serde_json::from_str(raw).unwrap();
        assert_eq!(identity.credential.viewer_id, 4);
        assert!(identity.submitted.has_submitted(1, 0));
    }

    #[test]
    fn json_file_store_round_trips_and_clears() {
        let dir = std::env::temp_dir().join(format!("pt-identity-{}", std::process::id()));
        let mut store = JsonFileIdentityStore::new(&dir);
        let identity = StoredIdentity {
            credential: credential("t1"),
            submitted: SubmissionMemory::new(),
        };
        store.save("game-1", &identity).unwrap();
        assert_eq!(store.load("game-1").unwrap(), Some(identity));
        store.clear("game-1").unwrap();
        assert_eq!(store.load("game-1").unwrap(), None);
        store.clear("game-1").unwrap();
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn json_file_store_rejects_path_like_ids() {
        let store = JsonFileIdentityStore::new(std::env::temp_dir());
        assert!(matches!(store.load("../etc"), Err(ClientError::Config(_))));
    }
}
