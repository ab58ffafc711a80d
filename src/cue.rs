//! Cue catalog.
//!
//! A cue is an identified audio effect. The [`CueCatalog`] decides which
//! ambient loop belongs to a phase (and, during results, to a reveal stage)
//! and resolves cue keys to asset URLs. Narrated jokes use a dynamic key,
//! `reveal_joke:{asset}`, whose asset is the part after the colon.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::{Activity, Phase, RevealStage};

const INTERLUDE_ROOT: &str = "/static/audio/interludes";
const AMBIENT_ROOT: &str = "/static/audio/ambient";
const STING_ROOT: &str = "/static/audio/stings";
const JOKE_PREFIX: &str = "reveal_joke:";

/// Identifier of a cue in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CueKey(String);

impl CueKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key of a narrated joke for the given asset.
    pub fn joke(asset: &str) -> Self {
        Self(format!("{JOKE_PREFIX}{asset}"))
    }

    /// Returns the narration asset if this is a joke key.
    pub fn joke_asset(&self) -> Option<&str> {
        self.0.strip_prefix(JOKE_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CueKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Audio resource a cue plays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Looping background music; one at a time.
    Ambient,
    /// One-shot narration; exclusive, queued.
    Voice,
    /// Short one-shot effect; may overlap anything.
    Sting,
}

/// A request to play a cue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueRequest {
    pub key: CueKey,
    pub channel: Channel,
    /// Higher plays first among stings fired by the same transition.
    pub priority: u8,
}

impl CueRequest {
    pub fn ambient(key: CueKey) -> Self {
        Self {
            key,
            channel: Channel::Ambient,
            priority: 0,
        }
    }

    pub fn voice(key: CueKey) -> Self {
        Self {
            key,
            channel: Channel::Voice,
            priority: 2,
        }
    }

    pub fn sting(key: CueKey, priority: u8) -> Self {
        Self {
            key,
            channel: Channel::Sting,
            priority,
        }
    }
}

/// One-shot sound effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sting {
    Join,
    Leave,
    Submitted(Activity),
    AllSubmitted,
    TimerElapsed,
}

impl Sting {
    pub fn key(self) -> CueKey {
        let key = match self {
            Self::Join => "sting_join",
            Self::Leave => "sting_leave",
            Self::Submitted(Activity::Drawings) => "sting_drawing_submitted",
            Self::Submitted(Activity::Guesses) => "sting_guess_submitted",
            Self::Submitted(Activity::Votes) => "sting_vote_submitted",
            Self::AllSubmitted => "sting_all_submitted",
            Self::TimerElapsed => "sting_timer_elapsed",
        };
        CueKey::new(key)
    }

    /// Edge events outrank per-submission ticks.
    pub fn priority(self) -> u8 {
        match self {
            Self::AllSubmitted | Self::TimerElapsed => 1,
            _ => 0,
        }
    }
}

/// Static mapping from game state to cues and from cues to assets.
#[derive(Debug, Clone)]
pub struct CueCatalog {
    assets: HashMap<CueKey, String>,
}

impl Default for CueCatalog {
    fn default() -> Self {
        let mut assets = HashMap::new();
        for key in [
            "phase_drawings",
            "phase_guesses",
            "phase_votes",
            "phase_results",
            "phase_complete",
            "reveal_guesses",
            "reveal_votes",
        ] {
            assets.insert(CueKey::new(key), format!("{INTERLUDE_ROOT}/{key}.mp3"));
        }
        for phase in [
            Phase::Lobby,
            Phase::Drawings,
            Phase::Guesses,
            Phase::GuessesVotes,
            Phase::Results,
            Phase::Complete,
        ] {
            let key = ambient_key(phase, None);
            let file = key.as_str().trim_start_matches("ambient_").to_string();
            assets.insert(key, format!("{AMBIENT_ROOT}/{file}.mp3"));
        }
        for stage in [RevealStage::Guesses, RevealStage::Votes, RevealStage::Joke] {
            let key = ambient_key(Phase::Results, Some(stage));
            let file = key.as_str().trim_start_matches("ambient_").to_string();
            assets.insert(key, format!("{AMBIENT_ROOT}/{file}.mp3"));
        }
        for sting in [
            Sting::Join,
            Sting::Leave,
            Sting::Submitted(Activity::Drawings),
            Sting::Submitted(Activity::Guesses),
            Sting::Submitted(Activity::Votes),
            Sting::AllSubmitted,
            Sting::TimerElapsed,
        ] {
            let key = sting.key();
            let file = key.as_str().trim_start_matches("sting_").to_string();
            assets.insert(key, format!("{STING_ROOT}/{file}.mp3"));
        }
        Self { assets }
    }
}

impl CueCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the asset of one cue.
    #[must_use]
    pub fn with_asset(mut self, key: impl Into<CueKey>, asset: impl Into<String>) -> Self {
        self.assets.insert(key.into(), asset.into());
        self
    }

    /// Ambient loop for the given phase and reveal stage, if any.
    ///
    /// `paused` has no ambient loop.
    pub fn ambient_for(&self, phase: Phase, stage: Option<RevealStage>) -> Option<CueKey> {
        if phase == Phase::Paused {
            return None;
        }
        let key = ambient_key(phase, stage);
        self.assets.contains_key(&key).then_some(key)
    }

    /// Interlude played when `phase` is entered.
    pub fn interlude_for_phase(&self, phase: Phase) -> Option<CueKey> {
        let key = match phase {
            Phase::Drawings => "phase_drawings",
            Phase::Guesses => "phase_guesses",
            Phase::GuessesVotes => "phase_votes",
            Phase::Results => "phase_results",
            Phase::Complete => "phase_complete",
            Phase::Lobby | Phase::Paused => return None,
        };
        Some(CueKey::new(key))
    }

    /// Voice cue for a reveal stage. The joke stage needs its narration asset.
    pub fn reveal_cue(&self, stage: RevealStage, narration: Option<&str>) -> Option<CueKey> {
        match stage {
            RevealStage::Guesses => Some(CueKey::new("reveal_guesses")),
            RevealStage::Votes => Some(CueKey::new("reveal_votes")),
            RevealStage::Joke => narration.filter(|a| !a.is_empty()).map(CueKey::joke),
        }
    }

    /// Resolve a key to its asset URL.
    pub fn asset(&self, key: &CueKey) -> Option<String> {
        if let Some(asset) = key.joke_asset() {
            return Some(asset.to_string());
        }
        self.assets.get(key).cloned()
    }
}

fn ambient_key(phase: Phase, stage: Option<RevealStage>) -> CueKey {
    match (phase, stage) {
        (Phase::Results, Some(stage)) => CueKey::new(format!("ambient_reveal_{}", stage.as_str())),
        (Phase::GuessesVotes, _) => CueKey::new("ambient_votes"),
        (phase, _) => CueKey::new(format!("ambient_{}", phase.as_str())),
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
    fn ambient_follows_phase_and_stage() {
        let catalog = CueCatalog::new();
        assert_eq!(
            catalog.ambient_for(Phase::Lobby, None),
            Some(CueKey::new("ambient_lobby"))
        );
        assert_eq!(
            catalog.ambient_for(Phase::GuessesVotes, None),
            Some(CueKey::new("ambient_votes"))
        );
        assert_eq!(
            catalog.ambient_for(Phase::Results, Some(RevealStage::Joke)),
            Some(CueKey::new("ambient_reveal_joke"))
        );
        assert_eq!(catalog.ambient_for(Phase::Paused, None), None);
    }

    #[test]
    fn interludes_resolve_under_interlude_root() {
        let catalog = CueCatalog::new();
        let key = catalog.interlude_for_phase(Phase::GuessesVotes).unwrap();
        assert_eq!(key.as_str(), "phase_votes");
        assert_eq!(
            catalog.asset(&key).as_deref(),
            Some("/static/audio/interludes/phase_votes.mp3")
        );
        assert!(catalog.interlude_for_phase(Phase::Lobby).is_none());
    }

    #[test]
    fn joke_key_carries_its_asset() {
        let catalog = CueCatalog::new();
        let key = catalog
            .reveal_cue(RevealStage::Joke, Some("/audio/joke-7.mp3"))
            .unwrap();
        assert_eq!(key.as_str(), "reveal_joke:/audio/joke-7.mp3");
        assert_eq!(catalog.asset(&key).as_deref(), Some("/audio/joke-7.mp3"));
        assert!(catalog.reveal_cue(RevealStage::Joke, Some("")).is_none());
    }

    #[test]
    fn overrides_replace_assets() {
        let catalog = CueCatalog::new().with_asset("sting_join", "/custom/ding.ogg");
        assert_eq!(
            catalog.asset(&Sting::Join.key()).as_deref(),
            Some("/custom/ding.ogg")
        );
    }

    #[test]
    fn every_sting_has_an_asset() {
        let catalog = CueCatalog::new();
        for sting in [
            Sting::Join,
            Sting::Leave,
            Sting::Submitted(Activity::Votes),
            Sting::AllSubmitted,
            Sting::TimerElapsed,
        ] {
            assert!(catalog.asset(&sting.key()).is_some(), "{sting:?}");
        }
    }
}
