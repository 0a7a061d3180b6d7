//! JSON-backed state store for the conversation document
//!
//! Holds the canonical in-memory `ConversationState` for the engine's
//! lifetime and overwrites the whole document on disk after every
//! mutation. A separate append-only transcript records events for
//! humans; it is never read back.

use std::path::{Path, PathBuf};

use crate::config::EngineConfig;

use super::transcript::Transcript;
use super::types::ConversationState;

/// Error type for state store operations.
///
/// Everything here is fatal to the operation: expected gated outcomes
/// (claim conflicts, unknown ids) never surface as a `StoreError`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state store not initialized; call initialize() first")]
    Uninitialized,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt state document at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(serde_json::Error),
}

/// Result type for state store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Owns the on-disk layout (`state.json` + `transcript.md` under one
/// state directory) and the loaded document.
pub struct StateStore {
    state_dir: PathBuf,
    state_file: PathBuf,
    transcript: Transcript,
    state: Option<ConversationState>,
}

impl StateStore {
    /// Create an unloaded store for the given state directory. Nothing
    /// touches disk until `initialize`.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        let state_file = state_dir.join("state.json");
        let transcript = Transcript::new(state_dir.join("transcript.md"));
        Self {
            state_dir,
            state_file,
            transcript,
            state: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.state_dir.clone())
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Whether `initialize` has run.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Ensure the state directory exists, then load the existing
    /// document or create and persist a fresh one. Idempotent: repeated
    /// calls keep the already-loaded state.
    pub fn initialize(&mut self) -> StoreResult<&ConversationState> {
        if self.state.is_none() {
            std::fs::create_dir_all(&self.state_dir)?;

            let state = if self.state_file.exists() {
                let json = std::fs::read_to_string(&self.state_file)?;
                serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
                    path: self.state_file.clone(),
                    source,
                })?
            } else {
                let fresh = ConversationState::new();
                self.write_document(&fresh)?;
                fresh
            };

            tracing::debug!(
                session_id = %state.session_id,
                path = %self.state_file.display(),
                "state store initialized"
            );
            self.state = Some(state);
        }

        Ok(self.state.as_ref().expect("just initialized"))
    }

    /// Borrow the loaded document.
    pub fn state(&self) -> StoreResult<&ConversationState> {
        self.state.as_ref().ok_or(StoreError::Uninitialized)
    }

    /// Mutably borrow the loaded document. Callers must `persist` after
    /// mutating.
    pub fn state_mut(&mut self) -> StoreResult<&mut ConversationState> {
        self.state.as_mut().ok_or(StoreError::Uninitialized)
    }

    /// Overwrite the on-disk document with the in-memory one.
    pub fn persist(&self) -> StoreResult<()> {
        let state = self.state()?;
        self.write_document(state)
    }

    /// Replace the document with a fresh empty state and delete the
    /// transcript. Irreversible.
    pub fn reset(&mut self) -> StoreResult<ConversationState> {
        // Must already be initialized; reset of an unloaded store is a
        // caller bug, same as any other access.
        self.state()?;

        let fresh = ConversationState::new();
        self.write_document(&fresh)?;
        self.transcript.clear()?;
        let old = self.state.replace(fresh).expect("checked above");
        Ok(old)
    }

    fn write_document(&self, state: &ConversationState) -> StoreResult<()> {
        let json =
            serde_json::to_string_pretty(state).map_err(StoreError::Serialization)?;
        std::fs::write(&self.state_file, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::types::{AgentRole, MessageType, Message};
    use tempfile::tempdir;

    #[test]
    fn test_access_before_initialize_fails() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join(".agora"));
        assert!(matches!(store.state(), Err(StoreError::Uninitialized)));
        assert!(matches!(store.persist(), Err(StoreError::Uninitialized)));
    }

    #[test]
    fn test_initialize_creates_fresh_document() {
        let dir = tempdir().unwrap();
        let mut store = StateStore::new(dir.path().join(".agora"));

        let session_id = store.initialize().unwrap().session_id.clone();
        assert!(dir.path().join(".agora/state.json").exists());

        // Idempotent: a second call keeps the loaded state.
        assert_eq!(store.initialize().unwrap().session_id, session_id);
    }

    #[test]
    fn test_reload_round_trips_document() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join(".agora");

        let mut store = StateStore::new(&state_dir);
        store.initialize().unwrap();
        let expected = {
            let state = store.state_mut().unwrap();
            state.initial_prompt = Some("prompt".into());
            state.messages.push(Message::new(
                AgentRole::Claude,
                Some(AgentRole::Gemini),
                MessageType::Task,
                "do it",
            ));
            state.context.insert("k".into(), "v".into());
            state.clone()
        };
        store.persist().unwrap();

        let mut reloaded = StateStore::new(&state_dir);
        assert_eq!(reloaded.initialize().unwrap(), &expected);
    }

    #[test]
    fn test_corrupt_document_is_fatal() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join(".agora");
        std::fs::create_dir_all(&state_dir).unwrap();
        std::fs::write(state_dir.join("state.json"), "{not json").unwrap();

        let mut store = StateStore::new(&state_dir);
        assert!(matches!(
            store.initialize(),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_reset_replaces_state_and_clears_transcript() {
        let dir = tempdir().unwrap();
        let mut store = StateStore::new(dir.path().join(".agora"));
        store.initialize().unwrap();

        let old_session = store.state().unwrap().session_id.clone();
        store.state_mut().unwrap().context.insert("k".into(), "v".into());
        store.persist().unwrap();
        store
            .transcript()
            .log_escalation(AgentRole::Codex, "stuck")
            .unwrap();

        store.reset().unwrap();
        let state = store.state().unwrap();
        assert_ne!(state.session_id, old_session);
        assert!(state.context.is_empty());
        assert!(!store.transcript().path().exists());
    }
}
