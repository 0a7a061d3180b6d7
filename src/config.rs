//! Engine configuration
//!
//! One state directory per working directory; everything the engine
//! persists lives under it.

use std::path::PathBuf;

/// Configuration for the coordination engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding `state.json` and `transcript.md`.
    pub state_dir: PathBuf,

    /// Default number of messages returned by conversation history.
    pub conversation_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".agora"),
            conversation_limit: 50,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("AGORA_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        if let Ok(limit) = std::env::var("AGORA_CONVERSATION_LIMIT") {
            if let Ok(n) = limit.parse() {
                config.conversation_limit = n;
            }
        }

        config
    }

    /// Resolve a relative state dir against a working directory.
    pub fn resolve(&mut self, working_dir: &std::path::Path) {
        if self.state_dir.is_relative() {
            self.state_dir = working_dir.join(&self.state_dir);
        }
    }
}
