//! Append-only human-readable transcript
//!
//! One markdown block per event, in operation order. Purely an audit
//! artifact: the engine never reads it back, and `reset` deletes it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::types::{AgentRole, ConversationState, Message, Task};

/// Writer for the transcript file.
pub struct Transcript {
    path: PathBuf,
}

impl Transcript {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one block. Blocks are separated by a blank line.
    fn append(&self, block: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}\n", block)
    }

    /// Session header, written when the initial prompt is recorded.
    pub fn log_session_start(&self, state: &ConversationState, prompt: &str) -> std::io::Result<()> {
        self.append(&format!(
            "# Session `{}`\n\n**Started:** {}\n\n## Initial Prompt\n\n{}",
            state.session_id,
            state.started_at.to_rfc3339(),
            prompt
        ))
    }

    pub fn log_message(&self, msg: &Message) -> std::io::Result<()> {
        let target = msg
            .to_agent
            .map_or_else(|| "ALL".to_string(), |to| to.to_string());
        self.append(&format!(
            "---\n**[{}]** `{}` -> `{}` ({})\n\n{}",
            msg.timestamp.to_rfc3339(),
            msg.from_agent,
            target,
            msg.message_type,
            msg.content
        ))
    }

    pub fn log_task_created(&self, task: &Task) -> std::io::Result<()> {
        let assignee = task
            .assigned_to
            .map_or_else(|| "unassigned".to_string(), |a| a.to_string());
        self.append(&format!(
            "---\n**[TASK CREATED]** `{}` by `{}`\n\n**Title:** {}\n**Assigned:** {}\n\n{}",
            task.id, task.created_by, task.title, assignee, task.description
        ))
    }

    pub fn log_task_claimed(&self, task: &Task, agent: AgentRole) -> std::io::Result<()> {
        self.append(&format!(
            "---\n**[TASK CLAIMED]** `{}` claimed by `{}`",
            task.id, agent
        ))
    }

    pub fn log_task_completed(&self, task: &Task, agent: AgentRole) -> std::io::Result<()> {
        self.append(&format!(
            "---\n**[TASK COMPLETED]** `{}` by `{}`\n\n**Result:**\n{}\n\n**Files:** {}",
            task.id,
            agent,
            task.result.as_deref().unwrap_or(""),
            task.files_modified.join(", ")
        ))
    }

    pub fn log_escalation(&self, agent: AgentRole, reason: &str) -> std::io::Result<()> {
        self.append(&format!(
            "---\n**[ESCALATION]** `{}` requests human intervention\n\n{}",
            agent, reason
        ))
    }

    /// Delete the transcript file, if present. Used by session reset.
    pub fn clear(&self) -> std::io::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::types::MessageType;
    use tempfile::tempdir;

    #[test]
    fn test_blocks_append_in_order() {
        let dir = tempdir().unwrap();
        let transcript = Transcript::new(dir.path().join("transcript.md"));

        let msg = Message::new(AgentRole::Claude, None, MessageType::Broadcast, "first");
        transcript.log_message(&msg).unwrap();

        let task = Task::new("t", "d", AgentRole::Gemini);
        transcript.log_task_created(&task).unwrap();
        transcript.log_escalation(AgentRole::Codex, "stuck").unwrap();

        let text = std::fs::read_to_string(transcript.path()).unwrap();
        let first = text.find("first").unwrap();
        let created = text.find("[TASK CREATED]").unwrap();
        let escalated = text.find("[ESCALATION]").unwrap();
        assert!(first < created && created < escalated);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let transcript = Transcript::new(dir.path().join("transcript.md"));

        // Nothing written yet: clear must not fail.
        transcript.clear().unwrap();

        transcript
            .log_escalation(AgentRole::Claude, "help")
            .unwrap();
        assert!(transcript.path().exists());

        transcript.clear().unwrap();
        assert!(!transcript.path().exists());
    }
}
