//! Core types for the shared conversation document
//!
//! Every entity here is a pure value type: validation lives at the
//! boundaries (serde for closed sets, the engine for state transitions).
//! The whole `ConversationState` is persisted as one JSON document.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generate a short unique token (first 8 hex chars of a v4 UUID).
///
/// Ids stay human-quotable in transcripts and agent prompts; collision
/// odds are negligible at per-session entity counts.
pub fn short_id() -> String {
    let full = uuid::Uuid::new_v4().simple().to_string();
    full[..8].to_string()
}

/// A participating agent role. The set is closed: adding a role is a
/// code change, never a runtime string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// The orchestrator role; vote notifications originate here.
    Claude,
    Gemini,
    Codex,
    Copilot,
}

impl AgentRole {
    /// All roles, in canonical order.
    pub fn all() -> &'static [AgentRole] {
        &[
            AgentRole::Claude,
            AgentRole::Gemini,
            AgentRole::Codex,
            AgentRole::Copilot,
        ]
    }

    /// The role that initiates votes and owns session bookkeeping.
    pub fn orchestrator() -> AgentRole {
        AgentRole::Claude
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Claude => "claude",
            AgentRole::Gemini => "gemini",
            AgentRole::Codex => "codex",
            AgentRole::Copilot => "copilot",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(AgentRole::Claude),
            "gemini" => Ok(AgentRole::Gemini),
            "codex" => Ok(AgentRole::Codex),
            "copilot" => Ok(AgentRole::Copilot),
            other => Err(UnknownName {
                field: "agent role",
                value: other.to_string(),
            }),
        }
    }
}

/// Returned when a closed-set name fails to parse at a boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {field}: {value:?}")]
pub struct UnknownName {
    pub field: &'static str,
    pub value: String,
}

/// Message priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// What kind of message is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Task,
    Question,
    Response,
    ReviewRequest,
    ReviewResult,
    Broadcast,
    Escalation,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Task => "task",
            MessageType::Question => "question",
            MessageType::Response => "response",
            MessageType::ReviewRequest => "review_request",
            MessageType::ReviewResult => "review_result",
            MessageType::Broadcast => "broadcast",
            MessageType::Escalation => "escalation",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle status.
///
/// The engine drives exactly one path: `Pending -> InProgress ->
/// Completed`. Claiming is recorded in `Task::claimed_by`, not as a
/// separate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review verdict. Closed set; parsed at the dispatch boundary, matched
/// exhaustively everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Approved,
    NeedsChanges,
    Rejected,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "APPROVED",
            Verdict::NeedsChanges => "NEEDS_CHANGES",
            Verdict::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Verdict::Approved),
            "NEEDS_CHANGES" => Ok(Verdict::NeedsChanges),
            "REJECTED" => Ok(Verdict::Rejected),
            other => Err(UnknownName {
                field: "verdict",
                value: other.to_string(),
            }),
        }
    }
}

/// A message exchanged between agents.
///
/// Immutable after creation except for the `read` flag. `to_agent: None`
/// encodes a broadcast to every role except the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Short unique token.
    pub id: String,

    /// Creation time. Messages are append-only and ordered by this.
    pub timestamp: DateTime<Utc>,

    pub from_agent: AgentRole,

    /// None means broadcast.
    #[serde(default)]
    pub to_agent: Option<AgentRole>,

    pub message_type: MessageType,

    pub content: String,

    #[serde(default)]
    pub priority: Priority,

    /// Message id this replies to. Existence is not enforced.
    #[serde(default)]
    pub in_reply_to: Option<String>,

    /// Set by `mark_read`; the only mutable field.
    #[serde(default)]
    pub read: bool,
}

impl Message {
    pub fn new(
        from_agent: AgentRole,
        to_agent: Option<AgentRole>,
        message_type: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: short_id(),
            timestamp: Utc::now(),
            from_agent,
            to_agent,
            message_type,
            content: content.into(),
            priority: Priority::Normal,
            in_reply_to: None,
            read: false,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.in_reply_to = Some(message_id.into());
        self
    }

    /// Whether this message lands in `agent`'s inbox: addressed to them
    /// or broadcast, and not their own.
    pub fn is_for(&self, agent: AgentRole) -> bool {
        let addressed = self.to_agent.map_or(true, |to| to == agent);
        addressed && self.from_agent != agent
    }
}

/// A unit of work agents can claim and complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Short unique token.
    pub id: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub title: String,
    pub description: String,

    pub status: TaskStatus,

    pub created_by: AgentRole,

    /// Advisory suggestion only; not enforced at claim time.
    #[serde(default)]
    pub assigned_to: Option<AgentRole>,

    /// Exclusive holder once set. Only the holder may complete or
    /// re-claim the task.
    #[serde(default)]
    pub claimed_by: Option<AgentRole>,

    /// Ids of tasks that must be completed before this one can be
    /// claimed. An id that resolves to nothing counts as unmet.
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub result: Option<String>,

    #[serde(default)]
    pub files_modified: Vec<String>,
}

impl Task {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        created_by: AgentRole,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: short_id(),
            created_at: now,
            updated_at: now,
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            created_by,
            assigned_to: None,
            claimed_by: None,
            dependencies: Vec::new(),
            result: None,
            files_modified: Vec::new(),
        }
    }

    pub fn with_assignee(mut self, agent: AgentRole) -> Self {
        self.assigned_to = Some(agent);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Bump `updated_at` after a mutation.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A request for one agent to review another's work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// Short unique token.
    pub id: String,

    pub timestamp: DateTime<Utc>,

    pub from_agent: AgentRole,

    /// The designated reviewer; the only role allowed to submit a
    /// verdict.
    pub to_agent: AgentRole,

    #[serde(default)]
    pub task_id: Option<String>,

    pub content: String,

    #[serde(default)]
    pub files: Vec<String>,

    /// Set exactly once, by `to_agent`.
    #[serde(default)]
    pub verdict: Option<Verdict>,

    #[serde(default)]
    pub feedback: Option<String>,
}

impl ReviewRequest {
    pub fn new(from_agent: AgentRole, to_agent: AgentRole, content: impl Into<String>) -> Self {
        Self {
            id: short_id(),
            timestamp: Utc::now(),
            from_agent,
            to_agent,
            task_id: None,
            content: content.into(),
            files: Vec::new(),
            verdict: None,
            feedback: None,
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.verdict.is_none()
    }
}

/// An open vote. The topic is the unique lookup key among active votes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub topic: String,

    /// Valid choices, in presentation order.
    pub options: Vec<String>,

    /// role name -> chosen option. One entry per agent; a later cast
    /// overwrites.
    #[serde(default)]
    pub votes: BTreeMap<String, String>,

    /// Advisory; the engine never closes votes on its own.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,

    /// Aggregated outcome, left for the caller to compute and record.
    #[serde(default)]
    pub result: Option<String>,
}

impl Vote {
    pub fn new(topic: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            topic: topic.into(),
            options,
            votes: BTreeMap::new(),
            deadline: None,
            result: None,
        }
    }

    pub fn has_option(&self, choice: &str) -> bool {
        self.options.iter().any(|o| o == choice)
    }
}

/// The entire persisted document: single source of truth for one
/// working directory, exclusively owned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Short unique token.
    pub session_id: String,

    pub started_at: DateTime<Utc>,

    #[serde(default)]
    pub initial_prompt: Option<String>,

    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub reviews: Vec<ReviewRequest>,

    /// Shared key-value blob, last-write-wins. BTreeMap keeps the
    /// serialized document deterministic.
    #[serde(default)]
    pub context: BTreeMap<String, String>,

    #[serde(default)]
    pub active_votes: Vec<Vote>,

    #[serde(default)]
    pub human_intervention_requested: bool,

    #[serde(default)]
    pub escalation_reason: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            session_id: short_id(),
            started_at: Utc::now(),
            initial_prompt: None,
            messages: Vec::new(),
            tasks: Vec::new(),
            reviews: Vec::new(),
            context: BTreeMap::new(),
            active_votes: Vec::new(),
            human_intervention_requested: false,
            escalation_reason: None,
        }
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    pub fn vote(&self, topic: &str) -> Option<&Vote> {
        self.active_votes.iter().find(|v| v.topic == topic)
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
