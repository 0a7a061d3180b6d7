//! Coordination engine
//!
//! Owns the single `ConversationState` document and exposes every
//! operation agents use: messaging, task lifecycle, reviews, shared
//! context, voting, escalation, and session management. Each operation
//! runs to completion in order: mutate, persist the whole document,
//! append to the transcript.
//!
//! Concurrency model: single writer. Wrap the engine in
//! [`SharedEngine`] and funnel every request through the lock; the
//! engine performs no cross-process coordination over the backing
//! store, so run one engine process per working directory.

pub mod error;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::state::store::{StateStore, StoreResult};
use crate::state::types::{
    AgentRole, Message, MessageType, Priority, ReviewRequest, Task, TaskStatus, Verdict, Vote,
};

pub use error::{Decision, Rejection, RejectionKind};

/// Shared single-writer handle to the engine.
pub type SharedEngine = Arc<Mutex<CoordinationEngine>>;

/// The coordination engine. One instance per working directory.
pub struct CoordinationEngine {
    store: StateStore,
    config: EngineConfig,
}

impl CoordinationEngine {
    pub fn new(config: EngineConfig) -> Self {
        let store = StateStore::from_config(&config);
        Self { store, config }
    }

    /// Convenience constructor for a bare state directory.
    pub fn with_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        Self::new(EngineConfig {
            state_dir: state_dir.into(),
            ..EngineConfig::default()
        })
    }

    /// Wrap in the single-writer handle.
    pub fn shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    /// Load or create the state document. Idempotent; must be called
    /// before any other operation.
    pub fn initialize(&mut self) -> StoreResult<()> {
        let state = self.store.initialize()?;
        tracing::info!(session_id = %state.session_id, "coordination engine ready");
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session_id(&self) -> StoreResult<String> {
        Ok(self.store.state()?.session_id.clone())
    }

    // ========================================================================
    // Messaging
    // ========================================================================

    /// Append a new message. `to = None` broadcasts to every role
    /// except the sender. Always succeeds structurally: neither the
    /// recipient nor `in_reply_to` is checked against anything.
    pub fn send_message(
        &mut self,
        from: AgentRole,
        to: Option<AgentRole>,
        content: impl Into<String>,
        message_type: MessageType,
        priority: Priority,
        in_reply_to: Option<String>,
    ) -> StoreResult<Message> {
        let mut msg = Message::new(from, to, message_type, content).with_priority(priority);
        msg.in_reply_to = in_reply_to;

        self.store.state_mut()?.messages.push(msg.clone());
        self.store.persist()?;
        self.store.transcript().log_message(&msg)?;

        tracing::debug!(
            id = %msg.id,
            from = %from,
            to = to.map(|t| t.as_str()).unwrap_or("ALL"),
            kind = %message_type,
            "message sent"
        );
        Ok(msg)
    }

    /// Messages addressed to `agent` (directly or by broadcast), oldest
    /// first, excluding the agent's own. Read flags are untouched; use
    /// `mark_read` for that.
    pub fn inbox(&self, agent: AgentRole, unread_only: bool) -> StoreResult<Vec<Message>> {
        let state = self.store.state()?;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.is_for(agent) && (!unread_only || !m.read))
            .cloned()
            .collect())
    }

    /// Flag a message as read. Unknown ids are a silent no-op, matching
    /// messaging's no-validation stance.
    pub fn mark_read(&mut self, message_id: &str, agent: AgentRole) -> StoreResult<()> {
        let found = {
            let state = self.store.state_mut()?;
            match state.messages.iter_mut().find(|m| m.id == message_id) {
                Some(msg) => {
                    msg.read = true;
                    true
                }
                None => false,
            }
        };
        if found {
            self.store.persist()?;
            tracing::debug!(id = %message_id, reader = %agent, "message marked read");
        }
        Ok(())
    }

    /// The most recent `limit` messages across all agents, in
    /// chronological order.
    pub fn conversation(&self, limit: usize) -> StoreResult<Vec<Message>> {
        let messages = &self.store.state()?.messages;
        let skip = messages.len().saturating_sub(limit);
        Ok(messages[skip..].to_vec())
    }

    // ========================================================================
    // Task lifecycle
    // ========================================================================

    /// Create a pending task. Dependency ids and the assignee are taken
    /// as given; they gate claiming, not creation.
    pub fn create_task(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        created_by: AgentRole,
        assigned_to: Option<AgentRole>,
        dependencies: Vec<String>,
    ) -> StoreResult<Task> {
        let mut task = Task::new(title, description, created_by).with_dependencies(dependencies);
        task.assigned_to = assigned_to;

        self.store.state_mut()?.tasks.push(task.clone());
        self.store.persist()?;
        self.store.transcript().log_task_created(&task)?;

        tracing::info!(id = %task.id, title = %task.title, by = %created_by, "task created");
        Ok(task)
    }

    /// Claim a task exclusively. Refused when the task is unknown, held
    /// by another agent, or any dependency does not resolve to a
    /// completed task (the gate is re-evaluated on every attempt).
    /// Re-claiming by the current holder is an idempotent success.
    pub fn claim_task(&mut self, task_id: &str, agent: AgentRole) -> StoreResult<Decision<Task>> {
        {
            let state = self.store.state()?;
            let Some(task) = state.task(task_id) else {
                return Ok(Decision::Rejected(Rejection::TaskNotFound {
                    task_id: task_id.to_string(),
                }));
            };

            if let Some(holder) = task.claimed_by {
                if holder != agent {
                    return Ok(Decision::Rejected(Rejection::ClaimHeld {
                        task_id: task_id.to_string(),
                        held_by: holder,
                    }));
                }
                if task.status == TaskStatus::InProgress {
                    // Already holds the claim; nothing to transition.
                    return Ok(Decision::Accepted(task.clone()));
                }
            }

            for dep_id in &task.dependencies {
                let completed = state
                    .task(dep_id)
                    .map_or(false, |dep| dep.status == TaskStatus::Completed);
                if !completed {
                    return Ok(Decision::Rejected(Rejection::DependencyUnmet {
                        task_id: task_id.to_string(),
                        dependency: dep_id.clone(),
                    }));
                }
            }
        }

        let task = {
            let state = self.store.state_mut()?;
            let task = state.task_mut(task_id).expect("existence checked above");
            task.claimed_by = Some(agent);
            task.status = TaskStatus::InProgress;
            task.touch();
            task.clone()
        };
        self.store.persist()?;
        self.store.transcript().log_task_claimed(&task, agent)?;

        tracing::info!(id = %task_id, by = %agent, "task claimed");
        Ok(Decision::Accepted(task))
    }

    /// Complete a task. Only the claim holder may do this; a task that
    /// was never claimed cannot be completed by anyone.
    pub fn complete_task(
        &mut self,
        task_id: &str,
        agent: AgentRole,
        result: impl Into<String>,
        files_modified: Vec<String>,
    ) -> StoreResult<Decision<Task>> {
        {
            let state = self.store.state()?;
            let Some(task) = state.task(task_id) else {
                return Ok(Decision::Rejected(Rejection::TaskNotFound {
                    task_id: task_id.to_string(),
                }));
            };
            if task.claimed_by != Some(agent) {
                return Ok(Decision::Rejected(Rejection::NotClaimant {
                    task_id: task_id.to_string(),
                    agent,
                }));
            }
        }

        let task = {
            let state = self.store.state_mut()?;
            let task = state.task_mut(task_id).expect("existence checked above");
            task.status = TaskStatus::Completed;
            task.result = Some(result.into());
            task.files_modified = files_modified;
            task.touch();
            task.clone()
        };
        self.store.persist()?;
        self.store.transcript().log_task_completed(&task, agent)?;

        tracing::info!(id = %task_id, by = %agent, "task completed");
        Ok(Decision::Accepted(task))
    }

    /// Look up a task by id.
    pub fn task(&self, task_id: &str) -> StoreResult<Option<Task>> {
        Ok(self.store.state()?.task(task_id).cloned())
    }

    /// Tasks, optionally filtered by status and/or advisory assignee.
    pub fn tasks(
        &self,
        status: Option<TaskStatus>,
        assigned_to: Option<AgentRole>,
    ) -> StoreResult<Vec<Task>> {
        let state = self.store.state()?;
        Ok(state
            .tasks
            .iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .filter(|t| assigned_to.map_or(true, |a| t.assigned_to == Some(a)))
            .cloned()
            .collect())
    }

    // ========================================================================
    // Review workflow
    // ========================================================================

    /// Record a review request and notify the reviewer with a
    /// high-priority message.
    pub fn request_review(
        &mut self,
        from: AgentRole,
        to: AgentRole,
        content: impl Into<String>,
        task_id: Option<String>,
        files: Vec<String>,
    ) -> StoreResult<ReviewRequest> {
        let mut review = ReviewRequest::new(from, to, content).with_files(files);
        review.task_id = task_id;

        self.store.state_mut()?.reviews.push(review.clone());
        self.store.persist()?;

        self.send_message(
            from,
            Some(to),
            format!("[REVIEW REQUEST {}]\n\n{}", review.id, review.content),
            MessageType::ReviewRequest,
            Priority::High,
            None,
        )?;

        tracing::info!(id = %review.id, from = %from, reviewer = %to, "review requested");
        Ok(review)
    }

    /// Submit a verdict. Only the designated reviewer may submit, and
    /// only once; the requester gets a `review_result` message back.
    pub fn submit_review(
        &mut self,
        review_id: &str,
        agent: AgentRole,
        verdict: Verdict,
        feedback: impl Into<String>,
    ) -> StoreResult<Decision<ReviewRequest>> {
        {
            let state = self.store.state()?;
            let Some(review) = state.reviews.iter().find(|r| r.id == review_id) else {
                return Ok(Decision::Rejected(Rejection::ReviewNotFound {
                    review_id: review_id.to_string(),
                }));
            };
            if review.to_agent != agent {
                return Ok(Decision::Rejected(Rejection::NotReviewer {
                    review_id: review_id.to_string(),
                    agent,
                }));
            }
            if review.verdict.is_some() {
                return Ok(Decision::Rejected(Rejection::VerdictAlreadySet {
                    review_id: review_id.to_string(),
                }));
            }
        }

        let feedback = feedback.into();
        let review = {
            let state = self.store.state_mut()?;
            let review = state
                .reviews
                .iter_mut()
                .find(|r| r.id == review_id)
                .expect("existence checked above");
            review.verdict = Some(verdict);
            review.feedback = Some(feedback.clone());
            review.clone()
        };
        self.store.persist()?;

        self.send_message(
            agent,
            Some(review.from_agent),
            format!(
                "[REVIEW RESULT {}]\n\n**Verdict:** {}\n\n{}",
                review_id, verdict, feedback
            ),
            MessageType::ReviewResult,
            Priority::High,
            None,
        )?;

        tracing::info!(id = %review_id, reviewer = %agent, verdict = %verdict, "review submitted");
        Ok(Decision::Accepted(review))
    }

    /// Reviews addressed to `agent` that have no verdict yet.
    pub fn pending_reviews(&self, agent: AgentRole) -> StoreResult<Vec<ReviewRequest>> {
        let state = self.store.state()?;
        Ok(state
            .reviews
            .iter()
            .filter(|r| r.to_agent == agent && r.is_pending())
            .cloned()
            .collect())
    }

    // ========================================================================
    // Shared context
    // ========================================================================

    /// Set a context value, last write wins.
    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<String>) -> StoreResult<()> {
        self.store
            .state_mut()?
            .context
            .insert(key.into(), value.into());
        self.store.persist()
    }

    pub fn context(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.store.state()?.context.get(key).cloned())
    }

    /// Newline-join `value` onto the existing entry, or set it when the
    /// key is absent.
    pub fn append_context(&mut self, key: impl Into<String>, value: &str) -> StoreResult<()> {
        let key = key.into();
        let state = self.store.state_mut()?;
        match state.context.get_mut(&key) {
            Some(existing) if !existing.is_empty() => {
                existing.push('\n');
                existing.push_str(value);
            }
            _ => {
                state.context.insert(key, value.to_string());
            }
        }
        self.store.persist()
    }

    pub fn all_context(&self) -> StoreResult<std::collections::BTreeMap<String, String>> {
        Ok(self.store.state()?.context.clone())
    }

    // ========================================================================
    // Voting
    // ========================================================================

    /// Open a vote. The topic is a true unique key: a second vote on an
    /// existing topic is refused rather than silently shadowing the
    /// first. Broadcasts a notification from the orchestrator role.
    pub fn create_vote(
        &mut self,
        topic: impl Into<String>,
        options: Vec<String>,
    ) -> StoreResult<Decision<Vote>> {
        let topic = topic.into();
        if self.store.state()?.vote(&topic).is_some() {
            return Ok(Decision::Rejected(Rejection::DuplicateTopic { topic }));
        }

        let vote = Vote::new(topic, options);
        self.store.state_mut()?.active_votes.push(vote.clone());
        self.store.persist()?;

        self.send_message(
            AgentRole::orchestrator(),
            None,
            format!(
                "[VOTE] {}\n\nOptions: {}\n\nPlease vote!",
                vote.topic,
                vote.options.join(", ")
            ),
            MessageType::Broadcast,
            Priority::Normal,
            None,
        )?;

        tracing::info!(topic = %vote.topic, "vote opened");
        Ok(Decision::Accepted(vote))
    }

    /// Cast (or overwrite) an agent's vote. Refused for unknown topics
    /// and for choices outside the vote's options. No tally or closure
    /// happens here.
    pub fn cast_vote(
        &mut self,
        topic: &str,
        agent: AgentRole,
        choice: &str,
    ) -> StoreResult<Decision<Vote>> {
        {
            let state = self.store.state()?;
            let Some(vote) = state.vote(topic) else {
                return Ok(Decision::Rejected(Rejection::VoteNotFound {
                    topic: topic.to_string(),
                }));
            };
            if !vote.has_option(choice) {
                return Ok(Decision::Rejected(Rejection::InvalidChoice {
                    topic: topic.to_string(),
                    choice: choice.to_string(),
                }));
            }
        }

        let vote = {
            let state = self.store.state_mut()?;
            let vote = state
                .active_votes
                .iter_mut()
                .find(|v| v.topic == topic)
                .expect("existence checked above");
            vote.votes
                .insert(agent.as_str().to_string(), choice.to_string());
            vote.clone()
        };
        self.store.persist()?;

        tracing::debug!(topic = %topic, voter = %agent, choice = %choice, "vote cast");
        Ok(Decision::Accepted(vote))
    }

    // ========================================================================
    // Escalation & session
    // ========================================================================

    /// Flag the session for human intervention and broadcast an urgent
    /// notice.
    pub fn escalate(&mut self, agent: AgentRole, reason: impl Into<String>) -> StoreResult<()> {
        let reason = reason.into();
        {
            let state = self.store.state_mut()?;
            state.human_intervention_requested = true;
            state.escalation_reason = Some(reason.clone());
        }
        self.store.persist()?;
        self.store.transcript().log_escalation(agent, &reason)?;

        self.send_message(
            agent,
            None,
            format!("[ESCALATION] Human intervention requested: {}", reason),
            MessageType::Escalation,
            Priority::Urgent,
            None,
        )?;

        tracing::warn!(by = %agent, reason = %reason, "escalated to human");
        Ok(())
    }

    /// Clear the escalation flag after a human has intervened.
    pub fn clear_escalation(&mut self) -> StoreResult<()> {
        {
            let state = self.store.state_mut()?;
            state.human_intervention_requested = false;
            state.escalation_reason = None;
        }
        self.store.persist()?;
        tracing::info!("escalation cleared");
        Ok(())
    }

    /// Record the session's seed prompt and write the session header to
    /// the transcript. Intended to be called once per session.
    pub fn set_initial_prompt(&mut self, prompt: impl Into<String>) -> StoreResult<()> {
        let prompt = prompt.into();
        self.store.state_mut()?.initial_prompt = Some(prompt.clone());
        self.store.persist()?;

        let state = self.store.state()?;
        self.store.transcript().log_session_start(state, &prompt)?;
        tracing::info!(session_id = %state.session_id, "session prompt recorded");
        Ok(())
    }

    /// Replace everything with a fresh empty session and delete the
    /// transcript. Irreversible.
    pub fn reset(&mut self) -> StoreResult<()> {
        let old = self.store.reset()?;
        let new_id = self.store.state()?.session_id.clone();
        tracing::warn!(old_session = %old.session_id, new_session = %new_id, "session reset");
        Ok(())
    }

    /// Read-only summary of the session, derived on demand.
    pub fn status(&self) -> StoreResult<StatusReport> {
        let state = self.store.state()?;

        let mut tasks = TaskCounts::default();
        for task in &state.tasks {
            match task.status {
                TaskStatus::Pending => tasks.pending += 1,
                TaskStatus::InProgress => tasks.in_progress += 1,
                TaskStatus::Completed => tasks.completed += 1,
            }
            tasks.total += 1;
        }

        Ok(StatusReport {
            session_id: state.session_id.clone(),
            started_at: state.started_at,
            message_count: state.messages.len(),
            tasks,
            pending_reviews: state.reviews.iter().filter(|r| r.is_pending()).count(),
            human_intervention_requested: state.human_intervention_requested,
            escalation_reason: state.escalation_reason.clone(),
        })
    }
}

/// Task tallies per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub total: usize,
}

/// Derived session summary for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub message_count: usize,
    pub tasks: TaskCounts,
    pub pending_reviews: usize,
    pub human_intervention_requested: bool,
    pub escalation_reason: Option<String>,
}
