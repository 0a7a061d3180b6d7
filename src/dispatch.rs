//! Operation dispatch contract
//!
//! The protocol adapter (out of tree) deserializes each remote call into
//! an [`Op`] and hands it to [`dispatch`] together with the calling
//! role. The operation set is a closed tagged union: an unknown
//! operation name or an out-of-set role/status/priority/type name fails
//! at deserialization, before it can reach the engine. Every variant
//! maps 1:1 onto one engine method.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::{CoordinationEngine, Decision, Rejection, RejectionKind, StatusReport};
use crate::state::store::StoreResult;
use crate::state::types::{
    AgentRole, Message, MessageType, Priority, ReviewRequest, Task, TaskStatus, Verdict, Vote,
};

fn default_true() -> bool {
    true
}

fn default_limit() -> usize {
    50
}

fn default_message_type() -> MessageType {
    MessageType::Response
}

/// A message target: a concrete role, or `"broadcast"` for everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Broadcast,
    Role(AgentRole),
}

impl Recipient {
    /// Broadcast encodes as an absent recipient on the wire document.
    pub fn target(self) -> Option<AgentRole> {
        match self {
            Recipient::Broadcast => None,
            Recipient::Role(role) => Some(role),
        }
    }
}

impl<'de> Deserialize<'de> for Recipient {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        if name == "broadcast" {
            return Ok(Recipient::Broadcast);
        }
        name.parse()
            .map(Recipient::Role)
            .map_err(serde::de::Error::custom)
    }
}

/// The closed set of coordination operations.
///
/// Field names and defaults match the remote tool schemas: `priority`
/// defaults to normal, `message_type` to response, `unread_only` to
/// true, `limit` to 50.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    SendMessage {
        to_agent: Recipient,
        content: String,
        #[serde(default = "default_message_type")]
        message_type: MessageType,
        #[serde(default)]
        priority: Priority,
        #[serde(default)]
        in_reply_to: Option<String>,
    },
    GetInbox {
        #[serde(default = "default_true")]
        unread_only: bool,
    },
    MarkRead {
        message_id: String,
    },
    GetConversation {
        #[serde(default = "default_limit")]
        limit: usize,
    },
    CreateTask {
        title: String,
        description: String,
        #[serde(default)]
        assigned_to: Option<AgentRole>,
        #[serde(default)]
        dependencies: Vec<String>,
    },
    ClaimTask {
        task_id: String,
    },
    CompleteTask {
        task_id: String,
        result: String,
        #[serde(default)]
        files_modified: Vec<String>,
    },
    GetTasks {
        #[serde(default)]
        status: Option<TaskStatus>,
        #[serde(default)]
        assigned_to: Option<AgentRole>,
    },
    RequestReview {
        to_agent: AgentRole,
        content: String,
        #[serde(default)]
        task_id: Option<String>,
        #[serde(default)]
        files: Vec<String>,
    },
    SubmitReview {
        review_id: String,
        verdict: Verdict,
        feedback: String,
    },
    GetPendingReviews,
    SetContext {
        key: String,
        value: String,
    },
    GetContext {
        #[serde(default)]
        key: Option<String>,
    },
    AppendContext {
        key: String,
        value: String,
    },
    CreateVote {
        topic: String,
        options: Vec<String>,
    },
    CastVote {
        topic: String,
        choice: String,
    },
    StartSession {
        prompt: String,
    },
    GetStatus,
    Escalate {
        reason: String,
    },
    Reset,
}

/// Result of a dispatched operation, serializable back to the adapter.
/// Gated refusals come back as [`Reply::Rejected`], not as errors.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reply {
    MessageSent { message_id: String },
    Inbox { agent: AgentRole, messages: Vec<Message> },
    MarkedRead { message_id: String },
    Conversation { messages: Vec<Message> },
    TaskCreated { task: Task },
    Task { task: Task },
    Tasks { tasks: Vec<Task> },
    ReviewRequested { review_id: String },
    Review { review: ReviewRequest },
    PendingReviews { reviews: Vec<ReviewRequest> },
    ContextSet { key: String },
    ContextValue { key: String, value: Option<String> },
    ContextAll { context: BTreeMap<String, String> },
    Vote { vote: Vote },
    SessionStarted { session_id: String },
    Status { status: StatusReport },
    Escalated,
    ResetDone { session_id: String },
    Rejected { kind: RejectionKind, rejection: Rejection },
}

impl Reply {
    fn rejected(rejection: Rejection) -> Self {
        Reply::Rejected {
            kind: rejection.kind(),
            rejection,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Reply::Rejected { .. })
    }
}

fn decide<T>(decision: Decision<T>, accept: impl FnOnce(T) -> Reply) -> Reply {
    match decision {
        Decision::Accepted(value) => accept(value),
        Decision::Rejected(rejection) => Reply::rejected(rejection),
    }
}

/// Route one operation to the engine on behalf of `caller`. The match
/// is exhaustive; adding an operation without wiring it is a compile
/// error.
pub fn dispatch(
    engine: &mut CoordinationEngine,
    caller: AgentRole,
    op: Op,
) -> StoreResult<Reply> {
    match op {
        Op::SendMessage {
            to_agent,
            content,
            message_type,
            priority,
            in_reply_to,
        } => {
            let msg = engine.send_message(
                caller,
                to_agent.target(),
                content,
                message_type,
                priority,
                in_reply_to,
            )?;
            Ok(Reply::MessageSent { message_id: msg.id })
        }
        Op::GetInbox { unread_only } => Ok(Reply::Inbox {
            agent: caller,
            messages: engine.inbox(caller, unread_only)?,
        }),
        Op::MarkRead { message_id } => {
            engine.mark_read(&message_id, caller)?;
            Ok(Reply::MarkedRead { message_id })
        }
        Op::GetConversation { limit } => Ok(Reply::Conversation {
            messages: engine.conversation(limit)?,
        }),
        Op::CreateTask {
            title,
            description,
            assigned_to,
            dependencies,
        } => {
            let task = engine.create_task(title, description, caller, assigned_to, dependencies)?;
            Ok(Reply::TaskCreated { task })
        }
        Op::ClaimTask { task_id } => Ok(decide(
            engine.claim_task(&task_id, caller)?,
            |task| Reply::Task { task },
        )),
        Op::CompleteTask {
            task_id,
            result,
            files_modified,
        } => Ok(decide(
            engine.complete_task(&task_id, caller, result, files_modified)?,
            |task| Reply::Task { task },
        )),
        Op::GetTasks {
            status,
            assigned_to,
        } => Ok(Reply::Tasks {
            tasks: engine.tasks(status, assigned_to)?,
        }),
        Op::RequestReview {
            to_agent,
            content,
            task_id,
            files,
        } => {
            let review = engine.request_review(caller, to_agent, content, task_id, files)?;
            Ok(Reply::ReviewRequested {
                review_id: review.id,
            })
        }
        Op::SubmitReview {
            review_id,
            verdict,
            feedback,
        } => Ok(decide(
            engine.submit_review(&review_id, caller, verdict, feedback)?,
            |review| Reply::Review { review },
        )),
        Op::GetPendingReviews => Ok(Reply::PendingReviews {
            reviews: engine.pending_reviews(caller)?,
        }),
        Op::SetContext { key, value } => {
            engine.set_context(key.clone(), value)?;
            Ok(Reply::ContextSet { key })
        }
        Op::GetContext { key } => match key {
            Some(key) => {
                let value = engine.context(&key)?;
                Ok(Reply::ContextValue { key, value })
            }
            None => Ok(Reply::ContextAll {
                context: engine.all_context()?,
            }),
        },
        Op::AppendContext { key, value } => {
            engine.append_context(key.clone(), &value)?;
            Ok(Reply::ContextSet { key })
        }
        Op::CreateVote { topic, options } => Ok(decide(
            engine.create_vote(topic, options)?,
            |vote| Reply::Vote { vote },
        )),
        Op::CastVote { topic, choice } => Ok(decide(
            engine.cast_vote(&topic, caller, &choice)?,
            |vote| Reply::Vote { vote },
        )),
        Op::StartSession { prompt } => {
            engine.set_initial_prompt(prompt)?;
            Ok(Reply::SessionStarted {
                session_id: engine.session_id()?,
            })
        }
        Op::GetStatus => Ok(Reply::Status {
            status: engine.status()?,
        }),
        Op::Escalate { reason } => {
            engine.escalate(caller, reason)?;
            Ok(Reply::Escalated)
        }
        Op::Reset => {
            engine.reset()?;
            Ok(Reply::ResetDone {
                session_id: engine.session_id()?,
            })
        }
    }
}
