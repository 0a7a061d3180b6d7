//! Gated outcomes for engine operations
//!
//! Rejections are expected, recoverable results the caller branches on;
//! they are returned as values, never as `Err`. Only store failures
//! (`StoreError`) travel the error channel.

use serde::Serialize;

use crate::state::types::AgentRole;

/// Why a gated operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    #[error("task {task_id} not found")]
    TaskNotFound { task_id: String },

    #[error("task {task_id} is claimed by {held_by}")]
    ClaimHeld { task_id: String, held_by: AgentRole },

    #[error("task {task_id} has an incomplete dependency {dependency}")]
    DependencyUnmet { task_id: String, dependency: String },

    #[error("task {task_id} is not claimed by {agent}")]
    NotClaimant { task_id: String, agent: AgentRole },

    #[error("review {review_id} not found")]
    ReviewNotFound { review_id: String },

    #[error("review {review_id} is not addressed to {agent}")]
    NotReviewer { review_id: String, agent: AgentRole },

    #[error("review {review_id} already has a verdict")]
    VerdictAlreadySet { review_id: String },

    #[error("no active vote on topic {topic:?}")]
    VoteNotFound { topic: String },

    #[error("a vote on topic {topic:?} already exists")]
    DuplicateTopic { topic: String },

    #[error("choice {choice:?} is not an option for vote {topic:?}")]
    InvalidChoice { topic: String, choice: String },
}

/// Coarse taxonomy for callers that only need to branch on class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    NotFound,
    Conflict,
    InvalidChoice,
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::TaskNotFound { .. }
            | Rejection::ReviewNotFound { .. }
            | Rejection::VoteNotFound { .. } => RejectionKind::NotFound,
            Rejection::ClaimHeld { .. }
            | Rejection::DependencyUnmet { .. }
            | Rejection::NotClaimant { .. }
            | Rejection::NotReviewer { .. }
            | Rejection::VerdictAlreadySet { .. }
            | Rejection::DuplicateTopic { .. } => RejectionKind::Conflict,
            Rejection::InvalidChoice { .. } => RejectionKind::InvalidChoice,
        }
    }
}

/// Result of a gated operation: either the mutated entity or the reason
/// it was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<T> {
    Accepted(T),
    Rejected(Rejection),
}

impl<T> Decision<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Rejected(_))
    }

    /// The accepted value, if any.
    pub fn accepted(self) -> Option<T> {
        match self {
            Decision::Accepted(value) => Some(value),
            Decision::Rejected(_) => None,
        }
    }

    /// The rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Decision::Accepted(_) => None,
            Decision::Rejected(rejection) => Some(rejection),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decision<U> {
        match self {
            Decision::Accepted(value) => Decision::Accepted(f(value)),
            Decision::Rejected(rejection) => Decision::Rejected(rejection),
        }
    }
}
