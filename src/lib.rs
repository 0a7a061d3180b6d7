//! Agora: shared-state coordination for autonomous multi-agent work
//!
//! Several independent agent processes collaborate on one task through
//! a single shared conversation document: they exchange messages,
//! create and claim tasks, request and submit reviews, share key-value
//! context, vote, and escalate to a human. This crate is the
//! coordination engine that owns that document and enforces the rules
//! that make the collaboration safe:
//!
//! - claim exclusivity: one agent holds a task at a time
//! - dependency gating: a task is claimable only once every dependency
//!   is completed
//! - review ownership: only the designated reviewer submits a verdict,
//!   and only once
//! - vote validity: unique topics, choices restricted to the declared
//!   options
//!
//! Expected gated outcomes come back as [`engine::Decision::Rejected`]
//! values the caller branches on; only storage failures are errors.
//!
//! # Usage
//!
//! ```no_run
//! use agora::{AgentRole, CoordinationEngine, EngineConfig};
//!
//! let mut engine = CoordinationEngine::new(EngineConfig::from_env());
//! engine.initialize()?;
//!
//! let task = engine.create_task("port the parser", "see notes", AgentRole::Claude, None, vec![])?;
//! let claimed = engine.claim_task(&task.id, AgentRole::Codex)?;
//! assert!(claimed.is_accepted());
//! # Ok::<(), agora::StoreError>(())
//! ```

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod state;

pub use config::EngineConfig;
pub use dispatch::{dispatch, Op, Recipient, Reply};
pub use engine::{
    CoordinationEngine, Decision, Rejection, RejectionKind, SharedEngine, StatusReport, TaskCounts,
};
pub use state::{
    AgentRole, ConversationState, Message, MessageType, Priority, ReviewRequest, StateStore,
    StoreError, StoreResult, Task, TaskStatus, Transcript, Verdict, Vote,
};
