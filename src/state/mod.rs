//! Persistent conversation state: data model, JSON document store, and
//! the human-readable transcript.

pub mod store;
pub mod transcript;
pub mod types;

pub use store::{StateStore, StoreError, StoreResult};
pub use transcript::Transcript;
pub use types::{
    AgentRole, ConversationState, Message, MessageType, Priority, ReviewRequest, Task,
    TaskStatus, UnknownName, Verdict, Vote,
};
