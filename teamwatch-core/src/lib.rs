//! Teamwatch Core - Dashboard Data Types
//!
//! Wire types exchanged with the team monitoring API. Pure data with a few
//! derived helpers; transport and synchronization live in other crates.

pub mod filter;
pub mod flow;
pub mod message;
pub mod stats;
pub mod task;
pub mod team;

pub use filter::{MessageFilter, TaskFilter, TeamMessageFilter};
pub use flow::{FlowEdge, MessageFlow, TimelineEntry};
pub use message::{Message, MessagePage, MessageType};
pub use stats::Stats;
pub use task::{Task, TaskBoard, TaskStatus};
pub use team::{Member, Team, TeamDetail};

/// Errors raised when decoding wire values into typed domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Unknown task status: {0}")]
    UnknownTaskStatus(String),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),
}
