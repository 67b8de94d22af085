//! Inter-agent message types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DomainError;

/// Kind of message exchanged between agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Normal,
    Idle,
    Shutdown,
    ShutdownRequest,
    ShutdownResponse,
    TaskAssignment,
    Broadcast,
    PlanApproval,
}

impl MessageType {
    pub const ALL: [MessageType; 8] = [
        MessageType::Normal,
        MessageType::Idle,
        MessageType::Shutdown,
        MessageType::ShutdownRequest,
        MessageType::ShutdownResponse,
        MessageType::TaskAssignment,
        MessageType::Broadcast,
        MessageType::PlanApproval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Normal => "normal",
            MessageType::Idle => "idle",
            MessageType::Shutdown => "shutdown",
            MessageType::ShutdownRequest => "shutdown_request",
            MessageType::ShutdownResponse => "shutdown_response",
            MessageType::TaskAssignment => "task_assignment",
            MessageType::Broadcast => "broadcast",
            MessageType::PlanApproval => "plan_approval",
        }
    }

    /// Shutdown handshake messages.
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self,
            MessageType::Shutdown | MessageType::ShutdownRequest | MessageType::ShutdownResponse
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::UnknownMessageType(s.to_string()))
    }
}

/// A message delivered to an agent inbox.
///
/// `msg_type` stays a string on the wire so that message kinds added by the
/// server do not break decoding; use [`Message::kind`] for the typed view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub team_id: i64,
    pub inbox_owner: String,
    pub from_agent: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default = "default_msg_type")]
    pub msg_type: String,
}

fn default_msg_type() -> String {
    MessageType::Normal.as_str().to_string()
}

impl Message {
    /// Typed message kind, `None` for kinds this client does not know.
    pub fn kind(&self) -> Option<MessageType> {
        self.msg_type.parse().ok()
    }
}

/// One page of team messages from `GET /api/teams/{name}/messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePage {
    pub total: u64,
    pub page: u32,
    pub size: u32,
    #[serde(default)]
    pub items: Vec<Message>,
}

impl MessagePage {
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.total.div_ceil(u64::from(self.size))
        }
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}
