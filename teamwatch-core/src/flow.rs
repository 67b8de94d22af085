//! Message flow analytics computed by the server.
//!
//! The client only consumes these; the aggregation and the diagram text are
//! produced server-side.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated traffic from one agent to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    pub count: u64,
    #[serde(default)]
    pub types: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub from: String,
    pub to: String,
    pub msg_type: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Response of `GET /api/teams/{name}/message-flow`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFlow {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub flows: Vec<FlowEdge>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub type_stats: BTreeMap<String, u64>,
    /// Sequence diagram source, rendered elsewhere.
    #[serde(default)]
    pub mermaid: String,
}

impl MessageFlow {
    /// Total number of messages represented by the flow edges.
    pub fn total_messages(&self) -> u64 {
        self.flows.iter().map(|f| f.count).sum()
    }

    /// Busiest edge, ties broken by first occurrence.
    pub fn busiest(&self) -> Option<&FlowEdge> {
        self.flows
            .iter()
            .fold(None, |best: Option<&FlowEdge>, edge| match best {
                Some(b) if b.count >= edge.count => Some(b),
                _ => Some(edge),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty() && self.timeline.is_empty()
    }
}
