//! Team and member types.

use serde::{Deserialize, Serialize};

/// A team as listed by `GET /api/teams`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub config_path: String,
    #[serde(default)]
    pub lead_agent_id: String,
    #[serde(default)]
    pub member_count: u32,
}

/// An agent that belongs to a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub team_id: i64,
    pub name: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub agent_type: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub cwd: String,
}

/// Team detail returned by `GET /api/teams/{name}`, including members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDetail {
    #[serde(flatten)]
    pub team: Team,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl TeamDetail {
    /// Find a member by name.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Whether `name` is the lead of this team.
    pub fn is_lead(&self, name: &str) -> bool {
        self.member(name)
            .map(|m| !m.agent_id.is_empty() && m.agent_id == self.team.lead_agent_id)
            .unwrap_or(false)
    }
}
