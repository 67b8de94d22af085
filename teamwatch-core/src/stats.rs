//! Aggregate dashboard statistics.

use serde::{Deserialize, Serialize};

/// Totals returned by `GET /api/stats`.
///
/// The server sends both the long field names and short aliases
/// (`teams`, `members`, `messages`, `task_completion`); the long ones win
/// when both are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStats")]
pub struct Stats {
    pub team_count: u64,
    pub member_count: u64,
    pub message_count: u64,
    pub task_count: u64,
    pub completed_count: u64,
    /// Percentage in `[0, 100]`, one decimal.
    pub completion_rate: f64,
}

#[derive(Deserialize)]
struct RawStats {
    team_count: Option<u64>,
    member_count: Option<u64>,
    message_count: Option<u64>,
    task_count: Option<u64>,
    completed_count: Option<u64>,
    completion_rate: Option<f64>,
    teams: Option<u64>,
    members: Option<u64>,
    messages: Option<u64>,
    task_completion: Option<f64>,
}

impl From<RawStats> for Stats {
    fn from(raw: RawStats) -> Self {
        Self {
            team_count: raw.team_count.or(raw.teams).unwrap_or(0),
            member_count: raw.member_count.or(raw.members).unwrap_or(0),
            message_count: raw.message_count.or(raw.messages).unwrap_or(0),
            task_count: raw.task_count.unwrap_or(0),
            completed_count: raw.completed_count.unwrap_or(0),
            completion_rate: raw.completion_rate.or(raw.task_completion).unwrap_or(0.0),
        }
    }
}

impl Stats {
    /// Completion percentage rounded for display.
    pub fn completion_percent(&self) -> u32 {
        self.completion_rate.clamp(0.0, 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accepts_server_payload() {
        let json = r#"{
            "team_count": 2, "member_count": 5, "message_count": 40,
            "task_count": 10, "completed_count": 4, "completion_rate": 40.0,
            "teams": 2, "members": 5, "messages": 40, "task_completion": 40.0
        }"#;
        let stats: Stats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.team_count, 2);
        assert_eq!(stats.task_count, 10);
        assert_eq!(stats.completion_percent(), 40);
    }

    #[test]
    fn test_stats_accepts_short_names() {
        let json = r#"{"teams": 1, "members": 3, "messages": 9, "task_completion": 66.7}"#;
        let stats: Stats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.member_count, 3);
        assert_eq!(stats.completion_percent(), 67);
    }

    #[test]
    fn test_stats_serialized_form_decodes_again() {
        let stats = Stats {
            team_count: 4,
            member_count: 8,
            message_count: 100,
            task_count: 12,
            completed_count: 6,
            completion_rate: 50.0,
        };
        let json = serde_json::to_string(&stats).unwrap();
        let back: Stats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
