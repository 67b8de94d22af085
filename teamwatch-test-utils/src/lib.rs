//! Teamwatch Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Fixtures for teams, members, messages, tasks and stats
//! - Proptest generators for wire types
//! - Re-exported in-process doubles (scripted push transport, manual clock,
//!   memory session store)

pub use teamwatch_sync::{
    ManualClock, MemorySessionStore, ResultCache, ScriptedServer, ScriptedTransport,
};

pub use teamwatch_core::{
    FlowEdge, Member, Message, MessageFlow, MessagePage, MessageType, Stats, Task, TaskStatus,
    Team, TeamDetail, TimelineEntry,
};

use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    pub fn team(id: i64, name: &str) -> Team {
        Team {
            id,
            name: name.to_string(),
            description: format!("{} team", name),
            created_at: Some("2026-01-05T09:00:00Z".to_string()),
            config_path: format!("~/.claude/teams/{}/config.json", name),
            lead_agent_id: format!("team-lead@{}", name),
            member_count: 2,
        }
    }

    pub fn member(id: i64, team_id: i64, name: &str, agent_id: &str) -> Member {
        Member {
            id,
            team_id,
            name: name.to_string(),
            agent_id: agent_id.to_string(),
            agent_type: "general-purpose".to_string(),
            model: "default".to_string(),
            color: "blue".to_string(),
            cwd: "/workspace".to_string(),
        }
    }

    /// Team with a lead and one worker.
    pub fn team_detail(id: i64, name: &str) -> TeamDetail {
        let team = team(id, name);
        let lead = member(id * 10, id, "team-lead", &team.lead_agent_id);
        let worker = member(id * 10 + 1, id, "worker", &format!("worker@{}", name));
        TeamDetail {
            team,
            members: vec![lead, worker],
        }
    }

    pub fn message(id: i64, team_id: i64, from: &str, to: &str, kind: MessageType) -> Message {
        Message {
            id,
            team_id,
            inbox_owner: to.to_string(),
            from_agent: from.to_string(),
            text: format!("message {}", id),
            summary: format!("summary {}", id),
            timestamp: format!("2026-01-05T09:{:02}:00Z", id % 60),
            color: String::new(),
            read: false,
            msg_type: kind.as_str().to_string(),
        }
    }

    pub fn task(id: i64, team_id: i64, status: TaskStatus) -> Task {
        Task {
            id,
            team_id,
            task_id: id.to_string(),
            subject: format!("task {}", id),
            description: String::new(),
            status: status.as_str().to_string(),
            active_form: String::new(),
            owner: "worker".to_string(),
            blocks: Vec::new(),
            blocked_by: Vec::new(),
        }
    }

    pub fn page(items: Vec<Message>, page: u32, size: u32, total: u64) -> MessagePage {
        MessagePage {
            total,
            page,
            size,
            items,
        }
    }

    pub fn stats(teams: u64, messages: u64) -> Stats {
        Stats {
            team_count: teams,
            member_count: teams * 2,
            message_count: messages,
            task_count: 4,
            completed_count: 1,
            completion_rate: 25.0,
        }
    }

    pub fn flow(team_name: &str) -> MessageFlow {
        let mut types = BTreeMap::new();
        types.insert("normal".to_string(), 3);
        MessageFlow {
            team_name: team_name.to_string(),
            members: vec!["team-lead".to_string(), "worker".to_string()],
            flows: vec![FlowEdge {
                from: "team-lead".to_string(),
                to: "worker".to_string(),
                count: 3,
                types: types.clone(),
            }],
            timeline: vec![TimelineEntry {
                from: "team-lead".to_string(),
                to: "worker".to_string(),
                msg_type: "normal".to_string(),
                summary: "kickoff".to_string(),
                timestamp: "2026-01-05T09:00:00Z".to_string(),
            }],
            type_stats: types,
            mermaid: "sequenceDiagram".to_string(),
        }
    }

    /// Cache backed by a memory session store and a manual clock at the
    /// epoch. Returns the clock so tests can move time.
    pub fn manual_cache() -> (Arc<ResultCache>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let cache = ResultCache::new(Arc::new(MemorySessionStore::new()), clock.clone());
        (Arc::new(cache), clock)
    }

    /// JSON text of a push event.
    pub fn push_event(kind: &str) -> String {
        serde_json::json!({ "type": kind }).to_string()
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for wire types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,15}"
    }

    pub fn arb_message_type() -> impl Strategy<Value = MessageType> {
        prop::sample::select(MessageType::ALL.to_vec())
    }

    pub fn arb_task_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::InProgress),
            Just(TaskStatus::Completed),
            Just(TaskStatus::Deleted),
        ]
    }

    pub fn arb_team() -> impl Strategy<Value = Team> {
        (1i64..10_000, arb_name()).prop_map(|(id, name)| fixtures::team(id, &name))
    }

    pub fn arb_message() -> impl Strategy<Value = Message> {
        (1i64..10_000, arb_name(), arb_name(), arb_message_type())
            .prop_map(|(id, from, to, kind)| fixtures::message(id, 1, &from, &to, kind))
    }

    pub fn arb_task() -> impl Strategy<Value = Task> {
        (1i64..10_000, arb_task_status()).prop_map(|(id, status)| fixtures::task(id, 1, status))
    }

    /// TTLs from one millisecond up to a day.
    pub fn arb_ttl_ms() -> impl Strategy<Value = u64> {
        1u64..86_400_000
    }

    /// Mixed push frames: valid events, other event types and junk.
    pub fn arb_push_frame() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(fixtures::push_event("update")),
            arb_name().prop_map(|kind| fixtures::push_event(&kind)),
            Just("not json".to_string()),
            Just("[]".to_string()),
            Just(r#"{"type": 1}"#.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_team_detail_lead_is_member() {
        let detail = fixtures::team_detail(1, "alpha");
        assert!(detail.is_lead("team-lead"));
        assert!(!detail.is_lead("worker"));
    }

    #[test]
    fn test_manual_cache_expires_on_clock() {
        let (cache, clock) = fixtures::manual_cache();
        cache.set("k", 1u8, std::time::Duration::from_millis(10));
        clock.advance_ms(10);
        assert!(cache.get::<u8>("k").is_none());
    }

    proptest! {
        #[test]
        fn generated_tasks_keep_status(task in generators::arb_task()) {
            prop_assert!(task.status().is_some());
        }
    }
}
