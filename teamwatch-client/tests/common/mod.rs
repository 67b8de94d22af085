//! In-process dashboard API and context builders shared by the
//! integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use teamwatch_client::{DashboardApi, ScreenContext};
use teamwatch_core::{
    Message, MessageFilter, MessageFlow, MessagePage, Stats, Task, TaskFilter, Team, TeamDetail,
    TeamMessageFilter,
};
use teamwatch_sync::{FetchError, FetchOrchestrator, FetchState, PushConfig, ResultCache};
use teamwatch_test_utils::ScriptedTransport;

#[derive(Default)]
pub struct FakeData {
    pub teams: Vec<Team>,
    pub details: HashMap<String, TeamDetail>,
    pub messages: Vec<Message>,
    pub tasks: Vec<Task>,
    pub stats: Stats,
    pub flow: MessageFlow,
    pub stats_failure: Option<u16>,
}

/// Dashboard API answering from memory and counting calls per endpoint.
#[derive(Default)]
pub struct FakeApi {
    pub data: Mutex<FakeData>,
    calls: Mutex<BTreeMap<&'static str, usize>>,
}

impl FakeApi {
    pub fn new(data: FakeData) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(data),
            calls: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    pub fn update(&self, change: impl FnOnce(&mut FakeData)) {
        change(&mut self.data.lock().unwrap());
    }

    fn record(&self, endpoint: &'static str) {
        *self.calls.lock().unwrap().entry(endpoint).or_default() += 1;
    }
}

fn not_found() -> FetchError {
    FetchError::status(404, "Team not found")
}

#[async_trait]
impl DashboardApi for FakeApi {
    async fn teams(&self) -> Result<Vec<Team>, FetchError> {
        self.record("teams");
        Ok(self.data.lock().unwrap().teams.clone())
    }

    async fn team(&self, name: &str) -> Result<TeamDetail, FetchError> {
        self.record("team");
        self.data
            .lock()
            .unwrap()
            .details
            .get(name)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn team_messages(
        &self,
        name: &str,
        filter: &TeamMessageFilter,
    ) -> Result<MessagePage, FetchError> {
        self.record("team_messages");
        let data = self.data.lock().unwrap();
        let team = data.details.get(name).ok_or_else(not_found)?;
        let matching: Vec<Message> = data
            .messages
            .iter()
            .filter(|m| m.team_id == team.team.id)
            .filter(|m| filter.sender.as_ref().map_or(true, |s| &m.from_agent == s))
            .filter(|m| filter.msg_type.as_ref().map_or(true, |t| &m.msg_type == t))
            .cloned()
            .collect();
        let start = ((filter.page.max(1) - 1) * filter.size) as usize;
        let items = matching
            .iter()
            .skip(start)
            .take(filter.size as usize)
            .cloned()
            .collect();
        Ok(MessagePage {
            total: matching.len() as u64,
            page: filter.page,
            size: filter.size,
            items,
        })
    }

    async fn message_flow(
        &self,
        name: &str,
        agent: Option<&str>,
    ) -> Result<MessageFlow, FetchError> {
        self.record("message_flow");
        let mut flow = self.data.lock().unwrap().flow.clone();
        flow.team_name = name.to_string();
        if let Some(agent) = agent {
            flow.flows.retain(|edge| edge.from == agent || edge.to == agent);
            flow.timeline.retain(|entry| entry.from == agent || entry.to == agent);
        }
        Ok(flow)
    }

    async fn team_tasks(&self, name: &str) -> Result<Vec<Task>, FetchError> {
        self.record("team_tasks");
        let data = self.data.lock().unwrap();
        let team = data.details.get(name).ok_or_else(not_found)?;
        Ok(data
            .tasks
            .iter()
            .filter(|t| t.team_id == team.team.id)
            .cloned()
            .collect())
    }

    async fn messages(&self, filter: &MessageFilter) -> Result<Vec<Message>, FetchError> {
        self.record("messages");
        let data = self.data.lock().unwrap();
        let mut items: Vec<Message> = data
            .messages
            .iter()
            .filter(|m| filter.from_agent.as_ref().map_or(true, |f| &m.from_agent == f))
            .filter(|m| filter.msg_type.as_ref().map_or(true, |t| &m.msg_type == t))
            .filter(|m| filter.search.as_ref().map_or(true, |s| m.text.contains(s.as_str())))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            items.truncate(limit as usize);
        }
        Ok(items)
    }

    async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, FetchError> {
        self.record("tasks");
        let data = self.data.lock().unwrap();
        Ok(data
            .tasks
            .iter()
            .filter(|t| filter.status.as_ref().map_or(true, |s| &t.status == s))
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<Stats, FetchError> {
        self.record("stats");
        let data = self.data.lock().unwrap();
        match data.stats_failure {
            Some(status) => Err(FetchError::status(status, "stats unavailable")),
            None => Ok(data.stats.clone()),
        }
    }

    async fn sync(&self) -> Result<(), FetchError> {
        self.record("sync");
        Ok(())
    }
}

pub fn context(
    api: Arc<FakeApi>,
    transport: Arc<ScriptedTransport>,
    cache: Arc<ResultCache>,
) -> ScreenContext {
    ScreenContext {
        api,
        cache,
        transport,
        push: PushConfig::new("ws://localhost:8000/ws").unwrap(),
        refresh_on: vec!["update".to_string()],
        refresh_interval: None,
        default_ttl: Duration::from_secs(300),
    }
}

/// Wait until `fetch` is not loading and return its state.
pub async fn settled<P, T>(fetch: &FetchOrchestrator<P, T>) -> FetchState<T>
where
    P: Clone + Default + Send + Sync + 'static,
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let mut rx = fetch.subscribe();
    let state = rx.wait_for(|s| !s.loading).await.unwrap().clone();
    state
}

/// Wait until `fetch` state satisfies `done`.
pub async fn until<P, T>(fetch: &FetchOrchestrator<P, T>, done: impl FnMut(&FetchState<T>) -> bool)
where
    P: Clone + Default + Send + Sync + 'static,
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let mut rx = fetch.subscribe();
    tokio::time::timeout(Duration::from_secs(600), rx.wait_for(done))
        .await
        .expect("state reached in time")
        .unwrap();
}
