//! Message flow analytics for one team.

use async_trait::async_trait;
use tokio::sync::watch;

use super::{describe, ChangeNotifier, Screen, ScreenContext};
use teamwatch_core::MessageFlow;
use teamwatch_sync::{ConnectionState, FetchOrchestrator, PushChannel};

pub struct MessageFlowScreen {
    team_name: String,
    /// Parameter is the optional agent filter.
    pub flow: FetchOrchestrator<Option<String>, MessageFlow>,
    push: PushChannel,
    changes: ChangeNotifier,
}

impl MessageFlowScreen {
    pub fn mount(ctx: &ScreenContext, team_name: &str) -> Self {
        let (api, team) = (ctx.api.clone(), team_name.to_string());
        let flow = FetchOrchestrator::mount(
            move |agent: Option<String>| {
                let (api, team) = (api.clone(), team.clone());
                async move { api.message_flow(&team, agent.as_deref()).await }
            },
            ctx.cache.clone(),
            ctx.options(MessageFlow::default()),
        );

        let push = ctx.connect();
        ctx.bridge().target(flow.clone()).attach(&push);

        let mut changes = ChangeNotifier::new();
        changes.watch(flow.subscribe());

        Self {
            team_name: team_name.to_string(),
            flow,
            push,
            changes,
        }
    }

    /// Restrict the flow to traffic involving `agent`; `None` clears it.
    pub async fn focus_agent(&self, agent: Option<String>) -> MessageFlow {
        let agent = agent.filter(|a| !a.trim().is_empty());
        self.flow.execute(agent).await
    }
}

#[async_trait]
impl Screen for MessageFlowScreen {
    fn name(&self) -> &'static str {
        "flow"
    }

    fn summary(&self) -> String {
        let state = self.flow.state();
        let busiest = state
            .data
            .busiest()
            .map(|edge| format!("{} -> {} ({})", edge.from, edge.to, edge.count))
            .unwrap_or_else(|| "none".to_string());
        format!(
            "flow {} | agent: {} | messages: {} | busiest: {}",
            self.team_name,
            self.flow.last_params().as_deref().unwrap_or("all"),
            describe(&state, |flow| flow.total_messages() as usize),
            busiest
        )
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.push.subscribe()
    }

    fn refresh(&self) {
        let _ = self.flow.start_refetch();
    }

    fn reconnect(&self) {
        self.push.reconnect();
    }

    async fn close(&self) {
        self.flow.unmount();
        self.push.close().await;
    }
}
