//! Filtered message list across teams.

use async_trait::async_trait;
use tokio::sync::watch;

use super::{describe, ChangeNotifier, Screen, ScreenContext};
use teamwatch_core::{Message, MessageFilter};
use teamwatch_sync::{ConnectionState, FetchOrchestrator, PushChannel};

pub struct MessagesScreen {
    pub messages: FetchOrchestrator<MessageFilter, Vec<Message>>,
    push: PushChannel,
    changes: ChangeNotifier,
}

impl MessagesScreen {
    pub fn mount(ctx: &ScreenContext, filter: MessageFilter) -> Self {
        let api = ctx.api.clone();
        let messages = FetchOrchestrator::mount_with(
            move |filter: MessageFilter| {
                let api = api.clone();
                async move { api.messages(&filter).await }
            },
            ctx.cache.clone(),
            ctx.options(Vec::new()),
            filter.normalized(),
        );

        let push = ctx.connect();
        ctx.bridge().target(messages.clone()).attach(&push);

        let mut changes = ChangeNotifier::new();
        changes.watch(messages.subscribe());

        Self {
            messages,
            push,
            changes,
        }
    }

    pub async fn apply_filter(&self, filter: MessageFilter) -> Vec<Message> {
        self.messages.execute(filter.normalized()).await
    }

    pub fn filter(&self) -> MessageFilter {
        self.messages.last_params()
    }
}

#[async_trait]
impl Screen for MessagesScreen {
    fn name(&self) -> &'static str {
        "messages"
    }

    fn summary(&self) -> String {
        let state = self.messages.state();
        let shutdowns = state
            .data
            .iter()
            .filter(|m| m.kind().is_some_and(|k| k.is_shutdown()))
            .count();
        format!(
            "messages: {} ({} shutdown related)",
            describe(&state, Vec::len),
            shutdowns
        )
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.push.subscribe()
    }

    fn refresh(&self) {
        let _ = self.messages.start_refetch();
    }

    fn reconnect(&self) {
        self.push.reconnect();
    }

    async fn close(&self) {
        self.messages.unmount();
        self.push.close().await;
    }
}
