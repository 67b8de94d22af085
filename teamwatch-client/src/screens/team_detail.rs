//! One team: members, paged inbox traffic and tasks.

use async_trait::async_trait;
use tokio::sync::watch;

use super::{describe, ChangeNotifier, Screen, ScreenContext};
use teamwatch_core::{MessagePage, Task, TaskBoard, TeamDetail, TeamMessageFilter};
use teamwatch_sync::{ConnectionState, FetchOrchestrator, PushChannel};

pub struct TeamDetailScreen {
    team_name: String,
    pub detail: FetchOrchestrator<(), Option<TeamDetail>>,
    pub messages: FetchOrchestrator<TeamMessageFilter, MessagePage>,
    pub tasks: FetchOrchestrator<(), Vec<Task>>,
    push: PushChannel,
    changes: ChangeNotifier,
}

impl TeamDetailScreen {
    pub fn mount(ctx: &ScreenContext, team_name: &str) -> Self {
        let name = team_name.to_string();

        let (api, team) = (ctx.api.clone(), name.clone());
        let detail = FetchOrchestrator::mount(
            move |_: ()| {
                let (api, team) = (api.clone(), team.clone());
                async move { api.team(&team).await.map(Some) }
            },
            ctx.cache.clone(),
            ctx.options(None),
        );

        let (api, team) = (ctx.api.clone(), name.clone());
        let messages = FetchOrchestrator::mount(
            move |filter: TeamMessageFilter| {
                let (api, team) = (api.clone(), team.clone());
                async move { api.team_messages(&team, &filter.clamped()).await }
            },
            ctx.cache.clone(),
            ctx.options(MessagePage::default()),
        );

        let (api, team) = (ctx.api.clone(), name.clone());
        let tasks = FetchOrchestrator::mount(
            move |_: ()| {
                let (api, team) = (api.clone(), team.clone());
                async move { api.team_tasks(&team).await }
            },
            ctx.cache.clone(),
            ctx.options(Vec::new()),
        );

        let push = ctx.connect();
        ctx.bridge()
            .target(detail.clone())
            .target(messages.clone())
            .target(tasks.clone())
            .attach(&push);

        let mut changes = ChangeNotifier::new();
        changes.watch(detail.subscribe());
        changes.watch(messages.subscribe());
        changes.watch(tasks.subscribe());

        Self {
            team_name: name,
            detail,
            messages,
            tasks,
            push,
            changes,
        }
    }

    pub fn team_name(&self) -> &str {
        &self.team_name
    }

    /// Reload messages with new sender/type filters, back on page one.
    pub async fn filter_messages(
        &self,
        sender: Option<String>,
        msg_type: Option<String>,
    ) -> MessagePage {
        let filter = TeamMessageFilter {
            sender,
            msg_type,
            page: 1,
            ..self.messages.last_params()
        };
        self.messages.execute(filter).await
    }

    /// Load another page with the current filters. Out-of-range pages are
    /// clamped before the request.
    pub async fn go_to_page(&self, page: u32) -> MessagePage {
        let filter = TeamMessageFilter {
            page,
            ..self.messages.last_params()
        };
        self.messages.execute(filter.clamped()).await
    }

    /// Next page, if the current one says there is one.
    pub async fn next_page(&self) -> Option<MessagePage> {
        let current = self.messages.data();
        if !current.has_next() {
            return None;
        }
        Some(self.go_to_page(current.page + 1).await)
    }

    pub fn board(&self) -> TaskBoard {
        TaskBoard::from_tasks(&self.tasks.data())
    }
}

#[async_trait]
impl Screen for TeamDetailScreen {
    fn name(&self) -> &'static str {
        "team"
    }

    fn summary(&self) -> String {
        let detail = self.detail.state();
        let members = describe(&detail, |d| d.as_ref().map_or(0, |d| d.members.len()));
        let messages = self.messages.state();
        let paging = if messages.has_error() || messages.loading {
            describe(&messages, |p| p.items.len())
        } else {
            format!(
                "{} of {} (page {}/{})",
                messages.data.items.len(),
                messages.data.total,
                messages.data.page,
                messages.data.total_pages()
            )
        };
        format!(
            "team {} | members: {} | messages: {} | tasks: {}",
            self.team_name,
            members,
            paging,
            describe(&self.tasks.state(), Vec::len)
        )
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.push.subscribe()
    }

    fn refresh(&self) {
        let _ = self.detail.start_refetch();
        let _ = self.messages.start_refetch();
        let _ = self.tasks.start_refetch();
    }

    fn reconnect(&self) {
        self.push.reconnect();
    }

    async fn close(&self) {
        self.detail.unmount();
        self.messages.unmount();
        self.tasks.unmount();
        self.push.close().await;
    }
}
