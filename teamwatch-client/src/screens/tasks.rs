//! Task list with team/status filters and a status board.

use async_trait::async_trait;
use tokio::sync::watch;

use super::overview::mount_teams;
use super::{describe, ChangeNotifier, Screen, ScreenContext};
use teamwatch_core::{Task, TaskBoard, TaskFilter, Team};
use teamwatch_sync::{ConnectionState, FetchOrchestrator, PushChannel};

pub struct TasksScreen {
    pub teams: FetchOrchestrator<(), Vec<Team>>,
    pub tasks: FetchOrchestrator<TaskFilter, Vec<Task>>,
    push: PushChannel,
    changes: ChangeNotifier,
}

impl TasksScreen {
    pub fn mount(ctx: &ScreenContext, filter: TaskFilter) -> Self {
        let teams = mount_teams(ctx);

        let api = ctx.api.clone();
        let tasks = FetchOrchestrator::mount_with(
            move |filter: TaskFilter| {
                let api = api.clone();
                async move { api.tasks(&filter).await }
            },
            ctx.cache.clone(),
            ctx.options(Vec::new()),
            filter.normalized(),
        );

        let push = ctx.connect();
        ctx.bridge()
            .target(teams.clone())
            .target(tasks.clone())
            .attach(&push);

        let mut changes = ChangeNotifier::new();
        changes.watch(teams.subscribe());
        changes.watch(tasks.subscribe());

        Self {
            teams,
            tasks,
            push,
            changes,
        }
    }

    /// Reload tasks with a new filter.
    pub async fn apply_filter(&self, filter: TaskFilter) -> Vec<Task> {
        self.tasks.execute(filter.normalized()).await
    }

    pub fn filter(&self) -> TaskFilter {
        self.tasks.last_params()
    }

    /// Current tasks grouped into board columns.
    pub fn board(&self) -> TaskBoard {
        TaskBoard::from_tasks(&self.tasks.data())
    }
}

#[async_trait]
impl Screen for TasksScreen {
    fn name(&self) -> &'static str {
        "tasks"
    }

    fn summary(&self) -> String {
        let tasks = self.tasks.state();
        let detail = if tasks.has_error() || tasks.loading {
            describe(&tasks, Vec::len)
        } else {
            let board = TaskBoard::from_tasks(&tasks.data);
            format!(
                "{} pending, {} in progress, {} completed",
                board.pending.len(),
                board.in_progress.len(),
                board.completed.len()
            )
        };
        format!(
            "teams: {} | tasks: {}",
            describe(&self.teams.state(), Vec::len),
            detail
        )
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.push.subscribe()
    }

    fn refresh(&self) {
        let _ = self.teams.start_refetch();
        let _ = self.tasks.start_refetch();
    }

    fn reconnect(&self) {
        self.push.reconnect();
    }

    async fn close(&self) {
        self.teams.unmount();
        self.tasks.unmount();
        self.push.close().await;
    }
}
