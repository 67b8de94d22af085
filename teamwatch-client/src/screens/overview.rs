//! Overview: team list, recent messages and totals.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use super::{describe, ChangeNotifier, Screen, ScreenContext};
use teamwatch_core::{Message, MessageFilter, Stats, Team};
use teamwatch_sync::{ConnectionState, FetchOrchestrator, PushChannel};

pub const TEAMS_CACHE_KEY: &str = "teams_list";
pub const TEAMS_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
pub const STATS_CACHE_KEY: &str = "stats";
pub const STATS_CACHE_TTL: Duration = Duration::from_secs(60);
pub const RECENT_MESSAGE_LIMIT: u32 = 10;

pub struct OverviewScreen {
    pub teams: FetchOrchestrator<(), Vec<Team>>,
    pub recent: FetchOrchestrator<MessageFilter, Vec<Message>>,
    pub stats: FetchOrchestrator<(), Stats>,
    push: PushChannel,
    changes: ChangeNotifier,
}

/// Team list orchestrator shared by the overview and task screens.
pub(crate) fn mount_teams(ctx: &ScreenContext) -> FetchOrchestrator<(), Vec<Team>> {
    let api = ctx.api.clone();
    FetchOrchestrator::mount(
        move |_: ()| {
            let api = api.clone();
            async move { api.teams().await }
        },
        ctx.cache.clone(),
        ctx.options(Vec::new())
            .with_cache(TEAMS_CACHE_KEY, TEAMS_CACHE_TTL),
    )
}

impl OverviewScreen {
    pub fn mount(ctx: &ScreenContext) -> Self {
        let teams = mount_teams(ctx);

        let api = ctx.api.clone();
        let recent = FetchOrchestrator::mount_with(
            move |filter: MessageFilter| {
                let api = api.clone();
                async move { api.messages(&filter).await }
            },
            ctx.cache.clone(),
            ctx.options(Vec::new()),
            MessageFilter::recent(RECENT_MESSAGE_LIMIT),
        );

        let api = ctx.api.clone();
        let stats = FetchOrchestrator::mount(
            move |_: ()| {
                let api = api.clone();
                async move { api.stats().await }
            },
            ctx.cache.clone(),
            ctx.options(Stats::default())
                .with_cache(STATS_CACHE_KEY, STATS_CACHE_TTL),
        );

        let push = ctx.connect();
        ctx.bridge()
            .target(teams.clone())
            .target(recent.clone())
            .target(stats.clone())
            .attach(&push);

        let mut changes = ChangeNotifier::new();
        changes.watch(teams.subscribe());
        changes.watch(recent.subscribe());
        changes.watch(stats.subscribe());

        Self {
            teams,
            recent,
            stats,
            push,
            changes,
        }
    }

    pub fn push(&self) -> &PushChannel {
        &self.push
    }
}

#[async_trait]
impl Screen for OverviewScreen {
    fn name(&self) -> &'static str {
        "overview"
    }

    fn summary(&self) -> String {
        let stats = self.stats.state();
        let totals = if stats.has_error() || stats.loading {
            describe(&stats, |_| 0)
        } else {
            format!(
                "{} teams, {} members, {} messages, {}% tasks done",
                stats.data.team_count,
                stats.data.member_count,
                stats.data.message_count,
                stats.data.completion_percent()
            )
        };
        format!(
            "teams: {} | recent messages: {} | stats: {}",
            describe(&self.teams.state(), Vec::len),
            describe(&self.recent.state(), Vec::len),
            totals
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
        let _ = self.recent.start_refetch();
        let _ = self.stats.start_refetch();
    }

    fn reconnect(&self) {
        self.push.reconnect();
    }

    async fn close(&self) {
        self.teams.unmount();
        self.recent.unmount();
        self.stats.unmount();
        self.push.close().await;
    }
}
