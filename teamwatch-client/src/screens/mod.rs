//! View-level state holders.
//!
//! A screen owns the orchestrators for the data one view shows plus its
//! push channel binding. Nothing here renders; the binary logs summaries.

pub mod message_flow;
pub mod messages;
pub mod overview;
pub mod tasks;
pub mod team_detail;

pub use message_flow::MessageFlowScreen;
pub use messages::MessagesScreen;
pub use overview::OverviewScreen;
pub use tasks::TasksScreen;
pub use team_detail::TeamDetailScreen;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api_client::DashboardApi;
use crate::cli::View;
use teamwatch_sync::{
    ConnectionState, FetchError, FetchOptions, InvalidationBridge, PushChannel, PushConfig,
    PushTransport, ResultCache,
};

/// Shared services every screen mounts against.
#[derive(Clone)]
pub struct ScreenContext {
    pub api: Arc<dyn DashboardApi>,
    pub cache: Arc<ResultCache>,
    pub transport: Arc<dyn PushTransport>,
    pub push: PushConfig,
    pub refresh_on: Vec<String>,
    pub refresh_interval: Option<Duration>,
    pub default_ttl: Duration,
}

impl ScreenContext {
    pub(crate) fn options<T>(&self, default_value: T) -> FetchOptions<T> {
        let mut options = FetchOptions::new(default_value);
        options.cache_ttl = self.default_ttl;
        options.refetch_interval = self.refresh_interval;
        options
    }

    pub(crate) fn connect(&self) -> PushChannel {
        PushChannel::connect(self.transport.clone(), self.push.clone())
    }

    pub(crate) fn bridge(&self) -> InvalidationBridge {
        InvalidationBridge::with_triggers(self.refresh_on.iter().cloned())
    }
}

/// Common surface the binary drives.
#[async_trait]
pub trait Screen: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-line description of what the screen currently shows.
    fn summary(&self) -> String;

    /// Ticks whenever any of the screen's fetch states changes.
    fn changes(&self) -> watch::Receiver<u64>;

    fn connection(&self) -> watch::Receiver<ConnectionState>;

    /// Refetch everything, bypassing the cache.
    fn refresh(&self);

    /// Restart the push channel.
    fn reconnect(&self);

    /// Unmount every orchestrator and close the push channel.
    async fn close(&self);
}

/// Mount the screen for `view`.
pub fn mount(view: &View, ctx: &ScreenContext) -> Box<dyn Screen> {
    match view {
        View::Overview => Box::new(OverviewScreen::mount(ctx)),
        View::Tasks => Box::new(TasksScreen::mount(ctx, Default::default())),
        View::Messages => Box::new(MessagesScreen::mount(ctx, Default::default())),
        View::Team(name) => Box::new(TeamDetailScreen::mount(ctx, name)),
        View::Flow(name) => Box::new(MessageFlowScreen::mount(ctx, name)),
    }
}

/// Manual sync: ask the server to re-read its sources, then refetch.
pub async fn sync_now(api: &dyn DashboardApi, screen: &dyn Screen) -> Result<(), FetchError> {
    api.sync().await?;
    tracing::info!(screen = screen.name(), "server sync complete, refreshing");
    screen.refresh();
    Ok(())
}

/// Restart the push channel and refetch, since events may have been missed
/// while it was down. The way out of a terminal connection error.
pub fn restart_live_updates(screen: &dyn Screen) {
    tracing::info!(screen = screen.name(), "restarting live updates");
    screen.reconnect();
    screen.refresh();
}

/// Folds change notifications from several state receivers into one
/// revision counter.
pub(crate) struct ChangeNotifier {
    revision: Arc<watch::Sender<u64>>,
    forwarders: Vec<JoinHandle<()>>,
}

impl ChangeNotifier {
    pub(crate) fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            revision: Arc::new(revision),
            forwarders: Vec::new(),
        }
    }

    pub(crate) fn watch<T>(&mut self, mut state: watch::Receiver<T>)
    where
        T: Send + Sync + 'static,
    {
        let revision = self.revision.clone();
        self.forwarders.push(tokio::spawn(async move {
            while state.changed().await.is_ok() {
                revision.send_modify(|r| *r = r.wrapping_add(1));
            }
        }));
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
    }
}

/// `"3 items"`, `"loading"` or `"error: ..."` for one fetch state.
pub(crate) fn describe<T>(
    state: &teamwatch_sync::FetchState<T>,
    count: impl FnOnce(&T) -> usize,
) -> String {
    if let Some(err) = &state.error {
        format!("error ({})", err)
    } else if state.loading {
        "loading".to_string()
    } else {
        count(&state.data).to_string()
    }
}
