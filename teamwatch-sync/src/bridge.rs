//! Push-event driven invalidation.
//!
//! Server events carry no state; a trigger event only means "something
//! changed", so the bridge refetches every bound orchestrator.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::fetch::FetchOrchestrator;
use crate::push::{PushChannel, PushEvent};

/// Event type that triggers a refresh when nothing else is configured.
pub const DEFAULT_REFRESH_TRIGGER: &str = "update";

/// Something that can be told to reload from the server.
pub trait Refreshable: Send + Sync {
    fn request_refresh(&self);
}

impl<P, T> Refreshable for FetchOrchestrator<P, T>
where
    P: Clone + Default + Send + Sync + 'static,
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn request_refresh(&self) {
        // Cache bypass plus a fresh call; the retrieval runs in the background.
        let _ = self.start_refetch();
    }
}

#[derive(Clone)]
pub struct InvalidationBridge {
    triggers: HashSet<String>,
    targets: Vec<Arc<dyn Refreshable>>,
}

impl Default for InvalidationBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationBridge {
    pub fn new() -> Self {
        Self::with_triggers([DEFAULT_REFRESH_TRIGGER])
    }

    pub fn with_triggers<I, S>(triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            triggers: triggers.into_iter().map(Into::into).collect(),
            targets: Vec::new(),
        }
    }

    /// Bind another orchestrator.
    pub fn target(mut self, target: impl Refreshable + 'static) -> Self {
        self.targets.push(Arc::new(target));
        self
    }

    pub fn is_trigger(&self, kind: &str) -> bool {
        self.triggers.contains(kind)
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Refresh every target if `event` is a trigger. Returns how many
    /// targets were asked to refresh.
    pub fn handle(&self, event: &PushEvent) -> usize {
        if !self.is_trigger(&event.kind) {
            tracing::trace!(kind = %event.kind, "push event ignored");
            return 0;
        }
        tracing::debug!(kind = %event.kind, targets = self.targets.len(), "push event triggers refresh");
        for target in &self.targets {
            target.request_refresh();
        }
        self.targets.len()
    }

    /// Install as `channel`'s event handler, replacing any previous one.
    pub fn attach(self, channel: &PushChannel) {
        channel.set_handler(move |event| {
            self.handle(&event);
        });
    }
}
