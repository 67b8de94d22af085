//! Process-wide services built from the configuration.

use std::sync::Arc;

use crate::api_client::RestClient;
use crate::config::{CacheConfig, ClientConfig};
use crate::error::ClientError;
use crate::screens::ScreenContext;
use teamwatch_sync::{FileSessionStore, ResultCache, WsTransport};

pub struct App {
    pub config: ClientConfig,
    pub api: RestClient,
    pub context: ScreenContext,
}

impl App {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let api = RestClient::new(&config)?;
        let context = ScreenContext {
            api: Arc::new(api.clone()),
            cache: Arc::new(build_cache(&config.cache)),
            transport: Arc::new(WsTransport),
            push: config.push_config()?,
            refresh_on: config.refresh_on.clone(),
            refresh_interval: config.refresh_interval(),
            default_ttl: config.default_ttl(),
        };
        Ok(Self {
            config,
            api,
            context,
        })
    }
}

/// Session-file backed cache when a directory is configured and usable,
/// otherwise memory only.
pub fn build_cache(config: &CacheConfig) -> ResultCache {
    let Some(root) = &config.session_dir else {
        return ResultCache::in_memory();
    };
    match FileSessionStore::for_current_session(root) {
        Ok(store) => {
            tracing::debug!(dir = %store.dir().display(), "session cache enabled");
            ResultCache::with_session(Arc::new(store))
        }
        Err(err) => {
            tracing::warn!(root = %root.display(), error = %err, "session cache unavailable, using memory only");
            ResultCache::in_memory()
        }
    }
}
