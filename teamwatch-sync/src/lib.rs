//! Teamwatch Sync - client-side data synchronization.
//!
//! Keeps a view's local state consistent with server state:
//!
//! - [`cache`]: session-scoped, time-bounded result cache shared by all views
//! - [`fetch`]: cancellable fetch orchestration with stale-result suppression
//! - [`push`]: resilient push channel client with bounded exponential backoff
//! - [`bridge`]: wiring that turns push events into refetches

pub mod bridge;
pub mod cache;
pub mod clock;
pub mod fetch;
pub mod push;

pub use bridge::{InvalidationBridge, Refreshable, DEFAULT_REFRESH_TRIGGER};
pub use cache::{
    CacheEntry, CacheStats, FileSessionStore, MemorySessionStore, ResultCache, SessionStore,
    SessionStoreError,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fetch::{
    Emptiness, FetchError, FetchOptions, FetchOrchestrator, FetchState, Retrieve,
    DEFAULT_CACHE_TTL,
};
pub use push::{
    BackoffPolicy, ConnectionState, ConnectionStatus, ErrorReason, Frame, PushChannel, PushConfig,
    PushConnection, PushError, PushEvent, PushTransport, ScriptedServer, ScriptedTransport,
    WsTransport, AUTH_REJECTED_CLOSE_CODE,
};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every guarded value in this crate is replaced wholesale, so a poisoned
/// lock never exposes a half-written value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
