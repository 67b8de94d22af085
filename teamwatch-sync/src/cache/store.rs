//! The shared result cache.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::session::{MemorySessionStore, SessionStore, SessionStoreError};
use crate::clock::{Clock, SystemClock};
use crate::lock;

/// Prefix for keys written to the session store.
const STORAGE_PREFIX: &str = "cache_";

/// One cached result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub key: String,
    pub payload: T,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// An entry is fresh while `now - stored_at < ttl`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        is_fresh(self.stored_at, self.ttl, now)
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.stored_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

fn is_fresh(stored_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    let age_ms = (now - stored_at).num_milliseconds();
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    age_ms < ttl_ms
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because a read found them expired.
    pub expirations: u64,
    /// Writes that stayed memory-only because persistence failed.
    pub persist_failures: u64,
    /// Entries currently held in memory (fresh or not yet checked).
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Why a write could not be persisted. Never returned to callers of
/// [`ResultCache::set`]; only logged and counted.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

#[derive(Serialize, Deserialize)]
struct PersistedRecord {
    data: serde_json::Value,
    /// Milliseconds since the Unix epoch.
    timestamp: i64,
    ttl_ms: u64,
}

struct Slot {
    payload: Arc<dyn Any + Send + Sync>,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    persist_failures: AtomicU64,
}

/// Process-wide keyed result cache.
///
/// Construct once and hand an `Arc` to every orchestrator; orchestrators that
/// use the same key observe the same payload. `set` and `invalidate` replace
/// whole entries.
pub struct ResultCache {
    memory: Mutex<HashMap<String, Slot>>,
    session: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    pub fn new(session: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            session,
            clock,
            counters: Counters::default(),
        }
    }

    /// Cache with a process-local session store and the system clock.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()), Arc::new(SystemClock))
    }

    pub fn with_session(session: Arc<dyn SessionStore>) -> Self {
        Self::new(session, Arc::new(SystemClock))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fresh entry for `key`, or `None`.
    ///
    /// An expired entry is removed by this call. When the memory layer has
    /// nothing usable for `T`, the session copy is decoded and promoted.
    pub fn get<T>(&self, key: &str) -> Option<CacheEntry<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let now = self.clock.now();
        // The memory lock is held across session access so a concurrent
        // `set` cannot interleave between the two layers.
        let mut memory = lock(&self.memory);
        if let Some(slot) = memory.get(key) {
            if !is_fresh(slot.stored_at, slot.ttl, now) {
                memory.remove(key);
                self.remove_persisted(key);
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key, "cache entry expired");
                return None;
            }
            if let Some(payload) = slot.payload.downcast_ref::<T>() {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Some(CacheEntry {
                    key: key.to_string(),
                    payload: payload.clone(),
                    stored_at: slot.stored_at,
                    ttl: slot.ttl,
                });
            }
        }

        match self.read_persisted::<T>(key, now) {
            Some(entry) => {
                memory.insert(
                    key.to_string(),
                    Slot {
                        payload: Arc::new(entry.payload.clone()),
                        stored_at: entry.stored_at,
                        ttl: entry.ttl,
                    },
                );
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `payload` under `key` for `ttl`.
    ///
    /// Never fails: if the payload cannot be persisted the memory layer is
    /// still updated, so the current process keeps benefiting from it.
    pub fn set<T>(&self, key: &str, payload: T, ttl: Duration)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let stored_at = self.clock.now();
        let mut memory = lock(&self.memory);
        if let Err(err) = self.persist(key, &payload, stored_at, ttl) {
            self.counters.persist_failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key, error = %err, "cache entry kept in memory only");
        }
        memory.insert(
            key.to_string(),
            Slot {
                payload: Arc::new(payload),
                stored_at,
                ttl,
            },
        );
    }

    /// Remove `key` from both layers. The next read misses.
    pub fn invalidate(&self, key: &str) {
        let mut memory = lock(&self.memory);
        memory.remove(key);
        self.remove_persisted(key);
    }

    /// Remove every entry and end the session's persisted copy.
    pub fn clear(&self) {
        let mut memory = lock(&self.memory);
        memory.clear();
        if let Err(err) = self.session.clear() {
            tracing::warn!(error = %err, "failed to clear session cache");
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            persist_failures: self.counters.persist_failures.load(Ordering::Relaxed),
            entry_count: lock(&self.memory).len() as u64,
        }
    }

    fn persist<T: Serialize>(
        &self,
        key: &str,
        payload: &T,
        stored_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let record = PersistedRecord {
            data: serde_json::to_value(payload)?,
            timestamp: stored_at.timestamp_millis(),
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        };
        let encoded = serde_json::to_string(&record)?;
        self.session.write(&storage_key(key), &encoded)?;
        Ok(())
    }

    fn read_persisted<T: DeserializeOwned>(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<CacheEntry<T>> {
        let raw = match self.session.read(&storage_key(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to read session cache");
                return None;
            }
        };

        let Ok(record) = serde_json::from_str::<PersistedRecord>(&raw) else {
            tracing::debug!(key, "discarding unreadable cache record");
            self.remove_persisted(key);
            return None;
        };
        let Some(stored_at) = DateTime::<Utc>::from_timestamp_millis(record.timestamp) else {
            self.remove_persisted(key);
            return None;
        };
        let ttl = Duration::from_millis(record.ttl_ms);
        if !is_fresh(stored_at, ttl, now) {
            self.remove_persisted(key);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        match serde_json::from_value::<T>(record.data) {
            Ok(payload) => Some(CacheEntry {
                key: key.to_string(),
                payload,
                stored_at,
                ttl,
            }),
            Err(err) => {
                tracing::debug!(key, error = %err, "cache record does not match requested type");
                self.remove_persisted(key);
                None
            }
        }
    }

    fn remove_persisted(&self, key: &str) {
        if let Err(err) = self.session.remove(&storage_key(key)) {
            tracing::warn!(key, error = %err, "failed to remove session cache entry");
        }
    }
}

fn storage_key(key: &str) -> String {
    format!("{}{}", STORAGE_PREFIX, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::session::FileSessionStore;
    use crate::clock::ManualClock;
    use proptest::prelude::*;

    fn manual_cache() -> (ResultCache, Arc<ManualClock>, Arc<MemorySessionStore>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let session = Arc::new(MemorySessionStore::new());
        let cache = ResultCache::new(session.clone(), clock.clone());
        (cache, clock, session)
    }

    #[test]
    fn test_ttl_boundary_scenario() {
        let (cache, clock, _) = manual_cache();
        let teams = vec!["alpha".to_string(), "beta".to_string()];
        cache.set("teams", teams.clone(), Duration::from_millis(60_000));

        clock.advance_ms(59_999);
        let entry = cache.get::<Vec<String>>("teams").expect("entry is still fresh");
        assert_eq!(entry.payload, teams);

        clock.advance_ms(2);
        assert!(cache.get::<Vec<String>>("teams").is_none());
    }

    #[test]
    fn test_entry_expires_exactly_at_ttl() {
        let (cache, clock, _) = manual_cache();
        cache.set("k", 1u32, Duration::from_millis(100));
        clock.advance_ms(100);
        assert!(cache.get::<u32>("k").is_none());
    }

    #[test]
    fn test_expired_read_evicts_both_layers() {
        let (cache, clock, session) = manual_cache();
        cache.set("k", 1u32, Duration::from_millis(10));
        assert_eq!(session.len(), 1);

        clock.advance_ms(10);
        assert!(cache.get::<u32>("k").is_none());
        assert_eq!(session.len(), 0);
        assert_eq!(cache.stats().entry_count, 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_invalidate_forces_miss() {
        let (cache, _, session) = manual_cache();
        cache.set("stats", 42u64, Duration::from_secs(60));
        cache.invalidate("stats");
        assert!(cache.get::<u64>("stats").is_none());
        assert!(session.is_empty());
    }

    #[test]
    fn test_concurrent_set_and_invalidate_keep_layers_in_step() {
        let (cache, _, session) = manual_cache();
        let cache = Arc::new(cache);

        let writer = std::thread::spawn({
            let cache = cache.clone();
            move || {
                for i in 0..500u32 {
                    cache.set("stats", i, Duration::from_secs(60));
                }
            }
        });
        let invalidator = std::thread::spawn({
            let cache = cache.clone();
            move || {
                for _ in 0..500 {
                    cache.invalidate("stats");
                }
            }
        });
        writer.join().unwrap();
        invalidator.join().unwrap();

        let in_memory = cache.stats().entry_count == 1;
        let persisted = session.read("cache_stats").unwrap().is_some();
        assert_eq!(in_memory, persisted);
    }

    #[test]
    fn test_overwrite_replaces_payload_and_timestamp() {
        let (cache, clock, _) = manual_cache();
        cache.set("k", "first".to_string(), Duration::from_millis(100));
        clock.advance_ms(80);
        cache.set("k", "second".to_string(), Duration::from_millis(100));
        clock.advance_ms(80);
        let entry = cache.get::<String>("k").unwrap();
        assert_eq!(entry.payload, "second");
        assert_eq!(entry.age_at(cache.now()), Duration::from_millis(80));
    }

    #[test]
    fn test_unserializable_payload_stays_in_memory() {
        let (cache, _, session) = manual_cache();
        let mut payload = HashMap::new();
        payload.insert((1, 2), 3);
        cache.set("matrix", payload.clone(), Duration::from_secs(60));

        assert!(session.is_empty());
        assert_eq!(cache.stats().persist_failures, 1);
        let entry = cache.get::<HashMap<(i32, i32), i32>>("matrix").unwrap();
        assert_eq!(entry.payload, payload);
    }

    #[test]
    fn test_new_process_reads_session_copy() {
        let root = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::at_epoch());

        let first = ResultCache::new(
            Arc::new(FileSessionStore::new(root.path(), "s1").unwrap()),
            clock.clone(),
        );
        first.set("teams_list", vec![1u32, 2, 3], Duration::from_secs(600));
        drop(first);

        let second = ResultCache::new(
            Arc::new(FileSessionStore::new(root.path(), "s1").unwrap()),
            clock.clone(),
        );
        let entry = second.get::<Vec<u32>>("teams_list").unwrap();
        assert_eq!(entry.payload, vec![1, 2, 3]);
        assert_eq!(entry.ttl, Duration::from_secs(600));

        let other_session = ResultCache::new(
            Arc::new(FileSessionStore::new(root.path(), "s2").unwrap()),
            clock,
        );
        assert!(other_session.get::<Vec<u32>>("teams_list").is_none());
    }

    #[test]
    fn test_persisted_copy_honors_ttl() {
        let session = Arc::new(MemorySessionStore::new());
        let clock = Arc::new(ManualClock::at_epoch());
        let writer = ResultCache::new(session.clone(), clock.clone());
        writer.set("k", 7u8, Duration::from_millis(500));

        let reader = ResultCache::new(session.clone(), clock.clone());
        clock.advance_ms(500);
        assert!(reader.get::<u8>("k").is_none());
        assert!(session.is_empty());
    }

    #[test]
    fn test_corrupt_record_is_removed() {
        let (cache, _, session) = manual_cache();
        session.write("cache_k", "{not json").unwrap();
        assert!(cache.get::<u32>("k").is_none());
        assert!(session.read("cache_k").unwrap().is_none());
    }

    #[test]
    fn test_shared_key_visible_to_all_readers() {
        let cache = Arc::new(ResultCache::in_memory());
        let writer = cache.clone();
        writer.set("shared", vec!["x".to_string()], Duration::from_secs(60));
        let reader = cache.clone();
        assert_eq!(
            reader.get::<Vec<String>>("shared").unwrap().payload,
            vec!["x".to_string()]
        );
    }

    #[test]
    fn test_stats_hit_rate() {
        let (cache, _, _) = manual_cache();
        cache.set("k", 1u32, Duration::from_secs(1));
        assert!(cache.get::<u32>("k").is_some());
        assert!(cache.get::<u32>("missing").is_none());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < 0.001);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }

    proptest! {
        #[test]
        fn get_hits_iff_within_ttl(ttl_ms in 1u64..1_000_000, elapsed_ms in 0u64..2_000_000) {
            let (cache, clock, _) = manual_cache();
            cache.set("k", elapsed_ms, Duration::from_millis(ttl_ms));
            clock.advance_ms(elapsed_ms);
            let hit = cache.get::<u64>("k").is_some();
            prop_assert_eq!(hit, elapsed_ms < ttl_ms);
        }
    }
}
