//! The fetch orchestrator.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::error::FetchError;
use super::state::{Emptiness, FetchState};
use crate::cache::{CacheEntry, ResultCache};
use crate::lock;

/// Cache lifetime used when options do not set one.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// An asynchronous retrieval operation, `params -> Result<T, FetchError>`.
///
/// Implemented for any `Fn(P) -> impl Future<Output = Result<T, FetchError>>`,
/// so closures over an API client work directly. Dropping the returned
/// future is the cancellation signal.
#[async_trait]
pub trait Retrieve<P, T>: Send + Sync {
    async fn retrieve(&self, params: P) -> Result<T, FetchError>;
}

#[async_trait]
impl<P, T, F, Fut> Retrieve<P, T> for F
where
    P: Send + 'static,
    T: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    async fn retrieve(&self, params: P) -> Result<T, FetchError> {
        (self)(params).await
    }
}

/// Configuration for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct FetchOptions<T> {
    /// Load on mount (from cache when fresh, otherwise by retrieval).
    pub immediate: bool,
    /// Value of `data` before the first success; also what cancelled and
    /// failed calls resolve to.
    pub default_value: T,
    /// Cache key; `None` disables caching for this instance.
    pub cache_key: Option<String>,
    pub cache_ttl: Duration,
    /// Periodic `refetch` interval.
    pub refetch_interval: Option<Duration>,
}

impl<T: Default> Default for FetchOptions<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> FetchOptions<T> {
    pub fn new(default_value: T) -> Self {
        Self {
            immediate: true,
            default_value,
            cache_key: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            refetch_interval: None,
        }
    }

    pub fn with_cache(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.cache_key = Some(key.into());
        self.cache_ttl = ttl;
        self
    }

    pub fn with_refetch_interval(mut self, every: Duration) -> Self {
        self.refetch_interval = Some(every);
        self
    }

    /// Do not load on mount; wait for an explicit `execute`.
    pub fn deferred(mut self) -> Self {
        self.immediate = false;
        self
    }
}

type SuccessHook<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&FetchError) + Send + Sync>;

struct Hooks<T> {
    on_success: Option<SuccessHook<T>>,
    on_error: Option<ErrorHook>,
}

enum Settlement<T> {
    Finished(Result<T, FetchError>),
    Superseded,
    TornDown,
}

struct Inner<P, T> {
    retrieve: Box<dyn Retrieve<P, T>>,
    cache: Arc<ResultCache>,
    options: FetchOptions<T>,
    state: watch::Sender<FetchState<T>>,
    teardown: watch::Sender<bool>,
    last_params: Mutex<P>,
    hooks: Mutex<Hooks<T>>,
    unmounted: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl<P, T> Drop for Inner<P, T> {
    fn drop(&mut self) {
        let ticker = self
            .ticker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(ticker) = ticker {
            ticker.abort();
        }
    }
}

/// Fetch state holder for one logical data need of one view.
///
/// Cheap to clone; clones share the same state. Call [`unmount`] when the
/// owning view goes away.
///
/// [`unmount`]: FetchOrchestrator::unmount
pub struct FetchOrchestrator<P, T> {
    inner: Arc<Inner<P, T>>,
}

impl<P, T> Clone for FetchOrchestrator<P, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, T> FetchOrchestrator<P, T>
where
    P: Clone + Default + Send + Sync + 'static,
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Mount with default parameters.
    ///
    /// Must be called inside a tokio runtime: the initial retrieval and the
    /// refresh ticker are spawned.
    pub fn mount<R>(retrieve: R, cache: Arc<ResultCache>, options: FetchOptions<T>) -> Self
    where
        R: Retrieve<P, T> + 'static,
    {
        Self::mount_with(retrieve, cache, options, P::default())
    }

    /// Mount with explicit initial parameters.
    pub fn mount_with<R>(
        retrieve: R,
        cache: Arc<ResultCache>,
        options: FetchOptions<T>,
        params: P,
    ) -> Self
    where
        R: Retrieve<P, T> + 'static,
    {
        let cached = if options.immediate {
            options
                .cache_key
                .as_deref()
                .and_then(|key| cache.get::<T>(key))
        } else {
            None
        };
        let from_cache = cached.is_some();
        let loading = options.immediate && !from_cache;
        let data = cached
            .map(CacheEntry::into_payload)
            .unwrap_or_else(|| options.default_value.clone());
        let refetch_interval = options.refetch_interval;

        let (state, _) = watch::channel(FetchState::new(data, loading));
        let (teardown, _) = watch::channel(false);
        let this = Self {
            inner: Arc::new(Inner {
                retrieve: Box::new(retrieve),
                cache,
                options,
                state,
                teardown,
                last_params: Mutex::new(params.clone()),
                hooks: Mutex::new(Hooks {
                    on_success: None,
                    on_error: None,
                }),
                unmounted: AtomicBool::new(false),
                ticker: Mutex::new(None),
            }),
        };

        if from_cache {
            tracing::debug!(key = ?this.cache_key(), "initial data served from cache");
        } else if loading {
            let generation = this.begin(params.clone());
            this.spawn_run(generation, params);
        }

        if let Some(period) = refetch_interval {
            this.start_ticker(period);
        }
        this
    }

    /// Run the retrieval with `params`, superseding any call in flight.
    ///
    /// Resolves to the retrieved value on success and to the default value
    /// when the call fails, is cancelled, or is superseded.
    ///
    /// The retrieval runs on its own task, so dropping the returned future
    /// does not abandon the call: it still settles `loading` and `data`.
    pub async fn execute(&self, params: P) -> T {
        if self.is_unmounted() {
            return self.default_value();
        }
        let generation = self.begin(params.clone());
        match self.spawn_run(generation, params).await {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(generation, error = %err, "fetch task failed");
                self.default_value()
            }
        }
    }

    /// Invalidate this instance's cache key, then `execute` with the last
    /// used parameters.
    pub async fn refetch(&self) -> T {
        if self.is_unmounted() {
            return self.default_value();
        }
        self.clear_cache();
        let params = self.last_params();
        self.execute(params).await
    }

    /// Like [`refetch`](Self::refetch) but returns once the new call is
    /// current; the retrieval itself runs on a spawned task.
    ///
    /// Returns `None` after unmount.
    pub fn start_refetch(&self) -> Option<JoinHandle<T>> {
        if self.is_unmounted() {
            return None;
        }
        self.clear_cache();
        let params = self.last_params();
        let generation = self.begin(params.clone());
        Some(self.spawn_run(generation, params))
    }

    pub fn clear_cache(&self) {
        if let Some(key) = self.cache_key() {
            self.inner.cache.invalidate(key);
        }
    }

    /// Replace `data` locally without touching the cache.
    pub fn set_data(&self, data: T) {
        self.inner.state.send_modify(|state| state.data = data);
    }

    pub fn state(&self) -> FetchState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> T {
        self.inner.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<FetchError> {
        self.inner.state.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.inner.state.subscribe()
    }

    pub fn last_params(&self) -> P {
        lock(&self.inner.last_params).clone()
    }

    /// Register the success hook, replacing any previous one.
    pub fn on_success(&self, hook: impl Fn(&T) + Send + Sync + 'static) {
        lock(&self.inner.hooks).on_success = Some(Arc::new(hook));
    }

    /// Register the error hook, replacing any previous one.
    pub fn on_error(&self, hook: impl Fn(&FetchError) + Send + Sync + 'static) {
        lock(&self.inner.hooks).on_error = Some(Arc::new(hook));
    }

    fn default_value(&self) -> T {
        self.inner.options.default_value.clone()
    }

    /// Make a new call current. Bumping the generation is what cancels the
    /// previous call.
    fn begin(&self, params: P) -> u64 {
        *lock(&self.inner.last_params) = params;
        let mut generation = 0;
        self.inner.state.send_modify(|state| {
            state.generation += 1;
            generation = state.generation;
            state.loading = true;
            state.error = None;
        });
        generation
    }

    fn spawn_run(&self, generation: u64, params: P) -> JoinHandle<T> {
        let this = self.clone();
        tokio::spawn(async move { this.run(generation, params).await })
    }

    async fn run(&self, generation: u64, params: P) -> T {
        let inner = &self.inner;
        let superseded = wait_superseded(inner.state.subscribe(), generation);
        let torn_down = wait_teardown(inner.teardown.subscribe());

        let mut settlement = tokio::select! {
            result = inner.retrieve.retrieve(params) => Settlement::Finished(result),
            () = superseded => Settlement::Superseded,
            () = torn_down => Settlement::TornDown,
        };
        if matches!(settlement, Settlement::Finished(_)) && self.is_unmounted() {
            settlement = Settlement::TornDown;
        }

        match settlement {
            Settlement::Superseded => {
                tracing::trace!(generation, "fetch superseded by a newer call");
                self.default_value()
            }
            Settlement::TornDown | Settlement::Finished(Err(FetchError::Cancelled)) => {
                inner.state.send_if_modified(|state| {
                    if state.generation == generation && state.loading {
                        state.loading = false;
                        true
                    } else {
                        false
                    }
                });
                self.default_value()
            }
            Settlement::Finished(Ok(data)) => self.apply_success(generation, data),
            Settlement::Finished(Err(err)) => self.apply_failure(generation, err),
        }
    }

    fn apply_success(&self, generation: u64, data: T) -> T {
        let inner = &self.inner;
        let applied = inner.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            if let Some(key) = inner.options.cache_key.as_deref() {
                inner.cache.set(key, data.clone(), inner.options.cache_ttl);
            }
            state.data = data.clone();
            state.loading = false;
            state.error = None;
            true
        });
        if !applied {
            tracing::trace!(generation, "discarding result of superseded fetch");
            return self.default_value();
        }

        let hook = lock(&inner.hooks).on_success.clone();
        if let Some(hook) = hook {
            hook(&data);
        }
        data
    }

    fn apply_failure(&self, generation: u64, err: FetchError) -> T {
        let inner = &self.inner;
        let applied = inner.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.loading = false;
            state.error = Some(err.clone());
            true
        });
        if !applied {
            tracing::trace!(generation, "discarding error of superseded fetch");
            return self.default_value();
        }

        tracing::warn!(
            key = ?self.cache_key(),
            status = err.status_code(),
            error = %err,
            "fetch failed"
        );
        let hook = lock(&inner.hooks).on_error.clone();
        if let Some(hook) = hook {
            hook(&err);
        }
        self.default_value()
    }

    fn start_ticker(&self, period: Duration) {
        let weak: Weak<Inner<P, T>> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let orchestrator = FetchOrchestrator { inner };
                if orchestrator.start_refetch().is_none() {
                    break;
                }
            }
        });
        *lock(&self.inner.ticker) = Some(handle);
    }
}

impl<P, T> FetchOrchestrator<P, T> {
    pub fn cache_key(&self) -> Option<&str> {
        self.inner.options.cache_key.as_deref()
    }

    /// Cancel the outstanding retrieval and stop periodic refresh. Later
    /// calls resolve to the default value without retrieving.
    pub fn unmount(&self) {
        if self.inner.unmounted.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(ticker) = lock(&self.inner.ticker).take() {
            ticker.abort();
        }
        self.inner.teardown.send_replace(true);
    }

    pub fn is_unmounted(&self) -> bool {
        self.inner.unmounted.load(Ordering::Acquire)
    }
}

impl<P, T: Emptiness> FetchOrchestrator<P, T> {
    /// Whether `data` is an empty sequence or absent.
    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().data.is_empty_value()
    }
}

async fn wait_superseded<T>(mut state: watch::Receiver<FetchState<T>>, generation: u64) {
    let _ = state.wait_for(|s| s.generation != generation).await;
}

async fn wait_teardown(mut teardown: watch::Receiver<bool>) {
    let _ = teardown.wait_for(|down| *down).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    type Params = (u64, String);

    /// Sleeps `delay` ms, then returns `value`; `fail:<status>` fails.
    fn scripted() -> impl Retrieve<Params, String> {
        |(delay, value): Params| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            match value.strip_prefix("fail:") {
                Some(code) => Err(FetchError::status(
                    code.parse().unwrap_or(500),
                    "scripted failure",
                )),
                None => Ok(value),
            }
        }
    }

    fn counting(calls: Arc<AtomicUsize>) -> impl Retrieve<(), Vec<String>> {
        move |_: ()| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(vec![format!("call-{}", n)])
            }
        }
    }

    fn deferred(cache: Arc<ResultCache>) -> FetchOrchestrator<Params, String> {
        FetchOrchestrator::mount(scripted(), cache, FetchOptions::new(String::new()).deferred())
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_call_wins_over_slower_earlier_call() {
        let fetch = deferred(Arc::new(ResultCache::in_memory()));

        let first = tokio::spawn({
            let fetch = fetch.clone();
            async move { fetch.execute((500, "A".to_string())).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = fetch.execute((50, "B".to_string())).await;

        assert_eq!(second, "B");
        assert_eq!(first.await.unwrap(), "");
        tokio::time::sleep(Duration::from_millis(600)).await;

        let state = fetch.state();
        assert_eq!(state.data, "B");
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_failure_never_sets_error() {
        let fetch = deferred(Arc::new(ResultCache::in_memory()));

        let first = tokio::spawn({
            let fetch = fetch.clone();
            async move { fetch.execute((100, "fail:500".to_string())).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        fetch.execute((200, "ok".to_string())).await;
        first.await.unwrap();

        assert!(fetch.error().is_none());
        assert_eq!(fetch.data(), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_cancels_silently() {
        let fetch = deferred(Arc::new(ResultCache::in_memory()));

        let pending = tokio::spawn({
            let fetch = fetch.clone();
            async move { fetch.execute((1_000, "late".to_string())).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(fetch.is_loading());

        fetch.unmount();
        assert_eq!(pending.await.unwrap(), "");

        let state = fetch.state();
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(state.data, "");
        assert_eq!(fetch.execute((0, "after".to_string())).await, "");
        assert_eq!(fetch.data(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_execute_still_settles() {
        let fetch = deferred(Arc::new(ResultCache::in_memory()));

        let timed_out = tokio::time::timeout(
            Duration::from_secs(1),
            fetch.execute((10_000, "slow".to_string())),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(fetch.is_loading());

        tokio::time::sleep(Duration::from_secs(3_600)).await;
        let state = fetch.state();
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(state.data, "slow");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_error_from_retrieval_is_not_stored() {
        let retrieve = |_: ()| async { Err::<Vec<String>, _>(FetchError::Cancelled) };
        let fetch = FetchOrchestrator::mount(
            retrieve,
            Arc::new(ResultCache::in_memory()),
            FetchOptions::new(vec!["default".to_string()]).deferred(),
        );
        assert_eq!(fetch.execute(()).await, vec!["default".to_string()]);
        assert!(fetch.error().is_none());
        assert!(!fetch.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_data() {
        let fetch = deferred(Arc::new(ResultCache::in_memory()));
        fetch.execute((0, "good".to_string())).await;

        let result = fetch.execute((0, "fail:503".to_string())).await;
        assert_eq!(result, "");

        let state = fetch.state();
        assert_eq!(state.data, "good");
        assert!(!state.loading);
        let err = state.error.expect("error recorded");
        assert_eq!(err.status_code(), 503);
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_call_clears_previous_error() {
        let fetch = deferred(Arc::new(ResultCache::in_memory()));
        fetch.execute((0, "fail:500".to_string())).await;
        assert!(fetch.error().is_some());
        fetch.execute((0, "fine".to_string())).await;
        assert!(fetch.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_cache_entry_used_on_mount() {
        let cache = Arc::new(ResultCache::in_memory());
        cache.set("teams_list", vec!["cached".to_string()], Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = FetchOrchestrator::mount(
            counting(calls.clone()),
            cache,
            FetchOptions::new(Vec::new()).with_cache("teams_list", Duration::from_secs(600)),
        );
        assert!(!fetch.is_loading());
        assert_eq!(fetch.data(), vec!["cached".to_string()]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_without_cache_retrieves_and_stores() {
        let cache = Arc::new(ResultCache::in_memory());
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = FetchOrchestrator::mount(
            counting(calls.clone()),
            cache.clone(),
            FetchOptions::new(Vec::new()).with_cache("stats", Duration::from_secs(60)),
        );
        assert!(fetch.is_loading());
        let mut rx = fetch.subscribe();
        rx.wait_for(|s| !s.loading).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.get::<Vec<String>>("stats").unwrap().payload,
            vec!["call-1".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_bypasses_fresh_cache() {
        let cache = Arc::new(ResultCache::in_memory());
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = FetchOrchestrator::mount(
            counting(calls.clone()),
            cache.clone(),
            FetchOptions::new(Vec::new())
                .with_cache("teams_list", Duration::from_secs(600))
                .deferred(),
        );

        cache.set("teams_list", vec!["fresh".to_string()], Duration::from_secs(600));
        let result = fetch.refetch().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result, vec!["call-1".to_string()]);
        assert_eq!(
            cache.get::<Vec<String>>("teams_list").unwrap().payload,
            vec!["call-1".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_reuses_last_params() {
        let fetch = deferred(Arc::new(ResultCache::in_memory()));
        fetch.execute((5, "page-2".to_string())).await;
        fetch.set_data("local".to_string());
        assert_eq!(fetch.refetch().await, "page-2");
        assert_eq!(fetch.last_params(), (5, "page-2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_registered_hooks_win() {
        let fetch = deferred(Arc::new(ResultCache::in_memory()));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        fetch.on_success(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = second.clone();
        fetch.on_success(move |value: &String| {
            assert_eq!(value, "done");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = errors.clone();
        fetch.on_error(move |err| {
            assert_eq!(err.status_code(), 404);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        fetch.execute((0, "done".to_string())).await;
        fetch.execute((0, "fail:404".to_string())).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_refresh_until_unmount() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = FetchOrchestrator::mount(
            counting(calls.clone()),
            Arc::new(ResultCache::in_memory()),
            FetchOptions::new(Vec::new()).with_refetch_interval(Duration::from_secs(1)),
        );

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(fetch.data(), vec!["call-4".to_string()]);

        fetch.unmount();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_empty_tracks_data() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = FetchOrchestrator::mount(
            counting(calls),
            Arc::new(ResultCache::in_memory()),
            FetchOptions::new(Vec::new()).deferred(),
        );
        assert!(fetch.is_empty());
        fetch.execute(()).await;
        assert!(!fetch.is_empty());
    }
}
