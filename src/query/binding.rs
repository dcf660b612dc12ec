//! Query Binding Module
//!
//! A binding is one consumer's live association with a cache key and a
//! producer function. Activation serves a fresh cached value without calling
//! the producer; otherwise the producer runs on a spawned task and its result
//! is written back through the cache. Bindings track their own liveness so a
//! producer settling after deactivation mutates nothing, and stamp every
//! invocation with a generation so a superseded fetch can never overwrite a
//! newer one, whatever order the completions arrive in.
//!
//! Bindings are independent: two bindings over the same key each perform
//! their own lookup and, on miss, their own fetch. The underlying request is
//! never cancelled, only the handling of its result.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::SharedCache;

// == Query Options ==
/// Per-binding configuration.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// How long a produced value stays fresh
    pub ttl: Duration,
    /// When false, activation does nothing
    pub enabled: bool,
    /// When true, activation always fetches, even over a fresh entry
    pub refetch_on_mount: bool,
    /// Whether produced values are mirrored to the durable tier
    pub persist: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            enabled: true,
            refetch_on_mount: false,
            persist: false,
        }
    }
}

type Producer<T> =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send>> + Send + Sync>;

/// Observable binding state.
struct BindingState<T> {
    data: Option<T>,
    loading: bool,
    error: Option<Arc<anyhow::Error>>,
    live: bool,
    generation: u64,
}

impl<T> Default for BindingState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            live: true,
            generation: 0,
        }
    }
}

// == Query Binding ==
/// Per-consumer binding of a cache key to an asynchronous producer.
pub struct QueryBinding<T> {
    key: String,
    cache: SharedCache,
    producer: Producer<T>,
    options: QueryOptions,
    state: Arc<Mutex<BindingState<T>>>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl<T> QueryBinding<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    // == Constructor ==
    /// Creates a binding for `key` over the shared cache.
    ///
    /// A binding is tied to one key and one set of options for its whole
    /// life; a consumer whose key or options change identity creates a fresh
    /// binding and drops the old one.
    pub fn new<F, Fut>(
        cache: SharedCache,
        key: impl Into<String>,
        producer: F,
        options: QueryOptions,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            key: key.into(),
            cache,
            producer: Arc::new(move || {
                Box::pin(producer()) as Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send>>
            }),
            options,
            state: Arc::new(Mutex::new(BindingState::default())),
            in_flight: Mutex::new(None),
        }
    }

    // == Activate ==
    /// Brings the binding up.
    ///
    /// Unless disabled: a fresh cached entry is adopted immediately with no
    /// producer call (when `refetch_on_mount` is off); otherwise the producer
    /// is invoked on a spawned task and, on success, its result is written
    /// through the cache under this binding's TTL and persistence options.
    pub async fn activate(&self) {
        if !self.options.enabled {
            return;
        }

        if !self.options.refetch_on_mount {
            let cached = self.cache.write().await.get(&self.key);
            if let Some(value) = cached {
                match serde_json::from_value::<T>(value) {
                    Ok(data) => {
                        let mut state = self.lock_state();
                        state.data = Some(data);
                        state.loading = false;
                        state.error = None;
                        return;
                    }
                    Err(e) => {
                        // A payload cached by a consumer with a different
                        // shape; fetch as if absent.
                        warn!("Cached payload for '{}' does not fit consumer type: {}", self.key, e);
                    }
                }
            }
        }

        self.spawn_fetch();
    }

    // == Refetch ==
    /// Forces a round-trip: drops the current entry from the cache, then
    /// fetches regardless of freshness. The only caller-triggered path that
    /// bypasses TTL.
    pub async fn refetch(&self) {
        self.cache.write().await.delete(&self.key);
        self.spawn_fetch();
    }

    // == Deactivate ==
    /// Takes the binding down.
    ///
    /// Any producer still in flight settles into the void: its result is
    /// discarded without a cache write or a state update. The request itself
    /// is not cancelled; only its result handling is.
    pub fn deactivate(&self) {
        let mut state = self.lock_state();
        state.live = false;
        state.generation += 1;
    }

    // == Snapshots ==
    /// Returns the current value, if any.
    pub fn data(&self) -> Option<T> {
        self.lock_state().data.clone()
    }

    /// Returns true while a producer invocation is outstanding.
    pub fn is_loading(&self) -> bool {
        self.lock_state().loading
    }

    /// Returns the most recent producer error, if the last invocation failed.
    pub fn error(&self) -> Option<Arc<anyhow::Error>> {
        self.lock_state().error.clone()
    }

    /// Returns true until the binding is deactivated.
    pub fn is_live(&self) -> bool {
        self.lock_state().live
    }

    /// The cache key this binding is bound to.
    pub fn key(&self) -> &str {
        &self.key
    }

    // == Settled ==
    /// Waits for the most recently spawned producer invocation to finish
    /// handling its result.
    pub async fn settled(&self) {
        let handle = self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    // == Internals ==

    fn lock_state(&self) -> MutexGuard<'_, BindingState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawns one producer invocation stamped with a fresh generation.
    ///
    /// The result commits only if the binding is still live and no newer
    /// invocation has been issued since; completion order proves nothing.
    fn spawn_fetch(&self) {
        let generation = {
            let mut state = self.lock_state();
            if !state.live {
                return;
            }
            state.generation += 1;
            state.loading = true;
            state.error = None;
            state.generation
        };

        let fut = (self.producer)();
        let state = Arc::clone(&self.state);
        let cache = Arc::clone(&self.cache);
        let key = self.key.clone();
        let ttl = self.options.ttl;
        let persist = self.options.persist;

        let handle = tokio::spawn(async move {
            let result = fut.await;

            let superseded = {
                let state = state.lock().unwrap_or_else(|e| e.into_inner());
                !state.live || state.generation != generation
            };
            if superseded {
                debug!("Discarding settled producer for '{}'", key);
                return;
            }

            match result {
                Ok(value) => {
                    match serde_json::to_value(&value) {
                        Ok(payload) => {
                            cache.write().await.set(&key, payload, ttl, persist);
                        }
                        Err(e) => {
                            warn!("Produced value for '{}' is not cacheable: {}", key, e);
                        }
                    }

                    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                    if !state.live || state.generation != generation {
                        return;
                    }
                    state.data = Some(value);
                    state.loading = false;
                    state.error = None;
                }
                Err(e) => {
                    // The stale cache entry, if any, is left untouched.
                    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                    if !state.live || state.generation != generation {
                        return;
                    }
                    state.error = Some(Arc::new(e));
                    state.loading = false;
                }
            }
        });

        *self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }
}

impl<T> Drop for QueryBinding<T> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.live = false;
        state.generation += 1;
    }
}
