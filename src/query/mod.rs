//! Query Module
//!
//! The consumer-facing coordination layer: per-consumer bindings that tie a
//! cache key to an asynchronous producer, serving fresh cached values without
//! a fetch and writing producer results back through the cache facade.

mod binding;

pub use binding::{QueryBinding, QueryOptions};

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::CacheStore;

/// Process-wide handle to the cache facade.
///
/// Constructed once at the application's composition root and injected into
/// every binding, invalidation helper, and the sweeper. Each facade call runs
/// to completion under the lock, so facade operations are atomic with respect
/// to one another.
pub type SharedCache = Arc<RwLock<CacheStore>>;

/// Wraps a cache store into a shareable handle.
pub fn shared_cache(store: CacheStore) -> SharedCache {
    Arc::new(RwLock::new(store))
}
