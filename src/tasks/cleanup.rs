//! Expiry Sweeper Task
//!
//! Background task that periodically removes expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::query::SharedCache;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// Started once at application bootstrap; runs for the lifetime of the
/// process, sleeping for the configured interval between sweeps. Only the
/// in-memory tier is swept; durable records are validated lazily on `get`,
/// which bounds sweep cost to the in-memory set.
///
/// # Arguments
/// * `cache` - Shared cache handle
/// * `sweep_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task; `abort()` is the stop function for the
/// rare case of controlled teardown.
///
/// # Example
/// ```ignore
/// let cache = shared_cache(CacheStore::new());
/// let sweeper = spawn_sweeper_task(cache.clone(), 60);
/// // Later, during teardown:
/// sweeper.abort();
/// ```
pub fn spawn_sweeper_task(cache: SharedCache, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry sweeper with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut store = cache.write().await;
                store.clean_expired()
            };

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::query::shared_cache;
    use serde_json::json;

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache = shared_cache(CacheStore::new());

        {
            let mut store = cache.write().await;
            store.set("expire_soon", json!("v"), Duration::from_millis(200), false);
        }

        let handle = spawn_sweeper_task(cache.clone(), 1);

        // Wait for the entry to expire and a sweep to run
        tokio::time::sleep(Duration::from_millis(1500)).await;

        {
            let store = cache.read().await;
            assert_eq!(store.len(), 0, "expired entry should have been swept");
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweeper_preserves_valid_entries() {
        let cache = shared_cache(CacheStore::new());

        {
            let mut store = cache.write().await;
            store.set("long_lived", json!("v"), Duration::from_secs(3600), false);
        }

        let handle = spawn_sweeper_task(cache.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        {
            let mut store = cache.write().await;
            assert_eq!(store.get("long_lived"), Some(json!("v")));
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweeper_can_be_aborted() {
        let cache = shared_cache(CacheStore::new());

        let handle = spawn_sweeper_task(cache, 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "task should be finished after abort");
    }
}
