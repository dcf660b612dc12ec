//! Cache Store Module
//!
//! The cache facade: an in-memory entry map fronting an optional durable
//! backing medium. Owns TTL bookkeeping, the persistence decision, quota
//! enforcement, namespace mapping, and pattern-based invalidation.
//!
//! Callers see a single key space. Internally the durable tier indexes
//! records under `DURABLE_NAMESPACE + key`; every operation that crosses the
//! tier boundary maps between the two key spaces, and pattern matching strips
//! the namespace prefix before comparing. Durable failures of any kind
//! degrade the operation to memory-only behavior and are logged, never
//! surfaced to the caller.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, DurableMedium, FileMedium, DURABLE_NAMESPACE};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Main cache facade combining in-memory storage with an optional durable tier.
pub struct CacheStore {
    /// Key-value storage; the source of truth while the process is alive
    entries: HashMap<String, CacheEntry>,
    /// Optional durable backing medium
    durable: Option<Box<dyn DurableMedium>>,
    /// Serialized-size budget in bytes for a single persisted entry
    persist_budget: usize,
    /// Performance statistics
    stats: CacheStats,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.entries.len())
            .field("durable", &self.durable.is_some())
            .field("persist_budget", &self.persist_budget)
            .finish()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    // == Constructors ==
    /// Creates a memory-only store with the default persist budget.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            durable: None,
            persist_budget: crate::cache::DEFAULT_PERSIST_BUDGET,
            stats: CacheStats::new(),
        }
    }

    /// Creates a store backed by the given durable medium.
    pub fn with_durable(medium: impl DurableMedium + 'static) -> Self {
        Self {
            durable: Some(Box::new(medium)),
            ..Self::new()
        }
    }

    /// Creates a store from configuration, opening a file medium when a
    /// durable path is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut store = match &config.durable_path {
            Some(path) => Self::with_durable(FileMedium::open(path)?),
            None => Self::new(),
        };
        store.persist_budget = config.persist_budget_bytes;
        Ok(store)
    }

    /// Overrides the per-entry persist budget.
    pub fn set_persist_budget(&mut self, bytes: usize) {
        self.persist_budget = bytes;
    }

    // == Set ==
    /// Stores a payload under `key`, expiring `ttl` from now.
    ///
    /// Any prior entry at `key` is overwritten wholesale. If `persist` is set
    /// and a durable medium is attached, the entry is mirrored there; a mirror
    /// write that fails or exceeds the persist budget is skipped and the
    /// in-memory copy remains authoritative for this process lifetime.
    pub fn set(&mut self, key: &str, data: Value, ttl: Duration, persist: bool) {
        let entry = CacheEntry::new(data, ttl, persist);

        if persist {
            self.mirror_durably(key, &entry);
        }

        self.entries.insert(key.to_string(), entry);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Retrieves the payload stored under `key`, if a valid entry exists.
    ///
    /// The in-memory tier is consulted first; an expired in-memory entry is
    /// scrubbed from both tiers and treated as a miss. On a memory miss the
    /// durable tier is consulted: a live record is promoted back into memory,
    /// while corrupt or expired records are scrubbed. Never returns an
    /// expired payload.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                let mirrored = entry.persist;
                self.entries.remove(key);
                if mirrored {
                    self.remove_durable_record(key);
                }
                self.stats.set_total_entries(self.entries.len());
                self.stats.record_miss();
                return None;
            }

            let data = entry.data.clone();
            self.stats.record_hit();
            return Some(data);
        }

        match self.hydrate(key) {
            Some(data) => {
                self.stats.record_hydration();
                self.stats.record_hit();
                Some(data)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Has ==
    /// Returns true if a valid entry exists under `key`.
    ///
    /// Defined in terms of `get`; durable hydration may occur as a side
    /// effect, nothing else.
    pub fn has(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }

    // == Delete ==
    /// Removes the entry under `key` from both tiers.
    ///
    /// Idempotent; missing keys are not an error.
    pub fn delete(&mut self, key: &str) {
        self.entries.remove(key);
        self.remove_durable_record(key);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Clear ==
    /// Removes entries from both tiers.
    ///
    /// Without a pattern, both tiers are emptied entirely. With a pattern,
    /// every key containing it as a substring is removed; durable keys are
    /// matched with their namespace prefix stripped, so both tiers see the
    /// same key space.
    pub fn clear(&mut self, pattern: Option<&str>) {
        match pattern {
            None => {
                self.entries.clear();
                self.clear_durable(|_| true);
            }
            Some(pattern) => {
                self.entries.retain(|key, _| !key.contains(pattern));
                self.clear_durable(|bare_key| bare_key.contains(pattern));
            }
        }
        self.stats.set_total_entries(self.entries.len());
    }

    // == Clean Expired ==
    /// Removes all expired entries from the in-memory tier.
    ///
    /// The durable tier is not scanned; its records are validated lazily on
    /// `get`, which bounds sweep cost to the in-memory set.
    ///
    /// Returns the number of entries removed.
    pub fn clean_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.entries.remove(&key);
        }

        self.stats.set_total_entries(self.entries.len());
        count
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Length ==
    /// Returns the current number of in-memory entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the in-memory tier is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Durable Tier Internals ==

    fn namespaced(key: &str) -> String {
        format!("{}{}", DURABLE_NAMESPACE, key)
    }

    /// Mirrors an entry into the durable tier, absorbing every failure mode.
    fn mirror_durably(&mut self, key: &str, entry: &CacheEntry) {
        if self.durable.is_none() {
            return;
        }

        let serialized = match serde_json::to_string(entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Skipping durable write for '{}': serialization failed: {}", key, e);
                self.stats.record_persist_failure();
                return;
            }
        };

        if serialized.len() > self.persist_budget {
            warn!(
                "Skipping durable write for '{}': {} bytes exceeds budget of {} bytes",
                key,
                serialized.len(),
                self.persist_budget
            );
            self.stats.record_persist_failure();
            return;
        }

        let namespaced = Self::namespaced(key);
        let Some(durable) = self.durable.as_mut() else {
            return;
        };

        match durable.write(&namespaced, &serialized) {
            Ok(()) => {}
            Err(CacheError::QuotaExceeded(msg)) => {
                // Evict the whole namespace and retry once; memory stays
                // authoritative either way.
                warn!("Durable quota hit for '{}' ({}), evicting namespace", key, msg);
                self.clear_durable(|_| true);
                let Some(durable) = self.durable.as_mut() else {
                    return;
                };
                if let Err(e) = durable.write(&namespaced, &serialized) {
                    warn!("Durable write for '{}' failed after eviction: {}", key, e);
                    self.stats.record_persist_failure();
                }
            }
            Err(e) => {
                warn!("Durable write for '{}' failed: {}", key, e);
                self.stats.record_persist_failure();
            }
        }
    }

    /// Attempts to promote a durable record into the in-memory tier.
    ///
    /// Corrupt and expired records are scrubbed on sight.
    fn hydrate(&mut self, key: &str) -> Option<Value> {
        let namespaced = Self::namespaced(key);
        let raw = match self.durable.as_ref()?.read(&namespaced) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Durable read for '{}' failed: {}", key, e);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Scrubbing corrupt durable record for '{}': {}", key, e);
                self.remove_durable_record(key);
                return None;
            }
        };

        if entry.is_expired() {
            debug!("Scrubbing expired durable record for '{}'", key);
            self.remove_durable_record(key);
            return None;
        }

        let data = entry.data.clone();
        self.entries.insert(key.to_string(), entry);
        self.stats.set_total_entries(self.entries.len());
        Some(data)
    }

    /// Removes the durable record for `key`, absorbing medium failures.
    fn remove_durable_record(&mut self, key: &str) {
        if let Some(durable) = self.durable.as_mut() {
            let namespaced = Self::namespaced(key);
            if let Err(e) = durable.remove(&namespaced) {
                warn!("Durable remove for '{}' failed: {}", key, e);
            }
        }
    }

    /// Removes every namespaced durable record whose bare key matches the
    /// predicate. Keys outside our namespace are left alone.
    fn clear_durable(&mut self, matches: impl Fn(&str) -> bool) {
        let Some(durable) = self.durable.as_mut() else {
            return;
        };

        let keys = match durable.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Durable enumeration failed: {}", e);
                return;
            }
        };

        for namespaced in keys {
            let Some(bare) = namespaced.strip_prefix(DURABLE_NAMESPACE) else {
                continue;
            };
            if matches(bare) {
                if let Err(e) = durable.remove(&namespaced) {
                    warn!("Durable remove for '{}' failed: {}", bare, e);
                }
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryMedium;
    use serde_json::json;
    use std::thread::sleep;

    #[test]
    fn test_store_new() {
        let store = CacheStore::new();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = CacheStore::new();

        store.set("products:all", json!([{"id": 1}]), Duration::from_secs(300), false);
        let value = store.get("products:all").unwrap();

        assert_eq!(value, json!([{"id": 1}]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = CacheStore::new();
        assert!(store.get("nonexistent").is_none());
    }

    #[test]
    fn test_store_has() {
        let mut store = CacheStore::new();

        store.set("units:all", json!(["kg"]), Duration::from_secs(300), false);
        assert!(store.has("units:all"));
        assert!(!store.has("products:all"));
    }

    #[test]
    fn test_store_overwrite_replaces_data_and_expiry() {
        let mut store = CacheStore::new();

        store.set("k", json!("A"), Duration::from_secs(1), false);
        store.set("k", json!("B"), Duration::from_secs(600), false);

        assert_eq!(store.get("k").unwrap(), json!("B"));
        assert_eq!(store.len(), 1);

        // The expiry comes from the second TTL alone
        sleep(Duration::from_millis(1100));
        assert_eq!(store.get("k").unwrap(), json!("B"));
    }

    #[test]
    fn test_store_delete_is_idempotent() {
        let mut store = CacheStore::new();

        store.set("k", json!(1), Duration::from_secs(300), false);
        store.delete("k");
        assert!(store.get("k").is_none());

        // Deleting again is fine
        store.delete("k");
        store.delete("never-existed");
    }

    #[test]
    fn test_store_ttl_expiration() {
        let mut store = CacheStore::new();

        store.set("k", json!("v"), Duration::from_millis(50), false);
        assert!(store.get("k").is_some());

        sleep(Duration::from_millis(80));

        assert!(store.get("k").is_none());
        assert_eq!(store.len(), 0, "expired entry is removed on get");
    }

    #[test]
    fn test_store_clean_expired() {
        let mut store = CacheStore::new();

        store.set("short", json!(1), Duration::from_millis(50), false);
        store.set("long", json!(2), Duration::from_secs(300), false);

        sleep(Duration::from_millis(80));

        let removed = store.clean_expired();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("long").is_some());
    }

    #[test]
    fn test_store_clear_all() {
        let mut store = CacheStore::new();

        store.set("a", json!(1), Duration::from_secs(300), false);
        store.set("b", json!(2), Duration::from_secs(300), false);

        store.clear(None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_clear_pattern() {
        let mut store = CacheStore::new();

        store.set("products:all", json!(1), Duration::from_secs(300), false);
        store.set("products:cat=3", json!(2), Duration::from_secs(300), false);
        store.set("units:all", json!(3), Duration::from_secs(300), false);

        store.clear(Some("products"));

        assert!(store.get("products:all").is_none());
        assert!(store.get("products:cat=3").is_none());
        assert!(store.get("units:all").is_some());
    }

    #[test]
    fn test_store_durable_mirror_and_hydration() {
        let medium = MemoryMedium::new();
        let mut store = CacheStore::with_durable(medium.clone());

        store.set("products:all", json!([1, 2]), Duration::from_secs(300), true);

        // A fresh store over the same medium simulates a process restart
        let mut reloaded = CacheStore::with_durable(medium);
        assert_eq!(reloaded.get("products:all").unwrap(), json!([1, 2]));
        assert_eq!(reloaded.stats().hydrations, 1);
    }

    #[test]
    fn test_store_non_persisted_entry_not_mirrored() {
        let medium = MemoryMedium::new();
        let mut store = CacheStore::with_durable(medium.clone());

        store.set("transient", json!(1), Duration::from_secs(300), false);

        let mut reloaded = CacheStore::with_durable(medium);
        assert!(reloaded.get("transient").is_none());
    }

    #[test]
    fn test_store_corrupt_durable_record_is_scrubbed() {
        let mut medium = MemoryMedium::new();
        medium.write("qc:broken", "{not json").unwrap();

        let mut store = CacheStore::with_durable(medium.clone());
        assert!(store.get("broken").is_none());

        // The record was removed on sight
        assert_eq!(medium.read("qc:broken").unwrap(), None);
    }

    #[test]
    fn test_store_expired_durable_record_is_scrubbed() {
        let medium = MemoryMedium::new();
        let mut store = CacheStore::with_durable(medium.clone());
        store.set("p:1", json!({"name": "A"}), Duration::from_millis(40), true);

        sleep(Duration::from_millis(70));

        let mut reloaded = CacheStore::with_durable(medium.clone());
        assert!(reloaded.get("p:1").is_none());
        assert_eq!(medium.read("qc:p:1").unwrap(), None);
    }

    #[test]
    fn test_store_persist_budget_skips_oversized_write() {
        let medium = MemoryMedium::new();
        let mut store = CacheStore::with_durable(medium.clone());
        store.set_persist_budget(16);

        store.set(
            "reports:sales",
            json!({"rows": ["a long enough payload to blow the budget"]}),
            Duration::from_secs(300),
            true,
        );

        // Memory stays authoritative, the mirror was skipped
        assert!(store.get("reports:sales").is_some());
        assert_eq!(medium.read("qc:reports:sales").unwrap(), None);
        assert_eq!(store.stats().persist_failures, 1);
    }

    #[test]
    fn test_store_quota_exhaustion_evicts_and_retries() {
        let medium = MemoryMedium::with_quota(200);
        let mut store = CacheStore::with_durable(medium.clone());

        store.set("a", json!("0123456789012345678901234567890123456789"), Duration::from_secs(300), true);
        assert!(medium.read("qc:a").unwrap().is_some());

        // This write would not fit alongside the first record; the namespace
        // is evicted and the write retried.
        store.set("b", json!("0123456789012345678901234567890123456789"), Duration::from_secs(300), true);

        assert_eq!(medium.read("qc:a").unwrap(), None);
        assert!(medium.read("qc:b").unwrap().is_some());
        // Both entries are still served from memory
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_some());
    }

    #[test]
    fn test_store_clear_pattern_spans_both_tiers() {
        let mut medium = MemoryMedium::new();
        // A foreign record outside our namespace must survive untouched
        medium.write("other-app:products:all", "keep").unwrap();

        let mut store = CacheStore::with_durable(medium.clone());
        store.set("products:all", json!(1), Duration::from_secs(300), true);
        store.set("units:all", json!(2), Duration::from_secs(300), true);

        store.clear(Some("products"));

        assert_eq!(medium.read("qc:products:all").unwrap(), None);
        assert!(medium.read("qc:units:all").unwrap().is_some());
        assert!(medium.read("other-app:products:all").unwrap().is_some());
    }

    #[test]
    fn test_store_clear_all_spans_both_tiers() {
        let mut medium = MemoryMedium::new();
        medium.write("other-app:session", "keep").unwrap();

        let mut store = CacheStore::with_durable(medium.clone());
        store.set("products:all", json!(1), Duration::from_secs(300), true);

        store.clear(None);

        assert!(store.is_empty());
        assert_eq!(medium.read("qc:products:all").unwrap(), None);
        assert!(medium.read("other-app:session").unwrap().is_some());
    }

    #[test]
    fn test_store_delete_spans_both_tiers() {
        let medium = MemoryMedium::new();
        let mut store = CacheStore::with_durable(medium.clone());

        store.set("customers:all", json!([]), Duration::from_secs(300), true);
        store.delete("customers:all");

        assert_eq!(medium.read("qc:customers:all").unwrap(), None);
    }

    #[test]
    fn test_store_stats() {
        let mut store = CacheStore::new();

        store.set("k", json!(1), Duration::from_secs(300), false);
        store.get("k"); // hit
        store.get("missing"); // miss

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_store_from_config_memory_only() {
        let config = Config::default();
        let store = CacheStore::from_config(&config).unwrap();
        assert!(store.is_empty());
    }
}
