//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// Represents a single cache entry with payload and metadata.
///
/// The payload is an opaque JSON document: every entity's response shape goes
/// through the same untyped store, and typed views live at the binding layer.
/// Entries are serde-serializable because this struct is also the record format
/// of the durable backing tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored payload; never mutated by the cache
    pub data: Value,
    /// Creation timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expiry: u64,
    /// Whether this entry is mirrored to the durable backing store
    pub persist: bool,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl` from now.
    ///
    /// A zero TTL is clamped to one millisecond so that `expiry > timestamp`
    /// holds for every entry.
    ///
    /// # Arguments
    /// * `data` - The payload to store
    /// * `ttl` - Time to live
    /// * `persist` - Whether the entry is mirrored durably
    pub fn new(data: Value, ttl: Duration, persist: bool) -> Self {
        let now = current_timestamp_ms();
        let ttl_ms = (ttl.as_millis() as u64).max(1);

        Self {
            data,
            timestamp: now,
            expiry: now + ttl_ms,
            persist,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is invalid strictly after its expiry
    /// instant. At `now == expiry` the entry is still valid; from the next
    /// millisecond on it is logically absent.
    ///
    /// # Returns
    /// - `true` if the current time is strictly greater than the expiry time
    /// - `false` otherwise
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() > self.expiry
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds.
    ///
    /// This method is useful for debugging and statistics purposes.
    ///
    /// # Returns
    /// - `0` if the entry has expired
    /// - the remaining milliseconds otherwise
    pub fn ttl_remaining_ms(&self) -> u64 {
        let now = current_timestamp_ms();
        self.expiry.saturating_sub(now)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
