//! Cache Module
//!
//! Provides the request cache core: in-memory entries with TTL expiration,
//! an optional durable backing tier, and pattern-based invalidation.

mod durable;
mod entry;
mod stats;
mod store;


// Re-export public types
pub use durable::{DurableMedium, FileMedium, MemoryMedium};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Prefix under which durable records are namespaced.
///
/// The durable medium may be shared with other writers; only keys under this
/// prefix belong to the cache, and pattern matching strips it before
/// comparing against caller-visible keys.
pub const DURABLE_NAMESPACE: &str = "qc:";

/// Default serialized-size budget for a persisted entry.
pub const DEFAULT_PERSIST_BUDGET: usize = 5 * 1024 * 1024; // 5 MiB
