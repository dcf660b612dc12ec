//! Query Cache - A client-side request cache
//!
//! Provides TTL-bound caching of request results with optional durable
//! persistence, lifecycle-safe request bindings, and dependency-aware
//! invalidation.

pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod query;
pub mod tasks;

pub use cache::{CacheStore, DurableMedium, FileMedium, MemoryMedium};
pub use config::Config;
pub use query::{shared_cache, QueryBinding, QueryOptions, SharedCache};
pub use tasks::spawn_sweeper_task;
