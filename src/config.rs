//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default TTL in milliseconds for entries whose caller gives none
    pub default_ttl_ms: u64,
    /// Expiry sweeper interval in seconds
    pub sweep_interval_secs: u64,
    /// Serialized-size budget in bytes for a persisted entry
    pub persist_budget_bytes: usize,
    /// Location of the durable backing file, if persistence is enabled
    pub durable_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL_MS` - Default entry TTL in milliseconds (default: 300000)
    /// - `CACHE_SWEEP_INTERVAL` - Sweeper frequency in seconds (default: 60)
    /// - `CACHE_PERSIST_BUDGET` - Persisted-entry size budget in bytes (default: 5 MiB)
    /// - `CACHE_DURABLE_PATH` - Durable backing file path (default: none, memory-only)
    pub fn from_env() -> Self {
        Self {
            default_ttl_ms: env::var("CACHE_DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300_000),
            sweep_interval_secs: env::var("CACHE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            persist_budget_bytes: env::var("CACHE_PERSIST_BUDGET")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5 * 1024 * 1024),
            durable_path: env::var("CACHE_DURABLE_PATH").ok().map(PathBuf::from),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl_ms: 300_000,
            sweep_interval_secs: 60,
            persist_budget_bytes: 5 * 1024 * 1024,
            durable_path: None,
        }
    }
}
