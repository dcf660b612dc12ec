//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the lifetime of the
//! application.
//!
//! # Tasks
//! - Expiry sweeper: removes expired cache entries at a configured interval

mod cleanup;

pub use cleanup::spawn_sweeper_task;
