//! Configuration models for scheduling scopes.

pub mod manager;

pub use manager::{ManagerConfig, SchedulerConfig, DEFAULT_MAX_RESCAN_PASSES};
