//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced while configuring or assembling scheduling scopes.
///
/// Command execution failures are not represented here: they are routed to the
/// failing command's `on_fail` hook and never surface to the caller.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration values failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Configuration input could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
    /// A scope name was not present in the scheduler configuration.
    #[error("unknown scope: {0}")]
    UnknownScope(String),
    /// The parent scope was already torn down.
    #[error("scope `{0}` is shut down")]
    ScopeShutDown(String),
}

/// Error raised by a command body; handed to `on_fail` and the log sink.
pub type CommandError = anyhow::Error;
