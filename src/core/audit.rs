//! Log sink implementations.
//!
//! A sink observes what the command manager decides: admissions, skips, starts
//! and failures. Sinks never influence scheduling.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::error::CommandError;
use crate::util::clock::now_ms;

/// Severity of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Informational trace.
    Info,
    /// A command body failed.
    Error,
}

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Severity.
    pub level: LogLevel,
    /// Rendered message.
    pub message: String,
    /// Rendered error chain for error records.
    pub error: Option<String>,
    /// Timestamp milliseconds.
    pub at_ms: u128,
}

/// Logging sink abstraction with an info channel and an error channel.
pub trait LogSink: Send + Sync {
    /// Record an informational message.
    fn info(&self, message: &str);
    /// Record a failure together with the error that caused it.
    fn error(&self, message: &str, error: &CommandError);
}

/// Sink that forwards to `tracing` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn info(&self, message: &str) {
        tracing::info!(target: "command_scheduler::sink", "{message}");
    }

    fn error(&self, message: &str, error: &CommandError) {
        tracing::error!(target: "command_scheduler::sink", "{message}: {error:#}");
    }
}

type InfoFn = Box<dyn Fn(&str) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&str, &CommandError) + Send + Sync>;

/// Sink built from a pair of callbacks.
pub struct CallbackLogSink {
    on_info: InfoFn,
    on_error: ErrorFn,
}

impl CallbackLogSink {
    /// Create a sink from an info callback and an error callback.
    pub fn new(
        on_info: impl Fn(&str) + Send + Sync + 'static,
        on_error: impl Fn(&str, &CommandError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_info: Box::new(on_info),
            on_error: Box::new(on_error),
        }
    }
}

impl fmt::Debug for CallbackLogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackLogSink").finish_non_exhaustive()
    }
}

impl LogSink for CallbackLogSink {
    fn info(&self, message: &str) {
        (self.on_info)(message);
    }

    fn error(&self, message: &str, error: &CommandError) {
        (self.on_error)(message, error);
    }
}

/// In-memory sink for testing and dev.
#[derive(Debug)]
pub struct InMemoryLogSink {
    records: Mutex<VecDeque<LogRecord>>,
    max_records: usize,
}

impl InMemoryLogSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_records)),
            max_records,
        }
    }

    /// Retrieve a snapshot of stored records.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Messages of stored records, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.records.lock().iter().map(|record| record.message.clone()).collect()
    }

    fn push(&self, record: LogRecord) {
        if self.max_records == 0 {
            return;
        }
        let mut records = self.records.lock();
        if records.len() >= self.max_records {
            records.pop_front();
        }
        records.push_back(record);
    }
}

impl LogSink for InMemoryLogSink {
    fn info(&self, message: &str) {
        self.push(LogRecord {
            level: LogLevel::Info,
            message: message.to_string(),
            error: None,
            at_ms: now_ms(),
        });
    }

    fn error(&self, message: &str, error: &CommandError) {
        self.push(LogRecord {
            level: LogLevel::Error,
            message: message.to_string(),
            error: Some(format!("{error:#}")),
            at_ms: now_ms(),
        });
    }
}
