//! Tests for log sinks

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus_command_scheduler::core::{CallbackLogSink, InMemoryLogSink, LogLevel, LogSink, TracingLogSink};

#[test]
fn test_in_memory_log_sink() {
    let sink = InMemoryLogSink::new(10);

    sink.info("[feed] admitted Refresh");
    sink.error("[feed] failed Refresh", &anyhow::anyhow!("timeout").context("loading page 1"));

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].level, LogLevel::Info);
    assert_eq!(records[0].error, None);
    assert_eq!(records[1].level, LogLevel::Error);
    assert_eq!(records[1].message, "[feed] failed Refresh");
    assert_eq!(records[1].error.as_deref(), Some("loading page 1: timeout"));
}

#[test]
fn test_log_sink_overflow() {
    let sink = InMemoryLogSink::new(2);

    sink.info("one");
    sink.info("two");
    sink.info("three");

    assert_eq!(sink.messages(), vec!["two", "three"]); // First one popped
}

#[test]
fn test_zero_capacity_sink_keeps_nothing() {
    let sink = InMemoryLogSink::new(0);
    sink.info("dropped");
    assert!(sink.records().is_empty());
}

#[test]
fn test_callback_log_sink() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let infos = Arc::clone(&seen);
    let errors = Arc::clone(&seen);
    let sink = CallbackLogSink::new(
        move |message| infos.lock().push(format!("info {message}")),
        move |message, error| errors.lock().push(format!("error {message}: {error}")),
    );

    sink.info("started");
    sink.error("failed", &anyhow::anyhow!("boom"));

    assert_eq!(*seen.lock(), vec!["info started", "error failed: boom"]);
}

#[test]
fn test_tracing_sink_accepts_records() {
    let sink: Box<dyn LogSink> = Box::new(TracingLogSink);
    sink.info("no subscriber installed");
    sink.error("still fine", &anyhow::anyhow!("boom"));
}

#[test]
fn test_log_record_serializes() {
    let sink = InMemoryLogSink::new(1);
    sink.info("hello");
    let value = serde_json::to_value(&sink.records()[0]).expect("record serializes");
    assert_eq!(value["level"], "info");
    assert_eq!(value["message"], "hello");
}
