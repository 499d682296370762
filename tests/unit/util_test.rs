//! Tests for utility functions

use prometheus_command_scheduler::util::{init_tracing, now_ms};

#[test]
fn test_now_ms_is_monotonic_enough() {
    let first = now_ms();
    let second = now_ms();
    assert!(first > 0);
    assert!(second >= first);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}
