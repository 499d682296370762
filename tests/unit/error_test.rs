//! Tests for error types

use prometheus_command_scheduler::core::SchedulerError;

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("name must not be empty".to_string());
    assert_eq!(format!("{}", err), "invalid configuration: name must not be empty");
}

#[test]
fn test_parse_error() {
    let err = SchedulerError::Parse("expected value".to_string());
    assert_eq!(format!("{}", err), "parse error: expected value");
}

#[test]
fn test_unknown_scope_error() {
    let err = SchedulerError::UnknownScope("feed".to_string());
    assert_eq!(format!("{}", err), "unknown scope: feed");
}

#[test]
fn test_scope_shut_down_error() {
    let err = SchedulerError::ScopeShutDown("root".to_string());
    assert_eq!(format!("{}", err), "scope `root` is shut down");
}
