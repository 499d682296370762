//! Tests for configuration validation

use std::collections::HashMap;

use prometheus_command_scheduler::config::{ManagerConfig, SchedulerConfig, DEFAULT_MAX_RESCAN_PASSES};
use prometheus_command_scheduler::core::{SchedulerError, ThreadAffinity};

#[test]
fn test_manager_config_defaults() {
    let config = ManagerConfig::default();
    assert_eq!(config.name, "default");
    assert_eq!(config.max_rescan_passes, DEFAULT_MAX_RESCAN_PASSES);
    assert_eq!(config.thread_affinity, ThreadAffinity::Any);
    assert!(!config.start_blocked);
    assert!(config.validate().is_ok());
}

#[test]
fn test_manager_config_invalid_rescan_passes() {
    let invalid = ManagerConfig {
        max_rescan_passes: 0,
        ..ManagerConfig::named("feed")
    };
    assert!(matches!(invalid.validate(), Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_manager_config_invalid_name() {
    let invalid = ManagerConfig::named("  ");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_manager_config_from_json() {
    let config = ManagerConfig::from_json_str(r#"{ "name": "feed", "thread_affinity": "pinned" }"#)
        .expect("valid json");
    assert_eq!(config.name, "feed");
    assert_eq!(config.thread_affinity, ThreadAffinity::Pinned);
    assert_eq!(config.max_rescan_passes, DEFAULT_MAX_RESCAN_PASSES);
}

#[test]
fn test_manager_config_from_json_rejects_garbage() {
    assert!(matches!(ManagerConfig::from_json_str("{ nope"), Err(SchedulerError::Parse(_))));
    assert!(matches!(
        ManagerConfig::from_json_str(r#"{ "max_rescan_passes": 0 }"#),
        Err(SchedulerError::InvalidConfig(_))
    ));
}

#[test]
fn test_manager_config_from_env_defaults() {
    // None of the scheduler variables are set in the test environment.
    let config = ManagerConfig::from_env("env-scope").expect("defaults are valid");
    assert_eq!(config.name, "env-scope");
}

#[test]
fn test_scheduler_config_validation() {
    let mut scopes = HashMap::new();
    scopes.insert("feed".to_string(), ManagerConfig::default());

    let config = SchedulerConfig {
        root: "root".to_string(),
        scopes,
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_scheduler_config_empty_scopes() {
    let config = SchedulerConfig {
        root: "root".to_string(),
        scopes: HashMap::new(),
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "scopes": {
            "feed": { "max_rescan_passes": 16 },
            "profile": {}
        }
    }"#;

    let config = SchedulerConfig::from_json_str(json).expect("valid json");
    assert_eq!(config.root, "root");

    let feed = config.scope("feed").expect("feed is configured");
    assert_eq!(feed.name, "feed");
    assert_eq!(feed.max_rescan_passes, 16);
    assert!(matches!(config.scope("missing"), Err(SchedulerError::UnknownScope(_))));
}

#[test]
fn test_scheduler_config_reports_invalid_scope() {
    let json = r#"{ "scopes": { "feed": { "max_rescan_passes": 0 } } }"#;
    let err = SchedulerConfig::from_json_str(json).expect_err("zero passes is invalid");
    assert!(err.to_string().contains("scope `feed` invalid"));
}
