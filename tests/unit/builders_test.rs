//! Tests for builder modules

use prometheus_command_scheduler::builders::ManagerBuilder;
use prometheus_command_scheduler::config::{ManagerConfig, SchedulerConfig};
use prometheus_command_scheduler::core::SchedulerError;
use prometheus_command_scheduler::runtime::TokioSpawner;

#[test]
fn test_manager_builder_defaults() {
    let builder = ManagerBuilder::new("feed", 0_u32);
    assert_eq!(builder.name(), "feed");
    assert_eq!(builder.config().max_rescan_passes, ManagerConfig::default().max_rescan_passes);
}

#[test]
fn test_manager_builder_needs_a_runtime() {
    let err = ManagerBuilder::new("feed", 0_u32).build().expect_err("no spawner or parent");
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
    assert!(err.to_string().contains("scope `feed`"));
}

#[test]
fn test_manager_builder_validates_config() {
    let config = ManagerConfig {
        max_rescan_passes: 0,
        ..ManagerConfig::named("feed")
    };
    let result = ManagerBuilder::from_config(config, 0_u32)
        .spawner(TokioSpawner::with_worker_threads(1).expect("runtime builds"))
        .build();
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_manager_builder_from_scheduler_config() {
    let cfg = SchedulerConfig::from_json_str(r#"{ "scopes": { "feed": { "start_blocked": true } } }"#)
        .expect("valid config");

    let builder = ManagerBuilder::from_scheduler_config(&cfg, "feed", 0_u32).expect("scope exists");
    assert_eq!(builder.name(), "feed");
    assert!(builder.config().start_blocked);

    let missing = ManagerBuilder::from_scheduler_config(&cfg, "missing", 0_u32);
    assert!(matches!(missing, Err(SchedulerError::UnknownScope(_))));
}

#[tokio::test]
async fn test_manager_builder_applies_config() {
    let manager = ManagerBuilder::new("feed", 7_u32)
        .with_config(ManagerConfig {
            start_blocked: true,
            ..ManagerConfig::named("feed")
        })
        .spawner(TokioSpawner::current())
        .build()
        .expect("manager builds");

    assert_eq!(manager.state(), 7);
    assert!(manager.executions_blocked());
    assert_eq!(manager.config().name, "feed");
    assert_eq!(manager.controller().name(), "feed");

    let snapshot = serde_json::to_value(manager.snapshot()).expect("snapshot serializes");
    assert_eq!(snapshot["executions_blocked"], true);
    assert_eq!(snapshot["controller"]["scope"], "feed");
    assert_eq!(snapshot["controller"]["active"], true);
}
