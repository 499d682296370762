//! Nested scopes sharing one root controller.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use prometheus_command_scheduler::builders::{build_managers, ManagerBuilder};
use prometheus_command_scheduler::config::SchedulerConfig;
use prometheus_command_scheduler::core::{
    Command, CommandError, CommandManager, ExecutionController, SchedulerError, StateAccess, Strategy,
};
use prometheus_command_scheduler::runtime::{Spawn, TokioSpawner};

#[derive(Debug, Clone, Default, PartialEq)]
struct Ledger {
    running: BTreeSet<&'static str>,
    done: Vec<&'static str>,
}

struct Step {
    label: &'static str,
    strategy: Strategy,
    gate: Option<Arc<Semaphore>>,
}

impl Step {
    fn new(label: &'static str, strategy: Strategy) -> Self {
        Self {
            label,
            strategy,
            gate: None,
        }
    }

    fn gated(mut self, gate: &Arc<Semaphore>) -> Self {
        self.gate = Some(Arc::clone(gate));
        self
    }
}

#[async_trait]
impl Command<Ledger> for Step {
    type Output = ();

    fn strategy(&self) -> Option<&Strategy> {
        Some(&self.strategy)
    }

    fn name(&self) -> String {
        self.label.to_string()
    }

    fn on_starting(&self, mut state: Ledger) -> Ledger {
        state.running.insert(self.label);
        state
    }

    async fn execute(&self, _state: StateAccess<Ledger>) -> Result<(), CommandError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        Ok(())
    }

    fn on_success(&self, mut state: Ledger, _output: ()) -> Ledger {
        state.done.push(self.label);
        state
    }

    fn on_finished(&self, mut state: Ledger) -> Ledger {
        state.running.remove(self.label);
        state
    }
}

fn spawner() -> Arc<dyn Spawn> {
    Arc::new(TokioSpawner::current())
}

fn root() -> ExecutionController<()> {
    ExecutionController::new("root", spawner())
}

fn child(name: &str, root: &ExecutionController<()>) -> CommandManager<Ledger> {
    ManagerBuilder::new(name, Ledger::default())
        .parent(root)
        .build()
        .expect("child scope builds")
}

fn gate() -> Arc<Semaphore> {
    Arc::new(Semaphore::new(0))
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_in_one_scope_holds_back_a_sibling_scope() {
    let root = root();
    let left = child("left", &root);
    let right = child("right", &root);
    let gate = gate();

    left.post_command(Step::new("report", Strategy::Single).gated(&gate));
    eventually(|| left.state().running.contains("report")).await;
    assert_eq!(root.running_len(), 1);
    let hosted: Vec<String> = root.snapshot().running.into_iter().map(|summary| summary.name).collect();
    assert_eq!(hosted, vec!["report"]);

    assert!(right.post_command(Step::new("sync", Strategy::Concurrent)).is_some());
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(right.state().done.is_empty());
    assert_eq!(right.controller().pending_len(), 1);

    // Completion in the left scope wakes the right scope's manager.
    gate.add_permits(1);
    eventually(|| right.state().done == vec!["sync"]).await;
    assert_eq!(left.state().done, vec!["report"]);
    eventually(|| root.running_len() == 0).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn decisions_see_commands_running_in_other_scopes() {
    let root = root();
    let left = child("left", &root);
    let right = child("right", &root);
    let gate = gate();

    left.post_command(Step::new("upload", Strategy::Concurrent).gated(&gate));
    eventually(|| left.state().running.contains("upload")).await;

    // Admitted, but a single only starts once nothing runs anywhere in the tree.
    assert!(right.post_command(Step::new("migrate", Strategy::Single)).is_some());
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(right.state().running.is_empty());
    assert!(right.state().done.is_empty());

    gate.add_permits(1);
    eventually(|| right.state().done == vec!["migrate"]).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn root_shutdown_cancels_nested_bodies() {
    let root = root();
    let left = child("left", &root);
    let gate = gate();

    left.post_command(Step::new("stuck", Strategy::Concurrent).gated(&gate));
    eventually(|| left.state().running.contains("stuck")).await;

    root.shutdown();
    eventually(|| root.running_len() == 0 && left.controller().running_len() == 0).await;

    assert!(!left.controller().is_active());
    // No completion hooks ran, so the body is still marked as running.
    assert!(left.state().running.contains("stuck"));
    assert!(left.state().done.is_empty());
    assert!(left.post_command(Step::new("late", Strategy::Concurrent)).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn building_under_a_shut_down_parent_fails() {
    let root = root();
    root.shutdown();

    let result = ManagerBuilder::new("orphan", Ledger::default()).parent(&root).build();
    assert!(matches!(result, Err(SchedulerError::ScopeShutDown(scope)) if scope == "root"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_managers_leave_the_idle_hub() {
    let root = root();
    let keep = child("keep", &root);
    let gone = child("gone", &root);
    assert_eq!(root.idle_hub().len(), 2);

    drop(gone);
    assert_eq!(root.idle_hub().len(), 1);

    keep.shutdown();
    assert!(root.idle_hub().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scopes_are_built_from_configuration() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{
            "root": "app",
            "scopes": {
                "feed": {},
                "profile": { "start_blocked": true, "max_rescan_passes": 8 }
            }
        }"#,
    )
    .expect("valid config");

    let scopes = build_managers(&cfg, spawner(), |_name, _cfg| Ok(Ledger::default())).expect("scopes build");
    assert_eq!(scopes.root.name(), "app");
    assert_eq!(scopes.managers.len(), 2);

    let feed = scopes.get("feed").expect("feed scope");
    let profile = scopes.get("profile").expect("profile scope");
    assert_eq!(profile.config().name, "profile");
    assert_eq!(profile.config().max_rescan_passes, 8);
    assert!(profile.executions_blocked());
    assert!(!feed.executions_blocked());
    assert!(matches!(scopes.get("missing"), Err(SchedulerError::UnknownScope(name)) if name == "missing"));

    profile.post_command(Step::new("avatar", Strategy::Concurrent));
    feed.post_command(Step::new("timeline", Strategy::Concurrent));
    eventually(|| feed.state().done == vec!["timeline"]).await;
    assert!(profile.state().done.is_empty());

    profile.allow_executions();
    eventually(|| profile.state().done == vec!["avatar"]).await;

    scopes.shutdown();
    assert!(!scopes.root.is_active());
    assert!(!feed.controller().is_active());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_initial_state_aborts_scope_building() {
    let cfg = SchedulerConfig::from_json_str(r#"{ "scopes": { "feed": {} } }"#).expect("valid config");
    let result = build_managers::<Ledger, _>(&cfg, spawner(), |name, _cfg| {
        Err(SchedulerError::InvalidConfig(format!("no state for {name}")))
    });
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(message)) if message == "no state for feed"));
}
