//! Command manager: the externally visible driver of one scheduling scope.
//!
//! The manager owns the scope's [`StateCell`], feeds posted commands to its
//! [`ExecutionController`], and runs the scheduling pass:
//!
//! 1. stop if executions are blocked,
//! 2. fire `on_added` for every pending command,
//! 3. stop if a running command blocks the pending head,
//! 4. launch the head if its execution decision allows it,
//! 5. rescan while the head keeps changing. Rescans after a launch always
//!    continue; consecutive rescans that launched nothing are bounded by
//!    `max_rescan_passes`.
//!
//! Passes run after every admission, after `allow_executions`, and whenever a
//! command finishes anywhere in the controller hierarchy.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::ReentrantMutex;
use serde::Serialize;

use super::audit::LogSink;
use super::command::{Command, DynCommand, Posted, Schedulable, StateAccess};
use super::controller::{Completion, ControllerSnapshot, ExecutionController};
use super::idle::{IdleListener, IdleSubscription};
use super::queue::CommandId;
use super::state_cell::StateCell;
use super::State;
use crate::config::ManagerConfig;

/// Point-in-time view of a manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerSnapshot {
    /// True while `block_executions` is in effect.
    pub executions_blocked: bool,
    /// Queues of the manager's controller.
    pub controller: ControllerSnapshot,
}

struct ManagerInner<S: State> {
    config: ManagerConfig,
    state: Arc<StateCell<S>>,
    controller: ExecutionController<S>,
    allowed: AtomicBool,
    // Serializes scheduling passes, hook invocations and body writes. Reentrant so
    // an observer or an inline spawner may post again from inside a pass.
    pass_lock: Arc<ReentrantMutex<()>>,
    sink: Option<Arc<dyn LogSink>>,
    subscription: IdleSubscription,
}

/// Drives commands through admission, scheduling and execution for one state.
///
/// Cheap to clone; clones drive the same scope.
pub struct CommandManager<S: State> {
    inner: Arc<ManagerInner<S>>,
}

impl<S: State> Clone for CommandManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: State> CommandManager<S> {
    /// Create a manager over `controller` holding `initial` state.
    pub fn new(config: ManagerConfig, initial: S, controller: ExecutionController<S>) -> Self {
        let state = Arc::new(StateCell::with_affinity(initial, config.thread_affinity));
        Self::assemble(config, state, controller, None)
    }

    pub(crate) fn assemble(
        config: ManagerConfig,
        state: Arc<StateCell<S>>,
        controller: ExecutionController<S>,
        sink: Option<Arc<dyn LogSink>>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<ManagerInner<S>>| {
            let listener: Weak<dyn IdleListener> = weak.clone();
            let subscription = controller.idle_hub().register(listener);
            ManagerInner {
                allowed: AtomicBool::new(!config.start_blocked),
                config,
                state,
                controller,
                pass_lock: Arc::new(ReentrantMutex::new(())),
                sink,
                subscription,
            }
        });
        tracing::debug!(scope = %inner.config.name, "command manager created");
        Self { inner }
    }

    /// Offer `command` for admission; if admitted, run a scheduling pass.
    ///
    /// Returns the id assigned to the command, or `None` when it was skipped.
    pub fn post_command<C: Command<S>>(&self, command: C) -> Option<CommandId> {
        let posted: Arc<dyn DynCommand<S>> = Arc::new(Posted::<S, C>::new(command));
        let id = posted.id();
        let inner = &self.inner;
        let _pass = inner.pass_lock.lock();
        let state = inner.state.get();
        if inner.controller.add_pending_if_admitted(Arc::clone(&posted), &state) {
            tracing::info!(scope = %inner.config.name, command = posted.name(), %id, "command admitted");
            inner.log_info(&format!("admitted {} ({id})", posted.name()));
            inner.run_pending();
            Some(id)
        } else {
            tracing::info!(scope = %inner.config.name, command = posted.name(), %id, "command skipped");
            inner.log_info(&format!("skipped {} ({id})", posted.name()));
            None
        }
    }

    /// Remove pending commands matching `predicate`. Running commands are unaffected.
    pub fn clear_pending_commands(&self, predicate: impl FnMut(&dyn Schedulable) -> bool) -> usize {
        let inner = &self.inner;
        let _pass = inner.pass_lock.lock();
        let removed = inner.controller.clear_pending_commands(predicate);
        let left = inner.controller.pending_len();
        tracing::info!(scope = %inner.config.name, removed, left, "pending commands cleared");
        inner.log_info(&format!("cleared {removed} pending, {left} left"));
        removed
    }

    /// Remove every pending command.
    pub fn clear_all_pending(&self) -> usize {
        self.clear_pending_commands(|_| true)
    }

    /// Stop promoting pending commands. Running commands keep running.
    pub fn block_executions(&self) {
        self.inner.allowed.store(false, Ordering::SeqCst);
        tracing::info!(scope = %self.inner.config.name, "executions blocked");
        self.inner.log_info("executions blocked");
    }

    /// Resume promoting pending commands and run a scheduling pass right away.
    pub fn allow_executions(&self) {
        self.inner.allowed.store(true, Ordering::SeqCst);
        tracing::info!(scope = %self.inner.config.name, "executions allowed");
        self.inner.log_info("executions allowed");
        self.inner.run_pending();
    }

    /// True while `block_executions` is in effect.
    pub fn executions_blocked(&self) -> bool {
        !self.inner.allowed.load(Ordering::SeqCst)
    }

    /// Current state.
    pub fn state(&self) -> S {
        self.inner.state.get()
    }

    /// The state cell, for observing published changes.
    pub fn state_cell(&self) -> &Arc<StateCell<S>> {
        &self.inner.state
    }

    /// The controller driving this scope, usable as a parent for nested scopes.
    pub fn controller(&self) -> &ExecutionController<S> {
        &self.inner.controller
    }

    /// Configuration the manager was built with.
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Serializable view of the manager.
    pub fn snapshot(&self) -> ManagerSnapshot {
        ManagerSnapshot {
            executions_blocked: self.executions_blocked(),
            controller: self.inner.controller.snapshot(),
        }
    }

    /// Tear the scope down: cancel running bodies, drop pending commands and stop
    /// listening for idle notifications.
    pub fn shutdown(&self) {
        self.inner.controller.shutdown();
        self.inner.controller.idle_hub().deregister(self.inner.subscription);
        self.inner.log_info("shut down");
    }
}

impl<S: State + fmt::Debug> fmt::Debug for CommandManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandManager")
            .field("scope", &self.inner.config.name)
            .field("state", &self.inner.state.get())
            .field("executions_blocked", &self.executions_blocked())
            .field("controller", &self.inner.controller)
            .finish()
    }
}

impl<S: State> ManagerInner<S> {
    fn run_pending(&self) {
        let _pass = self.pass_lock.lock();
        let scope = self.config.name.as_str();
        let mut budget = RescanBudget::new(self.config.max_rescan_passes);
        loop {
            if !self.allowed.load(Ordering::SeqCst) {
                tracing::debug!(scope, "executions blocked, pass skipped");
                return;
            }

            for command in self.controller.pending_commands() {
                self.state.update(|state| command.on_added(state));
            }

            let Some(head) = self.controller.head() else {
                return;
            };
            let head_id = head.id();
            if self.controller.should_block_other_command(head.as_schedulable()) {
                tracing::debug!(scope, command = head.name(), id = %head_id, "head blocked by a running command");
                return;
            }

            let state = self.state.get();
            let launched = self.controller.execute_if_allowed(
                head_id,
                &state,
                |command| self.start(command),
                self.finisher(head.name().to_string(), head_id),
            );
            if !launched {
                tracing::debug!(scope, command = head.name(), id = %head_id, "head not ready to execute");
            }

            match self.controller.head() {
                Some(next) if next.id() != head_id => {
                    if !budget.rescan(launched) {
                        tracing::warn!(scope, idle = budget.idle, "rescan ceiling reached, ending scheduling pass");
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn start(&self, command: Arc<dyn DynCommand<S>>) -> BoxFuture<'static, ()> {
        let scope = self.config.name.clone();
        tracing::info!(scope = %scope, command = command.name(), id = %command.id(), "command starting");
        self.log_info(&format!("starting {} ({})", command.name(), command.id()));
        self.state.update(|state| command.on_starting(state));

        let access = self.access();
        let sink = self.sink.clone();
        Box::pin(async move {
            let outcome = command.execute_and_settle(access.clone()).await;
            match outcome {
                Ok(()) => {
                    tracing::info!(scope = %scope, command = command.name(), id = %command.id(), "command executed");
                    if let Some(sink) = &sink {
                        sink.info(&format!("[{scope}] executed {} ({})", command.name(), command.id()));
                    }
                }
                Err(error) => {
                    tracing::error!(scope = %scope, command = command.name(), id = %command.id(), "command failed: {error:#}");
                    if let Some(sink) = &sink {
                        sink.error(&format!("[{scope}] failed {} ({})", command.name(), command.id()), &error);
                    }
                    access.update(|state| command.on_fail(state, &error));
                }
            }
            access.update(|state| command.on_finished(state));
        })
    }

    fn finisher(&self, name: String, id: CommandId) -> impl FnOnce(Completion) + Send + 'static {
        let scope = self.config.name.clone();
        let sink = self.sink.clone();
        move |completion| match completion {
            Completion::Finished => {
                tracing::debug!(scope = %scope, command = %name, %id, "command removed from running set");
            }
            Completion::Cancelled => {
                tracing::info!(scope = %scope, command = %name, %id, "command cancelled");
                if let Some(sink) = &sink {
                    sink.info(&format!("[{scope}] cancelled {name} ({id})"));
                }
            }
            Completion::Panicked => {
                if let Some(sink) = &sink {
                    sink.error(
                        &format!("[{scope}] aborted {name} ({id})"),
                        &anyhow::anyhow!("completion hook panicked"),
                    );
                }
            }
        }
    }

    fn access(&self) -> StateAccess<S> {
        let reader = Arc::clone(&self.state);
        let writer = Arc::clone(&self.state);
        let pass_lock = Arc::clone(&self.pass_lock);
        StateAccess::new(
            move || reader.get(),
            move |transform| {
                let _pass = pass_lock.lock();
                writer.update(transform);
            },
        )
    }

    fn log_info(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink.info(&format!("[{}] {message}", self.config.name));
        }
    }
}

/// Bounds the head-changed rescans of one pass that launched nothing.
struct RescanBudget {
    ceiling: usize,
    idle: usize,
}

impl RescanBudget {
    const fn new(ceiling: usize) -> Self {
        Self { ceiling, idle: 0 }
    }

    /// Record one head change; false once the idle rescans reach the ceiling.
    fn rescan(&mut self, launched: bool) -> bool {
        if launched {
            self.idle = 0;
            return true;
        }
        self.idle += 1;
        self.idle < self.ceiling
    }
}

impl<S: State> IdleListener for ManagerInner<S> {
    fn on_idle(&self) {
        self.run_pending();
    }
}

impl<S: State> Drop for ManagerInner<S> {
    fn drop(&mut self) {
        self.controller.idle_hub().deregister(self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::RescanBudget;

    #[test]
    fn launches_never_exhaust_the_budget() {
        let mut budget = RescanBudget::new(2);
        assert!((0..5000).all(|_| budget.rescan(true)));
    }

    #[test]
    fn idle_rescans_stop_at_the_ceiling() {
        let mut budget = RescanBudget::new(3);
        assert!(budget.rescan(false));
        assert!(budget.rescan(false));
        assert!(!budget.rescan(false));
    }

    #[test]
    fn a_launch_resets_the_idle_count() {
        let mut budget = RescanBudget::new(2);
        assert!(budget.rescan(false));
        assert!(budget.rescan(true));
        assert!(budget.rescan(false));
        assert!(!budget.rescan(false));
    }
}
