//! Execution controller: pending queue, running set and the execution slot of one scope.
//!
//! ## Hierarchy
//! A controller is either a root, which spawns bodies on a [`Spawn`] runtime, or
//! a child created with [`ExecutionController::with_parent`]. A child:
//! - forwards every launch to its parent, so the parent's running set contains
//!   the commands of all its descendants (one shared concurrency budget),
//! - asks its parent in `should_block_other_command`,
//! - evaluates its decisions against its own running set merged with its ancestors',
//! - shares the root's [`IdleHub`], so a completion anywhere notifies every listener,
//! - is cancelled with its parent.
//!
//! ## Locking
//! Queues are guarded by a `parking_lot::Mutex`. A child may lock its parent while
//! holding its own lock, never the reverse. Lifecycle hooks are never invoked while
//! a controller lock is held; strategy decisions are, and must not call back into
//! the controller.

use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::command::{DynCommand, Schedulable};
use super::idle::IdleHub;
use super::queue::{CommandId, RemoveOnlyQueue, RunningView};
use super::State;
use crate::runtime::Spawn;
use crate::util::panic_message;

/// How a launched body ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// The body ran to the end (successfully or not).
    Finished,
    /// The scope was torn down while the body was running.
    Cancelled,
    /// A completion hook panicked; the hooks after it were skipped.
    Panicked,
}

/// Callback invoked once a launched body has completed.
pub type CompletionCallback = Box<dyn FnOnce(Completion) + Send>;

/// Parent-side surface a child controller delegates to.
pub trait ExecutionSlot: Send + Sync {
    /// Name of the scope, for logs.
    fn scope(&self) -> &str;
    /// True if any command running here (or above) blocks `candidate`.
    fn should_block(&self, candidate: &dyn Schedulable) -> bool;
    /// Commands running here and in every ancestor.
    fn running(&self) -> Vec<Arc<dyn Schedulable>>;
    /// Occupy a slot for `command` while `body` runs, then call `done`.
    fn launch(self: Arc<Self>, command: Arc<dyn Schedulable>, body: BoxFuture<'static, Completion>, done: CompletionCallback);
    /// Hub shared by the whole hierarchy.
    fn idle_hub(&self) -> Arc<IdleHub>;
    /// Token cancelled when this scope is torn down.
    fn cancellation(&self) -> CancellationToken;
}

/// Serializable summary of one queued or running command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSummary {
    /// Command identity.
    pub id: CommandId,
    /// Command name.
    pub name: String,
    /// Rendered strategy, if the command has one.
    pub strategy: Option<String>,
}

impl CommandSummary {
    fn of(command: &dyn Schedulable) -> Self {
        Self {
            id: command.id(),
            name: command.name().to_string(),
            strategy: command.strategy().map(ToString::to_string),
        }
    }
}

/// Point-in-time view of a controller's queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    /// Scope name.
    pub scope: String,
    /// False once the scope has been shut down.
    pub active: bool,
    /// Pending commands, head first.
    pub pending: Vec<CommandSummary>,
    /// Commands running in this scope, including those launched by child scopes.
    pub running: Vec<CommandSummary>,
}

struct Queues<S> {
    pending: VecDeque<Arc<dyn DynCommand<S>>>,
    running: Vec<Arc<dyn Schedulable>>,
}

enum Link {
    Root(Arc<dyn Spawn>),
    Child(Arc<dyn ExecutionSlot>),
}

struct ControllerInner<S> {
    name: String,
    queues: Mutex<Queues<S>>,
    link: Link,
    hub: Arc<IdleHub>,
    token: CancellationToken,
}

/// Owns the pending queue and running set of one scheduling scope.
///
/// Cheap to clone; clones share the same queues.
pub struct ExecutionController<S> {
    inner: Arc<ControllerInner<S>>,
}

impl<S> Clone for ExecutionController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: State> ExecutionController<S> {
    /// Create a root controller spawning bodies on `spawner`.
    pub fn new(name: impl Into<String>, spawner: Arc<dyn Spawn>) -> Self {
        Self::build(name.into(), Link::Root(spawner), Arc::new(IdleHub::new()), CancellationToken::new())
    }

    /// Create a controller nested under `parent`.
    pub fn with_parent<P: State>(name: impl Into<String>, parent: &ExecutionController<P>) -> Self {
        Self::from_slot(name, parent.as_slot())
    }

    /// Create a controller nested under an arbitrary execution slot.
    pub fn from_slot(name: impl Into<String>, parent: Arc<dyn ExecutionSlot>) -> Self {
        let hub = parent.idle_hub();
        let token = parent.cancellation().child_token();
        Self::build(name.into(), Link::Child(parent), hub, token)
    }

    fn build(name: String, link: Link, hub: Arc<IdleHub>, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                name,
                queues: Mutex::new(Queues {
                    pending: VecDeque::new(),
                    running: Vec::new(),
                }),
                link,
                hub,
                token,
            }),
        }
    }

    /// This controller as a parent slot for nested controllers.
    pub fn as_slot(&self) -> Arc<dyn ExecutionSlot> {
        self.inner.clone()
    }

    /// Scope name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Idle hub shared by the hierarchy.
    pub fn idle_hub(&self) -> Arc<IdleHub> {
        Arc::clone(&self.inner.hub)
    }

    /// False once this scope (or an ancestor) has been shut down.
    pub fn is_active(&self) -> bool {
        !self.inner.token.is_cancelled()
    }

    /// Ask `command` whether it may enter the pending queue and append it if so.
    /// A shut-down scope admits nothing.
    pub(crate) fn add_pending_if_admitted(&self, command: Arc<dyn DynCommand<S>>, state: &S) -> bool {
        if !self.is_active() {
            return false;
        }
        let mut queues = self.inner.queues.lock();
        let running = self.inner.merged_running(&queues.running);
        let admitted = {
            let mut pending = RemoveOnlyQueue::new(&mut queues.pending);
            command.should_admit(state, &mut pending, &RunningView::new(&running))
        };
        if admitted {
            queues.pending.push_back(command);
        }
        admitted
    }

    /// True if any running command here, or in an ancestor scope, blocks `candidate`.
    pub fn should_block_other_command(&self, candidate: &dyn Schedulable) -> bool {
        self.inner.should_block(candidate)
    }

    /// Start the pending command `id` if its execution decision allows it.
    ///
    /// On success the command moves from pending to running before `start` is
    /// called; `start` runs synchronously and returns the body to launch. Once
    /// the body completes, is cancelled or panics, the command leaves the running
    /// set, `on_finished` runs, and the idle hub is notified.
    pub(crate) fn execute_if_allowed<F>(
        &self,
        id: CommandId,
        state: &S,
        start: F,
        on_finished: impl FnOnce(Completion) + Send + 'static,
    ) -> bool
    where
        F: FnOnce(Arc<dyn DynCommand<S>>) -> BoxFuture<'static, ()>,
    {
        if !self.is_active() {
            tracing::debug!(scope = %self.inner.name, "scope shut down, not launching");
            return false;
        }
        let command = {
            let mut queues = self.inner.queues.lock();
            let Some(index) = queues.pending.iter().position(|command| command.id() == id) else {
                return false;
            };
            let Some(candidate) = queues.pending.remove(index) else {
                return false;
            };
            let running = self.inner.merged_running(&queues.running);
            let allowed = {
                let mut pending = RemoveOnlyQueue::new(&mut queues.pending);
                candidate.should_execute(state, &mut pending, &RunningView::new(&running))
            };
            if !allowed {
                let at = index.min(queues.pending.len());
                queues.pending.insert(at, candidate);
                return false;
            }
            queues.running.push(Arc::clone(&candidate).into_schedulable());
            candidate
        };

        let schedulable = Arc::clone(&command).into_schedulable();
        let body = start(command);
        let token = self.inner.token.clone();
        let scope = self.inner.name.clone();
        let guarded: BoxFuture<'static, Completion> = Box::pin(async move {
            match AssertUnwindSafe(token.run_until_cancelled(body)).catch_unwind().await {
                Ok(Some(())) => Completion::Finished,
                Ok(None) => Completion::Cancelled,
                Err(payload) => {
                    tracing::error!(scope = %scope, %id, "command panicked: {}", panic_message(&*payload));
                    Completion::Panicked
                }
            }
        });

        let inner = Arc::clone(&self.inner);
        let done: CompletionCallback = Box::new(move |completion| {
            inner.release(id);
            on_finished(completion);
            inner.hub.notify();
        });
        self.inner.dispatch(schedulable, guarded, done);
        true
    }

    /// Remove every pending command matching `predicate`; running commands are untouched.
    pub fn clear_pending_commands(&self, mut predicate: impl FnMut(&dyn Schedulable) -> bool) -> usize {
        let mut queues = self.inner.queues.lock();
        RemoveOnlyQueue::new(&mut queues.pending).remove_matching(|command| predicate(command))
    }

    pub(crate) fn pending_commands(&self) -> Vec<Arc<dyn DynCommand<S>>> {
        self.inner.queues.lock().pending.iter().cloned().collect()
    }

    pub(crate) fn head(&self) -> Option<Arc<dyn DynCommand<S>>> {
        self.inner.queues.lock().pending.front().cloned()
    }

    /// Number of pending commands.
    pub fn pending_len(&self) -> usize {
        self.inner.queues.lock().pending.len()
    }

    /// Number of running commands, including those launched by child scopes.
    pub fn running_len(&self) -> usize {
        self.inner.queues.lock().running.len()
    }

    /// Serializable view of both queues.
    pub fn snapshot(&self) -> ControllerSnapshot {
        let queues = self.inner.queues.lock();
        ControllerSnapshot {
            scope: self.inner.name.clone(),
            active: self.is_active(),
            pending: queues
                .pending
                .iter()
                .map(|command| CommandSummary::of(command.as_schedulable()))
                .collect(),
            running: queues.running.iter().map(|command| CommandSummary::of(&**command)).collect(),
        }
    }

    /// Tear the scope down: cancel running bodies (here and in nested scopes)
    /// and drop everything still pending.
    pub fn shutdown(&self) {
        self.inner.token.cancel();
        let dropped = {
            let mut queues = self.inner.queues.lock();
            let dropped = queues.pending.len();
            queues.pending.clear();
            dropped
        };
        tracing::info!(scope = %self.inner.name, dropped, "scope shut down");
    }
}

impl<S> fmt::Debug for ExecutionController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.inner.queues.lock();
        f.debug_struct("ExecutionController")
            .field("scope", &self.inner.name)
            .field("pending", &queues.pending.len())
            .field("running", &queues.running.len())
            .field("active", &!self.inner.token.is_cancelled())
            .finish()
    }
}

impl<S: State> ControllerInner<S> {
    fn merged_running(&self, local: &[Arc<dyn Schedulable>]) -> Vec<Arc<dyn Schedulable>> {
        let mut merged = local.to_vec();
        if let Link::Child(parent) = &self.link {
            for command in parent.running() {
                if !merged.iter().any(|known| known.id() == command.id()) {
                    merged.push(command);
                }
            }
        }
        merged
    }

    fn release(&self, id: CommandId) {
        self.queues.lock().running.retain(|command| command.id() != id);
    }

    fn dispatch(&self, command: Arc<dyn Schedulable>, body: BoxFuture<'static, Completion>, done: CompletionCallback) {
        match &self.link {
            Link::Root(spawner) => spawner.spawn(Box::pin(async move {
                let completion = body.await;
                done(completion);
            })),
            Link::Child(parent) => Arc::clone(parent).launch(command, body, done),
        }
    }
}

impl<S: State> ExecutionSlot for ControllerInner<S> {
    fn scope(&self) -> &str {
        &self.name
    }

    fn should_block(&self, candidate: &dyn Schedulable) -> bool {
        let running = self.queues.lock().running.clone();
        if running.iter().any(|command| command.should_block(candidate)) {
            return true;
        }
        match &self.link {
            Link::Child(parent) => parent.should_block(candidate),
            Link::Root(_) => false,
        }
    }

    fn running(&self) -> Vec<Arc<dyn Schedulable>> {
        let local = self.queues.lock().running.clone();
        self.merged_running(&local)
    }

    fn launch(self: Arc<Self>, command: Arc<dyn Schedulable>, body: BoxFuture<'static, Completion>, done: CompletionCallback) {
        let id = command.id();
        tracing::debug!(scope = %self.name, command = command.name(), %id, "hosting nested command");
        self.queues.lock().running.push(Arc::clone(&command));
        let host = Arc::clone(&self);
        let release: CompletionCallback = Box::new(move |completion| {
            host.release(id);
            done(completion);
        });
        self.dispatch(command, body, release);
    }

    fn idle_hub(&self) -> Arc<IdleHub> {
        Arc::clone(&self.hub)
    }

    fn cancellation(&self) -> CancellationToken {
        self.token.clone()
    }
}
