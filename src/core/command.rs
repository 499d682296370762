//! Command contracts: lifecycle hooks, the asynchronous body, and execution decisions.
//!
//! ## Lifecycle
//! ```text
//! post_command ──► should_admit ──false──► dropped (no hooks fire)
//!                      │true
//!                      ▼
//!                   Pending ◄── on_added (every scheduling pass, must be idempotent)
//!                      │ head, not blocked, should_execute
//!                      ▼
//!                   Starting ── on_starting (once, before the body is launched)
//!                      ▼
//!                   Executing ── execute(StateAccess)
//!                      ├─ Ok  ──► on_success(output)
//!                      └─ Err or panic ──► on_fail(error)
//!                      ▼
//!                   Finished ── on_finished (always, unless cancelled)
//!                      ▼
//!                   Removed ── idle notification, next scheduling pass
//! ```

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use super::error::CommandError;
use super::queue::{CommandId, RemoveOnlyQueue, RunningView};
use super::strategy::Strategy;
use crate::util::panic_message;

/// Marker trait for application state held by a [`StateCell`](super::StateCell).
///
/// State is immutable by convention: hooks return a replacement value, and the
/// cell publishes it only if it differs from the current one.
pub trait State: Clone + PartialEq + Send + Sync + 'static {}

/// Blanket implementation: any type meeting the requirements is a `State`.
impl<T> State for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// State-agnostic view of a posted command, as seen by strategies and by
/// controllers of other scopes in a hierarchy.
pub trait Schedulable: Send + Sync {
    /// Identity assigned when the command was posted.
    fn id(&self) -> CommandId;
    /// Human-readable name used in logs and snapshots.
    fn name(&self) -> &str;
    /// Strategy the command was posted with, if any.
    fn strategy(&self) -> Option<&Strategy>;
    /// Whether this running command prevents `other` from starting.
    fn should_block(&self, other: &dyn Schedulable) -> bool;
}

impl fmt::Debug for dyn Schedulable + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedulable")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("strategy", &self.strategy())
            .finish()
    }
}

type Read<S> = dyn Fn() -> S + Send + Sync;
type Modify<S> = dyn for<'a> Fn(Box<dyn FnOnce(S) -> S + 'a>) + Send + Sync;

/// Live read/write access to the scope's state, handed to a command body.
///
/// Reads always observe the latest published value, including updates made by
/// other commands running at the same time. Writes are applied as one
/// read-modify-publish step and go through the equality-suppressing publish path.
pub struct StateAccess<S> {
    read: Arc<Read<S>>,
    modify: Arc<Modify<S>>,
}

impl<S> Clone for StateAccess<S> {
    fn clone(&self) -> Self {
        Self {
            read: Arc::clone(&self.read),
            modify: Arc::clone(&self.modify),
        }
    }
}

impl<S: State> StateAccess<S> {
    /// Build an accessor from a reader and a transform applier.
    pub fn new(
        read: impl Fn() -> S + Send + Sync + 'static,
        modify: impl for<'a> Fn(Box<dyn FnOnce(S) -> S + 'a>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            read: Arc::new(read),
            modify: Arc::new(modify),
        }
    }

    /// Current state.
    pub fn get(&self) -> S {
        (self.read)()
    }

    /// Publish a new state (suppressed if equal to the current one).
    pub fn set(&self, state: S) {
        self.update(move |_| state);
    }

    /// Transform the current state and publish the result.
    pub fn update(&self, transform: impl FnOnce(S) -> S) {
        (self.modify)(Box::new(transform));
    }

    /// Project this access onto a part of the state.
    ///
    /// Writes through the projection merge the new inner value into the current
    /// outer state with `to_outer`. An inner write that leaves the inner value
    /// unchanged leaves the outer state untouched.
    pub fn project<I: State>(
        &self,
        to_inner: Arc<dyn Fn(&S) -> I + Send + Sync>,
        to_outer: Arc<dyn Fn(S, I) -> S + Send + Sync>,
    ) -> StateAccess<I> {
        let reader = self.clone();
        let writer = self.clone();
        let project = Arc::clone(&to_inner);
        StateAccess::new(
            move || project(&reader.get()),
            move |transform| {
                writer.update(|outer| {
                    let inner = to_inner(&outer);
                    let next = transform(inner.clone());
                    if next == inner {
                        outer
                    } else {
                        to_outer(outer, next)
                    }
                });
            },
        )
    }
}

/// A unit of asynchronous work bound to a state type.
///
/// Every hook is a pure `State -> State` transform; the manager publishes the
/// returned value. A panicking body counts as a failure and reaches `on_fail`.
/// Hooks are expected never to fail: a completion hook that panics skips the
/// remaining hooks, although the command still leaves the running set.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_command_scheduler::core::{Command, CommandError, StateAccess, Strategy};
///
/// #[derive(Clone, PartialEq)]
/// struct Screen { saving: bool, saved: u32 }
///
/// struct Save { strategy: Strategy }
///
/// #[async_trait]
/// impl Command<Screen> for Save {
///     type Output = ();
///
///     fn strategy(&self) -> Option<&Strategy> { Some(&self.strategy) }
///
///     fn on_starting(&self, state: Screen) -> Screen {
///         Screen { saving: true, ..state }
///     }
///
///     async fn execute(&self, _state: StateAccess<Screen>) -> Result<(), CommandError> {
///         Ok(())
///     }
///
///     fn on_success(&self, state: Screen, _output: ()) -> Screen {
///         Screen { saved: state.saved + 1, ..state }
///     }
///
///     fn on_finished(&self, state: Screen) -> Screen {
///         Screen { saving: false, ..state }
///     }
/// }
/// ```
#[async_trait]
pub trait Command<S: State>: Send + Sync + 'static {
    /// Result produced by the body and handed to `on_success`.
    type Output: Send + 'static;

    /// Strategy deciding admission, blocking and execution.
    ///
    /// Commands without a strategy should override the `should_*` decisions;
    /// the defaults then behave like [`Strategy::Concurrent`].
    fn strategy(&self) -> Option<&Strategy>;

    /// Name used in logs. Defaults to the unqualified type name.
    fn name(&self) -> String {
        short_type_name::<Self>().to_string()
    }

    /// Called on every scheduling pass while the command is pending.
    ///
    /// May run many times, so it must return the same output for the same input.
    fn on_added(&self, state: S) -> S {
        state
    }

    /// Called once, synchronously, right before the body is launched.
    fn on_starting(&self, state: S) -> S {
        state
    }

    /// The asynchronous body.
    async fn execute(&self, state: StateAccess<S>) -> Result<Self::Output, CommandError>;

    /// Called once if the body returned `Ok`.
    fn on_success(&self, state: S, _output: Self::Output) -> S {
        state
    }

    /// Called once if the body returned `Err` or panicked.
    fn on_fail(&self, state: S, _error: &CommandError) -> S {
        state
    }

    /// Called once after `on_success` or `on_fail`.
    fn on_finished(&self, state: S) -> S {
        state
    }

    /// Whether the command may enter the pending queue.
    fn should_admit(
        &self,
        _state: &S,
        pending: &mut RemoveOnlyQueue<'_>,
        running: &RunningView<'_>,
    ) -> bool {
        self.strategy()
            .is_none_or(|strategy| strategy.should_admit(pending, running))
    }

    /// Whether this running command prevents `other` from starting.
    fn should_block(&self, other: &dyn Schedulable) -> bool {
        self.strategy()
            .is_some_and(|strategy| strategy.should_block(other))
    }

    /// Whether the command may start now. Called on the pending head only; the
    /// head itself is not part of `pending`.
    fn should_execute(
        &self,
        _state: &S,
        pending: &mut RemoveOnlyQueue<'_>,
        running: &RunningView<'_>,
    ) -> bool {
        self.strategy()
            .is_none_or(|strategy| strategy.should_execute(pending, running))
    }
}

/// Type-erased command as stored in a controller's pending queue.
#[async_trait]
pub(crate) trait DynCommand<S: State>: Schedulable {
    fn as_schedulable(&self) -> &dyn Schedulable;
    fn into_schedulable(self: Arc<Self>) -> Arc<dyn Schedulable>;
    fn on_added(&self, state: S) -> S;
    fn on_starting(&self, state: S) -> S;
    fn on_fail(&self, state: S, error: &CommandError) -> S;
    fn on_finished(&self, state: S) -> S;
    fn should_admit(&self, state: &S, pending: &mut RemoveOnlyQueue<'_>, running: &RunningView<'_>) -> bool;
    fn should_execute(&self, state: &S, pending: &mut RemoveOnlyQueue<'_>, running: &RunningView<'_>) -> bool;
    /// Run the body and, on success, apply `on_success` through `access`.
    async fn execute_and_settle(&self, access: StateAccess<S>) -> Result<(), CommandError>;
}

/// A command instance after `post_command`: the user command plus its identity.
pub(crate) struct Posted<S, C> {
    id: CommandId,
    name: String,
    command: C,
    _state: PhantomData<fn() -> S>,
}

impl<S: State, C: Command<S>> Posted<S, C> {
    pub(crate) fn new(command: C) -> Self {
        Self {
            id: CommandId::new(),
            name: command.name(),
            command,
            _state: PhantomData,
        }
    }
}

impl<S: State, C: Command<S>> Schedulable for Posted<S, C> {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> Option<&Strategy> {
        self.command.strategy()
    }

    fn should_block(&self, other: &dyn Schedulable) -> bool {
        self.command.should_block(other)
    }
}

#[async_trait]
impl<S: State, C: Command<S>> DynCommand<S> for Posted<S, C> {
    fn as_schedulable(&self) -> &dyn Schedulable {
        self
    }

    fn into_schedulable(self: Arc<Self>) -> Arc<dyn Schedulable> {
        self
    }

    fn on_added(&self, state: S) -> S {
        self.command.on_added(state)
    }

    fn on_starting(&self, state: S) -> S {
        self.command.on_starting(state)
    }

    fn on_fail(&self, state: S, error: &CommandError) -> S {
        self.command.on_fail(state, error)
    }

    fn on_finished(&self, state: S) -> S {
        self.command.on_finished(state)
    }

    fn should_admit(&self, state: &S, pending: &mut RemoveOnlyQueue<'_>, running: &RunningView<'_>) -> bool {
        self.command.should_admit(state, pending, running)
    }

    fn should_execute(&self, state: &S, pending: &mut RemoveOnlyQueue<'_>, running: &RunningView<'_>) -> bool {
        self.command.should_execute(state, pending, running)
    }

    async fn execute_and_settle(&self, access: StateAccess<S>) -> Result<(), CommandError> {
        let output = match AssertUnwindSafe(self.command.execute(access.clone())).catch_unwind().await {
            Ok(result) => result?,
            Err(payload) => return Err(anyhow::anyhow!("{} panicked: {}", self.name, panic_message(&*payload))),
        };
        access.update(|state| self.command.on_success(state, output));
        Ok(())
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
