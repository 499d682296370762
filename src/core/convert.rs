//! Reuse a command written for one state type against a larger state.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::command::{Command, Schedulable, StateAccess};
use super::error::CommandError;
use super::queue::{RemoveOnlyQueue, RunningView};
use super::strategy::Strategy;
use super::State;

type ToInner<O, I> = Arc<dyn Fn(&O) -> I + Send + Sync>;
type ToOuter<O, I> = Arc<dyn Fn(O, I) -> O + Send + Sync>;
type MapResult<A, B> = Arc<dyn Fn(A) -> B + Send + Sync>;

/// Adapter running an inner `Command<I>` as a `Command<O>`.
///
/// Every hook projects the outer state with `to_inner`, runs the inner hook and
/// merges the result back with `to_outer`. When the inner hook returns a value
/// equal to its input, the outer state is returned as is. Decisions and the
/// strategy are forwarded to the inner command unchanged.
pub struct DataConvertCommand<O, I, C, R>
where
    I: State,
    C: Command<I>,
{
    inner: C,
    to_inner: ToInner<O, I>,
    to_outer: ToOuter<O, I>,
    result_to_outer: MapResult<C::Output, R>,
    result_to_inner: MapResult<R, C::Output>,
}

impl<O, I, C> DataConvertCommand<O, I, C, C::Output>
where
    O: State,
    I: State,
    C: Command<I>,
{
    /// Wrap `inner`, keeping its result type.
    pub fn new(
        inner: C,
        to_inner: impl Fn(&O) -> I + Send + Sync + 'static,
        to_outer: impl Fn(O, I) -> O + Send + Sync + 'static,
    ) -> Self {
        Self::with_output(inner, to_inner, to_outer, |output| output, |output| output)
    }
}

impl<O, I, C, R> DataConvertCommand<O, I, C, R>
where
    O: State,
    I: State,
    C: Command<I>,
    R: Send + 'static,
{
    /// Wrap `inner` and convert its result type in both directions.
    pub fn with_output(
        inner: C,
        to_inner: impl Fn(&O) -> I + Send + Sync + 'static,
        to_outer: impl Fn(O, I) -> O + Send + Sync + 'static,
        result_to_outer: impl Fn(C::Output) -> R + Send + Sync + 'static,
        result_to_inner: impl Fn(R) -> C::Output + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            to_inner: Arc::new(to_inner),
            to_outer: Arc::new(to_outer),
            result_to_outer: Arc::new(result_to_outer),
            result_to_inner: Arc::new(result_to_inner),
        }
    }

    /// The wrapped command.
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    fn convert(&self, outer: O, hook: impl FnOnce(I) -> I) -> O {
        let inner = (self.to_inner)(&outer);
        let next = hook(inner.clone());
        if next == inner {
            outer
        } else {
            (self.to_outer)(outer, next)
        }
    }
}

#[async_trait]
impl<O, I, C, R> Command<O> for DataConvertCommand<O, I, C, R>
where
    O: State,
    I: State,
    C: Command<I>,
    R: Send + 'static,
{
    type Output = R;

    fn strategy(&self) -> Option<&Strategy> {
        self.inner.strategy()
    }

    fn name(&self) -> String {
        format!("DataConvert({})", self.inner.name())
    }

    fn on_added(&self, state: O) -> O {
        self.convert(state, |inner| self.inner.on_added(inner))
    }

    fn on_starting(&self, state: O) -> O {
        self.convert(state, |inner| self.inner.on_starting(inner))
    }

    async fn execute(&self, state: StateAccess<O>) -> Result<R, CommandError> {
        let projected = state.project(Arc::clone(&self.to_inner), Arc::clone(&self.to_outer));
        let output = self.inner.execute(projected).await?;
        Ok((self.result_to_outer)(output))
    }

    fn on_success(&self, state: O, output: R) -> O {
        let output = (self.result_to_inner)(output);
        self.convert(state, |inner| self.inner.on_success(inner, output))
    }

    fn on_fail(&self, state: O, error: &CommandError) -> O {
        self.convert(state, |inner| self.inner.on_fail(inner, error))
    }

    fn on_finished(&self, state: O) -> O {
        self.convert(state, |inner| self.inner.on_finished(inner))
    }

    fn should_admit(&self, state: &O, pending: &mut RemoveOnlyQueue<'_>, running: &RunningView<'_>) -> bool {
        self.inner.should_admit(&(self.to_inner)(state), pending, running)
    }

    fn should_block(&self, other: &dyn Schedulable) -> bool {
        self.inner.should_block(other)
    }

    fn should_execute(&self, state: &O, pending: &mut RemoveOnlyQueue<'_>, running: &RunningView<'_>) -> bool {
        self.inner.should_execute(&(self.to_inner)(state), pending, running)
    }
}

impl<O, I, C, R> fmt::Debug for DataConvertCommand<O, I, C, R>
where
    I: State,
    C: Command<I> + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataConvertCommand").field("inner", &self.inner).finish_non_exhaustive()
    }
}
