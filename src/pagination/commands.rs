//! Refresh and load-next commands with their strategies.

use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};

use super::state::{LoadStatus, PageData, PaginationState};
use crate::core::{
    Command, CommandError, LayerScope, RemoveOnlyQueue, RunningView, Schedulable, State, StateAccess, Strategy,
};

/// Tag carried by refresh commands.
pub const REFRESH_TAG: &str = "Refresh";
/// Tag carried by load-next commands.
pub const LOAD_NEXT_TAG: &str = "LoadNext";

/// Only one refresh may be queued or running, and it does not start while a
/// load-next is running so a stale page never lands on top of fresh data.
pub fn refresh_strategy() -> Strategy {
    Strategy::single_with_tag(REFRESH_TAG).yielding_to(LOAD_NEXT_TAG, LayerScope::Execution)
}

/// Only one load-next may be queued or running, and it does not start while a
/// refresh is running.
pub fn load_next_strategy() -> Strategy {
    Strategy::single_with_tag(LOAD_NEXT_TAG).yielding_to(REFRESH_TAG, LayerScope::Execution)
}

/// Asynchronous page loader.
pub type PageLoader<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<PageData<T>, CommandError>> + Send + Sync>;

type ErrorMapper<E> = Arc<dyn Fn(&CommandError) -> E + Send + Sync>;

fn boxed_loader<A, T, F, Fut>(load: F) -> PageLoader<A, T>
where
    A: 'static,
    T: 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PageData<T>, CommandError>> + Send + 'static,
{
    Arc::new(move |arg| load(arg).boxed())
}

/// Reloads the list from scratch, replacing everything loaded so far.
pub struct RefreshCommand<T, E> {
    load: PageLoader<PaginationState<T, E>, T>,
    map_error: ErrorMapper<E>,
    strategy: Strategy,
}

impl<T: State, E: State> RefreshCommand<T, E> {
    /// Create a refresh command from a loader and an error mapper.
    pub fn new<F, Fut>(load: F, map_error: impl Fn(&CommandError) -> E + Send + Sync + 'static) -> Self
    where
        F: Fn(PaginationState<T, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PageData<T>, CommandError>> + Send + 'static,
    {
        Self {
            load: boxed_loader(load),
            map_error: Arc::new(map_error),
            strategy: refresh_strategy(),
        }
    }

    /// Replace the default [`refresh_strategy`].
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[async_trait]
impl<T: State, E: State> Command<PaginationState<T, E>> for RefreshCommand<T, E> {
    type Output = PageData<T>;

    fn strategy(&self) -> Option<&Strategy> {
        Some(&self.strategy)
    }

    fn name(&self) -> String {
        "Refresh".to_string()
    }

    fn on_added(&self, state: PaginationState<T, E>) -> PaginationState<T, E> {
        PaginationState {
            refresh_status: LoadStatus::Loading,
            ..state
        }
    }

    fn on_starting(&self, state: PaginationState<T, E>) -> PaginationState<T, E> {
        self.on_added(state)
    }

    async fn execute(&self, state: StateAccess<PaginationState<T, E>>) -> Result<PageData<T>, CommandError> {
        (self.load)(state.get()).await
    }

    fn on_success(&self, _state: PaginationState<T, E>, output: PageData<T>) -> PaginationState<T, E> {
        PaginationState::with_page_data(output)
    }

    fn on_fail(&self, state: PaginationState<T, E>, error: &CommandError) -> PaginationState<T, E> {
        PaginationState {
            refresh_status: LoadStatus::Failed((self.map_error)(error)),
            ..state
        }
    }
}

/// Loads the next page and appends it to the list.
pub struct LoadNextCommand<T, E> {
    load: PageLoader<PaginationState<T, E>, T>,
    map_error: ErrorMapper<E>,
    strategy: Strategy,
}

impl<T: State, E: State> LoadNextCommand<T, E> {
    /// Create a load-next command from a loader and an error mapper.
    pub fn new<F, Fut>(load: F, map_error: impl Fn(&CommandError) -> E + Send + Sync + 'static) -> Self
    where
        F: Fn(PaginationState<T, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PageData<T>, CommandError>> + Send + 'static,
    {
        Self {
            load: boxed_loader(load),
            map_error: Arc::new(map_error),
            strategy: load_next_strategy(),
        }
    }

    /// Replace the default [`load_next_strategy`].
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[async_trait]
impl<T: State, E: State> Command<PaginationState<T, E>> for LoadNextCommand<T, E> {
    type Output = PageData<T>;

    fn strategy(&self) -> Option<&Strategy> {
        Some(&self.strategy)
    }

    fn name(&self) -> String {
        "LoadNext".to_string()
    }

    fn on_added(&self, state: PaginationState<T, E>) -> PaginationState<T, E> {
        PaginationState {
            next_page_status: LoadStatus::Loading,
            ..state
        }
    }

    fn on_starting(&self, state: PaginationState<T, E>) -> PaginationState<T, E> {
        self.on_added(state)
    }

    async fn execute(&self, state: StateAccess<PaginationState<T, E>>) -> Result<PageData<T>, CommandError> {
        (self.load)(state.get()).await
    }

    fn on_success(&self, state: PaginationState<T, E>, output: PageData<T>) -> PaginationState<T, E> {
        let page_data = match state.page_data {
            Some(loaded) => loaded.plus_next_page(output),
            None => output,
        };
        PaginationState {
            page_data: Some(page_data),
            next_page_status: LoadStatus::Idle,
            ..state
        }
    }

    fn on_fail(&self, state: PaginationState<T, E>, error: &CommandError) -> PaginationState<T, E> {
        PaginationState {
            next_page_status: LoadStatus::Failed((self.map_error)(error)),
            ..state
        }
    }
}

/// Load-next driven by page numbers: admitted and started only while the state
/// knows a next page number, which is handed to the loader.
pub struct LoadNextWithPageNumberCommand<T, E> {
    inner: LoadNextCommand<T, E>,
}

impl<T: State, E: State> LoadNextWithPageNumberCommand<T, E> {
    /// Create the command from a page-number loader and an error mapper.
    pub fn new<F, Fut>(load: F, map_error: impl Fn(&CommandError) -> E + Send + Sync + 'static) -> Self
    where
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PageData<T>, CommandError>> + Send + 'static,
    {
        let inner = LoadNextCommand::new(
            move |state: PaginationState<T, E>| {
                let request = state.next_page().map(|page| load(page));
                async move {
                    match request {
                        Some(request) => request.await,
                        None => Err(anyhow!("no next page to load")),
                    }
                }
            },
            map_error,
        );
        Self { inner }
    }

    /// Replace the default [`load_next_strategy`].
    #[must_use]
    pub fn with_strategy(self, strategy: Strategy) -> Self {
        Self {
            inner: self.inner.with_strategy(strategy),
        }
    }
}

#[async_trait]
impl<T: State, E: State> Command<PaginationState<T, E>> for LoadNextWithPageNumberCommand<T, E> {
    type Output = PageData<T>;

    fn strategy(&self) -> Option<&Strategy> {
        self.inner.strategy()
    }

    fn name(&self) -> String {
        "LoadNextWithPageNumber".to_string()
    }

    fn on_added(&self, state: PaginationState<T, E>) -> PaginationState<T, E> {
        self.inner.on_added(state)
    }

    fn on_starting(&self, state: PaginationState<T, E>) -> PaginationState<T, E> {
        self.inner.on_starting(state)
    }

    async fn execute(&self, state: StateAccess<PaginationState<T, E>>) -> Result<PageData<T>, CommandError> {
        self.inner.execute(state).await
    }

    fn on_success(&self, state: PaginationState<T, E>, output: PageData<T>) -> PaginationState<T, E> {
        self.inner.on_success(state, output)
    }

    fn on_fail(&self, state: PaginationState<T, E>, error: &CommandError) -> PaginationState<T, E> {
        self.inner.on_fail(state, error)
    }

    fn should_admit(
        &self,
        state: &PaginationState<T, E>,
        pending: &mut RemoveOnlyQueue<'_>,
        running: &RunningView<'_>,
    ) -> bool {
        state.next_page().is_some() && self.inner.should_admit(state, pending, running)
    }

    fn should_block(&self, other: &dyn Schedulable) -> bool {
        self.inner.should_block(other)
    }

    fn should_execute(
        &self,
        state: &PaginationState<T, E>,
        pending: &mut RemoveOnlyQueue<'_>,
        running: &RunningView<'_>,
    ) -> bool {
        state.next_page().is_some() && self.inner.should_execute(state, pending, running)
    }
}

/// Load-next driven by the last loaded item: admitted and started only while the
/// state holds a latest item, which is handed to the loader.
pub struct LoadNextWithLatestItemCommand<T, E> {
    inner: LoadNextCommand<T, E>,
}

impl<T: State, E: State> LoadNextWithLatestItemCommand<T, E> {
    /// Create the command from a latest-item loader and an error mapper.
    pub fn new<F, Fut>(load: F, map_error: impl Fn(&CommandError) -> E + Send + Sync + 'static) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PageData<T>, CommandError>> + Send + 'static,
    {
        let inner = LoadNextCommand::new(
            move |state: PaginationState<T, E>| {
                let request = state.latest_item().cloned().map(|item| load(item));
                async move {
                    match request {
                        Some(request) => request.await,
                        None => Err(anyhow!("no latest item to continue after")),
                    }
                }
            },
            map_error,
        );
        Self { inner }
    }

    /// Replace the default [`load_next_strategy`].
    #[must_use]
    pub fn with_strategy(self, strategy: Strategy) -> Self {
        Self {
            inner: self.inner.with_strategy(strategy),
        }
    }
}

#[async_trait]
impl<T: State, E: State> Command<PaginationState<T, E>> for LoadNextWithLatestItemCommand<T, E> {
    type Output = PageData<T>;

    fn strategy(&self) -> Option<&Strategy> {
        self.inner.strategy()
    }

    fn name(&self) -> String {
        "LoadNextWithLatestItem".to_string()
    }

    fn on_added(&self, state: PaginationState<T, E>) -> PaginationState<T, E> {
        self.inner.on_added(state)
    }

    fn on_starting(&self, state: PaginationState<T, E>) -> PaginationState<T, E> {
        self.inner.on_starting(state)
    }

    async fn execute(&self, state: StateAccess<PaginationState<T, E>>) -> Result<PageData<T>, CommandError> {
        self.inner.execute(state).await
    }

    fn on_success(&self, state: PaginationState<T, E>, output: PageData<T>) -> PaginationState<T, E> {
        self.inner.on_success(state, output)
    }

    fn on_fail(&self, state: PaginationState<T, E>, error: &CommandError) -> PaginationState<T, E> {
        self.inner.on_fail(state, error)
    }

    fn should_admit(
        &self,
        state: &PaginationState<T, E>,
        pending: &mut RemoveOnlyQueue<'_>,
        running: &RunningView<'_>,
    ) -> bool {
        state.latest_item().is_some() && self.inner.should_admit(state, pending, running)
    }

    fn should_block(&self, other: &dyn Schedulable) -> bool {
        self.inner.should_block(other)
    }

    fn should_execute(
        &self,
        state: &PaginationState<T, E>,
        pending: &mut RemoveOnlyQueue<'_>,
        running: &RunningView<'_>,
    ) -> bool {
        state.latest_item().is_some() && self.inner.should_execute(state, pending, running)
    }
}
