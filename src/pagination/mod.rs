//! Paged list loading on top of the scheduler.
//!
//! A refresh replaces the whole list. Load-next commands never start while a
//! refresh is running, and a refresh waits for a running load-next so a stale
//! page cannot land on fresh data. Both are exclusive within their own tag, so
//! at most one refresh and one load-next can be queued at a time.

pub mod commands;
pub mod state;

pub use commands::{
    load_next_strategy, refresh_strategy, LoadNextCommand, LoadNextWithLatestItemCommand,
    LoadNextWithPageNumberCommand, PageLoader, RefreshCommand, LOAD_NEXT_TAG, REFRESH_TAG,
};
pub use state::{LoadStatus, PageData, PaginationState};
