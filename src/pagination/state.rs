//! Pagination state model.

use serde::{Deserialize, Serialize};

/// Loaded items plus the cursor for the next request.
///
/// Two cursor styles exist: a page number (`next_page`) or the last loaded item
/// (`latest_item`). A list normally uses one of them and leaves the other `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData<T> {
    /// Items loaded so far, in display order.
    pub items: Vec<T>,
    /// Page to request next; `None` once the end was reached.
    pub next_page: Option<u32>,
    /// Item the next request continues after; `None` once the end was reached.
    pub latest_item: Option<T>,
}

impl<T> PageData<T> {
    /// Create page data paged by page number.
    pub const fn new(items: Vec<T>, next_page: Option<u32>) -> Self {
        Self {
            items,
            next_page,
            latest_item: None,
        }
    }

    /// Create page data paged by the latest loaded item.
    pub const fn with_latest_item(items: Vec<T>, latest_item: Option<T>) -> Self {
        Self {
            items,
            next_page: None,
            latest_item,
        }
    }

    /// A single page that is also the last one.
    pub const fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }

    /// Append `page` and take over its cursors.
    #[must_use]
    pub fn plus_next_page(mut self, page: Self) -> Self {
        self.items.extend(page.items);
        self.next_page = page.next_page;
        self.latest_item = page.latest_item;
        self
    }

    /// Replace the items, keeping the cursors.
    #[must_use]
    pub fn map_items(self, map: impl FnOnce(Vec<T>) -> Vec<T>) -> Self {
        Self {
            items: map(self.items),
            ..self
        }
    }

    /// True if another page can be requested.
    pub const fn has_next_page(&self) -> bool {
        self.next_page.is_some() || self.latest_item.is_some()
    }
}

/// Progress of a refresh or a next-page load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus<E> {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Queued or running.
    Loading,
    /// The last attempt failed.
    Failed(E),
}

impl<E> LoadStatus<E> {
    /// True while queued or running.
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The failure, if the last attempt failed.
    pub const fn error(&self) -> Option<&E> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// State of a paged list screen.
///
/// `E` is the caller's representation of a load error (a message, an error item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState<T, E = String> {
    /// Pages loaded so far; `None` before the first successful refresh.
    pub page_data: Option<PageData<T>>,
    /// Status of the full refresh.
    pub refresh_status: LoadStatus<E>,
    /// Status of the next-page load.
    pub next_page_status: LoadStatus<E>,
}

impl<T, E> Default for PaginationState<T, E> {
    fn default() -> Self {
        Self {
            page_data: None,
            refresh_status: LoadStatus::Idle,
            next_page_status: LoadStatus::Idle,
        }
    }
}

impl<T, E> PaginationState<T, E> {
    /// State holding `page_data` with nothing in flight.
    pub const fn with_page_data(page_data: PageData<T>) -> Self {
        Self {
            page_data: Some(page_data),
            refresh_status: LoadStatus::Idle,
            next_page_status: LoadStatus::Idle,
        }
    }

    /// Items loaded so far (empty before the first refresh).
    pub fn items(&self) -> &[T] {
        self.page_data.as_ref().map(|page| page.items.as_slice()).unwrap_or_default()
    }

    /// Next page number to request, if any.
    pub fn next_page(&self) -> Option<u32> {
        self.page_data.as_ref().and_then(|page| page.next_page)
    }

    /// Item the next request continues after, if any.
    pub fn latest_item(&self) -> Option<&T> {
        self.page_data.as_ref().and_then(|page| page.latest_item.as_ref())
    }
}
