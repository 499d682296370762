//! Observable state holder with equality-suppressed publishing.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::State;

type Observer<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Which threads may publish into a [`StateCell`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadAffinity {
    /// Any thread may publish.
    #[default]
    Any,
    /// Only the thread that created the cell may publish.
    Pinned,
}

/// Holds the current state of one scope and notifies observers on change.
///
/// Publishing a value equal to the current one is a no-op. Observers run after
/// the internal lock is released, so they may read the cell again.
pub struct StateCell<S> {
    value: Mutex<S>,
    observers: Mutex<Vec<Observer<S>>>,
    owner: Option<ThreadId>,
}

impl<S: State> StateCell<S> {
    /// Create a cell that accepts publishes from any thread.
    pub fn new(initial: S) -> Self {
        Self::with_affinity(initial, ThreadAffinity::Any)
    }

    /// Create a cell with an explicit thread affinity.
    pub fn with_affinity(initial: S, affinity: ThreadAffinity) -> Self {
        let owner = match affinity {
            ThreadAffinity::Any => None,
            ThreadAffinity::Pinned => Some(thread::current().id()),
        };
        Self {
            value: Mutex::new(initial),
            observers: Mutex::new(Vec::new()),
            owner,
        }
    }

    /// Current value.
    pub fn get(&self) -> S {
        self.value.lock().clone()
    }

    /// Replace the value; returns `false` if it was equal and nothing changed.
    ///
    /// # Panics
    /// Panics when the cell is pinned and called from a thread other than its creator.
    pub fn publish(&self, next: S) -> bool {
        if let Some(owner) = self.owner {
            assert_eq!(
                thread::current().id(),
                owner,
                "state published off the thread the cell is pinned to"
            );
        }
        {
            let mut current = self.value.lock();
            if *current == next {
                return false;
            }
            *current = next.clone();
        }
        let observers: Vec<Observer<S>> = self.observers.lock().clone();
        for observer in observers {
            observer(&next);
        }
        true
    }

    /// Apply `transform` to the current value and publish the result.
    pub fn update(&self, transform: impl FnOnce(S) -> S) -> bool {
        let next = transform(self.get());
        self.publish(next)
    }

    /// Register an observer invoked with every published change.
    pub fn observe(&self, observer: impl Fn(&S) + Send + Sync + 'static) {
        self.observers.lock().push(Arc::new(observer));
    }

    /// Thread affinity this cell was created with.
    pub const fn affinity(&self) -> ThreadAffinity {
        if self.owner.is_some() {
            ThreadAffinity::Pinned
        } else {
            ThreadAffinity::Any
        }
    }
}

impl<S: State + fmt::Debug> fmt::Debug for StateCell<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("value", &*self.value.lock())
            .field("observers", &self.observers.lock().len())
            .field("affinity", &self.affinity())
            .finish()
    }
}
