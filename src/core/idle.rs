//! Idle notification hub shared by every controller in a hierarchy.
//!
//! Whenever any command anywhere in the tree finishes, every registered listener
//! gets a chance to run its own scheduling pass. Listeners are held weakly so a
//! dropped manager never keeps itself alive through the hub.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Receiver of idle notifications.
pub trait IdleListener: Send + Sync {
    /// Called after a command somewhere in the hierarchy has finished.
    fn on_idle(&self);
}

/// Handle returned by [`IdleHub::register`], used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdleSubscription(u64);

/// Registry of weakly held idle listeners.
#[derive(Default)]
pub struct IdleHub {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Weak<dyn IdleListener>)>>,
}

impl IdleHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn register(&self, listener: Weak<dyn IdleListener>) -> IdleSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        IdleSubscription(id)
    }

    /// Remove a listener; unknown subscriptions are ignored.
    pub fn deregister(&self, subscription: IdleSubscription) {
        self.listeners.lock().retain(|(id, _)| *id != subscription.0);
    }

    /// Notify every live listener, pruning the ones that were dropped.
    ///
    /// Listeners are called outside the registry lock, in registration order.
    pub fn notify(&self) {
        let live: Vec<Arc<dyn IdleListener>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|(_, listener)| listener.strong_count() > 0);
            listeners.iter().filter_map(|(_, listener)| listener.upgrade()).collect()
        };
        tracing::trace!("idle notification to {} listeners", live.len());
        for listener in live {
            listener.on_idle();
        }
    }

    /// Number of registered (possibly dead) listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter(AtomicUsize);

    impl IdleListener for Counter {
        fn on_idle(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn notifies_live_listeners_and_prunes_dead_ones() {
        let hub = IdleHub::new();
        let alive = Arc::new(Counter(AtomicUsize::new(0)));
        let dropped: Arc<dyn IdleListener> = Arc::new(Counter(AtomicUsize::new(0)));
        let alive_dyn: Arc<dyn IdleListener> = alive.clone();

        hub.register(Arc::downgrade(&alive_dyn));
        hub.register(Arc::downgrade(&dropped));
        drop(dropped);

        hub.notify();
        assert_eq!(alive.0.load(Ordering::SeqCst), 1);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn deregistered_listeners_are_not_called() {
        let hub = IdleHub::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let listener: Arc<dyn IdleListener> = counter.clone();
        let subscription = hub.register(Arc::downgrade(&listener));
        hub.deregister(subscription);
        hub.notify();
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        assert!(hub.is_empty());
    }
}
