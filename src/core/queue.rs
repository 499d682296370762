//! Command identity and the restricted views strategies get over the queues.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::command::{DynCommand, Schedulable};
use super::State;

/// Identity of one posted command instance.
///
/// Commands compare by identity, never by value: two equal command values posted
/// twice get two distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Allocate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying uuid.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Storage behind a [`RemoveOnlyQueue`], erased over the state type.
pub(crate) trait PendingStore: Send {
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> Option<&dyn Schedulable>;
    fn remove_where(&mut self, predicate: &mut dyn FnMut(&dyn Schedulable) -> bool) -> usize;
}

impl<S: State> PendingStore for VecDeque<Arc<dyn DynCommand<S>>> {
    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn get(&self, index: usize) -> Option<&dyn Schedulable> {
        VecDeque::get(self, index).map(|command| command.as_schedulable())
    }

    fn remove_where(&mut self, predicate: &mut dyn FnMut(&dyn Schedulable) -> bool) -> usize {
        let before = VecDeque::len(self);
        self.retain(|command| !predicate(command.as_schedulable()));
        before - VecDeque::len(self)
    }
}

/// Pending queue view that can be inspected and shrunk, but never grown or reordered.
pub struct RemoveOnlyQueue<'a> {
    store: &'a mut dyn PendingStore,
}

impl<'a> RemoveOnlyQueue<'a> {
    pub(crate) fn new(store: &'a mut dyn PendingStore) -> Self {
        Self { store }
    }

    /// Number of pending commands visible through this view.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Iterate pending commands in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Schedulable> + '_ {
        let store: &dyn PendingStore = &*self.store;
        (0..store.len()).filter_map(move |index| store.get(index))
    }

    /// True if any pending command matches.
    pub fn any(&self, mut predicate: impl FnMut(&dyn Schedulable) -> bool) -> bool {
        self.iter().any(|command| predicate(command))
    }

    /// Remove the command with the given id; returns whether it was present.
    pub fn remove(&mut self, id: CommandId) -> bool {
        self.store.remove_where(&mut |command| command.id() == id) > 0
    }

    /// Remove every matching command and return how many were removed.
    pub fn remove_matching(&mut self, mut predicate: impl FnMut(&dyn Schedulable) -> bool) -> usize {
        self.store.remove_where(&mut |command| predicate(command))
    }
}

/// Read-only view of the commands currently running in a scope (and its ancestors).
#[derive(Clone, Copy)]
pub struct RunningView<'a> {
    commands: &'a [Arc<dyn Schedulable>],
}

impl<'a> RunningView<'a> {
    /// Wrap a running-set snapshot.
    pub const fn new(commands: &'a [Arc<dyn Schedulable>]) -> Self {
        Self { commands }
    }

    /// Number of running commands.
    pub const fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if nothing is running.
    pub const fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate running commands.
    pub fn iter(&self) -> impl Iterator<Item = &'a dyn Schedulable> + 'a {
        self.commands.iter().map(|command| &**command)
    }

    /// True if any running command matches.
    pub fn any(&self, mut predicate: impl FnMut(&dyn Schedulable) -> bool) -> bool {
        self.iter().any(|command| predicate(command))
    }

    /// True if a command with this id is running.
    pub fn contains(&self, id: CommandId) -> bool {
        self.iter().any(|command| command.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::core::command::{Command, Posted, StateAccess};
    use crate::core::{CommandError, Strategy};

    struct Named(&'static str);

    #[async_trait]
    impl Command<u8> for Named {
        type Output = ();

        fn strategy(&self) -> Option<&Strategy> {
            None
        }

        fn name(&self) -> String {
            self.0.to_string()
        }

        async fn execute(&self, _state: StateAccess<u8>) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn pending(names: &[&'static str]) -> VecDeque<Arc<dyn DynCommand<u8>>> {
        names
            .iter()
            .map(|&name| Arc::new(Posted::new(Named(name))) as Arc<dyn DynCommand<u8>>)
            .collect()
    }

    #[test]
    fn remove_only_queue_iterates_in_order_and_shrinks() {
        let mut store = pending(&["a", "b", "c"]);
        let mut queue = RemoveOnlyQueue::new(&mut store);

        let names: Vec<&str> = queue.iter().map(Schedulable::name).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(queue.any(|command| command.name() == "b"));

        let first = queue.iter().next().map(Schedulable::id).expect("head present");
        assert!(queue.remove(first));
        assert!(!queue.remove(first));
        assert_eq!(queue.remove_matching(|command| command.name() == "c"), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(store.len(), 1);
    }
}
