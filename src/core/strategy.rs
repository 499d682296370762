//! Execution strategies deciding admission, blocking and execution timing.
//!
//! A strategy is a pure policy: it never holds queue references, it only inspects the
//! snapshots handed to it by the [`ExecutionController`](super::ExecutionController).
//!
//! ## Variants
//! - `Concurrent`: always admitted, never blocks, always executable.
//! - `ConcurrentWithTag`: admission evicts queued commands with the same tag (last
//!   writer wins); executes only while no command with the same tag is running.
//! - `Single`: admitted only if no other untagged single command is pending or
//!   running; blocks every other command while running; executes only on an empty
//!   running set.
//! - `SingleWithTag`: like `Single`, narrowed to the tag. It blocks and waits for
//!   same-tag singles and untagged singles only, so distinct tags run side by side.
//! - `Layered`: wraps a base strategy and additionally yields to another tag.
//!
//! ## Invariants
//! - Admission is the only decision allowed to remove pending commands.
//! - Tags only compare within the same family: a `ConcurrentWithTag("a")` and a
//!   `SingleWithTag("a")` never exclude each other.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::command::Schedulable;
use super::queue::{RemoveOnlyQueue, RunningView};

/// Opaque equality key narrowing a strategy's mutual-exclusion scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Create a tag from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the tag value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which decisions a [`Layer`] adds its extra condition to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerScope {
    /// Refuse admission while the yielded-to tag is pending or running.
    Admission,
    /// Admit normally but refuse to start while the yielded-to tag is running.
    /// Queued commands of that tag are ignored here: only the head of the queue
    /// is ever considered, so waiting on one queued behind would never end.
    Execution,
    /// Apply the condition to both admission and execution.
    Both,
}

impl LayerScope {
    const fn covers_admission(self) -> bool {
        matches!(self, Self::Admission | Self::Both)
    }

    const fn covers_execution(self) -> bool {
        matches!(self, Self::Execution | Self::Both)
    }
}

/// A derived strategy: the base decision plus "yield to commands tagged `yield_to`".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Layer {
    /// Strategy whose decisions are evaluated first.
    pub base: Strategy,
    /// Tag of the commands this strategy defers to.
    pub yield_to: Tag,
    /// Decisions the extra condition applies to.
    pub scope: LayerScope,
}

/// Closed set of execution strategies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Fully parallel execution.
    Concurrent,
    /// Parallel execution with at most one running command per tag; newer queued
    /// commands supersede older queued ones with the same tag.
    ConcurrentWithTag(Tag),
    /// Global mutual exclusion across untagged single commands.
    Single,
    /// Mutual exclusion narrowed to commands sharing the tag; untagged singles
    /// still exclude it.
    SingleWithTag(Tag),
    /// Base strategy plus an extra yield condition.
    Layered(Box<Layer>),
}

impl Strategy {
    /// Shorthand for [`Strategy::ConcurrentWithTag`].
    pub fn concurrent_with_tag(tag: impl Into<Tag>) -> Self {
        Self::ConcurrentWithTag(tag.into())
    }

    /// Shorthand for [`Strategy::SingleWithTag`].
    pub fn single_with_tag(tag: impl Into<Tag>) -> Self {
        Self::SingleWithTag(tag.into())
    }

    /// Wrap this strategy so it additionally yields to commands tagged `yield_to`.
    #[must_use]
    pub fn yielding_to(self, yield_to: impl Into<Tag>, scope: LayerScope) -> Self {
        Self::Layered(Box::new(Layer {
            base: self,
            yield_to: yield_to.into(),
            scope,
        }))
    }

    /// The innermost non-layered strategy.
    pub fn base(&self) -> &Self {
        match self {
            Self::Layered(layer) => layer.base.base(),
            other => other,
        }
    }

    /// The tag carried by the base strategy, if any.
    pub fn tag(&self) -> Option<&Tag> {
        match self.base() {
            Self::ConcurrentWithTag(tag) | Self::SingleWithTag(tag) => Some(tag),
            _ => None,
        }
    }

    /// True for `Single` and `SingleWithTag` (including layered ones).
    pub fn is_exclusive(&self) -> bool {
        matches!(self.base(), Self::Single | Self::SingleWithTag(_))
    }

    fn is_untagged_single(&self) -> bool {
        matches!(self.base(), Self::Single)
    }

    fn is_single_with(&self, tag: &Tag) -> bool {
        matches!(self.base(), Self::SingleWithTag(own) if own == tag)
    }

    fn is_concurrent_with(&self, tag: &Tag) -> bool {
        matches!(self.base(), Self::ConcurrentWithTag(own) if own == tag)
    }

    /// Decide whether a command may enter the pending queue.
    ///
    /// Called once, before insertion. `ConcurrentWithTag` evicts queued commands of
    /// the same tag here; no other decision may touch the pending queue.
    pub fn should_admit(&self, pending: &mut RemoveOnlyQueue<'_>, running: &RunningView<'_>) -> bool {
        match self {
            Self::Concurrent => true,
            Self::ConcurrentWithTag(tag) => {
                pending.remove_matching(|command| strategy_of(command, |s| s.is_concurrent_with(tag)));
                true
            }
            Self::Single => {
                !pending.any(|command| strategy_of(command, Self::is_untagged_single))
                    && !running.any(|command| strategy_of(command, Self::is_untagged_single))
            }
            Self::SingleWithTag(tag) => {
                !pending.any(|command| strategy_of(command, |s| s.is_single_with(tag)))
                    && !running.any(|command| strategy_of(command, |s| s.is_single_with(tag)))
            }
            Self::Layered(layer) => {
                layer.base.should_admit(pending, running)
                    && !(layer.scope.covers_admission()
                        && (pending.any(|command| layer.carries(command)) || running.any(|command| layer.carries(command))))
            }
        }
    }

    /// Decide whether this (running) strategy prevents `other` from starting.
    pub fn should_block(&self, other: &dyn Schedulable) -> bool {
        match self.base() {
            Self::Single => true,
            Self::SingleWithTag(tag) => {
                strategy_of(other, |s| s.is_single_with(tag) || s.is_untagged_single())
            }
            _ => false,
        }
    }

    /// Decide whether the pending head may start right now.
    pub fn should_execute(&self, pending: &mut RemoveOnlyQueue<'_>, running: &RunningView<'_>) -> bool {
        match self {
            Self::Concurrent => true,
            Self::ConcurrentWithTag(tag) => {
                !running.any(|command| strategy_of(command, |s| s.is_concurrent_with(tag)))
            }
            Self::Single => running.is_empty(),
            Self::SingleWithTag(tag) => {
                !running.any(|command| strategy_of(command, |s| s.is_single_with(tag) || s.is_untagged_single()))
            }
            Self::Layered(layer) => {
                layer.base.should_execute(pending, running)
                    && !(layer.scope.covers_execution() && running.any(|command| layer.carries(command)))
            }
        }
    }
}

impl Layer {
    fn carries(&self, command: &dyn Schedulable) -> bool {
        strategy_of(command, |s| s.tag() == Some(&self.yield_to))
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concurrent => f.write_str("concurrent"),
            Self::ConcurrentWithTag(tag) => write!(f, "concurrent[{tag}]"),
            Self::Single => f.write_str("single"),
            Self::SingleWithTag(tag) => write!(f, "single[{tag}]"),
            Self::Layered(layer) => write!(f, "{} yielding to {}", layer.base, layer.yield_to),
        }
    }
}

fn strategy_of(command: &dyn Schedulable, predicate: impl FnOnce(&Strategy) -> bool) -> bool {
    command.strategy().is_some_and(predicate)
}
