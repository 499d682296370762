//! # Prometheus Command Scheduler
//!
//! A strategy-driven command scheduler that serializes asynchronous units of work
//! ("commands") against a single shared piece of state.
//!
//! Every command carries an execution [`Strategy`](core::Strategy) that answers three
//! questions: may it be queued now, should it block another command while it runs,
//! and may it start now. A [`CommandManager`](core::CommandManager) drives the
//! admission → scheduling pass → execution loop and funnels every state change
//! through lifecycle hooks into an equality-suppressing [`StateCell`](core::StateCell).
//!
//! ## Core Problem Solved
//!
//! Client applications fire overlapping requests against one screen-level state:
//!
//! - **Refresh vs. paging**: a full refresh must win over "load next page"
//! - **Duplicate taps**: a second submit while the first is queued should be dropped
//! - **Last writer wins**: a newer search query should supersede a queued older one
//! - **Optimistic updates**: state reflects "queued"/"running" before the work finishes
//!
//! ## Key Features
//!
//! - **Pluggable strategies**: concurrent, concurrent-per-tag, single, single-per-tag,
//!   and layered strategies that defer to another tag
//! - **Head-of-line ordering**: only the pending head is considered each pass
//! - **Lifecycle hooks**: `on_added`, `on_starting`, `on_success`, `on_fail`, `on_finished`
//! - **Hierarchical scopes**: nested controllers share one execution budget and one
//!   idle notification hub
//! - **Cooperative cancellation**: tearing a scope down cancels its running bodies
//!
//! ## Example
//!
//! ```rust,ignore
//! use prometheus_command_scheduler::builders::ManagerBuilder;
//! use prometheus_command_scheduler::core::{Command, CommandError, StateAccess, Strategy};
//! use prometheus_command_scheduler::runtime::TokioSpawner;
//!
//! struct Increment {
//!     strategy: Strategy,
//! }
//!
//! #[async_trait::async_trait]
//! impl Command<u32> for Increment {
//!     type Output = u32;
//!
//!     fn strategy(&self) -> Option<&Strategy> {
//!         Some(&self.strategy)
//!     }
//!
//!     async fn execute(&self, state: StateAccess<u32>) -> Result<u32, CommandError> {
//!         Ok(state.get() + 1)
//!     }
//!
//!     fn on_success(&self, _state: u32, output: u32) -> u32 {
//!         output
//!     }
//! }
//!
//! let manager = ManagerBuilder::new("counter", 0_u32)
//!     .spawner(TokioSpawner::current())
//!     .build()?;
//! manager.post_command(Increment { strategy: Strategy::Single });
//! ```
//!
//! For complete scenarios, see:
//! - `tests/command_manager_test.rs` - strategy and lifecycle behaviour
//! - `tests/hierarchy_test.rs` - nested scopes sharing one execution budget
//! - `tests/pagination_test.rs` - refresh and load-next commands on a live manager

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: strategies, commands, controllers and the manager.
pub mod core;
/// Configuration models for scheduling scopes.
pub mod config;
/// Builders to construct command managers from configuration.
pub mod builders;
/// Pagination commands and state built on top of the scheduler.
pub mod pagination;
/// Runtime adapters for spawning command bodies.
pub mod runtime;
/// Shared utilities.
pub mod util;
