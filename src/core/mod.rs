//! Core scheduling abstractions: strategies, commands, controllers and the manager.

pub mod audit;
pub mod command;
pub mod controller;
pub mod convert;
pub mod error;
pub mod idle;
pub mod manager;
pub mod queue;
pub mod state_cell;
pub mod strategy;

pub use audit::{CallbackLogSink, InMemoryLogSink, LogLevel, LogRecord, LogSink, TracingLogSink};
pub use command::{Command, Schedulable, State, StateAccess};
pub use controller::{
    CommandSummary, Completion, CompletionCallback, ControllerSnapshot, ExecutionController, ExecutionSlot,
};
pub use convert::DataConvertCommand;
pub use error::{CommandError, SchedulerError};
pub use idle::{IdleHub, IdleListener, IdleSubscription};
pub use manager::{CommandManager, ManagerSnapshot};
pub use queue::{CommandId, RemoveOnlyQueue, RunningView};
pub use state_cell::{StateCell, ThreadAffinity};
pub use strategy::{Layer, LayerScope, Strategy, Tag};
