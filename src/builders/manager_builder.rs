//! Builders to construct command managers from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ManagerConfig, SchedulerConfig};
use crate::core::{
    CommandManager, ExecutionController, ExecutionSlot, LogSink, SchedulerError, State, StateCell,
};
use crate::runtime::Spawn;

/// Step-by-step construction of a [`CommandManager`].
///
/// A manager needs either a spawner (it becomes a root scope) or a parent
/// controller (it becomes a nested scope sharing the parent's execution budget).
pub struct ManagerBuilder<S: State> {
    config: ManagerConfig,
    initial: S,
    spawner: Option<Arc<dyn Spawn>>,
    parent: Option<Arc<dyn ExecutionSlot>>,
    sink: Option<Arc<dyn LogSink>>,
}

impl<S: State> ManagerBuilder<S> {
    /// Start a builder for scope `name` holding `initial` state.
    pub fn new(name: impl Into<String>, initial: S) -> Self {
        Self::from_config(ManagerConfig::named(name), initial)
    }

    /// Start a builder from an existing configuration.
    pub const fn from_config(config: ManagerConfig, initial: S) -> Self {
        Self {
            config,
            initial,
            spawner: None,
            parent: None,
            sink: None,
        }
    }

    /// Start a builder for `scope` as configured in `cfg`.
    pub fn from_scheduler_config(cfg: &SchedulerConfig, scope: &str, initial: S) -> Result<Self, SchedulerError> {
        Ok(Self::from_config(cfg.scope(scope)?, initial))
    }

    /// Scope name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current configuration.
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run command bodies on `spawner`; the manager becomes a root scope.
    #[must_use]
    pub fn spawner(self, spawner: impl Spawn + 'static) -> Self {
        self.shared_spawner(Arc::new(spawner))
    }

    /// Like [`spawner`](Self::spawner), for a spawner that is already shared.
    #[must_use]
    pub fn shared_spawner(mut self, spawner: Arc<dyn Spawn>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Nest the manager's controller under `parent`. Takes precedence over a spawner.
    #[must_use]
    pub fn parent<P: State>(mut self, parent: &ExecutionController<P>) -> Self {
        self.parent = Some(parent.as_slot());
        self
    }

    /// Forward log lines to `sink` in addition to `tracing`.
    #[must_use]
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration and assemble the manager.
    pub fn build(self) -> Result<CommandManager<S>, SchedulerError> {
        self.config.validate()?;
        let name = self.config.name.clone();
        let controller = match (self.parent, self.spawner) {
            (Some(parent), _) => {
                if parent.cancellation().is_cancelled() {
                    return Err(SchedulerError::ScopeShutDown(parent.scope().to_string()));
                }
                ExecutionController::from_slot(name, parent)
            }
            (None, Some(spawner)) => ExecutionController::new(name, spawner),
            (None, None) => {
                return Err(SchedulerError::InvalidConfig(format!(
                    "scope `{name}` needs a spawner or a parent controller"
                )))
            }
        };
        let state = Arc::new(StateCell::with_affinity(self.initial, self.config.thread_affinity));
        Ok(CommandManager::assemble(self.config, state, controller, self.sink))
    }
}

/// Sibling scopes built from a [`SchedulerConfig`], sharing one root controller.
pub struct ScopeSet<S: State> {
    /// Root controller every scope is nested under.
    pub root: ExecutionController<()>,
    /// Managers keyed by scope name.
    pub managers: HashMap<String, CommandManager<S>>,
}

impl<S: State> ScopeSet<S> {
    /// Manager of `scope`.
    pub fn get(&self, scope: &str) -> Result<&CommandManager<S>, SchedulerError> {
        self.managers
            .get(scope)
            .ok_or_else(|| SchedulerError::UnknownScope(scope.to_string()))
    }

    /// Tear down the root and with it every scope.
    pub fn shutdown(&self) {
        for manager in self.managers.values() {
            manager.shutdown();
        }
        self.root.shutdown();
    }
}

/// Build one manager per configured scope, all nested under a shared root
/// controller running on `spawner`. `initial_state` supplies each scope's state.
pub fn build_managers<S, F>(
    cfg: &SchedulerConfig,
    spawner: Arc<dyn Spawn>,
    mut initial_state: F,
) -> Result<ScopeSet<S>, SchedulerError>
where
    S: State,
    F: FnMut(&str, &ManagerConfig) -> Result<S, SchedulerError>,
{
    cfg.validate()?;

    let root = ExecutionController::<()>::new(cfg.root.clone(), spawner);
    let mut managers = HashMap::new();
    for name in cfg.scopes.keys() {
        let scope_cfg = cfg.scope(name)?;
        let initial = initial_state(name, &scope_cfg)?;
        let manager = ManagerBuilder::from_config(scope_cfg, initial).parent(&root).build()?;
        managers.insert(name.clone(), manager);
    }
    tracing::info!(root = %cfg.root, scopes = managers.len(), "scopes built");

    Ok(ScopeSet { root, managers })
}
