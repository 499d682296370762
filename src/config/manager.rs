//! Manager and scheduler configuration structures.

use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};

use crate::core::{SchedulerError, ThreadAffinity};

/// Default ceiling on head-changed rescans within one scheduling pass.
pub const DEFAULT_MAX_RESCAN_PASSES: usize = 1024;

const ENV_MAX_RESCAN_PASSES: &str = "COMMAND_SCHEDULER_MAX_RESCAN_PASSES";
const ENV_THREAD_AFFINITY: &str = "COMMAND_SCHEDULER_THREAD_AFFINITY";
const ENV_START_BLOCKED: &str = "COMMAND_SCHEDULER_START_BLOCKED";

const fn default_max_rescan_passes() -> usize {
    DEFAULT_MAX_RESCAN_PASSES
}

fn default_name() -> String {
    "default".to_string()
}

/// Configuration of one command manager scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Scope label used in logs and snapshots.
    #[serde(default = "default_name")]
    pub name: String,
    /// Maximum number of consecutive rescans without a launch in one scheduling pass.
    #[serde(default = "default_max_rescan_passes")]
    pub max_rescan_passes: usize,
    /// Threads allowed to publish state.
    #[serde(default)]
    pub thread_affinity: ThreadAffinity,
    /// Start with executions blocked until `allow_executions` is called.
    #[serde(default)]
    pub start_blocked: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_rescan_passes: DEFAULT_MAX_RESCAN_PASSES,
            thread_affinity: ThreadAffinity::Any,
            start_blocked: false,
        }
    }
}

impl ManagerConfig {
    /// Default configuration with the given scope name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.name.trim().is_empty() {
            return Err(SchedulerError::InvalidConfig("name must not be empty".into()));
        }
        if self.max_rescan_passes == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_rescan_passes must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Parse a manager configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| SchedulerError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build a configuration from `COMMAND_SCHEDULER_*` environment variables,
    /// loading a `.env` file first if one exists. Unset variables keep their defaults.
    pub fn from_env(name: impl Into<String>) -> Result<Self, SchedulerError> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::named(name);
        if let Ok(raw) = env::var(ENV_MAX_RESCAN_PASSES) {
            cfg.max_rescan_passes = raw
                .trim()
                .parse()
                .map_err(|e| SchedulerError::Parse(format!("{ENV_MAX_RESCAN_PASSES}: {e}")))?;
        }
        if let Ok(raw) = env::var(ENV_THREAD_AFFINITY) {
            cfg.thread_affinity = match raw.trim().to_ascii_lowercase().as_str() {
                "any" => ThreadAffinity::Any,
                "pinned" => ThreadAffinity::Pinned,
                other => {
                    return Err(SchedulerError::Parse(format!(
                        "{ENV_THREAD_AFFINITY}: expected `any` or `pinned`, got `{other}`"
                    )))
                }
            };
        }
        if let Ok(raw) = env::var(ENV_START_BLOCKED) {
            cfg.start_blocked = raw
                .trim()
                .parse()
                .map_err(|e| SchedulerError::Parse(format!("{ENV_START_BLOCKED}: {e}")))?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Root scheduler configuration: a set of sibling scopes sharing one root controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Name of the shared root controller.
    #[serde(default = "default_root")]
    pub root: String,
    /// Map of scope name to configuration.
    pub scopes: HashMap<String, ManagerConfig>,
}

fn default_root() -> String {
    "root".to_string()
}

impl SchedulerConfig {
    /// Validate all scopes and ensure at least one exists.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.scopes.is_empty() {
            return Err(SchedulerError::InvalidConfig("at least one scope must be defined".into()));
        }
        for (name, scope) in &self.scopes {
            scope
                .validate()
                .map_err(|e| SchedulerError::InvalidConfig(format!("scope `{name}` invalid: {e}")))?;
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| SchedulerError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Configuration of `scope`, named after its map key.
    pub fn scope(&self, scope: &str) -> Result<ManagerConfig, SchedulerError> {
        self.scopes
            .get(scope)
            .map(|cfg| ManagerConfig {
                name: scope.to_string(),
                ..cfg.clone()
            })
            .ok_or_else(|| SchedulerError::UnknownScope(scope.to_string()))
    }
}
