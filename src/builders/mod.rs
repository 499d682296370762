//! Builders to construct command managers from configuration.

pub mod manager_builder;

pub use manager_builder::{build_managers, ManagerBuilder, ScopeSet};
