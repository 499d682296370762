//! Tokio runtime spawner implementation.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::runtime::{Builder, Handle, Runtime};

use super::Spawn;

/// Tokio-based spawner that executes command bodies on a tokio runtime.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: Handle,
    // Keeps an owned runtime alive for as long as any clone of the spawner exists.
    _runtime: Option<Arc<Runtime>>,
}

impl TokioSpawner {
    /// Create a new `TokioSpawner` from a tokio runtime handle.
    pub const fn new(handle: Handle) -> Self {
        Self {
            handle,
            _runtime: None,
        }
    }

    /// Spawner bound to the runtime the caller is currently running in.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime context.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Create a spawner owning a new multi-threaded runtime with `worker_threads` workers.
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, std::io::Error> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("command-scheduler")
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            _runtime: Some(Arc::new(runtime)),
        })
    }

    /// Owned runtime sized to the number of logical CPUs.
    pub fn with_default_workers() -> Result<Self, std::io::Error> {
        Self::with_worker_threads(num_cpus::get().max(1))
    }

    /// Handle of the runtime bodies are spawned on.
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, fut: BoxFuture<'static, ()>) {
        self.handle.spawn(fut);
    }
}
