//! Runtime adapters: the async execution substrate command bodies run on.

use futures::future::BoxFuture;

#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;

/// Abstraction over an async executor.
///
/// Object safe so a root controller can hold any runtime behind `Arc<dyn Spawn>`.
pub trait Spawn: Send + Sync {
    /// Run `fut` to completion in the background.
    fn spawn(&self, fut: BoxFuture<'static, ()>);
}
