// src/exec/spawner.rs

//! Pluggable "spawn a background computation" seam.
//!
//! Production code uses [`TokioSpawner`]; tests can wrap it to observe
//! which bodies get started and when, without touching pool internals.

use std::future::Future;
use std::pin::Pin;

use tokio::task::JoinHandle;

/// Unit of work handed to a [`Spawner`]: the pool's wrapper future around a
/// task body, or the driver loop itself.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Trait abstracting how jobs are placed on an executor.
pub trait Spawner: Send + Sync {
    /// Start `job` on a background execution context.
    fn spawn(&self, job: Job) -> JoinHandle<()>;
}

/// Default backend: spawn directly onto the ambient Tokio runtime.
///
/// Panics (inside `tokio::spawn`) when used outside a runtime.
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    fn spawn(&self, job: Job) -> JoinHandle<()> {
        tokio::spawn(job)
    }
}
