// src/pool/mod.rs

//! The pool itself.
//!
//! - [`state`] holds the pure scheduling state machine (graph, process
//!   table, slot accounting) behind the atomic coordinator.
//! - [`driver`] contains the driver loop that turns ready graph nodes into
//!   running bodies, and the epilogue wrapper those bodies run inside.
//!
//! [`Pool`] is the public surface over both.

pub(crate) mod driver;
pub mod state;

pub use state::PoolState;

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::{PoolError, Result};
use crate::exec::{Spawner, TokioSpawner};
use crate::graph::Handle;
use crate::pool::state::Shared;

/// Dependency-aware task pool.
///
/// Submitted bodies run on background execution contexts provided by the
/// pool's [`Spawner`], at most `slots` at a time, each only once every task
/// it depends on has completed. Nothing runs until a driver loop is started
/// with [`run`](Pool::run) or [`spawn_driver`](Pool::spawn_driver);
/// submissions made before that simply stay queued.
///
/// All result types of one pool are uniform (`T`); callers needing
/// heterogeneous results can parameterize several pools or carry an enum.
/// Cloning is cheap and every clone operates on the same pool.
pub struct Pool<T> {
    shared: Arc<Shared<T>>,
    spawner: Arc<dyn Spawner>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            spawner: Arc::clone(&self.spawner),
        }
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Pool with `slots` concurrent slots, executing bodies on the ambient
    /// Tokio runtime.
    pub fn new(slots: usize) -> Self {
        Self::with_spawner(slots, Arc::new(TokioSpawner))
    }

    /// Pool with a custom execution backend.
    pub fn with_spawner(slots: usize, spawner: Arc<dyn Spawner>) -> Self {
        Self {
            shared: Arc::new(Shared::new(slots)),
            spawner,
        }
    }

    /// Submit a task with no dependencies.
    ///
    /// The outcome stays available until consumed with
    /// [`poll_outcome`](Pool::poll_outcome) or
    /// [`wait_outcome`](Pool::wait_outcome); a task nobody ever observes
    /// keeps its table entry indefinitely.
    pub fn submit<F>(&self, body: F) -> Handle
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.shared
            .mutate(|state| state.submit(Box::pin(body), false, &[]))
    }

    /// Like [`submit`](Pool::submit), but the outcome is discarded the
    /// moment the body settles; the pool keeps no record of the task.
    pub fn submit_detached<F>(&self, body: F) -> Handle
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.shared
            .mutate(|state| state.submit(Box::pin(body), true, &[]))
    }

    /// Submit a task that waits for every handle in `parents`.
    ///
    /// Node and dependency edges appear in one atomic step: the task can
    /// never be observed without them. A parent that has already finished
    /// and left the pool imposes no constraint.
    pub fn submit_after<F, I>(&self, parents: I, body: F) -> Handle
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        I: IntoIterator<Item = Handle>,
    {
        let parents: Vec<Handle> = parents.into_iter().collect();
        self.shared
            .mutate(|state| state.submit(Box::pin(body), false, &parents))
    }

    /// Detached variant of [`submit_after`](Pool::submit_after).
    pub fn submit_after_detached<F, I>(&self, parents: I, body: F) -> Handle
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        I: IntoIterator<Item = Handle>,
    {
        let parents: Vec<Handle> = parents.into_iter().collect();
        self.shared
            .mutate(|state| state.submit(Box::pin(body), true, &parents))
    }

    /// Make `child` wait for `parent`.
    ///
    /// No-op when the parent already finished and left the pool, or when
    /// either task was cancelled; the child is then unconstrained rather
    /// than blocked on a vanished parent.
    pub fn add_dependency(&self, parent: Handle, child: Handle) {
        self.shared.mutate(|state| state.add_dependency(parent, child));
    }

    /// Change the slot limit.
    ///
    /// Growing may immediately unblock the driver; shrinking never
    /// interrupts bodies that are already running.
    pub fn set_slots(&self, slots: usize) {
        self.shared.mutate(|state| state.resize(slots));
    }

    /// Non-blocking result observation.
    ///
    /// `Some(outcome)` consumes a settled task's entry; `None` means the
    /// task is still queued or in flight. A handle the pool no longer
    /// knows (consumed or cancelled) yields
    /// `Some(Err(`[`PoolError::UnknownTask`]`))`.
    pub fn poll_outcome(&self, handle: Handle) -> Option<Result<T>> {
        let outcome = self.shared.mutate_quiet(|state| state.poll(handle));
        if outcome.is_some() {
            // Consuming an entry is visible to other observers of the same
            // handle; a fruitless poll changes nothing and wakes nobody.
            self.shared.notify();
        }
        outcome
    }

    /// Block until the task settles or is cancelled, then consume the
    /// outcome. Same contract as [`poll_outcome`](Pool::poll_outcome)
    /// otherwise.
    pub async fn wait_outcome(&self, handle: Handle) -> Result<T> {
        let mut version = self.shared.subscribe();
        loop {
            let _ = version.borrow_and_update();
            if let Some(outcome) = self.poll_outcome(handle) {
                return outcome;
            }
            if version.changed().await.is_err() {
                // The pool state is gone; nothing can settle anymore.
                return Err(PoolError::UnknownTask(handle));
            }
        }
    }

    /// Unschedule `handle` and every transitive dependent, aborting bodies
    /// that are already running.
    ///
    /// Once this returns, no dependent of `handle` will newly start. A task
    /// that already finished and left the pool is unaffected; its outcome
    /// stays consumable.
    pub fn cancel(&self, handle: Handle) {
        let joins = self.shared.mutate(|state| state.cancel(handle));
        for join in joins {
            join.abort();
        }
    }

    /// Drop every task, queued or running.
    pub fn cancel_all(&self) {
        debug!("cancelling all tasks");
        let joins = self.shared.mutate(|state| state.cancel_all());
        for join in joins {
            join.abort();
        }
    }

    /// Drive the pool: whenever a slot and a ready task exist, start the
    /// body; repeat forever.
    ///
    /// Runs until the returned future is dropped. Bodies keep running on
    /// their own contexts when the driver stops; they just stop being
    /// joined by new ones.
    pub async fn run(&self) {
        driver::drive(Arc::clone(&self.shared), Arc::clone(&self.spawner)).await
    }

    /// Start the driver loop as a background task via the pool's spawner
    /// and hand back its join handle.
    pub fn spawn_driver(&self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let spawner = Arc::clone(&self.spawner);
        self.spawner
            .spawn(Box::pin(driver::drive(shared, spawner)))
    }

    /// True when nothing is queued, running, or finished-unconsumed.
    pub fn is_idle(&self) -> bool {
        self.shared.read(|state| state.is_idle())
    }

    /// Number of bodies currently in flight.
    pub fn in_flight(&self) -> usize {
        self.shared.read(|state| state.in_flight())
    }

    /// Configured concurrency limit.
    pub fn slot_count(&self) -> usize {
        self.shared.read(|state| state.slot_count())
    }

    /// Slots not currently occupied by a running body.
    pub fn available_slots(&self) -> usize {
        self.shared.read(|state| state.available_slots())
    }
}
