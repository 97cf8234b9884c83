// src/pool/state.rs

//! Pure pool state and every mutation on it.
//!
//! [`PoolState`] owns the task graph, the process table, and the slot
//! accounting. It is synchronous and deterministic, with **no** channels,
//! Tokio I/O, or time, so the whole scheduling state machine can be unit
//! tested without a runtime. The async shell wraps it in [`Shared`]: one
//! coarse mutex, so each method call below is one atomic step from the
//! point of view of every other pool operation, plus a version channel that
//! wakes blocked observers after a step that could unblock them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::errors::{PoolError, Result};
use crate::graph::{Handle, TaskBody, TaskGraph};

/// Process-table entry: one per spawned body whose outcome has not been
/// consumed yet.
pub(crate) enum ProcEntry<T> {
    /// Body spawned. The join handle is attached once the driver has
    /// registered it; between reserve and attach it is briefly absent.
    Running {
        join: Option<JoinHandle<()>>,
        detached: bool,
    },
    /// Body terminated; outcome waiting to be consumed.
    Settled(Result<T>),
}

/// The pool's complete scheduling state.
pub struct PoolState<T> {
    graph: TaskGraph<T>,
    procs: HashMap<Handle, ProcEntry<T>>,
    /// Configured concurrency limit.
    slots: usize,
    /// Currently unused slots; `slots - avail` bodies are in flight.
    avail: usize,
    /// Monotonic handle mint; never reused.
    tokens: u64,
}

impl<T> PoolState<T> {
    pub fn new(slots: usize) -> Self {
        Self {
            graph: TaskGraph::new(),
            procs: HashMap::new(),
            slots,
            avail: slots,
            tokens: 0,
        }
    }

    /// Insert a new task node; `parents` adds dependency edges in the same
    /// step, so the task is never observable without them.
    pub fn submit(&mut self, body: TaskBody<T>, detached: bool, parents: &[Handle]) -> Handle {
        self.tokens += 1;
        let handle = Handle(self.tokens);
        self.graph.insert(handle, body, detached);
        for parent in parents {
            self.graph.add_dependency(*parent, handle);
        }
        debug!(task = %handle, deps = parents.len(), detached, "task submitted");
        handle
    }

    /// Make `child` wait for `parent`. See [`TaskGraph::add_dependency`]
    /// for the liveness rules around vanished or finished parents.
    pub fn add_dependency(&mut self, parent: Handle, child: Handle) {
        self.graph.add_dependency(parent, child);
    }

    /// Reserve up to `avail` ready nodes: claim their bodies, debit the
    /// slot counter, and pre-insert running placeholders so the nodes can
    /// neither be picked twice nor hide from cancellation.
    pub fn reserve_ready(&mut self) -> Vec<(Handle, TaskBody<T>)> {
        if self.avail == 0 {
            return Vec::new();
        }
        let ready = self.graph.ready_nodes(self.avail);
        let mut batch = Vec::with_capacity(ready.len());
        for handle in ready {
            if let Some((body, detached)) = self.graph.claim_body(handle) {
                self.procs
                    .insert(handle, ProcEntry::Running { join: None, detached });
                self.avail -= 1;
                batch.push((handle, body));
            }
        }
        if !batch.is_empty() {
            trace!(count = batch.len(), avail = self.avail, "reserved ready tasks");
        }
        batch
    }

    /// Attach the join handle produced by the spawner.
    ///
    /// Hands the join handle back when the entry vanished in the meantime
    /// (cancelled between reserve and attach); the caller must abort it.
    pub(crate) fn attach(&mut self, handle: Handle, join: JoinHandle<()>) -> Option<JoinHandle<()>> {
        match self.procs.get_mut(&handle) {
            Some(ProcEntry::Running { join: slot, .. }) => {
                *slot = Some(join);
                None
            }
            // The body outran its registration and already settled; the
            // join handle has served its purpose.
            Some(ProcEntry::Settled(_)) => None,
            None => {
                warn!(task = %handle, "task cancelled before its join handle was registered");
                Some(join)
            }
        }
    }

    /// Epilogue for a terminated body: restore the slot, settle the graph,
    /// and record the outcome unless the entry is gone or detached.
    ///
    /// `outcome` is `None` when the body was torn down without producing a
    /// value (abort or panic).
    pub fn finish(&mut self, handle: Handle, outcome: Option<Result<T>>) {
        // min() covers a slot limit shrunk below current utilisation.
        self.avail = (self.avail + 1).min(self.slots);
        self.graph.finish_node(handle);
        match self.procs.get(&handle) {
            Some(ProcEntry::Running { detached: true, .. }) => {
                self.procs.remove(&handle);
                debug!(task = %handle, "detached task settled; entry dropped");
            }
            Some(ProcEntry::Running { .. }) => {
                let outcome = outcome.unwrap_or(Err(PoolError::Interrupted(handle)));
                self.procs.insert(handle, ProcEntry::Settled(outcome));
                debug!(task = %handle, "task settled");
            }
            Some(ProcEntry::Settled(_)) => {
                trace!(task = %handle, "duplicate finish for a settled task");
            }
            None => {
                trace!(task = %handle, "finish for a cancelled task; slot restored only");
            }
        }
    }

    /// Remove `handle` and its transitive dependents from both the graph
    /// and the process table.
    ///
    /// Returns the join handles of affected running bodies; the caller
    /// aborts them outside the lock. A task that already finished and left
    /// the graph is not affected and its outcome stays consumable.
    pub fn cancel(&mut self, handle: Handle) -> Vec<JoinHandle<()>> {
        let removed = self.graph.remove_closure(handle);
        if removed.is_empty() {
            debug!(task = %handle, "cancel for a task not in the graph; nothing to do");
            return Vec::new();
        }
        let mut joins = Vec::new();
        for h in &removed {
            if let Some(ProcEntry::Running { join: Some(join), .. }) = self.procs.remove(h) {
                joins.push(join);
            }
        }
        debug!(
            task = %handle,
            removed = removed.len(),
            aborting = joins.len(),
            "cancelled task and its dependents"
        );
        joins
    }

    /// Empty the graph and the process table at once. Returns the join
    /// handles of all running bodies for the caller to abort.
    pub fn cancel_all(&mut self) -> Vec<JoinHandle<()>> {
        self.graph.clear();
        let mut joins = Vec::new();
        for (_, entry) in self.procs.drain() {
            if let ProcEntry::Running { join: Some(join), .. } = entry {
                joins.push(join);
            }
        }
        debug!(aborting = joins.len(), "cancelled every task in the pool");
        joins
    }

    /// Adjust the slot limit. Growth frees slots immediately; shrinking
    /// below current utilisation lets running bodies drain naturally.
    pub fn resize(&mut self, slots: usize) {
        self.avail = (self.avail + slots).saturating_sub(self.slots);
        let prev = self.slots;
        self.slots = slots;
        debug!(from = prev, to = slots, avail = self.avail, "slot limit changed");
    }

    /// One non-blocking observation step: a settled outcome is consumed and
    /// returned; a task still queued or in flight reports `None`; a handle
    /// absent from both structures reports [`PoolError::UnknownTask`].
    pub fn poll(&mut self, handle: Handle) -> Option<Result<T>> {
        match self.procs.remove(&handle) {
            Some(ProcEntry::Settled(outcome)) => Some(outcome),
            Some(running) => {
                // Still in flight; keep the entry.
                self.procs.insert(handle, running);
                None
            }
            None if self.graph.contains(handle) => None,
            None => Some(Err(PoolError::UnknownTask(handle))),
        }
    }

    /// Read access to the task graph, for diagnostics and tests.
    pub fn graph(&self) -> &TaskGraph<T> {
        &self.graph
    }

    /// Configured concurrency limit.
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    /// Slots not currently occupied by a running body.
    pub fn available_slots(&self) -> usize {
        self.avail
    }

    /// Number of bodies currently in flight.
    pub fn in_flight(&self) -> usize {
        self.slots - self.avail
    }

    /// True when nothing is queued, running, or finished-unconsumed.
    pub fn is_idle(&self) -> bool {
        self.graph.is_empty() && self.procs.is_empty()
    }
}

/// The atomic coordinator: one coarse lock over [`PoolState`] plus a
/// version channel that implements retry-style blocking.
///
/// Every blocked operation (the driver waiting for a ready task, a caller
/// waiting for an outcome) marks the current version as seen, re-checks its
/// predicate under the lock, and sleeps until the version moves. Mutations
/// bump the version after releasing the lock, so wakeups cannot be lost.
pub(crate) struct Shared<T> {
    state: Mutex<PoolState<T>>,
    version: watch::Sender<u64>,
}

impl<T> Shared<T> {
    pub fn new(slots: usize) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: Mutex::new(PoolState::new(slots)),
            version,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<T>> {
        self.state.lock().expect("pool state lock poisoned")
    }

    /// Run one atomic step and wake every blocked observer afterwards.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut PoolState<T>) -> R) -> R {
        let result = f(&mut self.lock());
        self.notify();
        result
    }

    /// Atomic step that wakes nobody: driver-internal bookkeeping (reserve,
    /// attach) and polls that consumed nothing. Waking here would make every
    /// retrying observer its own alarm clock.
    pub fn mutate_quiet<R>(&self, f: impl FnOnce(&mut PoolState<T>) -> R) -> R {
        f(&mut self.lock())
    }

    /// Wake every blocked observer without touching the state.
    pub fn notify(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Consistent read of the state.
    pub fn read<R>(&self, f: impl FnOnce(&PoolState<T>) -> R) -> R {
        f(&self.lock())
    }

    /// Version channel receiver for retry-style blocking.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}
