// src/graph/node.rs

//! Task identity, suspended bodies, and dependency edge tags.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Opaque identity of a submitted task, unique within one pool.
///
/// Handles are minted from a monotonically increasing counter and never
/// reused. Callers must not assume contiguity, only uniqueness and that a
/// later submission compares greater than an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub(crate) u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A user-supplied, not-yet-invoked unit of work producing the pool's
/// result type.
pub type TaskBody<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'static>>;

/// Tag on a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeState {
    /// The parent has not completed yet; the child keeps waiting.
    Pending,
    /// The parent completed; this edge no longer blocks the child.
    Completed,
}

/// Internal node: the suspended body plus adjacency information.
pub(crate) struct TaskNode<T> {
    /// Present until the driver claims the node for execution.
    pub body: Option<TaskBody<T>>,
    /// Detached tasks drop their own process-table entry when they settle.
    pub detached: bool,
    /// Set when the body terminated but dependents still hold the node.
    pub finished: bool,
    /// Incoming edges, keyed by parent handle.
    pub deps: BTreeMap<Handle, EdgeState>,
    /// Mirror of the outgoing edges.
    pub dependents: Vec<Handle>,
}

impl<T> TaskNode<T> {
    pub fn new(body: TaskBody<T>, detached: bool) -> Self {
        Self {
            body: Some(body),
            detached,
            finished: false,
            deps: BTreeMap::new(),
            dependents: Vec::new(),
        }
    }
}
