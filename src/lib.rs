// src/lib.rs

//! Dependency-aware task pool.
//!
//! Callers submit asynchronous task bodies, optionally link them into a
//! dependency DAG, and the pool runs each body exactly once, once all of its
//! dependencies have completed, never exceeding the configured slot count.
//! Outcomes stay available until consumed; cancelling a task unschedules
//! every transitive dependent along with it.

pub mod errors;
pub mod exec;
pub mod graph;
pub mod logging;
pub mod pool;

pub use errors::{PoolError, Result};
pub use exec::{Spawner, TokioSpawner};
pub use graph::{EdgeState, Handle, TaskBody, TaskGraph};
pub use pool::Pool;
