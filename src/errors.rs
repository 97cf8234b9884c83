// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::graph::Handle;

#[derive(Error, Debug)]
pub enum PoolError {
    /// The handle is neither queued, running, nor finished-unconsumed.
    /// Returned for handles that were already consumed or cancelled.
    #[error("unknown task {0}")]
    UnknownTask(Handle),

    /// The body was torn down (panic or abort) before producing an outcome.
    #[error("task {0} was interrupted before completing")]
    Interrupted(Handle),

    /// The task body itself returned an error.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PoolError>;
