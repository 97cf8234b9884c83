// src/exec/mod.rs

//! Execution backend layer.
//!
//! The pool needs exactly one capability from its runtime: place a future
//! on a background execution context and hand back a join handle that can
//! be aborted. [`spawner`] defines that seam and the Tokio-backed default.

pub mod spawner;

pub use spawner::{Job, Spawner, TokioSpawner};
