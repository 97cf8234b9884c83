// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! The filter is read from the `DAGPOOL_LOG` environment variable (same
//! syntax as `RUST_LOG`, e.g. "info", "dagpool=debug"), defaulting to `info`.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup; a second call panics inside
/// `tracing-subscriber`, so embedders that install their own subscriber
/// should simply not call this.
pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_env("DAGPOOL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}
