// src/pool/driver.rs

//! Driver loop and the wrapper future every task body runs inside.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, trace};

use crate::errors::{PoolError, Result};
use crate::exec::Spawner;
use crate::graph::{Handle, TaskBody};
use crate::pool::state::Shared;

/// Move ready nodes into execution whenever slots are free.
///
/// Reservation happens under the state lock; spawning happens outside it,
/// so retrying the wait can never double-start a body. The join handle is
/// attached in a second step; when cancellation won the race in between,
/// the freshly spawned body is aborted right here instead of leaking.
pub(crate) async fn drive<T: Send + 'static>(shared: Arc<Shared<T>>, spawner: Arc<dyn Spawner>) {
    info!("pool driver started");
    let mut version = shared.subscribe();
    loop {
        let batch = loop {
            let _ = version.borrow_and_update();
            let batch = shared.mutate_quiet(|state| state.reserve_ready());
            if !batch.is_empty() {
                break batch;
            }
            if version.changed().await.is_err() {
                info!("pool state gone; driver stopping");
                return;
            }
        };

        for (handle, body) in batch {
            trace!(task = %handle, "starting task body");
            let join = spawner.spawn(Box::pin(run_body(Arc::clone(&shared), handle, body)));
            if let Some(orphan) = shared.mutate_quiet(|state| state.attach(handle, join)) {
                orphan.abort();
            }
        }
    }
}

/// Wrap a claimed body so the epilogue runs on every exit path: normal
/// return, body failure, panic, and abort (including an abort that lands
/// before the wrapper was ever polled).
pub(crate) fn run_body<T: Send + 'static>(
    shared: Arc<Shared<T>>,
    handle: Handle,
    body: TaskBody<T>,
) -> impl Future<Output = ()> + Send {
    // Created eagerly: the guard travels inside the future from the moment
    // it exists, so dropping the un-polled future still runs the epilogue.
    let guard = EpilogueGuard {
        shared,
        handle,
        settled: false,
    };
    async move {
        let outcome = body.await.map_err(PoolError::from);
        guard.settle(outcome);
    }
}

/// Runs the task epilogue exactly once: explicitly on settle, or from
/// `Drop` when the body never got to settle.
struct EpilogueGuard<T> {
    shared: Arc<Shared<T>>,
    handle: Handle,
    settled: bool,
}

impl<T> EpilogueGuard<T> {
    fn settle(mut self, outcome: Result<T>) {
        self.settled = true;
        self.shared
            .mutate(|state| state.finish(self.handle, Some(outcome)));
    }
}

impl<T> Drop for EpilogueGuard<T> {
    fn drop(&mut self) {
        if !self.settled {
            // Abort or panic: no outcome to record, but the slot and the
            // dependents must not be lost.
            self.shared.mutate(|state| state.finish(self.handle, None));
        }
    }
}
