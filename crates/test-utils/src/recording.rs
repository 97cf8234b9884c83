use std::sync::{Arc, Mutex};
use std::time::Instant;

use dagpool::exec::{Job, Spawner, TokioSpawner};
use tokio::task::JoinHandle;

/// Spawner that records when each job was started, then delegates to Tokio.
///
/// Note that the driver loop itself goes through the pool's spawner too:
/// tests that count spawns should start the driver with
/// `tokio::spawn(async move { pool.run().await })` rather than
/// `Pool::spawn_driver`, so only task bodies show up here.
pub struct RecordingSpawner {
    inner: TokioSpawner,
    spawned_at: Arc<Mutex<Vec<Instant>>>,
}

impl RecordingSpawner {
    pub fn new() -> Self {
        Self {
            inner: TokioSpawner,
            spawned_at: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// How many jobs have been started so far.
    pub fn spawn_count(&self) -> usize {
        self.spawned_at.lock().unwrap().len()
    }

    /// Start instants of every job, in spawn order.
    pub fn spawned_at(&self) -> Vec<Instant> {
        self.spawned_at.lock().unwrap().clone()
    }
}

impl Default for RecordingSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl Spawner for RecordingSpawner {
    fn spawn(&self, job: Job) -> JoinHandle<()> {
        self.spawned_at.lock().unwrap().push(Instant::now());
        self.inner.spawn(job)
    }
}
