use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dagpool::Pool;
use dagpool_test_utils::{init_tracing, with_timeout};

/// Shared clock: each body records when it started and when it ended.
#[derive(Clone, Default)]
struct Spans(Arc<Mutex<HashMap<&'static str, (Instant, Instant)>>>);

impl Spans {
    async fn record(&self, name: &'static str, work: Duration) {
        let start = Instant::now();
        tokio::time::sleep(work).await;
        self.0.lock().unwrap().insert(name, (start, Instant::now()));
    }

    fn start(&self, name: &str) -> Instant {
        self.0.lock().unwrap()[name].0
    }

    fn end(&self, name: &str) -> Instant {
        self.0.lock().unwrap()[name].1
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn linear_chain_runs_in_dependency_order() {
    init_tracing();

    let pool: Pool<()> = Pool::new(4);
    let driver = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let spans = Spans::default();
    let a = pool.submit({
        let spans = spans.clone();
        async move {
            spans.record("a", Duration::from_millis(10)).await;
            Ok(())
        }
    });
    let b = pool.submit_after([a], {
        let spans = spans.clone();
        async move {
            spans.record("b", Duration::from_millis(10)).await;
            Ok(())
        }
    });
    let c = pool.submit_after([b], {
        let spans = spans.clone();
        async move {
            spans.record("c", Duration::from_millis(10)).await;
            Ok(())
        }
    });

    with_timeout(pool.wait_outcome(c)).await.unwrap();
    with_timeout(pool.wait_outcome(b)).await.unwrap();
    with_timeout(pool.wait_outcome(a)).await.unwrap();

    assert!(spans.end("a") <= spans.start("b"));
    assert!(spans.end("b") <= spans.start("c"));

    driver.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn diamond_joins_both_branches_before_the_sink() {
    init_tracing();

    let pool: Pool<()> = Pool::new(2);
    let driver = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let spans = Spans::default();
    let task = |name: &'static str| {
        let spans = spans.clone();
        async move {
            spans.record(name, Duration::from_millis(50)).await;
            Ok(())
        }
    };

    let a = pool.submit(task("a"));
    let b = pool.submit_after([a], task("b"));
    let c = pool.submit_after([a], task("c"));
    let d = pool.submit_after([b, c], task("d"));

    with_timeout(pool.wait_outcome(d)).await.unwrap();

    assert!(spans.end("a") <= spans.start("b"));
    assert!(spans.end("a") <= spans.start("c"));
    assert!(spans.end("b") <= spans.start("d"));
    assert!(spans.end("c") <= spans.start("d"));
    // Both middle branches fit in the two slots and overlap.
    assert!(spans.start("b").max(spans.start("c")) < spans.end("b").min(spans.end("c")));

    driver.abort();
}
