use std::sync::Arc;

use dagpool::{Pool, PoolError};
use dagpool_test_utils::{init_tracing, wait_until, with_timeout};
use tokio::sync::Notify;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn body_failure_surfaces_as_an_error_outcome() {
    init_tracing();

    let pool: Pool<u32> = Pool::new(1);
    let driver = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let h = pool.submit(async { Err(anyhow::anyhow!("boom")) });
    let err = with_timeout(pool.wait_outcome(h)).await.unwrap_err();
    match err {
        PoolError::Failed(e) => assert_eq!(e.to_string(), "boom"),
        other => panic!("expected a body failure, got: {other}"),
    }

    // One body failing never takes the pool down.
    let ok = pool.submit(async { Ok(5) });
    assert_eq!(with_timeout(pool.wait_outcome(ok)).await.unwrap(), 5);

    driver.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn an_outcome_is_consumed_exactly_once() {
    init_tracing();

    let pool: Pool<u32> = Pool::new(1);
    let driver = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let h = pool.submit(async { Ok(3) });
    assert_eq!(with_timeout(pool.wait_outcome(h)).await.unwrap(), 3);

    // Second observation: the pool no longer knows the handle.
    let err = with_timeout(pool.wait_outcome(h)).await.unwrap_err();
    assert!(matches!(err, PoolError::UnknownTask(handle) if handle == h));
    let err = pool.poll_outcome(h).unwrap().unwrap_err();
    assert!(matches!(err, PoolError::UnknownTask(handle) if handle == h));

    driver.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn polling_an_unstarted_task_returns_none() {
    init_tracing();

    // No driver: the submission stays queued indefinitely.
    let pool: Pool<u32> = Pool::new(1);
    let h = pool.submit(async { Ok(1) });

    assert!(pool.poll_outcome(h).is_none());
    assert!(!pool.is_idle());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_dependent_of_a_pruned_parent_is_unconstrained() {
    init_tracing();

    let pool: Pool<u32> = Pool::new(1);
    let driver = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let parent = pool.submit(async { Ok(1) });
    assert_eq!(with_timeout(pool.wait_outcome(parent)).await.unwrap(), 1);

    // The parent finished without dependents and left the graph entirely;
    // depending on it now must not block the child.
    let child = pool.submit_after([parent], async { Ok(2) });
    assert_eq!(with_timeout(pool.wait_outcome(child)).await.unwrap(), 2);

    driver.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_late_edge_to_a_finished_retained_parent_is_already_satisfied() {
    init_tracing();

    let pool: Pool<u32> = Pool::new(2);
    let driver = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let release = Arc::new(Notify::new());

    // `blocker` keeps `parent` retained in the graph after it finishes.
    let parent = pool.submit(async { Ok(1) });
    let blocker = pool.submit_after([parent], {
        let release = Arc::clone(&release);
        async move {
            release.notified().await;
            Ok(2)
        }
    });

    assert_eq!(with_timeout(pool.wait_outcome(parent)).await.unwrap(), 1);
    wait_until("the blocker to occupy a slot", || pool.in_flight() == 1).await;

    // The parent is finished but still in the graph; a fresh edge from it
    // must not leave the child waiting for a completion that already went by.
    let late = pool.submit(async { Ok(3) });
    pool.add_dependency(parent, late);
    assert_eq!(with_timeout(pool.wait_outcome(late)).await.unwrap(), 3);

    release.notify_one();
    assert_eq!(with_timeout(pool.wait_outcome(blocker)).await.unwrap(), 2);
    wait_until("the pool to drain", || pool.is_idle()).await;

    driver.abort();
}
