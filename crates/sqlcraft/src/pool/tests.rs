use super::*;
use crate::driver::mock::{MockDriver, MockState};
use std::sync::atomic::Ordering;

async fn pool(min_idle: usize, max_size: usize) -> (Pool, Arc<MockState>) {
    let driver = MockDriver::new();
    let state = Arc::clone(&driver.state);
    let config = PoolConfig::new()
        .with_min_idle(min_idle)
        .with_max_size(max_size);
    (Pool::new(driver, config).await.unwrap(), state)
}

#[tokio::test]
async fn opens_min_idle_up_front() {
    let (pool, state) = pool(2, 4).await;
    assert_eq!(state.connects(), 2);
    assert_eq!(
        pool.status(),
        PoolStatus {
            idle: 2,
            in_use: 0,
            open: 2,
            max_size: 4
        }
    );
}

#[tokio::test]
async fn rejects_bad_sizing() {
    let err = Pool::new(MockDriver::new(), PoolConfig::new().with_max_size(0))
        .await
        .unwrap_err();
    assert!(err.is_config());

    let config = PoolConfig::new().with_min_idle(3).with_max_size(2);
    let err = Pool::new(MockDriver::new(), config).await.unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn reuses_returned_connections() {
    let (pool, state) = pool(0, 2).await;
    {
        let mut conn = pool.get().await.unwrap();
        conn.execute("SELECT 1", &[]).await.unwrap();
        assert_eq!(pool.status().in_use, 1);
    }
    let _conn = pool.get().await.unwrap();
    assert_eq!(state.connects(), 1);
    assert_eq!(state.statements().len(), 1);
}

#[tokio::test]
async fn third_checkout_waits_for_a_release() {
    let (pool, state) = pool(2, 2).await;
    let first = pool.get().await.unwrap();
    let _second = pool.get().await.unwrap();

    let waiting = pool.clone();
    let third = tokio::spawn(async move {
        let _conn = waiting.get().await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!third.is_finished());

    drop(first);
    third.await.unwrap();
    assert_eq!(state.connects(), 2);
    assert_eq!(pool.status().open, 2);
}

#[tokio::test]
async fn checkout_timeout() {
    let driver = MockDriver::new();
    let config = PoolConfig::new()
        .with_min_idle(1)
        .with_max_size(1)
        .with_checkout_timeout(Duration::from_millis(20));
    let pool = Pool::new(driver, config).await.unwrap();

    let _held = pool.get().await.unwrap();
    let err = pool.get().await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn closed_pool_rejects_checkouts() {
    let (pool, _state) = pool(1, 2).await;
    let held = pool.get().await.unwrap();
    pool.close();

    assert!(pool.is_closed());
    assert!(matches!(pool.get().await, Err(DbError::Pool(_))));

    drop(held);
    assert_eq!(pool.status().open, 0);
    assert_eq!(pool.status().idle, 0);
}

#[tokio::test]
async fn close_wakes_waiters() {
    let (pool, _state) = pool(1, 1).await;
    let _held = pool.get().await.unwrap();

    let waiting = pool.clone();
    let waiter = tokio::spawn(async move { waiting.get().await.map(|_| ()) });
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.close();
    assert!(matches!(waiter.await.unwrap(), Err(DbError::Pool(_))));
}

#[tokio::test]
async fn broken_connections_are_discarded() {
    let driver = MockDriver::new();
    let state = Arc::clone(&driver.state);
    state.broken.store(true, Ordering::SeqCst);
    let config = PoolConfig::new().with_min_idle(1).with_max_size(1);
    let pool = Pool::new(driver, config).await.unwrap();

    // The idle connection is broken, so checkout opens a fresh one.
    let conn = pool.get().await.unwrap();
    assert_eq!(state.connects(), 2);
    assert_eq!(pool.status().open, 1);

    drop(conn);
    assert_eq!(pool.status().open, 0);
    assert_eq!(pool.status().idle, 0);
}

#[tokio::test]
async fn failed_connect_releases_its_slot() {
    let (pool, state) = pool(0, 1).await;
    state.fail_connect.store(true, Ordering::SeqCst);
    let err = pool.get().await.unwrap_err();
    assert!(matches!(err, DbError::Connection(_)));
    assert_eq!(pool.status().open, 0);

    state.fail_connect.store(false, Ordering::SeqCst);
    let _conn = pool.get().await.unwrap();
    assert_eq!(pool.status().open, 1);
}

#[tokio::test]
async fn cancelled_connect_releases_its_slot() {
    let (pool, state) = pool(0, 2).await;
    state.hang_connect.store(true, Ordering::SeqCst);

    let attempt = tokio::time::timeout(Duration::from_millis(20), pool.get()).await;
    assert!(attempt.is_err());
    assert_eq!(
        pool.status(),
        PoolStatus {
            idle: 0,
            in_use: 0,
            open: 0,
            max_size: 2
        }
    );

    state.hang_connect.store(false, Ordering::SeqCst);
    let _conn = pool.get().await.unwrap();
    assert_eq!(pool.status().open, 1);
}

#[tokio::test]
async fn failed_statement_returns_the_connection() {
    let (pool, state) = pool(1, 1).await;
    state.fail_execute.store(true, Ordering::SeqCst);
    {
        let mut conn = pool.get().await.unwrap();
        let err = conn.execute("DELETE FROM Track", &[]).await.unwrap_err();
        assert!(matches!(err, DbError::Driver(_)));
    }
    assert_eq!(pool.status().idle, 1);
    assert_eq!(pool.status().in_use, 0);
    assert_eq!(state.connects(), 1);
}
