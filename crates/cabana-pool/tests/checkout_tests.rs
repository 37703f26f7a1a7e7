#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::time::Duration;

use cabana_pool::{Pool, PoolError, PoolStateName, Strategy, WorkerId};

use crate::common::{options, settle, EchoRequest, EchoWorkerFactory};

#[tokio::test]
async fn test_checkout_and_checkin() {
    let pool = Pool::start(EchoWorkerFactory, options(2, 0, Strategy::Lifo));
    settle().await;

    let worker = pool.checkout().await.unwrap();
    let reply = worker.call(EchoRequest::Echo("hello".to_string())).await;
    assert_eq!(reply.unwrap(), "HELLO");
    worker.checkin();
    settle().await;

    let status = pool.status().await.unwrap();
    assert_eq!(status.idle, 2);
    assert_eq!(status.busy, 0);
    assert_eq!(status.overflow, 0);
    assert_eq!(status.state, PoolStateName::Ready);
    pool.stop().await;
}

#[tokio::test]
async fn test_checkout_is_lifo_regardless_of_removal() {
    let pool = Pool::start(EchoWorkerFactory, options(2, 0, Strategy::Lifo));
    settle().await;

    let first = pool.checkout().await.unwrap();
    let id = first.id();
    first.checkin();
    settle().await;

    // Under LIFO the most recently checked-in worker is handed out next.
    let second = pool.checkout().await.unwrap();
    assert_eq!(second.id(), id);
    second.checkin();
    pool.stop().await;
}

#[tokio::test]
async fn test_fifo_strategy_rotates_workers() {
    let pool = Pool::start(EchoWorkerFactory, options(3, 0, Strategy::Fifo));
    settle().await;

    let a = pool.checkout().await.unwrap();
    let b = pool.checkout().await.unwrap();
    let (id_a, id_b) = (a.id(), b.id());
    a.checkin();
    let c = pool.checkout().await.unwrap();
    let id_c = c.id();
    assert_ne!(id_c, id_a);
    assert_ne!(id_c, id_b);
    b.checkin();
    c.checkin();
    settle().await;

    // The idle queue has rotated back to its original order.
    let first = pool.checkout().await.unwrap();
    assert_eq!(first.id(), id_a);
    let second = pool.checkout().await.unwrap();
    assert_eq!(second.id(), id_b);
    let third = pool.checkout().await.unwrap();
    assert_eq!(third.id(), id_c);
    pool.stop().await;
}

#[tokio::test]
async fn test_overflow_admission_and_dismissal() {
    let pool = Pool::start(EchoWorkerFactory, options(2, 2, Strategy::Lifo));
    settle().await;

    let a = pool.checkout().await.unwrap();
    let b = pool.checkout().await.unwrap();
    let c = pool.checkout().await.unwrap();
    settle().await;

    let status = pool.status().await.unwrap();
    assert_eq!(status.idle, 0);
    assert_eq!(status.busy, 3);
    assert_eq!(status.overflow, 1);
    assert_eq!(status.state, PoolStateName::Overflow);

    // The overflow worker is dismissed on checkin rather than going idle.
    c.checkin();
    settle().await;
    let status = pool.status().await.unwrap();
    assert_eq!(status.idle, 0);
    assert_eq!(status.busy, 2);
    assert_eq!(status.overflow, 0);

    a.checkin();
    b.checkin();
    settle().await;
    let status = pool.status().await.unwrap();
    assert_eq!(status.idle, 2);
    assert_eq!(status.busy, 0);
    assert_eq!(status.overflow, 0);
    assert_eq!(status.state, PoolStateName::Ready);
    pool.stop().await;
}

#[tokio::test]
async fn test_non_blocking_checkout_when_exhausted() {
    let pool = Pool::start(EchoWorkerFactory, options(1, 0, Strategy::Lifo));
    settle().await;

    let held = pool.checkout().await.unwrap();
    let out = pool.checkout_with(false, Duration::from_secs(1)).await;
    assert!(matches!(out, Err(PoolError::Full)));

    let status = pool.status().await.unwrap();
    assert_eq!(status.state, PoolStateName::Full);
    held.checkin();
    pool.stop().await;
}

#[tokio::test]
async fn test_blocking_checkout_times_out_and_removes_waiter() {
    let pool = Pool::start(EchoWorkerFactory, options(1, 0, Strategy::Lifo));
    settle().await;

    let held = pool.checkout().await.unwrap();
    let out = pool.checkout_with(true, Duration::from_millis(100)).await;
    assert!(matches!(out, Err(PoolError::Timeout)));
    settle().await;

    // The timed-out waiter must not receive the worker on checkin.
    held.checkin();
    settle().await;
    let status = pool.status().await.unwrap();
    assert_eq!(status.idle, 1);
    assert_eq!(status.busy, 0);
    pool.stop().await;
}

#[tokio::test]
async fn test_blocked_checkout_resumes_on_checkin() {
    let pool = Pool::start(EchoWorkerFactory, options(1, 0, Strategy::Lifo));
    settle().await;

    let held = pool.checkout().await.unwrap();
    let id = held.id();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move {
            pool.checkout_with(true, Duration::from_secs(5))
                .await
                .map(|worker| {
                    let id = worker.id();
                    worker.checkin();
                    id
                })
        })
    };
    settle().await;

    held.checkin();
    let out = waiter.await.unwrap().unwrap();
    assert_eq!(out, id);
    pool.stop().await;
}

#[tokio::test]
async fn test_checkin_unknown_worker_is_noop() {
    let pool = Pool::start(EchoWorkerFactory, options(2, 0, Strategy::Lifo));
    settle().await;

    pool.checkin(WorkerId::from(42));
    settle().await;
    let status = pool.status().await.unwrap();
    assert_eq!(status.idle, 2);
    assert_eq!(status.busy, 0);

    // A second checkin of an already idle worker is also a no-op.
    let worker = pool.checkout().await.unwrap();
    let id = worker.id();
    worker.checkin();
    pool.checkin(id);
    settle().await;
    let status = pool.status().await.unwrap();
    assert_eq!(status.idle, 2);
    assert_eq!(status.busy, 0);
    pool.stop().await;
}

#[tokio::test]
async fn test_dropping_pooled_worker_checks_in() {
    let pool = Pool::start(EchoWorkerFactory, options(1, 0, Strategy::Lifo));
    settle().await;

    {
        let _worker = pool.checkout().await.unwrap();
        let status = pool.status().await.unwrap();
        assert_eq!(status.busy, 1);
    }
    settle().await;
    let status = pool.status().await.unwrap();
    assert_eq!(status.idle, 1);
    assert_eq!(status.busy, 0);
    pool.stop().await;
}

#[tokio::test]
async fn test_checkout_checkin_loop_preserves_state() {
    let pool = Pool::start(EchoWorkerFactory, options(3, 5, Strategy::Lifo));
    settle().await;

    let mut first_id = None;
    for _ in 0..10 {
        let worker = pool.checkout().await.unwrap();
        let id = first_id.get_or_insert(worker.id());
        assert_eq!(worker.id(), *id);
        worker.checkin();
        settle().await;
    }
    let status = pool.status().await.unwrap();
    assert_eq!(status.idle, 3);
    assert_eq!(status.busy, 0);
    assert_eq!(status.overflow, 0);
    pool.stop().await;
}

#[tokio::test]
async fn test_abandoned_waiter_is_cleaned_up() {
    let pool = Pool::start(EchoWorkerFactory, options(1, 0, Strategy::Lifo));
    settle().await;

    let held = pool.checkout().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let _ = pool.checkout_with(true, Duration::from_secs(60)).await;
        })
    };
    settle().await;
    waiter.abort();
    settle().await;

    held.checkin();
    settle().await;
    let status = pool.status().await.unwrap();
    assert_eq!(status.idle, 1);
    assert_eq!(status.busy, 0);
    pool.stop().await;
}
