#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::time::Duration;

use cabana_common::config::AppConfig;
use cabana_pool::{Pool, PoolError, PoolResult, Strategy, WorkerFactory};

use crate::common::{options, settle, EchoRequest, EchoWorker, EchoWorkerFactory};

struct FailingFactory;

impl WorkerFactory for FailingFactory {
    type Worker = EchoWorker;

    fn create(&self) -> PoolResult<EchoWorker> {
        Err(PoolError::SpawnError("no workers today".to_string()))
    }
}

#[tokio::test]
async fn test_stop_terminates_the_pool() {
    let pool = Pool::start(EchoWorkerFactory, options(2, 0, Strategy::Lifo));
    settle().await;

    pool.stop().await;
    let out = pool.checkout().await;
    assert!(matches!(out, Err(PoolError::PoolStopped)));
    let out = pool.status().await;
    assert!(matches!(out, Err(PoolError::PoolStopped)));

    // Stopping again is safe.
    pool.stop().await;
}

#[tokio::test]
async fn test_stop_wakes_pending_waiters() {
    let pool = Pool::start(EchoWorkerFactory, options(1, 0, Strategy::Lifo));
    settle().await;

    let held = pool.checkout().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.checkout_with(true, Duration::from_secs(60)).await })
    };
    settle().await;

    pool.stop().await;
    let out = waiter.await.unwrap();
    assert!(matches!(out, Err(PoolError::PoolStopped)));
    drop(held);
}

#[tokio::test]
async fn test_spawn_failure_is_fatal() {
    let pool = Pool::start(FailingFactory, options(2, 0, Strategy::Lifo));
    settle().await;

    let out = pool.checkout().await;
    assert!(matches!(out, Err(PoolError::PoolStopped)));
}

#[tokio::test]
async fn test_pool_from_config_defaults() {
    let config = AppConfig::load().unwrap();
    let pool = Pool::from_config(EchoWorkerFactory, &config);
    settle().await;

    let status = pool.status().await.unwrap();
    assert_eq!(status.idle, 5);
    assert_eq!(status.busy, 0);
    assert_eq!(status.overflow, 0);

    let reply = pool.work(EchoRequest::Echo("configured".to_string())).await;
    assert_eq!(reply.unwrap(), "CONFIGURED");
    pool.stop().await;
}
