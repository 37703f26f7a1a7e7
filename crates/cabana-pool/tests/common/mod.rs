#![allow(dead_code)]
#![allow(clippy::panic)]

use std::time::Duration;

use cabana_pool::{PoolOptions, PoolResult, Strategy, Worker, WorkerFactory};

pub enum EchoRequest {
    Echo(String),
    Sleep { duration: Duration, value: String },
    Boom,
}

pub struct EchoWorker;

#[async_trait::async_trait]
impl Worker for EchoWorker {
    type Request = EchoRequest;
    type Reply = String;

    async fn handle(&mut self, request: EchoRequest) -> String {
        match request {
            EchoRequest::Echo(value) => value.to_uppercase(),
            EchoRequest::Sleep { duration, value } => {
                tokio::time::sleep(duration).await;
                value
            }
            EchoRequest::Boom => panic!("worker crashed"),
        }
    }
}

pub struct EchoWorkerFactory;

impl WorkerFactory for EchoWorkerFactory {
    type Worker = EchoWorker;

    fn create(&self) -> PoolResult<EchoWorker> {
        Ok(EchoWorker)
    }
}

pub fn options(size: usize, max_overflow: usize, strategy: Strategy) -> PoolOptions {
    PoolOptions {
        size,
        max_overflow,
        strategy,
        name: None,
        checkout_timeout: Duration::from_secs(5),
    }
}

/// Give the coordinator a moment to drain its inbox.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
