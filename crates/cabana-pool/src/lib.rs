pub mod error;
mod id;
mod pool;
mod worker;

pub use error::{PoolError, PoolResult};
pub use id::WorkerId;
pub use pool::{Pool, PoolOptions, PoolStateName, PoolStatus, PooledWorker, Strategy};
pub use worker::{Worker, WorkerFactory, WorkerHandle};
