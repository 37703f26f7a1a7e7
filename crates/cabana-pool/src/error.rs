use thiserror::Error;

use cabana_common::error::CommonError;

pub type PoolResult<T> = Result<T, PoolError>;

#[derive(Debug, Error)]
pub enum PoolError {
    /// No idle worker or overflow slot was available and the caller declined
    /// to wait. This is a capacity signal, not a fault.
    #[error("pool is full")]
    Full,
    #[error("timed out waiting for the pool")]
    Timeout,
    #[error("pool has stopped")]
    PoolStopped,
    #[error("worker is gone")]
    WorkerGone,
    #[error("failed to spawn worker: {0}")]
    SpawnError(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<CommonError> for PoolError {
    fn from(error: CommonError) -> Self {
        match error {
            CommonError::InvalidArgument(x) => PoolError::InvalidArgument(x),
            CommonError::InternalError(x) => PoolError::InternalError(x),
        }
    }
}
