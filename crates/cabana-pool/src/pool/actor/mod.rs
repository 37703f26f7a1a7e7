mod core;
mod handler;

use crate::pool::options::PoolOptions;
use crate::pool::state::PoolState;
use crate::worker::{Worker, WorkerFactory, WorkerSupervisor};

/// The coordinator: a single-threaded actor that owns the idle queue, the
/// monitor table, and the waiter queue, and processes one event at a time.
pub(crate) struct PoolActor<W: Worker> {
    options: PoolOptions,
    supervisor: WorkerSupervisor<W>,
    state: PoolState<W>,
}

pub(crate) struct PoolActorOptions<W: Worker> {
    pub factory: Box<dyn WorkerFactory<Worker = W>>,
    pub pool: PoolOptions,
}
