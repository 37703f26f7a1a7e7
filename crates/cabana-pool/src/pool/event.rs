use tokio::sync::oneshot;

use crate::error::{PoolError, PoolResult};
use crate::id::{ClientRef, MonitorToken, WorkerId};
use crate::pool::state::PoolStatus;
use crate::worker::{Worker, WorkerHandle};

pub(crate) enum PoolEvent<W: Worker> {
    /// A checkout or work submission from a client.
    Request {
        payload: RequestPayload<W>,
        client_ref: ClientRef,
        token: MonitorToken,
        block: bool,
    },
    /// A worker is returned to the pool. `client_ref` is present when the
    /// checkin is cast on behalf of a specific lease, and absent for the
    /// fire-and-forget client API.
    Checkin {
        worker: WorkerId,
        client_ref: Option<ClientRef>,
    },
    /// A client abandoned its call (e.g. on timeout).
    Cancel { client_ref: ClientRef },
    /// A client went away while waiting or while holding a worker.
    ClientDown { token: MonitorToken },
    /// A worker exited without being dismissed.
    WorkerExit { worker: WorkerId },
    Status { reply: oneshot::Sender<PoolStatus> },
    Stop,
}

pub(crate) enum RequestPayload<W: Worker> {
    Checkout {
        reply: oneshot::Sender<PoolResult<WorkerHandle<W>>>,
    },
    Work {
        request: W::Request,
        reply: oneshot::Sender<PoolResult<W::Reply>>,
    },
}

impl<W: Worker> RequestPayload<W> {
    /// Reply immediately with the capacity sentinel.
    pub fn reject_full(self) {
        match self {
            RequestPayload::Checkout { reply } => {
                let _ = reply.send(Err(PoolError::Full));
            }
            RequestPayload::Work { reply, .. } => {
                let _ = reply.send(Err(PoolError::Full));
            }
        }
    }
}
