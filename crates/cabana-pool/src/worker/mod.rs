mod supervisor;

pub(crate) use supervisor::WorkerSupervisor;

use log::debug;
use tokio::sync::{mpsc, oneshot};

use crate::error::{PoolError, PoolResult};
use crate::id::{ClientRef, WorkerId};
use crate::pool::event::PoolEvent;

/// A long-lived agent that receives requests and produces replies.
///
/// Each worker runs its own event loop on a dedicated task and drains its
/// inbox one request at a time, so implementations can hold mutable state
/// (connections, caches, session handles) without synchronization.
#[async_trait::async_trait]
pub trait Worker: Send + 'static {
    type Request: Send + 'static;
    type Reply: Send + 'static;

    async fn handle(&mut self, request: Self::Request) -> Self::Reply;
}

/// Builds worker instances on demand.
///
/// The factory is called from inside the coordinator event loop, so it must
/// return quickly; slow connection setup belongs in the worker's own
/// `handle` path or behind a lazy initializer.
pub trait WorkerFactory: Send + 'static {
    type Worker: Worker;

    fn create(&self) -> PoolResult<Self::Worker>;
}

/// A clonable handle to a worker's inbox.
///
/// The handle stays valid for the duration of a checkout; after checkin the
/// worker may be serving another client or may have been dismissed, and
/// calls fail with [`PoolError::WorkerGone`].
pub struct WorkerHandle<W: Worker> {
    id: WorkerId,
    sender: mpsc::UnboundedSender<WorkerMessage<W>>,
}

impl<W: Worker> Clone for WorkerHandle<W> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            sender: self.sender.clone(),
        }
    }
}

impl<W: Worker> std::fmt::Debug for WorkerHandle<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle").field("id", &self.id).finish()
    }
}

impl<W: Worker> WorkerHandle<W> {
    pub(crate) fn new(id: WorkerId, sender: mpsc::UnboundedSender<WorkerMessage<W>>) -> Self {
        Self { id, sender }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Perform one request/reply round trip on the worker.
    pub async fn call(&self, request: W::Request) -> PoolResult<W::Reply> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(WorkerMessage {
            request,
            replier: Replier::direct(tx),
        })?;
        rx.await.map_err(|_| PoolError::WorkerGone)?
    }

    pub(crate) fn dispatch(&self, message: WorkerMessage<W>) -> PoolResult<()> {
        self.sender
            .send(message)
            .map_err(|_| PoolError::WorkerGone)
    }
}

pub(crate) struct WorkerMessage<W: Worker> {
    pub request: W::Request,
    pub replier: Replier<W>,
}

/// Delivers a worker's reply to exactly one caller, at most once.
///
/// On the work path the replier also casts the checkin back to the
/// coordinator, so exactly one checkin follows each dispatched request.
pub(crate) struct Replier<W: Worker> {
    reply: oneshot::Sender<PoolResult<W::Reply>>,
    checkin: Option<CheckinCast<W>>,
}

/// The checkin cast is tagged with the lease it belongs to, so a checkin
/// arriving after the lease was already released (e.g. the caller canceled
/// and the worker was reassigned) is recognized as stale and ignored.
struct CheckinCast<W: Worker> {
    events: mpsc::UnboundedSender<PoolEvent<W>>,
    worker: WorkerId,
    client_ref: ClientRef,
}

impl<W: Worker> Replier<W> {
    pub fn direct(reply: oneshot::Sender<PoolResult<W::Reply>>) -> Self {
        Self {
            reply,
            checkin: None,
        }
    }

    pub fn with_checkin(
        reply: oneshot::Sender<PoolResult<W::Reply>>,
        events: mpsc::UnboundedSender<PoolEvent<W>>,
        worker: WorkerId,
        client_ref: ClientRef,
    ) -> Self {
        Self {
            reply,
            checkin: Some(CheckinCast {
                events,
                worker,
                client_ref,
            }),
        }
    }

    pub fn send(self, reply: W::Reply) {
        if self.reply.send(Ok(reply)).is_err() {
            debug!("caller went away before the reply was delivered");
        }
        if let Some(CheckinCast {
            events,
            worker,
            client_ref,
        }) = self.checkin
        {
            let _ = events.send(PoolEvent::Checkin {
                worker,
                client_ref: Some(client_ref),
            });
        }
    }
}
