pub(crate) mod actor;
pub(crate) mod event;
mod options;
pub(crate) mod state;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cabana_actor::ActorHandle;
use cabana_common::config::AppConfig;
use log::debug;
use tokio::sync::{mpsc, oneshot};
use tokio::time;

pub use options::{PoolOptions, Strategy};
pub use state::{PoolStateName, PoolStatus};

use crate::error::{PoolError, PoolResult};
use crate::id::{ClientRef, MonitorToken, RefGenerator, WorkerId};
use crate::pool::actor::{PoolActor, PoolActorOptions};
use crate::pool::event::{PoolEvent, RequestPayload};
use crate::worker::{Worker, WorkerFactory, WorkerHandle};

/// A bounded pool of long-lived worker agents.
///
/// All clones of a pool talk to the same coordinator; the pool can be
/// shared freely across tasks. Blocking calls wait on their own reply
/// channel with a timeout, and the coordinator itself never waits on a
/// client.
pub struct Pool<W: Worker> {
    handle: ActorHandle<PoolActor<W>>,
    refs: Arc<RefGenerator>,
    checkout_timeout: Duration,
}

impl<W: Worker> Clone for Pool<W> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            refs: Arc::clone(&self.refs),
            checkout_timeout: self.checkout_timeout,
        }
    }
}

impl<W: Worker> Pool<W> {
    /// Start a pool with `options.size` workers built by the factory.
    pub fn start(factory: impl WorkerFactory<Worker = W>, options: PoolOptions) -> Self {
        let checkout_timeout = options.checkout_timeout;
        let handle = ActorHandle::new(PoolActorOptions {
            factory: Box::new(factory),
            pool: options,
        });
        Self {
            handle,
            refs: Arc::new(RefGenerator::new()),
            checkout_timeout,
        }
    }

    pub fn from_config(factory: impl WorkerFactory<Worker = W>, config: &AppConfig) -> Self {
        Self::start(factory, PoolOptions::from(config))
    }

    /// Check out a worker, blocking up to the configured timeout.
    pub async fn checkout(&self) -> PoolResult<PooledWorker<W>> {
        self.checkout_with(true, self.checkout_timeout).await
    }

    /// Check out a worker.
    ///
    /// With `block` set to false the call fails immediately with
    /// [`PoolError::Full`] when no capacity exists; otherwise the caller is
    /// queued FIFO until a worker frees up or the timeout elapses.
    pub async fn checkout_with(&self, block: bool, timeout: Duration) -> PoolResult<PooledWorker<W>> {
        let client_ref = self.refs.client_ref();
        let token = self.refs.monitor_token();
        let (tx, rx) = oneshot::channel();
        let mut liveness = LivenessGuard::new(self.handle.sender(), token);
        self.send(PoolEvent::Request {
            payload: RequestPayload::Checkout { reply: tx },
            client_ref,
            token,
            block,
        })?;
        match time::timeout(timeout, rx).await {
            Ok(Ok(out)) => {
                liveness.disarm();
                let worker = out?;
                Ok(PooledWorker::new(worker, self.handle.sender(), client_ref))
            }
            Ok(Err(_)) => {
                liveness.disarm();
                Err(PoolError::PoolStopped)
            }
            Err(_) => {
                liveness.disarm();
                self.cancel(client_ref);
                Err(PoolError::Timeout)
            }
        }
    }

    /// Submit a request and receive the worker's reply, blocking up to the
    /// configured timeout. The checkin is performed automatically when the
    /// worker completes the request.
    pub async fn work(&self, request: W::Request) -> PoolResult<W::Reply> {
        self.work_with(request, true, self.checkout_timeout).await
    }

    pub async fn work_with(
        &self,
        request: W::Request,
        block: bool,
        timeout: Duration,
    ) -> PoolResult<W::Reply> {
        let client_ref = self.refs.client_ref();
        let token = self.refs.monitor_token();
        let (tx, rx) = oneshot::channel();
        let mut liveness = LivenessGuard::new(self.handle.sender(), token);
        self.send(PoolEvent::Request {
            payload: RequestPayload::Work { request, reply: tx },
            client_ref,
            token,
            block,
        })?;
        match time::timeout(timeout, rx).await {
            Ok(Ok(out)) => {
                liveness.disarm();
                out
            }
            Ok(Err(_)) => {
                // The reply channel closed without a reply: the worker died
                // while serving the request.
                liveness.disarm();
                Err(PoolError::WorkerGone)
            }
            Err(_) => {
                liveness.disarm();
                self.cancel(client_ref);
                Err(PoolError::Timeout)
            }
        }
    }

    /// Return a worker to the pool. Fire-and-forget: a checkin for an
    /// unknown or already idle worker is a no-op.
    pub fn checkin(&self, worker: WorkerId) {
        let _ = self.handle.send(PoolEvent::Checkin {
            worker,
            client_ref: None,
        });
    }

    /// Check out a worker, run `f` on it, and check it back in on all exit
    /// paths, including a panicking `f`. Errors from `f` propagate after
    /// the checkin.
    pub async fn transaction<T, Fut>(
        &self,
        f: impl FnOnce(WorkerHandle<W>) -> Fut,
    ) -> PoolResult<T>
    where
        Fut: Future<Output = PoolResult<T>>,
    {
        self.transaction_with(f, self.checkout_timeout).await
    }

    pub async fn transaction_with<T, Fut>(
        &self,
        f: impl FnOnce(WorkerHandle<W>) -> Fut,
        timeout: Duration,
    ) -> PoolResult<T>
    where
        Fut: Future<Output = PoolResult<T>>,
    {
        let worker = self.checkout_with(true, timeout).await?;
        let out = f(worker.handle().clone()).await;
        worker.checkin();
        out
    }

    pub async fn status(&self) -> PoolResult<PoolStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(PoolEvent::Status { reply: tx })?;
        rx.await.map_err(|_| PoolError::PoolStopped)
    }

    /// Gracefully stop the pool and wait until the coordinator has
    /// terminated all workers. Pending waiters observe
    /// [`PoolError::PoolStopped`].
    pub async fn stop(&self) {
        let _ = self.handle.send(PoolEvent::Stop);
        self.handle.clone().wait_for_stop().await;
    }

    fn send(&self, event: PoolEvent<W>) -> PoolResult<()> {
        self.handle.send(event).map_err(|_| PoolError::PoolStopped)
    }

    fn cancel(&self, client_ref: ClientRef) {
        if self.handle.send(PoolEvent::Cancel { client_ref }).is_err() {
            debug!("pool stopped before the cancellation was delivered");
        }
    }
}

/// A worker checked out of the pool.
///
/// The guard owns the lease for the checkout window: dropping it without an
/// explicit [`PooledWorker::checkin`] returns the worker to the pool, so a
/// client that dies while holding a worker cannot leak it.
pub struct PooledWorker<W: Worker> {
    worker: WorkerHandle<W>,
    events: mpsc::UnboundedSender<PoolEvent<W>>,
    client_ref: ClientRef,
    returned: bool,
}

impl<W: Worker> PooledWorker<W> {
    fn new(
        worker: WorkerHandle<W>,
        events: mpsc::UnboundedSender<PoolEvent<W>>,
        client_ref: ClientRef,
    ) -> Self {
        Self {
            worker,
            events,
            client_ref,
            returned: false,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.worker.id()
    }

    pub fn handle(&self) -> &WorkerHandle<W> {
        &self.worker
    }

    /// Perform one request/reply round trip on the held worker.
    pub async fn call(&self, request: W::Request) -> PoolResult<W::Reply> {
        self.worker.call(request).await
    }

    /// Return the worker to the pool.
    pub fn checkin(mut self) {
        self.send_checkin();
    }

    fn send_checkin(&mut self) {
        if self.returned {
            return;
        }
        self.returned = true;
        let _ = self.events.send(PoolEvent::Checkin {
            worker: self.worker.id(),
            client_ref: Some(self.client_ref),
        });
    }
}

impl<W: Worker> Drop for PooledWorker<W> {
    fn drop(&mut self) {
        self.send_checkin();
    }
}

/// Fires `ClientDown` if a blocking call is dropped before it completes,
/// so an abandoned waiter is cleaned up even when no timeout ever elapses.
struct LivenessGuard<W: Worker> {
    events: mpsc::UnboundedSender<PoolEvent<W>>,
    token: MonitorToken,
    armed: bool,
}

impl<W: Worker> LivenessGuard<W> {
    fn new(events: mpsc::UnboundedSender<PoolEvent<W>>, token: MonitorToken) -> Self {
        Self {
            events,
            token,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<W: Worker> Drop for LivenessGuard<W> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.events.send(PoolEvent::ClientDown { token: self.token });
        }
    }
}
