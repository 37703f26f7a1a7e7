use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cabana_actor::ActorContext;
use futures::FutureExt;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::error::PoolResult;
use crate::id::{IdGenerator, WorkerId};
use crate::pool::actor::PoolActor;
use crate::pool::event::PoolEvent;
use crate::worker::{Worker, WorkerFactory, WorkerHandle, WorkerMessage};

/// Spawns worker agents, terminates them on dismissal, and notifies the
/// coordinator when one exits unexpectedly.
pub(crate) struct WorkerSupervisor<W: Worker> {
    factory: Box<dyn WorkerFactory<Worker = W>>,
    children: HashMap<WorkerId, ChildEntry>,
    worker_id_generator: IdGenerator<WorkerId>,
}

struct ChildEntry {
    /// Cleared before termination so that a dismissal is never observed as
    /// a crash by the coordinator.
    linked: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl<W: Worker> WorkerSupervisor<W> {
    pub fn new(factory: Box<dyn WorkerFactory<Worker = W>>) -> Self {
        Self {
            factory,
            children: HashMap::new(),
            worker_id_generator: IdGenerator::new(),
        }
    }

    /// Spawn a worker agent and watch it for unexpected exit.
    pub fn start_child(&mut self, ctx: &mut ActorContext<PoolActor<W>>) -> PoolResult<WorkerHandle<W>> {
        let id = self.worker_id_generator.next()?;
        let worker = self.factory.create()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let linked = Arc::new(AtomicBool::new(true));
        let watcher = Arc::clone(&linked);
        let events = ctx.handle().sender();
        let abort = ctx.spawn(async move {
            // A panic in the worker's handler is caught here so that it
            // surfaces as an exit notification instead of a lost task.
            let out = AssertUnwindSafe(Self::run_child(worker, rx))
                .catch_unwind()
                .await;
            if out.is_err() {
                warn!("worker {id} panicked");
            }
            if watcher.load(Ordering::Acquire) {
                let _ = events.send(PoolEvent::WorkerExit { worker: id });
            }
            Ok(())
        });
        self.children.insert(id, ChildEntry { linked, abort });
        debug!("started worker {id}");
        Ok(WorkerHandle::new(id, tx))
    }

    async fn run_child(mut worker: W, mut inbox: mpsc::UnboundedReceiver<WorkerMessage<W>>) {
        while let Some(WorkerMessage { request, replier }) = inbox.recv().await {
            let reply = worker.handle(request).await;
            replier.send(reply);
        }
    }

    /// Unlink and terminate a child. No exit notification is produced.
    pub fn terminate_child(&mut self, worker: WorkerId) {
        let Some(entry) = self.children.remove(&worker) else {
            warn!("worker {worker} is not supervised");
            return;
        };
        entry.linked.store(false, Ordering::Release);
        entry.abort.abort();
        debug!("terminated worker {worker}");
    }

    /// Forget a child that has already exited on its own.
    pub fn forget_child(&mut self, worker: WorkerId) {
        self.children.remove(&worker);
    }

    /// Unlink and terminate all children.
    pub fn stop(&mut self) {
        for (_, entry) in self.children.drain() {
            entry.linked.store(false, Ordering::Release);
            entry.abort.abort();
        }
    }
}
