use cabana_actor::{ActorAction, ActorContext};
use log::{debug, warn};
use tokio::sync::oneshot;

use crate::error::PoolResult;
use crate::id::{ClientRef, MonitorToken, WorkerId};
use crate::pool::actor::PoolActor;
use crate::pool::event::RequestPayload;
use crate::pool::state::{Monitor, PoolStatus, Waiter, WorkerRecord};
use crate::worker::{Replier, Worker, WorkerMessage};

impl<W: Worker> PoolActor<W> {
    pub(super) fn handle_request(
        &mut self,
        ctx: &mut ActorContext<Self>,
        payload: RequestPayload<W>,
        client_ref: ClientRef,
        token: MonitorToken,
        block: bool,
    ) -> PoolResult<ActorAction> {
        if let Some(record) = self.state.pop_idle() {
            self.assign(ctx, record, payload, client_ref, token);
        } else if self.state.overflow() < self.options.max_overflow {
            let handle = self.supervisor.start_child(ctx)?;
            self.state.add_overflow();
            self.assign(ctx, WorkerRecord::new(handle), payload, client_ref, token);
        } else if !block {
            payload.reject_full();
        } else {
            self.state.push_waiter(Waiter {
                payload,
                client_ref,
                token,
            });
        }
        Ok(ActorAction::Continue)
    }

    pub(super) fn handle_checkin(
        &mut self,
        ctx: &mut ActorContext<Self>,
        worker: WorkerId,
        client_ref: Option<ClientRef>,
    ) -> PoolResult<ActorAction> {
        match self.state.remove_monitor(worker, client_ref) {
            Some(monitor) => self.reassign(ctx, monitor.record),
            None => debug!("ignoring checkin for worker {worker} without a matching lease"),
        }
        Ok(ActorAction::Continue)
    }

    pub(super) fn handle_cancel(
        &mut self,
        ctx: &mut ActorContext<Self>,
        client_ref: ClientRef,
    ) -> PoolResult<ActorAction> {
        if let Some(monitor) = self.state.remove_monitor_by_client(client_ref) {
            // The worker was assigned before the cancellation arrived;
            // the lease is released as if it had been checked in.
            self.reassign(ctx, monitor.record);
        } else if self.state.remove_waiter_by_client(client_ref).is_none() {
            debug!("cancel for unknown client {client_ref}");
        }
        Ok(ActorAction::Continue)
    }

    pub(super) fn handle_client_down(
        &mut self,
        ctx: &mut ActorContext<Self>,
        token: MonitorToken,
    ) -> PoolResult<ActorAction> {
        if let Some(monitor) = self.state.remove_monitor_by_token(token) {
            warn!("client of worker {} went away", monitor.record.handle.id());
            self.reassign(ctx, monitor.record);
        } else if self.state.remove_waiter_by_token(token).is_some() {
            debug!("waiter went away before a worker was available");
        }
        Ok(ActorAction::Continue)
    }

    pub(super) fn handle_worker_exit(
        &mut self,
        ctx: &mut ActorContext<Self>,
        worker: WorkerId,
    ) -> PoolResult<ActorAction> {
        self.supervisor.forget_child(worker);
        if self.state.remove_monitor(worker, None).is_some() {
            warn!("worker {worker} exited while busy");
            self.replace_crashed(ctx)?;
        } else if self.state.remove_idle(worker).is_some() {
            warn!("worker {worker} exited while idle");
            let handle = self.supervisor.start_child(ctx)?;
            self.state.push_idle_front(WorkerRecord::new(handle));
        } else {
            debug!("ignoring exit notification for unknown worker {worker}");
        }
        Ok(ActorAction::Continue)
    }

    pub(super) fn handle_status(
        &mut self,
        reply: oneshot::Sender<PoolStatus>,
    ) -> PoolResult<ActorAction> {
        let _ = reply.send(self.state.status(self.options.max_overflow));
        Ok(ActorAction::Continue)
    }

    /// Hand a worker to a client: register the monitor, then either reply
    /// with the handle (checkout) or dispatch the request with a replier
    /// that will cast the checkin (work).
    fn assign(
        &mut self,
        ctx: &mut ActorContext<Self>,
        mut record: WorkerRecord<W>,
        payload: RequestPayload<W>,
        client_ref: ClientRef,
        token: MonitorToken,
    ) {
        record.touch();
        let worker = record.handle.clone();
        self.state.add_monitor(Monitor {
            record,
            client_ref,
            token,
        });
        match payload {
            RequestPayload::Checkout { reply } => {
                if reply.send(Ok(worker)).is_err() {
                    // The client went away after being dequeued; its cancel
                    // event will release the lease.
                    debug!("client {client_ref} went away before checkout completed");
                }
            }
            RequestPayload::Work { request, reply } => {
                let replier =
                    Replier::with_checkin(reply, ctx.handle().sender(), worker.id(), client_ref);
                if worker.dispatch(WorkerMessage { request, replier }).is_err() {
                    warn!("worker {} inbox is closed", worker.id());
                }
            }
        }
    }

    /// Decide the fate of a freed worker: hand it to the next waiter,
    /// dismiss it if overflow is active, or return it to the idle queue.
    fn reassign(&mut self, ctx: &mut ActorContext<Self>, mut record: WorkerRecord<W>) {
        if let Some(waiter) = self.state.pop_waiter() {
            self.assign(ctx, record, waiter.payload, waiter.client_ref, waiter.token);
        } else if self.state.overflow() > 0 {
            debug!("dismissing overflow worker {}", record.handle.id());
            self.supervisor.terminate_child(record.handle.id());
            self.state.remove_overflow();
        } else {
            record.touch();
            self.state.push_idle(record, self.options.strategy);
        }
    }

    /// Mirror of [`Self::reassign`] for a dead busy worker: a fresh worker
    /// is spawned where reassignment would have reused the old one, and an
    /// overflow slot is released without replacement.
    fn replace_crashed(&mut self, ctx: &mut ActorContext<Self>) -> PoolResult<()> {
        if let Some(waiter) = self.state.pop_waiter() {
            let handle = self.supervisor.start_child(ctx)?;
            self.assign(
                ctx,
                WorkerRecord::new(handle),
                waiter.payload,
                waiter.client_ref,
                waiter.token,
            );
        } else if self.state.overflow() > 0 {
            self.state.remove_overflow();
        } else {
            let handle = self.supervisor.start_child(ctx)?;
            self.state.push_idle_back(WorkerRecord::new(handle));
        }
        Ok(())
    }
}
