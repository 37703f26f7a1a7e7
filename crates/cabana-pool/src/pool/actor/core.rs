use cabana_actor::{Actor, ActorAction, ActorContext};
use log::info;

use crate::error::PoolError;
use crate::pool::actor::{PoolActor, PoolActorOptions};
use crate::pool::event::PoolEvent;
use crate::pool::state::{PoolState, WorkerRecord};
use crate::worker::{Worker, WorkerSupervisor};

impl<W: Worker> Actor for PoolActor<W> {
    type Message = PoolEvent<W>;
    type Options = PoolActorOptions<W>;
    type Error = PoolError;

    fn name() -> &'static str {
        "PoolActor"
    }

    fn new(options: PoolActorOptions<W>) -> Self {
        Self {
            supervisor: WorkerSupervisor::new(options.factory),
            state: PoolState::new(),
            options: options.pool,
        }
    }

    fn start(&mut self, ctx: &mut ActorContext<Self>) -> Result<(), PoolError> {
        for _ in 0..self.options.size {
            let handle = self.supervisor.start_child(ctx)?;
            self.state.push_idle_back(WorkerRecord::new(handle));
        }
        match &self.options.name {
            Some(name) => info!("pool {name} started with {} workers", self.options.size),
            None => info!("pool started with {} workers", self.options.size),
        }
        Ok(())
    }

    fn receive(
        &mut self,
        ctx: &mut ActorContext<Self>,
        message: PoolEvent<W>,
    ) -> Result<ActorAction, PoolError> {
        match message {
            PoolEvent::Request {
                payload,
                client_ref,
                token,
                block,
            } => self.handle_request(ctx, payload, client_ref, token, block),
            PoolEvent::Checkin { worker, client_ref } => {
                self.handle_checkin(ctx, worker, client_ref)
            }
            PoolEvent::Cancel { client_ref } => self.handle_cancel(ctx, client_ref),
            PoolEvent::ClientDown { token } => self.handle_client_down(ctx, token),
            PoolEvent::WorkerExit { worker } => self.handle_worker_exit(ctx, worker),
            PoolEvent::Status { reply } => self.handle_status(reply),
            PoolEvent::Stop => Ok(ActorAction::Stop),
        }
    }

    fn stop(mut self) -> Result<(), PoolError> {
        // All children are unlinked before termination, so shutdown does not
        // produce exit events.
        self.supervisor.stop();
        match &self.options.name {
            Some(name) => info!("pool {name} has stopped"),
            None => info!("pool has stopped"),
        }
        Ok(())
    }
}
