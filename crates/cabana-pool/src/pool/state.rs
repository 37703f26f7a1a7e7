use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fmt::Formatter;

use tokio::time::Instant;

use crate::id::{ClientRef, MonitorToken, WorkerId};
use crate::pool::event::RequestPayload;
use crate::pool::options::Strategy;
use crate::worker::{Worker, WorkerHandle};

pub(crate) struct WorkerRecord<W: Worker> {
    pub handle: WorkerHandle<W>,
    pub updated_at: Instant,
}

impl<W: Worker> WorkerRecord<W> {
    pub fn new(handle: WorkerHandle<W>) -> Self {
        Self {
            handle,
            updated_at: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Instant::now();
    }
}

/// A busy worker currently assigned to a client, keyed by worker id.
pub(crate) struct Monitor<W: Worker> {
    pub record: WorkerRecord<W>,
    pub client_ref: ClientRef,
    pub token: MonitorToken,
}

/// A client blocked because neither idle nor overflow capacity was
/// available when its request arrived.
pub(crate) struct Waiter<W: Worker> {
    pub payload: RequestPayload<W>,
    pub client_ref: ClientRef,
    pub token: MonitorToken,
}

/// All mutable coordinator state.
///
/// A worker handle appears in exactly one of `idle` or `monitors`;
/// `idle.len() + monitors.len()` always equals the steady-state size plus
/// the current overflow, and waiters are only present while both the idle
/// queue and the overflow budget are exhausted.
pub(crate) struct PoolState<W: Worker> {
    idle: VecDeque<WorkerRecord<W>>,
    waiters: VecDeque<Waiter<W>>,
    monitors: HashMap<WorkerId, Monitor<W>>,
    overflow: usize,
}

impl<W: Worker> PoolState<W> {
    pub fn new() -> Self {
        Self {
            idle: VecDeque::new(),
            waiters: VecDeque::new(),
            monitors: HashMap::new(),
            overflow: 0,
        }
    }

    /// Remove the next idle worker. Removal is always from the front,
    /// regardless of the reinsertion strategy.
    pub fn pop_idle(&mut self) -> Option<WorkerRecord<W>> {
        self.idle.pop_front()
    }

    /// Return a worker to the idle queue on checkin.
    pub fn push_idle(&mut self, record: WorkerRecord<W>, strategy: Strategy) {
        match strategy {
            Strategy::Lifo => self.idle.push_front(record),
            Strategy::Fifo => self.idle.push_back(record),
        }
    }

    pub fn push_idle_front(&mut self, record: WorkerRecord<W>) {
        self.idle.push_front(record);
    }

    pub fn push_idle_back(&mut self, record: WorkerRecord<W>) {
        self.idle.push_back(record);
    }

    pub fn remove_idle(&mut self, worker: WorkerId) -> Option<WorkerRecord<W>> {
        let index = self.idle.iter().position(|x| x.handle.id() == worker)?;
        self.idle.remove(index)
    }

    pub fn add_monitor(&mut self, monitor: Monitor<W>) {
        self.monitors.insert(monitor.record.handle.id(), monitor);
    }

    /// Remove the monitor for a worker. When `client_ref` is given, the
    /// monitor is only removed if it still belongs to that lease; a stale
    /// checkin for a reassigned worker leaves the monitor in place.
    pub fn remove_monitor(
        &mut self,
        worker: WorkerId,
        client_ref: Option<ClientRef>,
    ) -> Option<Monitor<W>> {
        let monitor = self.monitors.get(&worker)?;
        if client_ref.is_none_or(|x| x == monitor.client_ref) {
            self.monitors.remove(&worker)
        } else {
            None
        }
    }

    pub fn remove_monitor_by_client(&mut self, client_ref: ClientRef) -> Option<Monitor<W>> {
        let worker = self
            .monitors
            .values()
            .find(|x| x.client_ref == client_ref)
            .map(|x| x.record.handle.id())?;
        self.monitors.remove(&worker)
    }

    pub fn remove_monitor_by_token(&mut self, token: MonitorToken) -> Option<Monitor<W>> {
        let worker = self
            .monitors
            .values()
            .find(|x| x.token == token)
            .map(|x| x.record.handle.id())?;
        self.monitors.remove(&worker)
    }

    pub fn push_waiter(&mut self, waiter: Waiter<W>) {
        self.waiters.push_back(waiter);
    }

    pub fn pop_waiter(&mut self) -> Option<Waiter<W>> {
        self.waiters.pop_front()
    }

    pub fn remove_waiter_by_client(&mut self, client_ref: ClientRef) -> Option<Waiter<W>> {
        let index = self.waiters.iter().position(|x| x.client_ref == client_ref)?;
        self.waiters.remove(index)
    }

    pub fn remove_waiter_by_token(&mut self, token: MonitorToken) -> Option<Waiter<W>> {
        let index = self.waiters.iter().position(|x| x.token == token)?;
        self.waiters.remove(index)
    }

    pub fn overflow(&self) -> usize {
        self.overflow
    }

    pub fn add_overflow(&mut self) {
        self.overflow += 1;
    }

    pub fn remove_overflow(&mut self) {
        self.overflow = self.overflow.saturating_sub(1);
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn busy_count(&self) -> usize {
        self.monitors.len()
    }

    pub fn status(&self, max_overflow: usize) -> PoolStatus {
        PoolStatus {
            state: derive_state_name(self.idle.len(), self.overflow, max_overflow),
            idle: self.idle.len(),
            overflow: self.overflow,
            busy: self.monitors.len(),
        }
    }
}

/// A point-in-time snapshot of the pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub state: PoolStateName,
    pub idle: usize,
    pub overflow: usize,
    pub busy: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStateName {
    Ready,
    Overflow,
    Full,
}

impl fmt::Display for PoolStateName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PoolStateName::Ready => write!(f, "READY"),
            PoolStateName::Overflow => write!(f, "OVERFLOW"),
            PoolStateName::Full => write!(f, "FULL"),
        }
    }
}

fn derive_state_name(idle: usize, overflow: usize, max_overflow: usize) -> PoolStateName {
    if overflow >= 1 {
        if overflow == max_overflow {
            PoolStateName::Full
        } else {
            PoolStateName::Overflow
        }
    } else if idle == 0 {
        if max_overflow == 0 {
            PoolStateName::Full
        } else {
            PoolStateName::Overflow
        }
    } else {
        PoolStateName::Ready
    }
}
