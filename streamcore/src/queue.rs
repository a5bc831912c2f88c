//! Scheduling queue for the FCFS policy: a bounded channel that
//! admission pushes a client id onto once negotiation succeeds, which
//! the FCFS scheduler drains in arrival order.

use crate::registry::ClientId;
use crossbeam_channel::{Receiver, Sender, TryRecvError};

#[derive(Clone)]
pub struct SchedulingQueue {
    tx: Sender<ClientId>,
    rx: Receiver<ClientId>,
}

impl SchedulingQueue {
    pub fn new(capacity: usize) -> SchedulingQueue {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        SchedulingQueue { tx, rx }
    }

    /// Enqueues a client for dispatch. Returns `false` if the queue is
    /// full rather than blocking the admission thread.
    pub fn push(&self, id: ClientId) -> bool {
        self.tx.try_send(id).is_ok()
    }

    /// Non-blocking pop used by the FCFS scheduler loop.
    pub fn try_pop(&self) -> Option<ClientId> {
        match self.rx.try_recv() {
            Ok(id) => Some(id),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
