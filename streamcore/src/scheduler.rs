//! The single cooperative selection loop, pluggable between FCFS and RR.
//! Dispatch itself is injected as a closure so this module stays
//! ignorant of how a datagram delivery task is actually spawned — it
//! only needs to know whether a client is a datagram client.

use crate::config::{Transport, FCFS_IDLE_SLEEP, RR_IDLE_SLEEP, SCHEDULER_DISPATCH_SLEEP};
use crate::queue::SchedulingQueue;
use crate::registry::{ClientId, LifecycleState, Registry};
use common::logging::{debug, Logger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Runs the FCFS scheduler until `shutdown` is set. Drains the queue in
/// arrival order; a datagram client is dispatched immediately via
/// `dispatch_udp`, a reliable-stream client is left for the stream
/// listener to pick up on attach.
pub fn run_fcfs(
    registry: &Registry,
    queue: &SchedulingQueue,
    dispatch_udp: impl Fn(ClientId),
    shutdown: &AtomicBool,
    log: &Logger,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match queue.try_pop() {
            Some(id) => {
                dispatch_if_datagram(registry, id, &dispatch_udp, log);
                thread::sleep(SCHEDULER_DISPATCH_SLEEP);
            }
            None => thread::sleep(FCFS_IDLE_SLEEP),
        }
    }
}

/// Runs the RR scheduler until `shutdown` is set. Each pass scans the
/// registry starting at `cursor + 1 mod N` for the next active IDLE slot
/// (`Registry::rr_next` performs the scan and the IDLE -> CONNECTION
/// transition atomically under the registry lock).
pub fn run_rr(
    registry: &Registry,
    dispatch_udp: impl Fn(ClientId),
    shutdown: &AtomicBool,
    log: &Logger,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match registry.rr_next() {
            Some(id) => {
                dispatch_if_datagram(registry, id, &dispatch_udp, log);
                thread::sleep(SCHEDULER_DISPATCH_SLEEP);
            }
            None => thread::sleep(RR_IDLE_SLEEP),
        }
    }
}

fn dispatch_if_datagram(registry: &Registry, id: ClientId, dispatch_udp: &impl Fn(ClientId), log: &Logger) {
    let snapshot = match registry.snapshot(id) {
        Some(s) => s,
        None => return,
    };

    if !snapshot.active {
        return;
    }

    if snapshot.transport == Some(Transport::Udp) {
        debug!(log, "scheduler dispatching datagram client"; "client_id" => id);
        dispatch_udp(id);
    } else {
        // Selection itself must move the slot IDLE -> CONNECTION so the
        // stream listener's attach check finds it pending; `rr_next`
        // already does this as part of the scan, but FCFS only learns the
        // id from the queue, so it has to make the transition here.
        registry.set_state(id, LifecycleState::Connection);
        debug!(log, "scheduler leaving reliable-stream client for attach"; "client_id" => id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Resolution;
    use common::logging::{init, Verbosity};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Mutex;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[test]
    fn fcfs_dispatches_udp_client_exactly_once() {
        let log = init(Verbosity::Quiet);
        let registry = Registry::new(2);
        let queue = SchedulingQueue::new(2);

        let id = registry.allocate(addr(1)).unwrap();
        registry.set_negotiated(id, Resolution::R480p, Transport::Udp, 9000);
        registry.set_state(id, crate::registry::LifecycleState::Idle);
        queue.push(id);

        let shutdown = AtomicBool::new(false);
        let dispatched = Mutex::new(Vec::new());

        // Run a single drain manually instead of spinning the full loop,
        // since the loop only exits on `shutdown`.
        if let Some(popped) = queue.try_pop() {
            dispatch_if_datagram(&registry, popped, &|id| dispatched.lock().unwrap().push(id), &log);
        }

        assert_eq!(*dispatched.lock().unwrap(), vec![id]);
        let _ = shutdown;
    }

    #[test]
    fn tcp_client_is_not_dispatched() {
        let log = init(Verbosity::Quiet);
        let registry = Registry::new(1);
        let id = registry.allocate(addr(1)).unwrap();
        registry.set_negotiated(id, Resolution::R720p, Transport::Tcp, 9000);

        let dispatched = Mutex::new(Vec::new());
        dispatch_if_datagram(&registry, id, &|id| dispatched.lock().unwrap().push(id), &log);

        assert!(dispatched.lock().unwrap().is_empty());
    }

    #[test]
    fn fcfs_selection_of_tcp_client_moves_slot_to_connection() {
        let log = init(Verbosity::Quiet);
        let registry = Registry::new(1);
        let queue = SchedulingQueue::new(1);

        let id = registry.allocate(addr(1)).unwrap();
        registry.set_negotiated(id, Resolution::R720p, Transport::Tcp, 9000);
        registry.set_state(id, crate::registry::LifecycleState::Idle);
        queue.push(id);

        let dispatched = Mutex::new(Vec::new());
        if let Some(popped) = queue.try_pop() {
            dispatch_if_datagram(&registry, popped, &|id| dispatched.lock().unwrap().push(id), &log);
        }

        // Must already be CONNECTION by the time selection returns, since
        // the stream listener's attach check only accepts that state.
        let snap = registry.snapshot(id).unwrap();
        assert_eq!(snap.state, crate::registry::LifecycleState::Connection);
    }
}
