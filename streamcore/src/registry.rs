//! Client registry: the fixed-capacity table of client records, their
//! lifecycle state, and their statistics.
//!
//! The whole table lives behind a single mutex. Every public method on
//! `Registry` takes the lock for the shortest possible critical section
//! and never performs network I/O while holding it — callers that need
//! to do I/O on a slot's handle must `take_handle`/`attach_handle` to
//! move ownership of the `TcpStream` out of the lock first.

use crate::config::{Resolution, Transport};
use common::time::Clock;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

pub type ClientId = usize;

/// `IDLE -> CONNECTION (negotiating) -> IDLE (queued) -> CONNECTION
/// (selected, awaiting attach) -> STREAMING -> FINISHED`. The two
/// `Connection` points share one state value; what differs is whether
/// the slot is sitting in the scheduling queue or has already been
/// dequeued.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LifecycleState {
    Idle,
    Connection,
    Streaming,
    Finished,
}

/// A single client record. `id` is the slot index and never changes for
/// the lifetime of the record (invariant i).
pub struct ClientSlot {
    pub id: ClientId,
    pub peer_addr: Option<SocketAddr>,
    pub resolution: Option<Resolution>,
    pub transport: Option<Transport>,
    pub streaming_port: u16,
    pub state: LifecycleState,
    pub active: bool,
    pub handle: Option<TcpStream>,
    pub start_time: Instant,
    pub last_update: Instant,
    pub bytes_sent: u64,
    pub chunks_sent: u64,
    pub avg_rate_bps: f64,
    pub avg_latency_ms: f64,
    pub dropped: u64,
}

impl ClientSlot {
    fn empty(id: ClientId, now: Instant) -> ClientSlot {
        ClientSlot {
            id,
            peer_addr: None,
            resolution: None,
            transport: None,
            streaming_port: 0,
            state: LifecycleState::Idle,
            active: false,
            handle: None,
            start_time: now,
            last_update: now,
            bytes_sent: 0,
            chunks_sent: 0,
            avg_rate_bps: 0.0,
            avg_latency_ms: 0.0,
            dropped: 0,
        }
    }

    fn reset_for_admission(&mut self, peer_addr: SocketAddr, now: Instant) {
        self.peer_addr = Some(peer_addr);
        self.resolution = None;
        self.transport = None;
        self.streaming_port = 0;
        self.state = LifecycleState::Connection;
        self.active = true;
        self.handle = None;
        self.start_time = now;
        self.last_update = now;
        self.bytes_sent = 0;
        self.chunks_sent = 0;
        self.avg_rate_bps = 0.0;
        self.avg_latency_ms = 0.0;
        self.dropped = 0;
    }
}

/// A point-in-time copy of a slot's scalar fields, safe to hold onto
/// while doing network I/O (it owns no lock and no socket handle).
#[derive(Debug, Clone)]
pub struct ClientSlotSnapshot {
    pub id: ClientId,
    pub peer_addr: Option<SocketAddr>,
    pub resolution: Option<Resolution>,
    pub transport: Option<Transport>,
    pub streaming_port: u16,
    pub state: LifecycleState,
    pub active: bool,
    pub start_time: Instant,
    pub last_update: Instant,
    pub bytes_sent: u64,
    pub chunks_sent: u64,
    pub avg_rate_bps: f64,
    pub avg_latency_ms: f64,
    pub dropped: u64,
}

impl From<&ClientSlot> for ClientSlotSnapshot {
    fn from(slot: &ClientSlot) -> ClientSlotSnapshot {
        ClientSlotSnapshot {
            id: slot.id,
            peer_addr: slot.peer_addr,
            resolution: slot.resolution.clone(),
            transport: slot.transport,
            streaming_port: slot.streaming_port,
            state: slot.state,
            active: slot.active,
            start_time: slot.start_time,
            last_update: slot.last_update,
            bytes_sent: slot.bytes_sent,
            chunks_sent: slot.chunks_sent,
            avg_rate_bps: slot.avg_rate_bps,
            avg_latency_ms: slot.avg_latency_ms,
            dropped: slot.dropped,
        }
    }
}

pub struct Registry {
    slots: Mutex<Vec<ClientSlot>>,
    rr_cursor: AtomicUsize,
    clock: Clock,
}

impl Registry {
    pub fn new(capacity: usize) -> Registry {
        let now = Instant::now();
        let slots = (0..capacity).map(|id| ClientSlot::empty(id, now)).collect();

        Registry {
            slots: Mutex::new(slots),
            rr_cursor: AtomicUsize::new(0),
            clock: Clock::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().expect("registry mutex poisoned").len()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Allocates a client slot for a newly accepted negotiation peer,
    /// preferring a free slot formerly held by the same peer address.
    pub fn allocate(&self, peer_addr: SocketAddr) -> Option<ClientId> {
        let mut slots = self.slots.lock().expect("registry mutex poisoned");
        let now = Instant::now();

        let reuse = slots
            .iter()
            .position(|s| !s.active && s.peer_addr == Some(peer_addr));

        let chosen = reuse.or_else(|| slots.iter().position(|s| !s.active));

        if let Some(id) = chosen {
            slots[id].reset_for_admission(peer_addr, now);
        }

        chosen
    }

    /// Runs `f` against the slot for `id` while holding the lock. Kept
    /// private: every public mutation goes through a named method so call
    /// sites read as intent, not raw lock juggling.
    fn with_slot<T>(&self, id: ClientId, f: impl FnOnce(&mut ClientSlot) -> T) -> Option<T> {
        let mut slots = self.slots.lock().expect("registry mutex poisoned");
        slots.get_mut(id).map(f)
    }

    pub fn snapshot(&self, id: ClientId) -> Option<ClientSlotSnapshot> {
        let slots = self.slots.lock().expect("registry mutex poisoned");
        slots.get(id).map(ClientSlotSnapshot::from)
    }

    pub fn snapshot_all(&self) -> Vec<ClientSlotSnapshot> {
        let slots = self.slots.lock().expect("registry mutex poisoned");
        slots.iter().map(ClientSlotSnapshot::from).collect()
    }

    pub fn is_active(&self, id: ClientId) -> bool {
        self.with_slot(id, |s| s.active).unwrap_or(false)
    }

    pub fn set_negotiated(&self, id: ClientId, resolution: Resolution, transport: Transport, streaming_port: u16) {
        self.with_slot(id, |s| {
            s.resolution = Some(resolution);
            s.transport = Some(transport);
            s.streaming_port = streaming_port;
        });
    }

    pub fn set_state(&self, id: ClientId, state: LifecycleState) {
        self.with_slot(id, |s| s.state = state);
    }

    /// Clears a slot's `active` flag and sets it IDLE, discarding any
    /// partially negotiated state. Used on negotiation failure.
    pub fn discard(&self, id: ClientId) {
        self.with_slot(id, |s| {
            s.active = false;
            s.state = LifecycleState::Idle;
        });
    }

    /// Transitions a slot to FINISHED and clears `active`.
    pub fn finish(&self, id: ClientId) {
        self.with_slot(id, |s| {
            s.state = LifecycleState::Finished;
            s.active = false;
        });
    }

    pub fn reset_start_time(&self, id: ClientId) {
        let now = Instant::now();
        self.with_slot(id, |s| {
            s.start_time = now;
            s.last_update = now;
        });
    }

    pub fn update_peer_addr(&self, id: ClientId, addr: SocketAddr) {
        self.with_slot(id, |s| s.peer_addr = Some(addr));
    }

    /// Moves the delivery handle out of the slot, if present, so a
    /// reattach can close the previous one.
    pub fn take_handle(&self, id: ClientId) -> Option<TcpStream> {
        self.with_slot(id, |s| s.handle.take()).flatten()
    }

    /// Attaches a new delivery handle, returning any handle it replaced
    /// so the caller can close it outside the lock.
    pub fn attach_handle(&self, id: ClientId, stream: TcpStream) -> Option<TcpStream> {
        self.with_slot(id, |s| s.handle.replace(stream)).flatten()
    }

    /// Folds bytes sent into the cumulative total, increments the chunk
    /// counter, recomputes the running average rate, and records the
    /// transport.
    pub fn update_stats(&self, id: ClientId, bytes: u64, transport: Transport) {
        let now = Instant::now();
        self.with_slot(id, |s| {
            s.bytes_sent += bytes;
            s.chunks_sent += 1;
            s.last_update = now;
            s.transport = Some(transport);

            let elapsed = now.duration_since(s.start_time).as_secs_f64();
            s.avg_rate_bps = if elapsed > 0.0 {
                s.bytes_sent as f64 / elapsed
            } else {
                0.0
            };
        });
    }

    /// Folds a per-chunk latency sample into the slot's running mean.
    pub fn record_latency(&self, id: ClientId, latency_ms: f64) {
        self.with_slot(id, |s| {
            let n = s.chunks_sent.max(1) as f64;
            s.avg_latency_ms += (latency_ms - s.avg_latency_ms) / n;
        });
    }

    pub fn record_drop(&self, id: ClientId) {
        self.with_slot(id, |s| s.dropped += 1);
    }

    /// Clears the dropped-chunk counter, done at the start of a datagram
    /// delivery run.
    pub fn clear_dropped(&self, id: ClientId) {
        self.with_slot(id, |s| s.dropped = 0);
    }

    /// Round-robin selection: scans starting at `cursor + 1 mod N` for
    /// the first slot that is both active and IDLE, transitions it to
    /// CONNECTION before returning so it can't be re-selected, and moves
    /// the cursor there. Returns `None` if a full pass finds nothing.
    pub fn rr_next(&self) -> Option<ClientId> {
        let mut slots = self.slots.lock().expect("registry mutex poisoned");
        let n = slots.len();
        if n == 0 {
            return None;
        }

        let start = self.rr_cursor.load(Ordering::Relaxed);

        for offset in 1..=n {
            let idx = (start + offset) % n;
            let slot = &mut slots[idx];
            if slot.active && slot.state == LifecycleState::Idle {
                slot.state = LifecycleState::Connection;
                self.rr_cursor.store(idx, Ordering::Relaxed);
                return Some(idx);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[test]
    fn allocate_assigns_stable_slot_index_equal_to_client_id() {
        let registry = Registry::new(4);
        let id = registry.allocate(addr(1)).unwrap();
        let snap = registry.snapshot(id).unwrap();
        assert_eq!(snap.id, id);
        assert!(snap.active);
        assert_eq!(snap.state, LifecycleState::Connection);
    }

    #[test]
    fn allocate_fails_closed_when_full() {
        let registry = Registry::new(2);
        registry.allocate(addr(1)).unwrap();
        registry.allocate(addr(2)).unwrap();
        assert_eq!(registry.allocate(addr(3)), None);
    }

    #[test]
    fn discard_frees_the_slot_for_reuse() {
        let registry = Registry::new(1);
        let id = registry.allocate(addr(1)).unwrap();
        registry.discard(id);
        assert!(!registry.is_active(id));

        let reused = registry.allocate(addr(1)).unwrap();
        assert_eq!(reused, id);
    }

    #[test]
    fn reuse_prefers_slot_formerly_held_by_same_peer() {
        let registry = Registry::new(2);
        let first = registry.allocate(addr(1)).unwrap();
        registry.discard(first);
        let second = registry.allocate(addr(2)).unwrap();
        assert_ne!(second, first);

        registry.discard(second);

        // Peer `addr(1)` reconnecting should land back on its old slot,
        // not just "the first free slot" (which would now be `second`).
        let third = registry.allocate(addr(1)).unwrap();
        assert_eq!(third, first);
    }

    #[test]
    fn rr_next_skips_non_idle_and_inactive_slots_and_wraps() {
        let registry = Registry::new(3);
        let a = registry.allocate(addr(1)).unwrap();
        let b = registry.allocate(addr(2)).unwrap();
        registry.set_state(a, LifecycleState::Idle);
        registry.set_state(b, LifecycleState::Idle);

        let picked_first = registry.rr_next().unwrap();
        assert!(picked_first == a || picked_first == b);

        registry.set_state(picked_first, LifecycleState::Idle);
        // Re-selecting right after should find the *other* idle slot,
        // not immediately re-pick the one just transitioned to CONNECTION.
        let picked_second = registry.rr_next();
        assert!(picked_second.is_some());
    }

    #[test]
    fn rr_next_returns_none_when_nothing_idle() {
        let registry = Registry::new(2);
        assert_eq!(registry.rr_next(), None);
    }

    #[test]
    fn update_stats_computes_running_rate() {
        let registry = Registry::new(1);
        let id = registry.allocate(addr(1)).unwrap();
        registry.update_stats(id, 1000, Transport::Tcp);
        let snap = registry.snapshot(id).unwrap();
        assert_eq!(snap.bytes_sent, 1000);
        assert_eq!(snap.chunks_sent, 1);
        assert_eq!(snap.transport, Some(Transport::Tcp));
    }

    #[test]
    fn finish_clears_active_and_sets_finished() {
        let registry = Registry::new(1);
        let id = registry.allocate(addr(1)).unwrap();
        registry.finish(id);
        let snap = registry.snapshot(id).unwrap();
        assert!(!snap.active);
        assert_eq!(snap.state, LifecycleState::Finished);
    }
}
