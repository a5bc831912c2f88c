//! Statistics sink. The bookkeeping half (`update_stats`) lives on
//! `Registry` itself, next to the lock it updates; this module is the
//! read side — formatting a full-registry snapshot into the
//! human-readable block the shutdown path and any operator tooling want.

use crate::registry::{ClientSlotSnapshot, LifecycleState, Registry};
use std::fmt::Write as _;

fn state_label(state: LifecycleState) -> &'static str {
    match state {
        LifecycleState::Idle => "IDLE",
        LifecycleState::Connection => "CONNECTION",
        LifecycleState::Streaming => "STREAMING",
        LifecycleState::Finished => "FINISHED",
    }
}

fn format_slot(slot: &ClientSlotSnapshot) -> String {
    let mut line = String::new();

    let peer = slot
        .peer_addr
        .map(|a| a.to_string())
        .unwrap_or_else(|| "-".to_string());
    let transport = slot.transport.map(|t| t.as_str()).unwrap_or("-");
    let resolution = slot
        .resolution
        .as_ref()
        .map(|r| r.as_str().to_string())
        .unwrap_or_else(|| "-".to_string());
    let elapsed = slot
        .last_update
        .saturating_duration_since(slot.start_time)
        .as_secs_f64();

    let _ = write!(
        line,
        "client {:>2} | peer {:<21} | {:<4} | {:<6} | {:<10} | bytes={:<10} chunks={:<5} rate={:>10.1} B/s elapsed={:>6.2}s avg_latency={:>7.2}ms",
        slot.id,
        peer,
        transport,
        resolution,
        state_label(slot.state),
        slot.bytes_sent,
        slot.chunks_sent,
        slot.avg_rate_bps,
        elapsed,
        slot.avg_latency_ms,
    );

    if slot.transport == Some(crate::config::Transport::Udp) {
        let total = slot.chunks_sent + slot.dropped;
        let ratio = if total > 0 {
            slot.dropped as f64 / total as f64
        } else {
            0.0
        };
        let _ = write!(line, " drops={} drop_ratio={:.3}", slot.dropped, ratio);
    }

    line
}

/// Emits the full-registry snapshot block, one line per client slot that
/// has ever been allocated.
/// Only slots that have ever been allocated (non-default) are listed;
/// an untouched slot contributes nothing interesting to an operator.
pub fn snapshot(registry: &Registry) -> String {
    let mut out = String::new();
    out.push_str("=== client statistics snapshot ===\n");

    let mut any = false;
    for slot in registry.snapshot_all() {
        if slot.peer_addr.is_none() {
            continue;
        }
        any = true;
        out.push_str(&format_slot(&slot));
        out.push('\n');
    }

    if !any {
        out.push_str("(no clients have connected)\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Resolution, Transport};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[test]
    fn empty_registry_snapshot_says_so() {
        let registry = Registry::new(2);
        let text = snapshot(&registry);
        assert!(text.contains("no clients have connected"));
    }

    #[test]
    fn populated_slot_appears_with_core_fields() {
        let registry = Registry::new(2);
        let id = registry.allocate(addr(9000)).unwrap();
        registry.set_negotiated(id, Resolution::R720p, Transport::Tcp, 9001);
        registry.update_stats(id, 4096, Transport::Tcp);

        let text = snapshot(&registry);
        assert!(text.contains(&format!("client {:>2}", id)));
        assert!(text.contains("720p"));
        assert!(text.contains("TCP"));
        assert!(text.contains("bytes=4096"));
    }

    #[test]
    fn udp_slot_reports_drop_ratio() {
        let registry = Registry::new(1);
        let id = registry.allocate(addr(9100)).unwrap();
        registry.set_negotiated(id, Resolution::R480p, Transport::Udp, 9101);
        registry.update_stats(id, 8192, Transport::Udp);
        registry.record_drop(id);

        let text = snapshot(&registry);
        assert!(text.contains("drops=1"));
        assert!(text.contains("drop_ratio=0.500"));
    }
}
