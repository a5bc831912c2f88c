//! Constants and small enums shared by every other module.

use std::time::Duration;

/// Size of the fixed client registry (`N` in the data model).
pub const MAX_CLIENTS: usize = 20;

/// Number of chunks emitted per completed delivery.
pub const VIDEO_CHUNKS: u32 = 100;

/// Reliable-stream chunk size in bytes.
pub const C_TCP: usize = 131_072;

/// Datagram chunk size in bytes.
pub const C_UDP: usize = 8_192;

/// Percent chance [0, 100) that a datagram chunk is dropped.
pub const UDP_PACKET_LOSS_RATE: u32 = 5;

/// Simulated encoding latency charged per chunk produced.
pub const ENCODE_LATENCY: Duration = Duration::from_millis(50);

/// FCFS idle poll interval when the scheduling queue is empty.
pub const FCFS_IDLE_SLEEP: Duration = Duration::from_millis(50);

/// RR idle sleep after a pass over the registry finds nothing to do.
pub const RR_IDLE_SLEEP: Duration = Duration::from_millis(50);

/// Scheduler pacing sleep after every successful dispatch.
pub const SCHEDULER_DISPATCH_SLEEP: Duration = Duration::from_millis(5);

/// Deadline for reading the single negotiation record.
pub const NEGOTIATION_READ_DEADLINE: Duration = Duration::from_secs(5);

/// Deadline used for the READY_TO_STREAM handshake send.
pub const HANDSHAKE_SEND_DEADLINE: Duration = Duration::from_secs(2);
pub const HANDSHAKE_SEND_RETRIES: u32 = 5;
pub const HANDSHAKE_SEND_BACKOFF: Duration = Duration::from_millis(100);

/// Deadline for the START_STREAM wait on the reliable-stream path.
pub const START_STREAM_DEADLINE: Duration = Duration::from_secs(5);

/// Per-attempt deadline and attempt count for REQUEST_STREAM polling on
/// the datagram path.
pub const REQUEST_STREAM_DEADLINE: Duration = Duration::from_secs(1);
pub const REQUEST_STREAM_ATTEMPTS: u32 = 5;

/// Write-retry policy for pushing a reliable-stream chunk.
pub const CHUNK_WRITE_DEADLINE: Duration = Duration::from_secs(1);
pub const CHUNK_WRITE_RETRIES: u32 = 10;
pub const CHUNK_WRITE_BACKOFF: Duration = Duration::from_millis(50);

/// Upper bound on the pacing sleep between reliable-stream chunks.
pub const MAX_PACE_SLEEP_MS: u64 = 500;

/// Time given to in-flight deliveries to wind down after a shutdown
/// request, before the process exits.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// The two transports a client may negotiate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
        }
    }

    pub fn parse(text: &str) -> Option<Transport> {
        match text {
            "TCP" => Some(Transport::Tcp),
            "UDP" => Some(Transport::Udp),
            _ => None,
        }
    }
}

/// The three negotiable resolutions, plus a catch-all for anything the
/// client sends that the server doesn't recognize — it still negotiates,
/// just at the default bandwidth.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Resolution {
    R480p,
    R720p,
    R1080p,
    Other(String),
}

impl Resolution {
    pub fn parse(text: &str) -> Resolution {
        match text {
            "480p" => Resolution::R480p,
            "720p" => Resolution::R720p,
            "1080p" => Resolution::R1080p,
            other => Resolution::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Resolution::R480p => "480p",
            Resolution::R720p => "720p",
            Resolution::R1080p => "1080p",
            Resolution::Other(text) => text.as_str(),
        }
    }

    /// Authoritative resolution → bandwidth table.
    pub fn bandwidth_kbps(&self) -> u32 {
        match self {
            Resolution::R480p => 1500,
            Resolution::R720p => 3000,
            Resolution::R1080p => 6000,
            Resolution::Other(_) => 1000,
        }
    }
}

/// Scheduling policy selected on the command line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Policy {
    Fcfs,
    Rr,
}

impl Policy {
    pub fn parse(text: &str) -> Option<Policy> {
        match text.to_ascii_uppercase().as_str() {
            "FCFS" => Some(Policy::Fcfs),
            "RR" => Some(Policy::Rr),
            _ => None,
        }
    }
}

/// Milliseconds to sleep after a chunk of `size` bytes at `bandwidth_kbps`
/// to approximate the advertised rate, capped at `MAX_PACE_SLEEP_MS`.
pub fn pace_sleep_ms(size: usize, bandwidth_kbps: u32) -> u64 {
    let ideal = (8 * size as u64) / bandwidth_kbps.max(1) as u64;
    ideal.min(MAX_PACE_SLEEP_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_table_matches_spec() {
        assert_eq!(Resolution::parse("480p").bandwidth_kbps(), 1500);
        assert_eq!(Resolution::parse("720p").bandwidth_kbps(), 3000);
        assert_eq!(Resolution::parse("1080p").bandwidth_kbps(), 6000);
        assert_eq!(Resolution::parse("2160p").bandwidth_kbps(), 1000);
        assert_eq!(Resolution::parse("").bandwidth_kbps(), 1000);
    }

    #[test]
    fn transport_parse_roundtrip() {
        assert_eq!(Transport::parse("TCP"), Some(Transport::Tcp));
        assert_eq!(Transport::parse("UDP"), Some(Transport::Udp));
        assert_eq!(Transport::parse("QUIC"), None);
        assert_eq!(Transport::Tcp.as_str(), "TCP");
    }

    #[test]
    fn policy_parse_is_case_insensitive() {
        assert_eq!(Policy::parse("fcfs"), Some(Policy::Fcfs));
        assert_eq!(Policy::parse("RR"), Some(Policy::Rr));
        assert_eq!(Policy::parse("round-robin"), None);
    }

    #[test]
    fn pace_sleep_is_capped() {
        // 131072 bytes at 1 kbit/s would be enormous; must clamp.
        assert_eq!(pace_sleep_ms(C_TCP, 1), MAX_PACE_SLEEP_MS);
        // At a generous bandwidth the ideal sleep is small.
        assert!(pace_sleep_ms(C_TCP, 6000) < MAX_PACE_SLEEP_MS);
    }
}
