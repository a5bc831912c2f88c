//! Chunk generator. Produces a fixed-size payload for a given sequence
//! number, resolution tag and transport size class. The 50ms sleep
//! simulates encoding latency.

use crate::config::ENCODE_LATENCY;
use std::thread;

const TCP_FILLER: &[u8] = b"VIDEODATA";
const UDP_FILLER: &[u8] = b"UDPDATA";

/// Builds a chunk of exactly `size` bytes: an ASCII header
/// `VIDEO_CHUNK_<seq>_<resolution>_`, followed by a repeating filler
/// pattern, with the final byte forced to zero.
pub fn make_chunk(seq: u32, resolution: &str, size: usize, filler: &[u8]) -> Vec<u8> {
    thread::sleep(ENCODE_LATENCY);

    let mut data = vec![0u8; size];
    let header = format!("VIDEO_CHUNK_{}_{}_", seq, resolution);
    let header_bytes = header.as_bytes();
    let header_len = header_bytes.len().min(size);
    data[..header_len].copy_from_slice(&header_bytes[..header_len]);

    let mut pos = header_len;
    while pos < size {
        let remaining = size - pos;
        let take = remaining.min(filler.len());
        data[pos..pos + take].copy_from_slice(&filler[..take]);
        pos += take;
    }

    if size > 0 {
        *data.last_mut().unwrap() = 0;
    }

    data
}

/// Convenience wrapper for the reliable-stream path.
pub fn make_tcp_chunk(seq: u32, resolution: &str, size: usize) -> Vec<u8> {
    make_chunk(seq, resolution, size, TCP_FILLER)
}

/// Convenience wrapper for the datagram path.
pub fn make_udp_chunk(seq: u32, resolution: &str, size: usize) -> Vec<u8> {
    make_chunk(seq, resolution, size, UDP_FILLER)
}

/// Parses a chunk header of the form `VIDEO_CHUNK_<seq>_<resolution>_`,
/// the format the client uses for loss detection and display.
pub fn parse_header(data: &[u8]) -> Option<(u32, String)> {
    let text = std::str::from_utf8(data).ok()?;
    let rest = text.strip_prefix("VIDEO_CHUNK_")?;
    let mut parts = rest.splitn(2, '_');
    let seq_str = parts.next()?;
    let seq: u32 = seq_str.parse().ok()?;
    let tail = parts.next()?;
    let resolution = tail.split('_').next()?.to_string();
    Some((seq, resolution))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{C_TCP, C_UDP};

    #[test]
    fn tcp_chunk_has_exact_size_and_zero_terminator() {
        let chunk = make_tcp_chunk(1, "720p", C_TCP);
        assert_eq!(chunk.len(), C_TCP);
        assert_eq!(*chunk.last().unwrap(), 0);
    }

    #[test]
    fn udp_chunk_has_exact_size() {
        let chunk = make_udp_chunk(42, "480p", C_UDP);
        assert_eq!(chunk.len(), C_UDP);
    }

    #[test]
    fn header_is_parseable_and_round_trips_sequence_and_resolution() {
        let chunk = make_tcp_chunk(7, "1080p", C_TCP);
        let (seq, resolution) = parse_header(&chunk[..64]).expect("header should parse");
        assert_eq!(seq, 7);
        assert_eq!(resolution, "1080p");
    }

    #[test]
    fn header_survives_in_a_tiny_chunk_buffer() {
        // Smallest size class that still fits a short header plus terminator.
        let header_len = format!("VIDEO_CHUNK_{}_{}_", 1, "480p").len();
        let chunk = make_chunk(1, "480p", header_len + 1, TCP_FILLER);
        let (seq, resolution) = parse_header(&chunk[..header_len]).expect("header should parse");
        assert_eq!(seq, 1);
        assert_eq!(resolution, "480p");
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!(parse_header(b"not a chunk header").is_none());
    }
}
