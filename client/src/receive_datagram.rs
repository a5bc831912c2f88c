//! Datagram receiver.

use common::logging::{info, warn, Logger};
use std::net::UdpSocket;
use std::time::{Duration, Instant};
use streamcore::chunk::parse_header;
use streamcore::config::{C_UDP, VIDEO_CHUNKS};

const REQUEST_STREAM: &[u8] = b"REQUEST_STREAM";
const READY_TO_STREAM: &[u8] = b"READY_TO_STREAM";
const HANDSHAKE_DEADLINE: Duration = Duration::from_secs(1);
const HANDSHAKE_ATTEMPTS: u32 = 5;
const CHUNK_READ_DEADLINE: Duration = Duration::from_secs(2);

pub struct DatagramStats {
    pub chunks_received: u32,
    pub bytes_received: u64,
    pub elapsed: Duration,
}

pub fn receive(server_ip: &str, streaming_port: u16, log: &Logger) -> std::io::Result<DatagramStats> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect((server_ip, streaming_port))?;
    socket.set_read_timeout(Some(HANDSHAKE_DEADLINE))?;

    let mut handshake_buf = [0u8; READY_TO_STREAM.len()];
    let mut matched = false;

    for attempt in 1..=HANDSHAKE_ATTEMPTS {
        socket.send(REQUEST_STREAM)?;
        match socket.recv(&mut handshake_buf) {
            Ok(n) if &handshake_buf[..n] == READY_TO_STREAM => {
                matched = true;
                break;
            }
            Ok(_) => warn!(log, "unexpected handshake reply"; "attempt" => attempt),
            Err(_) => warn!(log, "no handshake reply this attempt"; "attempt" => attempt),
        }
    }

    if !matched {
        warn!(log, "REQUEST_STREAM handshake failed after all attempts");
        return Ok(DatagramStats {
            chunks_received: 0,
            bytes_received: 0,
            elapsed: Duration::from_secs(0),
        });
    }

    socket.set_read_timeout(Some(CHUNK_READ_DEADLINE))?;

    let start = Instant::now();
    let mut buf = vec![0u8; C_UDP];
    let mut chunks_received = 0u32;
    let mut bytes_received = 0u64;
    let mut last_seq = 0u32;

    for _ in 1..=VIDEO_CHUNKS {
        match socket.recv(&mut buf) {
            Ok(n) => {
                if let Some((seq, _resolution)) = parse_header(&buf[..64.min(n)]) {
                    last_seq = seq;
                }
                chunks_received += 1;
                bytes_received += n as u64;
            }
            Err(_) => break,
        }
    }

    info!(log, "datagram receive complete"; "chunks" => chunks_received, "bytes" => bytes_received, "last_seq" => last_seq);

    Ok(DatagramStats {
        chunks_received,
        bytes_received,
        elapsed: start.elapsed(),
    })
}
