//! Reliable-stream receiver. The server's negotiation response always
//! echoes `streaming_port = server_port`; the reliable-stream delivery
//! socket is conventionally `server_port + 1` regardless of that field.

use common::logging::{info, Logger};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};
use streamcore::chunk::parse_header;
use streamcore::config::{C_TCP, VIDEO_CHUNKS};

const ATTACH_DEADLINE: Duration = Duration::from_secs(5);
const CHUNK_READ_DEADLINE: Duration = Duration::from_secs(10);
const READY_TO_STREAM: &[u8] = b"READY_TO_STREAM";
const START_STREAM: &[u8] = b"START_STREAM";

pub struct StreamStats {
    pub chunks_received: u32,
    pub bytes_received: u64,
    pub elapsed: Duration,
    pub in_order: bool,
}

pub fn receive(server_ip: &str, stream_port: u16, client_id: u32, log: &Logger) -> std::io::Result<StreamStats> {
    let mut stream = TcpStream::connect((server_ip, stream_port))?;
    stream.set_write_timeout(Some(ATTACH_DEADLINE))?;
    stream.set_read_timeout(Some(ATTACH_DEADLINE))?;

    stream.write_all(client_id.to_string().as_bytes())?;

    let mut ready = [0u8; READY_TO_STREAM.len()];
    stream.read_exact(&mut ready)?;

    stream.write_all(START_STREAM)?;

    stream.set_read_timeout(Some(CHUNK_READ_DEADLINE))?;

    let start = Instant::now();
    let mut buf = vec![0u8; C_TCP];
    let mut chunks_received = 0u32;
    let mut bytes_received = 0u64;
    let mut in_order = true;
    let mut expected_seq = 1u32;

    for _ in 1..=VIDEO_CHUNKS {
        match stream.read_exact(&mut buf) {
            Ok(()) => {
                if let Some((seq, _resolution)) = parse_header(&buf[..64]) {
                    if seq != expected_seq {
                        in_order = false;
                    }
                    expected_seq = seq + 1;
                }
                chunks_received += 1;
                bytes_received += buf.len() as u64;
            }
            Err(_) => break,
        }
    }

    info!(log, "reliable-stream receive complete"; "chunks" => chunks_received, "bytes" => bytes_received);

    Ok(StreamStats {
        chunks_received,
        bytes_received,
        elapsed: start.elapsed(),
        in_order,
    })
}
