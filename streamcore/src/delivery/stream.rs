//! Reliable-stream delivery engine. Runs on its own thread per client,
//! given ownership of the attached `TcpStream`.
//!
//! Uses `std::net`'s blocking I/O with explicit read/write deadlines,
//! which gets bounded-wait behavior without hand-rolled readiness
//! polling around a non-blocking socket.

use crate::chunk::make_tcp_chunk;
use crate::config::{
    pace_sleep_ms, Transport, C_TCP, CHUNK_WRITE_BACKOFF, CHUNK_WRITE_DEADLINE, CHUNK_WRITE_RETRIES,
    HANDSHAKE_SEND_BACKOFF, HANDSHAKE_SEND_DEADLINE, HANDSHAKE_SEND_RETRIES, START_STREAM_DEADLINE, VIDEO_CHUNKS,
};
use crate::registry::{ClientId, LifecycleState, Registry};
use common::logging::{debug, info, warn, Logger};
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Instant;

const READY_TO_STREAM: &[u8] = b"READY_TO_STREAM";
const START_STREAM: &[u8] = b"START_STREAM";

fn is_retryable(err: &std::io::Error) -> bool {
    matches!(err.kind(), IoErrorKind::WouldBlock | IoErrorKind::TimedOut)
}

/// Sends `payload` in full, retrying on timeout/would-block up to
/// `retries` times with `backoff` between attempts. Any other error, or
/// exhausting the retry budget, is fatal.
fn send_with_retry(
    stream: &mut TcpStream,
    payload: &[u8],
    deadline: std::time::Duration,
    retries: u32,
    backoff: std::time::Duration,
) -> bool {
    stream.set_write_timeout(Some(deadline)).ok();

    let mut attempt = 0;
    loop {
        match stream.write_all(payload) {
            Ok(()) => return true,
            Err(e) if is_retryable(&e) && attempt < retries => {
                attempt += 1;
                thread::sleep(backoff);
            }
            Err(_) => return false,
        }
    }
}

/// Writes a full chunk, accumulating partial writes across up to
/// `CHUNK_WRITE_RETRIES` attempts, each bounded by `CHUNK_WRITE_DEADLINE`.
fn write_chunk(stream: &mut TcpStream, chunk: &[u8]) -> bool {
    stream.set_write_timeout(Some(CHUNK_WRITE_DEADLINE)).ok();

    let mut written = 0usize;
    let mut attempt = 0;

    while written < chunk.len() {
        match stream.write(&chunk[written..]) {
            Ok(0) => return false,
            Ok(n) => written += n,
            Err(e) if is_retryable(&e) && attempt < CHUNK_WRITE_RETRIES => {
                attempt += 1;
                thread::sleep(CHUNK_WRITE_BACKOFF);
            }
            Err(_) => return false,
        }
    }

    true
}

/// Runs the full delivery procedure for one reliable-stream client. Takes
/// ownership of `stream`; the slot must already be `active` and in state
/// CONNECTION with the handle attached.
pub fn run_stream_delivery(registry: &Registry, id: ClientId, mut stream: TcpStream, log: &Logger) {
    let log = log.new(common::logging::o!("client_id" => id, "engine" => "stream"));

    registry.set_state(id, LifecycleState::Streaming);
    registry.reset_start_time(id);

    if !send_with_retry(
        &mut stream,
        READY_TO_STREAM,
        HANDSHAKE_SEND_DEADLINE,
        HANDSHAKE_SEND_RETRIES,
        HANDSHAKE_SEND_BACKOFF,
    ) {
        warn!(log, "failed to send READY_TO_STREAM, aborting delivery");
        finish(registry, id, &mut stream);
        return;
    }

    stream.set_read_timeout(Some(START_STREAM_DEADLINE)).ok();
    let mut ack = [0u8; START_STREAM.len()];
    if stream.read_exact(&mut ack).is_err() || ack != *START_STREAM {
        warn!(log, "did not receive START_STREAM, aborting delivery");
        finish(registry, id, &mut stream);
        return;
    }

    let snapshot = match registry.snapshot(id) {
        Some(s) => s,
        None => return,
    };
    let resolution = snapshot
        .resolution
        .clone()
        .unwrap_or_else(|| crate::config::Resolution::Other(String::new()));
    let bandwidth_kbps = resolution.bandwidth_kbps();

    for seq in 1..=VIDEO_CHUNKS {
        if !registry.is_active(id) {
            debug!(log, "slot deactivated mid-stream, stopping"; "seq" => seq);
            break;
        }

        let chunk = make_tcp_chunk(seq, resolution.as_str(), C_TCP);
        let send_time = Instant::now();

        if !write_chunk(&mut stream, &chunk) {
            warn!(log, "chunk write failed, aborting delivery"; "seq" => seq);
            break;
        }

        let latency_ms = send_time.elapsed().as_secs_f64() * 1000.0;
        registry.update_stats(id, chunk.len() as u64, Transport::Tcp);
        registry.record_latency(id, latency_ms);

        thread::sleep(std::time::Duration::from_millis(pace_sleep_ms(C_TCP, bandwidth_kbps)));
    }

    info!(log, "reliable-stream delivery complete");
    finish(registry, id, &mut stream);
}

fn finish(registry: &Registry, id: ClientId, stream: &mut TcpStream) {
    let _ = stream.shutdown(std::net::Shutdown::Both);
    registry.finish(id);
    registry.take_handle(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn send_with_retry_succeeds_on_a_connected_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        assert!(send_with_retry(
            &mut server_side,
            b"hello",
            std::time::Duration::from_millis(500),
            2,
            std::time::Duration::from_millis(10),
        ));

        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn write_chunk_delivers_full_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        let chunk = vec![7u8; 4096];
        assert!(write_chunk(&mut server_side, &chunk));

        let mut buf = vec![0u8; 4096];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(buf, chunk);
    }
}
