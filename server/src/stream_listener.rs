//! Stream listener: accepts reliable-stream delivery connections on
//! server_port+1, matches the ASCII decimal identity the client sends
//! against an active, reliable-stream-negotiated slot, and launches the
//! delivery engine.

use common::logging::{info, warn, Logger};
use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use streamcore::config::Transport;
use streamcore::delivery::run_stream_delivery;
use streamcore::registry::{LifecycleState, Registry};

const IDENTITY_READ_DEADLINE: Duration = Duration::from_secs(5);
const MAX_IDENTITY_LEN: usize = 16;

pub fn run(listener: TcpListener, registry: &Arc<Registry>, log: &Logger) {
    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(s) => s,
            Err(e) => {
                warn!(log, "stream listener accept error"; "error" => %e);
                continue;
            }
        };

        let registry = Arc::clone(registry);
        let log = log.clone();

        thread::spawn(move || handle_attach(stream, &registry, &log));
    }
}

fn handle_attach(mut stream: TcpStream, registry: &Registry, log: &Logger) {
    stream.set_read_timeout(Some(IDENTITY_READ_DEADLINE)).ok();

    let id = match read_identity(&mut stream) {
        Some(id) => id,
        None => {
            warn!(log, "stream attach: unreadable identity, closing");
            return;
        }
    };

    let snapshot = match registry.snapshot(id) {
        Some(s) => s,
        None => {
            warn!(log, "stream attach: unknown client id"; "client_id" => id);
            return;
        }
    };

    if !snapshot.active || snapshot.transport != Some(Transport::Tcp) || snapshot.state != LifecycleState::Connection {
        warn!(log, "stream attach: identity does not refer to a pending reliable-stream client"; "client_id" => id);
        return;
    }

    if let Some(previous) = registry.attach_handle(id, stream.try_clone().expect("tcp stream clone")) {
        let _ = previous.shutdown(std::net::Shutdown::Both);
    }

    info!(log, "reliable-stream client attached"; "client_id" => id);
    run_stream_delivery(registry, id, stream, log);
}

/// Reads a short run of ASCII decimal digits, stopping at the first
/// non-digit byte or `MAX_IDENTITY_LEN`.
fn read_identity(stream: &mut TcpStream) -> Option<usize> {
    let mut digits = Vec::with_capacity(MAX_IDENTITY_LEN);
    let mut byte = [0u8; 1];

    while digits.len() < MAX_IDENTITY_LEN {
        match stream.read(&mut byte) {
            Ok(0) => break,
            Ok(_) if byte[0].is_ascii_digit() => digits.push(byte[0]),
            Ok(_) => break,
            Err(_) => return None,
        }
    }

    if digits.is_empty() {
        return None;
    }

    std::str::from_utf8(&digits).ok()?.parse().ok()
}
