//! Admission listener. Accepts reliable-stream negotiation connections
//! on the server port, one thread per connection.

use common::logging::{debug, info, warn, Logger};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use streamcore::config::{Resolution, Transport, NEGOTIATION_READ_DEADLINE};
use streamcore::queue::SchedulingQueue;
use streamcore::registry::{ClientId, LifecycleState, Registry};
use streamcore::wire::{Kind, NegotiationRecord};

pub fn run(listener: TcpListener, registry: &Arc<Registry>, queue: &SchedulingQueue, server_port: u16, log: &Logger) {
    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(s) => s,
            Err(e) => {
                warn!(log, "admission accept error"; "error" => %e);
                continue;
            }
        };

        let registry = Arc::clone(registry);
        let queue = queue.clone();
        let log = log.clone();

        thread::spawn(move || handle_negotiation(stream, &registry, &queue, server_port, &log));
    }
}

fn handle_negotiation(mut stream: TcpStream, registry: &Registry, queue: &SchedulingQueue, server_port: u16, log: &Logger) {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => addr,
        Err(_) => return,
    };

    let id = match registry.allocate(peer_addr) {
        Some(id) => id,
        None => {
            warn!(log, "rejecting negotiation, registry full"; "peer" => %peer_addr);
            return;
        }
    };

    let log = log.new(common::logging::o!("client_id" => id, "peer" => peer_addr.to_string()));

    if let Err(e) = negotiate(&mut stream, registry, id, server_port) {
        warn!(log, "negotiation failed"; "error" => %e);
        registry.discard(id);
        return;
    }

    let _ = stream.shutdown(std::net::Shutdown::Both);
    registry.set_state(id, LifecycleState::Idle);

    if queue.push(id) {
        info!(log, "client admitted and enqueued");
    } else {
        debug!(log, "scheduling queue full at admission, relying on RR scan");
    }
}

fn negotiate(stream: &mut TcpStream, registry: &Registry, id: ClientId, server_port: u16) -> Result<(), common::ErrorKind> {
    stream.set_read_timeout(Some(NEGOTIATION_READ_DEADLINE))?;
    let request = NegotiationRecord::read_from(&mut *stream)?;

    if request.kind != Kind::Request {
        return Err(common::ErrorKind::Input("expected a request-kind negotiation record".to_string()));
    }

    let resolution = Resolution::parse(&request.resolution);
    let transport = Transport::parse(&request.transport)
        .ok_or_else(|| common::ErrorKind::Input(format!("unknown transport: {}", request.transport)))?;

    let bandwidth = resolution.bandwidth_kbps();
    registry.set_negotiated(id, resolution.clone(), transport, server_port);

    let response = NegotiationRecord {
        kind: Kind::Response,
        resolution: resolution.as_str().to_string(),
        bandwidth,
        transport: transport.as_str().to_string(),
        streaming_port: server_port as u32,
        client_id: id as u32,
    };

    stream.set_write_timeout(Some(NEGOTIATION_READ_DEADLINE))?;
    response.write_to(&mut *stream)?;

    Ok(())
}
