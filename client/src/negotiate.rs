//! Client side of the two-phase negotiation.

use common::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;
use streamcore::config::Transport;
use streamcore::wire::{Kind, NegotiationRecord};
use streamcore::Resolution;

const NEGOTIATION_DEADLINE: Duration = Duration::from_secs(5);

pub fn negotiate(server_ip: &str, port: u16, resolution: &Resolution, transport: Transport) -> Result<NegotiationRecord, ErrorKind> {
    let mut stream = TcpStream::connect((server_ip, port))?;
    stream.set_write_timeout(Some(NEGOTIATION_DEADLINE))?;
    stream.set_read_timeout(Some(NEGOTIATION_DEADLINE))?;

    let request = NegotiationRecord {
        kind: Kind::Request,
        resolution: resolution.as_str().to_string(),
        bandwidth: 0,
        transport: transport.as_str().to_string(),
        streaming_port: 0,
        client_id: 0,
    };
    request.write_to(&mut stream)?;

    let response = NegotiationRecord::read_from(&mut stream)?;
    if response.kind != Kind::Response {
        return Err(ErrorKind::Input("server did not reply with a response record".to_string()));
    }

    let _ = stream.shutdown(std::net::Shutdown::Both);
    Ok(response)
}
