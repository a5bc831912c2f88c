//! Entry point for the streaming client binary: negotiates with the
//! server, then receives delivery over whichever transport was
//! negotiated, printing a short statistics summary.

mod cli;
mod negotiate;
mod receive_datagram;
mod receive_stream;

use common::logging::{self, info, Verbosity};
use std::process;
use streamcore::config::Transport;

fn main() {
    let args = match cli::parse(std::env::args()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("argument error: {}", e);
            process::exit(1);
        }
    };

    let log = logging::init(Verbosity::Normal);

    let response = match negotiate::negotiate(&args.server_ip, args.port, &args.resolution, args.transport) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("negotiation failed: {}", e);
            process::exit(1);
        }
    };

    info!(
        log, "negotiated with server";
        "client_id" => response.client_id,
        "resolution" => &response.resolution,
        "bandwidth_kbps" => response.bandwidth,
        "transport" => &response.transport,
    );

    match args.transport {
        Transport::Tcp => {
            let stream_port = args.port + 1;
            match receive_stream::receive(&args.server_ip, stream_port, response.client_id, &log) {
                Ok(stats) => {
                    println!(
                        "received {} chunks ({} bytes) in {:.2}s, in_order={}",
                        stats.chunks_received,
                        stats.bytes_received,
                        stats.elapsed.as_secs_f64(),
                        stats.in_order,
                    );
                }
                Err(e) => {
                    eprintln!("reliable-stream receive failed: {}", e);
                    process::exit(1);
                }
            }
        }
        Transport::Udp => {
            let streaming_port = response.streaming_port as u16;
            match receive_datagram::receive(&args.server_ip, streaming_port, &log) {
                Ok(stats) => {
                    let dropped = streamcore::config::VIDEO_CHUNKS.saturating_sub(stats.chunks_received);
                    println!(
                        "received {} chunks ({} bytes) in {:.2}s, {} chunks missing",
                        stats.chunks_received,
                        stats.bytes_received,
                        stats.elapsed.as_secs_f64(),
                        dropped,
                    );
                }
                Err(e) => {
                    eprintln!("datagram receive failed: {}", e);
                    process::exit(1);
                }
            }
        }
    }
}
