//! Entry point for the streaming server binary: parses CLI arguments,
//! wires up the admission listener, stream listener, scheduler, and
//! shared datagram dispatcher, then waits for a shutdown signal.

mod admission;
mod cli;
mod stream_listener;

use common::logging::{self, info, warn, Verbosity};
use std::net::{SocketAddr, TcpListener};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use streamcore::config::SHUTDOWN_GRACE;
use streamcore::delivery::{run_datagram_delivery, DatagramDispatcher};
use streamcore::queue::SchedulingQueue;
use streamcore::registry::Registry;
use streamcore::scheduler;
use streamcore::{stats, Policy};

const MAX_CLIENTS: usize = streamcore::config::MAX_CLIENTS;

fn main() {
    let args = match cli::parse(std::env::args()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("argument error: {}", e);
            process::exit(1);
        }
    };

    let port = args.port;
    let policy = args.policy;

    let log = logging::init(Verbosity::Normal);
    info!(log, "starting streaming server"; "port" => port, "policy" => ?policy);

    let registry = Arc::new(Registry::new(MAX_CLIENTS));
    let queue = SchedulingQueue::new(MAX_CLIENTS);

    let bind_ip: SocketAddr = format!("0.0.0.0:{}", port).parse().expect("valid bind address");
    let admission_listener = match TcpListener::bind(bind_ip) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("failed to bind admission port {}: {}", port, e);
            process::exit(1);
        }
    };

    let stream_bind: SocketAddr = format!("0.0.0.0:{}", port + 1).parse().expect("valid bind address");
    let stream_listener = match TcpListener::bind(stream_bind) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("failed to bind stream delivery port {}: {}", port + 1, e);
            process::exit(1);
        }
    };

    let datagram_bind: SocketAddr = format!("0.0.0.0:{}", port).parse().expect("valid bind address");
    let dispatcher = match DatagramDispatcher::bind(datagram_bind, &log) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            eprintln!("failed to bind datagram port {}: {}", port, e);
            process::exit(1);
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));

    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .expect("failed to install shutdown signal handler");
    }

    {
        let registry = Arc::clone(&registry);
        let queue = queue.clone();
        let log = log.new(logging::o!("component" => "admission"));
        thread::spawn(move || admission::run(admission_listener, &registry, &queue, port, &log));
    }

    {
        let registry = Arc::clone(&registry);
        let log = log.new(logging::o!("component" => "stream_listener"));
        thread::spawn(move || stream_listener::run(stream_listener, &registry, &log));
    }

    {
        let registry = Arc::clone(&registry);
        let dispatcher = Arc::clone(&dispatcher);
        let queue = queue.clone();
        let shutdown = Arc::clone(&shutdown);
        let log = log.new(logging::o!("component" => "scheduler"));

        thread::spawn(move || {
            let dispatch_udp = {
                let registry = Arc::clone(&registry);
                let dispatcher = Arc::clone(&dispatcher);
                let log = log.clone();
                move |id: streamcore::ClientId| {
                    let registry = Arc::clone(&registry);
                    let dispatcher = Arc::clone(&dispatcher);
                    let log = log.clone();
                    thread::spawn(move || run_datagram_delivery(&registry, id, &dispatcher, &log));
                }
            };

            match policy {
                Policy::Fcfs => scheduler::run_fcfs(&registry, &queue, dispatch_udp, &shutdown, &log),
                Policy::Rr => scheduler::run_rr(&registry, dispatch_udp, &shutdown, &log),
            }
        });
    }

    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(std::time::Duration::from_millis(200));
    }

    warn!(log, "shutdown signal received, taking final snapshot");
    println!("{}", stats::snapshot(&registry));
    thread::sleep(SHUTDOWN_GRACE);
    info!(log, "exiting");
}
