//! Core of the bandwidth-aware, multi-client media streaming server:
//! the client registry, scheduling policies, chunk generation, wire
//! format, and the two delivery engines. Argument parsing, log sink
//! wiring, and process entry points live in the `server`/`client`
//! binary crates built on top of this one.

pub mod chunk;
pub mod config;
pub mod delivery;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod stats;
pub mod wire;

pub use config::{Policy, Resolution, Transport};
pub use registry::{ClientId, LifecycleState, Registry};
