//! Delivery engines: one per transport, each run on its own thread for
//! the lifetime of a single client's delivery.

pub mod datagram;
pub mod stream;

pub use datagram::{run_datagram_delivery, DatagramDispatcher};
pub use stream::run_stream_delivery;
