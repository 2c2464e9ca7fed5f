//! Network primitives for the receive worker.
//!
//! The data socket is mio-based so it can be registered with the worker's
//! readiness poll.

pub mod endpoint;
pub mod socket;

pub use endpoint::{AddressFamily, Endpoint};
pub use socket::UdpSocket;
