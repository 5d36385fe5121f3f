//! Live order channel: transport, client, and the order-aware wrapper

pub mod client;
pub mod orders;
pub mod transport;

pub use client::{ConnectionState, LiveClient};
pub use orders::OrderChannel;
pub use transport::{MemoryTransport, TcpTransport, Transport};
