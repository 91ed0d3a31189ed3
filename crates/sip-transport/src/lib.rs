//! SIP transport layer implementation for the sipua stack
//!
//! This crate moves serialized SIP messages between sockets. It knows nothing
//! about SIP syntax: the transaction layer hands it bytes and a destination,
//! and reads bytes and a source back.
//!
//! - [`UdpTransport`]: tokio UDP socket with truncation detection
//! - [`MemoryTransport`]: connected in-process pair for tests
//! - [`Resolver`]: host name to candidate addresses

pub mod error;
pub mod resolver;
pub mod transport;

pub use error::{Error, Result};
pub use resolver::{DnsResolver, Resolver, StaticResolver};
pub use transport::memory::MemoryTransport;
pub use transport::udp::UdpTransport;
pub use transport::{Transport, MAX_UDP_DATAGRAM_SIZE};

/// Bind a UDP transport to the specified address
pub async fn bind_udp(addr: std::net::SocketAddr) -> Result<UdpTransport> {
    UdpTransport::bind(addr).await
}

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        bind_udp, DnsResolver, Error, MemoryTransport, Resolver, Result, StaticResolver,
        Transport, UdpTransport,
    };
}
