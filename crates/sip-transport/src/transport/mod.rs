pub mod memory;
pub mod udp;

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Largest datagram accepted by default.
///
/// RFC 3261 18.1.1 asks for congestion-controlled transports above 1300
/// bytes; this only bounds what we are willing to read.
pub const MAX_UDP_DATAGRAM_SIZE: usize = 8192;

/// A byte pipe that SIP messages are written to and read from
///
/// Implementations must be cheap to share: the transaction layer keeps one
/// `Arc<dyn Transport>` and hands it to every transaction.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends one serialized message
    async fn write(&self, data: &[u8], destination: SocketAddr) -> Result<()>;

    /// Waits for the next message and returns it with its source
    async fn read(&self) -> Result<(Bytes, SocketAddr)>;

    /// Whether the transport retransmits on its own (TCP, TLS, ...)
    fn is_reliable(&self) -> bool;

    /// Local address the transport is bound to
    fn local_address(&self) -> Result<SocketAddr>;

    /// Source of the most recently read message
    fn last_received_address(&self) -> Option<SocketAddr>;

    /// Closes the transport; pending reads return `Error::TransportClosed`
    async fn close(&self) -> Result<()>;

    /// Checks if the transport is closed
    fn is_closed(&self) -> bool;
}
