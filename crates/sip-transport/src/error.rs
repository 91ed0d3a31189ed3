use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// A type alias for handling `Result`s with `Error` values
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while moving SIP messages on the wire
#[derive(Error, Debug)]
pub enum Error {
    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport was closed locally
    #[error("Transport closed")]
    TransportClosed,

    /// A datagram exceeded the configured maximum size
    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Name resolution failed outright
    #[error("Failed to resolve {0}")]
    Resolution(String),

    /// Name resolution succeeded but produced no usable address
    #[error("No addresses found for {0}")]
    NoCandidates(String),

    /// A write was refused for a specific destination
    #[error("Failed to send to {destination}: {reason}")]
    WriteFailed { destination: SocketAddr, reason: String },
}

impl Error {
    /// Whether the transport can no longer be used at all
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::TransportClosed)
    }
}
