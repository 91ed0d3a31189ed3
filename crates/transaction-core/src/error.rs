use thiserror::Error;

use sipua_sip_core::Method;

use crate::transaction::{TransactionKey, TransactionState};

/// A type alias for handling `Result`s with `Error` values
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the transaction layer
#[derive(Error, Debug)]
pub enum Error {
    /// Message model error
    #[error("SIP error: {0}")]
    Sip(#[from] sipua_sip_core::Error),

    /// Transport or resolution error
    #[error("Transport error: {0}")]
    Transport(#[from] sipua_sip_transport::Error),

    /// Another live transaction already owns this key
    #[error("Transaction already exists: {0}")]
    DuplicateTransaction(TransactionKey),

    /// Operation not allowed in the current state
    #[error("Cannot {operation} in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: TransactionState,
    },

    /// The request lacks a header the transaction layer depends on
    #[error("Missing {0} header")]
    MissingHeader(&'static str),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// ACK and CANCEL never start a client transaction of their own
    #[error("No client transaction for {0}")]
    UnsupportedMethod(Method),
}
