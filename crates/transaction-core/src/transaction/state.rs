use std::fmt;

use serde::{Deserialize, Serialize};

use sipua_sip_core::Method;

use crate::error::{Error, Result};

/// Why a transaction reached `Terminated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    /// A final response arrived and the cleanup period elapsed
    Success,
    /// No final response within the completion timer
    Timeout,
    /// The request was retransmitted `max_retries` times without an answer
    RetriesExceeded,
    /// A write failed
    TransportError,
    /// The request was cancelled locally
    Cancelled,
    /// Torn down without further signalling
    Aborted,
}

/// Client transaction states.
///
/// The states are ordered; a transaction only ever moves forward through
/// them and `Terminated` is absorbing.
///
/// ```text
/// NotStarted ─▶ Trying ─▶ Proceeding ─▶ Cancelling ─▶ Completed ─▶ Terminated
///                  │           │              │                        ▲
///                  └───────────┴──────────────┴────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    NotStarted,
    Trying,
    Proceeding,
    Cancelling,
    Completed,
    Terminated(TerminationReason),
}

impl TransactionState {
    pub fn rank(&self) -> u8 {
        match self {
            TransactionState::NotStarted => 0,
            TransactionState::Trying => 1,
            TransactionState::Proceeding => 2,
            TransactionState::Cancelling => 3,
            TransactionState::Completed => 4,
            TransactionState::Terminated(_) => 5,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, TransactionState::Terminated(_))
    }

    /// Whether moving to `next` keeps the history monotonic
    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        !self.is_terminated() && next.rank() >= self.rank()
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Terminated(reason) => write!(f, "Terminated({:?})", reason),
            other => write!(f, "{:?}", other),
        }
    }
}

/// The kind of request a client transaction carries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Invite,
    Bye,
    Register,
    Subscribe,
    Notify,
    Publish,
    Refer,
    Message,
    Options,
    Info,
    /// Out-of-dialog OPTIONS used as a keep-alive check
    Ping,
    /// PRACK, UPDATE and extension methods
    Other(Method),
}

impl TransactionKind {
    /// Maps a request method to its transaction kind.
    ///
    /// ACK and CANCEL are sent by other transactions and never get one of
    /// their own.
    pub fn from_method(method: &Method) -> Result<Self> {
        Ok(match method {
            Method::Invite => TransactionKind::Invite,
            Method::Bye => TransactionKind::Bye,
            Method::Register => TransactionKind::Register,
            Method::Subscribe => TransactionKind::Subscribe,
            Method::Notify => TransactionKind::Notify,
            Method::Publish => TransactionKind::Publish,
            Method::Refer => TransactionKind::Refer,
            Method::Message => TransactionKind::Message,
            Method::Options => TransactionKind::Options,
            Method::Info => TransactionKind::Info,
            Method::Ack | Method::Cancel => return Err(Error::UnsupportedMethod(method.clone())),
            other => TransactionKind::Other(other.clone()),
        })
    }

    pub fn method(&self) -> Method {
        match self {
            TransactionKind::Invite => Method::Invite,
            TransactionKind::Bye => Method::Bye,
            TransactionKind::Register => Method::Register,
            TransactionKind::Subscribe => Method::Subscribe,
            TransactionKind::Notify => Method::Notify,
            TransactionKind::Publish => Method::Publish,
            TransactionKind::Refer => Method::Refer,
            TransactionKind::Message => Method::Message,
            TransactionKind::Options | TransactionKind::Ping => Method::Options,
            TransactionKind::Info => Method::Info,
            TransactionKind::Other(method) => method.clone(),
        }
    }

    pub fn is_invite(&self) -> bool {
        matches!(self, TransactionKind::Invite)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Ping => f.write_str("PING"),
            other => f.write_str(other.method().as_str()),
        }
    }
}
