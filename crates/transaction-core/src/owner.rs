//! Callbacks from a client transaction to the code that started it

use sipua_sip_core::Response;

use crate::transaction::{TerminationReason, Transaction};

/// Receives the responses and the end of a client transaction.
///
/// Callbacks run on the transaction's task after its lock has been released,
/// so they may call back into the transaction. They should return quickly.
pub trait TransactionOwner: Send + Sync {
    /// A 1xx response arrived
    fn on_provisional(&self, _transaction: &Transaction, _response: &Response) {}

    /// The first final response arrived; retransmissions are not reported
    fn on_final(&self, _transaction: &Transaction, _response: &Response) {}

    fn on_terminated(&self, _transaction: &Transaction, _reason: TerminationReason) {}
}

/// Owner that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOwner;

impl TransactionOwner for NullOwner {}
