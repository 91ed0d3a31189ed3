//! Lookup of live client transactions by correlation key

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use tracing::{debug, trace};

use sipua_sip_core::{Method, Response};

use crate::error::{Error, Result};
use crate::transaction::{Transaction, TransactionKey};

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<TransactionRegistry> = Arc::new(TransactionRegistry::new());
}

/// Live client transactions, keyed by [`TransactionKey`]
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    transactions: RwLock<HashMap<TransactionKey, Transaction>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> Arc<TransactionRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    /// Adds a transaction. A second live transaction with the same key is
    /// rejected rather than replacing the first.
    pub fn register(&self, transaction: Transaction) -> Result<()> {
        match self.transactions.write().entry(transaction.key().clone()) {
            Entry::Occupied(entry) => Err(Error::DuplicateTransaction(entry.key().clone())),
            Entry::Vacant(entry) => {
                trace!(key = %entry.key(), "Transaction registered");
                entry.insert(transaction);
                Ok(())
            }
        }
    }

    pub fn deregister(&self, key: &TransactionKey) -> Option<Transaction> {
        let removed = self.transactions.write().remove(key);
        if removed.is_some() {
            trace!(key = %key, "Transaction deregistered");
        }
        removed
    }

    pub fn find(&self, key: &TransactionKey) -> Option<Transaction> {
        self.transactions.read().get(key).cloned()
    }

    /// Finds the transaction a response belongs to.
    ///
    /// The CSeq method must match the transaction's method, except that
    /// responses to a CANCEL go to the INVITE transaction that sent it.
    pub fn route(&self, response: &Response) -> Option<Transaction> {
        let key = match TransactionKey::from_response(response) {
            Ok(key) => key,
            Err(e) => {
                debug!(error = %e, "Response cannot be correlated");
                return None;
            }
        };
        let Some(transaction) = self.find(&key) else {
            debug!(key = %key, status = %response.status, "No transaction for response");
            return None;
        };
        let method = response.cseq()?.method;
        if method == transaction.method()
            || (method == Method::Cancel && transaction.kind().is_invite())
        {
            Some(transaction)
        } else {
            debug!(key = %key, method = %method, expected = %transaction.method(), "CSeq method mismatch");
            None
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }

    pub fn keys(&self) -> Vec<TransactionKey> {
        self.transactions.read().keys().cloned().collect()
    }
}
