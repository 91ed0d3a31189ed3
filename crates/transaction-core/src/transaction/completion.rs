use std::sync::Arc;

use tokio::sync::watch;

use sipua_sip_core::StatusCode;

use super::state::{TerminationReason, TransactionState};

/// Outcome delivered to whoever waits on a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Final status, when a final response arrived
    pub status: Option<StatusCode>,
    /// State at the moment the outcome was decided
    pub state: TransactionState,
}

/// Single-fire completion signal shared by async and blocking waiters
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tx: Arc<watch::Sender<Option<Completion>>>,
}

impl Default for CompletionSignal {
    fn default() -> Self {
        let (tx, _) = watch::channel(None);
        CompletionSignal { tx: Arc::new(tx) }
    }
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome. Only the first call has any effect.
    pub fn signal(&self, completion: Completion) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(completion);
            true
        })
    }

    pub fn get(&self) -> Option<Completion> {
        *self.tx.borrow()
    }

    pub fn is_signalled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub async fn wait(&self) -> Completion {
        let mut rx = self.tx.subscribe();
        let completion = match rx.wait_for(Option::is_some).await {
            Ok(completion) => *completion,
            Err(_) => None,
        };
        // The sender lives as long as `self`, so the channel cannot close here
        completion.unwrap_or(Completion {
            status: None,
            state: TransactionState::Terminated(TerminationReason::Aborted),
        })
    }

    /// Blocks the calling thread until the outcome is known.
    ///
    /// Must not be called from inside an async task.
    pub fn wait_blocking(&self) -> Completion {
        futures::executor::block_on(self.wait())
    }
}
