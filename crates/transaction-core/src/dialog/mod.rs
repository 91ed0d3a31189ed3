//! Dialog state threaded through consecutive transactions
//!
//! A [`DialogContext`] is owned by the call leg (or registration, or
//! subscription) and shared with every transaction it starts as
//! `Arc<RwLock<DialogContext>>`. Transactions update it under their own lock,
//! always taking the transaction lock first and the dialog lock second.

mod context;

pub use context::{DialogContext, SequenceCheck};

use std::sync::Arc;

use parking_lot::RwLock;

/// Dialog context as shared between a call leg and its transactions
pub type SharedDialog = Arc<RwLock<DialogContext>>;

pub fn shared(context: DialogContext) -> SharedDialog {
    Arc::new(RwLock::new(context))
}
