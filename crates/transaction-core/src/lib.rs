//! # SIP client transaction layer for the sipua stack
//!
//! This crate sends SIP requests reliably over reliable or unreliable
//! transports following RFC 3261 section 17.1: retransmission with
//! exponential backoff, CANCEL of unanswered INVITEs, ACK generation, and
//! correlation of responses with the transaction that caused them.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────┐  builders   ┌─────────────┐   start()   ┌──────────────┐
//!  │ DialogContext│────────────▶│   Request   │────────────▶│ Transaction  │
//!  └──────────────┘             └─────────────┘             └──────┬───────┘
//!         ▲                                                        │ write
//!         │ tags, route set, CSeq                                  ▼
//!  ┌──────┴───────┐   route()   ┌─────────────┐    read     ┌──────────────┐
//!  │ Transaction  │◀────────────│  Registry   │◀────────────│  Transport   │
//!  │ (response)   │             └─────────────┘             └──────────────┘
//!  └──────────────┘
//! ```
//!
//! - [`TransactionLayer`] owns the transport, resolver, registry and config
//!   and runs the receive loop
//! - [`Transaction`] is one client transaction and its two timers
//! - [`DialogContext`] carries Call-ID, tags, CSeq and route set across the
//!   transactions of a dialog
//! - [`builders`] produce requests of every supported kind
//! - [`TransactionOwner`] receives provisional and final responses and the
//!   end of the transaction
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sipua_sip_core::Uri;
//! use sipua_sip_transport::{DnsResolver, UdpTransport};
//! use sipua_transaction_core::prelude::*;
//! use sipua_transaction_core::{builders, dialog};
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(UdpTransport::bind("0.0.0.0:5060".parse()?).await?);
//! let (layer, _requests) =
//!     TransactionLayer::new(transport, Arc::new(DnsResolver::new()), TransactionConfig::default())?;
//! layer.spawn_receive_loop();
//!
//! let call = dialog::shared(DialogContext::new(
//!     Uri::sip("atlanta.com").with_user("alice"),
//!     Uri::sip("biloxi.com").with_user("bob"),
//! ));
//! let invite = builders::build_invite(layer.local_endpoint(), &mut call.write(), None);
//! let transaction = layer.create_client_transaction(invite, Some(call.clone()), Arc::new(NullOwner))?;
//! transaction.start().await?;
//!
//! let outcome = transaction.wait_for_completion().await;
//! println!("INVITE finished with {:?}", outcome.status);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod builders;
pub mod config;
pub mod dialog;
pub mod error;
pub mod layer;
pub mod owner;
pub mod registry;
pub mod transaction;

pub use auth::Authenticator;
pub use builders::LocalEndpoint;
pub use config::TransactionConfig;
pub use dialog::{DialogContext, SequenceCheck, SharedDialog};
pub use error::{Error, Result};
pub use layer::{LayerEvent, TransactionLayer, EVENT_CHANNEL_CAPACITY};
pub use owner::{NullOwner, TransactionOwner};
pub use registry::TransactionRegistry;
pub use transaction::{
    Completion, TerminationReason, Transaction, TransactionKey, TransactionKind,
    TransactionState,
};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        Authenticator, Completion, DialogContext, Error, LayerEvent, LocalEndpoint, NullOwner,
        Result, TerminationReason, Transaction, TransactionConfig, TransactionKey,
        TransactionKind, TransactionLayer, TransactionOwner, TransactionRegistry,
        TransactionState,
    };
}
