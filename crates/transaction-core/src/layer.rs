//! The transaction layer: transport, resolver, registry and configuration
//! bundled behind one handle.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sipua_sip_core::Uri;
//! use sipua_sip_transport::{DnsResolver, UdpTransport};
//! use sipua_transaction_core::prelude::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(UdpTransport::bind("0.0.0.0:5060".parse()?).await?);
//! let (layer, mut requests) =
//!     TransactionLayer::new(transport, Arc::new(DnsResolver::new()), TransactionConfig::default())?;
//! layer.spawn_receive_loop();
//!
//! let ping = layer
//!     .ping(&Uri::sip("atlanta.com").with_user("alice"), &Uri::sip("biloxi.com"), Arc::new(NullOwner))
//!     .await?;
//! let outcome = ping.wait_for_completion().await;
//! println!("biloxi.com answered {:?}", outcome.status);
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use sipua_sip_core::{Message, Request, Response, StatusCode, Uri};
use sipua_sip_transport::{Error as TransportError, Resolver, Transport};

use crate::auth::Authenticator;
use crate::builders::{self, LocalEndpoint};
use crate::config::TransactionConfig;
use crate::dialog::SharedDialog;
use crate::error::Result;
use crate::owner::TransactionOwner;
use crate::registry::TransactionRegistry;
use crate::transaction::{Environment, Transaction, TransactionKind};

/// Undelivered [`LayerEvent`]s held before incoming requests are dropped
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// What the layer reports to its user besides transaction callbacks
#[derive(Debug)]
pub enum LayerEvent {
    /// A request arrived; server transactions are the caller's business
    IncomingRequest { request: Request, source: SocketAddr },
    /// The transport was closed and the receive loop stopped
    TransportClosed,
}

/// Entry point for sending requests as client transactions
#[derive(Clone)]
pub struct TransactionLayer {
    env: Environment,
    events_tx: mpsc::Sender<LayerEvent>,
    receive_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TransactionLayer {
    /// Creates a layer over `transport` with its own registry.
    ///
    /// Returns the layer and the receiver for [`LayerEvent`]s.
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn Resolver>,
        config: TransactionConfig,
    ) -> Result<(Self, mpsc::Receiver<LayerEvent>)> {
        config.validate()?;
        let local = transport.local_address()?;
        let via_transport = if transport.is_reliable() { "TCP" } else { "UDP" };
        let endpoint = LocalEndpoint::new(via_transport, local).with_config(&config);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let layer = TransactionLayer {
            env: Environment {
                config: Arc::new(config),
                transport,
                resolver,
                registry: Arc::new(TransactionRegistry::new()),
                authenticator: None,
                endpoint,
            },
            events_tx,
            receive_task: Arc::new(Mutex::new(None)),
        };
        Ok((layer, events_rx))
    }

    /// Shares `registry` instead of the layer's own, e.g. [`TransactionRegistry::global`]
    pub fn with_registry(mut self, registry: Arc<TransactionRegistry>) -> Self {
        self.env.registry = registry;
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.env.authenticator = Some(authenticator);
        self
    }

    pub fn with_local_endpoint(mut self, endpoint: LocalEndpoint) -> Self {
        self.env.endpoint = endpoint;
        self
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.env.config
    }

    pub fn registry(&self) -> &Arc<TransactionRegistry> {
        &self.env.registry
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.env.transport
    }

    /// Identity used by the request builders
    pub fn local_endpoint(&self) -> &LocalEndpoint {
        &self.env.endpoint
    }

    /// Creates a client transaction for `request`; call
    /// [`Transaction::start`] to send it.
    pub fn create_client_transaction(
        &self,
        request: Request,
        dialog: Option<SharedDialog>,
        owner: Arc<dyn TransactionOwner>,
    ) -> Result<Transaction> {
        let kind = TransactionKind::from_method(&request.method)?;
        self.create_client_transaction_of(kind, request, dialog, owner)
    }

    pub fn create_client_transaction_of(
        &self,
        kind: TransactionKind,
        request: Request,
        dialog: Option<SharedDialog>,
        owner: Arc<dyn TransactionOwner>,
    ) -> Result<Transaction> {
        Transaction::new(kind, request, self.env.clone(), dialog, owner)
    }

    /// Sends an out-of-dialog OPTIONS to `target` and returns the started
    /// transaction
    pub async fn ping(
        &self,
        local: &Uri,
        target: &Uri,
        owner: Arc<dyn TransactionOwner>,
    ) -> Result<Transaction> {
        let request = builders::build_ping(&self.env.endpoint, local, target);
        let transaction = self.create_client_transaction_of(TransactionKind::Ping, request, None, owner)?;
        transaction.start().await?;
        Ok(transaction)
    }

    /// Starts reading from the transport.
    ///
    /// Responses are routed to their transactions and requests are passed on
    /// as [`LayerEvent::IncomingRequest`]. The loop ends when the transport
    /// closes.
    pub fn spawn_receive_loop(&self) {
        let layer = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                match layer.env.transport.read().await {
                    Ok((data, source)) => layer.handle_datagram(&data, source),
                    Err(TransportError::TransportClosed) => {
                        info!("Transport closed, receive loop stopping");
                        if layer.events_tx.try_send(LayerEvent::TransportClosed).is_err() {
                            warn!("Transport close not delivered, event channel full or closed");
                        }
                        break;
                    }
                    Err(TransportError::MessageTooLarge { size, max }) => {
                        warn!(size, max, "Oversized message dropped");
                    }
                    Err(e) => {
                        error!(error = %e, "Error receiving message");
                    }
                }
            }
        });
        if let Some(previous) = self.receive_task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Processes one received datagram.
    ///
    /// Never waits: ACKs are written from their own task and a request that
    /// finds the event channel full is dropped.
    pub fn handle_datagram(&self, data: &[u8], source: SocketAddr) {
        match Message::parse_datagram(data) {
            Ok(None) => trace!(source = %source, "Keep-alive received"),
            Ok(Some(Message::Response(response))) => {
                trace!(message = %response, "Received");
                match self.env.registry.route(&response) {
                    Some(transaction) => transaction.dispatch_response(response, source),
                    None => debug!(source = %source, status = %response.status, "Unmatched response dropped"),
                }
            }
            Ok(Some(Message::Request(request))) => {
                debug!(source = %source, method = %request.method, "Request received");
                let event = LayerEvent::IncomingRequest { request, source };
                match self.events_tx.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(source = %source, "Event channel full, request dropped")
                    }
                    Err(TrySendError::Closed(_)) => debug!("No listener for incoming requests"),
                }
            }
            Err(e) => warn!(source = %source, error = %e, "Unparsable message dropped"),
        }
    }

    /// Answers a received request statelessly
    pub async fn send_response(
        &self,
        request: &Request,
        status: StatusCode,
        destination: SocketAddr,
    ) -> Result<()> {
        let response = Response::build_to(request, status);
        let bytes = response.to_bytes_with(self.env.config.compact_headers);
        debug!(status = %status, destination = %destination, "Sending response");
        self.env.transport.write(&bytes, destination).await?;
        Ok(())
    }

    /// Stops the receive loop and closes the transport
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(handle) = self.receive_task.lock().take() {
            handle.abort();
        }
        self.env.transport.close().await?;
        info!("Transaction layer shut down");
        Ok(())
    }
}
