//! Shared fixtures: a transaction layer wired to a scripted peer over an
//! in-memory transport pair.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use sipua_sip_core::{HeaderName, Message, Method, Request, Response, StatusCode, Uri};
use sipua_sip_transport::{MemoryTransport, Resolver, StaticResolver, Transport};
use sipua_transaction_core::dialog::{self, SharedDialog};
use sipua_transaction_core::prelude::*;

pub const CLIENT_ADDR: &str = "127.0.0.1:5060";
pub const PEER_ADDR: &str = "127.0.0.1:5070";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub layer: TransactionLayer,
    pub events: mpsc::Receiver<LayerEvent>,
    /// Our end of the pair, for inspecting what was written
    pub client: MemoryTransport,
    /// The scripted remote party
    pub peer: MemoryTransport,
}

impl Harness {
    pub fn new(config: TransactionConfig) -> Self {
        Self::build(config, false, Arc::new(StaticResolver::new()), |layer| layer)
    }

    /// Our end behaves like a stream transport
    pub fn with_reliable_client(config: TransactionConfig) -> Self {
        Self::build(config, true, Arc::new(StaticResolver::new()), |layer| layer)
    }

    /// Resolves next hops through `resolver` instead of IP literals only
    pub fn with_resolver(config: TransactionConfig, resolver: Arc<dyn Resolver>) -> Self {
        Self::build(config, false, resolver, |layer| layer)
    }

    /// Lets the test customize the layer before its receive loop starts
    pub fn with_layer(
        config: TransactionConfig,
        customize: impl FnOnce(TransactionLayer) -> TransactionLayer,
    ) -> Self {
        Self::build(config, false, Arc::new(StaticResolver::new()), customize)
    }

    fn build(
        config: TransactionConfig,
        reliable: bool,
        resolver: Arc<dyn Resolver>,
        customize: impl FnOnce(TransactionLayer) -> TransactionLayer,
    ) -> Self {
        init_tracing();
        let (client, peer) =
            MemoryTransport::pair(CLIENT_ADDR.parse().unwrap(), PEER_ADDR.parse().unwrap());
        let client = client.with_reliable(reliable);
        let (layer, events) =
            TransactionLayer::new(Arc::new(client.clone()), resolver, config).unwrap();
        let layer = customize(layer);
        layer.spawn_receive_loop();
        Harness {
            layer,
            events,
            client,
            peer,
        }
    }

    /// Alice calling Bob at the peer address
    pub fn dialog(&self) -> SharedDialog {
        dialog::shared(DialogContext::new(
            Uri::sip("atlanta.com").with_user("alice"),
            Uri::sip("127.0.0.1").with_user("bob").with_port(5070),
        ))
    }

    /// Next message the peer receives
    pub async fn peer_receive(&self) -> Message {
        let (data, _) = self.peer.read().await.unwrap();
        Message::parse_datagram(&data).unwrap().unwrap()
    }

    pub async fn peer_receive_request(&self) -> Request {
        match self.peer_receive().await {
            Message::Request(request) => request,
            Message::Response(response) => panic!("expected a request, got {}", response.status),
        }
    }

    /// Answers `request` from the peer, see [`reply_to`]
    pub async fn peer_reply(&self, request: &Request, status: StatusCode, to_tag: Option<&str>) -> Response {
        let response = reply_to(request, status, to_tag);
        self.peer_send(&response).await;
        response
    }

    pub async fn peer_send(&self, response: &Response) {
        self.peer
            .write(&response.to_bytes(), self.peer.peer_address())
            .await
            .unwrap();
    }

    /// Method of every message the client wrote, in order
    pub fn sent_methods(&self) -> Vec<String> {
        self.client
            .sent_text()
            .iter()
            .map(|text| text.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerEvent {
    Provisional(u16),
    Final(u16),
    Terminated(TerminationReason),
}

/// Owner that records every callback
#[derive(Debug, Default)]
pub struct RecordingOwner {
    events: Mutex<Vec<OwnerEvent>>,
}

impl RecordingOwner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<OwnerEvent> {
        self.events.lock().clone()
    }

    pub fn finals(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, OwnerEvent::Final(_)))
            .count()
    }
}

impl TransactionOwner for RecordingOwner {
    fn on_provisional(&self, _transaction: &Transaction, response: &Response) {
        self.events.lock().push(OwnerEvent::Provisional(response.status.as_u16()));
    }

    fn on_final(&self, _transaction: &Transaction, response: &Response) {
        self.events.lock().push(OwnerEvent::Final(response.status.as_u16()));
    }

    fn on_terminated(&self, _transaction: &Transaction, reason: TerminationReason) {
        self.events.lock().push(OwnerEvent::Terminated(reason));
    }
}

/// Checks that a state history only moves forward
pub fn assert_monotonic(history: &[TransactionState]) {
    for pair in history.windows(2) {
        assert!(
            pair[0].rank() < pair[1].rank(),
            "history went backwards: {:?}",
            history
        );
    }
}

/// Response to `request` with a To tag and, for a 2xx to INVITE, a Contact
/// at the peer address
pub fn reply_to(request: &Request, status: StatusCode, to_tag: Option<&str>) -> Response {
    let mut response = Response::build_to(request, status);
    if let Some(tag) = to_tag {
        let mut to = response.to_uri().unwrap();
        to.set_tag(tag);
        response.headers.set(HeaderName::To, to.as_quoted_display_string());
    }
    if status.is_success() && request.method == Method::Invite {
        response.headers.set(HeaderName::Contact, "<sip:bob@127.0.0.1:5070>");
    }
    response
}

pub fn peer_addr() -> SocketAddr {
    PEER_ADDR.parse().unwrap()
}
