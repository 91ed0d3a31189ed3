use std::net::SocketAddr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use sipua_sip_core::{Request, Response, Uri, UriContext};

use crate::error::{Error, Result};

/// Result of checking the CSeq of a request received inside a dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Exactly the next number, or the first request seen
    InOrder,
    /// Higher than expected; accepted, but something was missed
    Gap { expected: u32, received: u32 },
    /// Not above the last number seen; must not be processed again
    Duplicate,
}

/// Identity, sequencing and routing state shared by all transactions of
/// one dialog (RFC 3261 12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogContext {
    pub call_id: String,

    /// Our address of record, without tag
    pub local_uri: Uri,
    pub local_tag: String,

    /// The peer's address of record, without tag
    pub remote_uri: Uri,
    pub remote_tag: Option<String>,

    /// Request-URI for requests inside the dialog
    pub remote_target: Uri,

    /// Route set, in the order requests must traverse it
    pub route_set: Vec<Uri>,

    /// CSeq number of the last request we sent
    pub local_seq: u32,

    /// CSeq number of the last request we received
    pub remote_seq: Option<u32>,

    /// While set, new requests reuse the current CSeq number
    pub forking: bool,

    /// Where the peer's messages actually came from
    pub remote_transport_address: Option<SocketAddr>,

    /// Our Contact, if it differs from the layer default
    pub local_contact: Option<Uri>,
}

impl DialogContext {
    /// Starts a dialog from local parameters (UAC side).
    ///
    /// Picks a fresh Call-ID and local tag and a random initial CSeq below
    /// 2^31 (RFC 3261 8.1.1.5).
    pub fn new(local_uri: Uri, remote_uri: Uri) -> Self {
        let call_id = format!("{}@{}", Uuid::new_v4().simple(), local_uri.host);
        let local_seq = rand::thread_rng().gen_range(1..0x8000_0000u32);
        let remote_target = remote_uri.sanitized(UriContext::RequestTarget);
        DialogContext {
            call_id,
            local_uri: strip_tag(local_uri.sanitized(UriContext::From)),
            local_tag: Uri::generate_tag(),
            remote_uri: strip_tag(remote_uri.sanitized(UriContext::To)),
            remote_tag: None,
            remote_target,
            route_set: Vec::new(),
            local_seq,
            remote_seq: None,
            forking: false,
            remote_transport_address: None,
            local_contact: None,
        }
    }

    /// Uses a pre-loaded route set, e.g. an outbound proxy
    pub fn with_route_set(mut self, route_set: Vec<Uri>) -> Self {
        self.route_set = route_set;
        self
    }

    pub fn with_local_contact(mut self, contact: Uri) -> Self {
        self.local_contact = Some(contact);
        self
    }

    /// Builds the context for a request we are about to send or already
    /// built without one.
    pub fn from_outgoing_request(request: &Request) -> Result<Self> {
        let from = request.from_uri().ok_or(Error::MissingHeader("From"))?;
        let to = request.to_uri().ok_or(Error::MissingHeader("To"))?;
        let call_id = request.call_id().ok_or(Error::MissingHeader("Call-ID"))?;
        let cseq = request.cseq().ok_or(Error::MissingHeader("CSeq"))?;
        Ok(DialogContext {
            call_id: call_id.to_string(),
            local_tag: from.tag().map(str::to_string).unwrap_or_else(Uri::generate_tag),
            local_uri: strip_tag(from),
            remote_tag: to.tag().map(str::to_string),
            remote_uri: strip_tag(to),
            remote_target: request.uri.clone(),
            route_set: request.headers.route_set(),
            local_seq: cseq.seq,
            remote_seq: None,
            forking: false,
            remote_transport_address: None,
            local_contact: request.headers.contact_uri(),
        })
    }

    /// Builds the context from a received dialog-creating request (UAS side)
    pub fn from_request(request: &Request, source: Option<SocketAddr>) -> Result<Self> {
        let from = request.from_uri().ok_or(Error::MissingHeader("From"))?;
        let to = request.to_uri().ok_or(Error::MissingHeader("To"))?;
        let call_id = request.call_id().ok_or(Error::MissingHeader("Call-ID"))?;
        let cseq = request.cseq().ok_or(Error::MissingHeader("CSeq"))?;
        let remote_target = request
            .headers
            .contact_uri()
            .unwrap_or_else(|| from.clone())
            .sanitized(UriContext::RequestTarget);

        Ok(DialogContext {
            call_id: call_id.to_string(),
            local_tag: to.tag().map(str::to_string).unwrap_or_else(Uri::generate_tag),
            local_uri: strip_tag(to),
            remote_tag: from.tag().map(str::to_string),
            remote_uri: strip_tag(from),
            remote_target,
            // UAS keeps Record-Route in received order (RFC 3261 12.1.1)
            route_set: request.headers.record_route_set(),
            local_seq: rand::thread_rng().gen_range(1..0x8000_0000u32),
            remote_seq: Some(cseq.seq),
            forking: false,
            remote_transport_address: source,
            local_contact: None,
        })
    }

    /// CSeq number for the next request we send
    pub fn next_local_seq(&mut self) -> u32 {
        if !self.forking {
            self.local_seq = self.local_seq.wrapping_add(1);
        }
        self.local_seq
    }

    /// Validates and records the CSeq of a received in-dialog request
    pub fn check_remote_sequence(&mut self, seq: u32) -> SequenceCheck {
        let Some(last) = self.remote_seq else {
            self.remote_seq = Some(seq);
            return SequenceCheck::InOrder;
        };
        if seq <= last {
            debug!(call_id = %self.call_id, seq, last, "Duplicate in-dialog request");
            return SequenceCheck::Duplicate;
        }
        self.remote_seq = Some(seq);
        let expected = last.wrapping_add(1);
        if seq == expected {
            SequenceCheck::InOrder
        } else {
            warn!(call_id = %self.call_id, expected, received = seq, "CSeq gap in dialog");
            SequenceCheck::Gap { expected, received: seq }
        }
    }

    /// Records the peer's tag. A tag that changes once known is logged.
    pub fn set_remote_tag(&mut self, tag: &str) {
        match &self.remote_tag {
            Some(current) if current == tag => {}
            Some(current) => {
                warn!(call_id = %self.call_id, old = %current, new = %tag, "Remote tag changed");
                self.remote_tag = Some(tag.to_string());
            }
            None => self.remote_tag = Some(tag.to_string()),
        }
    }

    /// Applies a response received inside or establishing this dialog.
    ///
    /// Any response with a To tag sets the remote tag. A 2xx also sets the
    /// route set from the reversed Record-Route and the remote target from
    /// the Contact (RFC 3261 12.1.2).
    pub fn update_from_response(&mut self, response: &Response) {
        if let Some(tag) = response.to_tag() {
            self.set_remote_tag(&tag);
        }
        if !response.status.is_success() {
            return;
        }

        let mut route_set = response.headers.record_route_set();
        route_set.reverse();
        self.route_set = route_set;
        if let Some(contact) = response.headers.contact_uri() {
            self.remote_target = contact.sanitized(UriContext::RequestTarget);
        }
    }

    /// From header value for requests we send
    pub fn local_party(&self) -> Uri {
        self.local_uri
            .sanitized(UriContext::From)
            .with_tag(self.local_tag.clone())
    }

    /// To header value for requests we send
    pub fn remote_party(&self) -> Uri {
        let uri = self.remote_uri.sanitized(UriContext::To);
        match &self.remote_tag {
            Some(tag) => uri.with_tag(tag.clone()),
            None => uri,
        }
    }

    /// Whether both tags are known
    pub fn is_established(&self) -> bool {
        self.remote_tag.is_some()
    }
}

fn strip_tag(mut uri: Uri) -> Uri {
    uri.field_params.remove("tag");
    uri
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipua_sip_core::{HeaderName, Method, StatusCode};

    fn context() -> DialogContext {
        DialogContext::new(
            Uri::sip("atlanta.com").with_user("alice"),
            Uri::sip("biloxi.com").with_user("bob"),
        )
    }

    #[test]
    fn test_new_context() {
        let dialog = context();
        assert!(dialog.call_id.ends_with("@atlanta.com"));
        assert_eq!(dialog.local_tag.len(), 32);
        assert!(dialog.local_seq < 0x8000_0000);
        assert!(!dialog.is_established());
        assert_eq!(dialog.local_party().tag(), Some(dialog.local_tag.as_str()));
        assert_eq!(dialog.remote_party().tag(), None);
    }

    #[test]
    fn test_forking_holds_sequence() {
        let mut dialog = context();
        let first = dialog.next_local_seq();
        assert_eq!(dialog.next_local_seq(), first + 1);
        dialog.forking = true;
        assert_eq!(dialog.next_local_seq(), first + 1);
        dialog.forking = false;
        assert_eq!(dialog.next_local_seq(), first + 2);
    }

    #[test]
    fn test_remote_sequence_checks() {
        let mut dialog = context();
        assert_eq!(dialog.check_remote_sequence(10), SequenceCheck::InOrder);
        assert_eq!(dialog.check_remote_sequence(11), SequenceCheck::InOrder);
        assert_eq!(dialog.check_remote_sequence(11), SequenceCheck::Duplicate);
        assert_eq!(dialog.check_remote_sequence(5), SequenceCheck::Duplicate);
        assert_eq!(
            dialog.check_remote_sequence(14),
            SequenceCheck::Gap { expected: 12, received: 14 }
        );
        assert_eq!(dialog.remote_seq, Some(14));
    }

    #[test]
    fn test_update_from_2xx() {
        let mut dialog = context();
        let response = sipua_sip_core::Response::new(StatusCode::OK)
            .with_header(HeaderName::To, "<sip:bob@biloxi.com>;tag=a6c85cf")
            .with_header(HeaderName::RecordRoute, "<sip:p1.example.com;lr>, <sip:p2.example.com;lr>")
            .with_header(HeaderName::Contact, "<sip:bob@192.0.2.4>");
        dialog.update_from_response(&response);

        assert_eq!(dialog.remote_tag.as_deref(), Some("a6c85cf"));
        assert_eq!(dialog.route_set.len(), 2);
        assert_eq!(dialog.route_set[0].host.as_str(), "p2.example.com");
        assert_eq!(dialog.remote_target.as_canonical_string(), "sip:bob@192.0.2.4");
        assert!(dialog.is_established());
    }

    #[test]
    fn test_provisional_only_sets_tag() {
        let mut dialog = context();
        let target = dialog.remote_target.clone();
        let ringing = sipua_sip_core::Response::new(StatusCode::RINGING)
            .with_header(HeaderName::To, "<sip:bob@biloxi.com>;tag=early")
            .with_header(HeaderName::Contact, "<sip:bob@192.0.2.4>");
        dialog.update_from_response(&ringing);
        assert_eq!(dialog.remote_tag.as_deref(), Some("early"));
        assert_eq!(dialog.remote_target, target);

        dialog.set_remote_tag("other");
        assert_eq!(dialog.remote_tag.as_deref(), Some("other"));
    }

    #[test]
    fn test_from_received_request() {
        let request = Request::new(Method::Invite, Uri::sip("biloxi.com").with_user("bob"))
            .with_header(HeaderName::From, "<sip:alice@atlanta.com>;tag=1928301774")
            .with_header(HeaderName::To, "<sip:bob@biloxi.com>")
            .with_header(HeaderName::CallId, "a84b4c76e66710")
            .with_header(HeaderName::CSeq, "314159 INVITE")
            .with_header(HeaderName::Contact, "<sip:alice@pc33.atlanta.com>")
            .with_header(HeaderName::RecordRoute, "<sip:p1.example.com;lr>, <sip:p2.example.com;lr>");

        let dialog = DialogContext::from_request(&request, None).unwrap();
        assert_eq!(dialog.call_id, "a84b4c76e66710");
        assert_eq!(dialog.remote_tag.as_deref(), Some("1928301774"));
        assert_eq!(dialog.remote_seq, Some(314159));
        assert_eq!(dialog.remote_target.host.as_str(), "pc33.atlanta.com");
        assert_eq!(dialog.route_set[0].host.as_str(), "p1.example.com");
        assert_eq!(dialog.remote_party().tag(), Some("1928301774"));
    }
}
