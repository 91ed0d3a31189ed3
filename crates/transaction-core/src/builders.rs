//! Request builders
//!
//! One function per request kind. Each takes the local endpoint and the
//! dialog context, allocates the CSeq number from the dialog and fills the
//! headers every request needs (RFC 3261 8.1.1):
//!
//! - Via with a fresh branch and `rport`
//! - Max-Forwards, From/To with tags, Call-ID, CSeq
//! - the dialog route set as Route
//! - Contact for methods that create or refresh a dialog or binding
//! - User-Agent and Date
//!
//! CANCEL and both kinds of ACK are derived from the INVITE they belong to.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;

use sipua_sip_core::{
    CSeq, HeaderName, Host, Method, Request, Response, Scheme, SessionDescription, Uri,
    UriContext, Via,
};

use crate::config::TransactionConfig;
use crate::dialog::DialogContext;
use crate::error::{Error, Result};
use crate::transaction::key::generate_branch;

/// How this endpoint identifies itself in the requests it sends
#[derive(Debug, Clone)]
pub struct LocalEndpoint {
    /// Via transport token (`UDP`, `TCP`, ...)
    pub transport: String,
    pub sent_by_host: Host,
    pub sent_by_port: Option<u16>,
    /// Default Contact for requests that need one
    pub contact: Uri,
    pub user_agent: String,
    pub max_forwards: u8,
}

impl LocalEndpoint {
    pub fn new(transport: impl Into<String>, address: SocketAddr) -> Self {
        let host = Host::from(address.ip());
        let contact = Uri::new(Scheme::Sip, host.clone()).with_port(address.port());
        let config = TransactionConfig::default();
        LocalEndpoint {
            transport: transport.into(),
            sent_by_host: host,
            sent_by_port: Some(address.port()),
            contact,
            user_agent: config.user_agent,
            max_forwards: config.max_forwards,
        }
    }

    pub fn with_config(mut self, config: &TransactionConfig) -> Self {
        self.user_agent = config.user_agent.clone();
        self.max_forwards = config.max_forwards;
        self
    }

    pub fn with_contact(mut self, contact: Uri) -> Self {
        self.contact = contact;
        self
    }

    /// A top Via with a new branch
    pub fn via(&self) -> Via {
        Via::new(self.transport.clone(), self.sent_by_host.clone(), self.sent_by_port)
            .with_branch(generate_branch())
            .with_rport()
    }
}

/// Current time in the RFC 1123 form used by the Date header
fn sip_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn request_in_dialog(
    method: Method,
    endpoint: &LocalEndpoint,
    dialog: &DialogContext,
    seq: u32,
) -> Request {
    let target = dialog.remote_target.sanitized(UriContext::RequestTarget);
    let mut request = Request::new(method.clone(), target)
        .with_header(HeaderName::Via, endpoint.via().to_string())
        .with_header(HeaderName::MaxForwards, endpoint.max_forwards.to_string())
        .with_header(HeaderName::From, dialog.local_party().as_quoted_display_string())
        .with_header(HeaderName::To, dialog.remote_party().as_quoted_display_string())
        .with_header(HeaderName::CallId, dialog.call_id.clone())
        .with_header(HeaderName::CSeq, CSeq::new(seq, method).to_string());
    for route in &dialog.route_set {
        request.headers.add(
            HeaderName::Route,
            route.sanitized(UriContext::Route).as_quoted_display_string(),
        );
    }
    request
        .headers
        .set(HeaderName::UserAgent, endpoint.user_agent.clone());
    request.headers.set(HeaderName::Date, sip_date());
    request
}

fn next_request(method: Method, endpoint: &LocalEndpoint, dialog: &mut DialogContext) -> Request {
    let seq = dialog.next_local_seq();
    request_in_dialog(method, endpoint, dialog, seq)
}

fn set_contact(request: &mut Request, endpoint: &LocalEndpoint, dialog: &DialogContext) {
    let contact = dialog
        .local_contact
        .clone()
        .unwrap_or_else(|| endpoint.contact.clone())
        .sanitized(UriContext::Contact);
    request
        .headers
        .set(HeaderName::Contact, contact.as_quoted_display_string());
}

fn attach(request: &mut Request, body: Option<Arc<dyn SessionDescription>>) {
    if let Some(body) = body {
        request.attach_body(body);
    }
}

pub fn build_invite(
    endpoint: &LocalEndpoint,
    dialog: &mut DialogContext,
    offer: Option<Arc<dyn SessionDescription>>,
) -> Request {
    let mut request = next_request(Method::Invite, endpoint, dialog);
    set_contact(&mut request, endpoint, dialog);
    attach(&mut request, offer);
    request
}

pub fn build_bye(endpoint: &LocalEndpoint, dialog: &mut DialogContext) -> Request {
    next_request(Method::Bye, endpoint, dialog)
}

/// REGISTER for the address of record held as the dialog's local URI.
///
/// The dialog carries Call-ID and CSeq across refreshes; `registrar` is the
/// Request-URI. An `expires` of 0 removes the binding.
pub fn build_register(
    endpoint: &LocalEndpoint,
    dialog: &mut DialogContext,
    registrar: &Uri,
    expires: u32,
) -> Request {
    let mut request = next_request(Method::Register, endpoint, dialog);
    request.uri = registrar.sanitized(UriContext::RegistrationTarget);
    let aor = dialog.local_uri.sanitized(UriContext::To);
    request
        .headers
        .set(HeaderName::To, aor.as_quoted_display_string());
    let contact = dialog
        .local_contact
        .clone()
        .unwrap_or_else(|| endpoint.contact.clone())
        .sanitized(UriContext::RegistrationContact);
    request
        .headers
        .set(HeaderName::Contact, contact.as_quoted_display_string());
    request.headers.set(HeaderName::Expires, expires.to_string());
    request
}

pub fn build_subscribe(
    endpoint: &LocalEndpoint,
    dialog: &mut DialogContext,
    event: &str,
    expires: u32,
) -> Request {
    let mut request = next_request(Method::Subscribe, endpoint, dialog);
    set_contact(&mut request, endpoint, dialog);
    request.headers.set(HeaderName::Event, event);
    request.headers.set(HeaderName::Expires, expires.to_string());
    request
}

/// NOTIFY inside a subscription dialog (RFC 6665)
pub fn build_notify(
    endpoint: &LocalEndpoint,
    dialog: &mut DialogContext,
    event: &str,
    subscription_state: &str,
    body: Option<Arc<dyn SessionDescription>>,
) -> Request {
    let mut request = next_request(Method::Notify, endpoint, dialog);
    set_contact(&mut request, endpoint, dialog);
    request.headers.set(HeaderName::Event, event);
    request
        .headers
        .set(HeaderName::SubscriptionState, subscription_state);
    attach(&mut request, body);
    request
}

/// PUBLISH of event state (RFC 3903); `etag` refreshes an earlier publication
pub fn build_publish(
    endpoint: &LocalEndpoint,
    dialog: &mut DialogContext,
    event: &str,
    expires: u32,
    etag: Option<&str>,
    body: Option<Arc<dyn SessionDescription>>,
) -> Request {
    let mut request = next_request(Method::Publish, endpoint, dialog);
    request.headers.set(HeaderName::Event, event);
    request.headers.set(HeaderName::Expires, expires.to_string());
    if let Some(etag) = etag {
        request.headers.set("SIP-If-Match", etag);
    }
    attach(&mut request, body);
    request
}

pub fn build_refer(endpoint: &LocalEndpoint, dialog: &mut DialogContext, refer_to: &Uri) -> Request {
    let mut request = next_request(Method::Refer, endpoint, dialog);
    set_contact(&mut request, endpoint, dialog);
    request.headers.set(
        HeaderName::ReferTo,
        refer_to.sanitized(UriContext::Redirect).as_quoted_display_string(),
    );
    request.headers.set(
        HeaderName::ReferredBy,
        dialog.local_uri.sanitized(UriContext::From).as_quoted_display_string(),
    );
    request
}

pub fn build_message(
    endpoint: &LocalEndpoint,
    dialog: &mut DialogContext,
    body: Arc<dyn SessionDescription>,
) -> Request {
    let mut request = next_request(Method::Message, endpoint, dialog);
    request.attach_body(body);
    request
}

pub fn build_options(endpoint: &LocalEndpoint, dialog: &mut DialogContext) -> Request {
    let mut request = next_request(Method::Options, endpoint, dialog);
    request
        .headers
        .set(HeaderName::Accept, "application/sdp");
    request
}

pub fn build_info(
    endpoint: &LocalEndpoint,
    dialog: &mut DialogContext,
    body: Option<Arc<dyn SessionDescription>>,
) -> Request {
    let mut request = next_request(Method::Info, endpoint, dialog);
    attach(&mut request, body);
    request
}

/// Out-of-dialog OPTIONS probing whether `target` is reachable
pub fn build_ping(endpoint: &LocalEndpoint, local: &Uri, target: &Uri) -> Request {
    let mut dialog = DialogContext::new(local.clone(), target.clone());
    build_options(endpoint, &mut dialog)
}

/// CANCEL for a pending INVITE (RFC 3261 9.1).
///
/// Same Request-URI, Call-ID, From, To, Route and CSeq number as the INVITE,
/// and only its top Via so the CANCEL shares the INVITE's branch.
pub fn build_cancel(invite: &Request) -> Result<Request> {
    let via = invite.top_via().ok_or(Error::MissingHeader("Via"))?;
    let cseq = invite.cseq().ok_or(Error::MissingHeader("CSeq"))?;

    let mut cancel = Request::new(Method::Cancel, invite.uri.clone())
        .with_header(HeaderName::Via, via.to_string());
    for name in [HeaderName::From, HeaderName::To, HeaderName::CallId] {
        cancel.headers.copy_from(&invite.headers, name);
    }
    cancel
        .headers
        .set(HeaderName::CSeq, CSeq::new(cseq.seq, Method::Cancel).to_string());
    cancel.headers.copy_from(&invite.headers, HeaderName::Route);
    cancel.headers.copy_from(&invite.headers, HeaderName::MaxForwards);
    cancel.headers.copy_from(&invite.headers, HeaderName::UserAgent);
    Ok(cancel)
}

/// ACK for a non-2xx final response (RFC 3261 17.1.1.3).
///
/// Built from the original INVITE so that it stays inside the INVITE
/// transaction: same top Via and branch, Request-URI, From, Call-ID, Route
/// and CSeq number, with the To header of the response.
pub fn build_ack_for_non_2xx(invite: &Request, response: &Response) -> Result<Request> {
    let via = invite.top_via().ok_or(Error::MissingHeader("Via"))?;
    let cseq = invite.cseq().ok_or(Error::MissingHeader("CSeq"))?;
    let to = response.headers.get(HeaderName::To).ok_or(Error::MissingHeader("To"))?;

    let mut ack = Request::new(Method::Ack, invite.uri.clone())
        .with_header(HeaderName::Via, via.to_string());
    ack.headers.copy_from(&invite.headers, HeaderName::MaxForwards);
    ack.headers.copy_from(&invite.headers, HeaderName::From);
    ack.headers.set(HeaderName::To, to);
    ack.headers.copy_from(&invite.headers, HeaderName::CallId);
    ack.headers
        .set(HeaderName::CSeq, CSeq::new(cseq.seq, Method::Ack).to_string());
    ack.headers.copy_from(&invite.headers, HeaderName::Route);
    ack.headers.copy_from(&invite.headers, HeaderName::UserAgent);
    Ok(ack)
}

/// ACK for a 2xx response: an ordinary in-dialog request with a new branch
/// and the CSeq number of the INVITE (RFC 3261 13.2.2.4).
pub fn build_ack_for_2xx(endpoint: &LocalEndpoint, dialog: &DialogContext, invite_seq: u32) -> Request {
    let mut ack = request_in_dialog(Method::Ack, endpoint, dialog, invite_seq);
    ack.headers.remove(HeaderName::Date);
    ack
}
