use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::types::body::SessionDescription;
use crate::types::cseq::CSeq;
use crate::types::headers::{HeaderCollection, HeaderName};
use crate::types::sip_request::{extract_body, serialize, Request};
use crate::types::status::StatusCode;
use crate::types::uri::Uri;
use crate::types::version::Version;
use crate::types::via::Via;

/// Headers a response always inherits from the request it answers
const COPIED_FROM_REQUEST: [HeaderName; 6] = [
    HeaderName::Via,
    HeaderName::From,
    HeaderName::To,
    HeaderName::CallId,
    HeaderName::CSeq,
    HeaderName::RecordRoute,
];

/// A SIP response
#[derive(Debug, Clone)]
pub struct Response {
    pub version: Version,
    pub status: StatusCode,
    pub reason: String,
    pub headers: HeaderCollection,
    pub body: Bytes,
    session: Option<Arc<dyn SessionDescription>>,
}

impl Response {
    /// A response with the default reason phrase and no headers
    pub fn new(status: StatusCode) -> Self {
        Response {
            version: Version::sip_2_0(),
            status,
            reason: status.reason_phrase().to_string(),
            headers: HeaderCollection::new(),
            body: Bytes::new(),
            session: None,
        }
    }

    pub(crate) fn from_parts(
        version: Version,
        status: StatusCode,
        reason: String,
        headers: HeaderCollection,
        body: Bytes,
    ) -> Self {
        Response {
            version,
            status,
            reason,
            headers,
            body,
            session: None,
        }
    }

    /// Builds a response to `request`, copying Via, From, To, Call-ID, CSeq
    /// and Record-Route.
    ///
    /// ```
    /// use sipua_sip_core::{HeaderName, Message, Response, StatusCode};
    ///
    /// let raw = b"INVITE sip:bob@biloxi.com SIP/2.0\r\n\
    ///     Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds\r\n\
    ///     To: Bob <sip:bob@biloxi.com>\r\n\
    ///     From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
    ///     Call-ID: a84b4c76e66710\r\n\
    ///     CSeq: 314159 INVITE\r\n\
    ///     Content-Length: 0\r\n\r\n";
    /// let request = match Message::parse_datagram(raw).unwrap() {
    ///     Some(Message::Request(request)) => request,
    ///     _ => unreachable!(),
    /// };
    /// let response = Response::build_to(&request, StatusCode::RINGING);
    /// assert_eq!(response.reason, "Ringing");
    /// assert_eq!(response.headers.call_id(), Some("a84b4c76e66710"));
    /// assert_eq!(response.headers.get(HeaderName::CSeq), Some("314159 INVITE"));
    /// ```
    pub fn build_to(request: &Request, status: StatusCode) -> Self {
        let mut response = Response::new(status);
        for name in COPIED_FROM_REQUEST {
            response.headers.copy_from(&request.headers, name);
        }
        response
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn call_id(&self) -> Option<&str> {
        self.headers.call_id()
    }

    pub fn cseq(&self) -> Option<CSeq> {
        self.headers.cseq()
    }

    pub fn top_via(&self) -> Option<Via> {
        self.headers.top_via()
    }

    pub fn to_uri(&self) -> Option<Uri> {
        self.headers.to_uri()
    }

    /// The tag of the To header, which identifies the answering party
    pub fn to_tag(&self) -> Option<String> {
        self.to_uri().and_then(|to| to.tag().map(str::to_string))
    }

    pub fn attach_body(&mut self, session: Arc<dyn SessionDescription>) {
        self.session = Some(session);
    }

    pub fn extract_body(&self) -> Option<(Bytes, String)> {
        extract_body(&self.headers, &self.body, self.session.as_ref())
    }

    pub fn to_bytes(&self) -> Bytes {
        self.to_bytes_with(false)
    }

    pub fn to_bytes_with(&self, compact: bool) -> Bytes {
        let start_line = if self.reason.is_empty() {
            format!("{} {}", self.version, self.status)
        } else {
            format!("{} {} {}", self.version, self.status, self.reason)
        };
        serialize(start_line, &self.headers, &self.body, self.session.as_ref(), compact)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}
