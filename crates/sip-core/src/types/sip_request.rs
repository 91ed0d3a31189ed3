//! # SIP Request
//!
//! A request is a method, a Request-URI, a header block and an optional body.
//! The body is either raw bytes received from the network or a
//! [`SessionDescription`] attached by the application, which is encoded when
//! the request is written.
//!
//! ```
//! use sipua_sip_core::{HeaderName, Method, Request, Uri};
//!
//! let request = Request::new(Method::Options, Uri::sip("biloxi.com").with_user("bob"))
//!     .with_header(HeaderName::CallId, "a84b4c76e66710")
//!     .with_header(HeaderName::CSeq, "1 OPTIONS");
//! let text = String::from_utf8(request.to_bytes().to_vec()).unwrap();
//! assert!(text.starts_with("OPTIONS sip:bob@biloxi.com SIP/2.0\r\n"));
//! assert!(text.ends_with("Content-Length: 0\r\n\r\n"));
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::types::body::{SessionDescription, DEFAULT_BODY_TYPE};
use crate::types::cseq::CSeq;
use crate::types::headers::{HeaderCollection, HeaderName};
use crate::types::method::Method;
use crate::types::uri::Uri;
use crate::types::version::Version;
use crate::types::via::Via;

/// A SIP request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderCollection,
    /// Raw body; ignored on output when a session description is attached
    pub body: Bytes,
    session: Option<Arc<dyn SessionDescription>>,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Request {
            method,
            uri,
            version: Version::sip_2_0(),
            headers: HeaderCollection::new(),
            body: Bytes::new(),
            session: None,
        }
    }

    pub(crate) fn from_parts(
        method: Method,
        uri: Uri,
        version: Version,
        headers: HeaderCollection,
        body: Bytes,
    ) -> Self {
        Request {
            method,
            uri,
            version,
            headers,
            body,
            session: None,
        }
    }

    /// Sets a header, replacing existing values
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

    pub fn from_uri(&self) -> Option<Uri> {
        self.headers.from_uri()
    }

    pub fn to_uri(&self) -> Option<Uri> {
        self.headers.to_uri()
    }

    /// Attaches a media description; it replaces any raw body
    pub fn attach_body(&mut self, session: Arc<dyn SessionDescription>) {
        self.session = Some(session);
    }

    pub fn session_description(&self) -> Option<&Arc<dyn SessionDescription>> {
        self.session.as_ref()
    }

    /// Body bytes and their content type, if there is a body
    pub fn extract_body(&self) -> Option<(Bytes, String)> {
        extract_body(&self.headers, &self.body, self.session.as_ref())
    }

    pub fn to_bytes(&self) -> Bytes {
        self.to_bytes_with(false)
    }

    /// Serializes the request, optionally using compact header names.
    /// Content-Length is always recomputed.
    pub fn to_bytes_with(&self, compact: bool) -> Bytes {
        let start_line = format!("{} {} {}", self.method, self.uri.as_canonical_string(), self.version);
        serialize(start_line, &self.headers, &self.body, self.session.as_ref(), compact)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

pub(crate) fn extract_body(
    headers: &HeaderCollection,
    body: &Bytes,
    session: Option<&Arc<dyn SessionDescription>>,
) -> Option<(Bytes, String)> {
    if let Some(session) = session {
        return Some((session.encode(), session.content_type().to_string()));
    }
    if body.is_empty() {
        return None;
    }
    let content_type = headers.content_type().unwrap_or(DEFAULT_BODY_TYPE);
    Some((body.clone(), content_type.to_string()))
}

pub(crate) fn serialize(
    start_line: String,
    headers: &HeaderCollection,
    body: &Bytes,
    session: Option<&Arc<dyn SessionDescription>>,
    compact: bool,
) -> Bytes {
    let mut headers = headers.clone();
    let body = match session {
        Some(session) => {
            headers.set(HeaderName::ContentType, session.content_type());
            session.encode()
        }
        None => body.clone(),
    };
    headers.set(HeaderName::ContentLength, body.len().to_string());

    let mut head = start_line;
    head.push_str("\r\n");
    headers.write_to(&mut head, compact);
    head.push_str("\r\n");

    let mut out = BytesMut::with_capacity(head.len() + body.len());
    out.extend_from_slice(head.as_bytes());
    out.extend_from_slice(&body);
    out.freeze()
}
