use std::fmt;

use bytes::Bytes;

use crate::error::Result;
use crate::types::cseq::CSeq;
use crate::types::headers::HeaderCollection;
use crate::types::sip_request::Request;
use crate::types::sip_response::Response;

/// Either kind of SIP message
#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    /// Parses one datagram.
    ///
    /// Returns `Ok(None)` for a keep-alive (a datagram holding nothing but
    /// CRLF and whitespace).
    pub fn parse_datagram(data: &[u8]) -> Result<Option<Message>> {
        crate::parser::parse_message(data)
    }

    pub fn headers(&self) -> &HeaderCollection {
        match self {
            Message::Request(request) => &request.headers,
            Message::Response(response) => &response.headers,
        }
    }

    pub fn headers_mut(&mut self) -> &mut HeaderCollection {
        match self {
            Message::Request(request) => &mut request.headers,
            Message::Response(response) => &mut response.headers,
        }
    }

    pub fn call_id(&self) -> Option<&str> {
        self.headers().call_id()
    }

    pub fn cseq(&self) -> Option<CSeq> {
        self.headers().cseq()
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(_))
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Message::Request(request) => request.to_bytes(),
            Message::Response(response) => response.to_bytes(),
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Request(request) => request.fmt(f),
            Message::Response(response) => response.fmt(f),
        }
    }
}
