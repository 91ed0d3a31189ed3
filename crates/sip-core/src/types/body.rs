use std::fmt;

use bytes::Bytes;

/// Content type assumed for a body that arrives without one
pub const DEFAULT_BODY_TYPE: &str = "application/sdp";

/// A negotiated media description carried as a message body.
///
/// The SIP layer never looks inside it: it only asks for the content type and
/// the encoded bytes when the message is written.
pub trait SessionDescription: Send + Sync + fmt::Debug {
    fn content_type(&self) -> &str {
        DEFAULT_BODY_TYPE
    }

    fn encode(&self) -> Bytes;
}

/// A body that is already encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBody {
    pub content_type: String,
    pub data: Bytes,
}

impl RawBody {
    pub fn new(content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        RawBody {
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

impl SessionDescription for RawBody {
    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn encode(&self) -> Bytes {
        self.data.clone()
    }
}
