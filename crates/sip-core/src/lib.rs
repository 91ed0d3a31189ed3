//! SIP message model for the sipua stack
//!
//! This crate holds everything the transaction layer needs to put SIP on the
//! wire and read it back:
//!
//! - [`HeaderCollection`]: ordered, case-insensitive header fields with
//!   compact-form handling
//! - [`Uri`]: SIP URIs with RFC 3261 comparison and per-context sanitizing
//! - [`Request`], [`Response`] and [`Message`], plus the datagram parser
//! - static tables for methods, status reason phrases and header aliases
//!
//! ```
//! use sipua_sip_core::prelude::*;
//!
//! let raw = b"SIP/2.0 180 Ringing\r\n\
//!     v: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds\r\n\
//!     t: Bob <sip:bob@biloxi.com>;tag=a6c85cf\r\n\
//!     CSeq: 314159 INVITE\r\n\r\n";
//! let Some(Message::Response(ringing)) = Message::parse_datagram(raw).unwrap() else {
//!     panic!("not a response");
//! };
//! assert_eq!(ringing.status, StatusCode::RINGING);
//! assert_eq!(ringing.to_tag().as_deref(), Some("a6c85cf"));
//! ```

pub mod error;
pub mod parser;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    CSeq, HeaderCollection, HeaderName, Host, Message, Method, Params, RawBody, Request,
    Response, Scheme, SessionDescription, StatusCode, Uri, UriContext, Version, Via,
    BRANCH_MAGIC_COOKIE,
};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        CSeq, Error, HeaderCollection, HeaderName, Host, Message, Method, Request, Response,
        Result, Scheme, SessionDescription, StatusCode, Uri, UriContext, Via,
    };
}
