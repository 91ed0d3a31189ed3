pub mod body;
pub mod cseq;
pub mod headers;
pub mod message;
pub mod method;
pub mod param;
pub mod sip_request;
pub mod sip_response;
pub mod status;
pub mod uri;
pub mod version;
pub mod via;

pub use body::{RawBody, SessionDescription};
pub use cseq::CSeq;
pub use headers::{HeaderCollection, HeaderName};
pub use message::Message;
pub use method::Method;
pub use param::Params;
pub use sip_request::Request;
pub use sip_response::Response;
pub use status::StatusCode;
pub use uri::{Host, Scheme, Uri, UriContext};
pub use version::Version;
pub use via::{Via, BRANCH_MAGIC_COOKIE};
