use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// SIP request methods
///
/// Covers the RFC 3261 core methods and the common extensions a user agent
/// sends (SUBSCRIBE/NOTIFY, PUBLISH, REFER, MESSAGE, INFO, PRACK, UPDATE).
/// Anything else is carried as [`Method::Extension`].
///
/// Method names are case-sensitive on the wire.
///
/// # Examples
///
/// ```
/// use sipua_sip_core::Method;
/// use std::str::FromStr;
///
/// assert_eq!(Method::from_str("INVITE").unwrap(), Method::Invite);
/// assert_eq!(Method::Register.as_str(), "REGISTER");
/// assert_eq!(Method::from_str("FOO").unwrap(), Method::Extension("FOO".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Cancel,
    Options,
    Register,
    Subscribe,
    Notify,
    Publish,
    Refer,
    Message,
    Info,
    Prack,
    Update,
    /// Any other token
    Extension(String),
}

impl Method {
    /// Wire representation of the method
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Options => "OPTIONS",
            Method::Register => "REGISTER",
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Publish => "PUBLISH",
            Method::Refer => "REFER",
            Method::Message => "MESSAGE",
            Method::Info => "INFO",
            Method::Prack => "PRACK",
            Method::Update => "UPDATE",
            Method::Extension(name) => name,
        }
    }

    /// Whether a request with this method establishes a dialog
    pub fn creates_dialog(&self) -> bool {
        matches!(self, Method::Invite | Method::Subscribe | Method::Refer)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token characters allowed in a method name (RFC 3261 section 25.1)
pub(crate) fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-.!%*_+`'~".contains(c)
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let method = match s {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "OPTIONS" => Method::Options,
            "REGISTER" => Method::Register,
            "SUBSCRIBE" => Method::Subscribe,
            "NOTIFY" => Method::Notify,
            "PUBLISH" => Method::Publish,
            "REFER" => Method::Refer,
            "MESSAGE" => Method::Message,
            "INFO" => Method::Info,
            "PRACK" => Method::Prack,
            "UPDATE" => Method::Update,
            other if !other.is_empty() && other.chars().all(is_token_char) => {
                Method::Extension(other.to_string())
            }
            other => return Err(Error::InvalidMethod(other.to_string())),
        };
        Ok(method)
    }
}
