use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Common SIP header names
///
/// Header names are case-insensitive. Known headers keep their canonical
/// capitalization; anything else is carried verbatim in `Other`. Parsing a
/// single-letter name expands the RFC compact form and rejects letters that
/// are not a known alias.
///
/// # Examples
///
/// ```rust
/// use sipua_sip_core::HeaderName;
/// use std::str::FromStr;
///
/// assert_eq!(HeaderName::from_str("f").unwrap(), HeaderName::From);
/// assert_eq!(HeaderName::from_str("call-id").unwrap().as_str(), "Call-ID");
/// assert_eq!(HeaderName::Via.compact_form(), Some('v'));
/// assert!(HeaderName::from_str("q").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HeaderName {
    Accept,
    AcceptContact,
    AcceptEncoding,
    AcceptLanguage,
    Allow,
    AllowEvents,
    Authorization,
    CallId,
    Contact,
    ContentEncoding,
    ContentLength,
    ContentType,
    CSeq,
    Date,
    Event,
    Expires,
    From,
    Identity,
    MaxForwards,
    MinExpires,
    ProxyAuthenticate,
    ProxyAuthorization,
    ProxyRequire,
    RecordRoute,
    ReferTo,
    ReferredBy,
    RejectContact,
    RequestDisposition,
    Require,
    RetryAfter,
    Route,
    Server,
    SessionExpires,
    Subject,
    SubscriptionState,
    Supported,
    To,
    Unsupported,
    UserAgent,
    Via,
    Warning,
    WwwAuthenticate,
    /// Any header without a dedicated variant
    Other(String),
}

/// RFC 3261 section 7.3.3 plus the aliases registered by later RFCs
static COMPACT_FORMS: &[(char, &str)] = &[
    ('a', "Accept-Contact"),
    ('b', "Referred-By"),
    ('c', "Content-Type"),
    ('d', "Request-Disposition"),
    ('e', "Content-Encoding"),
    ('f', "From"),
    ('i', "Call-ID"),
    ('j', "Reject-Contact"),
    ('k', "Supported"),
    ('l', "Content-Length"),
    ('m', "Contact"),
    ('o', "Event"),
    ('r', "Refer-To"),
    ('s', "Subject"),
    ('t', "To"),
    ('u', "Allow-Events"),
    ('v', "Via"),
    ('x', "Session-Expires"),
    ('y', "Identity"),
];

impl HeaderName {
    /// Canonical wire name
    pub fn as_str(&self) -> &str {
        match self {
            HeaderName::Accept => "Accept",
            HeaderName::AcceptContact => "Accept-Contact",
            HeaderName::AcceptEncoding => "Accept-Encoding",
            HeaderName::AcceptLanguage => "Accept-Language",
            HeaderName::Allow => "Allow",
            HeaderName::AllowEvents => "Allow-Events",
            HeaderName::Authorization => "Authorization",
            HeaderName::CallId => "Call-ID",
            HeaderName::Contact => "Contact",
            HeaderName::ContentEncoding => "Content-Encoding",
            HeaderName::ContentLength => "Content-Length",
            HeaderName::ContentType => "Content-Type",
            HeaderName::CSeq => "CSeq",
            HeaderName::Date => "Date",
            HeaderName::Event => "Event",
            HeaderName::Expires => "Expires",
            HeaderName::From => "From",
            HeaderName::Identity => "Identity",
            HeaderName::MaxForwards => "Max-Forwards",
            HeaderName::MinExpires => "Min-Expires",
            HeaderName::ProxyAuthenticate => "Proxy-Authenticate",
            HeaderName::ProxyAuthorization => "Proxy-Authorization",
            HeaderName::ProxyRequire => "Proxy-Require",
            HeaderName::RecordRoute => "Record-Route",
            HeaderName::ReferTo => "Refer-To",
            HeaderName::ReferredBy => "Referred-By",
            HeaderName::RejectContact => "Reject-Contact",
            HeaderName::RequestDisposition => "Request-Disposition",
            HeaderName::Require => "Require",
            HeaderName::RetryAfter => "Retry-After",
            HeaderName::Route => "Route",
            HeaderName::Server => "Server",
            HeaderName::SessionExpires => "Session-Expires",
            HeaderName::Subject => "Subject",
            HeaderName::SubscriptionState => "Subscription-State",
            HeaderName::Supported => "Supported",
            HeaderName::To => "To",
            HeaderName::Unsupported => "Unsupported",
            HeaderName::UserAgent => "User-Agent",
            HeaderName::Via => "Via",
            HeaderName::Warning => "Warning",
            HeaderName::WwwAuthenticate => "WWW-Authenticate",
            HeaderName::Other(name) => name,
        }
    }

    /// Single-letter alias, if the header has one
    pub fn compact_form(&self) -> Option<char> {
        COMPACT_FORMS
            .iter()
            .find(|(_, long)| long.eq_ignore_ascii_case(self.as_str()))
            .map(|(short, _)| *short)
    }

    /// Headers whose grammar is a comma separated list; multiple values are
    /// joined on one line instead of repeating the header.
    pub fn is_comma_list(&self) -> bool {
        matches!(
            self,
            HeaderName::Route
                | HeaderName::RecordRoute
                | HeaderName::Allow
                | HeaderName::AllowEvents
                | HeaderName::Supported
                | HeaderName::Require
                | HeaderName::ProxyRequire
                | HeaderName::Unsupported
                | HeaderName::Accept
                | HeaderName::AcceptEncoding
                | HeaderName::AcceptLanguage
                | HeaderName::ContentEncoding
        )
    }

    fn from_long_name(name: &str) -> HeaderName {
        match name.to_ascii_lowercase().as_str() {
            "accept" => HeaderName::Accept,
            "accept-contact" => HeaderName::AcceptContact,
            "accept-encoding" => HeaderName::AcceptEncoding,
            "accept-language" => HeaderName::AcceptLanguage,
            "allow" => HeaderName::Allow,
            "allow-events" => HeaderName::AllowEvents,
            "authorization" => HeaderName::Authorization,
            "call-id" => HeaderName::CallId,
            "contact" => HeaderName::Contact,
            "content-encoding" => HeaderName::ContentEncoding,
            "content-length" => HeaderName::ContentLength,
            "content-type" => HeaderName::ContentType,
            "cseq" => HeaderName::CSeq,
            "date" => HeaderName::Date,
            "event" => HeaderName::Event,
            "expires" => HeaderName::Expires,
            "from" => HeaderName::From,
            "identity" => HeaderName::Identity,
            "max-forwards" => HeaderName::MaxForwards,
            "min-expires" => HeaderName::MinExpires,
            "proxy-authenticate" => HeaderName::ProxyAuthenticate,
            "proxy-authorization" => HeaderName::ProxyAuthorization,
            "proxy-require" => HeaderName::ProxyRequire,
            "record-route" => HeaderName::RecordRoute,
            "refer-to" => HeaderName::ReferTo,
            "referred-by" => HeaderName::ReferredBy,
            "reject-contact" => HeaderName::RejectContact,
            "request-disposition" => HeaderName::RequestDisposition,
            "require" => HeaderName::Require,
            "retry-after" => HeaderName::RetryAfter,
            "route" => HeaderName::Route,
            "server" => HeaderName::Server,
            "session-expires" => HeaderName::SessionExpires,
            "subject" => HeaderName::Subject,
            "subscription-state" => HeaderName::SubscriptionState,
            "supported" => HeaderName::Supported,
            "to" => HeaderName::To,
            "unsupported" => HeaderName::Unsupported,
            "user-agent" => HeaderName::UserAgent,
            "via" => HeaderName::Via,
            "warning" => HeaderName::Warning,
            "www-authenticate" => HeaderName::WwwAuthenticate,
            _ => HeaderName::Other(name.to_string()),
        }
    }
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl Eq for HeaderName {}

impl AsRef<str> for HeaderName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeaderName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Err(Error::InvalidHeader("empty header name".to_string())),
            (Some(short), None) => {
                let short = short.to_ascii_lowercase();
                COMPACT_FORMS
                    .iter()
                    .find(|(alias, _)| *alias == short)
                    .map(|(_, long)| HeaderName::from_long_name(long))
                    .ok_or_else(|| Error::InvalidHeader(format!("unknown compact form '{}'", s)))
            }
            _ => {
                if s.chars().any(|c| c.is_whitespace() || c == ':') {
                    return Err(Error::InvalidHeader(format!("invalid header name '{}'", s)));
                }
                Ok(HeaderName::from_long_name(s))
            }
        }
    }
}
