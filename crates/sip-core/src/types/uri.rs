//! # SIP URI Implementation
//!
//! SIP URIs identify users, servers and services. In this crate a [`Uri`]
//! carries the full `name-addr` as it appears in a header field, so besides
//! the addr-spec components it also keeps the optional display name and the
//! header-field parameters (such as `tag`) that follow the closing `>`.
//!
//! ```text
//! "Display Name" <sip:user:password@host:port;uri-parameters?headers>;field-params
//! ```
//!
//! ## Usage Examples
//!
//! ```rust
//! use sipua_sip_core::types::uri::{Scheme, Uri, UriContext};
//!
//! let mut uri = Uri::parse(
//!     "\"Alice\" <sip:alice@example.com:5070;transport=tcp;method=INVITE>;tag=1928301774",
//!     Scheme::Sip,
//! ).unwrap();
//! assert_eq!(uri.display_name.as_deref(), Some("Alice"));
//! assert_eq!(uri.port, Some(5070));
//! assert_eq!(uri.tag(), Some("1928301774"));
//!
//! // Placing the URI in a From header strips what is not allowed there
//! uri.sanitize(UriContext::From);
//! assert_eq!(uri.port, None);
//! assert!(uri.params.is_empty());
//! assert_eq!(uri.as_quoted_display_string(), "\"Alice\" <sip:alice@example.com>;tag=1928301774");
//! ```
//!
//! ## Comparison
//!
//! [`Uri::compare`] follows RFC 3261 section 19.1.4: scheme, userinfo, host
//! and port (including whether a port was given at all) are always compared,
//! as are the `user`, `ttl`, `method` and `transport` parameters. Any other
//! parameter only takes part when it is present on both sides.

use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::param::Params;

/// Port assumed for `sip:` URIs without an explicit port
pub const DEFAULT_SIP_PORT: u16 = 5060;
/// Port assumed for `sips:` URIs without an explicit port
pub const DEFAULT_SIPS_PORT: u16 = 5061;

/// URI parameters that take part in every comparison
const ALWAYS_COMPARED: [&str; 4] = ["user", "ttl", "method", "transport"];

/// Parameters that belong to the header field rather than the URI when a URI
/// is written without angle brackets.
const FIELD_PARAMS: [&str; 3] = ["tag", "q", "expires"];

/// SIP URI scheme types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    /// SIP URI (non-secure)
    Sip,
    /// SIPS URI (secure SIP)
    Sips,
    /// TEL URI (telephone number)
    Tel,
    /// Any other scheme
    Custom(String),
}

impl Scheme {
    /// Returns the string representation of the scheme
    pub fn as_str(&self) -> &str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
            Scheme::Tel => "tel",
            Scheme::Custom(scheme) => scheme,
        }
    }

    /// Port used when a URI does not supply one
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Sips => DEFAULT_SIPS_PORT,
            _ => DEFAULT_SIP_PORT,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sip" => Ok(Scheme::Sip),
            "sips" => Ok(Scheme::Sips),
            "tel" => Ok(Scheme::Tel),
            "" => Err(Error::InvalidUri("empty scheme".to_string())),
            _ => Ok(Scheme::Custom(s.to_string())),
        }
    }
}

/// Represents the host part of a URI.
///
/// The host can be either a domain name or an IP address (v4 or v6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Host {
    /// A domain name (e.g., "example.com").
    Domain(String),
    /// An IP address (v4 or v6).
    Address(IpAddr),
}

impl Host {
    /// Create a new host from a domain name
    pub fn domain(domain: impl Into<String>) -> Self {
        Host::Domain(domain.into())
    }

    /// Host text suitable for name resolution (no IPv6 brackets)
    pub fn as_str(&self) -> String {
        match self {
            Host::Domain(domain) => domain.clone(),
            Host::Address(addr) => addr.to_string(),
        }
    }

    /// Case-folded form used by URI comparison
    fn compare_key(&self) -> String {
        match self {
            Host::Domain(domain) => domain.to_ascii_lowercase(),
            Host::Address(addr) => addr.to_string(),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Domain(domain) => f.write_str(domain),
            Host::Address(IpAddr::V4(addr)) => write!(f, "{}", addr),
            Host::Address(IpAddr::V6(addr)) => write!(f, "[{}]", addr),
        }
    }
}

impl FromStr for Host {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidUri("host cannot be empty".to_string()));
        }
        if let Ok(addr) = IpAddr::from_str(s) {
            return Ok(Host::Address(addr));
        }
        if let Some(inner) = s.strip_prefix('[') {
            let inner = inner
                .strip_suffix(']')
                .ok_or_else(|| Error::InvalidUri(format!("unclosed IPv6 bracket: {}", s)))?;
            let addr = Ipv6Addr::from_str(inner)
                .map_err(|_| Error::InvalidUri(format!("invalid IPv6 address: {}", s)))?;
            return Ok(Host::Address(IpAddr::V6(addr)));
        }
        if s.chars().any(|c| c.is_whitespace() || "<>\"".contains(c)) {
            return Err(Error::InvalidUri(format!("invalid host: {}", s)));
        }
        Ok(Host::Domain(s.to_string()))
    }
}

impl From<IpAddr> for Host {
    fn from(addr: IpAddr) -> Self {
        Host::Address(addr)
    }
}

/// Where a URI is about to be placed on the wire
///
/// Each context forbids a different set of parameters, see
/// [`Uri::sanitize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UriContext {
    /// The Request-URI of an outgoing request
    RequestTarget,
    To,
    From,
    /// A Contact of a 3xx response
    Redirect,
    Contact,
    /// A Contact in a REGISTER request
    RegistrationContact,
    Route,
    /// The Request-URI of a REGISTER request
    RegistrationTarget,
    /// Handed to something outside the SIP stack (e.g. shown to a user)
    External,
}

use UriContext as C;

/// RFC 3261 table 1 (section 19.1.1), keyed by parameter
static FORBIDDEN_PARAMS: &[(&str, &[UriContext])] = &[
    ("method", &[C::RequestTarget, C::To, C::From, C::Contact, C::RegistrationContact, C::Route, C::RegistrationTarget]),
    ("maddr", &[C::To, C::From]),
    ("ttl", &[C::To, C::From, C::Route, C::RegistrationTarget]),
    ("transport", &[C::To, C::From]),
    ("lr", &[C::To, C::From, C::Contact, C::RegistrationContact, C::RegistrationTarget]),
    ("expires", &[C::RequestTarget, C::To, C::From, C::Contact, C::Route, C::RegistrationTarget, C::External]),
    ("q", &[C::RequestTarget, C::To, C::From, C::Contact, C::Route, C::RegistrationTarget, C::External]),
    ("tag", &[C::RequestTarget, C::Contact, C::RegistrationContact, C::Route, C::RegistrationTarget, C::External]),
];

/// A SIP URI together with the display name and header-field parameters of
/// the header it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Uri {
    pub scheme: Scheme,
    pub display_name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Host,
    /// `None` when no port was written; see [`Uri::effective_port`]
    pub port: Option<u16>,
    /// `;name=value` parameters inside the addr-spec
    pub params: Params,
    /// `?name=value` headers component
    pub query: Params,
    /// Parameters of the enclosing header field (after `>`)
    pub field_params: Params,
}

impl Uri {
    /// Creates a URI with only a scheme and host
    pub fn new(scheme: Scheme, host: Host) -> Self {
        Uri {
            scheme,
            display_name: None,
            user: None,
            password: None,
            host,
            port: None,
            params: Params::new(),
            query: Params::new(),
            field_params: Params::new(),
        }
    }

    /// `sip:` URI for a host name or IP literal
    pub fn sip(host: impl Into<String>) -> Self {
        let host = host.into();
        let host = Host::from_str(&host).unwrap_or(Host::Domain(host));
        Uri::new(Scheme::Sip, host)
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Adds a URI parameter; `None` adds a flag
    pub fn with_param(mut self, name: &str, value: Option<&str>) -> Self {
        self.params.set(name, value);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.set_tag(tag);
        self
    }

    /// Parses a `name-addr` or `addr-spec`.
    ///
    /// `default_scheme` applies when the text carries no scheme. Fails when
    /// nothing is left once the quoted display name and angle brackets are
    /// removed.
    pub fn parse(text: &str, default_scheme: Scheme) -> Result<Uri> {
        let text = text.trim();
        let mut display_name = None;
        let mut rest = text;

        // The display name may contain ';' and '<' so it has to go first.
        if rest.starts_with('"') {
            let (name, after) = split_quoted(rest)?;
            display_name = Some(name);
            rest = after.trim_start();
        }

        let (addr_spec, field_params, bracketed) = match rest.find('<') {
            Some(open) => {
                let close = rest[open..]
                    .find('>')
                    .map(|i| open + i)
                    .ok_or_else(|| Error::InvalidUri(format!("unterminated '<' in {}", text)))?;
                if display_name.is_none() {
                    let name = rest[..open].trim();
                    if !name.is_empty() {
                        display_name = Some(name.to_string());
                    }
                }
                (
                    rest[open + 1..close].trim(),
                    Params::parse(&rest[close + 1..], ';'),
                    true,
                )
            }
            None => (rest, Params::new(), false),
        };

        if addr_spec.is_empty() {
            return Err(Error::InvalidUri(format!("no address in {:?}", text)));
        }

        let mut uri = Uri::parse_addr_spec(addr_spec, default_scheme)?;
        uri.display_name = display_name.filter(|name| !name.is_empty());
        if bracketed {
            uri.field_params = field_params;
        } else {
            for name in FIELD_PARAMS {
                if let Some(value) = uri.params.get(name).map(|v| v.map(str::to_string)) {
                    uri.params.remove(name);
                    uri.field_params.set(name, value);
                }
            }
        }
        Ok(uri)
    }

    fn parse_addr_spec(spec: &str, default_scheme: Scheme) -> Result<Uri> {
        let (scheme, rest) = match spec.split_once(':') {
            Some((scheme, rest)) if is_scheme_token(scheme) && !is_port_like(rest) => {
                (Scheme::from_str(scheme)?, rest)
            }
            _ => (default_scheme, spec),
        };

        let (userinfo, hostpart) = match rest.split_once('@') {
            Some((userinfo, hostpart)) => (Some(userinfo), hostpart),
            None => (None, rest),
        };
        let (hostpart, query) = match hostpart.split_once('?') {
            Some((hostpart, query)) => (hostpart, Params::parse(query, '&')),
            None => (hostpart, Params::new()),
        };
        let (hostport, params) = match hostpart.split_once(';') {
            Some((hostport, params)) => (hostport, Params::parse(params, ';')),
            None => (hostpart, Params::new()),
        };

        let (user, password) = match userinfo.map(|ui| ui.split_once(':').unwrap_or((ui, ""))) {
            Some((user, password)) => (
                Some(user.to_string()).filter(|u| !u.is_empty()),
                Some(password.to_string()).filter(|p| !p.is_empty()),
            ),
            None => (None, None),
        };
        let (host, port) = parse_host_port(hostport.trim())?;

        Ok(Uri {
            scheme,
            display_name: None,
            user,
            password,
            host,
            port,
            params,
            query,
            field_params: Params::new(),
        })
    }

    /// Port to connect to: the explicit one or the scheme default
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.scheme.default_port())
    }

    /// Value of a URI parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.value(name)
    }

    pub fn maddr(&self) -> Option<&str> {
        self.params.value("maddr")
    }

    pub fn transport(&self) -> Option<&str> {
        self.params.value("transport")
    }

    /// True when the URI carries `;lr`
    pub fn is_loose_route(&self) -> bool {
        self.params.contains("lr")
    }

    pub fn tag(&self) -> Option<&str> {
        self.field_params.value("tag")
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.field_params.set("tag", Some(tag.into()));
    }

    /// Produces a fresh, globally unique token for `tag` parameters
    pub fn generate_tag() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Strips what may not appear in `context` and normalises the port.
    ///
    /// Applying the same context twice leaves the URI unchanged.
    pub fn sanitize(&mut self, context: UriContext) {
        for (name, contexts) in FORBIDDEN_PARAMS {
            if contexts.contains(&context) {
                self.params.remove(name);
                self.field_params.remove(name);
            }
        }

        match context {
            C::RequestTarget | C::RegistrationTarget => {
                self.display_name = None;
                self.field_params.clear();
            }
            C::To | C::From => self.port = None,
            C::RegistrationContact => self.port = Some(self.effective_port()),
            _ => {}
        }

        if !matches!(context, C::Contact | C::Redirect | C::External) {
            self.query.clear();
        }
    }

    /// Returns a sanitized copy
    pub fn sanitized(&self, context: UriContext) -> Uri {
        let mut uri = self.clone();
        uri.sanitize(context);
        uri
    }

    /// The bare addr-spec: no display name, no header-field parameters
    pub fn as_canonical_string(&self) -> String {
        let mut out = format!("{}:", self.scheme);
        if let Some(user) = &self.user {
            out.push_str(user);
            if let Some(password) = &self.password {
                out.push(':');
                out.push_str(password);
            }
            out.push('@');
        }
        out.push_str(&self.host.to_string());
        if let Some(port) = self.port {
            out.push(':');
            out.push_str(&port.to_string());
        }
        // Writing into a String cannot fail
        let _ = self.params.write_with(&mut out, ';', ';');
        let _ = self.query.write_with(&mut out, '?', '&');
        out
    }

    /// `"Display Name" <addr-spec>;field-params`, the form used in headers
    pub fn as_quoted_display_string(&self) -> String {
        let mut out = String::new();
        if let Some(name) = &self.display_name {
            out.push('"');
            for c in name.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push_str("\" ");
        }
        out.push('<');
        out.push_str(&self.as_canonical_string());
        out.push('>');
        let _ = self.field_params.write_with(&mut out, ';', ';');
        out
    }

    /// Component-wise RFC 3261 comparison
    pub fn compare(&self, other: &Uri) -> Ordering {
        self.scheme
            .as_str()
            .to_ascii_lowercase()
            .cmp(&other.scheme.as_str().to_ascii_lowercase())
            .then_with(|| self.user.cmp(&other.user))
            .then_with(|| self.password.cmp(&other.password))
            .then_with(|| self.host.compare_key().cmp(&other.host.compare_key()))
            .then_with(|| self.port.cmp(&other.port))
            .then_with(|| self.compare_params(other))
    }

    fn compare_params(&self, other: &Uri) -> Ordering {
        for name in ALWAYS_COMPARED {
            let ordering = compare_param(self.params.get(name), other.params.get(name));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        let theirs = other.params.sorted_names();
        for name in self.params.sorted_names() {
            if ALWAYS_COMPARED.contains(&name.as_str()) || !theirs.contains(&name) {
                continue;
            }
            let ordering = compare_param(self.params.get(&name), other.params.get(&name));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn compare_param(a: Option<Option<&str>>, b: Option<Option<&str>>) -> Ordering {
    let fold = |p: Option<Option<&str>>| p.map(|v| v.map(str::to_ascii_lowercase));
    fold(a).cmp(&fold(b))
}

impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Uri {}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_canonical_string())
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uri::parse(s, Scheme::Sip)
    }
}

/// Splits a leading quoted string, returning its unescaped content and the
/// text after the closing quote.
fn split_quoted(text: &str) -> Result<(String, &str)> {
    let mut name = String::new();
    let mut chars = text.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    name.push(escaped);
                }
            }
            '"' => return Ok((name, &text[i + 1..])),
            c => name.push(c),
        }
    }
    Err(Error::InvalidUri(format!("unterminated display name in {}", text)))
}

fn is_scheme_token(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
}

/// `host:5060` must not be read as scheme `host`
fn is_port_like(rest: &str) -> bool {
    let port = rest.split(|c| c == ';' || c == '?').next().unwrap_or("");
    !port.is_empty() && port.chars().all(|c| c.is_ascii_digit())
}

fn parse_host_port(text: &str) -> Result<(Host, Option<u16>)> {
    let parse_port = |p: &str| {
        p.parse::<u16>()
            .map_err(|_| Error::InvalidUri(format!("invalid port: {}", p)))
    };

    if text.starts_with('[') {
        let close = text
            .find(']')
            .ok_or_else(|| Error::InvalidUri(format!("unclosed IPv6 bracket: {}", text)))?;
        let host = Host::from_str(&text[..=close])?;
        let port = match &text[close + 1..] {
            "" => None,
            rest => {
                let port = rest
                    .strip_prefix(':')
                    .ok_or_else(|| Error::InvalidUri(format!("junk after host: {}", text)))?;
                Some(parse_port(port)?)
            }
        };
        return Ok((host, port));
    }

    match text.rsplit_once(':') {
        Some((host, port)) => Ok((Host::from_str(host)?, Some(parse_port(port)?))),
        None => Ok((Host::from_str(text)?, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(text: &str) -> Uri {
        Uri::parse(text, Scheme::Sip).unwrap()
    }

    #[test]
    fn test_parse_name_addr() {
        let u = uri("\"Alice \\\"Al\\\"; jr\" <sip:alice:secret@Atlanta.com:5070;transport=tcp?subject=hi>;tag=88sja8x");
        assert_eq!(u.display_name.as_deref(), Some("Alice \"Al\"; jr"));
        assert_eq!(u.user.as_deref(), Some("alice"));
        assert_eq!(u.password.as_deref(), Some("secret"));
        assert_eq!(u.host, Host::domain("Atlanta.com"));
        assert_eq!(u.port, Some(5070));
        assert_eq!(u.transport(), Some("tcp"));
        assert_eq!(u.query.value("subject"), Some("hi"));
        assert_eq!(u.tag(), Some("88sja8x"));
    }

    #[test]
    fn test_parse_unquoted_display_name() {
        let u = uri("Bob <sip:bob@biloxi.com>");
        assert_eq!(u.display_name.as_deref(), Some("Bob"));
        assert_eq!(u.port, None);
        assert_eq!(u.effective_port(), 5060);
    }

    #[test]
    fn test_unbracketed_field_params() {
        let u = uri("sip:bob@biloxi.com;lr;tag=a6c85cf;expires=60");
        assert!(u.is_loose_route());
        assert_eq!(u.tag(), Some("a6c85cf"));
        assert_eq!(u.field_params.value("expires"), Some("60"));
        assert!(!u.params.contains("tag"));
    }

    #[test]
    fn test_default_scheme_and_host_port() {
        let u = Uri::parse("alice@example.com:5062", Scheme::Sips).unwrap();
        assert_eq!(u.scheme, Scheme::Sips);
        assert_eq!(u.port, Some(5062));

        let u = uri("example.com:5060");
        assert_eq!(u.scheme, Scheme::Sip);
        assert_eq!(u.host, Host::domain("example.com"));
        assert_eq!(u.port, Some(5060));

        let u = uri("sips:carol@chicago.com");
        assert_eq!(u.effective_port(), 5061);
    }

    #[test]
    fn test_parse_ipv6() {
        let u = uri("sip:alice@[2001:db8::1]:5070");
        assert_eq!(u.host, Host::Address("2001:db8::1".parse().unwrap()));
        assert_eq!(u.port, Some(5070));
        assert_eq!(u.as_canonical_string(), "sip:alice@[2001:db8::1]:5070");
    }

    #[test]
    fn test_parse_without_addr_spec_fails() {
        assert!(Uri::parse("", Scheme::Sip).is_err());
        assert!(Uri::parse("<>", Scheme::Sip).is_err());
        assert!(Uri::parse("\"Name Only\" <>", Scheme::Sip).is_err());
        assert!(Uri::parse("\"Name Only\"", Scheme::Sip).is_err());
        assert!(Uri::parse("<sip:alice@example.com", Scheme::Sip).is_err());
    }

    #[test]
    fn test_compare_host_case_and_port_presence() {
        assert_eq!(uri("sip:alice@AtLanTa.CoM"), uri("sip:alice@atlanta.com"));
        assert_ne!(uri("sip:alice@atlanta.com"), uri("sip:alice@atlanta.com:5060"));
        assert_ne!(uri("sip:Alice@atlanta.com"), uri("sip:alice@atlanta.com"));
    }

    #[test]
    fn test_compare_params() {
        // Always-compared parameters must match even when present on one side only
        assert_ne!(uri("sip:carol@chicago.com"), uri("sip:carol@chicago.com;transport=tcp"));
        assert_eq!(
            uri("sip:carol@chicago.com;transport=TCP"),
            uri("sip:carol@chicago.com;transport=tcp")
        );
        // Other parameters only when present on both sides
        assert_eq!(uri("sip:carol@chicago.com;newparam=5"), uri("sip:carol@chicago.com"));
        assert_ne!(
            uri("sip:carol@chicago.com;newparam=5"),
            uri("sip:carol@chicago.com;newparam=6")
        );
        // Display name and header-field parameters are not part of identity
        assert_eq!(uri("\"A\" <sip:a@h>;tag=1"), uri("sip:a@h"));
    }

    #[test]
    fn test_compare_is_antisymmetric() {
        let a = uri("sip:a@h;x=1;transport=udp");
        let b = uri("sip:a@h;x=2");
        assert_eq!(a.compare(&b), b.compare(&a).reverse());
        assert_eq!(a.compare(&a), Ordering::Equal);
    }

    #[test]
    fn test_sanitize_table() {
        let original = uri("\"Bob\" <sip:bob@biloxi.com:5070;method=INVITE;maddr=10.0.0.1;ttl=5;transport=udp;lr?subject=x>;tag=9;q=0.5;expires=30");

        let to = original.sanitized(UriContext::To);
        assert!(to.params.is_empty());
        assert_eq!(to.port, None);
        assert_eq!(to.tag(), Some("9"));
        assert!(to.query.is_empty());

        let route = original.sanitized(UriContext::Route);
        assert_eq!(route.maddr(), Some("10.0.0.1"));
        assert!(route.is_loose_route());
        assert!(!route.params.contains("ttl"));
        assert!(!route.params.contains("method"));
        assert!(route.tag().is_none());

        let target = original.sanitized(UriContext::RequestTarget);
        assert!(target.display_name.is_none());
        assert!(target.field_params.is_empty());
        assert_eq!(target.port, Some(5070));
        assert!(target.is_loose_route());

        let contact = original.sanitized(UriContext::Contact);
        assert_eq!(contact.query.value("subject"), Some("x"));
        assert!(!contact.is_loose_route());
        assert!(contact.tag().is_none());
        assert!(contact.field_params.value("q").is_none());

        let redirect = original.sanitized(UriContext::Redirect);
        assert_eq!(redirect.params.value("method"), Some("INVITE"));
        assert_eq!(redirect.field_params.value("q"), Some("0.5"));
    }

    #[test]
    fn test_registration_contact_forces_port() {
        let contact = uri("sip:alice@192.0.2.4").sanitized(UriContext::RegistrationContact);
        assert_eq!(contact.port, Some(5060));
        let contact = uri("sips:alice@192.0.2.4").sanitized(UriContext::RegistrationContact);
        assert_eq!(contact.port, Some(5061));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let original = uri("\"X\" <sip:x@y:1;lr;ttl=1?h=v>;tag=t;q=1");
        for context in [
            C::RequestTarget,
            C::To,
            C::From,
            C::Redirect,
            C::Contact,
            C::RegistrationContact,
            C::Route,
            C::RegistrationTarget,
            C::External,
        ] {
            let once = original.sanitized(context);
            let twice = once.sanitized(context);
            assert_eq!(once.as_quoted_display_string(), twice.as_quoted_display_string());
        }
    }

    #[test]
    fn test_display_strings() {
        let u = uri("\"Al \\\"The Pal\\\"\" <sip:al@pal.com;lr>;tag=xyz");
        assert_eq!(u.as_canonical_string(), "sip:al@pal.com;lr");
        assert_eq!(
            u.as_quoted_display_string(),
            "\"Al \\\"The Pal\\\"\" <sip:al@pal.com;lr>;tag=xyz"
        );
    }

    #[test]
    fn test_generate_tag_is_unique() {
        let a = Uri::generate_tag();
        let b = Uri::generate_tag();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
