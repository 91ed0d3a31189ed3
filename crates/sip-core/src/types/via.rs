//! # Via header values
//!
//! ```text
//! Via: SIP/2.0/UDP pc33.atlanta.com:5060;branch=z9hG4bK776asdhds;rport
//! ```
//!
//! The top Via of a request carries the `branch` that correlates responses
//! with the client transaction that sent it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::param::Params;
use crate::types::uri::Host;

/// Prefix of every RFC 3261 compliant branch parameter
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

/// One Via header value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Via {
    /// Protocol name and version, normally `SIP/2.0`
    pub protocol: String,
    /// `UDP`, `TCP`, `TLS`, ...
    pub transport: String,
    pub host: Host,
    pub port: Option<u16>,
    pub params: Params,
}

impl Via {
    pub fn new(transport: impl Into<String>, host: Host, port: Option<u16>) -> Self {
        Via {
            protocol: "SIP/2.0".to_string(),
            transport: transport.into().to_ascii_uppercase(),
            host,
            port,
            params: Params::new(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.params.set("branch", Some(branch.into()));
        self
    }

    /// Asks the server to answer to the source port (RFC 3581)
    pub fn with_rport(mut self) -> Self {
        self.params.set_flag("rport");
        self
    }

    pub fn branch(&self) -> Option<&str> {
        self.params.value("branch")
    }

    /// Whether the branch carries the RFC 3261 magic cookie
    pub fn has_rfc3261_branch(&self) -> bool {
        self.branch()
            .map(|b| b.starts_with(BRANCH_MAGIC_COOKIE))
            .unwrap_or(false)
    }

    pub fn received(&self) -> Option<&str> {
        self.params.value("received")
    }

    /// The `rport` value filled in by the server, if any
    pub fn rport(&self) -> Option<u16> {
        self.params.value("rport").and_then(|p| p.parse().ok())
    }

    /// `host[:port]` as written
    pub fn sent_by(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.to_string(),
        }
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}{}", self.protocol, self.transport, self.sent_by(), self.params)
    }
}

impl FromStr for Via {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidHeaderValue {
            header: "Via".to_string(),
            value: s.to_string(),
        };

        let s = s.trim();
        let (sent_protocol, rest) = s
            .split_once(|c: char| c.is_ascii_whitespace())
            .ok_or_else(invalid)?;
        let (protocol, transport) = sent_protocol.rsplit_once('/').ok_or_else(invalid)?;
        if !protocol.contains('/') || transport.is_empty() {
            return Err(invalid());
        }

        let rest = rest.trim_start();
        let (sent_by, params) = match rest.split_once(';') {
            Some((sent_by, params)) => (sent_by.trim(), Params::parse(params, ';')),
            None => (rest.trim(), Params::new()),
        };

        let (host, port) = if sent_by.starts_with('[') {
            match sent_by.rsplit_once("]:") {
                Some((host, port)) => (format!("{}]", host), Some(port)),
                None => (sent_by.to_string(), None),
            }
        } else {
            match sent_by.rsplit_once(':') {
                Some((host, port)) => (host.to_string(), Some(port)),
                None => (sent_by.to_string(), None),
            }
        };
        let port = port
            .map(|p| p.trim().parse::<u16>().map_err(|_| invalid()))
            .transpose()?;

        Ok(Via {
            protocol: protocol.to_string(),
            transport: transport.to_ascii_uppercase(),
            host: Host::from_str(host.trim())?,
            port,
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_via() {
        let via: Via = "SIP/2.0/UDP pc33.atlanta.com:5066;branch=z9hG4bK776asdhds;rport=5070;received=192.0.2.1"
            .parse()
            .unwrap();
        assert_eq!(via.transport, "UDP");
        assert_eq!(via.host, Host::domain("pc33.atlanta.com"));
        assert_eq!(via.port, Some(5066));
        assert_eq!(via.branch(), Some("z9hG4bK776asdhds"));
        assert!(via.has_rfc3261_branch());
        assert_eq!(via.rport(), Some(5070));
        assert_eq!(via.received(), Some("192.0.2.1"));
    }

    #[test]
    fn test_parse_ipv6_via() {
        let via: Via = "SIP/2.0/TCP [2001:db8::9]:5061;branch=z9hG4bKx".parse().unwrap();
        assert_eq!(via.port, Some(5061));
        assert_eq!(via.sent_by(), "[2001:db8::9]:5061");
    }

    #[test]
    fn test_legacy_branch() {
        let via: Via = "SIP/2.0/UDP host;branch=1234".parse().unwrap();
        assert!(!via.has_rfc3261_branch());
        assert_eq!(via.port, None);
    }

    #[test]
    fn test_display() {
        let via = Via::new("udp", Host::domain("client.example.com"), Some(5060))
            .with_branch("z9hG4bKabc")
            .with_rport();
        assert_eq!(
            via.to_string(),
            "SIP/2.0/UDP client.example.com:5060;branch=z9hG4bKabc;rport"
        );
    }

    #[test]
    fn test_invalid_via() {
        assert!("garbage".parse::<Via>().is_err());
        assert!("SIP/2.0/UDP host:notaport".parse::<Via>().is_err());
    }
}
