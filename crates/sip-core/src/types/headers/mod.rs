//! # Header collection
//!
//! [`HeaderCollection`] keeps header fields in the order they were added or
//! received, with case-insensitive names. Compact forms are expanded on input
//! and can be produced again on output.
//!
//! ```
//! use sipua_sip_core::{HeaderCollection, HeaderName};
//!
//! let mut headers = HeaderCollection::parse_lines([
//!     "v: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds",
//!     "Supported: timer,",
//!     "  100rel",
//!     "Max-Forwards: 70",
//! ]);
//! assert_eq!(headers.get(HeaderName::Supported), Some("timer, 100rel"));
//! assert_eq!(headers.get_integer("max-forwards", 0), 70);
//!
//! headers.add(HeaderName::Route, "<sip:p1.example.com;lr>");
//! headers.add(HeaderName::Route, "<sip:p2.example.com;lr>");
//! assert_eq!(headers.get_all("Route").len(), 1);
//! assert_eq!(headers.route_set().len(), 2);
//! ```

pub mod header_name;

pub use header_name::HeaderName;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::cseq::CSeq;
use crate::types::uri::{Scheme, Uri};
use crate::types::via::Via;

/// Ordered, case-insensitive collection of header fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderCollection {
    entries: Vec<(HeaderName, String)>,
}

fn header_name(name: &str) -> HeaderName {
    HeaderName::from_str(name).unwrap_or_else(|_| HeaderName::Other(name.to_string()))
}

impl HeaderCollection {
    pub fn new() -> Self {
        HeaderCollection::default()
    }

    /// Replaces every occurrence of `name` with a single value.
    ///
    /// The value takes the position of the first occurrence so rewriting a
    /// header does not reorder the block.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = header_name(name.as_ref());
        let value = value.into();
        match self.entries.iter().position(|(n, _)| *n == name) {
            Some(first) => {
                self.entries[first].1 = value;
                let mut index = 0;
                self.entries.retain(|(n, _)| {
                    let keep = index <= first || *n != name;
                    index += 1;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Appends a value. Comma-list headers are joined onto the existing line.
    pub fn add(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = header_name(name.as_ref());
        let value = value.into();
        if name.is_comma_list() {
            if let Some((_, existing)) = self.entries.iter_mut().rev().find(|(n, _)| *n == name) {
                existing.push_str(", ");
                existing.push_str(&value);
                return;
            }
        }
        self.entries.push((name, value));
    }

    /// First value of `name`
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = HeaderName::from_str(name.as_ref()).ok()?;
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// First value of `name`, or the empty string
    pub fn get_or_empty(&self, name: impl AsRef<str>) -> &str {
        self.get(name).unwrap_or("")
    }

    /// Every line carrying `name`, in order
    pub fn get_all(&self, name: impl AsRef<str>) -> Vec<&str> {
        let Ok(name) = HeaderName::from_str(name.as_ref()) else {
            return Vec::new();
        };
        self.entries
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.get(name).is_some()
    }

    /// Removes every occurrence, returning whether anything was removed
    pub fn remove(&mut self, name: impl AsRef<str>) -> bool {
        let name = header_name(name.as_ref());
        let before = self.entries.len();
        self.entries.retain(|(n, _)| *n != name);
        before != self.entries.len()
    }

    /// Comma separated tokens across every occurrence, trimmed and
    /// de-duplicated without regard to case
    pub fn get_token_set(&self, name: impl AsRef<str>) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::new();
        for value in self.get_all(name) {
            for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                if !tokens.iter().any(|t| t.eq_ignore_ascii_case(token)) {
                    tokens.push(token.to_string());
                }
            }
        }
        tokens
    }

    /// Integer value of `name`, or `default` when absent or not a number
    pub fn get_integer(&self, name: impl AsRef<str>, default: i64) -> i64 {
        self.get(name)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &str)> + '_ {
        self.entries.iter().map(|(n, v)| (n, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every occurrence of `name` from `other`, replacing ours
    pub fn copy_from(&mut self, other: &HeaderCollection, name: HeaderName) {
        self.remove(&name);
        for value in other.get_all(&name) {
            self.entries.push((name.clone(), value.to_string()));
        }
    }

    /// Writes `Name: value` lines, each terminated by CRLF
    pub fn write_to(&self, out: &mut String, compact: bool) {
        for (name, value) in &self.entries {
            match name.compact_form().filter(|_| compact) {
                Some(short) => out.push(short),
                None => out.push_str(name.as_str()),
            }
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
    }

    /// Builds a collection from the lines of a header block.
    ///
    /// Lines starting with whitespace continue the previous field. Lines
    /// without a `:` and fields with an unknown compact name are logged and
    /// dropped.
    pub fn parse_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut logical: Vec<String> = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                match logical.last_mut() {
                    Some(previous) => {
                        previous.push(' ');
                        previous.push_str(line.trim());
                    }
                    None => warn!(line = %line, "Continuation line before any header, dropped"),
                }
                continue;
            }
            logical.push(line.to_string());
        }

        let mut headers = HeaderCollection::new();
        for line in logical {
            let Some((name, value)) = line.split_once(':') else {
                warn!(line = %line, "Malformed header field, dropped");
                continue;
            };
            match HeaderName::from_str(name) {
                Ok(name) => headers.entries.push((name, value.trim().to_string())),
                Err(e) => warn!(error = %e, "Header field dropped"),
            }
        }
        headers
    }

    pub fn call_id(&self) -> Option<&str> {
        self.get(HeaderName::CallId).map(str::trim)
    }

    pub fn cseq(&self) -> Option<CSeq> {
        self.get(HeaderName::CSeq).and_then(|v| v.parse().ok())
    }

    /// All Via values, top first; comma-joined values are split
    pub fn vias(&self) -> Vec<Via> {
        self.get_all(HeaderName::Via)
            .into_iter()
            .flat_map(split_comma_list)
            .filter_map(|v| match v.parse::<Via>() {
                Ok(via) => Some(via),
                Err(e) => {
                    debug!(error = %e, "Skipping unparsable Via");
                    None
                }
            })
            .collect()
    }

    pub fn top_via(&self) -> Option<Via> {
        self.vias().into_iter().next()
    }

    pub fn from_uri(&self) -> Option<Uri> {
        self.address(HeaderName::From)
    }

    pub fn to_uri(&self) -> Option<Uri> {
        self.address(HeaderName::To)
    }

    /// First Contact address
    pub fn contact_uri(&self) -> Option<Uri> {
        self.address_list(HeaderName::Contact).into_iter().next()
    }

    pub fn route_set(&self) -> Vec<Uri> {
        self.address_list(HeaderName::Route)
    }

    pub fn record_route_set(&self) -> Vec<Uri> {
        self.address_list(HeaderName::RecordRoute)
    }

    pub fn content_length(&self) -> Option<usize> {
        self.get(HeaderName::ContentLength)
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get(HeaderName::ContentType).map(str::trim)
    }

    pub fn expires(&self) -> Option<u32> {
        self.get(HeaderName::Expires)
            .and_then(|v| v.trim().parse().ok())
    }

    fn address(&self, name: HeaderName) -> Option<Uri> {
        let value = self.get(&name)?;
        match Uri::parse(value, Scheme::Sip) {
            Ok(uri) => Some(uri),
            Err(e) => {
                debug!(header = %name, error = %e, "Unparsable address");
                None
            }
        }
    }

    fn address_list(&self, name: HeaderName) -> Vec<Uri> {
        self.get_all(&name)
            .into_iter()
            .flat_map(split_comma_list)
            .filter_map(|v| Uri::parse(v, Scheme::Sip).ok())
            .collect()
    }
}

/// Splits a header value on commas that are outside quotes and `<...>`
pub fn split_comma_list(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_brackets = true,
            '>' if !in_quotes => in_brackets = false,
            ',' if !in_quotes && !in_brackets => {
                parts.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(value[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::method::Method;

    #[test]
    fn test_set_replaces_all() {
        let mut headers = HeaderCollection::new();
        headers.add("Via", "SIP/2.0/UDP a;branch=z9hG4bK1");
        headers.add("X-Trace", "1");
        headers.add("Via", "SIP/2.0/UDP b;branch=z9hG4bK2");
        headers.set("via", "SIP/2.0/UDP c;branch=z9hG4bK3");
        assert_eq!(headers.get_all(HeaderName::Via), vec!["SIP/2.0/UDP c;branch=z9hG4bK3"]);
        assert_eq!(headers.iter().next().map(|(n, _)| n.clone()), Some(HeaderName::Via));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_via_stays_multi_line() {
        let mut headers = HeaderCollection::new();
        headers.add(HeaderName::Via, "SIP/2.0/UDP a;branch=z9hG4bK1");
        headers.add(HeaderName::Via, "SIP/2.0/UDP b;branch=z9hG4bK2");
        assert_eq!(headers.get_all("v").len(), 2);
        assert_eq!(headers.top_via().unwrap().branch(), Some("z9hG4bK1"));
    }

    #[test]
    fn test_get_missing_is_empty() {
        let headers = HeaderCollection::new();
        assert_eq!(headers.get("Subject"), None);
        assert_eq!(headers.get_or_empty("Subject"), "");
        assert_eq!(headers.get_integer("Expires", 3600), 3600);
    }

    #[test]
    fn test_token_set() {
        let headers = HeaderCollection::parse_lines([
            "Allow: INVITE, ACK ,BYE",
            "Allow: bye, OPTIONS",
        ]);
        assert_eq!(headers.get_token_set("allow"), vec!["INVITE", "ACK", "BYE", "OPTIONS"]);
    }

    #[test]
    fn test_parse_drops_malformed_and_unknown_compact() {
        let headers = HeaderCollection::parse_lines([
            "i: a84b4c76e66710",
            "this line has no separator",
            "q: unknown alias",
            "CSeq: 314159 INVITE",
        ]);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.call_id(), Some("a84b4c76e66710"));
        assert_eq!(headers.cseq(), Some(CSeq::new(314159, Method::Invite)));
    }

    #[test]
    fn test_compact_output() {
        let mut headers = HeaderCollection::new();
        headers.set(HeaderName::CallId, "abc");
        headers.set(HeaderName::CSeq, "1 BYE");
        let mut out = String::new();
        headers.write_to(&mut out, true);
        assert_eq!(out, "i: abc\r\nCSeq: 1 BYE\r\n");
        out.clear();
        headers.write_to(&mut out, false);
        assert_eq!(out, "Call-ID: abc\r\nCSeq: 1 BYE\r\n");
    }

    #[test]
    fn test_address_lists() {
        let headers = HeaderCollection::parse_lines([
            "Record-Route: <sip:p1.example.com;lr>, \"Proxy, Two\" <sip:p2.example.com;lr>",
            "Record-Route: <sip:p3.example.com;lr>",
            "m: <sip:bob@192.0.2.4:5070>;expires=60",
            "t: Bob <sip:bob@biloxi.com>;tag=a6c85cf",
        ]);
        let rr = headers.record_route_set();
        assert_eq!(rr.len(), 3);
        assert_eq!(rr[1].display_name.as_deref(), Some("Proxy, Two"));
        assert_eq!(headers.contact_uri().unwrap().port, Some(5070));
        assert_eq!(headers.to_uri().unwrap().tag(), Some("a6c85cf"));
    }

    #[test]
    fn test_copy_from() {
        let source = HeaderCollection::parse_lines(["Via: SIP/2.0/UDP a", "Via: SIP/2.0/UDP b"]);
        let mut target = HeaderCollection::new();
        target.set("Via", "SIP/2.0/UDP old");
        target.copy_from(&source, HeaderName::Via);
        assert_eq!(target.get_all("Via"), vec!["SIP/2.0/UDP a", "SIP/2.0/UDP b"]);
    }
}
