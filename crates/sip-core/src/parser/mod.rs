//! Wire parsing: start line, header block and body of a single datagram.

pub mod start_line;

pub use start_line::{parse_start_line, StartLine};

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::types::headers::{HeaderCollection, HeaderName};
use crate::types::message::Message;
use crate::types::sip_request::Request;
use crate::types::sip_response::Response;
use crate::types::version::Version;

/// A datagram holding only line ends and whitespace (RFC 5626 keep-alive)
pub fn is_keep_alive(data: &[u8]) -> bool {
    data.iter().all(|b| matches!(b, b'\r' | b'\n' | b' ' | b'\t'))
}

/// Parses a complete message.
///
/// Keep-alives yield `Ok(None)`. A bad start line, unsupported version or a
/// header block that is not UTF-8 rejects the message; bad individual header
/// lines are only dropped.
pub fn parse_message(data: &[u8]) -> Result<Option<Message>> {
    if is_keep_alive(data) {
        trace!(len = data.len(), "Keep-alive received");
        return Ok(None);
    }

    // Leading line ends before the start line are tolerated (RFC 3261 7.5)
    let leading = data
        .iter()
        .position(|b| !matches!(b, b'\r' | b'\n'))
        .unwrap_or(0);
    let (head, rest) = split_head(&data[leading..]);
    let head = std::str::from_utf8(head)?;

    let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));
    let first = lines
        .next()
        .ok_or_else(|| Error::InvalidStartLine(String::new()))?;
    let start_line = parse_start_line(first)?;
    let headers = HeaderCollection::parse_lines(lines);
    let body = read_body(&headers, rest);

    let message = match start_line {
        StartLine::Request { method, uri, version } => {
            check_version(version)?;
            Message::Request(Request::from_parts(method, uri, version, headers, body))
        }
        StartLine::Status { version, status, reason } => {
            check_version(version)?;
            Message::Response(Response::from_parts(version, status, reason, headers, body))
        }
    };
    Ok(Some(message))
}

fn check_version(version: Version) -> Result<()> {
    if version.is_supported() {
        Ok(())
    } else {
        Err(Error::InvalidVersion(version.to_string()))
    }
}

fn split_head(data: &[u8]) -> (&[u8], &[u8]) {
    if let Some(i) = find(data, b"\r\n\r\n") {
        (&data[..i], &data[i + 4..])
    } else if let Some(i) = find(data, b"\n\n") {
        (&data[..i], &data[i + 2..])
    } else {
        (data, &data[data.len()..])
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Takes the body that follows the header block.
///
/// Exactly Content-Length bytes when the header parses and fits the data;
/// otherwise everything that is left, which is what a datagram transport
/// delivers anyway.
pub fn read_body(headers: &HeaderCollection, rest: &[u8]) -> Bytes {
    match headers
        .get(HeaderName::ContentLength)
        .map(|v| v.trim().parse::<i64>())
    {
        Some(Ok(len)) if len >= 0 && (len as usize) <= rest.len() => {
            Bytes::copy_from_slice(&rest[..len as usize])
        }
        Some(Ok(len)) => {
            warn!(declared = len, available = rest.len(), "Implausible Content-Length, using remaining data");
            Bytes::copy_from_slice(rest)
        }
        Some(Err(_)) => {
            warn!("Unparsable Content-Length, using remaining data");
            Bytes::copy_from_slice(rest)
        }
        None => {
            if !rest.is_empty() {
                debug!(len = rest.len(), "No Content-Length, body length inferred");
            }
            Bytes::copy_from_slice(rest)
        }
    }
}
