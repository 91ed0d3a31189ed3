//! Start-line parsers (RFC 3261 section 7.1 and 7.2)
//!
//! ```text
//! Request-Line  =  Method SP Request-URI SP SIP-Version CRLF
//! Status-Line   =  SIP-Version SP Status-Code SP Reason-Phrase CRLF
//! ```
//!
//! The line terminator has already been stripped by the caller.

use nom::{
    bytes::complete::{tag_no_case, take_till, take_till1, take_while1, take_while_m_n},
    character::complete::{char, digit1, space0, space1},
    combinator::{all_consuming, map_res, recognize},
    sequence::{preceded, terminated, tuple},
    IResult,
};

use crate::error::{Error, Result};
use crate::types::method::{is_token_char, Method};
use crate::types::status::StatusCode;
use crate::types::uri::{Scheme, Uri};
use crate::types::version::Version;

/// A parsed start line
#[derive(Debug, Clone, PartialEq)]
pub enum StartLine {
    Request {
        method: Method,
        uri: Uri,
        version: Version,
    },
    Status {
        version: Version,
        status: StatusCode,
        reason: String,
    },
}

fn sip_version(input: &str) -> IResult<&str, Version> {
    map_res(
        recognize(tuple((tag_no_case("SIP/"), digit1, char('.'), digit1))),
        |s: &str| s.parse::<Version>(),
    )(input)
}

/// `INVITE sip:bob@biloxi.com SIP/2.0`
pub fn request_line(input: &str) -> IResult<&str, (&str, &str, Version)> {
    all_consuming(tuple((
        terminated(take_while1(is_token_char), space1),
        terminated(take_till1(|c: char| c == ' '), space1),
        terminated(sip_version, space0),
    )))(input)
}

/// `SIP/2.0 180 Ringing`; the reason phrase may be empty
pub fn status_line(input: &str) -> IResult<&str, (Version, u16, &str)> {
    all_consuming(tuple((
        sip_version,
        preceded(
            space1,
            map_res(take_while_m_n(3, 3, |c: char| c.is_ascii_digit()), |s: &str| {
                s.parse::<u16>()
            }),
        ),
        preceded(space0, take_till(|c: char| c == '\r' || c == '\n')),
    )))(input)
}

/// Parses either form of start line
pub fn parse_start_line(line: &str) -> Result<StartLine> {
    let line = line.trim_end();
    let invalid = || Error::InvalidStartLine(line.to_string());

    if line.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("SIP/")) {
        let (_, (version, code, reason)) = status_line(line).map_err(|_| invalid())?;
        Ok(StartLine::Status {
            version,
            status: StatusCode::from_u16(code)?,
            reason: reason.trim().to_string(),
        })
    } else {
        let (_, (method, uri, version)) = request_line(line).map_err(|_| invalid())?;
        Ok(StartLine::Request {
            method: method.parse()?,
            uri: Uri::parse(uri, Scheme::Sip)?,
            version,
        })
    }
}
