use std::str::Utf8Error;
use thiserror::Error;

/// A type alias for handling `Result`s with `Error` in SIP message handling.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing or building SIP messages
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Generic parse failure
    #[error("Parse error: {0}")]
    ParseError(String),

    /// URI text could not be parsed
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Request line or status line could not be parsed
    #[error("Invalid start line: {0}")]
    InvalidStartLine(String),

    /// The message carries a protocol version we refuse to handle
    #[error("Unsupported SIP version: {0}")]
    InvalidVersion(String),

    /// A header name was not acceptable (e.g. an unknown compact alias)
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Method token is not a valid SIP token
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// Status code outside 100..=699
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u16),

    /// Header value could not be interpreted
    #[error("Invalid {header} value: {value}")]
    InvalidHeaderValue {
        /// Name of the offending header
        header: String,
        /// Raw value that failed to parse
        value: String,
    },

    /// The header block was not valid UTF-8
    #[error("Invalid UTF-8 in message: {0}")]
    Utf8(String),
}

impl From<Utf8Error> for Error {
    fn from(e: Utf8Error) -> Self {
        Error::Utf8(e.to_string())
    }
}

impl<I: std::fmt::Debug> From<nom::Err<nom::error::Error<I>>> for Error {
    fn from(e: nom::Err<nom::error::Error<I>>) -> Self {
        match e {
            nom::Err::Incomplete(_) => Error::ParseError("incomplete input".to_string()),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                Error::ParseError(format!("{:?} at {:?}", e.code, e.input))
            }
        }
    }
}
