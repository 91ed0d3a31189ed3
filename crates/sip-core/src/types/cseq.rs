use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::method::Method;

/// CSeq header value: sequence number and method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CSeq {
    pub seq: u32,
    pub method: Method,
}

impl CSeq {
    pub fn new(seq: u32, method: Method) -> Self {
        CSeq { seq, method }
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.seq, self.method)
    }
}

impl FromStr for CSeq {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidHeaderValue {
            header: "CSeq".to_string(),
            value: s.to_string(),
        };
        let mut parts = s.split_whitespace();
        let seq = parts
            .next()
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let method = parts.next().ok_or_else(invalid)?.parse::<Method>()?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(CSeq { seq, method })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cseq() {
        let cseq: CSeq = " 314159  INVITE ".parse().unwrap();
        assert_eq!(cseq, CSeq::new(314159, Method::Invite));
        assert_eq!(cseq.to_string(), "314159 INVITE");
        assert!("INVITE".parse::<CSeq>().is_err());
        assert!("-1 BYE".parse::<CSeq>().is_err());
    }
}
