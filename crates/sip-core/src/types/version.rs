use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Protocol version carried in the start line (`SIP/2.0`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8) -> Self {
        Version { major, minor }
    }

    /// `SIP/2.0`
    pub const fn sip_2_0() -> Self {
        Version::new(2, 0)
    }

    /// Versions before 2.0 (RFC 2543 and older) are not spoken
    pub fn is_supported(&self) -> bool {
        self.major >= 2
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::sip_2_0()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let numbers = s
            .get(..4)
            .filter(|prefix| prefix.eq_ignore_ascii_case("SIP/"))
            .map(|_| &s[4..])
            .ok_or_else(|| Error::InvalidVersion(s.to_string()))?;
        let (major, minor) = numbers
            .split_once('.')
            .ok_or_else(|| Error::InvalidVersion(s.to_string()))?;
        let major = major
            .parse::<u8>()
            .map_err(|_| Error::InvalidVersion(s.to_string()))?;
        let minor = minor
            .parse::<u8>()
            .map_err(|_| Error::InvalidVersion(s.to_string()))?;
        Ok(Version { major, minor })
    }
}
