//! Transaction layer configuration
//!
//! All timer values default to the RFC 3261 recommendations (T1 = 500 ms,
//! T2 = 4 s, 64·T1 for INVITE). Durations serialize as whole milliseconds:
//!
//! ```
//! use std::time::Duration;
//! use sipua_transaction_core::TransactionConfig;
//!
//! let config = TransactionConfig::default()
//!     .with_max_retries(6)
//!     .with_user_agent("softphone/2.1");
//! assert_eq!(config.retry_timeout_min, Duration::from_millis(500));
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timers and protocol knobs shared by every client transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// First retransmission interval (T1)
    #[serde(with = "duration_ms")]
    pub retry_timeout_min: Duration,

    /// Retransmission interval cap (T2)
    #[serde(with = "duration_ms")]
    pub retry_timeout_max: Duration,

    /// Retransmissions allowed before the transaction gives up
    pub max_retries: u32,

    /// Time an INVITE may wait for any response (64·T1)
    #[serde(with = "duration_ms")]
    pub invite_timeout: Duration,

    /// Time a non-INVITE request may wait for a final response
    #[serde(with = "duration_ms")]
    pub non_invite_timeout: Duration,

    /// Time an INVITE may ring before it is cancelled
    #[serde(with = "duration_ms")]
    pub progress_timeout: Duration,

    /// How long a completed transaction absorbs retransmitted finals
    #[serde(with = "duration_ms")]
    pub cleanup_timeout: Duration,

    /// How long to wait for the 487 after sending CANCEL
    #[serde(with = "duration_ms")]
    pub cancel_timeout: Duration,

    pub max_forwards: u8,

    pub user_agent: String,

    /// Serialize headers with their single-letter aliases
    pub compact_headers: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            retry_timeout_min: Duration::from_millis(500),
            retry_timeout_max: Duration::from_secs(4),
            max_retries: 10,
            invite_timeout: Duration::from_secs(32),
            non_invite_timeout: Duration::from_secs(16),
            progress_timeout: Duration::from_secs(180),
            cleanup_timeout: Duration::from_secs(5),
            cancel_timeout: Duration::from_secs(32),
            max_forwards: 70,
            user_agent: format!("sipua/{}", env!("CARGO_PKG_VERSION")),
            compact_headers: false,
        }
    }
}

impl TransactionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retransmission interval bounds (T1, T2)
    pub fn with_retry_timeouts(mut self, min: Duration, max: Duration) -> Self {
        self.retry_timeout_min = min;
        self.retry_timeout_max = max;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_invite_timeout(mut self, timeout: Duration) -> Self {
        self.invite_timeout = timeout;
        self
    }

    pub fn with_non_invite_timeout(mut self, timeout: Duration) -> Self {
        self.non_invite_timeout = timeout;
        self
    }

    pub fn with_progress_timeout(mut self, timeout: Duration) -> Self {
        self.progress_timeout = timeout;
        self
    }

    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    pub fn with_cancel_timeout(mut self, timeout: Duration) -> Self {
        self.cancel_timeout = timeout;
        self
    }

    pub fn with_max_forwards(mut self, max_forwards: u8) -> Self {
        self.max_forwards = max_forwards;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_compact_headers(mut self, compact: bool) -> Self {
        self.compact_headers = compact;
        self
    }

    /// Checks the configuration for values that would stall or spin
    pub fn validate(&self) -> Result<()> {
        if self.retry_timeout_min.is_zero() {
            return Err(Error::Config("retry_timeout_min must be greater than 0".to_string()));
        }
        if self.retry_timeout_max < self.retry_timeout_min {
            return Err(Error::Config(
                "retry_timeout_max must not be below retry_timeout_min".to_string(),
            ));
        }
        let timeouts = [
            ("invite_timeout", self.invite_timeout),
            ("non_invite_timeout", self.non_invite_timeout),
            ("progress_timeout", self.progress_timeout),
            ("cleanup_timeout", self.cleanup_timeout),
            ("cancel_timeout", self.cancel_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }
        if self.max_forwards == 0 {
            return Err(Error::Config("max_forwards must be greater than 0".to_string()));
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
