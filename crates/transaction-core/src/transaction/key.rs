//! Correlation of responses with client transactions (RFC 3261 17.1.3)

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use sipua_sip_core::{HeaderCollection, Request, Response, BRANCH_MAGIC_COOKIE};

use crate::error::{Error, Result};

/// Creates a fresh RFC 3261 branch parameter
pub fn generate_branch() -> String {
    format!("{}{}", BRANCH_MAGIC_COOKIE, Uuid::new_v4().simple())
}

/// Identifies a client transaction.
///
/// Normally this is the `branch` of the top Via. Requests from pre-3261
/// peers have no magic cookie in the branch; for those the key is assembled
/// from the To and From addresses, the From tag, the Call-ID and the CSeq
/// number, which is weaker and is logged as such.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionKey(String);

impl TransactionKey {
    pub fn from_request(request: &Request) -> Result<Self> {
        Self::from_headers(&request.headers)
    }

    pub fn from_response(response: &Response) -> Result<Self> {
        Self::from_headers(&response.headers)
    }

    fn from_headers(headers: &HeaderCollection) -> Result<Self> {
        if let Some(branch) = headers
            .top_via()
            .and_then(|via| via.branch().map(str::to_string))
            .filter(|branch| branch.starts_with(BRANCH_MAGIC_COOKIE))
        {
            return Ok(TransactionKey(branch));
        }

        let to = headers.to_uri().ok_or(Error::MissingHeader("To"))?;
        let from = headers.from_uri().ok_or(Error::MissingHeader("From"))?;
        let call_id = headers.call_id().ok_or(Error::MissingHeader("Call-ID"))?;
        let cseq = headers.cseq().ok_or(Error::MissingHeader("CSeq"))?;

        let key = format!(
            "{}|{};tag={}|{}|{}",
            to.as_canonical_string(),
            from.as_canonical_string(),
            from.tag().unwrap_or_default(),
            call_id,
            cseq.seq
        );
        warn!(key = %key, "No RFC 3261 branch, correlating on dialog headers");
        Ok(TransactionKey(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key came from an RFC 3261 branch
    pub fn is_branch(&self) -> bool {
        self.0.starts_with(BRANCH_MAGIC_COOKIE)
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
