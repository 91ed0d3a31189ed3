//! Hook for adding credentials to outgoing requests

use sipua_sip_core::{Request, Response};

/// Adds Authorization / Proxy-Authorization headers to requests.
///
/// Digest computation itself lives outside the transaction layer; this
/// trait only marks the points where it is needed.
pub trait Authenticator: Send + Sync {
    /// Adds credentials known in advance. Returns true if the request changed.
    fn authorize(&self, request: &mut Request) -> bool;

    /// Called with a 401/407 challenge for `request`.
    ///
    /// Returns true if new credentials were stored and the caller should
    /// retry the request in a new transaction.
    fn on_challenge(&self, _request: &Request, _response: &Response) -> bool {
        false
    }
}
