//! # Client transactions
//!
//! A [`Transaction`] sends one request and follows it until the outcome is
//! known, implementing the client side of RFC 3261 section 17.1 for both
//! INVITE and non-INVITE requests in a single state machine.
//!
//! ## State machine
//!
//! ```text
//!              start()
//! NotStarted ──────────▶ Trying ──1xx──▶ Proceeding ──final──▶ Completed
//!                          │                 │                     │
//!                          │ timeout     timeout (INVITE):         │ cleanup
//!                          │             send CANCEL               │ timer
//!                          ▼                 ▼                     ▼
//!                     Terminated  ◀──── Cancelling ──487──▶  Terminated
//! ```
//!
//! Two timers drive it:
//!
//! - the **retry timer** retransmits on unreliable transports, starting at
//!   `retry_timeout_min` (T1) and doubling up to `retry_timeout_max` (T2);
//!   after `max_retries` retransmissions the transaction gives up
//! - the **completion timer** bounds each state: the overall request timeout
//!   while `Trying`, the ringing time while an INVITE is `Proceeding`, the
//!   CANCEL wait while `Cancelling`, and the period during which
//!   retransmitted final responses are absorbed once `Completed`
//!
//! ## Locking
//!
//! All mutable state sits behind one `parking_lot::RwLock`. Handlers decide
//! what to do under the write lock and return a list of actions; the actions
//! (writes, owner callbacks, the completion signal) run after the lock is
//! released. The lock is never held across an `.await`.

pub mod completion;
pub mod key;
pub mod state;
pub(crate) mod timer;

pub use completion::{Completion, CompletionSignal};
pub use key::{generate_branch, TransactionKey};
pub use state::{TerminationReason, TransactionKind, TransactionState};

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use sipua_sip_core::{HeaderName, Method, Request, Response, StatusCode, Uri};
use sipua_sip_transport::{Resolver, Transport};

use crate::auth::Authenticator;
use crate::builders::{self, LocalEndpoint};
use crate::config::TransactionConfig;
use crate::dialog::{DialogContext, SharedDialog};
use crate::error::{Error, Result};
use crate::owner::TransactionOwner;
use crate::registry::TransactionRegistry;

use timer::TimerSlot;

/// Collaborators shared by every transaction of one layer
#[derive(Clone)]
pub(crate) struct Environment {
    pub(crate) config: Arc<TransactionConfig>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) registry: Arc<TransactionRegistry>,
    pub(crate) authenticator: Option<Arc<dyn Authenticator>>,
    pub(crate) endpoint: LocalEndpoint,
}

/// Where a message goes
#[derive(Debug, Clone)]
enum Destination {
    Known(SocketAddr),
    /// Next hop that still has to be resolved
    Resolve(String, u16),
}

/// Work decided under the lock and carried out after it is released
enum Action {
    Send {
        data: Bytes,
        destination: Destination,
        what: &'static str,
    },
    Provisional(Response),
    Final(Response),
    Challenge(Response),
    Complete(Completion),
    Terminated(TerminationReason),
}

struct Outgoing {
    data: Bytes,
    destination: Destination,
    what: &'static str,
}

struct TransactionData {
    state: TransactionState,
    history: Vec<TransactionState>,
    request: Request,
    request_bytes: Bytes,
    destination: Option<SocketAddr>,
    retry_count: u32,
    retry_interval: Duration,
    retry_timer: TimerSlot,
    completion_timer: TimerSlot,
    cancel: Option<(Request, Bytes)>,
    ack: Option<(Request, Bytes, Destination)>,
    final_status: Option<StatusCode>,
    final_response: Option<Response>,
    cancelled: bool,
}

struct Inner {
    key: TransactionKey,
    kind: TransactionKind,
    env: Environment,
    owner: Arc<dyn TransactionOwner>,
    dialog: Option<SharedDialog>,
    completion: CompletionSignal,
    state_tx: watch::Sender<TransactionState>,
    data: RwLock<TransactionData>,
}

/// A client transaction
///
/// Cloning is cheap and yields another handle to the same transaction.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<Inner>,
}

impl Transaction {
    /// Creates a transaction for `request` without sending anything.
    ///
    /// An INVITE without a dialog context gets one derived from the request,
    /// which its 2xx ACK is built from.
    pub(crate) fn new(
        kind: TransactionKind,
        request: Request,
        env: Environment,
        dialog: Option<SharedDialog>,
        owner: Arc<dyn TransactionOwner>,
    ) -> Result<Self> {
        if request.method != kind.method() {
            return Err(Error::UnsupportedMethod(request.method.clone()));
        }
        let key = TransactionKey::from_request(&request)?;
        let dialog = match dialog {
            Some(dialog) => Some(dialog),
            None if kind.is_invite() => Some(crate::dialog::shared(
                DialogContext::from_outgoing_request(&request)?,
            )),
            None => None,
        };
        let retry_interval = env.config.retry_timeout_min;
        let (state_tx, _) = watch::channel(TransactionState::NotStarted);

        Ok(Transaction {
            inner: Arc::new(Inner {
                key,
                kind,
                env,
                owner,
                dialog,
                completion: CompletionSignal::new(),
                state_tx,
                data: RwLock::new(TransactionData {
                    state: TransactionState::NotStarted,
                    history: vec![TransactionState::NotStarted],
                    request,
                    request_bytes: Bytes::new(),
                    destination: None,
                    retry_count: 0,
                    retry_interval,
                    retry_timer: TimerSlot::default(),
                    completion_timer: TimerSlot::default(),
                    cancel: None,
                    ack: None,
                    final_status: None,
                    final_response: None,
                    cancelled: false,
                }),
            }),
        })
    }

    pub fn key(&self) -> &TransactionKey {
        &self.inner.key
    }

    pub fn kind(&self) -> &TransactionKind {
        &self.inner.kind
    }

    pub fn method(&self) -> Method {
        self.inner.kind.method()
    }

    pub fn state(&self) -> TransactionState {
        self.inner.data.read().state
    }

    /// Every state the transaction has been in, oldest first
    pub fn state_history(&self) -> Vec<TransactionState> {
        self.inner.data.read().history.clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.state().is_terminated()
    }

    /// The request as sent, including credentials added on start
    pub fn request(&self) -> Request {
        self.inner.data.read().request.clone()
    }

    pub fn final_status(&self) -> Option<StatusCode> {
        self.inner.data.read().final_status
    }

    pub fn final_response(&self) -> Option<Response> {
        self.inner.data.read().final_response.clone()
    }

    /// Retransmissions in the current state
    pub fn retry_count(&self) -> u32 {
        self.inner.data.read().retry_count
    }

    /// Address the request was delivered to
    pub fn destination(&self) -> Option<SocketAddr> {
        self.inner.data.read().destination
    }

    pub fn dialog(&self) -> Option<SharedDialog> {
        self.inner.dialog.clone()
    }

    pub fn cancel_request(&self) -> Option<Request> {
        self.inner.data.read().cancel.as_ref().map(|(request, _)| request.clone())
    }

    pub fn ack_request(&self) -> Option<Request> {
        self.inner.data.read().ack.as_ref().map(|(request, _, _)| request.clone())
    }

    /// Waits until a final response arrives or the transaction ends without one
    pub async fn wait_for_completion(&self) -> Completion {
        self.inner.completion.wait().await
    }

    /// Blocking variant of [`Transaction::wait_for_completion`]; must not be
    /// called from an async context
    pub fn wait_for_completion_blocking(&self) -> Completion {
        self.inner.completion.wait_blocking()
    }

    /// Waits for the terminal state
    pub async fn wait_for_termination(&self) -> TerminationReason {
        let mut rx = self.inner.state_tx.subscribe();
        let state = match rx.wait_for(TransactionState::is_terminated).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        match state {
            TransactionState::Terminated(reason) => reason,
            _ => TerminationReason::Aborted,
        }
    }

    /// Sends the request and arms the timers.
    ///
    /// Resolution candidates are tried in order until one write succeeds.
    /// If none does, the transaction terminates with `TransportError`.
    pub async fn start(&self) -> Result<()> {
        let (host, port) = {
            let mut data = self.inner.data.write();
            if data.state != TransactionState::NotStarted {
                return Err(Error::InvalidState {
                    operation: "start",
                    state: data.state,
                });
            }
            if let Some(authenticator) = &self.inner.env.authenticator {
                if authenticator.authorize(&mut data.request) {
                    debug!(key = %self.inner.key, "Credentials added to request");
                }
            }
            next_hop(&data.request)
        };

        let candidates = match self.inner.env.resolver.resolve(&host, port).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(key = %self.inner.key, host = %host, error = %e, "Cannot resolve next hop");
                self.terminate(TerminationReason::TransportError);
                return Err(e.into());
            }
        };

        self.inner.env.registry.register(self.clone())?;

        let bytes = {
            let mut data = self.inner.data.write();
            let bytes = data.request.to_bytes_with(self.inner.env.config.compact_headers);
            data.request_bytes = bytes.clone();
            self.transition(&mut data, TransactionState::Trying);
            data.retry_interval = self.inner.env.config.retry_timeout_min;
            if !self.inner.env.transport.is_reliable() {
                let interval = data.retry_interval;
                self.arm_retry(&mut data, interval);
            }
            let timeout = if self.inner.kind.is_invite() {
                self.inner.env.config.invite_timeout
            } else {
                self.inner.env.config.non_invite_timeout
            };
            self.arm_completion(&mut data, timeout);
            bytes
        };

        info!(key = %self.inner.key, kind = %self.inner.kind, host = %host, "Starting client transaction");
        let mut last_error = None;
        for candidate in candidates {
            match self.inner.env.transport.write(&bytes, candidate).await {
                Ok(()) => {
                    debug!(key = %self.inner.key, destination = %candidate, "Request sent");
                    trace!(message = %String::from_utf8_lossy(&bytes), "Sent");
                    self.inner.data.write().destination = Some(candidate);
                    return Ok(());
                }
                Err(e) => {
                    debug!(key = %self.inner.key, destination = %candidate, error = %e, "Write failed, trying next candidate");
                    last_error = Some(e);
                }
            }
        }

        self.terminate(TerminationReason::TransportError);
        Err(match last_error {
            Some(e) => e.into(),
            None => sipua_sip_transport::Error::NoCandidates(host).into(),
        })
    }

    /// Cancels a pending request.
    ///
    /// An INVITE sends CANCEL and waits for the 487; other kinds terminate
    /// with `Cancelled` at once since they have no CANCEL on the wire.
    pub async fn cancel(&self) -> Result<()> {
        let actions = {
            let mut data = self.inner.data.write();
            match data.state {
                TransactionState::Trying | TransactionState::Proceeding => {}
                state => {
                    return Err(Error::InvalidState {
                        operation: "cancel",
                        state,
                    })
                }
            }
            data.cancelled = true;
            if self.inner.kind.is_invite() {
                self.begin_cancel(&mut data)
            } else {
                self.terminate_locked(&mut data, TerminationReason::Cancelled)
            }
        };
        self.execute(actions).await;
        Ok(())
    }

    /// Tears the transaction down without sending anything
    pub fn abort(&self) -> Result<()> {
        let actions = {
            let mut data = self.inner.data.write();
            if data.state.is_terminated() {
                return Err(Error::InvalidState {
                    operation: "abort",
                    state: data.state,
                });
            }
            self.terminate_locked(&mut data, TerminationReason::Aborted)
        };
        self.notify(actions);
        Ok(())
    }

    /// Feeds a response that was matched to this transaction and waits
    /// for any resulting ACK to be written
    pub async fn handle_response(&self, response: Response, source: SocketAddr) {
        let actions = {
            let mut data = self.inner.data.write();
            self.process_response(&mut data, response, source)
        };
        self.execute(actions).await;
    }

    /// Like [`Transaction::handle_response`], but resolving and writing the
    /// ACK happen on a separate task so the caller never waits on the
    /// network. Owner callbacks still run before this returns.
    pub(crate) fn dispatch_response(&self, response: Response, source: SocketAddr) {
        let actions = {
            let mut data = self.inner.data.write();
            self.process_response(&mut data, response, source)
        };
        let sends = self.notify(actions);
        if !sends.is_empty() {
            let transaction = self.clone();
            tokio::spawn(async move { transaction.transmit(sends).await });
        }
    }

    fn process_response(
        &self,
        data: &mut TransactionData,
        response: Response,
        source: SocketAddr,
    ) -> Vec<Action> {
        let key = &self.inner.key;
        if matches!(data.state, TransactionState::NotStarted | TransactionState::Terminated(_)) {
            debug!(key = %key, state = %data.state, status = %response.status, "Response outside active states dropped");
            return Vec::new();
        }
        let Some(cseq) = response.cseq() else {
            debug!(key = %key, "Response without CSeq dropped");
            return Vec::new();
        };

        if let Some(dialog) = &self.inner.dialog {
            dialog.write().remote_transport_address = Some(source);
        }

        if cseq.method == Method::Cancel {
            if data.state == TransactionState::Cancelling {
                debug!(key = %key, status = %response.status, "CANCEL answered");
                data.retry_timer.stop();
            }
            return Vec::new();
        }

        if response.status.is_provisional() {
            self.process_provisional(data, response)
        } else {
            self.process_final(data, response)
        }
    }

    fn process_provisional(&self, data: &mut TransactionData, response: Response) -> Vec<Action> {
        if !matches!(data.state, TransactionState::Trying | TransactionState::Proceeding) {
            trace!(key = %self.inner.key, state = %data.state, "Late provisional response ignored");
            return Vec::new();
        }
        let config = &self.inner.env.config;

        self.transition(data, TransactionState::Proceeding);
        data.retry_count = 0;
        data.retry_interval = config.retry_timeout_max;
        if !self.inner.env.transport.is_reliable() {
            self.arm_retry(data, config.retry_timeout_max);
        }
        let wait = match response.headers.expires() {
            Some(seconds) => Duration::from_secs(u64::from(seconds)),
            None if self.inner.kind.is_invite() => config.progress_timeout,
            None => config.non_invite_timeout,
        };
        self.arm_completion(data, wait);

        if self.inner.kind.is_invite() {
            if let (Some(dialog), Some(tag)) = (&self.inner.dialog, response.to_tag()) {
                dialog.write().set_remote_tag(&tag);
            }
        }
        debug!(key = %self.inner.key, status = %response.status, "Provisional response");
        vec![Action::Provisional(response)]
    }

    fn process_final(&self, data: &mut TransactionData, response: Response) -> Vec<Action> {
        let key = &self.inner.key;
        let status = response.status;
        let mut actions = Vec::new();

        if data.final_status.is_some() {
            debug!(key = %key, status = %status, "Retransmitted final response");
            if let Some((_, bytes, destination)) = &data.ack {
                actions.push(Action::Send {
                    data: bytes.clone(),
                    destination: destination.clone(),
                    what: "ACK",
                });
            }
            return actions;
        }

        info!(key = %key, status = %status, "Final response");
        data.retry_timer.stop();
        data.final_status = Some(status);
        data.final_response = Some(response.clone());
        self.transition(data, TransactionState::Completed);
        self.arm_completion(data, self.inner.env.config.cleanup_timeout);

        if self.inner.kind.is_invite() {
            match self.build_ack(data, &response) {
                Ok((ack, destination)) => {
                    let bytes = ack.to_bytes_with(self.inner.env.config.compact_headers);
                    actions.push(Action::Send {
                        data: bytes.clone(),
                        destination: destination.clone(),
                        what: "ACK",
                    });
                    data.ack = Some((ack, bytes, destination));
                }
                Err(e) => warn!(key = %key, error = %e, "Cannot build ACK"),
            }
        }

        if status.is_auth_challenge() {
            actions.push(Action::Challenge(response.clone()));
        }
        actions.push(Action::Final(response));
        actions.push(Action::Complete(Completion {
            status: Some(status),
            state: TransactionState::Completed,
        }));
        actions
    }

    fn build_ack(&self, data: &TransactionData, response: &Response) -> Result<(Request, Destination)> {
        let mut ack = if response.status.is_success() {
            let seq = data.request.cseq().ok_or(Error::MissingHeader("CSeq"))?.seq;
            match &self.inner.dialog {
                Some(dialog) => {
                    let mut dialog = dialog.write();
                    dialog.update_from_response(response);
                    builders::build_ack_for_2xx(&self.inner.env.endpoint, &dialog, seq)
                }
                None => {
                    let mut dialog = DialogContext::from_outgoing_request(&data.request)?;
                    dialog.update_from_response(response);
                    builders::build_ack_for_2xx(&self.inner.env.endpoint, &dialog, seq)
                }
            }
        } else {
            builders::build_ack_for_non_2xx(&data.request, response)?
        };

        let carried_credentials = data.request.headers.contains(HeaderName::Authorization)
            || data.request.headers.contains(HeaderName::ProxyAuthorization);
        if carried_credentials {
            if let Some(authenticator) = &self.inner.env.authenticator {
                authenticator.authorize(&mut ack);
            }
        }

        // A non-2xx ACK stays in the INVITE transaction and follows the INVITE
        let destination = match (response.status.is_success(), data.destination) {
            (false, Some(destination)) => Destination::Known(destination),
            _ => {
                let (host, port) = next_hop(&ack);
                Destination::Resolve(host, port)
            }
        };
        Ok((ack, destination))
    }

    fn begin_cancel(&self, data: &mut TransactionData) -> Vec<Action> {
        let config = &self.inner.env.config;
        let cancel = match builders::build_cancel(&data.request) {
            Ok(cancel) => cancel,
            Err(e) => {
                warn!(key = %self.inner.key, error = %e, "Cannot build CANCEL");
                return self.terminate_locked(data, TerminationReason::Cancelled);
            }
        };
        let bytes = cancel.to_bytes_with(config.compact_headers);
        data.cancel = Some((cancel, bytes.clone()));
        data.cancelled = true;

        self.transition(data, TransactionState::Cancelling);
        data.retry_count = 0;
        data.retry_interval = config.retry_timeout_min;
        if self.inner.env.transport.is_reliable() {
            data.retry_timer.stop();
        } else {
            self.arm_retry(data, config.retry_timeout_min);
        }
        self.arm_completion(data, config.cancel_timeout);

        info!(key = %self.inner.key, "Cancelling INVITE");
        match data.destination {
            Some(destination) => vec![Action::Send {
                data: bytes,
                destination: Destination::Known(destination),
                what: "CANCEL",
            }],
            None => Vec::new(),
        }
    }

    async fn on_retry_timer(&self, generation: u64) {
        let actions = {
            let mut data = self.inner.data.write();
            if !data.retry_timer.fire(generation) {
                return;
            }
            self.process_retry(&mut data)
        };
        self.execute(actions).await;
    }

    fn process_retry(&self, data: &mut TransactionData) -> Vec<Action> {
        let config = &self.inner.env.config;
        let (message, what) = match data.state {
            TransactionState::Trying => (data.request_bytes.clone(), "request"),
            TransactionState::Cancelling => match &data.cancel {
                Some((_, bytes)) => (bytes.clone(), "CANCEL"),
                None => return Vec::new(),
            },
            TransactionState::Proceeding if self.inner.kind.is_invite() => {
                // The INVITE is not resent once the far end answered
                self.arm_retry(data, config.retry_timeout_max);
                return Vec::new();
            }
            TransactionState::Proceeding => (data.request_bytes.clone(), "request"),
            _ => return Vec::new(),
        };

        data.retry_count += 1;
        if data.retry_count > config.max_retries {
            warn!(key = %self.inner.key, retries = config.max_retries, "No response after retransmissions");
            return self.terminate_locked(data, TerminationReason::RetriesExceeded);
        }

        data.retry_interval = (data.retry_interval * 2).min(config.retry_timeout_max);
        if data.state == TransactionState::Proceeding {
            data.retry_interval = config.retry_timeout_max;
        }
        let interval = data.retry_interval;
        self.arm_retry(data, interval);

        debug!(key = %self.inner.key, what, count = data.retry_count, "Retransmitting");
        match data.destination {
            Some(destination) => vec![Action::Send {
                data: message,
                destination: Destination::Known(destination),
                what,
            }],
            None => Vec::new(),
        }
    }

    async fn on_completion_timer(&self, generation: u64) {
        let actions = {
            let mut data = self.inner.data.write();
            if !data.completion_timer.fire(generation) {
                return;
            }
            self.process_completion(&mut data)
        };
        self.execute(actions).await;
    }

    fn process_completion(&self, data: &mut TransactionData) -> Vec<Action> {
        match data.state {
            TransactionState::Trying => {
                info!(key = %self.inner.key, "Request timed out");
                self.terminate_locked(data, TerminationReason::Timeout)
            }
            TransactionState::Proceeding if self.inner.kind.is_invite() => self.begin_cancel(data),
            TransactionState::Proceeding => {
                info!(key = %self.inner.key, "No final response in time");
                self.terminate_locked(data, TerminationReason::Timeout)
            }
            TransactionState::Cancelling => self.terminate_locked(data, TerminationReason::Cancelled),
            TransactionState::Completed if data.cancelled => {
                self.terminate_locked(data, TerminationReason::Cancelled)
            }
            TransactionState::Completed => self.terminate_locked(data, TerminationReason::Success),
            _ => Vec::new(),
        }
    }

    fn arm_retry(&self, data: &mut TransactionData, after: Duration) {
        let weak = Arc::downgrade(&self.inner);
        data.retry_timer.arm(after, move |generation| async move {
            if let Some(transaction) = upgrade(&weak) {
                transaction.on_retry_timer(generation).await;
            }
        });
    }

    fn arm_completion(&self, data: &mut TransactionData, after: Duration) {
        let weak = Arc::downgrade(&self.inner);
        data.completion_timer.arm(after, move |generation| async move {
            if let Some(transaction) = upgrade(&weak) {
                transaction.on_completion_timer(generation).await;
            }
        });
    }

    /// Moves to `next` unless that would go backwards or leave `Terminated`
    fn transition(&self, data: &mut TransactionData, next: TransactionState) -> bool {
        if data.state == next {
            return true;
        }
        if !data.state.can_transition_to(next) {
            warn!(key = %self.inner.key, from = %data.state, to = %next, "Refusing state transition");
            return false;
        }
        debug!(key = %self.inner.key, from = %data.state, to = %next, "State transition");
        data.state = next;
        data.history.push(next);
        self.inner.state_tx.send_replace(next);
        true
    }

    fn terminate_locked(&self, data: &mut TransactionData, reason: TerminationReason) -> Vec<Action> {
        if !self.transition(data, TransactionState::Terminated(reason)) {
            return Vec::new();
        }
        data.retry_timer.stop();
        data.completion_timer.stop();
        vec![Action::Terminated(reason)]
    }

    fn terminate(&self, reason: TerminationReason) {
        let actions = {
            let mut data = self.inner.data.write();
            self.terminate_locked(&mut data, reason)
        };
        self.notify(actions);
    }

    /// Owner callbacks run before any write, so a failed ACK still leaves
    /// the final response delivered.
    async fn execute(&self, actions: Vec<Action>) {
        let sends = self.notify(actions);
        self.transmit(sends).await;
    }

    async fn transmit(&self, sends: Vec<Outgoing>) {
        for outgoing in sends {
            let what = outgoing.what;
            if let Err(e) = self.send(&outgoing.data, outgoing.destination, what).await {
                warn!(key = %self.inner.key, what, error = %e, "Send failed");
                self.terminate(TerminationReason::TransportError);
                return;
            }
        }
    }

    /// Runs the actions that do not touch the network and hands back the
    /// writes
    fn notify(&self, actions: Vec<Action>) -> Vec<Outgoing> {
        let mut sends = Vec::new();
        for action in actions {
            match action {
                Action::Send {
                    data,
                    destination,
                    what,
                } => sends.push(Outgoing {
                    data,
                    destination,
                    what,
                }),
                Action::Provisional(response) => self.inner.owner.on_provisional(self, &response),
                Action::Final(response) => self.inner.owner.on_final(self, &response),
                Action::Challenge(response) => {
                    if let Some(authenticator) = &self.inner.env.authenticator {
                        let request = self.request();
                        if authenticator.on_challenge(&request, &response) {
                            debug!(key = %self.inner.key, "Credentials updated from challenge");
                        }
                    }
                }
                Action::Complete(completion) => {
                    self.inner.completion.signal(completion);
                }
                Action::Terminated(reason) => self.finish(reason),
            }
        }
        sends
    }

    fn finish(&self, reason: TerminationReason) {
        info!(key = %self.inner.key, ?reason, "Transaction terminated");
        self.inner.env.registry.deregister(&self.inner.key);
        self.inner.owner.on_terminated(self, reason);
        self.inner.completion.signal(Completion {
            status: self.final_status(),
            state: TransactionState::Terminated(reason),
        });
    }

    async fn send(&self, data: &[u8], destination: Destination, what: &'static str) -> Result<()> {
        let address = match destination {
            Destination::Known(address) => address,
            Destination::Resolve(host, port) => {
                let candidates = self.inner.env.resolver.resolve(&host, port).await?;
                candidates
                    .into_iter()
                    .next()
                    .ok_or(sipua_sip_transport::Error::NoCandidates(host))?
            }
        };
        debug!(key = %self.inner.key, what, destination = %address, "Sending");
        self.inner.env.transport.write(data, address).await?;
        Ok(())
    }
}

fn upgrade(weak: &Weak<Inner>) -> Option<Transaction> {
    weak.upgrade().map(|inner| Transaction { inner })
}

/// Host and port a request is sent to: the first Route if it is a loose
/// router, otherwise the Request-URI; `maddr` overrides the host.
fn next_hop(request: &Request) -> (String, u16) {
    let target: Uri = request
        .headers
        .route_set()
        .into_iter()
        .next()
        .filter(Uri::is_loose_route)
        .unwrap_or_else(|| request.uri.clone());
    let host = match target.maddr() {
        Some(maddr) => maddr.to_string(),
        None => target.host.as_str(),
    };
    (host, target.effective_port())
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("key", &self.inner.key)
            .field("kind", &self.inner.kind)
            .field("state", &self.state())
            .finish()
    }
}
