//! End-to-end client transaction scenarios over an in-memory transport with
//! a scripted peer. Time is paused, so timer-driven paths run instantly and
//! their timing can be asserted exactly.

mod common;

use std::time::Duration;

use tokio::time::Instant;

use sipua_sip_core::{HeaderName, Method, StatusCode};
use sipua_transaction_core::builders;
use sipua_transaction_core::prelude::*;

use common::{assert_monotonic, Harness, OwnerEvent, RecordingOwner};

#[tokio::test(start_paused = true)]
async fn test_invite_answered_sends_ack_in_dialog() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let dialog = h.dialog();
    let invite = builders::build_invite(h.layer.local_endpoint(), &mut dialog.write(), None);
    let tx = h
        .layer
        .create_client_transaction(invite, Some(dialog.clone()), owner.clone())
        .unwrap();
    tx.start().await.unwrap();

    let sent = h.peer_receive_request().await;
    assert_eq!(sent.method, Method::Invite);
    h.peer_reply(&sent, StatusCode::TRYING, None).await;
    let mut ok = common::reply_to(&sent, StatusCode::OK, Some("bob-tag"));
    ok.headers.add(HeaderName::RecordRoute, "<sip:127.0.0.2:5080;lr>");
    ok.headers.add(HeaderName::RecordRoute, "<sip:127.0.0.3:5090;lr>");
    h.peer_send(&ok).await;

    let completion = tx.wait_for_completion().await;
    assert_eq!(completion.status, Some(StatusCode::OK));
    assert_eq!(completion.state, TransactionState::Completed);

    let ack = h.peer_receive_request().await;
    let route_ports: Vec<_> = ack.headers.route_set().iter().map(|r| r.port).collect();
    assert_eq!(route_ports, vec![Some(5090), Some(5080)], "Record-Route reversed");
    let (_, ack_destination) = h.client.sent().last().cloned().unwrap();
    assert_eq!(ack_destination, "127.0.0.3:5090".parse().unwrap());
    assert_eq!(ack.method, Method::Ack);
    assert_ne!(
        ack.top_via().unwrap().branch(),
        sent.top_via().unwrap().branch(),
        "2xx ACK is a new transaction"
    );
    assert_eq!(ack.cseq().unwrap().seq, sent.cseq().unwrap().seq);
    assert_eq!(ack.to_uri().unwrap().tag(), Some("bob-tag"));
    assert_eq!(ack.uri.user.as_deref(), Some("bob"));
    assert_eq!(ack.uri.port, Some(5070));

    {
        let dialog = dialog.read();
        assert_eq!(dialog.remote_tag.as_deref(), Some("bob-tag"));
        assert!(dialog.is_established());
        assert_eq!(dialog.remote_transport_address, Some(common::peer_addr()));
    }

    assert_eq!(tx.wait_for_termination().await, TerminationReason::Success);
    assert_eq!(
        owner.events(),
        vec![
            OwnerEvent::Provisional(100),
            OwnerEvent::Final(200),
            OwnerEvent::Terminated(TerminationReason::Success),
        ]
    );
    assert_eq!(
        tx.state_history(),
        vec![
            TransactionState::NotStarted,
            TransactionState::Trying,
            TransactionState::Proceeding,
            TransactionState::Completed,
            TransactionState::Terminated(TerminationReason::Success),
        ]
    );
    assert!(h.layer.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_invite_times_out_without_cancel() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let dialog = h.dialog();
    let invite = builders::build_invite(h.layer.local_endpoint(), &mut dialog.write(), None);
    let tx = h
        .layer
        .create_client_transaction(invite, Some(dialog), owner.clone())
        .unwrap();

    let started = Instant::now();
    tx.start().await.unwrap();
    assert_eq!(tx.wait_for_termination().await, TerminationReason::Timeout);
    assert_eq!(started.elapsed(), Duration::from_secs(32));

    // Original plus retransmissions at 0.5, 1.5, 3.5, 7.5, then every 4s
    let methods = h.sent_methods();
    assert_eq!(methods.len(), 11);
    assert!(methods.iter().all(|m| m == "INVITE"), "{:?}", methods);

    let completion = tx.wait_for_completion().await;
    assert_eq!(completion.status, None);
    assert_eq!(
        completion.state,
        TransactionState::Terminated(TerminationReason::Timeout)
    );
    assert_eq!(
        owner.events(),
        vec![OwnerEvent::Terminated(TerminationReason::Timeout)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_ringing_without_answer_sends_cancel() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let dialog = h.dialog();
    let invite = builders::build_invite(h.layer.local_endpoint(), &mut dialog.write(), None);
    let tx = h
        .layer
        .create_client_transaction(invite, Some(dialog), owner.clone())
        .unwrap();

    let started = Instant::now();
    tx.start().await.unwrap();
    let sent = h.peer_receive_request().await;
    h.peer_reply(&sent, StatusCode::RINGING, Some("bob-tag")).await;

    // Nothing is resent while ringing; the next request is the CANCEL
    let cancel = h.peer_receive_request().await;
    assert_eq!(started.elapsed(), Duration::from_secs(180));
    assert_eq!(cancel.method, Method::Cancel);
    assert_eq!(cancel.top_via(), sent.top_via());
    assert_eq!(cancel.cseq().unwrap().seq, sent.cseq().unwrap().seq);
    assert_eq!(cancel.uri.to_string(), sent.uri.to_string());
    assert_eq!(tx.state(), TransactionState::Cancelling);

    // CANCEL accepted but the INVITE is never answered
    h.peer_reply(&cancel, StatusCode::OK, None).await;
    assert_eq!(tx.wait_for_termination().await, TerminationReason::Cancelled);
    assert_eq!(started.elapsed(), Duration::from_secs(180 + 32));

    assert_eq!(h.sent_methods(), vec!["INVITE", "CANCEL"]);
    assert_eq!(
        owner.events(),
        vec![
            OwnerEvent::Provisional(180),
            OwnerEvent::Terminated(TerminationReason::Cancelled),
        ]
    );
    assert_monotonic(&tx.state_history());
}

#[tokio::test(start_paused = true)]
async fn test_provisional_expires_shortens_ringing() {
    let h = Harness::new(TransactionConfig::default());
    let dialog = h.dialog();
    let invite = builders::build_invite(h.layer.local_endpoint(), &mut dialog.write(), None);
    let tx = h
        .layer
        .create_client_transaction(invite, Some(dialog), RecordingOwner::new())
        .unwrap();

    let started = Instant::now();
    tx.start().await.unwrap();
    let sent = h.peer_receive_request().await;
    let mut ringing = sipua_sip_core::Response::build_to(&sent, StatusCode::RINGING);
    ringing.headers.set(HeaderName::Expires, "20");
    h.peer_send(&ringing).await;

    let cancel = h.peer_receive_request().await;
    assert_eq!(cancel.method, Method::Cancel);
    assert_eq!(started.elapsed(), Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_owner_cancel_then_487_is_acked() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let dialog = h.dialog();
    let invite = builders::build_invite(h.layer.local_endpoint(), &mut dialog.write(), None);
    let tx = h
        .layer
        .create_client_transaction(invite, Some(dialog), owner.clone())
        .unwrap();
    tx.start().await.unwrap();

    let sent = h.peer_receive_request().await;
    h.peer_reply(&sent, StatusCode::RINGING, Some("bob-tag")).await;
    let ringing_seen = owner.clone();
    while ringing_seen.events().is_empty() {
        tokio::task::yield_now().await;
    }

    tx.cancel().await.unwrap();
    let cancel = h.peer_receive_request().await;
    assert_eq!(cancel.method, Method::Cancel);
    assert!(tx.cancel_request().is_some());

    h.peer_reply(&cancel, StatusCode::OK, None).await;
    h.peer_reply(&sent, StatusCode::REQUEST_TERMINATED, Some("bob-tag")).await;

    let completion = tx.wait_for_completion().await;
    assert_eq!(completion.status, Some(StatusCode::REQUEST_TERMINATED));

    let ack = h.peer_receive_request().await;
    assert_eq!(ack.method, Method::Ack);
    assert_eq!(ack.top_via(), sent.top_via());

    assert_eq!(tx.wait_for_termination().await, TerminationReason::Cancelled);
    assert_eq!(
        owner.events(),
        vec![
            OwnerEvent::Provisional(180),
            OwnerEvent::Final(487),
            OwnerEvent::Terminated(TerminationReason::Cancelled),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_busy_is_acked_on_invite_branch_and_retransmissions_absorbed() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let dialog = h.dialog();
    let invite = builders::build_invite(h.layer.local_endpoint(), &mut dialog.write(), None);
    let tx = h
        .layer
        .create_client_transaction(invite, Some(dialog), owner.clone())
        .unwrap();
    tx.start().await.unwrap();

    let sent = h.peer_receive_request().await;
    let busy = h.peer_reply(&sent, StatusCode::BUSY_HERE, Some("bob-tag")).await;
    let completion = tx.wait_for_completion().await;
    assert_eq!(completion.status, Some(StatusCode::BUSY_HERE));

    let ack = h.peer_receive_request().await;
    assert_eq!(ack.method, Method::Ack);
    assert_eq!(ack.top_via(), sent.top_via());
    assert_eq!(ack.cseq().unwrap().seq, sent.cseq().unwrap().seq);
    assert_eq!(ack.cseq().unwrap().method, Method::Ack);
    assert_eq!(ack.call_id(), sent.call_id());
    assert_eq!(ack.to_uri().unwrap().tag(), Some("bob-tag"));

    // The peer did not see our ACK and resends the 486
    h.peer_send(&busy).await;
    let again = h.peer_receive_request().await;
    assert_eq!(again.method, Method::Ack);
    assert_eq!(again.top_via(), ack.top_via());

    assert_eq!(tx.wait_for_termination().await, TerminationReason::Success);
    assert_eq!(owner.finals(), 1);
    assert_eq!(h.sent_methods(), vec!["INVITE", "ACK", "ACK"]);
    assert_eq!(tx.final_status(), Some(StatusCode::BUSY_HERE));
}

#[tokio::test(start_paused = true)]
async fn test_non_invite_gives_up_after_max_retries() {
    let h = Harness::new(TransactionConfig::default().with_max_retries(3));
    let owner = RecordingOwner::new();
    let dialog = h.dialog();
    let options = builders::build_options(h.layer.local_endpoint(), &mut dialog.write());
    let tx = h
        .layer
        .create_client_transaction(options, Some(dialog), owner.clone())
        .unwrap();

    let started = Instant::now();
    tx.start().await.unwrap();
    assert_eq!(
        tx.wait_for_termination().await,
        TerminationReason::RetriesExceeded
    );
    assert_eq!(started.elapsed(), Duration::from_millis(7500));
    assert_eq!(h.sent_methods(), vec!["OPTIONS"; 4]);
    assert_eq!(
        owner.events(),
        vec![OwnerEvent::Terminated(TerminationReason::RetriesExceeded)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_non_invite_proceeding_retransmits_at_t2() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let dialog = h.dialog();
    let registrar = sipua_sip_core::Uri::sip("127.0.0.1").with_port(5070);
    let register =
        builders::build_register(h.layer.local_endpoint(), &mut dialog.write(), &registrar, 3600);
    let tx = h
        .layer
        .create_client_transaction(register, Some(dialog), owner.clone())
        .unwrap();

    let started = Instant::now();
    tx.start().await.unwrap();
    let sent = h.peer_receive_request().await;
    assert_eq!(sent.method, Method::Register);
    h.peer_reply(&sent, StatusCode::TRYING, None).await;

    let resent = h.peer_receive_request().await;
    assert_eq!(resent.method, Method::Register);
    assert_eq!(started.elapsed(), Duration::from_secs(4));
    assert_eq!(tx.state(), TransactionState::Proceeding);

    h.peer_reply(&sent, StatusCode::OK, Some("registrar")).await;
    assert_eq!(
        tx.wait_for_completion().await.status,
        Some(StatusCode::OK)
    );
    assert_eq!(tx.wait_for_termination().await, TerminationReason::Success);
    assert_eq!(started.elapsed(), Duration::from_secs(4 + 5));
    // No ACK outside INVITE
    assert_eq!(h.sent_methods(), vec!["REGISTER", "REGISTER"]);
    assert_monotonic(&tx.state_history());
}

#[tokio::test(start_paused = true)]
async fn test_reliable_transport_never_retransmits() {
    let h = Harness::with_reliable_client(TransactionConfig::default());
    let dialog = h.dialog();
    let options = builders::build_options(h.layer.local_endpoint(), &mut dialog.write());
    let tx = h
        .layer
        .create_client_transaction(options, Some(dialog), RecordingOwner::new())
        .unwrap();

    tx.start().await.unwrap();
    assert_eq!(tx.wait_for_termination().await, TerminationReason::Timeout);
    assert_eq!(h.sent_methods(), vec!["OPTIONS"]);
    assert!(tx.request().top_via().unwrap().transport.eq_ignore_ascii_case("TCP"));
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_on_start_terminates() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let dialog = h.dialog();
    let options = builders::build_options(h.layer.local_endpoint(), &mut dialog.write());
    let tx = h
        .layer
        .create_client_transaction(options, Some(dialog), owner.clone())
        .unwrap();

    h.client.set_fail_writes(true);
    let result = tx.start().await;
    assert!(matches!(result, Err(Error::Transport(_))), "{:?}", result);
    assert_eq!(
        tx.state(),
        TransactionState::Terminated(TerminationReason::TransportError)
    );
    assert_eq!(
        owner.events(),
        vec![OwnerEvent::Terminated(TerminationReason::TransportError)]
    );
    assert!(h.layer.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_on_retransmission_terminates() {
    let h = Harness::new(TransactionConfig::default());
    let dialog = h.dialog();
    let options = builders::build_options(h.layer.local_endpoint(), &mut dialog.write());
    let tx = h
        .layer
        .create_client_transaction(options, Some(dialog), RecordingOwner::new())
        .unwrap();

    let started = Instant::now();
    tx.start().await.unwrap();
    h.client.set_fail_writes(true);
    assert_eq!(
        tx.wait_for_termination().await,
        TerminationReason::TransportError
    );
    assert_eq!(started.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_next_hop_fails_start() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let mut dialog = DialogContext::new(
        sipua_sip_core::Uri::sip("atlanta.com").with_user("alice"),
        sipua_sip_core::Uri::sip("unknown.invalid").with_user("bob"),
    );
    let options = builders::build_options(h.layer.local_endpoint(), &mut dialog);
    let tx = h
        .layer
        .create_client_transaction(options, None, owner.clone())
        .unwrap();

    assert!(tx.start().await.is_err());
    assert_eq!(
        owner.events(),
        vec![OwnerEvent::Terminated(TerminationReason::TransportError)]
    );
    assert!(h.sent_methods().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_answer_reaches_owner_when_ack_cannot_be_sent() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let dialog = h.dialog();
    let invite = builders::build_invite(h.layer.local_endpoint(), &mut dialog.write(), None);
    let tx = h
        .layer
        .create_client_transaction(invite, Some(dialog), owner.clone())
        .unwrap();
    tx.start().await.unwrap();

    let sent = h.peer_receive_request().await;
    let mut ok = common::reply_to(&sent, StatusCode::OK, Some("bob-tag"));
    ok.headers.set(HeaderName::Contact, "<sip:bob@host.unresolvable.invalid>");
    h.peer_send(&ok).await;

    assert_eq!(
        tx.wait_for_termination().await,
        TerminationReason::TransportError
    );
    assert_eq!(tx.wait_for_completion().await.status, Some(StatusCode::OK));
    assert_eq!(tx.final_status(), Some(StatusCode::OK));
    assert_eq!(
        owner.events(),
        vec![
            OwnerEvent::Final(200),
            OwnerEvent::Terminated(TerminationReason::TransportError),
        ]
    );
    assert_eq!(h.sent_methods(), vec!["INVITE"]);
}

#[tokio::test(start_paused = true)]
async fn test_abort_and_cancel_outside_active_states() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let dialog = h.dialog();
    let options = builders::build_options(h.layer.local_endpoint(), &mut dialog.write());
    let tx = h
        .layer
        .create_client_transaction(options, Some(dialog), owner.clone())
        .unwrap();

    assert!(matches!(
        tx.cancel().await,
        Err(Error::InvalidState { operation: "cancel", .. })
    ));

    tx.start().await.unwrap();
    tx.abort().unwrap();
    assert_eq!(tx.wait_for_termination().await, TerminationReason::Aborted);
    assert!(matches!(tx.abort(), Err(Error::InvalidState { .. })));
    assert!(matches!(tx.start().await, Err(Error::InvalidState { .. })));
    assert_eq!(
        owner.events(),
        vec![OwnerEvent::Terminated(TerminationReason::Aborted)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_of_non_invite_terminates_locally() {
    let h = Harness::new(TransactionConfig::default());
    let dialog = h.dialog();
    let options = builders::build_options(h.layer.local_endpoint(), &mut dialog.write());
    let tx = h
        .layer
        .create_client_transaction(options, Some(dialog), RecordingOwner::new())
        .unwrap();

    tx.start().await.unwrap();
    tx.cancel().await.unwrap();
    assert_eq!(
        tx.state(),
        TransactionState::Terminated(TerminationReason::Cancelled)
    );
    assert_eq!(h.sent_methods(), vec!["OPTIONS"]);
}

#[tokio::test(start_paused = true)]
async fn test_late_responses_after_termination_are_ignored() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let dialog = h.dialog();
    let options = builders::build_options(h.layer.local_endpoint(), &mut dialog.write());
    let tx = h
        .layer
        .create_client_transaction(options, Some(dialog), owner.clone())
        .unwrap();

    tx.start().await.unwrap();
    let sent = h.peer_receive_request().await;
    let response = sipua_sip_core::Response::build_to(&sent, StatusCode::OK);
    tx.abort().unwrap();

    tx.handle_response(response, common::peer_addr()).await;
    assert_eq!(tx.final_status(), None);
    assert_eq!(owner.finals(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ping_reaches_target() {
    let h = Harness::new(TransactionConfig::default());
    let owner = RecordingOwner::new();
    let local = sipua_sip_core::Uri::sip("atlanta.com").with_user("alice");
    let target = sipua_sip_core::Uri::sip("127.0.0.1").with_port(5070);

    let ping = h.layer.ping(&local, &target, owner.clone()).await.unwrap();
    assert_eq!(ping.kind(), &TransactionKind::Ping);

    let sent = h.peer_receive_request().await;
    assert_eq!(sent.method, Method::Options);
    h.peer_reply(&sent, StatusCode::OK, None).await;

    assert_eq!(ping.wait_for_completion().await.status, Some(StatusCode::OK));
    assert_eq!(ping.destination(), Some(common::peer_addr()));
}
