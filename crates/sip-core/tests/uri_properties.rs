//! Property tests for URI sanitizing and comparison

use std::cmp::Ordering;

use proptest::prelude::*;
use sipua_sip_core::{Scheme, Uri, UriContext};

const CONTEXTS: [UriContext; 9] = [
    UriContext::RequestTarget,
    UriContext::To,
    UriContext::From,
    UriContext::Redirect,
    UriContext::Contact,
    UriContext::RegistrationContact,
    UriContext::Route,
    UriContext::RegistrationTarget,
    UriContext::External,
];

fn param_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(";lr".to_string()),
        "[a-z]{1,6}".prop_map(|v| format!(";transport={}", v)),
        "[0-9]{1,3}".prop_map(|v| format!(";ttl={}", v)),
        Just(";method=INVITE".to_string()),
        Just(";maddr=192.0.2.1".to_string()),
        Just(";user=phone".to_string()),
        "[a-z]{1,5}".prop_map(|v| format!(";x-{}={}", v, v)),
    ]
}

prop_compose! {
    fn arb_uri_text()(
        display in proptest::option::of("[A-Za-z ;<]{1,10}"),
        user in proptest::option::of("[a-z0-9]{1,8}"),
        host in "[a-z]{1,8}\\.(com|org|net)",
        port in proptest::option::of(1024u16..65000),
        params in proptest::collection::vec(param_strategy(), 0..4),
        tag in proptest::option::of("[a-f0-9]{4,8}"),
        query in proptest::option::of("[a-z]{1,5}"),
    ) -> String {
        let mut addr = String::from("sip:");
        if let Some(user) = user {
            addr.push_str(&user);
            addr.push('@');
        }
        addr.push_str(&host);
        if let Some(port) = port {
            addr.push_str(&format!(":{}", port));
        }
        for param in params {
            addr.push_str(&param);
        }
        if let Some(query) = query {
            addr.push_str(&format!("?subject={}", query));
        }
        let mut text = String::new();
        if let Some(display) = display {
            text.push_str(&format!("\"{}\" ", display));
        }
        text.push('<');
        text.push_str(&addr);
        text.push('>');
        if let Some(tag) = tag {
            text.push_str(&format!(";tag={};expires=30;q=0.7", tag));
        }
        text
    }
}

proptest! {
    #[test]
    fn sanitize_is_idempotent(text in arb_uri_text()) {
        let uri = Uri::parse(&text, Scheme::Sip).unwrap();
        for context in CONTEXTS {
            let once = uri.sanitized(context);
            let twice = once.sanitized(context);
            prop_assert_eq!(once.as_quoted_display_string(), twice.as_quoted_display_string());
            prop_assert_eq!(once.port, twice.port);
        }
    }

    #[test]
    fn compare_is_reflexive_and_antisymmetric(a in arb_uri_text(), b in arb_uri_text()) {
        let a = Uri::parse(&a, Scheme::Sip).unwrap();
        let b = Uri::parse(&b, Scheme::Sip).unwrap();
        prop_assert_eq!(a.compare(&a), Ordering::Equal);
        prop_assert_eq!(a.compare(&b), b.compare(&a).reverse());
    }

    #[test]
    fn display_string_parses_back_equal(text in arb_uri_text()) {
        let uri = Uri::parse(&text, Scheme::Sip).unwrap();
        let reparsed = Uri::parse(&uri.as_quoted_display_string(), Scheme::Sip).unwrap();
        prop_assert_eq!(&reparsed, &uri);
        prop_assert_eq!(&reparsed.display_name, &uri.display_name);
        prop_assert_eq!(reparsed.tag(), uri.tag());
    }
}
