use doh_executor_domain::{HttpMethod, TransportError};
use doh_executor_transport::executor::{DnsExecutor, DohExecutor};
use doh_executor_transport::handle::ClientState;
use hickory_proto::op::Query;
use hickory_proto::rr::{DNSClass, Name, RecordType};
use std::net::TcpListener;
use std::str::FromStr;
use std::sync::Arc;

fn a_query(name: &str) -> Query {
    let mut query = Query::new();
    query.set_name(Name::from_str(name).unwrap());
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);
    query
}

/// Bind an ephemeral port and release it, so connecting to it is
/// refused immediately.
fn closed_port(addr: &str) -> Option<u16> {
    let listener = TcpListener::bind(addr).ok()?;
    let port = listener.local_addr().ok()?.port();
    drop(listener);
    Some(port)
}

#[test]
fn test_executor_creation_get_default() {
    let executor = DohExecutor::new("dns.google").unwrap();
    assert_eq!(executor.method(), HttpMethod::Get);
    assert_eq!(executor.endpoint().url(), "https://dns.google:443/dns-query");
    assert_eq!(executor.client_state(), ClientState::Unresolved);
}

#[test]
fn test_executor_creation_bare_ipv6() {
    let executor = DohExecutor::new("2606:4700:4700::1111").unwrap();
    assert!(executor.endpoint().ipv6_literal().is_some());
    assert_eq!(
        executor.endpoint().url(),
        "https://[2606:4700:4700::1111]:443/dns-query"
    );
}

#[test]
fn test_executor_rejects_invalid_method_case_insensitive() {
    for method in ["put", "PUT", "Head"] {
        let err = DohExecutor::with_method("dns.google", method).unwrap_err();
        assert_eq!(err, TransportError::InvalidMethod(method.to_string()));
    }
}

#[test]
fn test_executor_rejects_non_https_nameserver() {
    for bad in ["http://dns.google/dns-query", "udp://8.8.8.8:53", ""] {
        let err = DohExecutor::new(bad).unwrap_err();
        assert!(
            matches!(err, TransportError::InvalidEndpoint(_)),
            "expected InvalidEndpoint for {bad:?}"
        );
    }
}

#[tokio::test]
async fn test_refused_connection_is_transport_failure_with_query_prefix() {
    let port = closed_port("127.0.0.1:0").expect("loopback bind");
    let executor = DohExecutor::new(&format!("https://127.0.0.1:{port}")).unwrap();

    let err = executor.query(a_query("example.com.")).await.unwrap_err();
    assert!(
        matches!(err, TransportError::TransportFailure { .. }),
        "unexpected error: {err:?}"
    );
    assert!(
        err.to_string()
            .starts_with("DNS query for example.com. IN A failed:"),
        "message not scoped to the query: {err}"
    );
    // Client construction itself succeeded; only the request failed.
    assert_eq!(executor.client_state(), ClientState::Ready);
}

#[tokio::test]
async fn test_concurrent_queries_share_one_acquisition() {
    let port = closed_port("127.0.0.1:0").expect("loopback bind");
    let executor = Arc::new(DohExecutor::new(&format!("https://127.0.0.1:{port}")).unwrap());

    let first = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.query(a_query("one.example.")).await })
    };
    let second = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.query(a_query("two.example.")).await })
    };

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    // Both queries fail in lockstep with the same (successful)
    // acquisition outcome and carry their own descriptions.
    assert!(first.unwrap_err().to_string().contains("one.example."));
    assert!(second.unwrap_err().to_string().contains("two.example."));
    assert_eq!(executor.client_state(), ClientState::Ready);
}

#[tokio::test]
async fn test_ipv6_probe_failure_is_terminal_and_replayed() {
    // No IPv6 loopback in this environment: nothing to exercise.
    let Some(port) = closed_port("[::1]:0") else {
        return;
    };
    let executor = DohExecutor::new(&format!("[::1]:{port}")).unwrap();

    let first = executor.query(a_query("example.com.")).await.unwrap_err();
    assert!(
        matches!(first, TransportError::PeerValidationFailed(_)),
        "unexpected error: {first:?}"
    );
    assert_eq!(executor.client_state(), ClientState::Failed);

    // The stored outcome is replayed; no second probe happens.
    let second = executor.query(a_query("example.org.")).await.unwrap_err();
    assert_eq!(first, second);
    assert_eq!(executor.client_state(), ClientState::Failed);
}

#[tokio::test]
async fn test_trait_object_dispatch() {
    let port = closed_port("127.0.0.1:0").expect("loopback bind");
    let executor: Box<dyn DnsExecutor> =
        Box::new(DohExecutor::new(&format!("https://127.0.0.1:{port}")).unwrap());
    let err = executor.query(a_query("example.com.")).await.unwrap_err();
    assert!(matches!(err, TransportError::TransportFailure { .. }));
}

#[tokio::test]
#[ignore = "requires network access to a public DoH resolver"]
async fn test_get_and_post_resolve_equivalently_live() {
    let get = DohExecutor::with_method("https://1.1.1.1/dns-query", "GET").unwrap();
    let post = DohExecutor::with_method("https://1.1.1.1/dns-query", "POST").unwrap();

    let via_get = get.query(a_query("example.com.")).await.unwrap();
    let via_post = post.query(a_query("example.com.")).await.unwrap();

    assert_eq!(via_get.metadata.response_code, via_post.metadata.response_code);
    assert_eq!(via_get.queries.len(), 1);
    assert_eq!(
        via_get.queries[0].name().to_string(),
        via_post.queries[0].name().to_string()
    );
    assert_eq!(
        via_get.queries[0].query_type(),
        via_post.queries[0].query_type()
    );
}

#[tokio::test]
#[ignore = "requires IPv6 connectivity to a public DoH resolver"]
async fn test_ipv6_literal_nameserver_live() {
    let executor = DohExecutor::new("2606:4700:4700::1111").unwrap();
    let message = executor.query(a_query("example.com.")).await.unwrap();
    assert_eq!(executor.client_state(), ClientState::Ready);
    assert_eq!(message.queries[0].name().to_string(), "example.com.");
}
