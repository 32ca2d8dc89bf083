//! HTTPS client construction for both endpoint flavors.

use crate::pin;
use doh_executor_domain::TransportError;
use std::net::Ipv6Addr;
use tracing::debug;

/// Client for hostname (and IPv4) endpoints: rustls TLS with standard
/// certificate validation, TCP no-delay, HTTP/2.
pub(crate) fn build_default() -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .tcp_nodelay(true)
        .http2_prior_knowledge()
        .build()
        .map_err(client_build_error)
}

/// Client for IPv6-literal endpoints: runs the pre-flight peer
/// validation and pins the resulting certificate fingerprint.
pub(crate) async fn build_pinned(ip: Ipv6Addr, port: u16) -> Result<reqwest::Client, TransportError> {
    let pinned = pin::validate_peer(ip, port).await?;
    debug!(ip = %pinned.validated_ip, "pinning validated peer certificate");

    reqwest::Client::builder()
        .use_preconfigured_tls(pin::pinned_tls_config(pinned.fingerprint))
        .tcp_nodelay(true)
        .build()
        .map_err(client_build_error)
}

/// Construction failures are scoped to the triggering query when they
/// surface, so the query field stays empty here.
fn client_build_error(e: reqwest::Error) -> TransportError {
    TransportError::TransportFailure {
        query: String::new(),
        reason: format!("failed to construct HTTPS client: {e}"),
    }
}
