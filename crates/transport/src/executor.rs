//! The DoH query executor: lazy single-flight client acquisition,
//! GET/POST dispatch, and uniform error translation.

use crate::handle::{ClientHandle, ClientState};
use crate::{client, wire};
use async_trait::async_trait;
use doh_executor_domain::{DohEndpoint, HttpMethod, TransportError};
use hickory_proto::op::{Message, Query};
use tracing::debug;

/// Content type for DNS-over-HTTPS requests and responses (RFC 8484).
const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// Transport seam a resolver delegates individual queries to.
#[async_trait]
pub trait DnsExecutor: Send + Sync {
    /// Resolve one query to a decoded DNS message. The message may carry
    /// a non-success DNS response code; that is not a transport error.
    async fn query(&self, query: Query) -> Result<Message, TransportError>;
}

/// DNS-over-HTTPS executor (RFC 8484).
///
/// Endpoint and method are fixed at construction; the HTTPS client is
/// acquired on the first `query()` and shared by all subsequent and
/// concurrent queries. A failed acquisition is terminal for the
/// instance and replayed to every query.
pub struct DohExecutor {
    endpoint: DohEndpoint,
    method: HttpMethod,
    handle: ClientHandle<reqwest::Client>,
}

impl std::fmt::Debug for DohExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DohExecutor")
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl DohExecutor {
    /// Build an executor using the GET transport.
    pub fn new(nameserver: &str) -> Result<Self, TransportError> {
        Self::with_method(nameserver, "GET")
    }

    /// Build an executor with an explicit method string, parsed
    /// case-insensitively. Fails synchronously with `InvalidEndpoint`
    /// or `InvalidMethod`; no network activity happens here.
    pub fn with_method(nameserver: &str, method: &str) -> Result<Self, TransportError> {
        Ok(Self {
            endpoint: DohEndpoint::parse(nameserver)?,
            method: method.parse()?,
            handle: ClientHandle::new(),
        })
    }

    pub fn endpoint(&self) -> &DohEndpoint {
        &self.endpoint
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Observable acquisition state, mainly for tests and diagnostics.
    pub fn client_state(&self) -> ClientState {
        self.handle.state()
    }

    /// Resolve `query` over HTTPS.
    pub async fn query(&self, query: Query) -> Result<Message, TransportError> {
        let description = wire::describe_query(&query);

        let client = self
            .acquire_client()
            .await
            .map_err(|e| e.for_query(&description))?;

        let body = wire::encode_request(&query)?;
        debug!(
            url = %self.endpoint,
            method = %self.method,
            message_len = body.len(),
            "Sending DoH query"
        );

        let response = match self.method {
            HttpMethod::Get => {
                let request_url =
                    format!("{}?dns={}", self.endpoint.url(), wire::base64url(&body));
                client
                    .get(&request_url)
                    .header("Accept", DNS_MESSAGE_CONTENT_TYPE)
                    .send()
                    .await
            }
            HttpMethod::Post => {
                client
                    .post(self.endpoint.url())
                    .header("Accept", DNS_MESSAGE_CONTENT_TYPE)
                    .header("Content-Type", DNS_MESSAGE_CONTENT_TYPE)
                    .body(body)
                    .send()
                    .await
            }
        }
        .map_err(|e| TransportError::TransportFailure {
            query: description.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::TransportFailure {
                query: description,
                reason: format!(
                    "DoH server returned HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            });
        }

        let response_bytes =
            response
                .bytes()
                .await
                .map_err(|e| TransportError::TransportFailure {
                    query: description.clone(),
                    reason: format!("failed to read DoH response: {e}"),
                })?;

        debug!(
            url = %self.endpoint,
            response_len = response_bytes.len(),
            "DoH response received"
        );
        wire::decode_response(&response_bytes, &description)
    }

    /// Hand out the shared HTTPS client, acquiring it on first use.
    ///
    /// IPv6-literal endpoints go through peer validation; everything
    /// else gets a stock client. Either way the outcome is memoized in
    /// the handle, so concurrent first queries trigger a single probe.
    async fn acquire_client(&self) -> Result<reqwest::Client, TransportError> {
        match self.endpoint.ipv6_literal() {
            Some(ip) => {
                let port = self.endpoint.port();
                self.handle
                    .get_or_acquire(move || client::build_pinned(ip, port))
                    .await
            }
            None => {
                self.handle
                    .get_or_acquire(|| std::future::ready(client::build_default()))
                    .await
            }
        }
    }
}

#[async_trait]
impl DnsExecutor for DohExecutor {
    async fn query(&self, query: Query) -> Result<Message, TransportError> {
        DohExecutor::query(self, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_creation() {
        let executor = DohExecutor::new("https://1.1.1.1/dns-query").unwrap();
        assert_eq!(executor.endpoint().url(), "https://1.1.1.1:443/dns-query");
        assert_eq!(executor.method(), HttpMethod::Get);
        assert_eq!(executor.client_state(), ClientState::Unresolved);
    }

    #[test]
    fn test_executor_post_method() {
        let executor = DohExecutor::with_method("dns.google", "post").unwrap();
        assert_eq!(executor.method(), HttpMethod::Post);
    }

    #[test]
    fn test_executor_rejects_put() {
        let err = DohExecutor::with_method("dns.google", "put").unwrap_err();
        assert_eq!(err, TransportError::InvalidMethod("put".to_string()));
    }

    #[test]
    fn test_executor_rejects_plain_http() {
        let err = DohExecutor::new("http://dns.google/dns-query").unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint(_)));
    }
}
