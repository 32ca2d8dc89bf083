use thiserror::Error;

/// Errors produced by the DoH transport.
///
/// `Clone` is required so a terminal client-acquisition failure can be
/// cached inside the executor and replayed to every later query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid nameserver address: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid HTTP request method: {0}")]
    InvalidMethod(String),

    #[error("DNS query for {query} failed: query of {len} bytes too large for HTTPS transport")]
    QueryTooLarge { query: String, len: usize },

    #[error("IPv6 peer validation failed: {0}")]
    PeerValidationFailed(String),

    #[error("DNS query for {query} failed: {reason}")]
    TransportFailure { query: String, reason: String },
}

impl TransportError {
    /// Re-scope a cached or not-yet-scoped failure to a concrete query.
    ///
    /// Client acquisition runs before any query description is known, so
    /// acquisition-time `TransportFailure`s carry an empty query field
    /// until they surface through `query()`.
    pub fn for_query(self, query: &str) -> Self {
        match self {
            TransportError::TransportFailure { reason, .. } => TransportError::TransportFailure {
                query: query.to_string(),
                reason,
            },
            other => other,
        }
    }

    /// True for errors that poison the executor instance itself rather
    /// than a single query.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::InvalidEndpoint(_)
                | TransportError::InvalidMethod(_)
                | TransportError::PeerValidationFailed(_)
        )
    }
}
