//! Wire-format glue around the `hickory-proto` codec: request message
//! construction, size enforcement, base64url framing for GET, and
//! response decoding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use doh_executor_domain::TransportError;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};

/// Maximum DNS message size transportable over DoH.
///
/// The GET transport embeds the payload in a URL, and practical
/// URL/proxy length limits make larger payloads unreliable; the bound is
/// enforced uniformly for POST as well.
pub const MAX_MESSAGE_LEN: usize = 0xffff;

/// Human-readable query description used to scope error messages,
/// e.g. `example.com. IN A`.
pub fn describe_query(query: &Query) -> String {
    format!(
        "{} {} {}",
        query.name(),
        query.query_class(),
        query.query_type()
    )
}

/// Build the wire bytes for a recursive request carrying `query`.
///
/// Standard recursive query: random ID for request/response matching,
/// RD flag set, single question section.
pub fn encode_request(query: &Query) -> Result<Vec<u8>, TransportError> {
    let mut message = Message::new(fastrand::u16(..), MessageType::Query, OpCode::Query);
    message.metadata.recursion_desired = true;
    message.add_query(query.clone());

    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder).map_err(|e| {
        TransportError::TransportFailure {
            query: describe_query(query),
            reason: format!("failed to serialize DNS message: {e}"),
        }
    })?;

    check_transport_size(buf.len(), &describe_query(query))?;
    Ok(buf)
}

/// Reject payloads the HTTPS transport cannot carry. No request is sent
/// for an oversize query.
pub fn check_transport_size(len: usize, query: &str) -> Result<(), TransportError> {
    if len > MAX_MESSAGE_LEN {
        return Err(TransportError::QueryTooLarge {
            query: query.to_string(),
            len,
        });
    }
    Ok(())
}

/// base64url without padding, as required for the `dns` URL parameter
/// (RFC 8484 §4.1).
pub fn base64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode a response body into a DNS message.
///
/// DNS-level failure codes inside a well-formed message (NXDOMAIN and
/// friends) are a successful decode; only a malformed body is an error.
pub fn decode_response(body: &[u8], query: &str) -> Result<Message, TransportError> {
    Message::from_vec(body).map_err(|e| TransportError::TransportFailure {
        query: query.to_string(),
        reason: format!("failed to parse DNS response: {e}"),
    })
}
