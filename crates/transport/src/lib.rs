//! DNS-over-HTTPS query executor (RFC 8484).
//!
//! A pluggable transport for an asynchronous DNS resolution stack: the
//! resolver hands over a [`hickory_proto::op::Query`] and gets back the
//! decoded response [`hickory_proto::op::Message`] or a typed
//! [`TransportError`].
//!
//! The HTTPS client behind an executor is acquired lazily and exactly
//! once per instance. For IPv6-literal nameservers the acquisition
//! performs a pre-flight TLS probe that validates the peer certificate's
//! SAN list against the target address and pins the certificate
//! fingerprint, because standard certificate verification does not check
//! IP-literal SAN entries.

pub mod executor;
pub mod handle;
pub mod wire;

mod client;
mod pin;

pub use doh_executor_domain::{DohEndpoint, HttpMethod, TransportError};
pub use executor::{DnsExecutor, DohExecutor};
pub use handle::{ClientHandle, ClientState};
