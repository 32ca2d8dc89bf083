//! Domain layer for the DNS-over-HTTPS executor: endpoint model,
//! request method, and the transport error taxonomy.
pub mod endpoint;
pub mod errors;

pub use endpoint::{DohEndpoint, HttpMethod, DEFAULT_DOH_PATH, DEFAULT_DOH_PORT};
pub use errors::TransportError;
