//! IPv6 peer-certificate validation and fingerprint pinning.
//!
//! Standard TLS hostname verification does not check IP-literal SAN
//! entries, so an executor pointed at an IPv6 literal first opens a bare
//! probe connection with verification disabled, reads the negotiated
//! peer certificate, and checks its SAN list for the target address in
//! binary form. Only when a SAN entry matches is an HTTPS client built,
//! pinned to the SHA-256 fingerprint of that exact certificate.

use doh_executor_domain::TransportError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use sha2::{Digest, Sha256};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};
use x509_parser::prelude::*;

/// Outcome of a successful peer validation. Ephemeral: consumed
/// immediately to parameterize the pinned client, then discarded.
pub(crate) struct PinnedCertificate {
    pub fingerprint: [u8; 32],
    pub validated_ip: Ipv6Addr,
}

/// Probe the nameserver at `ip:port` and validate its certificate.
///
/// Opens a TLS connection with certificate verification disabled, reads
/// the leaf certificate off the negotiated session, and requires a SAN
/// IP entry whose binary value equals the target address. Both the probe
/// failing and the SAN not matching are terminal for the executor.
pub(crate) async fn validate_peer(
    ip: Ipv6Addr,
    port: u16,
) -> Result<PinnedCertificate, TransportError> {
    let target = SocketAddr::new(IpAddr::V6(ip), port);

    let tcp = TcpStream::connect(target).await.map_err(|e| {
        TransportError::PeerValidationFailed(format!("connection to {target} failed: {e}"))
    })?;
    tcp.set_nodelay(true).map_err(|e| {
        TransportError::PeerValidationFailed(format!("connection to {target} failed: {e}"))
    })?;

    let connector = TlsConnector::from(Arc::new(probe_tls_config()));
    let server_name = ServerName::IpAddress(rustls::pki_types::IpAddr::V6(ip.into()));
    let mut stream = connector.connect(server_name, tcp).await.map_err(|e| {
        TransportError::PeerValidationFailed(format!("TLS handshake with {target} failed: {e}"))
    })?;

    let leaf = {
        let (_, session) = stream.get_ref();
        session
            .peer_certificates()
            .and_then(|chain| chain.first())
            .map(|cert| cert.as_ref().to_vec())
            .ok_or_else(|| {
                TransportError::PeerValidationFailed(format!(
                    "{target} presented no peer certificate"
                ))
            })?
    };
    let _ = stream.shutdown().await;

    if !san_contains_ip(&leaf, IpAddr::V6(ip))? {
        warn!(target = %target, "peer certificate SAN list does not cover the target address");
        return Err(TransportError::PeerValidationFailed(format!(
            "certificate of {target} has no SAN entry for {ip}"
        )));
    }

    let fingerprint = sha256_fingerprint(&leaf);
    debug!(target = %target, "peer certificate validated against IPv6 literal");
    Ok(PinnedCertificate {
        fingerprint,
        validated_ip: ip,
    })
}

/// Search the certificate's SAN list for an IP entry matching `ip`.
///
/// The comparison uses the binary address form, never the string form,
/// to avoid representation mismatches (`::1` vs `0:0:0:0:0:0:0:1`).
fn san_contains_ip(der: &[u8], ip: IpAddr) -> Result<bool, TransportError> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| {
        TransportError::PeerValidationFailed(format!("malformed peer certificate: {e}"))
    })?;
    let san = cert.subject_alternative_name().map_err(|e| {
        TransportError::PeerValidationFailed(format!("malformed SAN extension: {e}"))
    })?;

    let Some(san) = san else {
        return Ok(false);
    };
    Ok(san
        .value
        .general_names
        .iter()
        .any(|name| matches!(name, GeneralName::IPAddress(bytes) if ip_bytes_match(bytes, ip))))
}

fn ip_bytes_match(bytes: &[u8], ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            bytes == &octets[..]
        }
        IpAddr::V6(v6) => {
            let octets = v6.octets();
            bytes == &octets[..]
        }
    }
}

/// SHA-256 over the whole DER certificate.
pub(crate) fn sha256_fingerprint(der: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(der);
    let mut fingerprint = [0u8; 32];
    fingerprint.copy_from_slice(&hasher.finalize());
    fingerprint
}

/// TLS config for the probe connection: every certificate is accepted so
/// the handshake completes and the chain can be inspected afterwards.
pub(crate) fn probe_tls_config() -> rustls::ClientConfig {
    install_crypto_provider();
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(CaptureOnly))
        .with_no_client_auth()
}

/// TLS config for the pinned client: hostname verification is skipped
/// (there is no hostname, only the validated literal) and the peer must
/// present exactly the certificate captured during the probe.
pub(crate) fn pinned_tls_config(fingerprint: [u8; 32]) -> rustls::ClientConfig {
    install_crypto_provider();
    let mut config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(FingerprintVerifier { fingerprint }))
        .with_no_client_auth();
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    config
}

fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

fn all_signature_schemes() -> Vec<SignatureScheme> {
    vec![
        SignatureScheme::RSA_PKCS1_SHA1,
        SignatureScheme::ECDSA_SHA1_Legacy,
        SignatureScheme::RSA_PKCS1_SHA256,
        SignatureScheme::ECDSA_NISTP256_SHA256,
        SignatureScheme::RSA_PKCS1_SHA384,
        SignatureScheme::ECDSA_NISTP384_SHA384,
        SignatureScheme::RSA_PKCS1_SHA512,
        SignatureScheme::ECDSA_NISTP521_SHA512,
        SignatureScheme::RSA_PSS_SHA256,
        SignatureScheme::RSA_PSS_SHA384,
        SignatureScheme::RSA_PSS_SHA512,
        SignatureScheme::ED25519,
        SignatureScheme::ED448,
    ]
}

/// Verifier for the probe connection only: accepts any certificate.
/// Scoped deliberately to the single pre-flight connection whose chain
/// is validated by hand immediately afterwards.
#[derive(Debug)]
struct CaptureOnly;

impl ServerCertVerifier for CaptureOnly {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        all_signature_schemes()
    }
}

/// Verifier for the pinned client: the end-entity certificate must hash
/// to the fingerprint captured during peer validation.
#[derive(Debug)]
pub(crate) struct FingerprintVerifier {
    fingerprint: [u8; 32],
}

impl ServerCertVerifier for FingerprintVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if sha256_fingerprint(end_entity.as_ref()) == self.fingerprint {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                rustls::CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        all_signature_schemes()
    }
}
