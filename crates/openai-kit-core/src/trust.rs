//! TLS trust decision for certificate pinning
//!
//! Without a pin the platform roots decide. With a pin, the presented leaf must
//! chain to a trusted root (the pinned certificate itself is added as one) and
//! must be byte-for-byte the pinned certificate.

use std::{fmt, sync::Arc};

use rustls::{
    DigitallySignedStruct, RootCertStore, SignatureScheme,
    client::{
        WebPkiServerVerifier,
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    },
    crypto::CryptoProvider,
    pki_types::{CertificateDer, ServerName, UnixTime, pem::PemObject},
};

use crate::error::RequestError;

const PEM_MARKER: &[u8] = b"-----BEGIN";

/// DER bytes of the certificate the server must present.
///
/// Loaded once and shared read-only by every connection.
#[derive(Clone, PartialEq, Eq)]
pub struct PinnedCertificate {
    der: Arc<[u8]>,
}

impl fmt::Debug for PinnedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedCertificate")
            .field("len", &self.der.len())
            .finish()
    }
}

impl PinnedCertificate {
    /// Accepts DER, or PEM in which case the first certificate is used
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RequestError> {
        if bytes.is_empty() {
            return Err(RequestError::Tls("pinned certificate is empty".to_string()));
        }

        if !bytes.starts_with(PEM_MARKER) {
            return Ok(Self { der: bytes.into() });
        }

        let cert = CertificateDer::pem_slice_iter(bytes)
            .next()
            .ok_or_else(|| RequestError::Tls("no certificate in PEM data".to_string()))?
            .map_err(|e| RequestError::Tls(format!("invalid certificate encoding: {e:?}")))?;
        Ok(Self {
            der: cert.as_ref().into(),
        })
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    fn to_certificate_der(&self) -> CertificateDer<'static> {
        CertificateDer::from(self.der.to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TrustDecision {
    Accept,
    Reject,
}

/// Per-handshake trust decision. Pure and never does I/O.
#[derive(Debug, Clone, Default)]
pub struct TrustValidator {
    pin: Option<PinnedCertificate>,
}

impl TrustValidator {
    /// Default system trust only
    #[must_use]
    pub fn system() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pinned(pin: PinnedCertificate) -> Self {
        Self { pin: Some(pin) }
    }

    #[must_use]
    pub fn pin(&self) -> Option<&PinnedCertificate> {
        self.pin.as_ref()
    }

    /// Decide on the presented leaf given the outcome of default trust evaluation.
    #[must_use]
    pub fn decide(&self, presented_leaf: &[u8], system_trusted: bool) -> TrustDecision {
        let accepted = match &self.pin {
            None => system_trusted,
            Some(pin) => system_trusted && pin.as_der() == presented_leaf,
        };
        if accepted {
            TrustDecision::Accept
        } else {
            TrustDecision::Reject
        }
    }

    /// rustls client configuration that routes every handshake through [`Self::decide`].
    pub fn client_config(&self) -> Result<rustls::ClientConfig, RequestError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = PinnedCertVerifier::new(self.clone(), Arc::clone(&provider))?;

        let mut config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| RequestError::Tls(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        Ok(config)
    }
}

/// Default webpki verification wrapped with the pin check
#[derive(Debug)]
struct PinnedCertVerifier {
    inner: Arc<WebPkiServerVerifier>,
    validator: TrustValidator,
}

impl PinnedCertVerifier {
    fn new(validator: TrustValidator, provider: Arc<CryptoProvider>) -> Result<Self, RequestError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        if let Some(pin) = validator.pin() {
            roots
                .add(pin.to_certificate_der())
                .map_err(|e| RequestError::Tls(format!("pinned certificate rejected as anchor: {e}")))?;
        }

        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .map_err(|e| RequestError::Tls(e.to_string()))?;

        Ok(Self { inner, validator })
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let system = self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now);

        match (self.validator.decide(end_entity.as_ref(), system.is_ok()), system) {
            (TrustDecision::Accept, system) => system,
            (TrustDecision::Reject, Err(e)) => {
                tracing::warn!(error = %e, "server certificate is not trusted");
                Err(e)
            }
            (TrustDecision::Reject, Ok(_)) => {
                tracing::warn!("server certificate does not match the pinned certificate");
                Err(rustls::Error::InvalidCertificate(
                    rustls::CertificateError::ApplicationVerificationFailure,
                ))
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
