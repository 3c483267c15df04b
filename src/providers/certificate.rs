//! TLS certificate provider.
//!
//! Performs a live TLS handshake against the target host and inspects the
//! leaf certificate. The first handshake verifies the chain against the
//! webpki trust roots; when that fails for a certificate-shaped reason the
//! provider retries with verification disabled so the certificate can
//! still be captured and judged (`chain_valid` records which path
//! succeeded). Inspection covers the validity window, self-signing,
//! hostname coverage including wildcards, CA/Browser Forum policy OIDs,
//! and public-key strength.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::public_key::PublicKey;

use super::CertificateProvider;
use crate::cache::SignalCache;
use crate::error_handling::SignalError;
use crate::signal::{
    CertificateAnalysis, CertificateSecurity, CertificateType, CertificateValidation,
    EncryptionStrength, RiskFactorType, SignalResult,
};
use crate::utils::elapsed_ms;

// CA/Browser Forum certificate policy OIDs.
const POLICY_OID_EV: &str = "2.23.140.1.1";
const POLICY_OID_DV: &str = "2.23.140.1.2.1";
const POLICY_OID_OV: &str = "2.23.140.1.2.2";
const POLICY_OID_IV: &str = "2.23.140.1.2.3";

/// Configuration for the certificate provider.
#[derive(Debug, Clone)]
pub struct CertificateProviderConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// TLS handshake timeout (per handshake attempt).
    pub handshake_timeout: Duration,
}

impl Default for CertificateProviderConfig {
    fn default() -> Self {
        Self {
            connect_timeout: crate::config::TCP_CONNECT_TIMEOUT,
            handshake_timeout: crate::config::TLS_HANDSHAKE_TIMEOUT,
        }
    }
}

/// The bundled certificate provider.
pub struct TlsCertificateProvider {
    strict: TlsConnector,
    permissive: TlsConnector,
    cache: Arc<SignalCache>,
    config: CertificateProviderConfig,
}

impl TlsCertificateProvider {
    /// Creates a provider over a shared cache. Builds both TLS client
    /// configurations up front; they are cheap to clone per connection.
    pub fn new(cache: Arc<SignalCache>, config: CertificateProviderConfig) -> Self {
        // `ClientConfig::builder` needs a process-default crypto provider.
        crate::initialization::init_crypto_provider();

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let strict = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        let permissive = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(CaptureOnlyVerifier))
            .with_no_client_auth();

        Self {
            strict: TlsConnector::from(Arc::new(strict)),
            permissive: TlsConnector::from(Arc::new(permissive)),
            cache,
            config,
        }
    }

    async fn assess(&self, domain: &str, port: u16) -> Result<CertificateAnalysis, SignalError> {
        let (leaf, chain_valid) = match self.fetch_leaf(&self.strict, domain, port).await {
            Ok(leaf) => (leaf, true),
            Err(strict_err) => {
                log::debug!(
                    "Strict TLS handshake with {domain}:{port} failed ({strict_err}); retrying without verification"
                );
                match self.fetch_leaf(&self.permissive, domain, port).await {
                    Ok(leaf) => (leaf, false),
                    // The permissive handshake accepts any certificate, so a
                    // second failure is a transport problem; the strict error
                    // names the earlier, more meaningful cause.
                    Err(_) => return Err(strict_err),
                }
            }
        };

        inspect_certificate(&leaf, domain, chain_valid, Utc::now())
    }

    /// Connects, completes the handshake, and returns the leaf certificate
    /// in DER form.
    async fn fetch_leaf(
        &self,
        connector: &TlsConnector,
        domain: &str,
        port: u16,
    ) -> Result<CertificateDer<'static>, SignalError> {
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|e| SignalError::Parse(format!("invalid TLS server name: {e}")))?;

        let tcp = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect((domain, port)),
        )
        .await
        .map_err(|_| SignalError::Timeout(self.config.connect_timeout.as_millis() as u64))?
        .map_err(|e| SignalError::Network(format!("connect to {domain}:{port}: {e}")))?;

        let stream = tokio::time::timeout(
            self.config.handshake_timeout,
            connector.connect(server_name, tcp),
        )
        .await
        .map_err(|_| SignalError::Timeout(self.config.handshake_timeout.as_millis() as u64))?
        .map_err(|e| SignalError::Network(format!("TLS handshake with {domain}:{port}: {e}")))?;

        let (_, session) = stream.get_ref();
        session
            .peer_certificates()
            .and_then(|certs| certs.first())
            .map(|leaf| leaf.clone().into_owned())
            .ok_or_else(|| {
                SignalError::Parse(format!("{domain}:{port} presented no certificate"))
            })
    }
}

#[async_trait]
impl CertificateProvider for TlsCertificateProvider {
    async fn analyze_certificate(
        &self,
        domain: &str,
        port: u16,
        force_refresh: bool,
    ) -> SignalResult<CertificateAnalysis> {
        let started = Instant::now();
        let key = format!("{}:{port}", domain.to_ascii_lowercase());
        if force_refresh {
            self.cache.delete(RiskFactorType::SslCertificate, &key).await;
        }

        let outcome = self
            .cache
            .get_or_set(RiskFactorType::SslCertificate, &key, None, || {
                self.assess(domain, port)
            })
            .await;

        match outcome {
            Ok((analysis, Some(age))) => {
                SignalResult::ok_cached(analysis, age, elapsed_ms(started))
            }
            Ok((analysis, None)) => SignalResult::ok(analysis, elapsed_ms(started)),
            Err(e) => SignalResult::failure(e, elapsed_ms(started)),
        }
    }
}

/// Accepts every certificate so the capture path can complete a handshake
/// against hosts the strict path rejects. Never used to trust anything:
/// results from this path carry `chain_valid = false`.
#[derive(Debug)]
struct CaptureOnlyVerifier;

impl ServerCertVerifier for CaptureOnlyVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
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
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Parses the leaf certificate and derives the full analysis.
fn inspect_certificate(
    leaf: &CertificateDer<'_>,
    domain: &str,
    chain_valid: bool,
    now: DateTime<Utc>,
) -> Result<CertificateAnalysis, SignalError> {
    let (_, cert) = x509_parser::parse_x509_certificate(leaf.as_ref())
        .map_err(|e| SignalError::Parse(format!("certificate parse failed: {e}")))?;

    let not_after = cert.validity().not_after.timestamp();
    let is_expired = now.timestamp() > not_after;
    let days_until_expiry = (not_after - now.timestamp()) / 86_400;

    let subject = cert.subject().to_string();
    let issuer = cert.issuer().to_string();
    let is_self_signed = subject.trim().eq_ignore_ascii_case(issuer.trim());

    let domain_match = certificate_names(&cert)
        .iter()
        .any(|name| hostname_matches(name, domain));

    let certificate_type = if is_self_signed {
        CertificateType::SelfSigned
    } else {
        certificate_type_from_policies(&policy_oids(&cert))
    };

    let (encryption_strength, key_size) = key_assessment(&cert);

    let validation = CertificateValidation {
        is_valid: !is_expired && !is_self_signed && domain_match,
        is_expired,
        is_self_signed,
        domain_match,
        chain_valid,
    };
    let security = CertificateSecurity {
        encryption_strength,
        key_size,
    };

    let score = certificate_risk(&validation, days_until_expiry, encryption_strength);
    // A verified chain means every flag was cross-checked by the TLS stack.
    let confidence = if chain_valid { 0.9 } else { 0.8 };

    Ok(CertificateAnalysis {
        certificate_type,
        days_until_expiry,
        validation,
        security,
        score,
        confidence,
    })
}

/// Every DNS name the certificate claims: SAN entries plus the subject CN.
fn certificate_names(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut names = Vec::new();

    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for general_name in &san.general_names {
                if let GeneralName::DNSName(dns_name) = general_name {
                    names.push((*dns_name).to_string());
                }
            }
        }
    }

    if let Some(cn) = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
    {
        names.push(cn.to_string());
    }

    names
}

/// Certificate policy OIDs declared by the certificate.
fn policy_oids(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut oids = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::CertificatePolicies(policies) = ext.parsed_extension() {
            oids.extend(policies.iter().map(|policy| policy.policy_id.to_string()));
        }
    }
    oids
}

/// Maps policy OIDs onto the validation class. Individual-validated
/// certificates involve the same identity vetting as OV.
fn certificate_type_from_policies(oids: &[String]) -> CertificateType {
    if oids.iter().any(|o| o == POLICY_OID_EV) {
        CertificateType::Ev
    } else if oids.iter().any(|o| o == POLICY_OID_OV || o == POLICY_OID_IV) {
        CertificateType::Ov
    } else if oids.iter().any(|o| o == POLICY_OID_DV) {
        CertificateType::Dv
    } else {
        CertificateType::Unknown
    }
}

/// Public-key strength class and size in bits, where determinable.
fn key_assessment(cert: &X509Certificate<'_>) -> (EncryptionStrength, Option<u32>) {
    match cert.public_key().parsed() {
        Ok(key) => {
            let bits = key.key_size() as u32;
            let class = match key {
                PublicKey::RSA(_) => rsa_strength(bits),
                PublicKey::EC(_) => ec_strength(bits),
                // Modern fixed-size keys (Ed25519 and friends) and anything
                // unrecognized: size alone cannot condemn them.
                _ => EncryptionStrength::Moderate,
            };
            (class, (bits > 0).then_some(bits))
        }
        Err(_) => (EncryptionStrength::Moderate, None),
    }
}

fn rsa_strength(bits: u32) -> EncryptionStrength {
    if bits < 2048 {
        EncryptionStrength::Weak
    } else if bits < 4096 {
        EncryptionStrength::Moderate
    } else {
        EncryptionStrength::Strong
    }
}

fn ec_strength(bits: u32) -> EncryptionStrength {
    if bits < 256 {
        EncryptionStrength::Weak
    } else if bits < 384 {
        EncryptionStrength::Moderate
    } else {
        EncryptionStrength::Strong
    }
}

/// Whether a certificate name covers the host. Wildcards cover exactly one
/// leading label: `*.example.com` matches `a.example.com` but neither
/// `example.com` nor `a.b.example.com`.
fn hostname_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    if let Some(suffix) = pattern.strip_prefix("*.") {
        match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        }
    } else {
        pattern == host
    }
}

/// Additive risk from the validation flags, capped at 100.
fn certificate_risk(
    validation: &CertificateValidation,
    days_until_expiry: i64,
    encryption_strength: EncryptionStrength,
) -> f64 {
    let mut score: f64 = 0.0;

    if validation.is_expired {
        score += 50.0;
    }
    if validation.is_self_signed {
        score += 40.0;
    }
    if !validation.domain_match {
        score += 30.0;
    }
    // Self-signing already explains a broken chain; do not count it twice.
    if !validation.chain_valid && !validation.is_self_signed {
        score += 20.0;
    }
    if encryption_strength == EncryptionStrength::Weak {
        score += 20.0;
    }
    if !validation.is_expired {
        if days_until_expiry <= 7 {
            score += 10.0;
        } else if days_until_expiry <= 30 {
            score += 5.0;
        }
    }

    score.min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_flags() -> CertificateValidation {
        CertificateValidation {
            is_valid: true,
            is_expired: false,
            is_self_signed: false,
            domain_match: true,
            chain_valid: true,
        }
    }

    #[test]
    fn test_hostname_exact_match() {
        assert!(hostname_matches("example.com", "example.com"));
        assert!(hostname_matches("Example.COM", "example.com"));
        assert!(hostname_matches("example.com.", "example.com"));
        assert!(!hostname_matches("example.com", "example.org"));
        assert!(!hostname_matches("www.example.com", "example.com"));
    }

    #[test]
    fn test_hostname_wildcard_covers_one_label() {
        assert!(hostname_matches("*.example.com", "www.example.com"));
        assert!(hostname_matches("*.example.com", "api.example.com"));
        assert!(!hostname_matches("*.example.com", "example.com"));
        assert!(!hostname_matches("*.example.com", "a.b.example.com"));
        assert!(!hostname_matches("*.example.com", "com"));
    }

    #[test]
    fn test_policy_oid_classification() {
        let ev = vec![POLICY_OID_EV.to_string()];
        let ov = vec![POLICY_OID_OV.to_string()];
        let iv = vec![POLICY_OID_IV.to_string()];
        let dv = vec!["1.3.6.1.4.1.44947.1.1.1".to_string(), POLICY_OID_DV.to_string()];
        let none: Vec<String> = vec!["2.5.29.32.0".to_string()];

        assert_eq!(certificate_type_from_policies(&ev), CertificateType::Ev);
        assert_eq!(certificate_type_from_policies(&ov), CertificateType::Ov);
        assert_eq!(certificate_type_from_policies(&iv), CertificateType::Ov);
        assert_eq!(certificate_type_from_policies(&dv), CertificateType::Dv);
        assert_eq!(
            certificate_type_from_policies(&none),
            CertificateType::Unknown
        );
    }

    #[test]
    fn test_ev_preferred_over_dv_when_both_present() {
        let both = vec![POLICY_OID_DV.to_string(), POLICY_OID_EV.to_string()];
        assert_eq!(certificate_type_from_policies(&both), CertificateType::Ev);
    }

    #[test]
    fn test_key_strength_classes() {
        assert_eq!(rsa_strength(1024), EncryptionStrength::Weak);
        assert_eq!(rsa_strength(2048), EncryptionStrength::Moderate);
        assert_eq!(rsa_strength(3072), EncryptionStrength::Moderate);
        assert_eq!(rsa_strength(4096), EncryptionStrength::Strong);
        assert_eq!(ec_strength(224), EncryptionStrength::Weak);
        assert_eq!(ec_strength(256), EncryptionStrength::Moderate);
        assert_eq!(ec_strength(384), EncryptionStrength::Strong);
    }

    #[test]
    fn test_clean_certificate_scores_zero() {
        let score = certificate_risk(&valid_flags(), 60, EncryptionStrength::Strong);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_expired_certificate_dominates() {
        let flags = CertificateValidation {
            is_valid: false,
            is_expired: true,
            ..valid_flags()
        };
        let score = certificate_risk(&flags, -3, EncryptionStrength::Strong);
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_self_signed_untrusted_not_double_counted() {
        let flags = CertificateValidation {
            is_valid: false,
            is_self_signed: true,
            domain_match: true,
            chain_valid: false,
            is_expired: false,
        };
        // 40 for self-signing only; the broken chain is the same defect.
        let score = certificate_risk(&flags, 60, EncryptionStrength::Moderate);
        assert_eq!(score, 40.0);
    }

    #[test]
    fn test_untrusted_chain_alone_scores() {
        let flags = CertificateValidation {
            chain_valid: false,
            ..valid_flags()
        };
        let score = certificate_risk(&flags, 60, EncryptionStrength::Moderate);
        assert_eq!(score, 20.0);
    }

    #[test]
    fn test_everything_wrong_caps_at_hundred() {
        let flags = CertificateValidation {
            is_valid: false,
            is_expired: true,
            is_self_signed: true,
            domain_match: false,
            chain_valid: false,
        };
        let score = certificate_risk(&flags, -400, EncryptionStrength::Weak);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_imminent_expiry_raises_risk() {
        let week = certificate_risk(&valid_flags(), 5, EncryptionStrength::Moderate);
        let month = certificate_risk(&valid_flags(), 20, EncryptionStrength::Moderate);
        let relaxed = certificate_risk(&valid_flags(), 90, EncryptionStrength::Moderate);
        assert_eq!(week, 10.0);
        assert_eq!(month, 5.0);
        assert_eq!(relaxed, 0.0);
    }
}
