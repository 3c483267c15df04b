//! Provider payload types.
//!
//! One struct per signal provider, mirroring that provider's result
//! contract on its native scale, plus the [`FactorSignal`] trait that
//! normalizes every payload onto the canonical internal risk scale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RiskLevel;

/// Normalizes a provider payload onto the engine's canonical scales.
///
/// Raw signals arrive heterogeneous: reputation and AI report risk on
/// 0-100, domain age on 0-1, and the AI provider reports confidence on
/// 0-100 where everything else uses 0-1. Implementations convert exactly
/// once, here, so nothing downstream ever sees a native scale.
pub trait FactorSignal {
    /// Risk on the canonical scale: 0-100, higher = more dangerous.
    fn risk_score(&self) -> f64;

    /// Provider-reported confidence on the canonical scale: 0-1.
    fn base_confidence(&self) -> f64;
}

/// Reputation verdict for a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationAnalysis {
    /// No blocklist or heuristic match fired.
    pub is_clean: bool,
    /// Human-readable descriptions of every match that fired.
    pub threat_matches: Vec<String>,
    /// Risk on 0-100, higher = more dangerous.
    pub score: f64,
    /// Coarse classification of `score`.
    pub risk_level: RiskLevel,
    /// Confidence 0-1.
    pub confidence: f64,
}

impl FactorSignal for ReputationAnalysis {
    fn risk_score(&self) -> f64 {
        self.score.clamp(0.0, 100.0)
    }

    fn base_confidence(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0)
    }
}

/// Domain registration age analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAgeAnalysis {
    /// Days since registration, when WHOIS yielded a creation date.
    pub age_days: Option<u32>,
    /// Registration date, when WHOIS yielded one.
    pub registration_date: Option<DateTime<Utc>>,
    /// Registrar name, when WHOIS yielded one.
    pub registrar: Option<String>,
    /// Risk on 0-1 (native scale), higher = more dangerous.
    pub score: f64,
    /// Confidence 0-1.
    pub confidence: f64,
}

impl FactorSignal for DomainAgeAnalysis {
    fn risk_score(&self) -> f64 {
        // Native 0-1 risk scaled onto the canonical 0-100 scale.
        (self.score * 100.0).clamp(0.0, 100.0)
    }

    fn base_confidence(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0)
    }
}

/// Certificate validation classes (CA/Browser Forum policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    /// Domain Validated.
    Dv,
    /// Organization Validated.
    Ov,
    /// Extended Validation.
    Ev,
    /// Subject equals issuer.
    SelfSigned,
    /// No recognized policy OID present.
    Unknown,
}

/// Coarse public-key strength classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionStrength {
    /// RSA < 2048 bits or comparable.
    Weak,
    /// RSA 2048 bits, EC >= 256 bits.
    Moderate,
    /// RSA >= 4096 bits, EC >= 384 bits.
    Strong,
}

/// Certificate validity flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateValidation {
    /// Not expired, not self-signed, and matching the probed domain.
    pub is_valid: bool,
    /// The validity window has ended.
    pub is_expired: bool,
    /// Subject equals issuer.
    pub is_self_signed: bool,
    /// CN or a SAN covers the probed domain (wildcards honored).
    pub domain_match: bool,
    /// The strict handshake verified the chain against trusted roots.
    pub chain_valid: bool,
}

/// Key material assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSecurity {
    /// Coarse strength class.
    pub encryption_strength: EncryptionStrength,
    /// Public key size in bits, when determinable.
    pub key_size: Option<u32>,
}

/// TLS certificate inspection result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateAnalysis {
    /// Validation class of the presented certificate.
    pub certificate_type: CertificateType,
    /// Days until the validity window ends; negative once expired.
    pub days_until_expiry: i64,
    /// Validity flags.
    pub validation: CertificateValidation,
    /// Key material assessment.
    pub security: CertificateSecurity,
    /// Risk on 0-100, higher = more dangerous.
    pub score: f64,
    /// Confidence 0-1.
    pub confidence: f64,
}

impl FactorSignal for CertificateAnalysis {
    fn risk_score(&self) -> f64 {
        self.score.clamp(0.0, 100.0)
    }

    fn base_confidence(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0)
    }
}

/// AI content-analysis verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    /// Risk on 0-100, higher = more dangerous.
    pub risk_score: f64,
    /// Model-assigned category (`phishing`, `scam`, `legitimate`, ...).
    pub scam_category: String,
    /// Confidence on the model's native 0-100 scale. Normalized to 0-1 by
    /// [`FactorSignal::base_confidence`]; nothing downstream reads this
    /// field directly.
    pub confidence: f64,
    /// The model's main stated risks.
    pub primary_risks: Vec<String>,
    /// Concrete indicators the model cited.
    pub indicators: Vec<String>,
}

impl FactorSignal for AiAnalysis {
    fn risk_score(&self) -> f64 {
        self.risk_score.clamp(0.0, 100.0)
    }

    fn base_confidence(&self) -> f64 {
        // Native 0-100 confidence normalized at the boundary.
        (self.confidence / 100.0).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reputation_scales_pass_through() {
        let analysis = ReputationAnalysis {
            is_clean: false,
            threat_matches: vec!["suspicious TLD".into()],
            score: 72.5,
            risk_level: RiskLevel::High,
            confidence: 0.8,
        };
        assert_eq!(analysis.risk_score(), 72.5);
        assert_eq!(analysis.base_confidence(), 0.8);
    }

    #[test]
    fn test_domain_age_risk_rescaled_to_canonical() {
        let analysis = DomainAgeAnalysis {
            age_days: Some(3),
            registration_date: None,
            registrar: None,
            score: 0.9,
            confidence: 0.85,
        };
        assert!((analysis.risk_score() - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ai_confidence_rescaled_to_unit_interval() {
        let analysis = AiAnalysis {
            risk_score: 88.0,
            scam_category: "phishing".into(),
            confidence: 92.0,
            primary_risks: vec![],
            indicators: vec![],
        };
        assert!((analysis.base_confidence() - 0.92).abs() < 1e-9);
        assert_eq!(analysis.risk_score(), 88.0);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let analysis = ReputationAnalysis {
            is_clean: true,
            threat_matches: vec![],
            score: 130.0,
            risk_level: RiskLevel::High,
            confidence: 1.4,
        };
        assert_eq!(analysis.risk_score(), 100.0);
        assert_eq!(analysis.base_confidence(), 1.0);
    }
}
