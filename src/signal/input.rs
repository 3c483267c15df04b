//! Scoring input assembly.
//!
//! `ScoringInput` is built once per analysis by the orchestrator from
//! whichever providers succeeded, and never mutated afterwards. An absent
//! field means "factor unavailable", never "factor is zero risk".

use super::factors::{
    AiAnalysis, CertificateAnalysis, DomainAgeAnalysis, FactorSignal, ReputationAnalysis,
};
use super::{RiskFactorType, SignalResult};

/// Quality metadata extracted from an envelope for confidence derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalQuality {
    /// Wall-clock milliseconds the provider spent.
    pub processing_time_ms: u64,
    /// Served from cache.
    pub from_cache: bool,
    /// Cache entry age in seconds, when served from cache.
    pub cache_age_secs: Option<u64>,
    /// Errors recorded while producing the result (retries burned).
    pub error_count: u32,
}

/// A factor's contribution, already on canonical scales.
///
/// The scoring calculator iterates readings instead of concrete payload
/// types, which keeps the weighted-sum loop uniform across factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorReading {
    /// Which factor this reading came from.
    pub factor: RiskFactorType,
    /// Risk on the canonical 0-100 scale.
    pub risk: f64,
    /// Provider-reported confidence on 0-1.
    pub base_confidence: f64,
    /// Quality metadata for confidence adjustment.
    pub quality: SignalQuality,
}

/// Input to one scoring run.
#[derive(Debug, Clone, Default)]
pub struct ScoringInput {
    /// The analyzed URL, as validated and normalized.
    pub url: String,
    /// Reputation signal, when that provider succeeded.
    pub reputation: Option<SignalResult<ReputationAnalysis>>,
    /// Domain-age signal, when that provider succeeded.
    pub whois: Option<SignalResult<DomainAgeAnalysis>>,
    /// Certificate signal, when that provider succeeded.
    pub ssl: Option<SignalResult<CertificateAnalysis>>,
    /// AI content signal, when that provider succeeded.
    pub ai: Option<SignalResult<AiAnalysis>>,
}

impl ScoringInput {
    /// An input with no signals at all, for the fallback path.
    pub fn empty(url: impl Into<String>) -> Self {
        ScoringInput {
            url: url.into(),
            ..Default::default()
        }
    }

    /// The canonical-scale reading for one factor.
    ///
    /// Returns `None` when the factor has no envelope or its envelope is a
    /// failure; a failed signal is unavailable data, not zero risk.
    pub fn reading(&self, factor: RiskFactorType) -> Option<FactorReading> {
        match factor {
            RiskFactorType::Reputation => reading_from(factor, self.reputation.as_ref()),
            RiskFactorType::DomainAge => reading_from(factor, self.whois.as_ref()),
            RiskFactorType::SslCertificate => reading_from(factor, self.ssl.as_ref()),
            RiskFactorType::AiAnalysis => reading_from(factor, self.ai.as_ref()),
            RiskFactorType::TechnicalIndicators => None,
        }
    }

    /// Factors with a successful signal present, in enum order.
    pub fn available_factors(&self) -> Vec<RiskFactorType> {
        use strum::IntoEnumIterator;
        RiskFactorType::iter()
            .filter(|f| self.reading(*f).is_some())
            .collect()
    }
}

fn reading_from<T: FactorSignal>(
    factor: RiskFactorType,
    envelope: Option<&SignalResult<T>>,
) -> Option<FactorReading> {
    let envelope = envelope?;
    let data = envelope.data()?;
    Some(FactorReading {
        factor,
        risk: data.risk_score(),
        base_confidence: data.base_confidence(),
        quality: envelope.quality(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::SignalError;
    use crate::signal::RiskLevel;

    fn reputation(score: f64) -> ReputationAnalysis {
        ReputationAnalysis {
            is_clean: score < 30.0,
            threat_matches: vec![],
            score,
            risk_level: RiskLevel::Low,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_empty_input_has_no_factors() {
        let input = ScoringInput::empty("https://example.com");
        assert!(input.available_factors().is_empty());
        assert!(input.reading(RiskFactorType::Reputation).is_none());
    }

    #[test]
    fn test_successful_signal_yields_reading() {
        let input = ScoringInput {
            url: "https://example.com".into(),
            reputation: Some(SignalResult::ok(reputation(15.0), 800)),
            ..Default::default()
        };
        let reading = input.reading(RiskFactorType::Reputation).unwrap();
        assert_eq!(reading.factor, RiskFactorType::Reputation);
        assert_eq!(reading.risk, 15.0);
        assert_eq!(reading.base_confidence, 0.9);
        assert_eq!(reading.quality.processing_time_ms, 800);
        assert_eq!(input.available_factors(), vec![RiskFactorType::Reputation]);
    }

    #[test]
    fn test_failed_signal_counts_as_unavailable() {
        let input = ScoringInput {
            url: "https://example.com".into(),
            reputation: Some(SignalResult::failure(
                SignalError::Unavailable("503".into()),
                120,
            )),
            ..Default::default()
        };
        assert!(input.reading(RiskFactorType::Reputation).is_none());
        assert!(input.available_factors().is_empty());
    }

    #[test]
    fn test_ai_reading_is_boundary_normalized() {
        let input = ScoringInput {
            url: "https://example.com".into(),
            ai: Some(SignalResult::ok(
                AiAnalysis {
                    risk_score: 40.0,
                    scam_category: "legitimate".into(),
                    confidence: 75.0,
                    primary_risks: vec![],
                    indicators: vec![],
                },
                3000,
            )),
            ..Default::default()
        };
        let reading = input.reading(RiskFactorType::AiAnalysis).unwrap();
        assert!((reading.base_confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_technical_indicators_never_available() {
        let input = ScoringInput::empty("https://example.com");
        assert!(input.reading(RiskFactorType::TechnicalIndicators).is_none());
    }
}
