//! Confidence derivation for individual factors and for the final score.
//!
//! Factor confidence starts from the provider's self-reported confidence
//! and is adjusted for observed signal quality: how long the provider
//! took against its expected latency range, how old a cached signal is,
//! and how many retries it burned. Overall confidence aggregates the
//! per-factor values with a bias toward the strongest signals, then pays
//! a progressive penalty for missing factors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{
    ERROR_CONFIDENCE_PENALTY, ERROR_CONFIDENCE_PENALTY_CAP, FACTOR_CONFIDENCE_FLOOR,
};
use crate::scoring::config::ConfidenceAdjustment;
use crate::signal::{RiskFactorType, SignalQuality};

/// Expected provider latency in milliseconds, per factor.
///
/// Responses faster than the lower bound earn a small bonus; responses
/// slower than the upper bound are penalized in proportion to the
/// overrun.
fn expected_latency_ms(factor: RiskFactorType) -> (u64, u64) {
    match factor {
        RiskFactorType::Reputation => (1_000, 5_000),
        RiskFactorType::DomainAge => (2_000, 10_000),
        RiskFactorType::SslCertificate => (1_000, 8_000),
        RiskFactorType::AiAnalysis => (5_000, 30_000),
        RiskFactorType::TechnicalIndicators => (500, 2_000),
    }
}

/// Cache freshness thresholds in seconds, per factor: `(fresh, stale)`.
///
/// Ages at or below `fresh` earn a small bonus. Between the two bounds
/// the penalty grows linearly; past `stale` a flat penalty applies.
fn freshness_secs(factor: RiskFactorType) -> (u64, u64) {
    match factor {
        RiskFactorType::Reputation => (3_600, 86_400),
        RiskFactorType::DomainAge => (86_400, 604_800),
        RiskFactorType::SslCertificate => (21_600, 172_800),
        RiskFactorType::AiAnalysis => (3_600, 86_400),
        RiskFactorType::TechnicalIndicators => (3_600, 86_400),
    }
}

/// Derives the effective confidence for one factor from its provider's
/// base confidence and the observed quality of the signal.
///
/// # Arguments
///
/// * `factor` - Which risk factor the signal belongs to
/// * `base_confidence` - Provider-reported confidence on the 0-1 scale
/// * `quality` - Delivery metadata captured alongside the signal
///
/// # Returns
///
/// A confidence in `[0.1, 1.0]`. The floor keeps a delivered signal from
/// being erased outright by quality penalties.
pub fn derive_factor_confidence(
    factor: RiskFactorType,
    base_confidence: f64,
    quality: &SignalQuality,
) -> f64 {
    let mut confidence = base_confidence.clamp(0.0, 1.0);

    let (fast_ms, slow_ms) = expected_latency_ms(factor);
    let elapsed = quality.processing_time_ms;
    if elapsed < fast_ms {
        confidence += 0.02;
    } else if elapsed > slow_ms {
        let overrun = (elapsed as f64 / slow_ms as f64).min(3.0);
        confidence -= overrun * 0.05;
    }

    if quality.from_cache {
        let age = quality.cache_age_secs.unwrap_or(0);
        let (fresh, stale) = freshness_secs(factor);
        if age <= fresh {
            confidence += 0.01;
        } else if age <= stale {
            let progress = (age - fresh) as f64 / (stale - fresh) as f64;
            confidence -= 0.05 * progress;
        } else {
            confidence -= 0.1;
        }
    }

    let error_penalty =
        (quality.error_count as f64 * ERROR_CONFIDENCE_PENALTY).min(ERROR_CONFIDENCE_PENALTY_CAP);
    confidence -= error_penalty;

    confidence.clamp(FACTOR_CONFIDENCE_FLOOR, 1.0)
}

/// Aggregates per-factor confidences into the confidence of the final
/// score.
///
/// The factor confidences are sorted descending and combined as a
/// weighted average where the i-th highest value (1-based) carries
/// weight `2^(n-i)`, so strong signals dominate weak ones. Missing
/// factors then charge `missing_factor_penalty * m * (1 + m / total)`,
/// which grows superlinearly as coverage erodes. Small adjustments
/// reward coverage of the most decisive factors and agreement between
/// signals.
pub fn overall_confidence(
    by_factor: &BTreeMap<RiskFactorType, f64>,
    missing: usize,
    total_factors: usize,
    params: &ConfidenceAdjustment,
) -> f64 {
    let base = if by_factor.is_empty() {
        params.minimum_confidence
    } else {
        let mut values: Vec<f64> = by_factor.values().copied().collect();
        values.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let n = values.len();
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        for (i, value) in values.iter().enumerate() {
            let weight = 2.0f64.powi((n - 1 - i) as i32);
            weighted += value * weight;
            weight_sum += weight;
        }
        weighted / weight_sum
    };

    let mut confidence = base;

    if total_factors > 0 && missing > 0 {
        let m = missing as f64;
        let penalty = params.missing_factor_penalty * m * (1.0 + m / total_factors as f64);
        confidence -= penalty;
    }

    if by_factor.contains_key(&RiskFactorType::Reputation)
        || by_factor.contains_key(&RiskFactorType::AiAnalysis)
    {
        confidence += 0.05;
    }
    if !by_factor.is_empty() {
        let mean = by_factor.values().sum::<f64>() / by_factor.len() as f64;
        if mean > 0.8 {
            confidence += 0.03;
        }
        let variance = by_factor
            .values()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / by_factor.len() as f64;
        if variance > 0.1 {
            confidence -= 0.02;
        }
    }

    confidence
        .clamp(params.minimum_confidence, 1.0)
        .clamp(0.0, 1.0)
}

/// Qualitative band for a confidence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
    VeryLow,
}

/// Human-readable reading of a confidence value, for consumers deciding
/// how much weight to put on a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceInterpretation {
    pub band: ConfidenceBand,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

/// Maps a confidence value onto its qualitative band.
pub fn interpret_confidence(confidence: f64) -> ConfidenceInterpretation {
    if confidence >= 0.8 {
        ConfidenceInterpretation {
            band: ConfidenceBand::High,
            description: "strong signal coverage and agreement",
            recommended_action: "safe to act on automatically",
        }
    } else if confidence >= 0.6 {
        ConfidenceInterpretation {
            band: ConfidenceBand::Medium,
            description: "good coverage with minor gaps or disagreement",
            recommended_action: "act on, spot-check high-impact decisions",
        }
    } else if confidence >= 0.4 {
        ConfidenceInterpretation {
            band: ConfidenceBand::Low,
            description: "significant signals missing or degraded",
            recommended_action: "route to manual review before acting",
        }
    } else {
        ConfidenceInterpretation {
            band: ConfidenceBand::VeryLow,
            description: "too little signal to support a verdict",
            recommended_action: "defer, retry once providers recover",
        }
    }
}
