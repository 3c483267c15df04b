//! The scoring output contract: final score, classification, confidence,
//! and the full per-factor breakdown that makes a score explainable
//! after the fact.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::config::NormalizationMethod;
use crate::signal::{RiskFactorType, RiskLevel};

/// One row of the per-factor report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactorScore {
    pub factor: RiskFactorType,
    pub available: bool,
    /// Risk on the canonical 0-100 scale before normalization, absent
    /// for missing factors.
    pub raw_score: Option<f64>,
    /// Effective confidence for this factor, absent for missing
    /// factors.
    pub confidence: Option<f64>,
    /// Weight actually applied after redistribution, zero for missing
    /// factors.
    pub applied_weight: f64,
    pub description: String,
}

/// Per-factor arithmetic of the weighted sum, keyed by factor so the
/// serialized form is stable.
///
/// `raw_scores` are canonical-scale risks as reported by the providers,
/// `normalized_scores` the same values after the configured
/// normalization, and `weighted_scores` the normalized values times the
/// redistributed weights. `total_weight` is the configured weight mass
/// the available factors covered before redistribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub raw_scores: BTreeMap<RiskFactorType, f64>,
    pub normalized_scores: BTreeMap<RiskFactorType, f64>,
    pub weighted_scores: BTreeMap<RiskFactorType, f64>,
    pub total_weight: f64,
}

/// Audit metadata attached to every score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringMetadata {
    pub missing_factors: Vec<RiskFactorType>,
    pub redistributed_weights: BTreeMap<RiskFactorType, f64>,
    pub normalization_method: NormalizationMethod,
    /// `default` or `experiment:<id>`.
    pub config_source: String,
    /// Fingerprint of the exact configuration used.
    pub config_hash: String,
    pub total_processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// The complete verdict for one URL.
///
/// `final_score` is on the safety scale: 0-100 where higher means
/// safer. The classification thresholds live on the same scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub url: String,
    pub final_score: f64,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub risk_factors: Vec<RiskFactorScore>,
    pub breakdown: ScoreBreakdown,
    pub metadata: ScoringMetadata,
}

impl ScoringResult {
    /// True when this result came from the zero-factor fallback path
    /// rather than real signals.
    pub fn is_fallback(&self) -> bool {
        self.breakdown.raw_scores.is_empty()
    }
}
