//! Scoring configuration: weights, classification thresholds, missing-data
//! policy, confidence tuning, and normalization method.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{
    MAX_WEIGHT, MINIMUM_CONFIDENCE, MIN_THRESHOLD_SEPARATION, MIN_WEIGHT, MISSING_FACTOR_PENALTY,
    TOTAL_WEIGHT_TOLERANCE, WEIGHT_BIAS_WARNING, WEIGHT_IGNORED_WARNING,
};
use crate::error_handling::ConfigurationError;
use crate::signal::RiskFactorType;

/// Classification boundaries on the safety scale (higher = safer).
///
/// Scores at or above `safe_min` classify as low risk, at or above
/// `caution_min` as medium, and everything below as high.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationThresholds {
    pub safe_min: f64,
    pub caution_min: f64,
    pub danger_max: f64,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            safe_min: 67.0,
            caution_min: 34.0,
            danger_max: 0.0,
        }
    }
}

/// Policy for factors that produced no usable signal.
///
/// Redistribution is the only shipped strategy: the weights of missing
/// factors are spread proportionally over the available ones, so absent
/// data lowers confidence but never masquerades as a risk observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDataStrategy {
    #[default]
    Redistribute,
}

/// Tuning knobs for the confidence calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAdjustment {
    /// Per-missing-factor penalty applied progressively to overall
    /// confidence.
    pub missing_factor_penalty: f64,
    /// Floor for overall confidence, also used when no factors are
    /// available at all.
    pub minimum_confidence: f64,
}

impl Default for ConfidenceAdjustment {
    fn default() -> Self {
        Self {
            missing_factor_penalty: MISSING_FACTOR_PENALTY,
            minimum_confidence: MINIMUM_CONFIDENCE,
        }
    }
}

/// Available normalization curves for raw factor risks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    Linear,
    Logarithmic,
    Sigmoid,
}

/// Curve parameters, only consulted by the sigmoid method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub steepness: f64,
    pub midpoint: f64,
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self {
            steepness: 0.1,
            midpoint: 50.0,
        }
    }
}

/// Normalization method plus its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub method: NormalizationMethod,
    pub parameters: NormalizationParams,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            method: NormalizationMethod::Linear,
            parameters: NormalizationParams::default(),
        }
    }
}

/// The complete scoring configuration.
///
/// A `BTreeMap` keeps the weight table in factor order so serialization
/// and hashing are stable across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: BTreeMap<RiskFactorType, f64>,
    pub thresholds: ClassificationThresholds,
    pub missing_data_strategy: MissingDataStrategy,
    pub confidence_adjustment: ConfidenceAdjustment,
    pub normalization: Normalization,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(RiskFactorType::Reputation, 0.35);
        weights.insert(RiskFactorType::DomainAge, 0.20);
        weights.insert(RiskFactorType::SslCertificate, 0.15);
        weights.insert(RiskFactorType::AiAnalysis, 0.30);
        Self {
            weights,
            thresholds: ClassificationThresholds::default(),
            missing_data_strategy: MissingDataStrategy::default(),
            confidence_adjustment: ConfidenceAdjustment::default(),
            normalization: Normalization::default(),
        }
    }
}

/// Outcome of validating a configuration: fatal errors reject the whole
/// config, warnings accompany an accepted one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts the report into warnings on success or a
    /// `ConfigurationError` carrying every violation on failure.
    pub fn into_result(self) -> Result<Vec<String>, ConfigurationError> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(ConfigurationError {
                violations: self.errors,
            })
        }
    }
}

impl ScoringConfig {
    /// Checks every configuration invariant and collects all violations
    /// rather than stopping at the first.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        let mut total_weight = 0.0;
        for (factor, weight) in &self.weights {
            if !(MIN_WEIGHT..=MAX_WEIGHT).contains(weight) || !weight.is_finite() {
                report.errors.push(format!(
                    "weight for {factor} is {weight}, outside [{MIN_WEIGHT}, {MAX_WEIGHT}]"
                ));
                continue;
            }
            total_weight += weight;
            if *weight > WEIGHT_BIAS_WARNING {
                report.warnings.push(format!(
                    "weight for {factor} is {weight}, above {WEIGHT_BIAS_WARNING}; it may bias scoring"
                ));
            } else if *weight < WEIGHT_IGNORED_WARNING {
                report.warnings.push(format!(
                    "weight for {factor} is {weight}, below {WEIGHT_IGNORED_WARNING}; the factor may be ignored"
                ));
            }
        }
        if self.weights.is_empty() {
            report.errors.push("weight table is empty".to_string());
        } else if (total_weight - 1.0).abs() > TOTAL_WEIGHT_TOLERANCE {
            report.errors.push(format!(
                "weights sum to {total_weight:.4}, outside 1.0 +/- {TOTAL_WEIGHT_TOLERANCE}"
            ));
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("safe_min", t.safe_min),
            ("caution_min", t.caution_min),
            ("danger_max", t.danger_max),
        ] {
            if !(0.0..=100.0).contains(&value) || !value.is_finite() {
                report
                    .errors
                    .push(format!("threshold {name} is {value}, outside [0, 100]"));
            }
        }
        if !(t.danger_max < t.caution_min && t.caution_min < t.safe_min) {
            report.errors.push(format!(
                "thresholds must satisfy danger_max < caution_min < safe_min, got {} / {} / {}",
                t.danger_max, t.caution_min, t.safe_min
            ));
        } else {
            if t.caution_min - t.danger_max - 1.0 < MIN_THRESHOLD_SEPARATION {
                report.warnings.push(format!(
                    "gap between danger_max and caution_min is below {MIN_THRESHOLD_SEPARATION} points; classification may flap near the boundary"
                ));
            }
            if t.safe_min - t.caution_min < MIN_THRESHOLD_SEPARATION {
                report.warnings.push(format!(
                    "gap between caution_min and safe_min is below {MIN_THRESHOLD_SEPARATION} points; classification may flap near the boundary"
                ));
            }
        }

        let c = &self.confidence_adjustment;
        if !(0.0..=1.0).contains(&c.missing_factor_penalty) {
            report.errors.push(format!(
                "missing_factor_penalty is {}, outside [0, 1]",
                c.missing_factor_penalty
            ));
        }
        if !(0.0..=1.0).contains(&c.minimum_confidence) {
            report.errors.push(format!(
                "minimum_confidence is {}, outside [0, 1]",
                c.minimum_confidence
            ));
        }

        if self.normalization.method == NormalizationMethod::Sigmoid {
            let p = &self.normalization.parameters;
            if !(p.steepness > 0.0 && p.steepness <= 10.0) {
                report.errors.push(format!(
                    "sigmoid steepness is {}, outside (0, 10]",
                    p.steepness
                ));
            }
            if !(0.0..=100.0).contains(&p.midpoint) {
                report.errors.push(format!(
                    "sigmoid midpoint is {}, outside [0, 100]",
                    p.midpoint
                ));
            }
        }

        report
    }

    /// Returns a copy of this config with the patch applied. A patched
    /// weight table replaces the whole table, it is not merged per
    /// factor.
    pub fn merged(&self, patch: &ScoringConfigPatch) -> ScoringConfig {
        let mut merged = self.clone();
        if let Some(weights) = &patch.weights {
            merged.weights = weights.clone();
        }
        if let Some(thresholds) = patch.thresholds {
            merged.thresholds = thresholds;
        }
        if let Some(strategy) = patch.missing_data_strategy {
            merged.missing_data_strategy = strategy;
        }
        if let Some(adjustment) = patch.confidence_adjustment {
            merged.confidence_adjustment = adjustment;
        }
        if let Some(normalization) = patch.normalization {
            merged.normalization = normalization;
        }
        merged
    }
}

/// Partial configuration, used for runtime updates and experiment
/// overrides. `None` fields keep the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfigPatch {
    pub weights: Option<BTreeMap<RiskFactorType, f64>>,
    pub thresholds: Option<ClassificationThresholds>,
    pub missing_data_strategy: Option<MissingDataStrategy>,
    pub confidence_adjustment: Option<ConfidenceAdjustment>,
    pub normalization: Option<Normalization>,
}
