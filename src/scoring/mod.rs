//! Risk scoring engine.
//!
//! Internally all arithmetic runs on a risk scale (0-100, higher = more
//! dangerous). The public verdict is on the safety scale (0-100, higher
//! = safer); [`normalize::safety_from_risk`] is the single point where
//! the inversion happens. Classification thresholds are expressed on
//! the safety scale.

pub mod confidence;
pub mod config;
pub mod manager;
pub mod normalize;

mod calculator;
mod result;

pub use calculator::{ScoreCalculator, ScoringStatistics};
pub use confidence::{
    interpret_confidence, ConfidenceBand, ConfidenceInterpretation,
};
pub use config::{
    ClassificationThresholds, ConfidenceAdjustment, MissingDataStrategy, Normalization,
    NormalizationMethod, NormalizationParams, ScoringConfig, ScoringConfigPatch,
    ValidationReport,
};
pub use manager::{
    config_hash, ConfigHistoryEntry, ConfigSource, Experiment, ScoringConfigManager,
    SelectedConfig,
};
pub use result::{RiskFactorScore, ScoreBreakdown, ScoringMetadata, ScoringResult};
