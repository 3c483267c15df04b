//! The scoring calculator: combines available factor signals into one
//! final score, classification, and confidence under the active
//! configuration.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::config::{FALLBACK_SCORE, SCORING_HISTORY_CAP};
use crate::error_handling::ConfigurationError;
use crate::scoring::confidence::{derive_factor_confidence, overall_confidence};
use crate::scoring::config::{
    ClassificationThresholds, ScoringConfig, ScoringConfigPatch,
};
use crate::scoring::manager::{
    ConfigHistoryEntry, Experiment, ScoringConfigManager, SelectedConfig,
};
use crate::scoring::normalize::{normalize_risk, safety_from_risk};
use crate::scoring::result::{
    RiskFactorScore, ScoreBreakdown, ScoringMetadata, ScoringResult,
};
use crate::signal::{FactorReading, RiskFactorType, RiskLevel, ScoringInput};
use crate::utils::elapsed_ms;

/// Light record of one past score, kept for statistics.
#[derive(Debug, Clone, Serialize)]
struct ScoringSummary {
    final_score: f64,
    risk_level: RiskLevel,
    confidence: f64,
    fallback: bool,
    timestamp: DateTime<Utc>,
}

/// Aggregate view over the rolling score history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoringStatistics {
    pub total_scored: usize,
    pub average_score: f64,
    pub average_confidence: f64,
    pub risk_level_counts: BTreeMap<RiskLevel, usize>,
    pub fallback_count: usize,
}

/// Scores URLs under the configuration owned by its
/// [`ScoringConfigManager`].
///
/// The scoring math itself is pure: identical input and configuration
/// produce bit-identical scores. The calculator adds the mutable shell
/// around it: config selection, runtime updates, and a capped history
/// of past results.
#[derive(Debug)]
pub struct ScoreCalculator {
    manager: RwLock<ScoringConfigManager>,
    history: Mutex<VecDeque<ScoringSummary>>,
}

impl ScoreCalculator {
    /// Builds a calculator around a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the configuration violates any
    /// validation rule.
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigurationError> {
        Ok(Self {
            manager: RwLock::new(ScoringConfigManager::new(config)?),
            history: Mutex::new(VecDeque::new()),
        })
    }

    /// Builds a calculator with the default configuration.
    pub fn with_defaults() -> Self {
        Self {
            manager: RwLock::new(ScoringConfigManager::with_defaults()),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Scores one input under the configuration selected for this
    /// request.
    ///
    /// Never fails: with zero usable factors it returns the fixed
    /// fallback verdict (score 50, medium risk, minimum confidence)
    /// instead of an error.
    ///
    /// # Arguments
    ///
    /// * `input` - Signals collected for one URL
    /// * `experiment_id` - Explicit experiment request, if any
    /// * `user_id` - Stable user identity for A/B bucketing, if any
    pub fn calculate_score(
        &self,
        input: &ScoringInput,
        experiment_id: Option<&str>,
        user_id: Option<&str>,
    ) -> ScoringResult {
        let started = Instant::now();
        let selected =
            self.read_manager()
                .select_configuration(user_id, experiment_id, Utc::now());
        let result = score_with_config(input, &selected, started);
        debug!(
            "scored {} -> {:.1} ({}) confidence {:.2} [{}]",
            result.url, result.final_score, result.risk_level, result.confidence,
            result.metadata.config_source
        );
        self.record(&result);
        result
    }

    /// Applies a partial configuration update, returning its validation
    /// warnings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` with every violation if the merged
    /// configuration is invalid; the active configuration is untouched
    /// in that case.
    pub fn update_configuration(
        &self,
        patch: &ScoringConfigPatch,
    ) -> Result<Vec<String>, ConfigurationError> {
        self.write_manager().update(patch)
    }

    /// Registers an A/B experiment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the experiment record or its
    /// merged configuration is invalid.
    pub fn register_experiment(
        &self,
        experiment: Experiment,
    ) -> Result<Vec<String>, ConfigurationError> {
        self.write_manager().register_experiment(experiment)
    }

    /// A copy of the active default configuration.
    pub fn current_config(&self) -> ScoringConfig {
        self.read_manager().current().clone()
    }

    /// Copies of the capped configuration change history, oldest first.
    pub fn config_history(&self) -> Vec<ConfigHistoryEntry> {
        self.read_manager().history().cloned().collect()
    }

    /// Aggregates over the rolling history of past scores.
    pub fn statistics(&self) -> ScoringStatistics {
        let history = self.lock_history();
        let total = history.len();
        let mut stats = ScoringStatistics {
            total_scored: total,
            ..ScoringStatistics::default()
        };
        for summary in history.iter() {
            stats.average_score += summary.final_score;
            stats.average_confidence += summary.confidence;
            *stats.risk_level_counts.entry(summary.risk_level).or_insert(0) += 1;
            if summary.fallback {
                stats.fallback_count += 1;
            }
        }
        if total > 0 {
            stats.average_score /= total as f64;
            stats.average_confidence /= total as f64;
        }
        stats
    }

    /// Drops the rolling score history.
    pub fn clear_history(&self) {
        self.lock_history().clear();
    }

    fn record(&self, result: &ScoringResult) {
        let mut history = self.lock_history();
        history.push_back(ScoringSummary {
            final_score: result.final_score,
            risk_level: result.risk_level,
            confidence: result.confidence,
            fallback: result.is_fallback(),
            timestamp: result.metadata.timestamp,
        });
        while history.len() > SCORING_HISTORY_CAP {
            history.pop_front();
        }
    }

    fn read_manager(&self) -> RwLockReadGuard<'_, ScoringConfigManager> {
        self.manager.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_manager(&self) -> RwLockWriteGuard<'_, ScoringConfigManager> {
        self.manager.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, VecDeque<ScoringSummary>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// The pure scoring pipeline for one request.
fn score_with_config(
    input: &ScoringInput,
    selected: &SelectedConfig,
    started: Instant,
) -> ScoringResult {
    let config = &selected.config;

    let mut available: Vec<FactorReading> = Vec::new();
    let mut missing: Vec<RiskFactorType> = Vec::new();
    for factor in config.weights.keys() {
        match input.reading(*factor) {
            Some(reading) => available.push(reading),
            None => missing.push(*factor),
        }
    }

    let available_mass: f64 = available
        .iter()
        .filter_map(|reading| config.weights.get(&reading.factor))
        .sum();
    if available.is_empty() || available_mass <= 0.0 {
        let all_missing = config.weights.keys().copied().collect();
        return fallback_result(input.url.clone(), selected, all_missing, started);
    }

    let mut breakdown = ScoreBreakdown {
        total_weight: available_mass,
        ..ScoreBreakdown::default()
    };
    let mut redistributed = BTreeMap::new();
    let mut confidences = BTreeMap::new();
    let mut weighted_risk = 0.0;

    for reading in &available {
        let weight = config.weights.get(&reading.factor).copied().unwrap_or(0.0);
        let applied = weight / available_mass;
        let normalized = normalize_risk(reading.risk, &config.normalization);

        breakdown.raw_scores.insert(reading.factor, reading.risk);
        breakdown.normalized_scores.insert(reading.factor, normalized);
        breakdown
            .weighted_scores
            .insert(reading.factor, applied * normalized);
        redistributed.insert(reading.factor, applied);
        confidences.insert(
            reading.factor,
            derive_factor_confidence(reading.factor, reading.base_confidence, &reading.quality),
        );
        weighted_risk += applied * normalized;
    }

    let final_score = safety_from_risk(weighted_risk);
    let risk_level = classify(final_score, &config.thresholds);
    let confidence = overall_confidence(
        &confidences,
        missing.len(),
        config.weights.len(),
        &config.confidence_adjustment,
    );

    let mut risk_factors = Vec::with_capacity(config.weights.len());
    for factor in config.weights.keys() {
        let row = match breakdown.normalized_scores.get(factor) {
            Some(normalized) => RiskFactorScore {
                factor: *factor,
                available: true,
                raw_score: breakdown.raw_scores.get(factor).copied(),
                confidence: confidences.get(factor).copied(),
                applied_weight: redistributed.get(factor).copied().unwrap_or(0.0),
                description: format!(
                    "{factor}: risk {normalized:.1}/100 at weight {:.2}",
                    redistributed.get(factor).copied().unwrap_or(0.0)
                ),
            },
            None => RiskFactorScore {
                factor: *factor,
                available: false,
                raw_score: None,
                confidence: None,
                applied_weight: 0.0,
                description: format!("{factor}: no usable signal"),
            },
        };
        risk_factors.push(row);
    }

    ScoringResult {
        url: input.url.clone(),
        final_score,
        risk_level,
        confidence,
        risk_factors,
        breakdown,
        metadata: ScoringMetadata {
            missing_factors: missing,
            redistributed_weights: redistributed,
            normalization_method: config.normalization.method,
            config_source: selected.source.to_string(),
            config_hash: selected.config_hash.clone(),
            total_processing_time_ms: elapsed_ms(started),
            timestamp: Utc::now(),
        },
    }
}

/// Classification on the safety scale.
fn classify(final_score: f64, thresholds: &ClassificationThresholds) -> RiskLevel {
    if final_score >= thresholds.safe_min {
        RiskLevel::Low
    } else if final_score >= thresholds.caution_min {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// The fixed degraded verdict for inputs with no usable signal.
fn fallback_result(
    url: String,
    selected: &SelectedConfig,
    missing: Vec<RiskFactorType>,
    started: Instant,
) -> ScoringResult {
    let config = &selected.config;
    let risk_factors = config
        .weights
        .keys()
        .map(|factor| RiskFactorScore {
            factor: *factor,
            available: false,
            raw_score: None,
            confidence: None,
            applied_weight: 0.0,
            description: format!("{factor}: no usable signal"),
        })
        .collect();

    ScoringResult {
        url,
        final_score: FALLBACK_SCORE,
        risk_level: RiskLevel::Medium,
        confidence: config.confidence_adjustment.minimum_confidence,
        risk_factors,
        breakdown: ScoreBreakdown::default(),
        metadata: ScoringMetadata {
            missing_factors: missing,
            redistributed_weights: BTreeMap::new(),
            normalization_method: config.normalization.method,
            config_source: selected.source.to_string(),
            config_hash: selected.config_hash.clone(),
            total_processing_time_ms: elapsed_ms(started),
            timestamp: Utc::now(),
        },
    }
}
