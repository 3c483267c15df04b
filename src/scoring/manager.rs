//! Configuration lifecycle: validation, runtime updates, A/B experiment
//! selection, and change history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::CONFIG_HISTORY_CAP;
use crate::error_handling::ConfigurationError;
use crate::scoring::config::{ScoringConfig, ScoringConfigPatch};

/// A registered A/B experiment. Its overrides are merged over the
/// manager's current default config at selection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub overrides: ScoringConfigPatch,
    /// Fraction of hashed users enrolled, in `[0, 1]`.
    pub traffic_allocation: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Experiment {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    /// Deterministic bucket for a user in `[0, 1]`, from the FNV-1a hash
    /// of user id and experiment id. The same user always lands in the
    /// same bucket for the same experiment.
    fn bucket_for(&self, user_id: &str) -> f64 {
        let key = format!("{user_id}{}", self.id);
        f64::from(fnv1a_32(&key)) / f64::from(u32::MAX)
    }
}

/// Where a selected configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Default,
    Experiment(String),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Experiment(id) => write!(f, "experiment:{id}"),
        }
    }
}

/// The configuration chosen for one scoring request, with provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedConfig {
    pub config: ScoringConfig,
    pub source: ConfigSource,
    pub config_hash: String,
}

/// One accepted configuration change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigHistoryEntry {
    pub applied_at: DateTime<Utc>,
    /// `initial`, `update`, or `experiment:<id>`.
    pub tag: String,
    pub config_hash: String,
    pub config: ScoringConfig,
}

/// Owns the active scoring configuration and its experiments.
#[derive(Debug)]
pub struct ScoringConfigManager {
    current: ScoringConfig,
    experiments: Vec<Experiment>,
    history: VecDeque<ConfigHistoryEntry>,
}

impl ScoringConfigManager {
    /// Creates a manager around a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` listing every violated rule if the
    /// configuration is invalid. Validation warnings are logged.
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigurationError> {
        let warnings = config.validate().into_result()?;
        for warning in &warnings {
            warn!("scoring config warning: {warning}");
        }
        let mut manager = Self {
            current: config,
            experiments: Vec::new(),
            history: VecDeque::new(),
        };
        manager.record_history("initial");
        Ok(manager)
    }

    /// Creates a manager with the built-in default configuration, which
    /// is valid by construction.
    pub fn with_defaults() -> Self {
        let mut manager = Self {
            current: ScoringConfig::default(),
            experiments: Vec::new(),
            history: VecDeque::new(),
        };
        manager.record_history("initial");
        manager
    }

    pub fn current(&self) -> &ScoringConfig {
        &self.current
    }

    pub fn history(&self) -> impl Iterator<Item = &ConfigHistoryEntry> {
        self.history.iter()
    }

    pub fn experiments(&self) -> &[Experiment] {
        &self.experiments
    }

    /// Applies a partial update to the default configuration.
    ///
    /// The merged result is validated as a whole before anything is
    /// applied; a rejected update leaves the current configuration
    /// untouched.
    ///
    /// # Returns
    ///
    /// The non-fatal validation warnings for the accepted configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` with the full list of violations if
    /// the merged configuration is invalid.
    pub fn update(&mut self, patch: &ScoringConfigPatch) -> Result<Vec<String>, ConfigurationError> {
        let merged = self.current.merged(patch);
        let warnings = merged.validate().into_result()?;
        for warning in &warnings {
            warn!("scoring config warning: {warning}");
        }
        self.current = merged;
        self.record_history("update");
        Ok(warnings)
    }

    /// Registers an experiment after validating its window, allocation,
    /// and the full configuration its overrides produce.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the experiment record or its
    /// merged configuration is invalid.
    pub fn register_experiment(
        &mut self,
        experiment: Experiment,
    ) -> Result<Vec<String>, ConfigurationError> {
        let mut violations = Vec::new();
        if experiment.id.is_empty() {
            violations.push("experiment id is empty".to_string());
        }
        if !(0.0..=1.0).contains(&experiment.traffic_allocation) {
            violations.push(format!(
                "traffic_allocation is {}, outside [0, 1]",
                experiment.traffic_allocation
            ));
        }
        if experiment.end <= experiment.start {
            violations.push(format!(
                "experiment window is empty: {} .. {}",
                experiment.start, experiment.end
            ));
        }
        if !violations.is_empty() {
            return Err(ConfigurationError { violations });
        }

        let merged = self.current.merged(&experiment.overrides);
        let warnings = merged.validate().into_result()?;
        for warning in &warnings {
            warn!(
                "experiment {} config warning: {warning}",
                experiment.id
            );
        }

        let tag = format!("experiment:{}", experiment.id);
        self.experiments.retain(|e| e.id != experiment.id);
        self.experiments.push(experiment);
        self.history.push_back(ConfigHistoryEntry {
            applied_at: Utc::now(),
            tag,
            config_hash: config_hash(&merged),
            config: merged,
        });
        self.trim_history();
        Ok(warnings)
    }

    /// Picks the configuration for one request.
    ///
    /// An explicitly requested experiment wins if it is active right
    /// now. Otherwise a user id is hashed against each active
    /// experiment's traffic allocation, first match winning. With
    /// neither, the default configuration applies.
    pub fn select_configuration(
        &self,
        user_id: Option<&str>,
        experiment_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> SelectedConfig {
        if let Some(id) = experiment_id {
            if let Some(experiment) = self
                .experiments
                .iter()
                .find(|e| e.id == id && e.is_active_at(now))
            {
                return self.selected_from(experiment);
            }
        }
        if let Some(user) = user_id {
            for experiment in self.experiments.iter().filter(|e| e.is_active_at(now)) {
                if experiment.bucket_for(user) <= experiment.traffic_allocation {
                    return self.selected_from(experiment);
                }
            }
        }
        SelectedConfig {
            config: self.current.clone(),
            source: ConfigSource::Default,
            config_hash: config_hash(&self.current),
        }
    }

    fn selected_from(&self, experiment: &Experiment) -> SelectedConfig {
        let config = self.current.merged(&experiment.overrides);
        let config_hash = config_hash(&config);
        SelectedConfig {
            config,
            source: ConfigSource::Experiment(experiment.id.clone()),
            config_hash,
        }
    }

    fn record_history(&mut self, tag: &str) {
        self.history.push_back(ConfigHistoryEntry {
            applied_at: Utc::now(),
            tag: tag.to_string(),
            config_hash: config_hash(&self.current),
            config: self.current.clone(),
        });
        self.trim_history();
    }

    fn trim_history(&mut self) {
        while self.history.len() > CONFIG_HISTORY_CAP {
            self.history.pop_front();
        }
    }
}

/// Short stable fingerprint of a configuration: SHA-256 over its
/// canonical JSON form, truncated to 16 hex characters. Two configs
/// share a hash exactly when they are semantically identical.
pub fn config_hash(config: &ScoringConfig) -> String {
    let value = serde_json::to_value(config).unwrap_or(Value::Null);
    let canonical = canonical_json(&value);
    let digest = Sha256::digest(canonical.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Renders JSON with all object keys recursively sorted, so the hash
/// does not depend on serialization order.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .iter()
                .map(|key| {
                    format!(
                        "{}:{}",
                        Value::String((*key).clone()),
                        canonical_json(&map[*key])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        other => other.to_string(),
    }
}

/// 32-bit FNV-1a over the raw bytes of the input.
fn fnv1a_32(input: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in input.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::config::ClassificationThresholds;
    use chrono::TimeZone;

    fn active_window() -> (DateTime<Utc>, DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap();
        (start, now, end)
    }

    fn experiment(id: &str, allocation: f64) -> Experiment {
        let (start, _, end) = active_window();
        Experiment {
            id: id.to_string(),
            overrides: ScoringConfigPatch {
                thresholds: Some(ClassificationThresholds {
                    safe_min: 70.0,
                    caution_min: 40.0,
                    danger_max: 0.0,
                }),
                ..ScoringConfigPatch::default()
            },
            traffic_allocation: allocation,
            start,
            end,
        }
    }

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(fnv1a_32(""), 0x811c9dc5);
        assert_eq!(fnv1a_32("a"), 0xe40c292c);
        assert_eq!(fnv1a_32("foobar"), 0xbf9cf968);
    }

    #[test]
    fn test_invalid_initial_config_rejected() {
        let mut config = ScoringConfig::default();
        config.thresholds.safe_min = 10.0;
        let err = ScoringConfigManager::new(config).unwrap_err();
        assert!(!err.violations.is_empty());
    }

    #[test]
    fn test_rejected_update_leaves_current_untouched() {
        let mut manager = ScoringConfigManager::with_defaults();
        let before = manager.current().clone();

        let mut weights = std::collections::BTreeMap::new();
        weights.insert(crate::signal::RiskFactorType::Reputation, 2.0);
        let patch = ScoringConfigPatch {
            weights: Some(weights),
            ..ScoringConfigPatch::default()
        };
        assert!(manager.update(&patch).is_err());
        assert_eq!(manager.current(), &before);
        // Only the initial entry in history
        assert_eq!(manager.history().count(), 1);
    }

    #[test]
    fn test_update_records_history() {
        let mut manager = ScoringConfigManager::with_defaults();
        let patch = ScoringConfigPatch {
            thresholds: Some(ClassificationThresholds {
                safe_min: 70.0,
                caution_min: 40.0,
                danger_max: 0.0,
            }),
            ..ScoringConfigPatch::default()
        };
        let warnings = manager.update(&patch).unwrap();
        assert!(warnings.is_empty());

        let tags: Vec<&str> = manager.history().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["initial", "update"]);
        assert_eq!(manager.current().thresholds.safe_min, 70.0);
    }

    #[test]
    fn test_history_is_capped() {
        let mut manager = ScoringConfigManager::with_defaults();
        for i in 0..20 {
            let patch = ScoringConfigPatch {
                thresholds: Some(ClassificationThresholds {
                    safe_min: 60.0 + f64::from(i),
                    caution_min: 34.0,
                    danger_max: 0.0,
                }),
                ..ScoringConfigPatch::default()
            };
            manager.update(&patch).unwrap();
        }
        assert_eq!(manager.history().count(), CONFIG_HISTORY_CAP);
        // The initial entry has been evicted
        assert!(manager.history().all(|e| e.tag == "update"));
    }

    #[test]
    fn test_explicit_experiment_selection() {
        let mut manager = ScoringConfigManager::with_defaults();
        manager.register_experiment(experiment("exp-1", 0.0)).unwrap();
        let (_, now, _) = active_window();

        // Explicit request bypasses traffic allocation entirely
        let selected = manager.select_configuration(None, Some("exp-1"), now);
        assert_eq!(selected.source, ConfigSource::Experiment("exp-1".to_string()));
        assert_eq!(selected.config.thresholds.safe_min, 70.0);
    }

    #[test]
    fn test_inactive_experiment_falls_back_to_default() {
        let mut manager = ScoringConfigManager::with_defaults();
        manager.register_experiment(experiment("exp-1", 1.0)).unwrap();

        let after_end = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let selected = manager.select_configuration(None, Some("exp-1"), after_end);
        assert_eq!(selected.source, ConfigSource::Default);
        assert_eq!(selected.config.thresholds.safe_min, 67.0);
    }

    #[test]
    fn test_unknown_experiment_falls_back_to_default() {
        let manager = ScoringConfigManager::with_defaults();
        let (_, now, _) = active_window();
        let selected = manager.select_configuration(None, Some("nope"), now);
        assert_eq!(selected.source, ConfigSource::Default);
    }

    #[test]
    fn test_full_allocation_enrolls_every_user() {
        let mut manager = ScoringConfigManager::with_defaults();
        manager.register_experiment(experiment("exp-1", 1.0)).unwrap();
        let (_, now, _) = active_window();

        for user in ["alice", "bob", "carol", "dave"] {
            let selected = manager.select_configuration(Some(user), None, now);
            assert_eq!(
                selected.source,
                ConfigSource::Experiment("exp-1".to_string()),
                "user {user} should be enrolled at full allocation"
            );
        }
    }

    #[test]
    fn test_bucketing_is_stable_across_calls() {
        let mut manager = ScoringConfigManager::with_defaults();
        manager.register_experiment(experiment("exp-1", 0.5)).unwrap();
        let (_, now, _) = active_window();

        let first = manager.select_configuration(Some("alice"), None, now);
        for _ in 0..10 {
            let again = manager.select_configuration(Some("alice"), None, now);
            assert_eq!(again.source, first.source);
        }
    }

    #[test]
    fn test_partial_allocation_splits_users() {
        let mut manager = ScoringConfigManager::with_defaults();
        manager.register_experiment(experiment("exp-1", 0.5)).unwrap();
        let (_, now, _) = active_window();

        let mut enrolled = 0;
        let total = 200;
        for i in 0..total {
            let user = format!("user-{i}");
            let selected = manager.select_configuration(Some(&user), None, now);
            if selected.source != ConfigSource::Default {
                enrolled += 1;
            }
        }
        // Rough split; the hash should not send everyone one way
        assert!(enrolled > total / 5, "only {enrolled} of {total} enrolled");
        assert!(enrolled < total * 4 / 5, "{enrolled} of {total} enrolled");
    }

    #[test]
    fn test_experiment_with_invalid_merged_config_rejected() {
        let mut manager = ScoringConfigManager::with_defaults();
        let mut exp = experiment("broken", 0.5);
        exp.overrides.thresholds = Some(ClassificationThresholds {
            safe_min: 10.0,
            caution_min: 40.0,
            danger_max: 0.0,
        });
        assert!(manager.register_experiment(exp).is_err());
        assert!(manager.experiments().is_empty());
    }

    #[test]
    fn test_experiment_window_and_allocation_validated() {
        let mut manager = ScoringConfigManager::with_defaults();
        let mut exp = experiment("bad", 1.5);
        std::mem::swap(&mut exp.start, &mut exp.end);
        let err = manager.register_experiment(exp).unwrap_err();
        assert_eq!(err.violations.len(), 2);
    }

    #[test]
    fn test_config_hash_is_stable_and_sensitive() {
        let config = ScoringConfig::default();
        let h1 = config_hash(&config);
        let h2 = config_hash(&config);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 16);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));

        let mut changed = config.clone();
        changed.thresholds.safe_min = 68.0;
        assert_ne!(config_hash(&changed), h1);
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value: Value = serde_json::from_str(r#"{"b":1,"a":{"d":2,"c":[3,4]}}"#).unwrap();
        assert_eq!(canonical_json(&value), r#"{"a":{"c":[3,4],"d":2},"b":1}"#);
    }
}
