//! Orchestration output contract.
//!
//! An [`OrchestrationResult`] wraps the scoring verdict with everything
//! the orchestration layer knows that the calculator does not: how each
//! provider fared, aggregate execution metrics, the terminal state, and
//! whether (and why) the analysis degraded to the fallback verdict.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display as DisplayMacro;

use crate::error_handling::DegradationReason;
use crate::scoring::ScoringResult;
use crate::signal::{RiskFactorType, RiskLevel, SignalResult};

/// Stages of one `analyze_url` call.
///
/// `Failed` is terminal and reachable only from validation and parsing;
/// once signal fetching starts, every path ends in `Done` (possibly
/// degraded, never failed).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, DisplayMacro, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    /// Checking the raw input against the validation policy.
    Validating,
    /// Decomposing the accepted URL into host parts.
    ParsingUrl,
    /// Providers are in flight.
    FetchingSignals,
    /// Combining successful signals into a verdict.
    Scoring,
    /// Analysis completed with a real or degraded verdict.
    Done,
    /// The URL was rejected before any signal was fetched.
    Failed,
}

/// How one provider invocation went, as reported outward.
///
/// Derived from the provider's [`SignalResult`] envelope; the payload
/// itself lives in the scoring breakdown, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOutcome {
    /// Whether the provider produced usable data.
    pub success: bool,
    /// Wall-clock milliseconds the provider spent, retries included.
    pub processing_time_ms: u64,
    /// Served from cache.
    pub from_cache: bool,
    /// Retries burned producing this outcome.
    pub retries: u32,
    /// The failure, rendered, when the provider failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceOutcome {
    /// Extracts the outward-facing outcome from an envelope.
    pub fn from_signal<T>(signal: &SignalResult<T>) -> Self {
        ServiceOutcome {
            success: signal.success(),
            processing_time_ms: signal.processing_time_ms(),
            from_cache: signal.from_cache(),
            retries: signal.retries(),
            error: signal.error().map(|e| e.to_string()),
        }
    }
}

/// Aggregate execution metrics for one analysis.
///
/// For a URL rejected at validation, `services_executed` is zero and
/// `services_failed` counts the providers that were skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrchestrationMetrics {
    /// Wall-clock milliseconds for the whole call.
    pub total_processing_time_ms: u64,
    /// Providers actually invoked.
    pub services_executed: usize,
    /// Providers that produced usable data.
    pub services_succeeded: usize,
    /// Providers that failed or were skipped.
    pub services_failed: usize,
    /// Whether providers ran concurrently.
    pub parallel_execution: bool,
    /// Whether the signal cache was backed by a real store.
    pub caching_enabled: bool,
}

/// Why and how an analysis fell back to the degraded verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    /// The statistics bucket this degradation lands in.
    pub reason: DegradationReason,
    /// Human-readable cause (the validation error, the counts, the
    /// exceeded budget).
    pub detail: String,
}

/// The complete outcome of one `analyze_url` call.
///
/// Always structurally valid: a rejected URL, a timed-out analysis, and
/// an insufficient-signal analysis all produce a result with the
/// fallback verdict and a populated `degraded` field instead of an
/// error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestrationResult {
    /// The scoring verdict (real or fallback).
    pub scoring: ScoringResult,
    /// Per-provider outcomes, keyed by factor for a stable serialized
    /// order. Contains only providers that were actually invoked.
    pub service_results: BTreeMap<RiskFactorType, ServiceOutcome>,
    /// Aggregate execution metrics.
    pub orchestration_metrics: OrchestrationMetrics,
    /// Terminal state: `Done` or `Failed`.
    pub state: AnalysisState,
    /// Present when the verdict is the fallback rather than a real score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<Degradation>,
}

impl OrchestrationResult {
    /// Whether this analysis fell back instead of scoring real signals.
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    /// The outcome for one provider, when it was invoked.
    pub fn service(&self, factor: RiskFactorType) -> Option<&ServiceOutcome> {
        self.service_results.get(&factor)
    }
}

/// One entry of the `recent_analyses` statistics report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentAnalysis {
    pub url: String,
    /// Safety score, 0-100 where higher means safer.
    pub final_score: f64,
    pub risk_level: RiskLevel,
    /// Why this analysis degraded, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<DegradationReason>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregates over the bounded orchestration history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorStatistics {
    /// Analyses currently represented in the history window.
    pub total_analyses: usize,
    /// Mean wall-clock milliseconds per analysis.
    pub average_processing_time_ms: f64,
    /// Mean per-analysis fraction of invoked providers that succeeded.
    pub average_success_rate: f64,
    /// Per-factor fraction of invocations that succeeded, over analyses
    /// where that factor's provider actually ran.
    pub service_availability: BTreeMap<RiskFactorType, f64>,
    /// Analyses in the window that returned the fallback verdict.
    pub degraded_analyses: usize,
    /// Most recent analyses, newest last.
    pub recent_analyses: Vec<RecentAnalysis>,
}
