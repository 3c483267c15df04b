//! Analysis orchestration.
//!
//! The orchestrator owns one analysis end to end: validate and parse the
//! URL, fan out to every registered signal provider under per-service
//! deadlines, assemble whatever succeeded into a scoring input, and hand
//! it to the calculator. Failure is absorbed at every stage:
//! `analyze_url` always returns a structurally valid
//! [`OrchestrationResult`], degrading to the fallback verdict when the
//! URL is rejected, too few providers succeed, or the total time budget
//! runs out.
//!
//! Providers are injected as trait objects, so tests substitute fakes
//! and a deployment can run with any subset of the bundled providers
//! (the AI provider is skipped entirely when no API key is configured).

mod result;

pub use result::{
    AnalysisState, Degradation, OrchestrationMetrics, OrchestrationResult, OrchestratorStatistics,
    RecentAnalysis, ServiceOutcome,
};

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::cache::SignalCache;
use crate::config::{
    DEFAULT_TLS_PORT, MINIMUM_REQUIRED_SERVICES, ORCHESTRATION_HISTORY_CAP,
    RECENT_ANALYSES_REPORTED, SERVICE_RETRIES, SERVICE_TIMEOUT_SECS, TOTAL_TIMEOUT_SECS,
};
use crate::error_handling::{
    get_retry_strategy, AnalysisStats, ConfigurationError, DegradationReason, SignalError,
};
use crate::providers::{
    CertificateProvider, ContentAnalysisProvider, DomainAgeProvider, ReputationProvider,
};
use crate::scoring::{Experiment, ScoreCalculator, ScoringConfigPatch};
use crate::security::{validate_url, ValidatedUrl, ValidationOptions};
use crate::signal::{
    AiAnalysis, CertificateAnalysis, DomainAgeAnalysis, ReputationAnalysis, RiskFactorType,
    RiskLevel, ScoringInput, SignalResult,
};
use crate::utils::{duration_to_ms, elapsed_ms};

/// Orchestration policy for one engine instance.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline for each provider attempt. An attempt past it is
    /// converted into a structured timeout failure.
    pub service_timeout: Duration,
    /// Deadline for the whole fetch+score phase. Past it the analysis
    /// returns the fallback verdict.
    pub total_timeout: Duration,
    /// Retries per provider call on transient failure (0 disables).
    pub service_retries: u32,
    /// Providers that must succeed before scoring from partial data.
    pub minimum_required_services: usize,
    /// Fetch signals concurrently (default) or one provider at a time.
    pub parallel_execution: bool,
    /// Reported in metrics. Must agree with how the injected
    /// [`SignalCache`] was built; the orchestrator cannot see through
    /// to the backing store.
    pub caching_enabled: bool,
    /// Port probed by the certificate provider when the URL does not
    /// carry an explicit HTTPS port.
    pub tls_port: u16,
    /// URL validation policy.
    pub validation: ValidationOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            service_timeout: Duration::from_secs(SERVICE_TIMEOUT_SECS),
            total_timeout: Duration::from_secs(TOTAL_TIMEOUT_SECS),
            service_retries: SERVICE_RETRIES,
            minimum_required_services: MINIMUM_REQUIRED_SERVICES,
            parallel_execution: true,
            caching_enabled: true,
            tls_port: DEFAULT_TLS_PORT,
            validation: ValidationOptions::default(),
        }
    }
}

/// A partial orchestration-policy update.
///
/// `None` fields keep their current value. Scoring changes ride along in
/// `scoring` and are validated by the calculator before anything here is
/// applied, so a rejected patch changes nothing.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfigPatch {
    pub service_timeout: Option<Duration>,
    pub total_timeout: Option<Duration>,
    pub service_retries: Option<u32>,
    pub minimum_required_services: Option<usize>,
    pub parallel_execution: Option<bool>,
    /// Scoring configuration changes, validated atomically.
    pub scoring: Option<ScoringConfigPatch>,
}

/// Per-call options for [`AnalysisOrchestrator::analyze_url`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Instruct every provider to drop its cache entry and fetch fresh.
    pub force_refresh: bool,
    /// Experiment whose scoring configuration should be considered.
    pub experiment_id: Option<String>,
    /// Stable user identifier for experiment bucketing.
    pub user_id: Option<String>,
}

/// One finished analysis, as retained for statistics.
struct AnalysisRecord {
    url: String,
    final_score: f64,
    risk_level: RiskLevel,
    total_processing_time_ms: u64,
    /// Per invoked factor: did it succeed.
    outcomes: Vec<(RiskFactorType, bool)>,
    degraded: Option<DegradationReason>,
    timestamp: DateTime<Utc>,
}

/// Envelopes as they came back from the fetch phase, failures included.
struct FetchedSignals {
    reputation: Option<SignalResult<ReputationAnalysis>>,
    whois: Option<SignalResult<DomainAgeAnalysis>>,
    ssl: Option<SignalResult<CertificateAnalysis>>,
    ai: Option<SignalResult<AiAnalysis>>,
}

/// The analysis engine's front door.
///
/// Holds the provider set, the shared signal cache, the scoring
/// calculator, and the bounded history behind [`statistics`]. Safe to
/// share across tasks; two concurrent `analyze_url` calls only meet at
/// the cache and the history, both internally synchronized.
///
/// [`statistics`]: AnalysisOrchestrator::statistics
pub struct AnalysisOrchestrator {
    reputation: Option<Arc<dyn ReputationProvider>>,
    domain_age: Option<Arc<dyn DomainAgeProvider>>,
    certificate: Option<Arc<dyn CertificateProvider>>,
    content: Option<Arc<dyn ContentAnalysisProvider>>,
    cache: Arc<SignalCache>,
    calculator: ScoreCalculator,
    config: OrchestratorConfig,
    stats: AnalysisStats,
    history: Mutex<VecDeque<AnalysisRecord>>,
}

impl AnalysisOrchestrator {
    /// Creates an orchestrator with no providers registered.
    ///
    /// Register providers with the `with_*` builder methods; an
    /// orchestrator without enough providers to meet
    /// `minimum_required_services` degrades every analysis to the
    /// fallback verdict.
    pub fn new(
        calculator: ScoreCalculator,
        cache: Arc<SignalCache>,
        config: OrchestratorConfig,
    ) -> Self {
        AnalysisOrchestrator {
            reputation: None,
            domain_age: None,
            certificate: None,
            content: None,
            cache,
            calculator,
            config,
            stats: AnalysisStats::new(),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Registers the reputation provider.
    pub fn with_reputation(mut self, provider: Arc<dyn ReputationProvider>) -> Self {
        self.reputation = Some(provider);
        self
    }

    /// Registers the domain-age provider.
    pub fn with_domain_age(mut self, provider: Arc<dyn DomainAgeProvider>) -> Self {
        self.domain_age = Some(provider);
        self
    }

    /// Registers the certificate provider.
    pub fn with_certificate(mut self, provider: Arc<dyn CertificateProvider>) -> Self {
        self.certificate = Some(provider);
        self
    }

    /// Registers the AI content-analysis provider.
    pub fn with_content_analysis(mut self, provider: Arc<dyn ContentAnalysisProvider>) -> Self {
        self.content = Some(provider);
        self
    }

    fn configured_providers(&self) -> usize {
        [
            self.reputation.is_some(),
            self.domain_age.is_some(),
            self.certificate.is_some(),
            self.content.is_some(),
        ]
        .iter()
        .filter(|registered| **registered)
        .count()
    }

    /// Analyzes one URL end to end.
    ///
    /// Never fails: a rejected URL, a timed-out analysis, and an
    /// insufficient-signal analysis all return a well-formed result
    /// carrying the fallback verdict and a `degraded` explanation.
    ///
    /// # Arguments
    ///
    /// * `raw_url` - The URL as received from the caller
    /// * `options` - Cache-bypass and experiment options
    pub async fn analyze_url(&self, raw_url: &str, options: &AnalyzeOptions) -> OrchestrationResult {
        let started = Instant::now();
        log::debug!("{}: {}", AnalysisState::Validating, raw_url);

        let validated = match validate_url(raw_url, &self.config.validation, &psl::List) {
            Ok(validated) => validated,
            Err(error) => {
                log::warn!("Rejected {}: {}", raw_url, error);
                self.stats.increment_degradation(DegradationReason::InvalidUrl);
                let result = self.degraded_fallback(
                    raw_url,
                    DegradationReason::InvalidUrl,
                    format!("URL rejected: {error}"),
                    AnalysisState::Failed,
                    self.configured_providers(),
                    options,
                    started,
                );
                self.record(&result);
                return result;
            }
        };
        log::debug!(
            "{}: {} -> {}",
            AnalysisState::ParsingUrl,
            raw_url,
            validated.normalized
        );

        let fetch_and_score = self.fetch_and_score(&validated, options, started);
        let result = match tokio::time::timeout(self.config.total_timeout, fetch_and_score).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "Analysis of {} exceeded the {}s total budget",
                    validated.normalized,
                    self.config.total_timeout.as_secs()
                );
                self.stats
                    .increment_degradation(DegradationReason::TotalTimeout);
                // In-flight provider futures are dropped with the wait;
                // a late signal is discarded, not scored.
                self.degraded_fallback(
                    validated.normalized.as_str(),
                    DegradationReason::TotalTimeout,
                    format!(
                        "analysis exceeded the {}s total budget",
                        self.config.total_timeout.as_secs()
                    ),
                    AnalysisState::Done,
                    self.configured_providers(),
                    options,
                    started,
                )
            }
        };
        self.record(&result);
        result
    }

    /// The fetch+score phase, run under the total time budget.
    async fn fetch_and_score(
        &self,
        url: &ValidatedUrl,
        options: &AnalyzeOptions,
        started: Instant,
    ) -> OrchestrationResult {
        log::debug!("{}: {}", AnalysisState::FetchingSignals, url.normalized);
        let fetched = self.fetch_signals(url, options).await;

        let mut service_results = BTreeMap::new();
        self.note_outcome(
            RiskFactorType::Reputation,
            url,
            fetched.reputation.as_ref(),
            &mut service_results,
        );
        self.note_outcome(
            RiskFactorType::DomainAge,
            url,
            fetched.whois.as_ref(),
            &mut service_results,
        );
        self.note_outcome(
            RiskFactorType::SslCertificate,
            url,
            fetched.ssl.as_ref(),
            &mut service_results,
        );
        self.note_outcome(
            RiskFactorType::AiAnalysis,
            url,
            fetched.ai.as_ref(),
            &mut service_results,
        );

        let services_executed = service_results.len();
        let services_succeeded = service_results.values().filter(|o| o.success).count();
        let services_failed = services_executed - services_succeeded;

        if services_succeeded < self.config.minimum_required_services {
            log::warn!(
                "Only {} of {} signals for {}; need {} - returning fallback verdict",
                services_succeeded,
                services_executed,
                url.normalized,
                self.config.minimum_required_services
            );
            self.stats
                .increment_degradation(DegradationReason::InsufficientData);
            let scoring = self.calculator.calculate_score(
                &ScoringInput::empty(url.normalized.as_str()),
                options.experiment_id.as_deref(),
                options.user_id.as_deref(),
            );
            return OrchestrationResult {
                scoring,
                service_results,
                orchestration_metrics: self.metrics(
                    started,
                    services_executed,
                    services_succeeded,
                    services_failed,
                ),
                state: AnalysisState::Done,
                degraded: Some(Degradation {
                    reason: DegradationReason::InsufficientData,
                    detail: format!(
                        "{} of {} providers succeeded; minimum is {}",
                        services_succeeded, services_executed, self.config.minimum_required_services
                    ),
                }),
            };
        }

        log::debug!("{}: {}", AnalysisState::Scoring, url.normalized);
        // Fixed field order, independent of provider completion order.
        // Failed envelopes are dropped here: a failure contributes no
        // risk value, it only shows up in service_results.
        let input = ScoringInput {
            url: url.normalized.clone(),
            reputation: fetched.reputation.filter(|s| s.success()),
            whois: fetched.whois.filter(|s| s.success()),
            ssl: fetched.ssl.filter(|s| s.success()),
            ai: fetched.ai.filter(|s| s.success()),
        };
        let scoring = self.calculator.calculate_score(
            &input,
            options.experiment_id.as_deref(),
            options.user_id.as_deref(),
        );
        log::debug!(
            "{}: {} scored {:.1} ({}) in {} ms",
            AnalysisState::Done,
            url.normalized,
            scoring.final_score,
            scoring.risk_level,
            elapsed_ms(started)
        );

        OrchestrationResult {
            scoring,
            service_results,
            orchestration_metrics: self.metrics(
                started,
                services_executed,
                services_succeeded,
                services_failed,
            ),
            state: AnalysisState::Done,
            degraded: None,
        }
    }

    /// Invokes every registered provider, concurrently or one at a time.
    async fn fetch_signals(&self, url: &ValidatedUrl, options: &AnalyzeOptions) -> FetchedSignals {
        if self.config.parallel_execution {
            let (reputation, whois, ssl, ai) = tokio::join!(
                self.fetch_reputation(url, options),
                self.fetch_domain_age(url, options),
                self.fetch_certificate(url, options),
                self.fetch_content(url, options),
            );
            FetchedSignals {
                reputation,
                whois,
                ssl,
                ai,
            }
        } else {
            FetchedSignals {
                reputation: self.fetch_reputation(url, options).await,
                whois: self.fetch_domain_age(url, options).await,
                ssl: self.fetch_certificate(url, options).await,
                ai: self.fetch_content(url, options).await,
            }
        }
    }

    async fn fetch_reputation(
        &self,
        url: &ValidatedUrl,
        options: &AnalyzeOptions,
    ) -> Option<SignalResult<ReputationAnalysis>> {
        let provider = self.reputation.as_ref()?;
        Some(
            self.run_service(RiskFactorType::Reputation, url.normalized.as_str(), || {
                provider.analyze_url(url, options.force_refresh)
            })
            .await,
        )
    }

    async fn fetch_domain_age(
        &self,
        url: &ValidatedUrl,
        options: &AnalyzeOptions,
    ) -> Option<SignalResult<DomainAgeAnalysis>> {
        let provider = self.domain_age.as_ref()?;
        // IP hosts and unlisted suffixes have no registrable domain;
        // the full host is the best WHOIS target we have for those.
        let target = url.domain.as_deref().unwrap_or(url.hostname.as_str());
        Some(
            self.run_service(RiskFactorType::DomainAge, url.normalized.as_str(), || {
                provider.analyze_domain(target, options.force_refresh)
            })
            .await,
        )
    }

    async fn fetch_certificate(
        &self,
        url: &ValidatedUrl,
        options: &AnalyzeOptions,
    ) -> Option<SignalResult<CertificateAnalysis>> {
        let provider = self.certificate.as_ref()?;
        // An explicit HTTPS port in the URL wins; otherwise probe the
        // configured TLS port even for http:// URLs, so a plain-http
        // site still yields a certificate signal for its domain.
        let port = if url.scheme == "https" && url.port != DEFAULT_TLS_PORT {
            url.port
        } else {
            self.config.tls_port
        };
        Some(
            self.run_service(
                RiskFactorType::SslCertificate,
                url.normalized.as_str(),
                || provider.analyze_certificate(&url.hostname, port, options.force_refresh),
            )
            .await,
        )
    }

    async fn fetch_content(
        &self,
        url: &ValidatedUrl,
        options: &AnalyzeOptions,
    ) -> Option<SignalResult<AiAnalysis>> {
        let provider = self.content.as_ref()?;
        Some(
            self.run_service(RiskFactorType::AiAnalysis, url.normalized.as_str(), || {
                provider.analyze_url(url, options.force_refresh)
            })
            .await,
        )
    }

    /// Runs one provider call under the per-service policy: a deadline
    /// per attempt, and retries with backoff for transient failures
    /// only. The returned envelope records how many retries were burned.
    async fn run_service<T, F, Fut>(
        &self,
        factor: RiskFactorType,
        url: &str,
        call: F,
    ) -> SignalResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SignalResult<T>>,
    {
        let deadline = self.config.service_timeout;
        let mut delays = get_retry_strategy(self.config.service_retries);
        let mut attempts: u32 = 0;
        loop {
            let attempt_started = Instant::now();
            let result = match tokio::time::timeout(deadline, call()).await {
                Ok(result) => result,
                Err(_) => SignalResult::failure(
                    SignalError::Timeout(duration_to_ms(deadline)),
                    elapsed_ms(attempt_started),
                ),
            };

            if result.success() {
                log::debug!(
                    "{} signal for {} in {} ms{}",
                    factor,
                    url,
                    result.processing_time_ms(),
                    if result.from_cache() { " (cached)" } else { "" }
                );
                return result.with_retries(attempts);
            }

            let transient = result.error().map(|e| e.is_transient()).unwrap_or(false);
            match delays.next() {
                Some(delay) if transient => {
                    attempts += 1;
                    log::debug!(
                        "{} signal for {} failed transiently, retry {} in {:?}",
                        factor,
                        url,
                        attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return result.with_retries(attempts),
            }
        }
    }

    /// Folds one envelope into the per-service report and statistics.
    fn note_outcome<T>(
        &self,
        factor: RiskFactorType,
        url: &ValidatedUrl,
        signal: Option<&SignalResult<T>>,
        results: &mut BTreeMap<RiskFactorType, ServiceOutcome>,
    ) {
        let Some(signal) = signal else {
            return;
        };
        if let Some(error) = signal.error() {
            self.stats.increment_signal_error(error.kind());
            log::warn!("{} signal failed for {}: {}", factor, url.normalized, error);
        }
        results.insert(factor, ServiceOutcome::from_signal(signal));
    }

    fn metrics(
        &self,
        started: Instant,
        services_executed: usize,
        services_succeeded: usize,
        services_failed: usize,
    ) -> OrchestrationMetrics {
        OrchestrationMetrics {
            total_processing_time_ms: elapsed_ms(started),
            services_executed,
            services_succeeded,
            services_failed,
            parallel_execution: self.config.parallel_execution,
            caching_enabled: self.config.caching_enabled,
        }
    }

    /// A fallback result for analyses that never reached scoring with
    /// real signals: rejected URLs and total-budget timeouts.
    fn degraded_fallback(
        &self,
        url: &str,
        reason: DegradationReason,
        detail: String,
        state: AnalysisState,
        services_failed: usize,
        options: &AnalyzeOptions,
        started: Instant,
    ) -> OrchestrationResult {
        let scoring = self.calculator.calculate_score(
            &ScoringInput::empty(url),
            options.experiment_id.as_deref(),
            options.user_id.as_deref(),
        );
        OrchestrationResult {
            scoring,
            service_results: BTreeMap::new(),
            orchestration_metrics: OrchestrationMetrics {
                total_processing_time_ms: elapsed_ms(started),
                services_executed: 0,
                services_succeeded: 0,
                services_failed,
                parallel_execution: self.config.parallel_execution,
                caching_enabled: self.config.caching_enabled,
            },
            state,
            degraded: Some(Degradation { reason, detail }),
        }
    }

    fn lock_history(&self) -> MutexGuard<'_, VecDeque<AnalysisRecord>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one finished analysis to the bounded history.
    fn record(&self, result: &OrchestrationResult) {
        let record = AnalysisRecord {
            url: result.scoring.url.clone(),
            final_score: result.scoring.final_score,
            risk_level: result.scoring.risk_level,
            total_processing_time_ms: result.orchestration_metrics.total_processing_time_ms,
            outcomes: result
                .service_results
                .iter()
                .map(|(factor, outcome)| (*factor, outcome.success))
                .collect(),
            degraded: result.degraded.as_ref().map(|d| d.reason),
            timestamp: result.scoring.metadata.timestamp,
        };
        let mut history = self.lock_history();
        history.push_back(record);
        while history.len() > ORCHESTRATION_HISTORY_CAP {
            history.pop_front();
        }
    }

    /// Aggregates over the bounded history of past analyses.
    pub fn statistics(&self) -> OrchestratorStatistics {
        let history = self.lock_history();
        let total = history.len();

        let mut availability: BTreeMap<RiskFactorType, (usize, usize)> = BTreeMap::new();
        let mut time_sum: u64 = 0;
        let mut rate_sum = 0.0;
        let mut degraded_analyses = 0;
        for record in history.iter() {
            time_sum += record.total_processing_time_ms;
            let executed = record.outcomes.len();
            let succeeded = record.outcomes.iter().filter(|(_, ok)| *ok).count();
            rate_sum += if executed == 0 {
                0.0
            } else {
                succeeded as f64 / executed as f64
            };
            if record.degraded.is_some() {
                degraded_analyses += 1;
            }
            for (factor, ok) in &record.outcomes {
                let entry = availability.entry(*factor).or_insert((0, 0));
                entry.1 += 1;
                if *ok {
                    entry.0 += 1;
                }
            }
        }

        OrchestratorStatistics {
            total_analyses: total,
            average_processing_time_ms: if total == 0 {
                0.0
            } else {
                time_sum as f64 / total as f64
            },
            average_success_rate: if total == 0 { 0.0 } else { rate_sum / total as f64 },
            service_availability: availability
                .into_iter()
                .map(|(factor, (ok, ran))| (factor, ok as f64 / ran as f64))
                .collect(),
            degraded_analyses,
            recent_analyses: history
                .iter()
                .skip(total.saturating_sub(RECENT_ANALYSES_REPORTED))
                .map(|record| RecentAnalysis {
                    url: record.url.clone(),
                    final_score: record.final_score,
                    risk_level: record.risk_level,
                    degraded: record.degraded,
                    timestamp: record.timestamp,
                })
                .collect(),
        }
    }

    /// Applies a partial configuration update.
    ///
    /// Scoring changes are validated first and atomically; a rejected
    /// scoring patch leaves orchestration settings untouched too.
    /// Returns the validation warnings for the applied scoring change.
    pub fn update_configuration(
        &mut self,
        patch: &OrchestratorConfigPatch,
    ) -> Result<Vec<String>, ConfigurationError> {
        let mut warnings = Vec::new();
        if let Some(scoring) = &patch.scoring {
            warnings = self.calculator.update_configuration(scoring)?;
        }
        if let Some(v) = patch.service_timeout {
            self.config.service_timeout = v;
        }
        if let Some(v) = patch.total_timeout {
            self.config.total_timeout = v;
        }
        if let Some(v) = patch.service_retries {
            self.config.service_retries = v;
        }
        if let Some(v) = patch.minimum_required_services {
            self.config.minimum_required_services = v;
        }
        if let Some(v) = patch.parallel_execution {
            self.config.parallel_execution = v;
        }
        Ok(warnings)
    }

    /// Registers an experiment configuration with the calculator.
    pub fn register_experiment(
        &self,
        experiment: Experiment,
    ) -> Result<Vec<String>, ConfigurationError> {
        self.calculator.register_experiment(experiment)
    }

    /// Clears the orchestration and scoring histories.
    pub fn clear_history(&self) {
        self.lock_history().clear();
        self.calculator.clear_history();
    }

    /// Drops every cached signal, across all providers sharing the cache.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Signal-failure and degradation counters for this instance.
    pub fn analysis_stats(&self) -> &AnalysisStats {
        &self.stats
    }
}
