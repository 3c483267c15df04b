// Orchestrator tests, built entirely on fake providers.

use super::*;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

use async_trait::async_trait;

use crate::config::{MINIMUM_CONFIDENCE, ORCHESTRATION_HISTORY_CAP};
use crate::error_handling::SignalErrorKind;
use crate::signal::{
    CertificateSecurity, CertificateType, CertificateValidation, EncryptionStrength,
};

/// Shared fake-provider behavior: optional latency, scripted failures,
/// and call accounting.
#[derive(Default)]
struct FakeBehavior {
    delay: Option<Duration>,
    /// Fail every call with this error.
    fail: Option<SignalError>,
    /// Fail the first N calls with a transient error, then succeed.
    transient_failures: u32,
    calls: AtomicU32,
    refreshes: AtomicU32,
}

impl FakeBehavior {
    fn failing(error: SignalError) -> Self {
        FakeBehavior {
            fail: Some(error),
            ..FakeBehavior::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        FakeBehavior {
            delay: Some(delay),
            ..FakeBehavior::default()
        }
    }

    async fn run(&self, force_refresh: bool) -> Result<(), SignalError> {
        let call = self.calls.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        if force_refresh {
            self.refreshes.fetch_add(1, AtomicOrdering::SeqCst);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if call <= self.transient_failures {
            return Err(SignalError::Unavailable("flaky backend".into()));
        }
        if let Some(error) = &self.fail {
            return Err(error.clone());
        }
        Ok(())
    }

    fn calls(&self) -> u32 {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    fn refreshes(&self) -> u32 {
        self.refreshes.load(AtomicOrdering::SeqCst)
    }
}

fn reputation_payload(score: f64) -> ReputationAnalysis {
    ReputationAnalysis {
        is_clean: score < 30.0,
        threat_matches: vec![],
        score,
        risk_level: RiskLevel::Low,
        confidence: 0.9,
    }
}

fn whois_payload(risk: f64) -> DomainAgeAnalysis {
    DomainAgeAnalysis {
        age_days: Some(2000),
        registration_date: None,
        registrar: Some("Example Registrar".into()),
        score: risk,
        confidence: 0.85,
    }
}

fn certificate_payload(risk: f64) -> CertificateAnalysis {
    CertificateAnalysis {
        certificate_type: CertificateType::Dv,
        days_until_expiry: 120,
        validation: CertificateValidation {
            is_valid: true,
            is_expired: false,
            is_self_signed: false,
            domain_match: true,
            chain_valid: true,
        },
        security: CertificateSecurity {
            encryption_strength: EncryptionStrength::Strong,
            key_size: Some(256),
        },
        score: risk,
        confidence: 0.9,
    }
}

fn ai_payload(risk: f64) -> AiAnalysis {
    AiAnalysis {
        risk_score: risk,
        scam_category: "legitimate".into(),
        confidence: 90.0,
        primary_risks: vec![],
        indicators: vec![],
    }
}

#[derive(Default)]
struct FakeReputation {
    behavior: FakeBehavior,
    risk: f64,
}

#[async_trait]
impl ReputationProvider for FakeReputation {
    async fn analyze_url(
        &self,
        _url: &ValidatedUrl,
        force_refresh: bool,
    ) -> SignalResult<ReputationAnalysis> {
        match self.behavior.run(force_refresh).await {
            Ok(()) => SignalResult::ok(reputation_payload(self.risk), 5),
            Err(e) => SignalResult::failure(e, 5),
        }
    }
}

#[derive(Default)]
struct FakeDomainAge {
    behavior: FakeBehavior,
    risk: f64,
    last_domain: Mutex<Option<String>>,
}

#[async_trait]
impl DomainAgeProvider for FakeDomainAge {
    async fn analyze_domain(
        &self,
        domain: &str,
        force_refresh: bool,
    ) -> SignalResult<DomainAgeAnalysis> {
        *self
            .last_domain
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(domain.to_string());
        match self.behavior.run(force_refresh).await {
            Ok(()) => SignalResult::ok(whois_payload(self.risk), 5),
            Err(e) => SignalResult::failure(e, 5),
        }
    }
}

#[derive(Default)]
struct FakeCertificate {
    behavior: FakeBehavior,
    risk: f64,
    last_port: AtomicU32,
}

#[async_trait]
impl CertificateProvider for FakeCertificate {
    async fn analyze_certificate(
        &self,
        _domain: &str,
        port: u16,
        force_refresh: bool,
    ) -> SignalResult<CertificateAnalysis> {
        self.last_port.store(u32::from(port), AtomicOrdering::SeqCst);
        match self.behavior.run(force_refresh).await {
            Ok(()) => SignalResult::ok(certificate_payload(self.risk), 5),
            Err(e) => SignalResult::failure(e, 5),
        }
    }
}

#[derive(Default)]
struct FakeContent {
    behavior: FakeBehavior,
    risk: f64,
}

#[async_trait]
impl ContentAnalysisProvider for FakeContent {
    async fn analyze_url(
        &self,
        _url: &ValidatedUrl,
        force_refresh: bool,
    ) -> SignalResult<AiAnalysis> {
        match self.behavior.run(force_refresh).await {
            Ok(()) => SignalResult::ok(ai_payload(self.risk), 5),
            Err(e) => SignalResult::failure(e, 5),
        }
    }
}

struct Fakes {
    reputation: Arc<FakeReputation>,
    whois: Arc<FakeDomainAge>,
    certificate: Arc<FakeCertificate>,
    ai: Arc<FakeContent>,
}

/// Four healthy providers reporting low risk everywhere.
fn benign_fakes() -> Fakes {
    Fakes {
        reputation: Arc::new(FakeReputation {
            risk: 5.0,
            ..FakeReputation::default()
        }),
        whois: Arc::new(FakeDomainAge {
            risk: 0.05,
            ..FakeDomainAge::default()
        }),
        certificate: Arc::new(FakeCertificate {
            risk: 5.0,
            ..FakeCertificate::default()
        }),
        ai: Arc::new(FakeContent {
            risk: 5.0,
            ..FakeContent::default()
        }),
    }
}

fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        service_timeout: Duration::from_millis(500),
        total_timeout: Duration::from_secs(5),
        service_retries: 0,
        minimum_required_services: 2,
        parallel_execution: true,
        caching_enabled: false,
        tls_port: 443,
        validation: ValidationOptions::default(),
    }
}

fn orchestrator_with(fakes: &Fakes, config: OrchestratorConfig) -> AnalysisOrchestrator {
    AnalysisOrchestrator::new(
        ScoreCalculator::with_defaults(),
        Arc::new(SignalCache::disabled()),
        config,
    )
    .with_reputation(fakes.reputation.clone())
    .with_domain_age(fakes.whois.clone())
    .with_certificate(fakes.certificate.clone())
    .with_content_analysis(fakes.ai.clone())
}

#[tokio::test]
async fn test_benign_url_scores_low_risk_with_full_metrics() {
    let fakes = benign_fakes();
    let orchestrator = orchestrator_with(&fakes, test_config());

    let result = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;

    assert_eq!(result.state, AnalysisState::Done);
    assert!(result.degraded.is_none());
    assert_eq!(result.orchestration_metrics.services_executed, 4);
    assert_eq!(result.orchestration_metrics.services_succeeded, 4);
    assert_eq!(result.orchestration_metrics.services_failed, 0);
    assert!(result.orchestration_metrics.parallel_execution);
    assert_eq!(result.service_results.len(), 4);
    assert!(result.service_results.values().all(|o| o.success));

    assert_eq!(result.scoring.risk_level, RiskLevel::Low);
    assert!(
        result.scoring.final_score > 80.0,
        "benign signals should land well into the safe band, got {}",
        result.scoring.final_score
    );
    assert!(!result.scoring.is_fallback());
}

#[tokio::test]
async fn test_malicious_signals_score_high_risk() {
    let fakes = Fakes {
        reputation: Arc::new(FakeReputation {
            risk: 92.0,
            ..FakeReputation::default()
        }),
        whois: Arc::new(FakeDomainAge {
            risk: 0.95,
            ..FakeDomainAge::default()
        }),
        certificate: Arc::new(FakeCertificate {
            risk: 90.0,
            ..FakeCertificate::default()
        }),
        ai: Arc::new(FakeContent {
            risk: 95.0,
            ..FakeContent::default()
        }),
    };
    let orchestrator = orchestrator_with(&fakes, test_config());

    let result = orchestrator
        .analyze_url("https://definitely-a-scam.example", &AnalyzeOptions::default())
        .await;

    assert_eq!(result.scoring.risk_level, RiskLevel::High);
    assert!(
        result.scoring.final_score < 34.0,
        "safety score should fall below the caution threshold, got {}",
        result.scoring.final_score
    );
}

#[tokio::test]
async fn test_single_provider_failure_is_isolated() {
    let fakes = Fakes {
        certificate: Arc::new(FakeCertificate {
            behavior: FakeBehavior::failing(SignalError::Network("connection reset".into())),
            ..FakeCertificate::default()
        }),
        ..benign_fakes()
    };
    let orchestrator = orchestrator_with(&fakes, test_config());

    let result = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;

    assert_eq!(result.orchestration_metrics.services_failed, 1);
    assert_eq!(result.orchestration_metrics.services_succeeded, 3);
    assert!(result.degraded.is_none());

    let ssl = result.service(RiskFactorType::SslCertificate).unwrap();
    assert!(!ssl.success);
    assert!(ssl.error.as_deref().unwrap().contains("connection reset"));

    // The verdict is computed from the three surviving signals.
    assert!(!result.scoring.is_fallback());
    assert_eq!(result.scoring.risk_level, RiskLevel::Low);
    assert!(result
        .scoring
        .metadata
        .missing_factors
        .contains(&RiskFactorType::SslCertificate));
}

#[tokio::test]
async fn test_min_services_shortfall_returns_fallback() {
    let fail = || FakeBehavior::failing(SignalError::Unavailable("down".into()));
    let fakes = Fakes {
        reputation: Arc::new(FakeReputation {
            risk: 5.0,
            ..FakeReputation::default()
        }),
        whois: Arc::new(FakeDomainAge {
            behavior: fail(),
            ..FakeDomainAge::default()
        }),
        certificate: Arc::new(FakeCertificate {
            behavior: fail(),
            ..FakeCertificate::default()
        }),
        ai: Arc::new(FakeContent {
            behavior: fail(),
            ..FakeContent::default()
        }),
    };
    let orchestrator = orchestrator_with(&fakes, test_config());

    let result = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;

    assert_eq!(result.state, AnalysisState::Done);
    let degraded = result.degraded.as_ref().unwrap();
    assert_eq!(degraded.reason, DegradationReason::InsufficientData);
    assert_eq!(result.orchestration_metrics.services_succeeded, 1);
    assert_eq!(result.orchestration_metrics.services_failed, 3);

    assert!(result.scoring.is_fallback());
    assert_eq!(result.scoring.final_score, 50.0);
    assert_eq!(result.scoring.risk_level, RiskLevel::Medium);
    assert_eq!(result.scoring.confidence, MINIMUM_CONFIDENCE);
    assert_eq!(
        orchestrator
            .analysis_stats()
            .get_degradation_count(DegradationReason::InsufficientData),
        1
    );
}

#[tokio::test]
async fn test_invalid_url_skips_providers_entirely() {
    let fakes = benign_fakes();
    let orchestrator = orchestrator_with(&fakes, test_config());

    let result = orchestrator
        .analyze_url("javascript:alert(1)", &AnalyzeOptions::default())
        .await;

    assert_eq!(result.state, AnalysisState::Failed);
    let degraded = result.degraded.as_ref().unwrap();
    assert_eq!(degraded.reason, DegradationReason::InvalidUrl);
    assert!(degraded.detail.contains("scheme"));

    assert_eq!(result.orchestration_metrics.services_executed, 0);
    assert_eq!(result.orchestration_metrics.services_succeeded, 0);
    assert_eq!(result.orchestration_metrics.services_failed, 4);
    assert!(result.service_results.is_empty());
    assert!(result.scoring.is_fallback());

    assert_eq!(fakes.reputation.behavior.calls(), 0);
    assert_eq!(fakes.whois.behavior.calls(), 0);
    assert_eq!(fakes.certificate.behavior.calls(), 0);
    assert_eq!(fakes.ai.behavior.calls(), 0);
    assert_eq!(
        orchestrator
            .analysis_stats()
            .get_degradation_count(DegradationReason::InvalidUrl),
        1
    );
}

#[tokio::test]
async fn test_force_refresh_reaches_every_provider() {
    let fakes = benign_fakes();
    let orchestrator = orchestrator_with(&fakes, test_config());

    let options = AnalyzeOptions {
        force_refresh: true,
        ..AnalyzeOptions::default()
    };
    orchestrator.analyze_url("https://example.com", &options).await;

    assert_eq!(fakes.reputation.behavior.refreshes(), 1);
    assert_eq!(fakes.whois.behavior.refreshes(), 1);
    assert_eq!(fakes.certificate.behavior.refreshes(), 1);
    assert_eq!(fakes.ai.behavior.refreshes(), 1);
}

#[tokio::test]
async fn test_sequential_mode_invokes_all_providers() {
    let fakes = benign_fakes();
    let config = OrchestratorConfig {
        parallel_execution: false,
        ..test_config()
    };
    let orchestrator = orchestrator_with(&fakes, config);

    let result = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;

    assert!(!result.orchestration_metrics.parallel_execution);
    assert_eq!(result.orchestration_metrics.services_succeeded, 4);
    assert_eq!(fakes.reputation.behavior.calls(), 1);
    assert_eq!(fakes.ai.behavior.calls(), 1);
}

#[tokio::test]
async fn test_per_service_timeout_becomes_structured_failure() {
    let fakes = Fakes {
        whois: Arc::new(FakeDomainAge {
            behavior: FakeBehavior::slow(Duration::from_millis(300)),
            ..FakeDomainAge::default()
        }),
        ..benign_fakes()
    };
    let config = OrchestratorConfig {
        service_timeout: Duration::from_millis(50),
        ..test_config()
    };
    let orchestrator = orchestrator_with(&fakes, config);

    let result = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;

    let whois = result.service(RiskFactorType::DomainAge).unwrap();
    assert!(!whois.success);
    assert!(whois.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(result.orchestration_metrics.services_succeeded, 3);
    assert!(result.degraded.is_none());
    assert_eq!(
        orchestrator
            .analysis_stats()
            .get_signal_error_count(SignalErrorKind::Timeout),
        1
    );
}

#[tokio::test]
async fn test_transient_failure_is_retried_to_success() {
    let fakes = Fakes {
        reputation: Arc::new(FakeReputation {
            behavior: FakeBehavior {
                transient_failures: 1,
                ..FakeBehavior::default()
            },
            risk: 5.0,
        }),
        ..benign_fakes()
    };
    let config = OrchestratorConfig {
        service_retries: 1,
        ..test_config()
    };
    let orchestrator = orchestrator_with(&fakes, config);

    let result = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;

    let reputation = result.service(RiskFactorType::Reputation).unwrap();
    assert!(reputation.success);
    assert_eq!(reputation.retries, 1);
    assert_eq!(fakes.reputation.behavior.calls(), 2);
    assert_eq!(result.orchestration_metrics.services_succeeded, 4);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let fakes = Fakes {
        ai: Arc::new(FakeContent {
            behavior: FakeBehavior::failing(SignalError::Auth("bad key".into())),
            ..FakeContent::default()
        }),
        ..benign_fakes()
    };
    let config = OrchestratorConfig {
        service_retries: 2,
        ..test_config()
    };
    let orchestrator = orchestrator_with(&fakes, config);

    let result = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;

    assert_eq!(fakes.ai.behavior.calls(), 1);
    let ai = result.service(RiskFactorType::AiAnalysis).unwrap();
    assert!(!ai.success);
    assert_eq!(ai.retries, 0);
}

#[tokio::test]
async fn test_total_timeout_returns_fallback() {
    let slow = || FakeBehavior::slow(Duration::from_millis(300));
    let fakes = Fakes {
        reputation: Arc::new(FakeReputation {
            behavior: slow(),
            risk: 5.0,
        }),
        whois: Arc::new(FakeDomainAge {
            behavior: slow(),
            risk: 0.05,
            ..FakeDomainAge::default()
        }),
        certificate: Arc::new(FakeCertificate {
            behavior: slow(),
            risk: 5.0,
            ..FakeCertificate::default()
        }),
        ai: Arc::new(FakeContent {
            behavior: slow(),
            risk: 5.0,
        }),
    };
    let config = OrchestratorConfig {
        total_timeout: Duration::from_millis(50),
        ..test_config()
    };
    let orchestrator = orchestrator_with(&fakes, config);

    let result = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;

    assert_eq!(result.state, AnalysisState::Done);
    let degraded = result.degraded.as_ref().unwrap();
    assert_eq!(degraded.reason, DegradationReason::TotalTimeout);
    assert!(degraded.detail.contains("total budget"));
    assert_eq!(result.orchestration_metrics.services_executed, 0);
    assert_eq!(result.orchestration_metrics.services_failed, 4);
    assert!(result.scoring.is_fallback());
    assert_eq!(
        orchestrator
            .analysis_stats()
            .get_degradation_count(DegradationReason::TotalTimeout),
        1
    );
}

#[tokio::test]
async fn test_certificate_probe_port_selection() {
    let fakes = benign_fakes();
    let orchestrator = orchestrator_with(&fakes, test_config());

    // Explicit non-default HTTPS port wins.
    orchestrator
        .analyze_url("https://example.com:8443/login", &AnalyzeOptions::default())
        .await;
    assert_eq!(
        fakes.certificate.last_port.load(AtomicOrdering::SeqCst),
        8443
    );

    // A plain-http URL still probes TLS on the configured port.
    orchestrator
        .analyze_url("http://example.com/login", &AnalyzeOptions::default())
        .await;
    assert_eq!(fakes.certificate.last_port.load(AtomicOrdering::SeqCst), 443);
}

#[tokio::test]
async fn test_domain_age_receives_registrable_domain() {
    let fakes = benign_fakes();
    let orchestrator = orchestrator_with(&fakes, test_config());

    orchestrator
        .analyze_url(
            "https://app.login.example.co.uk/signin",
            &AnalyzeOptions::default(),
        )
        .await;

    let seen = fakes
        .whois
        .last_domain
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    assert_eq!(seen.as_deref(), Some("example.co.uk"));
}

#[tokio::test]
async fn test_statistics_aggregate_over_history() {
    let fakes = Fakes {
        certificate: Arc::new(FakeCertificate {
            behavior: FakeBehavior::failing(SignalError::Unavailable("down".into())),
            ..FakeCertificate::default()
        }),
        ..benign_fakes()
    };
    let orchestrator = orchestrator_with(&fakes, test_config());

    orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;
    orchestrator
        .analyze_url("https://example.org", &AnalyzeOptions::default())
        .await;

    let stats = orchestrator.statistics();
    assert_eq!(stats.total_analyses, 2);
    assert_eq!(stats.degraded_analyses, 0);
    assert!((stats.average_success_rate - 0.75).abs() < 1e-9);
    assert_eq!(
        stats.service_availability[&RiskFactorType::Reputation],
        1.0
    );
    assert_eq!(
        stats.service_availability[&RiskFactorType::SslCertificate],
        0.0
    );
    assert_eq!(stats.recent_analyses.len(), 2);
    assert_eq!(stats.recent_analyses[1].url, "https://example.org/");

    orchestrator.clear_history();
    let cleared = orchestrator.statistics();
    assert_eq!(cleared.total_analyses, 0);
    assert_eq!(cleared.average_processing_time_ms, 0.0);
    assert!(cleared.recent_analyses.is_empty());
}

#[tokio::test]
async fn test_history_is_bounded() {
    let fakes = benign_fakes();
    let orchestrator = orchestrator_with(&fakes, test_config());

    for i in 0..(ORCHESTRATION_HISTORY_CAP + 5) {
        orchestrator
            .analyze_url(&format!("https://example.com/{i}"), &AnalyzeOptions::default())
            .await;
    }

    let stats = orchestrator.statistics();
    assert_eq!(stats.total_analyses, ORCHESTRATION_HISTORY_CAP);
    assert_eq!(stats.recent_analyses.len(), RECENT_ANALYSES_REPORTED);
    // Oldest entries were evicted; the newest survives.
    let last = stats.recent_analyses.last().unwrap();
    assert_eq!(
        last.url,
        format!("https://example.com/{}", ORCHESTRATION_HISTORY_CAP + 4)
    );
}

#[tokio::test]
async fn test_update_configuration_applies_and_rejects_atomically() {
    let fail = || FakeBehavior::failing(SignalError::Unavailable("down".into()));
    let fakes = Fakes {
        reputation: Arc::new(FakeReputation {
            risk: 5.0,
            ..FakeReputation::default()
        }),
        whois: Arc::new(FakeDomainAge {
            behavior: fail(),
            ..FakeDomainAge::default()
        }),
        certificate: Arc::new(FakeCertificate {
            behavior: fail(),
            ..FakeCertificate::default()
        }),
        ai: Arc::new(FakeContent {
            behavior: fail(),
            ..FakeContent::default()
        }),
    };
    let mut orchestrator = orchestrator_with(&fakes, test_config());

    // One success out of four is below the default minimum of two.
    let before = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;
    assert!(before.is_degraded());

    orchestrator
        .update_configuration(&OrchestratorConfigPatch {
            minimum_required_services: Some(1),
            ..OrchestratorConfigPatch::default()
        })
        .unwrap();
    let after = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;
    assert!(!after.is_degraded());
    assert!(!after.scoring.is_fallback());

    // A rejected scoring patch must leave orchestration settings alone.
    let mut bad_weights = std::collections::BTreeMap::new();
    bad_weights.insert(RiskFactorType::Reputation, 0.9);
    bad_weights.insert(RiskFactorType::DomainAge, 0.9);
    let rejected = orchestrator.update_configuration(&OrchestratorConfigPatch {
        minimum_required_services: Some(4),
        scoring: Some(ScoringConfigPatch {
            weights: Some(bad_weights),
            ..ScoringConfigPatch::default()
        }),
        ..OrchestratorConfigPatch::default()
    });
    assert!(rejected.is_err());

    let still_scoring = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;
    assert!(!still_scoring.is_degraded(), "minimum must still be 1");
}

#[tokio::test]
async fn test_unregistered_provider_is_not_counted_as_executed() {
    let fakes = benign_fakes();
    // No AI provider registered, mirroring a run without an API key.
    let orchestrator = AnalysisOrchestrator::new(
        ScoreCalculator::with_defaults(),
        Arc::new(SignalCache::disabled()),
        test_config(),
    )
    .with_reputation(fakes.reputation.clone())
    .with_domain_age(fakes.whois.clone())
    .with_certificate(fakes.certificate.clone());

    let result = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;

    assert_eq!(result.orchestration_metrics.services_executed, 3);
    assert_eq!(result.orchestration_metrics.services_succeeded, 3);
    assert!(result.service(RiskFactorType::AiAnalysis).is_none());
    assert!(result
        .scoring
        .metadata
        .missing_factors
        .contains(&RiskFactorType::AiAnalysis));
    assert!(!result.scoring.is_fallback());
}

#[tokio::test]
async fn test_result_serialization_shape() {
    let fakes = Fakes {
        certificate: Arc::new(FakeCertificate {
            behavior: FakeBehavior::failing(SignalError::Network("reset".into())),
            ..FakeCertificate::default()
        }),
        ..benign_fakes()
    };
    let orchestrator = orchestrator_with(&fakes, test_config());

    let result = orchestrator
        .analyze_url("https://example.com", &AnalyzeOptions::default())
        .await;
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["state"], "done");
    assert!(json.get("degraded").is_none(), "absent when not degraded");
    assert_eq!(json["service_results"]["reputation"]["success"], true);
    assert_eq!(json["service_results"]["ssl_certificate"]["success"], false);
    assert!(json["service_results"]["ssl_certificate"]["error"]
        .as_str()
        .unwrap()
        .contains("reset"));
    assert!(json["orchestration_metrics"]["total_processing_time_ms"].is_u64());
    assert!(json["scoring"]["final_score"].is_number());
}

#[tokio::test]
async fn test_clear_cache_drops_provider_entries() {
    let cache = Arc::new(SignalCache::in_memory());
    cache
        .set(RiskFactorType::Reputation, "https://example.com/", &1u32, None)
        .await;
    cache
        .set(RiskFactorType::SslCertificate, "example.com:443", &2u32, None)
        .await;

    let orchestrator = AnalysisOrchestrator::new(
        ScoreCalculator::with_defaults(),
        cache.clone(),
        test_config(),
    );
    assert_eq!(cache.len().await, 2);
    orchestrator.clear_cache().await;
    assert_eq!(cache.len().await, 0);
}
