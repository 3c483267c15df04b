//! url_verdict library: URL risk scoring
//!
//! This library analyzes URLs for risk by querying independent signal
//! providers (reputation, domain age, TLS certificate, AI content
//! analysis) in parallel and combining whatever they return into a
//! single 0-100 safety score with a confidence estimate and a full
//! per-factor breakdown. Providers are consulted under per-service
//! deadlines and any of them may fail without sinking the analysis.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use url_verdict::cache::SignalCache;
//! use url_verdict::initialization::{init_client, init_crypto_provider};
//! use url_verdict::providers::{HeuristicReputationProvider, ReputationProviderConfig};
//! use url_verdict::scoring::ScoreCalculator;
//! use url_verdict::{AnalysisOrchestrator, AnalyzeOptions, OrchestratorConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! init_crypto_provider();
//! let cache = Arc::new(SignalCache::in_memory());
//! let client = init_client(Duration::from_secs(10))?;
//!
//! let orchestrator = AnalysisOrchestrator::new(
//!     ScoreCalculator::with_defaults(),
//!     Arc::clone(&cache),
//!     OrchestratorConfig::default(),
//! )
//! .with_reputation(Arc::new(HeuristicReputationProvider::new(
//!     client,
//!     Arc::clone(&cache),
//!     ReputationProviderConfig::default(),
//! )));
//!
//! let report = orchestrator
//!     .analyze_url("https://example.com", &AnalyzeOptions::default())
//!     .await;
//! println!(
//!     "{} scored {:.1}/100 ({})",
//!     report.scoring.url, report.scoring.final_score, report.scoring.risk_level
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an async
//! context.

#![warn(missing_docs)]

pub mod cache;
pub mod config;
mod domain;
pub mod error_handling;
pub mod initialization;
pub mod orchestrator;
pub mod providers;
pub mod scoring;
pub mod security;
pub mod signal;
mod utils;

// Re-export public API
pub use config::{Cli, LogFormat, LogLevel, OutputFormat};
pub use orchestrator::{
    AnalysisOrchestrator, AnalyzeOptions, OrchestrationResult, OrchestratorConfig,
    OrchestratorConfigPatch,
};
pub use run::{run_analysis, RunReport};
pub use scoring::{ScoreCalculator, ScoringResult};
pub use signal::{RiskFactorType, RiskLevel, SignalResult};

// Internal run module (wires the CLI onto the orchestrator)
mod run {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use anyhow::{Context, Result};
    use colored::Colorize;
    use log::info;

    use crate::cache::SignalCache;
    use crate::config::{Cli, OutputFormat};
    use crate::initialization::{init_client, init_crypto_provider, init_resolver};
    use crate::orchestrator::{
        AnalysisOrchestrator, AnalyzeOptions, OrchestrationResult, OrchestratorConfig,
    };
    use crate::providers::{
        AiAnalysisConfig, CertificateProviderConfig, DomainAgeProviderConfig,
        HeuristicReputationProvider, OpenAiContentProvider, ReputationProviderConfig,
        TlsCertificateProvider, WhoisDomainAgeProvider,
    };
    use crate::scoring::ScoreCalculator;
    use crate::security::ValidationOptions;
    use crate::signal::RiskLevel;

    /// Results of one CLI invocation.
    #[derive(Debug, Clone)]
    pub struct RunReport {
        /// Number of URLs analyzed.
        pub analyzed: usize,
        /// How many came back with a high-risk verdict.
        pub high_risk: usize,
        /// How many degraded to the fallback verdict.
        pub degraded: usize,
        /// Elapsed wall-clock time in seconds.
        pub elapsed_seconds: f64,
    }

    /// Analyzes every URL given on the command line and prints a verdict
    /// for each.
    ///
    /// This is the entry point the binary uses. It wires the bundled
    /// providers onto an [`AnalysisOrchestrator`] according to the CLI
    /// flags, analyzes the URLs in order, and writes one verdict per URL
    /// to stdout in the requested format.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or DNS resolver cannot be
    /// constructed. Per-URL problems never error: the orchestrator
    /// degrades those analyses to a fallback verdict instead.
    pub async fn run_analysis(cli: Cli) -> Result<RunReport> {
        init_crypto_provider();

        let service_timeout = Duration::from_secs(cli.timeout_seconds);
        let client = init_client(service_timeout).context("Failed to initialize HTTP client")?;
        let resolver = init_resolver().context("Failed to initialize DNS resolver")?;

        let cache = Arc::new(if cli.no_cache {
            SignalCache::disabled()
        } else {
            SignalCache::in_memory()
        });

        let config = OrchestratorConfig {
            service_timeout,
            total_timeout: Duration::from_secs(cli.total_timeout_seconds),
            service_retries: cli.retries,
            minimum_required_services: cli.min_services,
            parallel_execution: !cli.sequential,
            caching_enabled: !cli.no_cache,
            tls_port: cli.port,
            validation: ValidationOptions::default(),
        };

        let mut orchestrator =
            AnalysisOrchestrator::new(ScoreCalculator::with_defaults(), Arc::clone(&cache), config)
                .with_reputation(Arc::new(HeuristicReputationProvider::new(
                    client.clone(),
                    Arc::clone(&cache),
                    ReputationProviderConfig::default(),
                )))
                .with_domain_age(Arc::new(WhoisDomainAgeProvider::new(
                    resolver,
                    Arc::clone(&cache),
                    DomainAgeProviderConfig::default(),
                )))
                .with_certificate(Arc::new(TlsCertificateProvider::new(
                    Arc::clone(&cache),
                    CertificateProviderConfig::default(),
                )));

        if cli.no_ai {
            info!("AI content analysis disabled by --no-ai");
        } else if let Some(ai_config) = AiAnalysisConfig::from_env() {
            orchestrator =
                orchestrator.with_content_analysis(Arc::new(OpenAiContentProvider::new(
                    client.clone(),
                    Arc::clone(&cache),
                    ai_config,
                )));
        } else {
            info!("URL_VERDICT_AI_API_KEY not set; running without AI content analysis");
        }

        let options = AnalyzeOptions {
            force_refresh: cli.force_refresh,
            ..AnalyzeOptions::default()
        };

        let start_time = Instant::now();
        let mut high_risk = 0usize;
        let mut degraded = 0usize;

        for url in &cli.urls {
            let result = orchestrator.analyze_url(url, &options).await;

            if result.scoring.risk_level == RiskLevel::High {
                high_risk += 1;
            }
            if result.is_degraded() {
                degraded += 1;
            }

            match cli.output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&result)
                        .context("Failed to serialize analysis result")?
                ),
                OutputFormat::Text => print_verdict(&result),
            }
        }

        orchestrator.analysis_stats().log_summary();

        let cache_stats = cache.stats();
        if cache_stats.hits + cache_stats.misses > 0 {
            info!(
                "Cache: {} hits, {} misses ({:.0}% hit rate)",
                cache_stats.hits,
                cache_stats.misses,
                cache_stats.hit_rate * 100.0
            );
        }

        Ok(RunReport {
            analyzed: cli.urls.len(),
            high_risk,
            degraded,
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        })
    }

    /// Renders one analysis as a colored multi-line summary.
    fn print_verdict(result: &OrchestrationResult) {
        let scoring = &result.scoring;
        let level = match scoring.risk_level {
            RiskLevel::Low => "low risk".green().bold(),
            RiskLevel::Medium => "medium risk".yellow().bold(),
            RiskLevel::High => "high risk".red().bold(),
        };
        println!(
            "{}  {:.1}/100  {}  (confidence {:.2}, {} ms)",
            scoring.url.cyan(),
            scoring.final_score,
            level,
            scoring.confidence,
            result.orchestration_metrics.total_processing_time_ms,
        );

        for factor_score in &scoring.risk_factors {
            let label = format!("{:<16}", factor_score.factor.to_string());
            match result.service(factor_score.factor) {
                Some(outcome) if outcome.success => {
                    let source = if outcome.from_cache { "cached" } else { "fresh " };
                    let risk = match factor_score.raw_score {
                        Some(score) => format!("risk {score:>5.1}"),
                        None => "risk     -".to_string(),
                    };
                    println!(
                        "    {label} {risk}  {source}  {:>5} ms",
                        outcome.processing_time_ms
                    );
                }
                Some(outcome) => {
                    let error = outcome.error.as_deref().unwrap_or("unknown error");
                    println!("    {label} {}: {error}", "failed".red());
                }
                None => println!("    {label} {}", "not configured".dimmed()),
            }
        }

        if let Some(degradation) = &result.degraded {
            println!(
                "    {} ({}): {}",
                "degraded".yellow().bold(),
                degradation.reason,
                degradation.detail
            );
        }
    }
}
