//! Signal providers.
//!
//! One provider per risk factor, each behind an async trait so the
//! orchestrator and tests can substitute implementations. Every bundled
//! provider follows the same discipline: consult the shared
//! [`SignalCache`](crate::cache::SignalCache) first (unless the caller
//! forces a refresh), fetch from its source on a miss, retry transient
//! failures under backoff, and wrap whatever happened in a
//! [`SignalResult`] envelope. A provider never panics and never returns a
//! bare error; failure is data.

mod ai_analysis;
mod certificate;
mod domain_age;
mod reputation;

pub use ai_analysis::{AiAnalysisConfig, OpenAiContentProvider};
pub use certificate::{CertificateProviderConfig, TlsCertificateProvider};
pub use domain_age::{DomainAgeProviderConfig, WhoisDomainAgeProvider};
pub use reputation::{HeuristicReputationProvider, ReputationProviderConfig};

use async_trait::async_trait;

use crate::security::ValidatedUrl;
use crate::signal::{
    AiAnalysis, CertificateAnalysis, DomainAgeAnalysis, ReputationAnalysis, SignalResult,
};

/// Blocklist and heuristic reputation of a URL and its host.
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    /// Scores the reputation of `url`. `force_refresh` bypasses the cache.
    async fn analyze_url(
        &self,
        url: &ValidatedUrl,
        force_refresh: bool,
    ) -> SignalResult<ReputationAnalysis>;
}

/// Registration age of a registrable domain.
#[async_trait]
pub trait DomainAgeProvider: Send + Sync {
    /// Determines how long ago `domain` was registered. `force_refresh`
    /// bypasses the cache.
    async fn analyze_domain(
        &self,
        domain: &str,
        force_refresh: bool,
    ) -> SignalResult<DomainAgeAnalysis>;
}

/// TLS certificate inspection of a live endpoint.
#[async_trait]
pub trait CertificateProvider: Send + Sync {
    /// Connects to `domain:port` and assesses the presented certificate.
    /// `force_refresh` bypasses the cache.
    async fn analyze_certificate(
        &self,
        domain: &str,
        port: u16,
        force_refresh: bool,
    ) -> SignalResult<CertificateAnalysis>;
}

/// AI content analysis of the page behind a URL.
#[async_trait]
pub trait ContentAnalysisProvider: Send + Sync {
    /// Fetches the page and asks the model for a structured verdict.
    /// `force_refresh` bypasses the cache.
    async fn analyze_url(
        &self,
        url: &ValidatedUrl,
        force_refresh: bool,
    ) -> SignalResult<AiAnalysis>;
}
