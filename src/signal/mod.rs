//! Signal data model.
//!
//! This module defines the closed set of risk factors, the envelope every
//! provider invocation produces, and the payload types each provider
//! returns. All raw signals arrive on their native scales; the
//! [`FactorSignal`] trait normalizes them onto the canonical internal risk
//! scale (0-100, higher = more dangerous) at the ingestion boundary.

mod factors;
mod input;

pub use factors::{
    AiAnalysis, CertificateAnalysis, CertificateSecurity, CertificateType,
    CertificateValidation, DomainAgeAnalysis, EncryptionStrength, FactorSignal,
    ReputationAnalysis,
};
pub use input::{FactorReading, ScoringInput, SignalQuality};

use serde::{Deserialize, Serialize};
use strum_macros::{Display as DisplayMacro, EnumIter as EnumIterMacro};

use crate::error_handling::SignalError;

/// One independent risk indicator.
///
/// A fixed, closed set: every weight table, threshold table, and statistics
/// map in the engine is keyed by it. `Ord` is derived so that `BTreeMap`s
/// keyed by factor iterate in a stable order regardless of insertion order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIterMacro,
    DisplayMacro,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RiskFactorType {
    /// Blocklist and heuristic reputation of the URL and host.
    Reputation,
    /// Age and registration details of the registrable domain.
    DomainAge,
    /// TLS certificate validity and strength.
    SslCertificate,
    /// AI content analysis of the fetched page.
    AiAnalysis,
    /// Structural/technical indicators. Part of the closed set so it can be
    /// weighted in configuration, but no bundled provider feeds it.
    TechnicalIndicators,
}

/// Three-level risk classification on the public safety scale.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    DisplayMacro,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Score at or above the safe threshold.
    Low,
    /// Score between the caution and safe thresholds.
    Medium,
    /// Score below the caution threshold.
    High,
}

/// The envelope produced by every provider invocation.
///
/// Immutable once constructed. Success and failure are a tagged
/// [`Result`], so "no data" can never be confused with "data says zero
/// risk". The envelope also carries the quality metadata the confidence
/// calculation feeds on: timing, cache provenance, and how many retries
/// were burned producing this result.
#[derive(Debug, Clone)]
pub struct SignalResult<T> {
    outcome: Result<T, SignalError>,
    from_cache: bool,
    cache_age_secs: Option<u64>,
    retries: u32,
    processing_time_ms: u64,
}

impl<T> SignalResult<T> {
    /// A fresh successful result.
    pub fn ok(data: T, processing_time_ms: u64) -> Self {
        SignalResult {
            outcome: Ok(data),
            from_cache: false,
            cache_age_secs: None,
            retries: 0,
            processing_time_ms,
        }
    }

    /// A successful result served from cache, with the entry's age.
    pub fn ok_cached(data: T, cache_age_secs: u64, processing_time_ms: u64) -> Self {
        SignalResult {
            outcome: Ok(data),
            from_cache: true,
            cache_age_secs: Some(cache_age_secs),
            retries: 0,
            processing_time_ms,
        }
    }

    /// A structured failure. Providers produce this instead of returning
    /// `Err` at the call boundary.
    pub fn failure(error: SignalError, processing_time_ms: u64) -> Self {
        SignalResult {
            outcome: Err(error),
            from_cache: false,
            cache_age_secs: None,
            retries: 0,
            processing_time_ms,
        }
    }

    /// Records retries burned while producing this result.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Whether the provider produced usable data.
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The payload, if the invocation succeeded.
    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    /// The failure, if the invocation failed.
    pub fn error(&self) -> Option<&SignalError> {
        self.outcome.as_ref().err()
    }

    /// Consumes the envelope, yielding the payload if present.
    pub fn into_data(self) -> Option<T> {
        self.outcome.ok()
    }

    /// Whether this result was served from cache.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Age of the cache entry in seconds, when served from cache.
    pub fn cache_age_secs(&self) -> Option<u64> {
        self.cache_age_secs
    }

    /// Retries burned producing this result.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Wall-clock milliseconds spent producing this result.
    pub fn processing_time_ms(&self) -> u64 {
        self.processing_time_ms
    }

    /// The quality metadata the confidence calculation consumes.
    pub fn quality(&self) -> SignalQuality {
        SignalQuality {
            processing_time_ms: self.processing_time_ms,
            from_cache: self.from_cache,
            cache_age_secs: self.cache_age_secs,
            error_count: self.retries,
        }
    }
}
