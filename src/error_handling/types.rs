//! Error type definitions.
//!
//! This module defines the error taxonomy used throughout the engine:
//! per-signal failures, URL validation failures, configuration rejection,
//! and initialization failures.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// Error initializing the DNS resolver.
    #[error("DNS resolver initialization error: {0}")]
    DnsResolverError(String),
}

/// A single signal provider's failure.
///
/// Produced at the provider-call boundary and carried inside the
/// `SignalResult` envelope; never propagated past the orchestrator as a
/// language-level error. One provider failing this way must not affect any
/// other provider's result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// Network-level failure (connect, reset, TLS transport).
    #[error("network error: {0}")]
    Network(String),

    /// DNS resolution failed.
    #[error("DNS resolution failed: {0}")]
    Dns(String),

    /// The provider call exceeded its deadline.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// The remote source asked us to back off.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Authentication or authorization was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The response arrived but could not be interpreted.
    #[error("response parsing failed: {0}")]
    Parse(String),

    /// The source answered with a server-side failure or is unreachable.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl SignalError {
    /// Whether retrying this failure could plausibly succeed.
    ///
    /// Auth and parse failures are deterministic; everything else is worth
    /// one more attempt under backoff.
    pub fn is_transient(&self) -> bool {
        !matches!(self, SignalError::Auth(_) | SignalError::Parse(_))
    }

    /// The statistics bucket for this error.
    pub fn kind(&self) -> SignalErrorKind {
        match self {
            SignalError::Network(_) => SignalErrorKind::Network,
            SignalError::Dns(_) => SignalErrorKind::Dns,
            SignalError::Timeout(_) => SignalErrorKind::Timeout,
            SignalError::RateLimited(_) => SignalErrorKind::RateLimited,
            SignalError::Auth(_) => SignalErrorKind::Auth,
            SignalError::Parse(_) => SignalErrorKind::Parse,
            SignalError::Unavailable(_) => SignalErrorKind::Unavailable,
        }
    }
}

/// Statistics bucket for signal failures (one per `SignalError` variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum SignalErrorKind {
    Network,
    Dns,
    Timeout,
    RateLimited,
    Auth,
    Parse,
    Unavailable,
}

impl std::fmt::Display for SignalErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SignalErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalErrorKind::Network => "Network error",
            SignalErrorKind::Dns => "DNS resolution error",
            SignalErrorKind::Timeout => "Timeout",
            SignalErrorKind::RateLimited => "Rate limited",
            SignalErrorKind::Auth => "Authentication error",
            SignalErrorKind::Parse => "Response parse error",
            SignalErrorKind::Unavailable => "Service unavailable",
        }
    }
}

/// URL validation failure.
///
/// Fatal to the request it occurred in: no signals are fetched for a URL
/// that fails validation, and the analysis returns the fallback result with
/// this error attached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The input was empty or whitespace.
    #[error("URL is empty")]
    Empty,

    /// The input exceeds the accepted length.
    #[error("URL exceeds {max} characters")]
    TooLong {
        /// The enforced maximum.
        max: usize,
    },

    /// The input could not be parsed as a URL at all.
    #[error("invalid URL: {0}")]
    Malformed(String),

    /// The scheme is not on the allow-list (`javascript:`, `data:`, ...).
    #[error("scheme `{0}` is not allowed")]
    DisallowedScheme(String),

    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,

    /// The host is a private, loopback, or link-local address.
    #[error("host `{0}` is a private or loopback address")]
    PrivateAddress(String),
}

/// Rejected scoring or orchestration configuration.
///
/// Carries the complete list of violated rules so a caller can fix all of
/// them in one pass. Surfaced synchronously at configuration-change time;
/// an invalid configuration never reaches scoring.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid configuration: {}", violations.join("; "))]
pub struct ConfigurationError {
    /// Every rule the proposed configuration violated.
    pub violations: Vec<String>,
}

/// Why an analysis degraded to the fallback result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationReason {
    /// The URL failed validation; no signals were fetched.
    InvalidUrl,
    /// Fewer providers succeeded than the configured minimum.
    InsufficientData,
    /// The total-analysis timeout fired before fetching finished.
    TotalTimeout,
}

impl std::fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DegradationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationReason::InvalidUrl => "Invalid URL",
            DegradationReason::InsufficientData => "Insufficient data",
            DegradationReason::TotalTimeout => "Total timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_signal_error_transience() {
        assert!(SignalError::Network("reset".into()).is_transient());
        assert!(SignalError::Timeout(5000).is_transient());
        assert!(SignalError::RateLimited("429".into()).is_transient());
        assert!(SignalError::Unavailable("503".into()).is_transient());
        assert!(!SignalError::Auth("bad key".into()).is_transient());
        assert!(!SignalError::Parse("not json".into()).is_transient());
    }

    #[test]
    fn test_signal_error_kind_mapping() {
        assert_eq!(
            SignalError::Timeout(100).kind(),
            SignalErrorKind::Timeout
        );
        assert_eq!(
            SignalError::Parse("x".into()).kind(),
            SignalErrorKind::Parse
        );
    }

    #[test]
    fn test_all_error_kinds_have_string_representation() {
        for kind in SignalErrorKind::iter() {
            assert!(!kind.as_str().is_empty(), "{:?} should have a label", kind);
        }
    }

    #[test]
    fn test_all_degradation_reasons_have_string_representation() {
        for reason in DegradationReason::iter() {
            assert!(
                !reason.as_str().is_empty(),
                "{:?} should have a label",
                reason
            );
        }
    }

    #[test]
    fn test_configuration_error_display_joins_violations() {
        let err = ConfigurationError {
            violations: vec!["weights sum to 1.2".into(), "safe_min <= caution_min".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("weights sum to 1.2"));
        assert!(msg.contains("safe_min <= caution_min"));
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::DisallowedScheme("javascript".into()).to_string(),
            "scheme `javascript` is not allowed"
        );
        assert_eq!(
            ValidationError::TooLong { max: 2048 }.to_string(),
            "URL exceeds 2048 characters"
        );
    }
}
