//! Configuration constants.
//!
//! This module defines all configuration constants used throughout the
//! engine: timeouts, cache sizing, confidence tuning, and scoring bounds.
//! Values here are defaults; the orchestrator and scoring configuration
//! accept overrides at construction or update time.

use std::time::Duration;

// Orchestration timeouts
/// Per-provider timeout in seconds.
/// Each signal provider gets this long before its result is converted into
/// a structured timeout failure. Generous enough for a slow WHOIS server,
/// short enough that one dead source cannot stall an analysis.
pub const SERVICE_TIMEOUT_SECS: u64 = 10;
/// Total-analysis timeout in seconds, wrapping the whole fetch+score phase.
/// Exceeding it produces the fallback result, never an error.
pub const TOTAL_TIMEOUT_SECS: u64 = 30;
/// Retry attempts per provider call on transient failure (0 disables).
pub const SERVICE_RETRIES: u32 = 1;
/// Minimum providers that must succeed before scoring from partial data.
/// Below this the orchestrator returns the fallback result instead of
/// scoring noise.
pub const MINIMUM_REQUIRED_SERVICES: usize = 2;
/// Default HTTPS port probed by the certificate provider.
pub const DEFAULT_TLS_PORT: u16 = 443;

// Retry strategy
/// Initial delay in milliseconds before the first retry.
pub const RETRY_INITIAL_DELAY_MS: u64 = 250;
/// Factor by which the retry delay is multiplied on each attempt.
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 5;

// Network operation timeouts
/// TCP connection timeout for direct socket work (WHOIS, TLS probe).
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// TLS handshake timeout.
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// WHOIS query read timeout. Some registries are slow to flush.
pub const WHOIS_READ_TIMEOUT: Duration = Duration::from_secs(8);
/// DNS resolution timeout for the domain-existence fallback.
pub const DNS_TIMEOUT: Duration = Duration::from_secs(3);
/// HTTP timeout for the threat-feed lookup. Kept short: the heuristic
/// verdict stands on its own when the feed is slow.
pub const THREAT_FEED_TIMEOUT: Duration = Duration::from_secs(3);
/// HTTP timeout for fetching page content for AI analysis.
pub const PAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// HTTP timeout for the AI completion call. Model latency dominates the
/// whole analysis when this fires.
pub const AI_REQUEST_TIMEOUT: Duration = Duration::from_secs(25);

// Input limits
/// Maximum accepted URL length in characters. Longer inputs are rejected
/// before any signal fetch is attempted.
pub const MAX_URL_LENGTH: usize = 2048;
/// Maximum page body size fetched for AI analysis (512 KiB).
pub const MAX_PAGE_BODY_SIZE: usize = 512 * 1024;
/// Maximum extracted page text forwarded to the AI model in characters.
pub const MAX_PAGE_TEXT_CHARS: usize = 4000;
/// Maximum tokens requested from the AI model for the verdict object.
pub const AI_MAX_TOKENS: u32 = 500;

// Cache sizing
/// Maximum approximate memory held by the in-memory cache store (50 MiB).
pub const CACHE_MAX_BYTES: usize = 50 * 1024 * 1024;
/// Fill fraction at which the in-memory store starts evicting LRU entries.
pub const CACHE_EVICTION_THRESHOLD: f64 = 0.8;

// Cache TTLs per factor
/// Reputation verdicts age quickly; blocklists churn hourly.
pub const REPUTATION_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
/// Registration data changes rarely; a day of staleness is harmless.
pub const DOMAIN_AGE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Certificates rotate on the order of weeks; six hours is conservative.
pub const SSL_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
/// AI verdicts follow page content, which can change under an attacker's
/// control; kept as short as reputation.
pub const AI_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

// Scoring bounds
/// Lower bound for an individual factor weight.
pub const MIN_WEIGHT: f64 = 0.0;
/// Upper bound for an individual factor weight.
pub const MAX_WEIGHT: f64 = 1.0;
/// Allowed deviation of the weight sum from 1.0.
pub const TOTAL_WEIGHT_TOLERANCE: f64 = 0.01;
/// Minimum gap between adjacent classification thresholds. Narrower gaps
/// only produce a warning; they make classification flap near boundaries.
pub const MIN_THRESHOLD_SEPARATION: f64 = 10.0;
/// A single weight above this draws a validation warning (may bias scoring).
pub const WEIGHT_BIAS_WARNING: f64 = 0.6;
/// A single weight below this draws a validation warning (factor may be
/// effectively ignored).
pub const WEIGHT_IGNORED_WARNING: f64 = 0.05;
/// Score reported when no factor is available. Mid-scale: unknown, not safe.
pub const FALLBACK_SCORE: f64 = 50.0;

// Confidence tuning
/// Default penalty per missing factor (before the progressive multiplier).
pub const MISSING_FACTOR_PENALTY: f64 = 0.1;
/// Default floor for overall confidence.
pub const MINIMUM_CONFIDENCE: f64 = 0.2;
/// Floor for any single factor's derived confidence. A noisy signal is
/// still a signal.
pub const FACTOR_CONFIDENCE_FLOOR: f64 = 0.1;
/// Confidence penalty per error recorded while producing a signal.
pub const ERROR_CONFIDENCE_PENALTY: f64 = 0.05;
/// Cap on the total error-count confidence penalty.
pub const ERROR_CONFIDENCE_PENALTY_CAP: f64 = 0.3;

// History caps
/// Applied scoring configurations retained for audit.
pub const CONFIG_HISTORY_CAP: usize = 10;
/// Scoring results retained for statistics.
pub const SCORING_HISTORY_CAP: usize = 100;
/// Orchestration outcomes retained for statistics.
pub const ORCHESTRATION_HISTORY_CAP: usize = 100;
/// Recent analyses included in a statistics report.
pub const RECENT_ANALYSES_REPORTED: usize = 10;

/// Default User-Agent for outbound HTTP requests (threat feed, page fetch).
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
