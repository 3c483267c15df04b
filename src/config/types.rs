//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument
//! parsing and configuration.

use clap::{Parser, ValueEnum};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to
/// most verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Report output format for the CLI binary.
#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Colored per-URL verdict summary
    Text,
    /// Full `OrchestrationResult` as one JSON document per URL
    Json,
}

/// Command-line options for the `url_verdict` binary.
///
/// Everything here maps onto the library's `OrchestratorConfig` or the
/// logger; the library itself never reads CLI state.
#[derive(Debug, Clone, Parser)]
#[command(name = "url_verdict", about = "Score URLs for risk", version)]
pub struct Cli {
    /// URLs to analyze
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    pub log_format: LogFormat,

    /// Report output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Per-provider timeout in seconds
    #[arg(long, default_value_t = crate::config::SERVICE_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// Total-analysis timeout in seconds
    #[arg(long, default_value_t = crate::config::TOTAL_TIMEOUT_SECS)]
    pub total_timeout_seconds: u64,

    /// Retry attempts per provider on transient failure
    #[arg(long, default_value_t = crate::config::SERVICE_RETRIES)]
    pub retries: u32,

    /// Minimum providers that must succeed before scoring
    #[arg(long, default_value_t = crate::config::MINIMUM_REQUIRED_SERVICES)]
    pub min_services: usize,

    /// TLS port probed by the certificate provider
    #[arg(long, default_value_t = crate::config::DEFAULT_TLS_PORT)]
    pub port: u16,

    /// Query providers one at a time instead of concurrently
    #[arg(long)]
    pub sequential: bool,

    /// Disable signal caching entirely
    #[arg(long)]
    pub no_cache: bool,

    /// Bypass cached signals for this run
    #[arg(long)]
    pub force_refresh: bool,

    /// Disable the AI content-analysis provider even if an API key is set
    #[arg(long)]
    pub no_ai: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_log_level_ordering() {
        // Error < Warn < Info < Debug < Trace
        let error = log::LevelFilter::from(LogLevel::Error);
        let warn = log::LevelFilter::from(LogLevel::Warn);
        let info = log::LevelFilter::from(LogLevel::Info);
        let debug = log::LevelFilter::from(LogLevel::Debug);
        let trace = log::LevelFilter::from(LogLevel::Trace);

        assert!(error < warn);
        assert!(warn < info);
        assert!(info < debug);
        assert!(debug < trace);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["url_verdict", "https://example.com"]);
        assert_eq!(cli.urls, vec!["https://example.com".to_string()]);
        assert_eq!(cli.timeout_seconds, crate::config::SERVICE_TIMEOUT_SECS);
        assert_eq!(
            cli.total_timeout_seconds,
            crate::config::TOTAL_TIMEOUT_SECS
        );
        assert_eq!(cli.min_services, crate::config::MINIMUM_REQUIRED_SERVICES);
        assert!(!cli.sequential);
        assert!(!cli.no_cache);
        assert!(!cli.force_refresh);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "url_verdict",
            "--sequential",
            "--no-cache",
            "--min-services",
            "1",
            "http://a.example",
            "http://b.example",
        ]);
        assert!(cli.sequential);
        assert!(cli.no_cache);
        assert_eq!(cli.min_services, 1);
        assert_eq!(cli.urls.len(), 2);
    }
}
