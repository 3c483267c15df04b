//! Error handling and analysis statistics.
//!
//! This module provides:
//! - The error taxonomy (signal, validation, configuration, initialization)
//! - Signal failure and degradation statistics tracking
//! - Retry strategy configuration
//! - Transport error categorization
//!
//! Error types are separated by where they may surface:
//! - **SignalError**: one provider failed; recoverable at orchestration level
//! - **ValidationError**: the URL was rejected; fatal to that request only
//! - **ConfigurationError**: a config change was rejected; surfaced at update time
//! - **InitializationError**: setup failed; surfaced at startup

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{categorize_reqwest_error, get_retry_strategy};
pub use stats::AnalysisStats;
pub use types::{
    ConfigurationError, DegradationReason, InitializationError, SignalError, SignalErrorKind,
    ValidationError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_analysis_stats_initialization() {
        let stats = AnalysisStats::new();
        for kind in SignalErrorKind::iter() {
            assert_eq!(stats.get_signal_error_count(kind), 0);
        }
        for reason in DegradationReason::iter() {
            assert_eq!(stats.get_degradation_count(reason), 0);
        }
    }

    #[test]
    fn test_analysis_stats_increment() {
        let stats = AnalysisStats::new();
        stats.increment_signal_error(SignalErrorKind::Timeout);
        stats.increment_signal_error(SignalErrorKind::Timeout);
        stats.increment_signal_error(SignalErrorKind::Parse);
        assert_eq!(stats.get_signal_error_count(SignalErrorKind::Timeout), 2);
        assert_eq!(stats.get_signal_error_count(SignalErrorKind::Parse), 1);
        assert_eq!(stats.total_signal_errors(), 3);

        stats.increment_degradation(DegradationReason::InsufficientData);
        assert_eq!(
            stats.get_degradation_count(DegradationReason::InsufficientData),
            1
        );
        assert_eq!(stats.total_degradations(), 1);
    }

    #[test]
    fn test_analysis_stats_concurrent_increment() {
        use std::sync::Arc;
        let stats = Arc::new(AnalysisStats::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    stats.increment_signal_error(SignalErrorKind::Network);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.get_signal_error_count(SignalErrorKind::Network), 800);
    }
}
