//! Analysis statistics tracking.
//!
//! This module provides thread-safe statistics tracking for signal failures
//! and degraded analyses across a run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::{DegradationReason, SignalErrorKind};

/// Thread-safe analysis statistics tracker.
///
/// Tracks signal failures by kind and degraded analyses by reason using
/// atomic counters, allowing concurrent access from multiple tasks. All
/// counters are initialized to zero on creation.
///
/// # Thread Safety
///
/// This struct is thread-safe and can be shared across tasks using `Arc`.
pub struct AnalysisStats {
    signal_errors: HashMap<SignalErrorKind, AtomicUsize>,
    degradations: HashMap<DegradationReason, AtomicUsize>,
}

impl AnalysisStats {
    pub fn new() -> Self {
        let mut signal_errors = HashMap::new();
        for kind in SignalErrorKind::iter() {
            signal_errors.insert(kind, AtomicUsize::new(0));
        }

        let mut degradations = HashMap::new();
        for reason in DegradationReason::iter() {
            degradations.insert(reason, AtomicUsize::new(0));
        }

        AnalysisStats {
            signal_errors,
            degradations,
        }
    }

    /// Increment the counter for a signal error kind.
    ///
    /// All kinds are initialized in the constructor; a missing entry is a
    /// construction bug and is logged rather than panicking.
    pub fn increment_signal_error(&self, kind: SignalErrorKind) {
        if let Some(counter) = self.signal_errors.get(&kind) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment signal error counter for {:?} which is not in the map.",
                kind
            );
        }
    }

    /// Increment the counter for a degradation reason.
    pub fn increment_degradation(&self, reason: DegradationReason) {
        if let Some(counter) = self.degradations.get(&reason) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment degradation counter for {:?} which is not in the map.",
                reason
            );
        }
    }

    /// Get the count for a signal error kind.
    pub fn get_signal_error_count(&self, kind: SignalErrorKind) -> usize {
        self.signal_errors
            .get(&kind)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Get the count for a degradation reason.
    pub fn get_degradation_count(&self, reason: DegradationReason) -> usize {
        self.degradations
            .get(&reason)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Total signal failures across all kinds.
    pub fn total_signal_errors(&self) -> usize {
        SignalErrorKind::iter()
            .map(|k| self.get_signal_error_count(k))
            .sum()
    }

    /// Total degraded analyses across all reasons.
    pub fn total_degradations(&self) -> usize {
        DegradationReason::iter()
            .map(|r| self.get_degradation_count(r))
            .sum()
    }

    /// Logs a summary of non-zero counters at the end of a run.
    pub fn log_summary(&self) {
        let total_errors = self.total_signal_errors();
        if total_errors > 0 {
            log::info!("Signal failures ({} total):", total_errors);
            for kind in SignalErrorKind::iter() {
                let count = self.get_signal_error_count(kind);
                if count > 0 {
                    log::info!("   {}: {}", kind.as_str(), count);
                }
            }
        }

        let total_degraded = self.total_degradations();
        if total_degraded > 0 {
            log::info!("Degraded analyses ({} total):", total_degraded);
            for reason in DegradationReason::iter() {
                let count = self.get_degradation_count(reason);
                if count > 0 {
                    log::info!("   {}: {}", reason.as_str(), count);
                }
            }
        }
    }
}

impl Default for AnalysisStats {
    fn default() -> Self {
        Self::new()
    }
}
