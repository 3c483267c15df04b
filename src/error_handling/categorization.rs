//! Error categorization and retry strategy.
//!
//! This module maps transport-level errors into the signal error taxonomy
//! and configures the retry backoff used for transient failures.

use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};

use super::types::SignalError;

/// Creates an exponential backoff retry strategy.
///
/// Returns a retry strategy configured with:
/// - Initial delay: `RETRY_INITIAL_DELAY_MS` milliseconds
/// - Backoff factor: `RETRY_FACTOR` (doubles delay each retry)
/// - Maximum delay: `RETRY_MAX_DELAY_SECS` seconds
/// - Jitter, so concurrent analyses do not retry in lockstep
///
/// # Arguments
///
/// * `attempts` - Number of retries the iterator yields (0 disables retry)
///
/// # Returns
///
/// A bounded iterator of backoff delays, one per permitted retry.
pub fn get_retry_strategy(attempts: u32) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(crate::config::RETRY_INITIAL_DELAY_MS)
        .factor(crate::config::RETRY_FACTOR)
        .max_delay(Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS))
        .map(jitter)
        .take(attempts as usize)
}

/// Categorizes a `reqwest::Error` into a `SignalError`.
///
/// This is the single mapping used by every HTTP-backed provider so the
/// same transport failure always lands in the same statistics bucket.
///
/// # Arguments
///
/// * `error` - The `reqwest::Error` to categorize
///
/// # Returns
///
/// The appropriate `SignalError` for the error.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> SignalError {
    // Check HTTP status codes first
    if let Some(status) = error.status() {
        match status.as_u16() {
            401 | 403 => return SignalError::Auth(format!("HTTP {}", status.as_u16())),
            429 => return SignalError::RateLimited("HTTP 429".to_string()),
            _ if status.is_server_error() => {
                return SignalError::Unavailable(format!("HTTP {}", status.as_u16()));
            }
            _ if status.is_client_error() => {
                return SignalError::Network(format!("HTTP {}", status.as_u16()));
            }
            _ => {
                // Non-error status wrapped in an error - fall through
            }
        }
    }

    if error.is_timeout() {
        SignalError::Timeout(0)
    } else if error.is_connect() {
        SignalError::Network(format!("connect: {}", error))
    } else if error.is_decode() || error.is_body() {
        SignalError::Parse(error.to_string())
    } else {
        SignalError::Network(error.to_string())
    }
}
