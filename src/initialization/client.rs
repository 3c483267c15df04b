//! HTTP client initialization.

use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::DEFAULT_USER_AGENT;
use crate::error_handling::InitializationError;

/// Initializes the shared HTTP client.
///
/// One client serves the reputation feed lookup, the AI endpoint, and
/// the page fetch; `reqwest::Client` is internally reference-counted,
/// so providers each hold a cheap clone. Configured with:
/// - A browser-like User-Agent (several scam pages cloak against
///   obvious bot agents)
/// - The given request timeout
/// - Redirect following (default policy, up to 10 hops)
/// - Rustls TLS backend
///
/// # Arguments
///
/// * `timeout` - Per-request timeout
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if client creation
/// fails.
pub fn init_client(timeout: Duration) -> Result<reqwest::Client, InitializationError> {
    let client = ClientBuilder::new()
        .timeout(timeout)
        .user_agent(DEFAULT_USER_AGENT)
        .gzip(true)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_client_succeeds() {
        assert!(init_client(Duration::from_secs(10)).is_ok());
    }
}
