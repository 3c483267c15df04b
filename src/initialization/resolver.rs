//! DNS resolver initialization.

use std::sync::Arc;

use trust_dns_resolver::TokioAsyncResolver;

use crate::error_handling::InitializationError;

/// Initializes the DNS resolver used by the domain-age fallback.
///
/// Uses the default resolver configuration with tightened timeouts so a
/// dead DNS server cannot eat a provider's whole time budget.
///
/// # Returns
///
/// A configured `TokioAsyncResolver` wrapped in `Arc` for sharing
/// across tasks, or an error if initialization fails.
///
/// # Errors
///
/// Returns `InitializationError::DnsResolverError` if the resolver
/// cannot be constructed.
pub fn init_resolver() -> Result<Arc<TokioAsyncResolver>, InitializationError> {
    use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};

    let mut opts = ResolverOpts::default();
    opts.timeout = crate::config::DNS_TIMEOUT;
    opts.attempts = 2; // Reduce retry attempts to fail faster
    // ndots 0 prevents search-domain appending for bare hostnames
    opts.ndots = 0;

    Ok(Arc::new(TokioAsyncResolver::tokio(
        ResolverConfig::default(),
        opts,
    )))
}
