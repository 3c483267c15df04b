//! Shared-resource initialization.
//!
//! This module provides functions to initialize the resources the
//! providers share:
//! - HTTP client (timeouts, user agent)
//! - DNS resolver
//! - Logger
//! - TLS crypto provider
//! - Public Suffix List extractor
//!
//! All fallible initialization returns `InitializationError`.

mod client;
mod logger;
mod resolver;

use std::sync::Arc;

use rustls::crypto::{ring::default_provider, CryptoProvider};

// Re-export public API
pub use client::init_client;
pub use logger::init_logger_with;
pub use resolver::init_resolver;

/// Initializes the Public Suffix List extractor.
///
/// Creates a `psl::List` instance for splitting hostnames into
/// registrable domain and subdomain during URL validation.
///
/// # Returns
///
/// An `Arc<psl::List>` that can be shared across tasks.
pub fn init_extractor() -> Arc<psl::List> {
    Arc::new(psl::List)
}

/// Initializes the process-default crypto provider for TLS operations.
///
/// Must run before the first `rustls` client config is built; with both
/// `aws-lc-rs` and `ring` compiled in, `rustls` refuses to pick one on
/// its own.
pub fn init_crypto_provider() {
    // The return value is ignored because reinstalling the provider is harmless
    let _ = CryptoProvider::install_default(default_provider());
}
