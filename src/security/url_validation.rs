//! URL validation and SSRF protection.
//!
//! Every analyzed URL passes through here before any signal provider
//! runs. Validation rejects:
//! - Private/internal IP addresses (RFC 1918, RFC 4193, etc.)
//! - Localhost addresses
//! - Non-HTTP/HTTPS schemes (`javascript:`, `data:`, `file://`, ...)
//! - Link-local addresses
//! - Empty and oversized inputs
//!
//! A URL that fails validation is never fetched, resolved, or probed.

use std::net::{Ipv4Addr, Ipv6Addr};

use url::Url;

use crate::config::MAX_URL_LENGTH;
use crate::domain::extract_parts;
use crate::error_handling::ValidationError;

/// Validation policy for one analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Accept private, loopback, and link-local hosts. Off by default;
    /// only useful when analyzing lab targets.
    pub allow_private_addresses: bool,
    /// Retry scheme-less inputs (`example.com`) with an `https://`
    /// prefix.
    pub assume_https: bool,
    /// Maximum accepted input length in characters.
    pub max_length: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            allow_private_addresses: false,
            assume_https: true,
            max_length: MAX_URL_LENGTH,
        }
    }
}

/// A URL that passed validation, with the parts providers consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    /// The normalized form (lowercased host, explicit path).
    pub normalized: String,
    pub scheme: String,
    /// Full host as it appears in the URL.
    pub hostname: String,
    /// Registrable domain (`example.co.uk`), absent for IP hosts and
    /// unrecognized suffixes.
    pub domain: Option<String>,
    /// Labels left of the registrable domain, when present.
    pub subdomain: Option<String>,
    /// Explicit port, or the scheme default.
    pub port: u16,
}

/// Validates and parses one URL.
///
/// # Arguments
///
/// * `raw` - The URL as received from the caller
/// * `options` - Validation policy
/// * `list` - Public suffix list for the domain split
///
/// # Returns
///
/// The validated, normalized URL with its host decomposition.
///
/// # Errors
///
/// Returns the first `ValidationError` encountered, in check order:
/// emptiness, length, parseability, scheme, host presence, host safety.
pub fn validate_url(
    raw: &str,
    options: &ValidationOptions,
    list: &psl::List,
) -> Result<ValidatedUrl, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    if trimmed.len() > options.max_length {
        return Err(ValidationError::TooLong {
            max: options.max_length,
        });
    }

    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) if options.assume_https => {
            Url::parse(&format!("https://{trimmed}"))
                .map_err(|e| ValidationError::Malformed(e.to_string()))?
        }
        Err(e) => return Err(ValidationError::Malformed(e.to_string())),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(ValidationError::DisallowedScheme(scheme.to_string())),
    }

    let host = parsed.host().ok_or(ValidationError::MissingHost)?;
    let mut domain = None;
    let mut subdomain = None;
    match host {
        url::Host::Domain(name) => {
            if !options.allow_private_addresses && is_localhost_domain(name) {
                return Err(ValidationError::PrivateAddress(name.to_string()));
            }
            let parts = extract_parts(list, parsed.as_str());
            domain = parts.domain;
            subdomain = parts.subdomain;
        }
        url::Host::Ipv4(ip) => {
            if !options.allow_private_addresses && is_private_ipv4(ip) {
                return Err(ValidationError::PrivateAddress(ip.to_string()));
            }
        }
        url::Host::Ipv6(ip) => {
            if !options.allow_private_addresses && is_private_ipv6(ip) {
                return Err(ValidationError::PrivateAddress(ip.to_string()));
            }
        }
    }

    let hostname = parsed
        .host_str()
        .ok_or(ValidationError::MissingHost)?
        .to_string();
    let port = parsed.port_or_known_default().unwrap_or(443);

    Ok(ValidatedUrl {
        normalized: parsed.to_string(),
        scheme: parsed.scheme().to_string(),
        hostname,
        domain,
        subdomain,
        port,
    })
}

/// Checks if an IPv4 address is private/internal (RFC 1918).
///
/// Private ranges:
/// - 10.0.0.0/8
/// - 172.16.0.0/12
/// - 192.168.0.0/16
/// - 127.0.0.0/8 (loopback)
/// - 169.254.0.0/16 (link-local)
/// - 0.0.0.0/8 (this network)
/// - 224.0.0.0/4 (multicast)
/// - 240.0.0.0/4 (reserved)
fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();

    // 127.0.0.0/8 (loopback)
    if octets[0] == 127 {
        return true;
    }

    // 10.0.0.0/8
    if octets[0] == 10 {
        return true;
    }

    // 172.16.0.0/12
    if octets[0] == 172 && (octets[1] >= 16 && octets[1] <= 31) {
        return true;
    }

    // 192.168.0.0/16
    if octets[0] == 192 && octets[1] == 168 {
        return true;
    }

    // 169.254.0.0/16 (link-local)
    if octets[0] == 169 && octets[1] == 254 {
        return true;
    }

    // 0.0.0.0/8 (this network)
    if octets[0] == 0 {
        return true;
    }

    // 224.0.0.0/4 (multicast)
    if octets[0] >= 224 && octets[0] <= 239 {
        return true;
    }

    // 240.0.0.0/4 (reserved)
    if octets[0] >= 240 {
        return true;
    }

    false
}

/// Checks if an IPv6 address is private/internal (RFC 4193, RFC 4291).
///
/// Private ranges:
/// - ::1 (loopback)
/// - fc00::/7 (unique local addresses)
/// - fe80::/10 (link-local)
/// - ff00::/8 (multicast)
fn is_private_ipv6(ip: Ipv6Addr) -> bool {
    let segments = ip.segments();

    // ::1 (loopback)
    if segments == [0, 0, 0, 0, 0, 0, 0, 1] {
        return true;
    }

    // fc00::/7 (unique local addresses)
    if (segments[0] & 0xfe00) == 0xfc00 {
        return true;
    }

    // fe80::/10 (link-local)
    if (segments[0] & 0xffc0) == 0xfe80 {
        return true;
    }

    // ff00::/8 (multicast)
    if segments[0] & 0xff00 == 0xff00 {
        return true;
    }

    false
}

/// Checks if a domain name is a localhost variant.
fn is_localhost_domain(domain: &str) -> bool {
    let domain_lower = domain.to_lowercase();
    matches!(
        domain_lower.as_str(),
        "localhost" | "localhost." | "localhost.localdomain" | "localhost.localdomain."
    ) || domain_lower.ends_with(".localhost")
        || domain_lower.ends_with(".localhost.")
}
