//! Domain extraction and normalization utilities.
//!
//! This module splits URL hosts into registrable domain and subdomain
//! using the Public Suffix List (PSL), handling both simple TLDs
//! (e.g., "example.com") and multi-part TLDs (e.g., "example.co.uk").

use anyhow::{Context, Result};
use psl::Psl;
use url::Url;

/// Registrable-domain split of a host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainParts {
    /// Registrable domain ("example.co.uk"), when the host carries a
    /// recognized public suffix.
    pub domain: Option<String>,
    /// Labels left of the registrable domain ("app.login"), when
    /// present.
    pub subdomain: Option<String>,
}

/// Splits a URL's host into registrable domain and subdomain.
///
/// Never fails: IP hosts, bare suffixes, and unparseable inputs yield
/// empty parts.
pub fn extract_parts(list: &psl::List, url: &str) -> DomainParts {
    let Ok(parsed) = Url::parse(url) else {
        return DomainParts::default();
    };
    let Some(host) = parsed.host_str() else {
        return DomainParts::default();
    };
    if matches!(
        parsed.host(),
        Some(url::Host::Ipv4(_)) | Some(url::Host::Ipv6(_))
    ) {
        return DomainParts::default();
    }

    let host = host.trim_end_matches('.');
    let Some(domain) = list.domain(host.as_bytes()) else {
        return DomainParts::default();
    };
    let Ok(domain) = std::str::from_utf8(domain.as_bytes()) else {
        return DomainParts::default();
    };

    let subdomain = host
        .strip_suffix(domain)
        .and_then(|rest| rest.strip_suffix('.'))
        .filter(|rest| !rest.is_empty())
        .map(str::to_string);
    DomainParts {
        domain: Some(domain.to_string()),
        subdomain,
    }
}

/// Extracts the registrable domain from a URL.
///
/// # Arguments
///
/// * `list` - The public suffix list
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// The registrable domain (e.g., "example.com" from
/// "https://www.example.com/path").
///
/// # Errors
///
/// Returns an error if the URL cannot be parsed, if the URL is an IP
/// address, or if the host has no registrable domain.
pub fn extract_domain(list: &psl::List, url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("Failed to parse URL: {}", url))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("URL '{}' has no host component", url))?;

    // IP addresses do not have registrable domains
    if matches!(
        parsed.host(),
        Some(url::Host::Ipv4(_)) | Some(url::Host::Ipv6(_))
    ) {
        return Err(anyhow::anyhow!(
            "IP addresses do not have registrable domains: {}",
            host
        ));
    }

    let host = host.trim_end_matches('.');
    let domain = list.domain(host.as_bytes()).ok_or_else(|| {
        anyhow::anyhow!("No registrable domain found in URL: {}", url)
    })?;
    let domain = std::str::from_utf8(domain.as_bytes())
        .with_context(|| format!("Registrable domain of '{}' is not valid UTF-8", host))?;
    Ok(domain.to_string())
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
