//! Domain registration age provider.
//!
//! Queries WHOIS directly over TCP port 43 against a per-TLD server map,
//! extracts the creation date (registries disagree wildly on field names
//! and date formats, so extraction is multi-pattern and parsing is
//! multi-format) and maps registration age onto risk: a domain registered
//! days ago is a classic phishing signature, one registered years ago
//! rarely is. When every WHOIS server fails or hides the date, a DNS
//! lookup establishes existence only: unknown age, mid risk, low
//! confidence.

use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use trust_dns_resolver::TokioAsyncResolver;

use super::DomainAgeProvider;
use crate::cache::SignalCache;
use crate::error_handling::SignalError;
use crate::signal::{DomainAgeAnalysis, RiskFactorType, SignalResult};
use crate::utils::elapsed_ms;

/// Registries tried when the per-TLD server fails or is unknown.
const FALLBACK_WHOIS_SERVERS: &[&str] = &["whois.iana.org", "whois.internic.net"];

/// Field labels under which registries report the creation date.
const CREATION_DATE_PATTERNS: &[&str] = &[
    r"(?i)creation\s*date[:\s]+([^\r\n]+)",
    r"(?i)created[:\s]+([^\r\n]+)",
    r"(?i)registered\s*on[:\s]+([^\r\n]+)",
    r"(?i)registered[:\s]+([^\r\n]+)",
    r"(?i)registration\s*date[:\s]+([^\r\n]+)",
    r"(?i)registration\s*time[:\s]+([^\r\n]+)",
    r"(?i)domain\s*created[:\s]+([^\r\n]+)",
    r"(?i)created\s*on[:\s]+([^\r\n]+)",
    r"(?i)create\s*date[:\s]+([^\r\n]+)",
    r"(?i)domain_date_created[:\s]+([^\r\n]+)",
    // Regional registries answer in their own language.
    r"(?i)fecha\s*de\s*registro[:\s]+([^\r\n]+)",
    r"(?i)date\s*de\s*cr[ée]ation[:\s]+([^\r\n]+)",
    r"(?i)registriert\s*am[:\s]+([^\r\n]+)",
];

static CREATION_DATE_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    CREATION_DATE_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

// A bare colon keeps `Registrar URL:` and `Registrar WHOIS Server:` out.
static REGISTRAR_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*registrar\s*:\s*([^\r\n]+)").ok());

/// Configuration for the domain-age provider.
#[derive(Debug, Clone)]
pub struct DomainAgeProviderConfig {
    /// TCP connect timeout per WHOIS server.
    pub connect_timeout: Duration,
    /// Read timeout for the full WHOIS response.
    pub read_timeout: Duration,
    /// WHOIS port. Only tests point this anywhere but 43.
    pub whois_port: u16,
    /// When set, every query goes to this server instead of the per-TLD
    /// map, and the fallback list is skipped.
    pub server_override: Option<String>,
}

impl Default for DomainAgeProviderConfig {
    fn default() -> Self {
        Self {
            connect_timeout: crate::config::TCP_CONNECT_TIMEOUT,
            read_timeout: crate::config::WHOIS_READ_TIMEOUT,
            whois_port: 43,
            server_override: None,
        }
    }
}

/// The bundled domain-age provider.
pub struct WhoisDomainAgeProvider {
    resolver: Arc<TokioAsyncResolver>,
    cache: Arc<SignalCache>,
    config: DomainAgeProviderConfig,
}

impl WhoisDomainAgeProvider {
    /// Creates a provider over a shared DNS resolver and cache.
    pub fn new(
        resolver: Arc<TokioAsyncResolver>,
        cache: Arc<SignalCache>,
        config: DomainAgeProviderConfig,
    ) -> Self {
        Self {
            resolver,
            cache,
            config,
        }
    }

    async fn assess(&self, domain: &str) -> Result<DomainAgeAnalysis, SignalError> {
        match self.query_whois_chain(domain).await {
            Ok(response) => {
                let registrar = extract_registrar(&response);
                if let Some(created) = extract_creation_date(&response) {
                    let age_days = age_in_days(created, Utc::now());
                    return Ok(DomainAgeAnalysis {
                        age_days: Some(age_days),
                        registration_date: Some(created),
                        registrar,
                        score: age_risk(age_days),
                        confidence: 0.9,
                    });
                }
                log::debug!("WHOIS response for {domain} carries no creation date");
                self.dns_existence_fallback(domain, registrar).await
            }
            Err(e) => {
                log::debug!("WHOIS lookup failed for {domain}: {e}");
                self.dns_existence_fallback(domain, None).await
            }
        }
    }

    /// Queries the per-TLD server, then the fallback registries, returning
    /// the first response that mentions the domain at all.
    async fn query_whois_chain(&self, domain: &str) -> Result<String, SignalError> {
        if let Some(server) = &self.config.server_override {
            return self.query_whois(server, domain).await;
        }

        let mut last_error = SignalError::Unavailable("no WHOIS server answered".to_string());
        let primary = whois_server_for(domain);
        for server in std::iter::once(primary).chain(FALLBACK_WHOIS_SERVERS.iter().copied()) {
            match self.query_whois(server, domain).await {
                Ok(response) if !response.trim().is_empty() => return Ok(response),
                Ok(_) => {
                    last_error =
                        SignalError::Parse(format!("empty WHOIS response from {server}"));
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    /// One raw WHOIS exchange: connect, send `domain\r\n`, read to EOF.
    async fn query_whois(&self, server: &str, domain: &str) -> Result<String, SignalError> {
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect((server, self.config.whois_port)),
        )
        .await
        .map_err(|_| SignalError::Timeout(self.config.connect_timeout.as_millis() as u64))?
        .map_err(|e| SignalError::Network(format!("connect to {server}: {e}")))?;

        let mut stream = stream;
        stream
            .write_all(format!("{domain}\r\n").as_bytes())
            .await
            .map_err(|e| SignalError::Network(format!("query to {server}: {e}")))?;

        let mut raw = Vec::new();
        tokio::time::timeout(self.config.read_timeout, stream.read_to_end(&mut raw))
            .await
            .map_err(|_| SignalError::Timeout(self.config.read_timeout.as_millis() as u64))?
            .map_err(|e| SignalError::Network(format!("read from {server}: {e}")))?;

        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// WHOIS told us nothing; establish the domain resolves and report
    /// unknown age at mid risk.
    async fn dns_existence_fallback(
        &self,
        domain: &str,
        registrar: Option<String>,
    ) -> Result<DomainAgeAnalysis, SignalError> {
        let lookup = tokio::time::timeout(crate::config::DNS_TIMEOUT, self.resolver.lookup_ip(domain))
            .await
            .map_err(|_| {
                SignalError::Timeout(crate::config::DNS_TIMEOUT.as_millis() as u64)
            })?
            .map_err(|e| SignalError::Dns(e.to_string()))?;

        if lookup.iter().next().is_none() {
            return Err(SignalError::Dns(format!("{domain} has no A/AAAA records")));
        }

        Ok(DomainAgeAnalysis {
            age_days: None,
            registration_date: None,
            registrar,
            score: 0.5,
            confidence: 0.3,
        })
    }
}

#[async_trait]
impl DomainAgeProvider for WhoisDomainAgeProvider {
    async fn analyze_domain(
        &self,
        domain: &str,
        force_refresh: bool,
    ) -> SignalResult<DomainAgeAnalysis> {
        let started = Instant::now();
        let key = domain.to_ascii_lowercase();
        if force_refresh {
            self.cache.delete(RiskFactorType::DomainAge, &key).await;
        }

        let outcome = self
            .cache
            .get_or_set(RiskFactorType::DomainAge, &key, None, || self.assess(&key))
            .await;

        match outcome {
            Ok((analysis, Some(age))) => {
                SignalResult::ok_cached(analysis, age, elapsed_ms(started))
            }
            Ok((analysis, None)) => SignalResult::ok(analysis, elapsed_ms(started)),
            Err(e) => SignalResult::failure(e, elapsed_ms(started)),
        }
    }
}

/// Authoritative WHOIS server for the domain's TLD.
fn whois_server_for(domain: &str) -> &'static str {
    let tld = domain.rsplit('.').next().unwrap_or(domain);
    match tld {
        "com" | "net" => "whois.verisign-grs.com",
        "org" => "whois.pir.org",
        "info" => "whois.afilias.net",
        "io" => "whois.nic.io",
        "co" => "whois.nic.co",
        "dev" | "app" | "page" => "whois.nic.google",
        "xyz" => "whois.nic.xyz",
        "top" => "whois.nic.top",
        "uk" => "whois.nic.uk",
        "de" => "whois.denic.de",
        "fr" => "whois.nic.fr",
        "nl" => "whois.domain-registry.nl",
        "ru" => "whois.tcinet.ru",
        "cn" => "whois.cnnic.cn",
        "jp" => "whois.jprs.jp",
        "br" => "whois.registro.br",
        "tk" => "whois.dot.tk",
        "ml" | "cf" | "ga" | "gq" => "whois.iana.org",
        _ => "whois.iana.org",
    }
}

/// Finds the first creation-date field whose value actually parses.
fn extract_creation_date(response: &str) -> Option<DateTime<Utc>> {
    for regex in CREATION_DATE_REGEXES.iter() {
        for captures in regex.captures_iter(response) {
            if let Some(value) = captures.get(1) {
                if let Some(parsed) = parse_whois_date(value.as_str().trim()) {
                    return Some(parsed);
                }
            }
        }
    }
    None
}

/// Finds the registrar field, skipping the bare referral lines some
/// registries emit (`Registrar WHOIS Server: ...`).
fn extract_registrar(response: &str) -> Option<String> {
    let regex = REGISTRAR_REGEX.as_ref()?;
    regex
        .captures_iter(response)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .find(|v| !v.is_empty() && !v.to_ascii_lowercase().starts_with("whois"))
}

/// Attempts to parse a WHOIS date value in the formats registries use.
fn parse_whois_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = [
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
        "%Y.%m.%d",
        "%d-%b-%Y",
        "%d/%m/%Y",
    ];
    for format in &formats {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive_dt) = chrono::NaiveDateTime::parse_from_str(value, format) {
            return Some(naive_dt.and_utc());
        }
        if let Ok(naive_date) = chrono::NaiveDate::parse_from_str(value, format) {
            return Some(naive_date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }

    // Last resort: a bare ISO date embedded in a longer value
    // ("2019-05-01 00:00:00 CLST" and friends).
    let iso = Regex::new(r"(\d{4})-(\d{2})-(\d{2})").ok()?;
    let captures = iso.captures(value)?;
    let date_part = captures.get(0)?.as_str();
    chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

/// Whole days between registration and `now`, clamped at zero for clocks
/// that disagree.
fn age_in_days(created: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    now.signed_duration_since(created)
        .num_days()
        .max(0)
        .min(u32::MAX as i64) as u32
}

/// Maps registration age onto native 0-1 risk. Brand-new domains dominate
/// phishing infrastructure; risk decays in steps as the domain ages.
fn age_risk(age_days: u32) -> f64 {
    match age_days {
        0..=7 => 0.95,
        8..=30 => 0.85,
        31..=90 => 0.65,
        91..=180 => 0.45,
        181..=365 => 0.3,
        366..=730 => 0.2,
        731..=1825 => 0.1,
        _ => 0.05,
    }
}
