//! AI content-analysis provider.
//!
//! Fetches the page behind the URL (size-capped), extracts the title,
//! description, and visible text, and asks an OpenAI-compatible
//! chat-completions endpoint for a verdict as a strict JSON object.
//! Models wrap JSON in markdown fences often enough that parsing
//! tolerates them. The provider is constructed only when an API key is
//! configured; without one it is simply never registered.
//!
//! The model's confidence stays on its native 0-100 scale here; the
//! signal layer normalizes it at ingestion.

use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::json;

use super::ContentAnalysisProvider;
use crate::cache::SignalCache;
use crate::error_handling::{categorize_reqwest_error, SignalError};
use crate::security::ValidatedUrl;
use crate::signal::{AiAnalysis, RiskFactorType, SignalResult};
use crate::utils::elapsed_ms;

/// Name of the environment variable carrying the API key.
pub const AI_API_KEY_ENV: &str = "URL_VERDICT_AI_API_KEY";
/// Name of the environment variable overriding the endpoint base URL.
pub const AI_BASE_URL_ENV: &str = "URL_VERDICT_AI_BASE_URL";
/// Name of the environment variable overriding the model.
pub const AI_MODEL_ENV: &str = "URL_VERDICT_AI_MODEL";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are a security analyst assessing whether a web page is a scam, \
phishing attempt, or otherwise dangerous. Respond with ONLY a JSON object, no prose, of the form \
{\"risk_score\": <0-100>, \"scam_category\": \"<phishing|scam|malware|spam|legitimate|unknown>\", \
\"confidence\": <0-100>, \"primary_risks\": [\"...\"], \"indicators\": [\"...\"]}. \
risk_score is how dangerous the page is (100 = certainly malicious); confidence is how sure you are.";

static TITLE_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("title").ok());
static META_DESCRIPTION_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("meta[name='description']").ok());
// Content-bearing elements only; pulling text from the root drags in
// script and style bodies.
static CONTENT_SELECTOR: LazyLock<Option<Selector>> = LazyLock::new(|| {
    Selector::parse("p, h1, h2, h3, h4, h5, h6, li, td, th, a, button, label, blockquote").ok()
});

/// Configuration for the AI content-analysis provider.
#[derive(Debug, Clone)]
pub struct AiAnalysisConfig {
    /// API key for the chat-completions endpoint.
    pub api_key: String,
    /// Endpoint base (`/chat/completions` is appended).
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Timeout for the completion call.
    pub request_timeout: Duration,
    /// Timeout for fetching the page.
    pub page_fetch_timeout: Duration,
}

impl AiAnalysisConfig {
    /// Builds a configuration with default endpoint, model, and timeouts.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: crate::config::AI_REQUEST_TIMEOUT,
            page_fetch_timeout: crate::config::PAGE_FETCH_TIMEOUT,
        }
    }

    /// Reads the configuration from the environment. `None` without an API
    /// key, in which case the provider stays unregistered.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var(AI_API_KEY_ENV).ok().filter(|k| !k.is_empty())?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var(AI_BASE_URL_ENV) {
            if !base_url.is_empty() {
                config.base_url = base_url;
            }
        }
        if let Ok(model) = std::env::var(AI_MODEL_ENV) {
            if !model.is_empty() {
                config.model = model;
            }
        }
        Some(config)
    }
}

/// The bundled content-analysis provider.
pub struct OpenAiContentProvider {
    client: reqwest::Client,
    cache: Arc<SignalCache>,
    config: AiAnalysisConfig,
}

impl OpenAiContentProvider {
    /// Creates a provider over a shared HTTP client and cache.
    pub fn new(client: reqwest::Client, cache: Arc<SignalCache>, config: AiAnalysisConfig) -> Self {
        Self {
            client,
            cache,
            config,
        }
    }

    async fn assess(&self, url: &ValidatedUrl) -> Result<AiAnalysis, SignalError> {
        let body = self.fetch_page(&url.normalized).await?;
        let summary = PageSummary::extract(&body);
        let reply = self.request_verdict(&url.normalized, &summary).await?;
        parse_verdict(&reply)
    }

    /// Fetches the page, reading at most `MAX_PAGE_BODY_SIZE` bytes of it.
    async fn fetch_page(&self, url: &str) -> Result<String, SignalError> {
        let mut response = self
            .client
            .get(url)
            .timeout(self.config.page_fetch_timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| categorize_reqwest_error(&e))?;

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| categorize_reqwest_error(&e))?
        {
            body.extend_from_slice(&chunk);
            if body.len() >= crate::config::MAX_PAGE_BODY_SIZE {
                body.truncate(crate::config::MAX_PAGE_BODY_SIZE);
                break;
            }
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// One chat-completions round trip. Returns the raw assistant message.
    async fn request_verdict(
        &self,
        url: &str,
        summary: &PageSummary,
    ) -> Result<String, SignalError> {
        let user_prompt = format!(
            "URL: {url}\nTitle: {}\nMeta description: {}\nVisible page text (truncated):\n{}",
            summary.title.as_deref().unwrap_or("(none)"),
            summary.description.as_deref().unwrap_or("(none)"),
            summary.text,
        );

        let request_body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": 0.0,
            "max_tokens": crate::config::AI_MAX_TOKENS,
        });

        let endpoint = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| categorize_reqwest_error(&e))?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| categorize_reqwest_error(&e))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SignalError::Parse("model returned no completion".to_string()))
    }
}

#[async_trait]
impl ContentAnalysisProvider for OpenAiContentProvider {
    async fn analyze_url(&self, url: &ValidatedUrl, force_refresh: bool) -> SignalResult<AiAnalysis> {
        let started = Instant::now();
        let key = url.normalized.clone();
        if force_refresh {
            self.cache.delete(RiskFactorType::AiAnalysis, &key).await;
        }

        let outcome = self
            .cache
            .get_or_set(RiskFactorType::AiAnalysis, &key, None, || self.assess(url))
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

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// What the model is required to return. The two scores are mandatory;
/// everything else degrades gracefully.
#[derive(Debug, Deserialize)]
struct ModelVerdict {
    risk_score: f64,
    confidence: f64,
    #[serde(default)]
    scam_category: Option<String>,
    #[serde(default)]
    primary_risks: Vec<String>,
    #[serde(default)]
    indicators: Vec<String>,
}

/// Title, meta description, and visible text pulled from the page.
#[derive(Debug, Default)]
struct PageSummary {
    title: Option<String>,
    description: Option<String>,
    text: String,
}

impl PageSummary {
    fn extract(html: &str) -> Self {
        let document = Html::parse_document(html);

        let title = TITLE_SELECTOR.as_ref().and_then(|selector| {
            document
                .select(selector)
                .next()
                .map(|element| element.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        });

        let description = META_DESCRIPTION_SELECTOR.as_ref().and_then(|selector| {
            document
                .select(selector)
                .next()
                .and_then(|element| element.value().attr("content"))
                .map(|content| content.trim().to_string())
                .filter(|d| !d.is_empty())
        });

        Self {
            title,
            description,
            text: visible_text(&document),
        }
    }
}

/// Joins the text of content-bearing elements. Only direct text-node
/// children are taken per element, so nested elements (a link inside a
/// list item) are not collected twice.
fn visible_text(document: &Html) -> String {
    let Some(selector) = CONTENT_SELECTOR.as_ref() else {
        return String::new();
    };

    let mut collected = String::new();
    'elements: for element in document.select(selector) {
        for child in element.children() {
            let Some(text) = child.value().as_text() else {
                continue;
            };
            let piece = text.trim();
            if piece.is_empty() {
                continue;
            }
            if !collected.is_empty() {
                collected.push(' ');
            }
            collected.push_str(piece);
            // Collect past the cap in bytes, then truncate on characters.
            if collected.len() >= crate::config::MAX_PAGE_TEXT_CHARS * 4 {
                break 'elements;
            }
        }
    }

    truncate_chars(&collected, crate::config::MAX_PAGE_TEXT_CHARS)
}

/// Parses the model reply into an analysis, tolerating markdown fences and
/// prose around the object.
fn parse_verdict(reply: &str) -> Result<AiAnalysis, SignalError> {
    let candidate = strip_code_fences(reply);
    let verdict: ModelVerdict = serde_json::from_str(candidate)
        .or_else(|first_err| {
            // Some models still wrap the object in prose; take the outermost
            // braces before giving up.
            match (candidate.find('{'), candidate.rfind('}')) {
                (Some(open), Some(close)) if open < close => {
                    serde_json::from_str(&candidate[open..=close])
                }
                _ => Err(first_err),
            }
        })
        .map_err(|e| SignalError::Parse(format!("model reply is not the expected JSON: {e}")))?;

    let scam_category = verdict
        .scam_category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(AiAnalysis {
        risk_score: verdict.risk_score.clamp(0.0, 100.0),
        scam_category,
        confidence: verdict.confidence.clamp(0.0, 100.0),
        primary_risks: verdict.primary_risks,
        indicators: verdict.indicators,
    })
}

/// Removes a surrounding markdown code fence, with or without an info
/// string, and returns the trimmed inner text.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

/// Truncates on a character boundary.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
