//! Vision-provider seam: the trait the extraction client calls through,
//! plus the bundled OpenAI-compatible implementation.
//!
//! The retry loop in [`crate::pipeline::llm`] needs to know *why* a call
//! failed, not just that it failed, so [`ProviderError`] classifies failures
//! up front: transient HTTP statuses (429/500/503) are retried, quota and
//! billing exhaustion is terminal and never consumes a retry, and everything
//! else propagates verbatim. Keeping classification here means the retry
//! logic stays free of any wire-format knowledge.
//!
//! Tests implement [`VisionProvider`] with scripted responses, which is why
//! the trait and error type are public.

use crate::config::AnalysisConfig;
use crate::error::Shot2DataError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Default endpoint when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Response-body markers that identify quota/billing exhaustion.
///
/// OpenAI reports exhausted quota as HTTP 429 with an `insufficient_quota`
/// error type, which must not be confused with an ordinary rate limit.
const QUOTA_MARKERS: &[&str] = &[
    "insufficient_quota",
    "billing_hard_limit_reached",
    "exceeded your current quota",
];

/// A single extraction request: one image plus the fixed prompt.
#[derive(Debug)]
pub struct ExtractionRequest<'a> {
    /// The extraction prompt.
    pub prompt: &'a str,
    /// Base64-encoded image bytes.
    pub image_base64: &'a str,
    /// MIME type of the encoded image (`image/jpeg` or `image/png`).
    pub mime_type: &'a str,
    /// Response-size cap in tokens.
    pub max_tokens: usize,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Errors surfaced by a [`VisionProvider`] call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// HTTP 429 without a quota marker; transient.
    #[error("Rate limited (HTTP {status})")]
    RateLimited {
        status: u16,
        retry_after_secs: Option<u64>,
    },

    /// HTTP 5xx. Only 500 and 503 are treated as transient.
    #[error("Server error (HTTP {status}): {detail}")]
    ServerError { status: u16, detail: String },

    /// The usage allowance is consumed. Terminal; never retried.
    #[error("Quota exhausted: {detail}")]
    QuotaExhausted { detail: String },

    /// HTTP 401/403; retry will not help.
    #[error("Authentication error (HTTP {status}): {detail}")]
    Auth { status: u16, detail: String },

    /// The per-attempt deadline elapsed. Treated as transient.
    #[error("Call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Connection-level failure before any HTTP status was received.
    #[error("Network error: {detail}")]
    Network { detail: String },

    /// Any other non-success HTTP status.
    #[error("API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    /// HTTP success but no usable content in the response body.
    #[error("Provider returned an empty response")]
    EmptyResponse,
}

impl ProviderError {
    /// Whether the retry loop may try again.
    ///
    /// Transient statuses are exactly 429, 500, and 503; an elapsed
    /// per-attempt deadline also counts.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::ServerError { status, .. } => matches!(status, 500 | 503),
            ProviderError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Whether this is the distinct quota-exhaustion signal.
    pub fn is_quota(&self) -> bool {
        matches!(self, ProviderError::QuotaExhausted { .. })
    }
}

/// A remote multimodal capability that turns one image into text.
///
/// Implementations must be `Send + Sync`; the library shares one provider
/// across a whole batch behind an `Arc`.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Submit one image with the extraction prompt; return the raw
    /// response text. Content normalisation is the caller's concern.
    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<String, ProviderError>;

    /// Short provider label used in errors and logs.
    fn name(&self) -> &str;
}

// ── OpenAI-compatible implementation ─────────────────────────────────────

/// Provider speaking the OpenAI chat-completions wire format.
///
/// Works against api.openai.com and any compatible endpoint (vLLM, LiteLLM,
/// OpenRouter, Ollama's OpenAI shim) by pointing `base_url` elsewhere.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    label: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, Shot2DataError> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Shot2DataError::Internal(format!("HTTP client: {e}")))?;
        let label = host_label(&base_url);
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            model: model.into(),
            label,
        })
    }
}

#[async_trait]
impl VisionProvider for OpenAiCompatibleProvider {
    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<String, ProviderError> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let body = request_body(&self.model, request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network {
                detail: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        let text = response.text().await.map_err(|e| ProviderError::Network {
            detail: e.to_string(),
        })?;

        if !(200..300).contains(&status) {
            return Err(classify_failure(status, &text, retry_after));
        }

        let content = parse_content(&text)?;
        debug!("Provider returned {} bytes of content", content.len());
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Build the chat-completions request body for one image.
fn request_body(model: &str, request: &ExtractionRequest<'_>) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": request.prompt },
                {
                    "type": "image_url",
                    "image_url": {
                        "url": format!(
                            "data:{};base64,{}",
                            request.mime_type, request.image_base64
                        )
                    }
                }
            ]
        }],
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
    })
}

/// Map a non-success HTTP response to a [`ProviderError`].
///
/// Quota markers take precedence over the plain 429 classification so an
/// exhausted allowance is never retried as if it were a rate limit.
fn classify_failure(status: u16, body: &str, retry_after_secs: Option<u64>) -> ProviderError {
    if matches!(status, 401 | 403) {
        return ProviderError::Auth {
            status,
            detail: truncate_detail(body),
        };
    }
    if QUOTA_MARKERS.iter().any(|m| body.contains(m)) {
        return ProviderError::QuotaExhausted {
            detail: truncate_detail(body),
        };
    }
    if status == 429 {
        return ProviderError::RateLimited {
            status,
            retry_after_secs,
        };
    }
    if (500..600).contains(&status) {
        return ProviderError::ServerError {
            status,
            detail: truncate_detail(body),
        };
    }
    ProviderError::Api {
        status,
        detail: truncate_detail(body),
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
fn parse_content(body: &str) -> Result<String, ProviderError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ProviderError::Api {
            status: 200,
            detail: format!("unparseable response body: {e}"),
        })?;

    let content = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("");

    if content.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(content.to_string())
}

/// Error bodies can be whole HTML pages; keep messages readable.
fn truncate_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= 300 {
        return trimmed.to_string();
    }
    let mut end = 300;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}

fn host_label(base_url: &str) -> String {
    base_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or("provider")
        .to_string()
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Resolve the vision provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed
///    the provider entirely; used as-is. This is also the seam tests use to
///    inject scripted providers.
///
/// 2. **Explicit fields** (`config.api_key`, with optional `base_url` and
///    `model`) — the caller supplied credentials in code.
///
/// 3. **Environment** — `SHOT2DATA_API_KEY` (falling back to
///    `OPENAI_API_KEY`), with `SHOT2DATA_BASE_URL` and `SHOT2DATA_MODEL`
///    overriding the defaults. Convenient for `shot2data ./screenshots`
///    with no other configuration.
pub fn resolve_provider(
    config: &AnalysisConfig,
) -> Result<Arc<dyn VisionProvider>, Shot2DataError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let base_url = config
        .base_url
        .clone()
        .or_else(|| env_non_empty("SHOT2DATA_BASE_URL"))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let model = config
        .model
        .clone()
        .or_else(|| env_non_empty("SHOT2DATA_MODEL"))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let api_key = config
        .api_key
        .clone()
        .or_else(|| env_non_empty("SHOT2DATA_API_KEY"))
        .or_else(|| env_non_empty("OPENAI_API_KEY"))
        .ok_or_else(|| Shot2DataError::ProviderNotConfigured {
            hint: "Set SHOT2DATA_API_KEY or OPENAI_API_KEY, or supply a provider in the config."
                .to_string(),
        })?;

    let provider = OpenAiCompatibleProvider::new(base_url, api_key, model)?;
    Ok(Arc::new(provider))
}

fn env_non_empty(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses_are_exactly_429_500_503() {
        let rate = ProviderError::RateLimited {
            status: 429,
            retry_after_secs: None,
        };
        assert!(rate.is_transient());

        for status in [500, 503] {
            let e = ProviderError::ServerError {
                status,
                detail: String::new(),
            };
            assert!(e.is_transient(), "{status} should be transient");
        }
        for status in [502, 504] {
            let e = ProviderError::ServerError {
                status,
                detail: String::new(),
            };
            assert!(!e.is_transient(), "{status} should not be transient");
        }
    }

    #[test]
    fn quota_is_terminal_not_transient() {
        let e = ProviderError::QuotaExhausted {
            detail: "insufficient_quota".into(),
        };
        assert!(!e.is_transient());
        assert!(e.is_quota());
    }

    #[test]
    fn timeout_counts_as_transient() {
        assert!(ProviderError::Timeout { elapsed_ms: 60_000 }.is_transient());
    }

    #[test]
    fn classify_429_with_quota_marker_is_quota() {
        let body = r#"{"error":{"type":"insufficient_quota","message":"You exceeded your current quota"}}"#;
        let e = classify_failure(429, body, None);
        assert!(e.is_quota(), "got {e:?}");
    }

    #[test]
    fn classify_plain_429_is_rate_limited() {
        let e = classify_failure(429, r#"{"error":{"type":"rate_limit_exceeded"}}"#, Some(30));
        assert!(matches!(
            e,
            ProviderError::RateLimited {
                status: 429,
                retry_after_secs: Some(30)
            }
        ));
    }

    #[test]
    fn classify_auth_statuses() {
        assert!(matches!(
            classify_failure(401, "bad key", None),
            ProviderError::Auth { status: 401, .. }
        ));
        assert!(matches!(
            classify_failure(403, "forbidden", None),
            ProviderError::Auth { status: 403, .. }
        ));
    }

    #[test]
    fn classify_5xx_is_server_error() {
        assert!(matches!(
            classify_failure(503, "overloaded", None),
            ProviderError::ServerError { status: 503, .. }
        ));
    }

    #[test]
    fn parse_content_happy_path() {
        let body = r#"{"choices":[{"message":{"content":"{\"distance\":\"5 km\"}"}}]}"#;
        let content = parse_content(body).expect("content");
        assert!(content.contains("5 km"));
    }

    #[test]
    fn parse_content_empty_is_error() {
        let body = r#"{"choices":[{"message":{"content":""}}]}"#;
        assert!(matches!(
            parse_content(body),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn request_body_carries_data_uri() {
        let req = ExtractionRequest {
            prompt: "extract",
            image_base64: "QUJD",
            mime_type: "image/jpeg",
            max_tokens: 512,
            temperature: 0.0,
        };
        let body = request_body("gpt-4o-mini", &req);
        let url = body["messages"][0]["content"][1]["image_url"]["url"]
            .as_str()
            .expect("url");
        assert_eq!(url, "data:image/jpeg;base64,QUJD");
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn host_label_strips_scheme_and_path() {
        assert_eq!(host_label("https://api.openai.com/v1"), "api.openai.com");
        assert_eq!(host_label("http://localhost:11434/v1"), "localhost:11434");
    }
}
