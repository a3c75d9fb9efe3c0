//! Model interaction: the [`VisionModel`] seam, the OpenRouter HTTP client,
//! and the bounded-retry wrapper driving it.
//!
//! ## Retry Strategy
//!
//! HTTP 429 responses and network blips are transient and frequent on
//! free-tier models. The wait before retry number n is
//! `base_delay × n` (10 s, 20 s, ... by default), so the delay never
//! decreases across attempts and a recovering quota window gets
//! progressively more room. Non-transient rejections (unknown model,
//! malformed request) fail a page on the first call: retrying cannot fix
//! them, and anything unrecognised is treated the same way so unexpected
//! errors are surfaced instead of silently retried.

use crate::error::PageError;
use crate::limiter::{sleep_interruptible, CancelFlag};
use crate::pipeline::request::TranslationRequest;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// One failed call to the remote model.
#[derive(Debug, Clone, Error)]
pub enum ModelCallError {
    /// HTTP 429, quota or rate limit. Retryable.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// HTTP 404, the service does not know this model. Not retryable.
    #[error("model '{model}' not found")]
    ModelNotFound { model: String },

    /// HTTP 400, the request itself is malformed. Not retryable.
    #[error("bad request: {detail}")]
    BadRequest { detail: String },

    /// Connection failure or reset. Retryable.
    #[error("network error: {detail}")]
    Network { detail: String },

    /// The call exceeded the configured timeout. Retryable.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Any other HTTP error status. Not retryable (fail fast).
    #[error("API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    /// The response body did not contain a translation. Not retryable.
    #[error("malformed response: {detail}")]
    Malformed { detail: String },
}

impl ModelCallError {
    /// Whether retrying can plausibly fix this failure.
    ///
    /// The classification is fixed: rate limits and connectivity failures
    /// are transient; everything else, including unrecognised statuses,
    /// is not, to avoid masking unexpected errors as retryable.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ModelCallError::RateLimited { .. }
                | ModelCallError::Network { .. }
                | ModelCallError::Timeout { .. }
        )
    }

    /// Convert into the per-page error recorded in a `PageResult`.
    pub fn into_page_error(self, page: usize, attempts: u32) -> PageError {
        match self {
            ModelCallError::RateLimited { .. } => PageError::RateLimited { page, attempts },
            ModelCallError::ModelNotFound { model } => PageError::ModelNotFound { page, model },
            ModelCallError::BadRequest { detail } => PageError::BadRequest { page, detail },
            ModelCallError::Network { detail } => PageError::Network {
                page,
                attempts,
                detail,
            },
            ModelCallError::Timeout { secs } => PageError::Network {
                page,
                attempts,
                detail: format!("timed out after {secs}s"),
            },
            ModelCallError::Api { status, detail } => PageError::Unknown {
                page,
                detail: format!("HTTP {status}: {detail}"),
            },
            ModelCallError::Malformed { detail } => PageError::Unknown { page, detail },
        }
    }
}

/// A remote vision-capable model that can translate one page image.
///
/// One outbound call per invocation; retries live in [`call_with_retry`],
/// not in implementations. Tests inject scripted implementations through
/// [`crate::config::TranslationConfig::model_client`].
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Send one request; return the raw translation text or a classified
    /// failure.
    async fn translate_page(&self, request: &TranslationRequest) -> Result<String, ModelCallError>;
}

impl std::fmt::Debug for dyn VisionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<dyn VisionModel>")
    }
}

// ── Retry wrapper ────────────────────────────────────────────────────────

/// Bounded-retry configuration for one run.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total calls allowed per page, including the first. Always ≥ 1.
    pub max_attempts: u32,
    /// Base backoff delay; the wait before retry n is `base × n`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay applied after failed attempt number `attempt` (1-based).
    /// Non-decreasing in `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Call the model with bounded retry and backoff.
///
/// Returns `Ok((text, attempts))` on success or `Err((error, attempts))`
/// once retries are exhausted or a non-transient failure occurs. A
/// non-transient failure consumes exactly one attempt. The backoff sleep
/// is interruptible, so cancelling the run during a long backoff gives
/// up immediately instead of waiting it out.
pub async fn call_with_retry(
    model: &dyn VisionModel,
    request: &TranslationRequest,
    policy: RetryPolicy,
    cancel: &CancelFlag,
) -> Result<(String, u32), (ModelCallError, u32)> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match model.translate_page(request).await {
            Ok(text) => {
                debug!("model call succeeded on attempt {attempt}");
                return Ok((text, attempt));
            }
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let backoff = policy.delay_after(attempt);
                warn!(
                    "attempt {attempt}/{} failed ({e}), retrying in {:?}",
                    policy.max_attempts, backoff
                );
                if !sleep_interruptible(backoff, cancel).await {
                    return Err((e, attempt));
                }
            }
            Err(e) => {
                if e.is_transient() {
                    warn!("giving up after {attempt} attempts: {e}");
                } else {
                    warn!("non-retryable failure on attempt {attempt}: {e}");
                }
                return Err((e, attempt));
            }
        }
    }
}

// ── OpenRouter client ────────────────────────────────────────────────────

/// Production client for an OpenRouter-compatible `chat/completions` API.
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout_secs: u64,
}

impl OpenRouterClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, crate::error::TranslateError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| crate::error::TranslateError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Map an HTTP error status to a classified call error.
fn classify_http_status(status: u16, model: &str, detail: String) -> ModelCallError {
    match status {
        429 => ModelCallError::RateLimited {
            retry_after_secs: None,
        },
        404 => ModelCallError::ModelNotFound {
            model: model.to_string(),
        },
        400 => ModelCallError::BadRequest { detail },
        _ => ModelCallError::Api { status, detail },
    }
}

fn classify_reqwest_error(e: reqwest::Error, timeout_secs: u64) -> ModelCallError {
    if e.is_timeout() {
        ModelCallError::Timeout { secs: timeout_secs }
    } else {
        ModelCallError::Network {
            detail: e.to_string(),
        }
    }
}

#[async_trait]
impl VisionModel for OpenRouterClient {
    async fn translate_page(&self, request: &TranslationRequest) -> Result<String, ModelCallError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": request.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": request.instruction },
                    { "type": "image_url", "image_url": { "url": request.image_data_url } }
                ]
            }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let detail = response.text().await.unwrap_or_default();
            let mut err = classify_http_status(status.as_u16(), &request.model, detail);
            if let ModelCallError::RateLimited { retry_after_secs } = &mut err {
                *retry_after_secs = retry_after;
            }
            return Err(err);
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            ModelCallError::Malformed {
                detail: format!("response body: {e}"),
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ModelCallError::Malformed {
                detail: "response contained no choices".into(),
            })
    }
}
