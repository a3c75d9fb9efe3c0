//! Configuration types for a translation run.
//!
//! All run behaviour is controlled through [`TranslationConfig`], built via
//! its [`TranslationConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across threads, log them, and diff two runs
//! to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::pipeline::client::VisionModel;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default OpenRouter-compatible API endpoint.
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Configuration for one translation run.
///
/// Built via [`TranslationConfig::builder()`] or using
/// [`TranslationConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2lang::TranslationConfig;
///
/// let config = TranslationConfig::builder()
///     .model("openai/gpt-4o-mini")
///     .target_language("Hindi")
///     .wait_seconds(20.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct TranslationConfig {
    /// Model identifier sent to the remote service, e.g. "openai/gpt-4o",
    /// "anthropic/claude-3.5-sonnet". Default: "openai/gpt-4o".
    ///
    /// Must be non-empty; an empty model id aborts the run before any page
    /// is attempted.
    pub model: String,

    /// Source language of the document, e.g. "Gujarati". `None` means
    /// auto-detect: the instruction asks the model to detect the language
    /// and translate directly. Default: `None`.
    pub source_language: Option<String>,

    /// Target language of the translation. Default: "English".
    ///
    /// Must be non-empty; an empty target language aborts the run before
    /// any page is attempted.
    pub target_language: String,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Delay between consecutive pages in seconds. Default: 15.
    ///
    /// Free-tier models rate-limit aggressively; 15 s between pages keeps a
    /// long book under typical per-minute quotas. Paid models tolerate 0.
    /// The delay is applied after each page except the last, and is cut
    /// short if the run is cancelled while waiting.
    pub wait_seconds: f64,

    /// Maximum total calls to the remote model per page. Default: 3.
    ///
    /// Only transient failures (rate limit, network) consume extra
    /// attempts; model-not-found and bad-request rejections fail the page
    /// on the first call.
    pub max_attempts: u32,

    /// Base retry delay in milliseconds. Default: 10 000.
    ///
    /// The wait before retry number n is `base × n` (10 s, 20 s, ...), so
    /// the delay never decreases across attempts and a recovering quota
    /// window is given progressively more room.
    pub retry_base_delay_ms: u64,

    /// Sampling temperature for the model completion. Default: 0.3.
    ///
    /// Low temperature keeps the model faithful to what is on the page;
    /// higher values introduce paraphrasing that hurts translation
    /// fidelity.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4000.
    pub max_tokens: usize,

    /// Maximum rendered image dimension (width or height) in pixels.
    /// Default: 2000.
    ///
    /// A safety cap regardless of physical page size: an A0 poster could
    /// otherwise rasterise to a 13 000 px image and exhaust memory, and
    /// 2 000 px matches the sweet spot for vision-model tiling.
    pub max_rendered_pixels: u32,

    /// API key for the remote service. If `None`, read from the
    /// `OPENROUTER_API_KEY` or `OPEN_ROUTER_KEY` environment variables.
    pub api_key: Option<String>,

    /// Base URL of the OpenRouter-compatible API. Default: [`DEFAULT_API_BASE`].
    pub api_base_url: String,

    /// Per-model-call HTTP timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Prefix each page's output with a `--- Page N ---` header line.
    /// Default: false.
    pub page_headers: bool,

    /// Pre-constructed model client. Takes precedence over `api_key` /
    /// `api_base_url`. Useful in tests or when the caller needs custom
    /// middleware around the remote calls.
    pub model_client: Option<Arc<dyn VisionModel>>,

    /// Progress callback receiving per-page events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o".to_string(),
            source_language: None,
            target_language: "English".to_string(),
            pages: PageSelection::default(),
            wait_seconds: 15.0,
            max_attempts: 3,
            retry_base_delay_ms: 10_000,
            temperature: 0.3,
            max_tokens: 4000,
            max_rendered_pixels: 2000,
            api_key: None,
            api_base_url: DEFAULT_API_BASE.to_string(),
            api_timeout_secs: 120,
            page_headers: false,
            model_client: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranslationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationConfig")
            .field("model", &self.model)
            .field("source_language", &self.source_language)
            .field("target_language", &self.target_language)
            .field("pages", &self.pages)
            .field("wait_seconds", &self.wait_seconds)
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field(
                "model_client",
                &self.model_client.as_ref().map(|_| "<dyn VisionModel>"),
            )
            .finish()
    }
}

impl TranslationConfig {
    /// Create a new builder for `TranslationConfig`.
    pub fn builder() -> TranslationConfigBuilder {
        TranslationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Source language or `None` for auto-detect.
    ///
    /// The string "auto" (any case) is treated the same as `None` so the
    /// CLI and UI collaborators can pass their sentinel straight through.
    pub fn effective_source_language(&self) -> Option<&str> {
        match self.source_language.as_deref() {
            None => None,
            Some(s) if s.eq_ignore_ascii_case("auto") || s.is_empty() => None,
            Some(s) => Some(s),
        }
    }
}

/// Builder for [`TranslationConfig`].
#[derive(Debug)]
pub struct TranslationConfigBuilder {
    config: TranslationConfig,
}

impl TranslationConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the source language; pass "auto" (or never call this) for
    /// auto-detection.
    pub fn source_language(mut self, lang: impl Into<String>) -> Self {
        self.config.source_language = Some(lang.into());
        self
    }

    pub fn target_language(mut self, lang: impl Into<String>) -> Self {
        self.config.target_language = lang.into();
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn wait_seconds(mut self, secs: f64) -> Self {
        self.config.wait_seconds = secs.max(0.0);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_base_delay_ms = ms;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn page_headers(mut self, v: bool) -> Self {
        self.config.page_headers = v;
        self
    }

    pub fn model_client(mut self, client: Arc<dyn VisionModel>) -> Self {
        self.config.model_client = Some(client);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration.
    ///
    /// Structural constraints (non-negative wait, at least one attempt) are
    /// enforced by the setters; language/model validation happens at run
    /// start so a config can be assembled incrementally from UI state.
    pub fn build(self) -> Result<TranslationConfig, crate::error::TranslateError> {
        Ok(self.config)
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the PDF to translate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Translate all pages (default).
    #[default]
    All,
    /// Translate a single page (1-indexed).
    Single(usize),
    /// Translate a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Translate specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed
    /// page numbers. Out-of-range pages are silently dropped.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
