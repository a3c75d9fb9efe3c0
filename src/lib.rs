//! # pdf2lang
//!
//! Translate PDF documents page-by-page using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Text extracted from scanned books and non-Latin-script PDFs is usually
//! garbage: encoding soup, broken ligatures, lost reading order. Instead
//! this crate rasterises each page into a PNG and lets a vision model read
//! it as a human would, translating the page content directly into the
//! target language.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Render   rasterise one page via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 2. Encode   PNG → base64 data-URL
//!  ├─ 3. Request  deterministic instruction prompt + page image
//!  ├─ 4. Call     OpenRouter chat/completions with retry + backoff
//!  ├─ 5. Clean    strip fences, language labels, invisible chars
//!  ├─ 6. Wait     rate-limit delay before the next page
//!  └─ 7. Output   assembled text + per-page results + failed-page list
//! ```
//!
//! Pages are processed strictly sequentially: the inter-page delay exists
//! to keep a run under the remote service's rate limits, which concurrent
//! calls would defeat. A page that fails after all retries becomes a gap
//! marker in the output (`[PAGE 7 FAILED: RateLimited]`); partial success
//! is a first-class outcome, and the failed-page list lets callers re-run
//! exactly the pages that need it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2lang::{translate, TranslationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from OPENROUTER_API_KEY
//!     let config = TranslationConfig::builder()
//!         .model("openai/gpt-4o-mini")
//!         .target_language("Hindi")
//!         .build()?;
//!     let output = translate("book.pdf", &config).await?;
//!     println!("{}", output.text);
//!     if !output.failed_pages.is_empty() {
//!         eprintln!("failed pages: {:?}", output.failed_pages);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2lang` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2lang = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod limiter;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod translate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageSelection, TranslationConfig, TranslationConfigBuilder, DEFAULT_API_BASE};
pub use error::{PageError, TranslateError};
pub use limiter::{CancelFlag, RateLimiter};
pub use output::{PageResult, PageStatus, RunOutput, RunStats, RunStatus};
pub use pipeline::client::{ModelCallError, OpenRouterClient, RetryPolicy, VisionModel};
pub use pipeline::render::{PageRenderer, PdfiumRenderer};
pub use progress::{NoopProgressCallback, ProgressCallback, TranslationProgressCallback};
pub use translate::{
    page_count, translate, translate_from_bytes, translate_sync, translate_to_file,
    write_output, PipelineRunner,
};
