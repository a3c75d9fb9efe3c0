//! Error types for the pdf2lang library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`TranslateError`]: **fatal**, the run cannot proceed at all
//!   (bad input file, invalid configuration, missing API key). Returned as
//!   `Err(TranslateError)` from the top-level `translate*` functions before
//!   any page work begins.
//!
//! * [`PageError`]: **non-fatal**, a single page failed (render glitch,
//!   exhausted rate-limit retries, model rejection) but other pages are
//!   fine. Stored inside [`crate::output::PageResult`] so callers can
//!   inspect partial success rather than losing the whole document to one
//!   bad page.
//!
//! The separation lets callers decide their own tolerance: abort on the
//! first page failure, log and continue, or re-run just the failed pages.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2lang library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum TranslateError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Run parameters are invalid (empty target language, empty model id).
    ///
    /// Reported once, before any page is attempted; a run that cannot
    /// succeed for any page is aborted rather than failing page by page.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No API key in config and none of the known environment variables set.
    #[error(
        "No API key configured for '{base_url}'.\n\
Set OPENROUTER_API_KEY (or OPEN_ROUTER_KEY), or pass one via \
TranslationConfig::builder().api_key(…)."
    )]
    ApiKeyMissing { base_url: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::PageResult`] when a page fails. The run
/// continues to the next page regardless of the kind; partial success is a
/// first-class outcome.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed; the model was never contacted.
    #[error("Page {page}: rasterisation failed: {detail}")]
    Render { page: usize, detail: String },

    /// Rate-limit / quota retries exhausted after `attempts` calls.
    #[error("Page {page}: rate limit exceeded after {attempts} attempts")]
    RateLimited { page: usize, attempts: u32 },

    /// The remote service does not recognise the requested model. Not retried.
    #[error("Page {page}: model '{model}' not found")]
    ModelNotFound { page: usize, model: String },

    /// The remote service rejected the request as malformed. Not retried.
    #[error("Page {page}: bad request: {detail}")]
    BadRequest { page: usize, detail: String },

    /// Connectivity failure (timeout, connection reset) after all retries.
    #[error("Page {page}: network error after {attempts} attempts: {detail}")]
    Network {
        page: usize,
        attempts: u32,
        detail: String,
    },

    /// Unclassified remote failure. Not retried, to avoid masking unexpected
    /// errors as retryable.
    #[error("Page {page}: {detail}")]
    Unknown { page: usize, detail: String },
}

impl PageError {
    /// Short stable name of this error kind, used in output gap markers.
    pub fn kind(&self) -> &'static str {
        match self {
            PageError::Render { .. } => "RenderError",
            PageError::RateLimited { .. } => "RateLimited",
            PageError::ModelNotFound { .. } => "ModelNotFound",
            PageError::BadRequest { .. } => "BadRequest",
            PageError::Network { .. } => "NetworkError",
            PageError::Unknown { .. } => "UnknownError",
        }
    }
}
