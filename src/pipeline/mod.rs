//! Pipeline stages for page-by-page PDF translation.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. a different rendering backend or API endpoint)
//! without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ encode ──▶ request ──▶ client ──▶ postprocess
//! (pdfium)   (base64)   (prompt)    (HTTP+retry)  (cleanup)
//! ```
//!
//! 1. [`render`]: rasterise one page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`encode`]: PNG-encode and base64-wrap the page image as a data-URL
//! 3. [`request`]: assemble the deterministic translation request
//! 4. [`client`]: drive the model call with retry/backoff; the only
//!    stage with network I/O
//! 5. [`postprocess`]: deterministic text cleanup of model quirks
//!    (fences, language labels, invisible characters)

pub mod client;
pub mod encode;
pub mod postprocess;
pub mod render;
pub mod request;
