//! Progress-callback trait for per-page translation events.
//!
//! Inject an [`Arc<dyn TranslationProgressCallback>`] via
//! [`crate::config::TranslationConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline processes each page.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a WebSocket, or a terminal progress bar
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync`; pages are processed strictly sequentially, so no
//! two page events ever fire concurrently, but the flag-setting cancel path
//! may run on another thread.

use crate::output::PageStatus;
use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait TranslationProgressCallback: Send + Sync {
    /// Called once before any page is rendered.
    ///
    /// `total_pages` is the number of *selected* pages for this run, not
    /// the document page count.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is rendered and sent to the model.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called once a page's result is recorded, whatever its status.
    ///
    /// `pages_done` counts this page; `attempts` is the number of model
    /// calls the page consumed.
    fn on_page_complete(
        &self,
        page_num: usize,
        pages_done: usize,
        total_pages: usize,
        status: PageStatus,
        attempts: u32,
    ) {
        let _ = (page_num, pages_done, total_pages, status, attempts);
    }

    /// Called when the pipeline starts the inter-page delay.
    ///
    /// Not called before the first page or after the last one.
    fn on_wait(&self, seconds: f64) {
        let _ = seconds;
    }

    /// Called once after the run ends, before `RunOutput` is returned.
    ///
    /// `text` is the fully assembled output, gap markers included, so a
    /// host UI consuming only this interface can display the result.
    /// `failed_pages` lists 1-indexed pages whose status is `Failed`, in
    /// processing order.
    fn on_run_complete(&self, text: &str, translated: usize, failed_pages: &[usize]) {
        let _ = (text, translated, failed_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TranslationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::TranslationConfig`].
pub type ProgressCallback = Arc<dyn TranslationProgressCallback>;
