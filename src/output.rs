//! Output types: per-page results, run statistics, and final assembly.
//!
//! [`PageResult`]s are created by the page translator, collected by the
//! runner in processing order, and assembled into one text block at the end
//! of the run. A failed or skipped page is represented in the assembled
//! output by an explicit gap marker so the reader can see exactly which
//! pages are missing without losing page alignment.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// Outcome of translating one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageStatus {
    /// The model returned a translation for this page.
    Success,
    /// Rendering or the model call failed; see [`PageResult::error`].
    Failed,
    /// The page was deliberately not sent to the model.
    Skipped,
}

/// Result of translating a single page. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number in the source document.
    pub page_num: usize,
    /// Success / Failed / Skipped.
    pub status: PageStatus,
    /// Translated text; present iff `status == Success`.
    pub text: Option<String>,
    /// Failure description; present iff `status == Failed`.
    pub error: Option<PageError>,
    /// Calls made to the remote model for this page. 0 when rendering
    /// failed before any call could be made.
    pub attempts: u32,
    /// Wall-clock time spent on this page, including retries and backoff.
    pub duration_ms: u64,
}

impl PageResult {
    pub fn success(page_num: usize, text: String, attempts: u32, duration_ms: u64) -> Self {
        Self {
            page_num,
            status: PageStatus::Success,
            text: Some(text),
            error: None,
            attempts,
            duration_ms,
        }
    }

    pub fn failed(page_num: usize, error: PageError, attempts: u32, duration_ms: u64) -> Self {
        Self {
            page_num,
            status: PageStatus::Failed,
            text: None,
            error: Some(error),
            attempts,
            duration_ms,
        }
    }
}

/// Terminal state of a run that produced output.
///
/// A configuration error aborts the run before any output exists and is
/// reported as `Err(TranslateError)` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every selected page was processed.
    Completed,
    /// The run was cancelled; unprocessed pages carry no `PageResult`.
    Cancelled,
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages selected for this run.
    pub selected_pages: usize,
    /// Pages translated successfully.
    pub translated_pages: usize,
    /// Pages that failed after all retries.
    pub failed_pages: usize,
    /// Selected pages never processed (cancellation).
    pub unprocessed_pages: usize,
    /// Wall-clock duration of the whole run.
    pub total_duration_ms: u64,
}

/// Everything a finished (or cancelled) run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// How the run ended.
    pub status: RunStatus,
    /// Assembled translation with gap markers for failed pages.
    pub text: String,
    /// Per-page results in processing order.
    pub pages: Vec<PageResult>,
    /// 1-indexed numbers of pages whose status is `Failed`, in processing
    /// order. Lets the caller re-run exactly the pages that need it.
    pub failed_pages: Vec<usize>,
    /// Aggregate counters.
    pub stats: RunStats,
}

/// Assemble the final output text from page results in processing order.
///
/// Successful pages contribute their translated text; failed and skipped
/// pages contribute a gap marker (`[PAGE 3 FAILED: RateLimited]`,
/// `[PAGE 3 SKIPPED]`). Blocks are joined with a single newline and the
/// result ends with exactly one newline, so a run over pages 1–2 where
/// page 2 fails yields `"<page 1 text>\n[PAGE 2 FAILED: …]\n"`. A run
/// with no page results (cancelled before the first page) yields the
/// empty string.
pub fn assemble_output(pages: &[PageResult], page_headers: bool) -> String {
    if pages.is_empty() {
        return String::new();
    }
    let mut blocks: Vec<String> = Vec::with_capacity(pages.len());

    for page in pages {
        let body = match page.status {
            PageStatus::Success => page
                .text
                .as_deref()
                .unwrap_or_default()
                .trim_end()
                .to_string(),
            PageStatus::Failed => {
                let kind = page.error.as_ref().map(|e| e.kind()).unwrap_or("UnknownError");
                format!("[PAGE {} FAILED: {}]", page.page_num, kind)
            }
            PageStatus::Skipped => format!("[PAGE {} SKIPPED]", page.page_num),
        };
        if page_headers {
            blocks.push(format!("--- Page {} ---\n{}", page.page_num, body));
        } else {
            blocks.push(body);
        }
    }

    let mut out = blocks.join("\n");
    out.push('\n');
    out
}
