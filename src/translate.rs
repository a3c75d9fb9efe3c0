//! Run orchestration: the page translator, the pipeline runner, and the
//! public entry points.
//!
//! One [`PipelineRunner`] owns one run. Pages are processed strictly
//! sequentially (the rate limiter's contract is to bound the aggregate
//! request rate to the remote service, which parallel calls would violate)
//! and each page moves from the pending queue to the completed list exactly
//! once. Per-page failures are recorded and the run continues; only a
//! configuration error (empty model id or target language) aborts the run
//! as a whole, because it cannot succeed for any page.

use crate::config::TranslationConfig;
use crate::error::{PageError, TranslateError};
use crate::limiter::{CancelFlag, RateLimiter};
use crate::output::{assemble_output, PageResult, PageStatus, RunOutput, RunStats, RunStatus};
use crate::pipeline::client::{call_with_retry, OpenRouterClient, RetryPolicy, VisionModel};
use crate::pipeline::render::{PageRenderer, PdfiumRenderer};
use crate::pipeline::{encode, postprocess, request};
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Mutable state of one run.
///
/// Every selected page index lives in exactly one of `pending` or
/// `completed` at any time; `completed` preserves processing order.
struct RunState {
    pending: VecDeque<usize>,
    completed: Vec<PageResult>,
}

/// Translate one page: render, build the request, call the model with
/// retry, post-process the response.
///
/// Never propagates an error; every failure mode is captured in the
/// returned [`PageResult`]. A rendering failure short-circuits before any
/// model call, so its `attempts` is 0.
async fn translate_page(
    renderer: &dyn PageRenderer,
    model: &dyn VisionModel,
    config: &TranslationConfig,
    cancel: &CancelFlag,
    index: usize,
) -> PageResult {
    let page_num = index + 1;
    let start = Instant::now();

    let image = match renderer.render_page(index).await {
        Ok(img) => img,
        Err(detail) => {
            warn!("page {page_num}: rendering failed: {detail}");
            return PageResult::failed(
                page_num,
                PageError::Render {
                    page: page_num,
                    detail,
                },
                0,
                start.elapsed().as_millis() as u64,
            );
        }
    };

    let data_url = match encode::encode_page(&image) {
        Ok(url) => url,
        Err(e) => {
            warn!("page {page_num}: image encoding failed: {e}");
            return PageResult::failed(
                page_num,
                PageError::Render {
                    page: page_num,
                    detail: format!("image encoding failed: {e}"),
                },
                0,
                start.elapsed().as_millis() as u64,
            );
        }
    };

    // Config validity is checked by the runner before any page work, so a
    // build failure here means the config was mutated mid-run.
    let req = match request::build_request(data_url, config) {
        Ok(r) => r,
        Err(e) => {
            return PageResult::failed(
                page_num,
                PageError::Unknown {
                    page: page_num,
                    detail: e.to_string(),
                },
                0,
                start.elapsed().as_millis() as u64,
            );
        }
    };

    let policy = RetryPolicy::new(
        config.max_attempts,
        Duration::from_millis(config.retry_base_delay_ms),
    );

    match call_with_retry(model, &req, policy, cancel).await {
        Ok((raw, attempts)) => {
            let text = postprocess::clean_translation(&raw);
            debug!(
                "page {page_num}: translated in {} attempt(s), {} chars",
                attempts,
                text.len()
            );
            PageResult::success(page_num, text, attempts, start.elapsed().as_millis() as u64)
        }
        Err((e, attempts)) => {
            warn!("page {page_num}: failed after {attempts} attempt(s): {e}");
            PageResult::failed(
                page_num,
                e.into_page_error(page_num, attempts),
                attempts,
                start.elapsed().as_millis() as u64,
            )
        }
    }
}

/// Drives one translation run over a selected page set.
///
/// Construct with [`PipelineRunner::open`] for the production pdfium +
/// OpenRouter wiring, or [`PipelineRunner::with_parts`] to inject custom
/// renderer/model implementations. Clone [`PipelineRunner::cancel_flag`]
/// before calling [`PipelineRunner::run`] to cancel from another task.
pub struct PipelineRunner {
    renderer: Arc<dyn PageRenderer>,
    model: Arc<dyn VisionModel>,
    config: TranslationConfig,
    cancel: CancelFlag,
}

impl PipelineRunner {
    /// Open a PDF and wire up the configured model client.
    pub async fn open(
        input: impl AsRef<Path>,
        config: &TranslationConfig,
    ) -> Result<Self, TranslateError> {
        let renderer = PdfiumRenderer::open(input, config.max_rendered_pixels).await?;
        let model = resolve_model_client(config)?;
        Ok(Self::with_parts(Arc::new(renderer), model, config.clone()))
    }

    /// Build a runner from explicit parts.
    pub fn with_parts(
        renderer: Arc<dyn PageRenderer>,
        model: Arc<dyn VisionModel>,
        config: TranslationConfig,
    ) -> Self {
        Self {
            renderer,
            model,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Shared cancellation flag for this run. Setting it stops the run
    /// before the next page starts, and cuts the inter-page wait short.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Execute the run to completion or cancellation.
    ///
    /// Returns `Err` only for configuration errors raised before any page
    /// is attempted; per-page failures are recorded in the output.
    pub async fn run(self) -> Result<RunOutput, TranslateError> {
        let start = Instant::now();
        request::validate_config(&self.config)?;

        let total_pages = self.renderer.page_count();
        let indices = self.config.pages.to_indices(total_pages);
        if indices.is_empty() {
            return Err(TranslateError::PageOutOfRange {
                page: first_requested_page(&self.config),
                total: total_pages,
            });
        }
        let selected = indices.len();
        info!(
            "starting run: {selected}/{total_pages} pages, model {}, target {}",
            self.config.model, self.config.target_language
        );

        let limiter = RateLimiter::new(self.config.wait_seconds);
        let cb = self.config.progress_callback.clone();
        if let Some(ref cb) = cb {
            cb.on_run_start(selected);
        }

        let mut state = RunState {
            pending: indices.into(),
            completed: Vec::with_capacity(selected),
        };

        while let Some(&index) = state.pending.front() {
            if self.cancel.is_cancelled() {
                info!(
                    "run cancelled: {} pages done, {} pending",
                    state.completed.len(),
                    state.pending.len()
                );
                break;
            }

            state.pending.pop_front();
            let page_num = index + 1;
            if let Some(ref cb) = cb {
                cb.on_page_start(page_num, selected);
            }

            let result = translate_page(
                self.renderer.as_ref(),
                self.model.as_ref(),
                &self.config,
                &self.cancel,
                index,
            )
            .await;

            let (status, attempts) = (result.status, result.attempts);
            state.completed.push(result);
            if let Some(ref cb) = cb {
                cb.on_page_complete(page_num, state.completed.len(), selected, status, attempts);
            }

            // Pace the next request; skipped after the last page.
            if !state.pending.is_empty() && !self.cancel.is_cancelled() {
                if let Some(ref cb) = cb {
                    cb.on_wait(self.config.wait_seconds);
                }
                limiter.wait(&self.cancel).await;
            }
        }

        let status = if state.pending.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Cancelled
        };

        let failed_pages: Vec<usize> = state
            .completed
            .iter()
            .filter(|p| p.status == PageStatus::Failed)
            .map(|p| p.page_num)
            .collect();
        let translated = state
            .completed
            .iter()
            .filter(|p| p.status == PageStatus::Success)
            .count();

        let text = assemble_output(&state.completed, self.config.page_headers);
        let stats = RunStats {
            total_pages,
            selected_pages: selected,
            translated_pages: translated,
            failed_pages: failed_pages.len(),
            unprocessed_pages: state.pending.len(),
            total_duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "run {:?}: {}/{} pages translated, {} failed, {}ms",
            status, translated, selected, stats.failed_pages, stats.total_duration_ms
        );
        if let Some(ref cb) = cb {
            cb.on_run_complete(&text, translated, &failed_pages);
        }

        Ok(RunOutput {
            status,
            text,
            pages: state.completed,
            failed_pages,
            stats,
        })
    }
}

/// First page the selection asks for, used in out-of-range reporting.
fn first_requested_page(config: &TranslationConfig) -> usize {
    use crate::config::PageSelection::*;
    match &config.pages {
        All => 0,
        Single(p) => *p,
        Range(s, _) => *s,
        Set(v) => v.iter().copied().min().unwrap_or(0),
    }
}

/// Resolve the model client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.model_client`): the caller constructed
///    it entirely; used as-is. This is the seam tests and custom
///    middleware use.
/// 2. **Configured key** (`config.api_key`): an OpenRouter client against
///    `config.api_base_url`.
/// 3. **Environment**: `OPENROUTER_API_KEY`, then `OPEN_ROUTER_KEY`.
fn resolve_model_client(
    config: &TranslationConfig,
) -> Result<Arc<dyn VisionModel>, TranslateError> {
    if let Some(ref client) = config.model_client {
        return Ok(Arc::clone(client));
    }

    let key = config
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENROUTER_API_KEY").ok().filter(|k| !k.is_empty()))
        .or_else(|| std::env::var("OPEN_ROUTER_KEY").ok().filter(|k| !k.is_empty()))
        .ok_or_else(|| TranslateError::ApiKeyMissing {
            base_url: config.api_base_url.clone(),
        })?;

    let client = OpenRouterClient::new(key, &config.api_base_url, config.api_timeout_secs)?;
    Ok(Arc::new(client))
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Translate a PDF file.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(RunOutput)` on completion or cancellation, even if some pages
/// failed (check `output.failed_pages`).
///
/// # Errors
/// Returns `Err(TranslateError)` only for fatal errors: missing or invalid
/// input file, invalid configuration, missing API key.
pub async fn translate(
    input: impl AsRef<Path>,
    config: &TranslationConfig,
) -> Result<RunOutput, TranslateError> {
    PipelineRunner::open(input, config).await?.run().await
}

/// Translate PDF bytes in memory.
///
/// The bytes are written to a managed [`tempfile`] that is cleaned up on
/// return or panic. Recommended when the PDF comes from an upload or an
/// in-memory buffer rather than a file on disk.
pub async fn translate_from_bytes(
    bytes: &[u8],
    config: &TranslationConfig,
) -> Result<RunOutput, TranslateError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| TranslateError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| TranslateError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` is dropped (and the file deleted) when `translate` returns.
    translate(tmp.path(), config).await
}

/// Translate a PDF and write the assembled text directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial output files.
pub async fn translate_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &TranslationConfig,
) -> Result<RunOutput, TranslateError> {
    let output = translate(input, config).await?;
    write_output(output_path, &output.text).await?;
    Ok(output)
}

/// Write assembled output text to `path` atomically.
///
/// Creates missing parent directories, writes to a sibling `.tmp` file,
/// then renames it into place, so a crash mid-write never leaves a
/// truncated output file.
pub async fn write_output(
    path: impl AsRef<Path>,
    text: &str,
) -> Result<(), TranslateError> {
    let path = path.as_ref();
    let write_failed = |e: std::io::Error| TranslateError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, text).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)?;
    Ok(())
}

/// Synchronous wrapper around [`translate`].
///
/// Creates a temporary tokio runtime internally.
pub fn translate_sync(
    input: impl AsRef<Path>,
    config: &TranslationConfig,
) -> Result<RunOutput, TranslateError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TranslateError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(translate(input, config))
}

/// Count the pages of a PDF without contacting any remote service.
///
/// The UI collaborator needs the total before offering page selection;
/// no API key is required.
pub async fn page_count(input: impl AsRef<Path>) -> Result<usize, TranslateError> {
    let renderer = PdfiumRenderer::open(input, 100).await?;
    Ok(renderer.page_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSelection;

    #[test]
    fn first_requested_page_per_selection() {
        let mut config = TranslationConfig::default();
        config.pages = PageSelection::Single(12);
        assert_eq!(first_requested_page(&config), 12);
        config.pages = PageSelection::Range(4, 9);
        assert_eq!(first_requested_page(&config), 4);
        config.pages = PageSelection::Set(vec![7, 3, 9]);
        assert_eq!(first_requested_page(&config), 3);
        config.pages = PageSelection::All;
        assert_eq!(first_requested_page(&config), 0);
    }

    #[test]
    fn missing_api_key_is_fatal() {
        // No model_client, no api_key; scrub the environment for the test.
        std::env::remove_var("OPENROUTER_API_KEY");
        std::env::remove_var("OPEN_ROUTER_KEY");
        let config = TranslationConfig::default();
        let err = resolve_model_client(&config).unwrap_err();
        assert!(matches!(err, TranslateError::ApiKeyMissing { .. }));
    }

    #[tokio::test]
    async fn write_output_is_atomic_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/book.txt");

        write_output(&path, "नमस्ते\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "नमस्ते\n");
        // No temp file left behind next to the output.
        let siblings: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(siblings, vec![std::ffi::OsString::from("book.txt")]);
    }

    #[test]
    fn configured_key_builds_a_client() {
        let config = TranslationConfig::builder().api_key("sk-test").build().unwrap();
        resolve_model_client(&config).expect("client should build from configured key");
    }
}
