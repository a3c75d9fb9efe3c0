//! Integration tests for the translation pipeline.
//!
//! These drive [`PipelineRunner`] end-to-end with a scripted renderer and
//! model client, so they cover the run semantics (ordering, retry
//! accounting, pacing, cancellation, output assembly) without touching
//! pdfium or any remote API, and run in CI.

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use pdf2lang::{
    CancelFlag, ModelCallError, PageRenderer, PageStatus, PipelineRunner, ProgressCallback,
    RunStatus, TranslationConfig, TranslationProgressCallback, VisionModel,
};
use pdf2lang::config::PageSelection;
use pdf2lang::pipeline::request::TranslationRequest;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

// ── Scripted doubles ─────────────────────────────────────────────────────────

/// Renderer producing a 1×1 image for every page, with optional per-page
/// failures (0-based indices).
struct MockRenderer {
    pages: usize,
    fail: HashSet<usize>,
}

impl MockRenderer {
    fn new(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            fail: HashSet::new(),
        })
    }

    fn failing(pages: usize, fail: impl IntoIterator<Item = usize>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            fail: fail.into_iter().collect(),
        })
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    fn page_count(&self) -> usize {
        self.pages
    }

    async fn render_page(&self, index: usize) -> Result<DynamicImage, String> {
        if self.fail.contains(&index) {
            return Err(format!("scripted render failure on page {}", index + 1));
        }
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            1,
            1,
            Rgba([0, 0, 0, 255]),
        )))
    }
}

/// Model returning a scripted sequence of responses, one per call.
struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, ModelCallError>>>,
    calls: AtomicU32,
}

impl ScriptedModel {
    fn new(
        responses: impl IntoIterator<Item = Result<String, ModelCallError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    async fn translate_page(
        &self,
        _request: &TranslationRequest,
    ) -> Result<String, ModelCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ModelCallError::Malformed {
                    detail: "script exhausted".into(),
                })
            })
    }
}

fn rate_limited() -> ModelCallError {
    ModelCallError::RateLimited {
        retry_after_secs: None,
    }
}

/// Config with all delays zeroed so tests run instantly.
fn fast_config() -> TranslationConfig {
    TranslationConfig::builder()
        .model("m1")
        .target_language("Hindi")
        .wait_seconds(0.0)
        .retry_base_delay_ms(0)
        .build()
        .unwrap()
}

/// Counts wait notifications from the runner.
#[derive(Default)]
struct WaitCounter {
    waits: AtomicUsize,
}

impl TranslationProgressCallback for WaitCounter {
    fn on_wait(&self, _seconds: f64) {
        self.waits.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Ordering and aggregation ─────────────────────────────────────────────────

#[tokio::test]
async fn completed_results_follow_input_order() {
    let renderer = MockRenderer::new(5);
    let model = ScriptedModel::new([
        Ok("one".to_string()),
        Ok("two".to_string()),
        Ok("three".to_string()),
    ]);
    let mut config = fast_config();
    config.pages = PageSelection::Set(vec![1, 2, 3]);

    let runner = PipelineRunner::with_parts(renderer, model.clone(), config);
    let output = runner.run().await.unwrap();

    assert_eq!(output.status, RunStatus::Completed);
    let nums: Vec<usize> = output.pages.iter().map(|p| p.page_num).collect();
    assert_eq!(nums, vec![1, 2, 3]);
    let texts: Vec<&str> = output
        .pages
        .iter()
        .map(|p| p.text.as_deref().unwrap())
        .collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
    assert_eq!(output.stats.translated_pages, 3);
    assert_eq!(output.stats.failed_pages, 0);
    assert_eq!(model.calls(), 3);
}

// ── Retry accounting ─────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_failures_consume_all_attempts() {
    let renderer = MockRenderer::new(1);
    let model = ScriptedModel::new([
        Err(rate_limited()),
        Err(rate_limited()),
        Err(rate_limited()),
    ]);
    let mut config = fast_config();
    config.max_attempts = 3;

    let output = PipelineRunner::with_parts(renderer, model.clone(), config)
        .run()
        .await
        .unwrap();

    assert_eq!(model.calls(), 3);
    let page = &output.pages[0];
    assert_eq!(page.status, PageStatus::Failed);
    assert_eq!(page.attempts, 3);
    assert_eq!(page.error.as_ref().unwrap().kind(), "RateLimited");
}

#[tokio::test]
async fn non_transient_failure_uses_one_attempt() {
    let renderer = MockRenderer::new(1);
    let model = ScriptedModel::new([Err(ModelCallError::ModelNotFound {
        model: "m1".into(),
    })]);
    let mut config = fast_config();
    config.max_attempts = 3;

    let output = PipelineRunner::with_parts(renderer, model.clone(), config)
        .run()
        .await
        .unwrap();

    assert_eq!(model.calls(), 1);
    let page = &output.pages[0];
    assert_eq!(page.attempts, 1);
    assert_eq!(page.error.as_ref().unwrap().kind(), "ModelNotFound");
}

#[tokio::test]
async fn network_exhaustion_records_network_kind() {
    let renderer = MockRenderer::new(1);
    let model = ScriptedModel::new([
        Err(ModelCallError::Network {
            detail: "connection reset".into(),
        }),
        Err(ModelCallError::Timeout { secs: 120 }),
    ]);
    let mut config = fast_config();
    config.max_attempts = 2;

    let output = PipelineRunner::with_parts(renderer, model.clone(), config)
        .run()
        .await
        .unwrap();

    assert_eq!(model.calls(), 2);
    assert_eq!(output.pages[0].error.as_ref().unwrap().kind(), "NetworkError");
}

#[tokio::test]
async fn transient_then_success_recovers() {
    let renderer = MockRenderer::new(1);
    let model = ScriptedModel::new([Err(rate_limited()), Ok("recovered".to_string())]);
    let mut config = fast_config();
    config.max_attempts = 3;

    let output = PipelineRunner::with_parts(renderer, model.clone(), config)
        .run()
        .await
        .unwrap();

    let page = &output.pages[0];
    assert_eq!(page.status, PageStatus::Success);
    assert_eq!(page.attempts, 2);
    assert_eq!(page.text.as_deref(), Some("recovered"));
}

// ── Rate limiter pacing ──────────────────────────────────────────────────────

#[tokio::test]
async fn wait_invoked_n_minus_one_times() {
    let counter = Arc::new(WaitCounter::default());
    let renderer = MockRenderer::new(3);
    let model = ScriptedModel::new([
        Ok("a".to_string()),
        Ok("b".to_string()),
        Ok("c".to_string()),
    ]);
    let mut config = fast_config();
    config.progress_callback = Some(counter.clone() as ProgressCallback);

    PipelineRunner::with_parts(renderer, model, config)
        .run()
        .await
        .unwrap();

    assert_eq!(counter.waits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn no_wait_for_single_page() {
    let counter = Arc::new(WaitCounter::default());
    let renderer = MockRenderer::new(1);
    let model = ScriptedModel::new([Ok("only".to_string())]);
    let mut config = fast_config();
    config.progress_callback = Some(counter.clone() as ProgressCallback);

    PipelineRunner::with_parts(renderer, model, config)
        .run()
        .await
        .unwrap();

    assert_eq!(counter.waits.load(Ordering::SeqCst), 0);
}

/// Captures the final run event.
#[derive(Default)]
struct FinalEventCapture {
    text: Mutex<String>,
    failed: Mutex<Vec<usize>>,
}

impl TranslationProgressCallback for FinalEventCapture {
    fn on_run_complete(&self, text: &str, _translated: usize, failed_pages: &[usize]) {
        *self.text.lock().unwrap() = text.to_string();
        *self.failed.lock().unwrap() = failed_pages.to_vec();
    }
}

#[tokio::test]
async fn final_event_carries_assembled_text() {
    let capture = Arc::new(FinalEventCapture::default());
    let renderer = MockRenderer::new(2);
    let model = ScriptedModel::new([
        Ok("one".to_string()),
        Err(ModelCallError::ModelNotFound {
            model: "m1".into(),
        }),
    ]);
    let mut config = fast_config();
    config.progress_callback = Some(capture.clone() as ProgressCallback);

    let output = PipelineRunner::with_parts(renderer, model, config)
        .run()
        .await
        .unwrap();

    // A consumer of the progress interface alone sees the same output.
    assert_eq!(*capture.text.lock().unwrap(), output.text);
    assert_eq!(
        *capture.text.lock().unwrap(),
        "one\n[PAGE 2 FAILED: ModelNotFound]\n"
    );
    assert_eq!(*capture.failed.lock().unwrap(), vec![2]);
}

// ── Cancellation ─────────────────────────────────────────────────────────────

/// Cancels the run once `after` pages have completed.
struct CancelAfter {
    after: usize,
    flag: OnceLock<CancelFlag>,
}

impl TranslationProgressCallback for CancelAfter {
    fn on_page_complete(
        &self,
        _page_num: usize,
        pages_done: usize,
        _total_pages: usize,
        _status: PageStatus,
        _attempts: u32,
    ) {
        if pages_done >= self.after {
            if let Some(flag) = self.flag.get() {
                flag.cancel();
            }
        }
    }
}

#[tokio::test]
async fn cancellation_preserves_completed_pages() {
    let canceller = Arc::new(CancelAfter {
        after: 2,
        flag: OnceLock::new(),
    });
    let renderer = MockRenderer::new(4);
    let model = ScriptedModel::new([
        Ok("a".to_string()),
        Ok("b".to_string()),
        Ok("never reached".to_string()),
    ]);
    let mut config = fast_config();
    config.progress_callback = Some(canceller.clone() as ProgressCallback);

    let runner = PipelineRunner::with_parts(renderer, model.clone(), config);
    canceller.flag.set(runner.cancel_flag()).ok();
    let output = runner.run().await.unwrap();

    assert_eq!(output.status, RunStatus::Cancelled);
    assert_eq!(output.pages.len(), 2);
    assert_eq!(
        output.pages.iter().map(|p| p.page_num).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(output.stats.unprocessed_pages, 2);
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn cancellation_before_first_page_yields_empty_text() {
    let renderer = MockRenderer::new(3);
    let model = ScriptedModel::new([Ok("never".to_string())]);
    let config = fast_config();

    let runner = PipelineRunner::with_parts(renderer, model.clone(), config);
    runner.cancel_flag().cancel();
    let output = runner.run().await.unwrap();

    assert_eq!(output.status, RunStatus::Cancelled);
    assert!(output.pages.is_empty());
    assert_eq!(output.text, "");
    assert_eq!(output.stats.unprocessed_pages, 3);
    assert_eq!(model.calls(), 0);
}

// ── Output assembly ──────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_page_leaves_gap_marker_in_position() {
    let renderer = MockRenderer::new(3);
    let model = ScriptedModel::new([
        Ok("one".to_string()),
        Err(ModelCallError::BadRequest {
            detail: "image too large".into(),
        }),
        Ok("three".to_string()),
    ]);
    let config = fast_config();

    let output = PipelineRunner::with_parts(renderer, model, config)
        .run()
        .await
        .unwrap();

    let lines: Vec<&str> = output.text.lines().collect();
    assert_eq!(lines, vec!["one", "[PAGE 2 FAILED: BadRequest]", "three"]);
    assert_eq!(output.failed_pages, vec![2]);
}

/// The worked example: model "m1", auto-detect source, Hindi target,
/// pages 1–2, no wait, 2 attempts; page 1 succeeds immediately, page 2
/// is rate-limited on both attempts.
#[tokio::test]
async fn hindi_run_with_rate_limited_second_page() {
    let renderer = MockRenderer::new(2);
    let model = ScriptedModel::new([
        Ok("नमस्ते".to_string()),
        Err(rate_limited()),
        Err(rate_limited()),
    ]);
    let mut config = fast_config();
    config.max_attempts = 2;
    config.pages = PageSelection::Set(vec![1, 2]);

    let output = PipelineRunner::with_parts(renderer, model.clone(), config)
        .run()
        .await
        .unwrap();

    assert_eq!(model.calls(), 3);

    let p1 = &output.pages[0];
    assert_eq!(p1.status, PageStatus::Success);
    assert_eq!(p1.text.as_deref(), Some("नमस्ते"));
    assert_eq!(p1.attempts, 1);

    let p2 = &output.pages[1];
    assert_eq!(p2.status, PageStatus::Failed);
    assert_eq!(p2.error.as_ref().unwrap().kind(), "RateLimited");
    assert_eq!(p2.attempts, 2);

    assert_eq!(output.text, "नमस्ते\n[PAGE 2 FAILED: RateLimited]\n");
}

// ── Fatal errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_target_language_aborts_before_any_call() {
    let renderer = MockRenderer::new(2);
    let model = ScriptedModel::new([Ok("unused".to_string())]);
    let mut config = fast_config();
    config.target_language = String::new();

    let err = PipelineRunner::with_parts(renderer, model.clone(), config)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        pdf2lang::TranslateError::InvalidConfig(_)
    ));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn out_of_range_selection_is_fatal() {
    let renderer = MockRenderer::new(3);
    let model = ScriptedModel::new([]);
    let mut config = fast_config();
    config.pages = PageSelection::Single(12);

    let err = PipelineRunner::with_parts(renderer, model, config)
        .run()
        .await
        .unwrap_err();

    match err {
        pdf2lang::TranslateError::PageOutOfRange { page, total } => {
            assert_eq!(page, 12);
            assert_eq!(total, 3);
        }
        other => panic!("expected PageOutOfRange, got {other:?}"),
    }
}

// ── Per-page isolation ───────────────────────────────────────────────────────

#[tokio::test]
async fn render_failure_never_contacts_model() {
    let renderer = MockRenderer::failing(2, [0]);
    let model = ScriptedModel::new([Ok("two".to_string())]);
    let config = fast_config();

    let output = PipelineRunner::with_parts(renderer, model.clone(), config)
        .run()
        .await
        .unwrap();

    let p1 = &output.pages[0];
    assert_eq!(p1.status, PageStatus::Failed);
    assert_eq!(p1.error.as_ref().unwrap().kind(), "RenderError");
    assert_eq!(p1.attempts, 0);

    // Page 2 proceeds normally; only one model call was ever made.
    assert_eq!(output.pages[1].status, PageStatus::Success);
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn model_not_found_does_not_short_circuit_later_pages() {
    let renderer = MockRenderer::new(2);
    let model = ScriptedModel::new([
        Err(ModelCallError::ModelNotFound {
            model: "m1".into(),
        }),
        Err(ModelCallError::ModelNotFound {
            model: "m1".into(),
        }),
    ]);
    let config = fast_config();

    let output = PipelineRunner::with_parts(renderer, model.clone(), config)
        .run()
        .await
        .unwrap();

    // Each page fails independently; the aggregate list shows the pattern.
    assert_eq!(output.status, RunStatus::Completed);
    assert_eq!(output.failed_pages, vec![1, 2]);
    assert_eq!(model.calls(), 2);
}

// ── Response cleanup within the pipeline ─────────────────────────────────────

#[tokio::test]
async fn fenced_and_labelled_responses_are_cleaned() {
    let renderer = MockRenderer::new(1);
    let model = ScriptedModel::new([Ok(
        "```\n[DETECTED: Gujarati]\nThis is a book.\n```".to_string()
    )]);
    let config = fast_config();

    let output = PipelineRunner::with_parts(renderer, model, config)
        .run()
        .await
        .unwrap();

    assert_eq!(output.pages[0].text.as_deref(), Some("This is a book."));
    assert_eq!(output.text, "This is a book.\n");
}
