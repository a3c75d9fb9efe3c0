//! CLI binary for pdf2lang.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `TranslationConfig`, renders a progress bar, and prints or writes the
//! assembled translation.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2lang::{
    page_count, write_output, PageSelection, PageStatus, PipelineRunner, ProgressCallback,
    TranslationConfig, TranslationProgressCallback,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Translating");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl TranslationProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(
        &self,
        page_num: usize,
        _pages_done: usize,
        _total_pages: usize,
        status: PageStatus,
        attempts: u32,
    ) {
        let line = match status {
            PageStatus::Success if attempts > 1 => format!(
                "{} page {page_num} {}",
                green("✓"),
                dim(&format!("({attempts} attempts)"))
            ),
            PageStatus::Success => format!("{} page {page_num}", green("✓")),
            PageStatus::Failed => format!(
                "{} page {page_num} {}",
                red("✗"),
                dim(&format!("(after {attempts} attempts)"))
            ),
            PageStatus::Skipped => format!("{} page {page_num} skipped", dim("-")),
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_wait(&self, seconds: f64) {
        self.bar
            .set_message(format!("waiting {seconds:.0}s before next page"));
    }

    fn on_run_complete(&self, _text: &str, _translated: usize, _failed_pages: &[usize]) {
        self.bar.finish_and_clear();
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Translate a PDF page-by-page using a vision language model.
#[derive(Parser, Debug)]
#[command(name = "pdf2lang", version, about)]
struct Cli {
    /// Input PDF file
    input: PathBuf,

    /// Output file; prints to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Model identifier, e.g. openai/gpt-4o or anthropic/claude-3.5-sonnet
    #[arg(short, long, default_value = "openai/gpt-4o")]
    model: String,

    /// Source language, or "auto" to detect it
    #[arg(long = "from", default_value = "auto")]
    source_language: String,

    /// Target language
    #[arg(long = "to", default_value = "English")]
    target_language: String,

    /// Pages to translate: "all", "5", "2-10", or "1,3,5"
    #[arg(short, long, default_value = "all")]
    pages: String,

    /// Seconds to wait between pages (raise for free-tier models)
    #[arg(short, long, default_value_t = 15.0)]
    wait: f64,

    /// Maximum model calls per page
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// API key; falls back to the environment when omitted
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Per-call HTTP timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Prefix each page with a "--- Page N ---" header
    #[arg(long)]
    page_headers: bool,

    /// Print the page count and exit (no API key needed)
    #[arg(long)]
    count: bool,

    /// Suppress the progress bar
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.count {
        let total = page_count(&cli.input).await?;
        println!("{total}");
        return Ok(());
    }

    let progress: Option<ProgressCallback> = if cli.quiet {
        None
    } else {
        Some(CliProgressCallback::new() as ProgressCallback)
    };

    let mut builder = TranslationConfig::builder()
        .model(&cli.model)
        .source_language(&cli.source_language)
        .target_language(&cli.target_language)
        .pages(parse_pages(&cli.pages)?)
        .wait_seconds(cli.wait)
        .max_attempts(cli.max_attempts)
        .api_timeout_secs(cli.timeout)
        .page_headers(cli.page_headers);
    if let Some(key) = &cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build()?;

    let runner = PipelineRunner::open(&cli.input, &config)
        .await
        .with_context(|| format!("failed to open '{}'", cli.input.display()))?;

    // Ctrl-C requests cooperative cancellation; already-translated pages
    // are kept and assembled.
    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", bold("Cancelling after the current page…"));
            cancel.cancel();
        }
    });

    let output = runner.run().await?;

    match &cli.output {
        Some(path) => {
            write_output(path, &output.text)
                .await
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            eprintln!("{} wrote {}", green("✓"), path.display());
        }
        None => print!("{}", output.text),
    }

    eprintln!(
        "{} {}/{} pages translated in {:.1}s",
        bold("Done:"),
        output.stats.translated_pages,
        output.stats.selected_pages,
        output.stats.total_duration_ms as f64 / 1000.0
    );
    if !output.failed_pages.is_empty() {
        eprintln!(
            "{} failed pages: {}",
            red("!"),
            output
                .failed_pages
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    if output.stats.unprocessed_pages > 0 {
        eprintln!(
            "{} cancelled with {} pages left",
            red("!"),
            output.stats.unprocessed_pages
        );
    }

    Ok(())
}

/// Parse a page specification: "all", "5", "2-10", or "1,3,5".
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("all") {
        return Ok(PageSelection::All);
    }
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start.trim().parse().context("invalid range start")?;
        let end: usize = end.trim().parse().context("invalid range end")?;
        if start == 0 || end < start {
            bail!("invalid page range '{s}' (pages are 1-indexed)");
        }
        return Ok(PageSelection::Range(start, end));
    }
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| p.trim().parse::<usize>())
            .collect::<Result<_, _>>()
            .with_context(|| format!("invalid page list '{s}'"))?;
        if pages.iter().any(|&p| p == 0) {
            bail!("pages are 1-indexed; 0 is not a valid page");
        }
        return Ok(PageSelection::Set(pages));
    }
    let page: usize = s.parse().with_context(|| format!("invalid page spec '{s}'"))?;
    if page == 0 {
        bail!("pages are 1-indexed; 0 is not a valid page");
    }
    Ok(PageSelection::Single(page))
}
