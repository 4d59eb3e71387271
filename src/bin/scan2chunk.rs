//! CLI binary for scan2chunk.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, wires up the OCR backends, and prints a run summary.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use scan2chunk::{
    process_directory, ChunkStore, ExtractionConfig, OcrStack, RemoteOcrEngine, SplitStrategy,
    UNKNOWN,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
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

// ── CLI definition ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Midpoint,
    Valley,
    EqualArea,
}

impl From<StrategyArg> for SplitStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Midpoint => SplitStrategy::Midpoint,
            StrategyArg::Valley => SplitStrategy::Valley,
            StrategyArg::EqualArea => SplitStrategy::EqualArea,
        }
    }
}

/// Recover labelled text chunks from scanned multi-column census pages.
#[derive(Parser, Debug)]
#[command(name = "scan2chunk", version, about)]
struct Cli {
    /// Directory holding one sub-directory of page images per source document.
    #[arg(default_value = "data")]
    data_dir: PathBuf,

    /// Directory for per-page chunk files.
    #[arg(long, default_value = "output_chunks")]
    output_dir: PathBuf,

    /// Directory for aggregated per-entity documents.
    #[arg(long, default_value = "country_chunks")]
    aggregate_dir: PathBuf,

    /// Delete previous output before processing.
    #[arg(long)]
    reset: bool,

    /// Resolution the pages were rasterised at (dots per inch).
    #[arg(long, default_value_t = 200)]
    dpi: u32,

    /// Column gutter detection strategy.
    #[arg(long, value_enum, default_value_t = StrategyArg::Valley)]
    strategy: StrategyArg,

    /// Header band height as a fraction of page height.
    #[arg(long, default_value_t = 0.12)]
    header_ratio: f32,

    /// Split each column into top/bottom halves before OCR (dense layouts).
    #[arg(long)]
    split_rows: bool,

    /// Valley acceptance ratio against the central band's mean density.
    #[arg(long, default_value_t = 0.6)]
    valley_ratio: f32,

    /// Physical column overlap at the cut, in centimetres.
    #[arg(long, default_value_t = 0.5)]
    overlap_cm: f32,

    /// Minimum fuzzy country-match score (0-100).
    #[arg(long, default_value_t = 80)]
    fuzzy_threshold: u8,

    /// File with one curated country name per line (overrides the default list).
    #[arg(long)]
    countries: Option<PathBuf>,

    /// Comma-separated year labels that force a plain midpoint split.
    #[arg(long, value_delimiter = ',')]
    legacy_midpoint_years: Vec<String>,

    /// Merge sources: aggregate by (country, year) instead of (country, year, source).
    #[arg(long)]
    merge_sources: bool,

    /// Primary OCR endpoint URL.
    #[arg(long, env = "OCR_ENDPOINT")]
    ocr_endpoint: String,

    /// Fallback OCR endpoint URL, tried when the primary fails.
    #[arg(long, env = "OCR_FALLBACK_ENDPOINT")]
    ocr_fallback_endpoint: Option<String>,

    /// Bearer token for the OCR endpoints.
    #[arg(long, env = "OCR_API_KEY")]
    ocr_api_key: Option<String>,

    /// Per-OCR-call timeout in seconds.
    #[arg(long, default_value_t = 60)]
    ocr_timeout: u64,

    /// Number of source documents processed concurrently.
    #[arg(long, default_value_t = 4)]
    source_concurrency: usize,

    /// Maximum outstanding OCR calls across all sources.
    #[arg(long, default_value_t = 8)]
    ocr_concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scan2chunk=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let started = Instant::now();

    let config = build_config(&cli).await?;
    let stack = build_stack(&cli)?;

    let store = ChunkStore::new(&config);
    if cli.reset {
        store.reset().await.context("failed to reset output directories")?;
    } else {
        store
            .ensure_dirs()
            .await
            .context("failed to create output directories")?;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Processing {}…", cli.data_dir.display()));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let output = process_directory(&cli.data_dir, &stack, &config, Some(&store))
        .await
        .context("batch processing failed")?;

    spinner.finish_and_clear();
    print_summary(&output, started.elapsed().as_secs_f64());
    Ok(())
}

async fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .split_strategy(cli.strategy.into())
        .header_ratio(cli.header_ratio)
        .split_rows(cli.split_rows)
        .valley_accept_ratio(cli.valley_ratio)
        .overlap_cm(cli.overlap_cm)
        .fuzzy_threshold(cli.fuzzy_threshold)
        .legacy_midpoint_years(cli.legacy_midpoint_years.clone())
        .group_by_source(!cli.merge_sources)
        .ocr_timeout_secs(cli.ocr_timeout)
        .source_concurrency(cli.source_concurrency)
        .ocr_concurrency(cli.ocr_concurrency)
        .output_dir(cli.output_dir.clone())
        .aggregate_dir(cli.aggregate_dir.clone());

    if let Some(ref path) = cli.countries {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read country list {}", path.display()))?;
        let countries: Vec<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();
        builder = builder.countries(countries);
    }

    Ok(builder.build()?)
}

fn build_stack(cli: &Cli) -> Result<OcrStack> {
    // The HTTP-level timeout is padded past the pipeline's own per-call
    // timeout so the pipeline deadline always fires first.
    let http_timeout = Duration::from_secs(cli.ocr_timeout + 30);

    let primary = RemoteOcrEngine::new(
        "primary",
        cli.ocr_endpoint.clone(),
        cli.ocr_api_key.clone(),
        http_timeout,
    )
    .context("failed to build primary OCR engine")?;
    let mut stack = OcrStack::new(Arc::new(primary));

    if let Some(ref endpoint) = cli.ocr_fallback_endpoint {
        let fallback = RemoteOcrEngine::new(
            "fallback",
            endpoint.clone(),
            cli.ocr_api_key.clone(),
            http_timeout,
        )
        .context("failed to build fallback OCR engine")?;
        stack = stack.with_fallback(Arc::new(fallback));
    }

    Ok(stack)
}

fn print_summary(output: &scan2chunk::BatchOutput, elapsed_secs: f64) {
    let relabelled: usize = output.reports.iter().map(|r| r.relabels.len()).sum();
    let failures: usize = output.reports.iter().map(|r| r.failures.len()).sum();
    let unresolved = output
        .records
        .iter()
        .filter(|r| r.country == UNKNOWN || r.year == UNKNOWN)
        .count();

    println!("{}", bold("scan2chunk summary"));
    println!(
        "  {} {} sources, {} page chunks, {} aggregated documents",
        green("✓"),
        output.reports.len(),
        output.records.len(),
        output.documents.len(),
    );
    println!(
        "  {} {} labels repaired by interpolation",
        green("✓"),
        relabelled
    );
    if unresolved > 0 {
        println!(
            "  {} {} chunks remain unclassified ({})",
            red("!"),
            unresolved,
            UNKNOWN
        );
    }
    if failures > 0 {
        println!("  {} {} page/region failures (see log)", red("!"), failures);
    }
    println!("  {}", dim(&format!("{elapsed_secs:.1}s elapsed")));
}
