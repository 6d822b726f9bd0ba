//! CLI binary for shot2data.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use shot2data::{
    analyze_many, analyze_to_file, merge_and_analyze, scan_directory, AnalysisConfig,
    BatchProgressCallback, Direction, OutputFormat, ProgressCallback, TileOptions,
};
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-item log
/// lines using [indicatif]. Batches run sequentially, so events arrive in
/// order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start

        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_items: usize) {
        self.bar.set_length(total_items as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analyzing {total_items} images…"))
        ));
    }

    fn on_item_start(&self, _index: usize, _total: usize, path: &Path) {
        self.bar
            .set_message(path.file_name().unwrap_or_default().to_string_lossy().to_string());
    }

    fn on_item_complete(&self, index: usize, total: usize, path: &Path, structured: bool) {
        let kind = if structured { "json" } else { "text" };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            path.file_name().unwrap_or_default().to_string_lossy(),
            dim(kind),
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, index: usize, total: usize, path: &Path, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            path.file_name().unwrap_or_default().to_string_lossy(),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_items: usize, extracted_count: usize) {
        let failed = total_items.saturating_sub(extracted_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} images analyzed successfully",
                green("✔"),
                bold(&extracted_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images analyzed  ({} failed or skipped)",
                if failed == total_items {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&extracted_count.to_string()),
                total_items,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge a directory of screenshots and extract activity data
  shot2data ./screenshots/maria --id maria

  # Grid layout, three tiles per row, PNG composite
  shot2data ./screenshots/maria --id maria --direction horizontal --max-per-row 3 --format png

  # Analyze every screenshot separately and write results JSON
  shot2data ./screenshots/maria --each -o results.json

  # Machine-readable output for scripts
  shot2data ./screenshots/maria --id maria --json > maria.json

  # List qualifying images (no API key needed)
  shot2data ./screenshots/maria --list

  # Point at any OpenAI-compatible endpoint
  shot2data ./shots --id run1 --base-url http://localhost:11434/v1 --model llava

ENVIRONMENT VARIABLES:
  SHOT2DATA_API_KEY     API key (falls back to OPENAI_API_KEY)
  SHOT2DATA_BASE_URL    OpenAI-compatible endpoint (default: api.openai.com/v1)
  SHOT2DATA_MODEL       Override model ID

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Extract:         shot2data ./screenshots/maria --id maria
"#;

/// Tile activity screenshots and extract structured data with Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "shot2data",
    version,
    about = "Tile activity screenshots and extract structured data with Vision LLMs",
    long_about = "Merge a directory of activity screenshots into one composite image and extract \
structured activity data (distance, pace, heart rate, …) with a Vision Language Model. \
Works with OpenAI and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, OpenRouter).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing JPEG/PNG screenshots.
    input: PathBuf,

    /// Identifier naming the composite and keying the result payload.
    /// Defaults to the directory name.
    #[arg(long, env = "SHOT2DATA_ID")]
    id: Option<String>,

    /// Analyze each screenshot separately instead of merging first.
    #[arg(long)]
    each: bool,

    /// List qualifying images and exit; no API call is made.
    #[arg(long)]
    list: bool,

    /// Write results JSON to this file instead of stdout.
    #[arg(short, long, env = "SHOT2DATA_OUTPUT")]
    output: Option<PathBuf>,

    /// Output machine-readable JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Model ID (e.g. gpt-4o-mini, llava).
    #[arg(long, env = "SHOT2DATA_MODEL")]
    model: Option<String>,

    /// OpenAI-compatible endpoint base URL.
    #[arg(long, env = "SHOT2DATA_BASE_URL")]
    base_url: Option<String>,

    /// Tiling direction: vertical, horizontal.
    #[arg(long, value_enum, default_value = "vertical")]
    direction: DirectionArg,

    /// Pixel gap between adjacent tiles.
    #[arg(long, default_value_t = 10)]
    margin: u32,

    /// Wrap horizontal tiling into rows of at most this many tiles.
    #[arg(long)]
    max_per_row: Option<NonZeroUsize>,

    /// Composite format: jpeg, png.
    #[arg(long, value_enum, default_value = "jpeg")]
    format: FormatArg,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "SHOT2DATA_PROMPT")]
    prompt: Option<PathBuf>,

    /// Max model output tokens per image.
    #[arg(long, default_value_t = 1024)]
    max_tokens: usize,

    /// Sampling temperature (0.0-2.0).
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Retries per image on transient failure.
    #[arg(long, env = "SHOT2DATA_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Initial retry backoff in milliseconds.
    #[arg(long, default_value_t = 1000)]
    backoff_ms: u64,

    /// Ceiling on a single backoff delay in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    backoff_cap_ms: u64,

    /// Per-attempt API deadline in seconds.
    #[arg(long, env = "SHOT2DATA_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "SHOT2DATA_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SHOT2DATA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SHOT2DATA_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum DirectionArg {
    Vertical,
    Horizontal,
}

impl From<DirectionArg> for Direction {
    fn from(v: DirectionArg) -> Self {
        match v {
            DirectionArg::Vertical => Direction::Vertical,
            DirectionArg::Horizontal => Direction::Horizontal,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FormatArg {
    Jpeg,
    Png,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Png => OutputFormat::Png,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = cli.each && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress || cli.json {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── List-only mode ───────────────────────────────────────────────────
    if cli.list {
        let paths = scan_directory(&cli.input).context("Failed to scan directory")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&paths).context("Failed to serialise listing")?
            );
        } else {
            for path in &paths {
                println!("{}", path.display());
            }
            eprintln!("{} images", paths.len());
        }
        return Ok(());
    }

    let config = build_config(&cli, show_progress).await?;

    // ── Per-image batch mode ─────────────────────────────────────────────
    if cli.each {
        let paths = scan_directory(&cli.input).context("Failed to scan directory")?;
        anyhow::ensure!(!paths.is_empty(), "No JPEG or PNG images in {:?}", cli.input);

        if let Some(ref output_path) = cli.output {
            let stats = analyze_to_file(&paths, output_path, &config)
                .await
                .context("Batch analysis failed")?;
            if !cli.quiet {
                eprintln!(
                    "{}  {}/{} images  {}ms  →  {}",
                    if stats.failed_items == 0 {
                        green("✔")
                    } else {
                        cyan("⚠")
                    },
                    stats.extracted_items,
                    stats.total_items,
                    stats.total_duration_ms,
                    bold(&output_path.display().to_string()),
                );
            }
        } else {
            let output = analyze_many(&paths, &config)
                .await
                .context("Batch analysis failed")?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output)
                        .context("Failed to serialise output")?
                );
            } else {
                for item in &output.items {
                    println!("── {}", item.path.display());
                    match (&item.extraction, &item.error) {
                        (Some(extraction), None) => println!(
                            "{}",
                            serde_json::to_string_pretty(extraction)
                                .context("Failed to serialise extraction")?
                        ),
                        (_, Some(error)) => println!("error: {error}"),
                        _ => {}
                    }
                }
            }
        }
        return Ok(());
    }

    // ── Merge-then-analyze mode (default) ────────────────────────────────
    let identifier = match cli.id {
        Some(ref id) => id.clone(),
        None => cli
            .input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    };

    let result = merge_and_analyze(&cli.input, &identifier, &config).await;

    if cli.json {
        // Stable success/data/error envelope for script consumers.
        let envelope = match &result {
            Ok(analysis) => {
                let mut data = serde_json::Map::new();
                data.insert(
                    analysis.identifier.clone(),
                    serde_json::to_value(&analysis.extraction)
                        .context("Failed to serialise extraction")?,
                );
                serde_json::json!({
                    "success": true,
                    "data": data,
                    "composite": analysis.composite,
                })
            }
            Err(e) => serde_json::json!({
                "success": false,
                "error": e.to_string(),
            }),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&envelope).context("Failed to serialise output")?
        );
        result.map(|_| ()).context("Analysis failed")?;
        return Ok(());
    }

    let analysis = result.context("Analysis failed")?;
    if let Some(ref output_path) = cli.output {
        let json = serde_json::to_vec_pretty(&analysis).context("Failed to serialise output")?;
        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        if !cli.quiet {
            eprintln!("{}  →  {}", green("✔"), bold(&output_path.display().to_string()));
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let rendered = serde_json::to_string_pretty(&analysis.extraction)
            .context("Failed to serialise extraction")?;
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    if !cli.quiet {
        eprintln!(
            "   {} images tiled into {}x{}  →  {}",
            dim(&analysis.composite.image_count.to_string()),
            analysis.composite.width,
            analysis.composite.height,
            dim(&analysis.composite.path.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, show_progress: bool) -> Result<AnalysisConfig> {
    let prompt = if let Some(ref path) = cli.prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let tile = TileOptions {
        direction: cli.direction.clone().into(),
        margin: cli.margin,
        max_per_row: cli.max_per_row,
        format: cli.format.clone().into(),
        quality: cli.quality,
    };

    let mut builder = AnalysisConfig::builder()
        .tile(tile)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.backoff_ms)
        .retry_backoff_cap_ms(cli.backoff_cap_ms)
        .api_timeout_secs(cli.api_timeout);

    if show_progress {
        let cb = CliProgressCallback::new();
        builder = builder.progress_callback(cb as ProgressCallback);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    // Apply fields the builder doesn't have setters for here
    config.model = cli.model.clone();
    config.base_url = cli.base_url.clone();
    config.prompt = prompt;

    Ok(config)
}
