//! CLI binary for edgequake-svg2png.
//!
//! A thin shim over the library crate: reads SVG files from disk, runs them
//! through the stage with an external rasterizer, and writes the PNGs back.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_svg2png::pipeline::guard::{self, Rejected};
use edgequake_svg2png::{
    CommandRasterizer, ConversionOptions, Contents, PipelineItem, ProgressCallback, SignatureMode,
    StageConfig, StageProgressCallback, Svg2Png,
};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
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

/// Progress bar plus one log line per finished file. Works with out-of-order
/// completion (bounded concurrency).
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl StageProgressCallback for CliProgressCallback {
    fn on_item_start(&self, path: &Path) {
        self.bar.set_message(path.display().to_string());
    }

    fn on_item_complete(&self, path: &Path, png_len: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            path.display(),
            dim(&format!("{png_len} bytes")),
        ));
        self.bar.inc(1);
    }

    fn on_item_skipped(&self, path: &Path, reason: &str) {
        self.bar
            .println(format!("  {} {}  {}", dim("–"), path.display(), dim(reason)));
        self.bar.inc(1);
    }

    fn on_item_error(&self, path: &Path, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), path.display(), red(&msg)));
        self.bar.abandon();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert next to the sources
  svg2png icons/*.svg

  # Write into another directory, four conversions at a time
  svg2png --out-dir build/png --concurrency 4 icons/*.svg

  # Pass options to the rasterizer (become --width=256 --keep-aspect-ratio)
  svg2png -O width=256 -O keep-aspect-ratio assets/logo.svg

  # Use a different rasterizer program
  svg2png --command inkscape --arg=--pipe --arg=--export-type=png --arg=--export-filename=- logo.svg

  # Skip non-SVG files instead of failing
  svg2png --skip-unsupported assets/*

ENVIRONMENT VARIABLES:
  SVG2PNG_COMMAND         Rasterizer program (default: rsvg-convert)
  SVG2PNG_CONCURRENCY     Maximum conversions in flight
  SVG2PNG_OUT_DIR         Output directory
  RUST_LOG                Overrides the log filter
"#;

/// Convert SVG files to PNG through an external rasterizer.
#[derive(Parser, Debug)]
#[command(
    name = "svg2png",
    version,
    about = "Convert SVG files to PNG through an external rasterizer",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// SVG files to convert.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write PNGs here (mirroring paths relative to each input's directory)
    /// instead of next to the sources.
    #[arg(short, long, env = "SVG2PNG_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Maximum conversions in flight. Unset: one at a time, in order.
    #[arg(short, long, env = "SVG2PNG_CONCURRENCY",
          value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: Option<u64>,

    /// Rasterizer program; reads SVG on stdin, writes PNG on stdout.
    #[arg(long, env = "SVG2PNG_COMMAND", default_value = "rsvg-convert")]
    command: String,

    /// Fixed argument for the rasterizer program (repeatable).
    /// Defaults to --format=png when the program is rsvg-convert.
    #[arg(long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Rasterizer option as key=value, or a bare key for a boolean flag (repeatable).
    #[arg(short = 'O', long = "option")]
    options: Vec<String>,

    /// Name used in error messages and log lines.
    #[arg(long, default_value = "svg2png")]
    stage_name: String,

    /// Require the document root element to be <svg> instead of the quick sniff.
    #[arg(long)]
    strict: bool,

    /// Skip non-SVG inputs instead of failing.
    #[arg(long)]
    skip_unsupported: bool,

    /// Fail if the rasterizer output is not a PNG image.
    #[arg(long)]
    verify_output: bool,

    /// Disable progress bar.
    #[arg(long, env = "SVG2PNG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SVG2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SVG2PNG_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Load inputs ──────────────────────────────────────────────────────
    let loaded = load_inputs(&cli.inputs).await?;
    let (items, skipped) = if cli.skip_unsupported {
        split_unsupported(loaded, signature_mode(&cli))
    } else {
        (loaded, Vec::new())
    };

    // ── Build stage ──────────────────────────────────────────────────────
    let progress_cb = if show_progress {
        Some(CliProgressCallback::new(items.len() + skipped.len()))
    } else {
        None
    };
    for rejected in &skipped {
        let reason = rejected.reason.to_string();
        match progress_cb {
            Some(ref cb) => cb.on_item_skipped(&rejected.item.path, &reason),
            None => info!("skipping {}: {}", rejected.item.path.display(), reason),
        }
    }
    let config = build_config(&cli, progress_cb.clone().map(|cb| cb as ProgressCallback))?;
    let stage = Svg2Png::with_rasterizer(config, build_rasterizer(&cli));

    // ── Run ──────────────────────────────────────────────────────────────
    let start = Instant::now();
    let written = convert_and_write(&stage, items, cli.out_dir.as_deref()).await?;

    if let Some(cb) = progress_cb {
        cb.bar.finish_and_clear();
    }
    if !cli.quiet {
        eprintln!(
            "{}  {} written  {} skipped  {}ms",
            green("✔"),
            bold(&written.to_string()),
            skipped.len(),
            start.elapsed().as_millis(),
        );
    }

    Ok(())
}

/// Read every input into a buffer item whose base is the file's directory.
async fn load_inputs(paths: &[PathBuf]) -> Result<Vec<PipelineItem>> {
    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        items.push(PipelineItem::new(base, path.clone(), Contents::Buffer(bytes)));
    }
    Ok(items)
}

/// Set aside the inputs the stage would reject, so every item that reaches
/// the stage is one it converts.
fn split_unsupported(
    items: Vec<PipelineItem>,
    mode: SignatureMode,
) -> (Vec<PipelineItem>, Vec<Rejected>) {
    let mut accepted = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    for item in items {
        match guard::check(item, mode) {
            Ok(checked) => accepted.push(checked.into_item()),
            Err(r) => rejected.push(r),
        }
    }
    (accepted, rejected)
}

/// Run the stage and write each PNG. Returns the number of files written.
async fn convert_and_write(
    stage: &Svg2Png,
    items: Vec<PipelineItem>,
    out_dir: Option<&Path>,
) -> Result<usize> {
    let mut written = 0usize;
    let mut outputs = stage.process(stream::iter(items));

    while let Some(outcome) = outputs.next().await {
        let item = outcome.context("Conversion failed")?;
        let target = output_path(&item, out_dir);
        write_atomic(&target, &item.contents).await?;
        written += 1;
    }
    Ok(written)
}

fn signature_mode(cli: &Cli) -> SignatureMode {
    if cli.strict {
        SignatureMode::Strict
    } else {
        SignatureMode::Heuristic
    }
}

/// Map CLI args to `StageConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<StageConfig> {
    let mut builder = StageConfig::builder()
        .stage_name(&cli.stage_name)
        .verbose(!cli.quiet)
        .conversion_options(parse_options(&cli.options))
        .verify_output(cli.verify_output);

    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n as usize);
    }
    builder = builder.signature_mode(signature_mode(cli));
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn build_rasterizer(cli: &Cli) -> CommandRasterizer {
    if cli.command == "rsvg-convert" && cli.args.is_empty() {
        return CommandRasterizer::rsvg_convert();
    }
    cli.args
        .iter()
        .fold(CommandRasterizer::new(&cli.command), |r, a| r.arg(a))
}

/// Parse `-O key=value` pairs. Values that parse as JSON (numbers, booleans)
/// keep their type; everything else is a string. A bare key means `true`.
fn parse_options(raw: &[String]) -> ConversionOptions {
    let mut options = ConversionOptions::new();
    for entry in raw {
        match entry.split_once('=') {
            Some((key, value)) => {
                let value = serde_json::from_str(value)
                    .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
                options.insert(key.trim().to_string(), value);
            }
            None => {
                options.insert(entry.trim().to_string(), serde_json::Value::Bool(true));
            }
        }
    }
    options
}

fn output_path(item: &PipelineItem, out_dir: Option<&Path>) -> PathBuf {
    match out_dir {
        Some(dir) => dir.join(item.relative()),
        None => item.path.clone(),
    }
}

/// Write to a temp file next to `path`, then rename over it.
async fn write_atomic(path: &Path, contents: &Contents) -> Result<()> {
    let bytes = contents
        .as_bytes()
        .with_context(|| format!("No buffer to write for {}", path.display()))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let tmp_path = path.with_extension("png.tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to move output into place at {}", path.display()))?;
    Ok(())
}
