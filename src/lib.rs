//! # edgequake-svg2png
//!
//! A pipeline stage that turns in-memory SVG items into PNG items.
//!
//! Each [`PipelineItem`] flowing through the stage is checked by a cheap guard
//! (is the payload a full buffer? does it look like SVG?), handed to a
//! pluggable [`Rasterizer`], and re-emitted with its path renamed to `.png`.
//! Any failure is fatal to the run and carries the stage name, so it is
//! traceable in a multi-stage pipeline.
//!
//! ## Pipeline Overview
//!
//! ```text
//! items ──▶ guard ──▶ admission ──▶ rasterize ──▶ rename ──▶ outcomes
//!           (sniff)   (≤ N slots)   (external)    (.png)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_svg2png::{CommandRasterizer, StageConfig, Svg2Png};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StageConfig::builder().concurrency(4).build()?;
//!     let stage = Svg2Png::with_rasterizer(config, CommandRasterizer::rsvg_convert());
//!
//!     let png = stage.convert_bytes("logo.svg", "<svg width=\"8\" height=\"8\"/>").await?;
//!     assert_eq!(png.path, std::path::PathBuf::from("logo.png"));
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! With no `concurrency` set, items are converted one at a time and emitted in
//! input order. With `concurrency(n)`, at most `n` rasterizer calls are in
//! flight; outcomes are emitted in completion order.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `svg2png` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod item;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionOptions, SignatureMode, StageConfig, StageConfigBuilder, UnsupportedPolicy,
};
pub use convert::{convert_sync, Svg2Png};
pub use error::{FailureKind, GuardError, RasterizeError, StageError, Svg2PngError};
pub use item::{ByteStream, Contents, PipelineItem};
pub use pipeline::rasterize::{from_fn, CommandRasterizer, FnRasterizer, Rasterizer};
pub use progress::{NoopProgressCallback, ProgressCallback, StageProgressCallback};
pub use stream::{ItemStream, Outcome};
