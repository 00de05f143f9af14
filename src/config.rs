//! Configuration for the SVG → PNG stage.
//!
//! All stage behaviour is controlled through [`StageConfig`], built via
//! [`StageConfigBuilder`]. The config is fixed once the stage is constructed.

use crate::error::Svg2PngError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque options forwarded verbatim to the rasterizer.
pub type ConversionOptions = serde_json::Map<String, serde_json::Value>;

/// Default stage name used in error messages and log lines.
pub const DEFAULT_STAGE_NAME: &str = "svg2png";

/// Configuration for a [`crate::convert::Svg2Png`] stage.
///
/// # Example
/// ```rust
/// use edgequake_svg2png::StageConfig;
///
/// let config = StageConfig::builder()
///     .concurrency(4)
///     .verbose(false)
///     .option("width", 256)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, Some(4));
/// ```
#[derive(Clone)]
pub struct StageConfig {
    /// Name reported in every [`crate::error::StageError`]. Default: `"svg2png"`.
    pub stage_name: String,

    /// Options passed through to the rasterizer untouched. Default: empty.
    pub conversion_options: ConversionOptions,

    /// Log each converted path at INFO level. Default: true.
    ///
    /// Purely diagnostic; never changes a conversion outcome.
    pub verbose: bool,

    /// Maximum number of rasterizer calls in flight. Default: `None`.
    ///
    /// `None` processes items one at a time in arrival order. `Some(n)` lets up
    /// to `n` conversions run at once; outputs are then emitted in completion
    /// order, not arrival order.
    pub concurrency: Option<usize>,

    /// How SVG content is recognised. Default: [`SignatureMode::Heuristic`].
    pub signature_mode: SignatureMode,

    /// What to do with items the guard rejects. Default: [`UnsupportedPolicy::Fail`].
    pub unsupported_policy: UnsupportedPolicy,

    /// Reject rasterizer output that does not sniff as PNG. Default: false.
    pub verify_output: bool,

    /// Per-item progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            stage_name: DEFAULT_STAGE_NAME.to_string(),
            conversion_options: ConversionOptions::new(),
            verbose: true,
            concurrency: None,
            signature_mode: SignatureMode::default(),
            unsupported_policy: UnsupportedPolicy::default(),
            verify_output: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for StageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageConfig")
            .field("stage_name", &self.stage_name)
            .field("conversion_options", &self.conversion_options)
            .field("verbose", &self.verbose)
            .field("concurrency", &self.concurrency)
            .field("signature_mode", &self.signature_mode)
            .field("unsupported_policy", &self.unsupported_policy)
            .field("verify_output", &self.verify_output)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn StageProgressCallback>"),
            )
            .finish()
    }
}

impl StageConfig {
    /// Create a new builder for `StageConfig`.
    pub fn builder() -> StageConfigBuilder {
        StageConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`StageConfig`].
#[derive(Debug)]
pub struct StageConfigBuilder {
    config: StageConfig,
}

impl StageConfigBuilder {
    pub fn stage_name(mut self, name: impl Into<String>) -> Self {
        self.config.stage_name = name.into();
        self
    }

    pub fn conversion_options(mut self, options: ConversionOptions) -> Self {
        self.config.conversion_options = options;
        self
    }

    /// Set a single rasterizer option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config
            .conversion_options
            .insert(key.into(), value.into());
        self
    }

    pub fn verbose(mut self, v: bool) -> Self {
        self.config.verbose = v;
        self
    }

    /// Cap the number of in-flight conversions. Validated in [`Self::build`].
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = Some(n);
        self
    }

    /// Back to one-at-a-time processing.
    pub fn sequential(mut self) -> Self {
        self.config.concurrency = None;
        self
    }

    pub fn signature_mode(mut self, mode: SignatureMode) -> Self {
        self.config.signature_mode = mode;
        self
    }

    pub fn unsupported_policy(mut self, policy: UnsupportedPolicy) -> Self {
        self.config.unsupported_policy = policy;
        self
    }

    pub fn verify_output(mut self, v: bool) -> Self {
        self.config.verify_output = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StageConfig, Svg2PngError> {
        let c = &self.config;
        if c.concurrency == Some(0) {
            return Err(Svg2PngError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.stage_name.trim().is_empty() {
            return Err(Svg2PngError::InvalidConfig(
                "Stage name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the guard decides whether a buffer is SVG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureMode {
    /// Case-insensitive `<svg` search after an optional BOM and whitespace. (default)
    #[default]
    Heuristic,
    /// Parse the prologue and require the root element to be `<svg>`.
    Strict,
}

/// Handling of items that fail the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnsupportedPolicy {
    /// Abort the pipeline run. (default)
    #[default]
    Fail,
    /// Emit the item downstream unchanged.
    PassThrough,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = StageConfig::default();
        assert_eq!(c.stage_name, "svg2png");
        assert!(c.verbose);
        assert!(c.concurrency.is_none());
        assert!(c.conversion_options.is_empty());
        assert_eq!(c.signature_mode, SignatureMode::Heuristic);
        assert_eq!(c.unsupported_policy, UnsupportedPolicy::Fail);
        assert!(!c.verify_output);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = StageConfig::builder().concurrency(0).build().unwrap_err();
        assert!(err.to_string().contains("Concurrency"), "got: {err}");
    }

    #[test]
    fn empty_stage_name_is_rejected() {
        assert!(StageConfig::builder().stage_name("  ").build().is_err());
    }

    #[test]
    fn options_accumulate() {
        let c = StageConfig::builder()
            .option("width", 64)
            .option("background", "white")
            .build()
            .unwrap();
        assert_eq!(c.conversion_options["width"], serde_json::json!(64));
        assert_eq!(c.conversion_options["background"], serde_json::json!("white"));
    }

    #[test]
    fn sequential_clears_concurrency() {
        let c = StageConfig::builder().concurrency(3).sequential().build().unwrap();
        assert!(c.concurrency.is_none());
    }

    #[test]
    fn enums_serialise_lowercase() {
        assert_eq!(
            serde_json::to_string(&SignatureMode::Strict).unwrap(),
            "\"strict\""
        );
        assert_eq!(
            serde_json::to_string(&UnsupportedPolicy::PassThrough).unwrap(),
            "\"pass-through\""
        );
    }
}
