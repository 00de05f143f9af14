//! The conversion stage: guard → rasterize → rename.
//!
//! [`Svg2Png::execute`] handles exactly one item and yields exactly one
//! outcome. It is the building block for the streaming driver in
//! [`crate::stream`], and can be called directly by hosts that dispatch items
//! themselves.

use crate::config::{StageConfig, UnsupportedPolicy};
use crate::error::{FailureKind, StageError, Svg2PngError};
use crate::item::{Contents, PipelineItem};
use crate::pipeline::guard::{self, Checked, Rejected};
use crate::pipeline::rasterize::Rasterizer;
use crate::pipeline::rename;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// An SVG → PNG stage bound to one configuration and one rasterizer.
///
/// Cheap to clone; clones share the config and the rasterizer.
#[derive(Clone)]
pub struct Svg2Png {
    config: Arc<StageConfig>,
    rasterizer: Arc<dyn Rasterizer>,
}

impl Svg2Png {
    pub fn new(config: StageConfig, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            config: Arc::new(config),
            rasterizer,
        }
    }

    /// Build a stage from any concrete rasterizer.
    pub fn with_rasterizer<R: Rasterizer + 'static>(config: StageConfig, rasterizer: R) -> Self {
        Self::new(config, Arc::new(rasterizer))
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Stage identity used in errors and logs.
    pub fn name(&self) -> &str {
        &self.config.stage_name
    }

    /// Convert one item.
    ///
    /// # Returns
    /// `Ok` with a new item whose path ends in `.png` and whose contents are
    /// the rasterizer output; `base` is carried over. With
    /// [`UnsupportedPolicy::PassThrough`], items the guard rejects come back
    /// unchanged.
    ///
    /// # Errors
    /// Every error is fatal to the pipeline run:
    /// - the payload is not a buffer, or is not SVG
    /// - the rasterizer failed (or, with `verify_output`, returned non-PNG bytes)
    pub async fn execute(&self, item: PipelineItem) -> Result<PipelineItem, StageError> {
        let Checked { base, path, svg } = match guard::check(item, self.config.signature_mode) {
            Ok(checked) => checked,
            Err(rejected) => return self.reject(rejected),
        };

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_item_start(&path);
        }
        debug!("{}: rasterizing {} ({} bytes)", self.name(), path.display(), svg.len());

        let png = match self
            .rasterizer
            .rasterize(svg, &self.config.conversion_options)
            .await
        {
            Ok(png) => png,
            Err(e) => {
                return Err(self.fail(
                    &path,
                    FailureKind::Conversion {
                        message: e.to_string(),
                    },
                ))
            }
        };

        if self.config.verify_output && !is_png(&png) {
            return Err(self.fail(
                &path,
                FailureKind::Conversion {
                    message: format!("rasterizer output is not a PNG image ({} bytes)", png.len()),
                },
            ));
        }

        let converted = PipelineItem {
            base,
            path: rename::rename(&path),
            contents: Contents::Buffer(png),
        };

        if self.config.verbose {
            info!("{}: converted {}", self.name(), converted.relative().display());
        }
        if let Some(ref cb) = self.config.progress_callback {
            let len = converted.contents.as_bytes().map_or(0, <[u8]>::len);
            cb.on_item_complete(&converted.path, len);
        }

        Ok(converted)
    }

    /// Convert an in-memory SVG document.
    pub async fn convert_bytes(
        &self,
        path: impl Into<PathBuf>,
        svg: impl Into<Vec<u8>>,
    ) -> Result<PipelineItem, StageError> {
        self.execute(PipelineItem::from_bytes(path, svg)).await
    }

    fn reject(&self, rejected: Rejected) -> Result<PipelineItem, StageError> {
        let Rejected { item, reason } = rejected;
        match self.config.unsupported_policy {
            UnsupportedPolicy::PassThrough => {
                debug!(
                    "{}: passing through {}: {}",
                    self.name(),
                    item.path.display(),
                    reason
                );
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_item_skipped(&item.path, &reason.to_string());
                }
                Ok(item)
            }
            UnsupportedPolicy::Fail => Err(self.fail(&item.path, reason.into())),
        }
    }

    pub(crate) fn fail(&self, path: &Path, kind: FailureKind) -> StageError {
        let err = StageError::new(self.name(), path, kind);
        debug!("{}", err);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_item_error(path, &err.to_string());
        }
        err
    }
}

/// Blocking wrapper around [`Svg2Png::execute`].
///
/// Creates a temporary tokio runtime internally; do not call from async code.
pub fn convert_sync(stage: &Svg2Png, item: PipelineItem) -> Result<PipelineItem, Svg2PngError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Svg2PngError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    Ok(runtime.block_on(stage.execute(item))?)
}

fn is_png(bytes: &[u8]) -> bool {
    matches!(image::guess_format(bytes), Ok(ImageFormat::Png))
}
