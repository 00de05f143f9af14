//! Error types for the edgequake-svg2png library.
//!
//! Three layers of errors reflect three layers of the stage:
//!
//! * [`GuardError`]: the item was rejected before any conversion work began
//!   (wrong representation or not SVG content).
//!
//! * [`RasterizeError`]: the external rasterizer failed. Its `Display` text is
//!   the message that ends up in "Error while converting the image: …".
//!
//! * [`StageError`]: what the host pipeline sees. It carries the stage name
//!   and the item path so a failure is traceable in a multi-stage pipeline.
//!   Every `StageError` is fatal to the run.
//!
//! [`Svg2PngError`] is the top-level error for configuration and the blocking
//! entry points.

use std::path::PathBuf;
use thiserror::Error;

/// Precondition failures detected by the item guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// The payload is not a fully materialised byte buffer.
    #[error("Streams are not supported by the underlying conversion library.")]
    UnsupportedRepresentation,

    /// The payload does not look like SVG markup.
    #[error("Source is not a SVG file.")]
    UnsupportedFormat,
}

/// Failure reported by a [`crate::pipeline::rasterize::Rasterizer`].
#[derive(Debug, Error)]
pub enum RasterizeError {
    /// The rasterizer rejected the input.
    #[error("{0}")]
    Failed(String),

    /// The external program could not be started or its pipes failed.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external program exited unsuccessfully.
    #[error("'{program}' exited with status {code:?}: {stderr}")]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl RasterizeError {
    /// Shorthand for [`RasterizeError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        RasterizeError::Failed(message.into())
    }
}

/// What went wrong with a single item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// Rejected by the guard.
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// The rasterizer failed, or produced output that is not PNG.
    #[error("Error while converting the image: {message}")]
    Conversion { message: String },

    /// The conversion task itself died (panic inside the rasterizer).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A fatal, stage-attributed error delivered to the host pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage}: {kind}")]
pub struct StageError {
    /// Name of the stage that raised the error.
    pub stage: String,
    /// Path of the item being processed.
    pub path: PathBuf,
    /// The underlying failure.
    pub kind: FailureKind,
}

impl StageError {
    pub fn new(stage: impl Into<String>, path: impl Into<PathBuf>, kind: FailureKind) -> Self {
        Self {
            stage: stage.into(),
            path: path.into(),
            kind,
        }
    }

    /// True if the item was rejected by the guard rather than the rasterizer.
    pub fn is_guard(&self) -> bool {
        matches!(self.kind, FailureKind::Guard(_))
    }
}

/// Top-level errors for configuration and the blocking entry points.
#[derive(Debug, Error)]
pub enum Svg2PngError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An item failed inside the stage.
    #[error(transparent)]
    Stage(#[from] StageError),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
