//! Progress-callback trait for per-item stage events.
//!
//! Inject an [`Arc<dyn StageProgressCallback>`] via
//! [`crate::config::StageConfigBuilder::progress_callback`] to receive events
//! as the stage processes each item. The CLI uses it to drive its progress bar.
//!
//! # Example
//!
//! ```rust
//! use edgequake_svg2png::{StageConfig, StageProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl StageProgressCallback for Counter {
//!     fn on_item_complete(&self, _path: &Path, _png_len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = StageConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the stage as it processes each item.
///
/// With `concurrency > 1` the methods may be called concurrently from
/// different tasks. All methods default to no-ops.
pub trait StageProgressCallback: Send + Sync {
    /// An item was admitted and is about to be rasterized.
    fn on_item_start(&self, path: &Path) {
        let _ = path;
    }

    /// An item was converted. `path` is the renamed output path.
    fn on_item_complete(&self, path: &Path, png_len: usize) {
        let _ = (path, png_len);
    }

    /// The guard rejected an item and the pass-through policy forwarded it.
    fn on_item_skipped(&self, path: &Path, reason: &str) {
        let _ = (path, reason);
    }

    /// An item failed fatally.
    fn on_item_error(&self, path: &Path, error: &str) {
        let _ = (path, error);
    }
}

/// A no-op implementation.
pub struct NoopProgressCallback;

impl StageProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::StageConfig`].
pub type ProgressCallback = Arc<dyn StageProgressCallback>;
