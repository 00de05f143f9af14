//! Building blocks of the SVG → PNG stage.
//!
//! ## Data Flow
//!
//! ```text
//! guard ──▶ admission ──▶ rasterize ──▶ rename
//! ```
//!
//! 1. [`guard`]: representation and signature checks; synchronous, no I/O
//! 2. [`admission`]: counting semaphore bounding in-flight conversions
//! 3. [`rasterize`]: the external converter seam; the only stage that awaits
//! 4. [`rename`]: `.svg` → `.png` on the final path segment

pub mod admission;
pub mod guard;
pub mod rasterize;
pub mod rename;
