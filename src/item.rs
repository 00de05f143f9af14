//! Items flowing through the stage.
//!
//! A [`PipelineItem`] is one file: a `base` directory (opaque, passed through),
//! the identifying `path`, and its [`Contents`]. The stage never mutates an
//! item; it consumes it and produces a new one, moving the converted buffer
//! into the output.

use futures::Stream;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// A chunked, not yet materialised payload.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Vec<u8>>> + Send>>;

/// Payload of a [`PipelineItem`].
pub enum Contents {
    /// Fully loaded bytes. The only representation the stage converts.
    Buffer(Vec<u8>),
    /// A streamed payload delivered in chunks.
    Stream(ByteStream),
    /// No payload at all (directory entries, placeholders).
    Null,
}

impl Contents {
    pub fn is_buffer(&self) -> bool {
        matches!(self, Contents::Buffer(_))
    }

    /// Borrow the bytes if the payload is a buffer.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Contents::Buffer(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contents::Buffer(b) => write!(f, "Buffer({} bytes)", b.len()),
            Contents::Stream(_) => f.write_str("Stream(..)"),
            Contents::Null => f.write_str("Null"),
        }
    }
}

impl From<Vec<u8>> for Contents {
    fn from(bytes: Vec<u8>) -> Self {
        Contents::Buffer(bytes)
    }
}

/// One file-like unit flowing through the pipeline.
#[derive(Debug)]
pub struct PipelineItem {
    /// Root directory context. Never interpreted by the stage.
    pub base: PathBuf,
    /// Identifying path, including file name and extension.
    pub path: PathBuf,
    pub contents: Contents,
}

impl PipelineItem {
    pub fn new(base: impl Into<PathBuf>, path: impl Into<PathBuf>, contents: Contents) -> Self {
        Self {
            base: base.into(),
            path: path.into(),
            contents,
        }
    }

    /// Item with a fully loaded buffer and an empty base.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(PathBuf::new(), path, Contents::Buffer(bytes.into()))
    }

    /// Path relative to `base`, or the full path when it is not under `base`.
    pub fn relative(&self) -> &Path {
        self.path.strip_prefix(&self.base).unwrap_or(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_strips_base() {
        let item = PipelineItem::new("/src/icons", "/src/icons/a/logo.svg", Contents::Null);
        assert_eq!(item.relative(), Path::new("a/logo.svg"));
    }

    #[test]
    fn relative_falls_back_to_path() {
        let item = PipelineItem::new("/elsewhere", "/src/logo.svg", Contents::Null);
        assert_eq!(item.relative(), Path::new("/src/logo.svg"));
    }

    #[test]
    fn contents_debug_hides_bytes() {
        let c = Contents::from(vec![1u8, 2, 3]);
        assert_eq!(format!("{c:?}"), "Buffer(3 bytes)");
        assert!(c.is_buffer());
        assert_eq!(c.as_bytes(), Some(&[1u8, 2, 3][..]));
        assert!(Contents::Null.as_bytes().is_none());
    }
}
