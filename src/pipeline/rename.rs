//! Output path naming.

use std::path::{Path, PathBuf};

/// Extension given to converted items.
pub const PNG_EXTENSION: &str = "png";

/// Replace the extension of the final path segment with `.png`.
///
/// Only the last extension of the file name is replaced; directory names are
/// never touched. A file name without an extension (including dotfiles such as
/// `.icon`) gets `.png` appended. A path with no file name (empty, `..`) is
/// returned unchanged.
pub fn rename(path: &Path) -> PathBuf {
    path.with_extension(PNG_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(p: &str) -> PathBuf {
        rename(Path::new(p))
    }

    #[test]
    fn replaces_extension() {
        assert_eq!(r("icon.svg"), PathBuf::from("icon.png"));
        assert_eq!(r("a/b/c.svg"), PathBuf::from("a/b/c.png"));
        assert_eq!(r("/abs/Logo.SVG"), PathBuf::from("/abs/Logo.png"));
    }

    #[test]
    fn only_final_segment_changes() {
        assert_eq!(r("x.svg/icon.svg"), PathBuf::from("x.svg/icon.png"));
        assert_eq!(r("sprites.v2/arrow"), PathBuf::from("sprites.v2/arrow.png"));
    }

    #[test]
    fn only_last_extension_changes() {
        assert_eq!(r("icon.min.svg"), PathBuf::from("icon.min.png"));
    }

    #[test]
    fn no_extension_appends() {
        assert_eq!(r("logoSVG"), PathBuf::from("logoSVG.png"));
        assert_eq!(r(".icon"), PathBuf::from(".icon.png"));
    }

    #[test]
    fn trailing_dot() {
        assert_eq!(r("file."), PathBuf::from("file.png"));
    }

    #[test]
    fn no_file_name_is_unchanged() {
        assert_eq!(r(""), PathBuf::from(""));
        assert_eq!(r("a/.."), PathBuf::from("a/.."));
    }
}
