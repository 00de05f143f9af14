//! Item guard: cheap precondition checks before any rasterizer call.
//!
//! Two checks, in order:
//!
//! 1. **Representation**: the payload must be a fully loaded buffer. Streams
//!    and null payloads are rejected without looking at any bytes.
//! 2. **Signature**: the bytes must look like SVG markup. The file extension
//!    is never consulted.
//!
//! The default signature check is a heuristic, not a validator: malformed but
//! plausible markup passes and is left for the rasterizer to reject.
//! [`SignatureMode::Strict`] is the opt-in stricter check.

use crate::config::SignatureMode;
use crate::error::GuardError;
use crate::item::{Contents, PipelineItem};
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::path::PathBuf;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// `<svg`, optionally preceded by an XML declaration, anywhere in the text.
static SVG_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)(?:<\?xml.*?)?<svg").expect("valid regex"));

/// An item that passed the guard, split into its parts.
#[derive(Debug)]
pub struct Checked {
    pub base: PathBuf,
    pub path: PathBuf,
    /// The SVG document, moved out of the item.
    pub svg: Vec<u8>,
}

impl Checked {
    /// Put the item back together.
    pub fn into_item(self) -> PipelineItem {
        PipelineItem::new(self.base, self.path, Contents::Buffer(self.svg))
    }
}

/// An item the guard turned away, returned intact.
#[derive(Debug)]
pub struct Rejected {
    pub item: PipelineItem,
    pub reason: GuardError,
}

/// Check that `item` can be handed to the rasterizer.
///
/// Representation is checked before any byte is looked at. On success the
/// buffer is moved out so the caller never matches on [`Contents`] again.
pub fn check(item: PipelineItem, mode: SignatureMode) -> Result<Checked, Rejected> {
    let PipelineItem {
        base,
        path,
        contents,
    } = item;

    let svg = match contents {
        Contents::Buffer(svg) => svg,
        other => {
            return Err(Rejected {
                item: PipelineItem::new(base, path, other),
                reason: GuardError::UnsupportedRepresentation,
            })
        }
    };

    let conforming = match mode {
        SignatureMode::Heuristic => is_svg(&svg),
        SignatureMode::Strict => is_svg_strict(&svg),
    };

    if conforming {
        Ok(Checked { base, path, svg })
    } else {
        Err(Rejected {
            item: PipelineItem::new(base, path, Contents::Buffer(svg)),
            reason: GuardError::UnsupportedFormat,
        })
    }
}

/// Heuristic SVG sniffing.
///
/// Strips a UTF-8 BOM and leading whitespace, then searches case-insensitively
/// for an `<svg` tag opening (optionally after an `<?xml` declaration).
/// Bytes that are not valid UTF-8 never count as SVG.
pub fn is_svg(bytes: &[u8]) -> bool {
    match decode_text(bytes) {
        Some(text) => SVG_TAG.is_match(text),
        None => false,
    }
}

/// Strict SVG sniffing: the first element of the document must be `<svg>`.
///
/// Declarations, comments, doctypes, processing instructions and whitespace
/// may precede it. Any parse error or stray text before the root rejects.
pub fn is_svg_strict(bytes: &[u8]) -> bool {
    let Some(text) = decode_text(bytes) else {
        return false;
    };

    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return e.local_name().as_ref().eq_ignore_ascii_case(b"svg");
            }
            Ok(Event::Text(t)) => {
                if !t.iter().all(u8::is_ascii_whitespace) {
                    return false;
                }
            }
            Ok(Event::Eof) | Err(_) => return false,
            Ok(_) => continue,
        }
    }
}

fn decode_text(bytes: &[u8]) -> Option<&str> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    std::str::from_utf8(bytes).ok().map(str::trim_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn item(bytes: &[u8]) -> PipelineItem {
        PipelineItem::from_bytes("x.svg", bytes.to_vec())
    }

    fn verdict(item: PipelineItem, mode: SignatureMode) -> Result<(), GuardError> {
        check(item, mode).map(|_| ()).map_err(|r| r.reason)
    }

    #[test]
    fn plain_svg() {
        assert!(is_svg(b"<svg></svg>"));
        assert!(is_svg(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>"));
    }

    #[test]
    fn case_insensitive() {
        assert!(is_svg(b"<SVG></SVG>"));
        assert!(is_svg(b"<Svg width=\"1\"></Svg>"));
    }

    #[test]
    fn bom_and_whitespace_are_skipped() {
        assert!(is_svg(b"\xEF\xBB\xBF  \n\t<svg/>"));
    }

    #[test]
    fn xml_declaration_then_svg() {
        let doc = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- icon -->\n<svg></svg>";
        assert!(is_svg(doc));
    }

    #[test]
    fn substring_not_prefix() {
        assert!(is_svg(b"<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\"><svg/>"));
        assert!(is_svg(b"garbage before <svg>"));
    }

    #[test]
    fn non_svg_rejected() {
        assert!(!is_svg(b""));
        assert!(!is_svg(b"<html><body></body></html>"));
        assert!(!is_svg(b"<?xml version=\"1.0\"?><note/>"));
        assert!(!is_svg(b"\x89PNG\r\n\x1a\n"));
    }

    #[test]
    fn invalid_utf8_rejected() {
        assert!(!is_svg(b"<svg>\xFF\xFE</svg>"));
    }

    #[test]
    fn strict_accepts_svg_root() {
        assert!(is_svg_strict(b"<svg/>"));
        assert!(is_svg_strict(
            b"<?xml version=\"1.0\"?>\n<!DOCTYPE svg>\n<!-- c -->\n<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>"
        ));
        assert!(is_svg_strict(b"<svg:svg xmlns:svg=\"http://www.w3.org/2000/svg\"/>"));
    }

    #[test]
    fn strict_rejects_what_heuristic_accepts() {
        let doc = b"<html><svg></svg></html>";
        assert!(is_svg(doc));
        assert!(!is_svg_strict(doc));

        let doc = b"garbage before <svg>";
        assert!(is_svg(doc));
        assert!(!is_svg_strict(doc));
    }

    #[test]
    fn check_buffer() {
        assert_eq!(verdict(item(b"<svg/>"), SignatureMode::Heuristic), Ok(()));
        assert_eq!(
            verdict(item(b"hello"), SignatureMode::Heuristic),
            Err(GuardError::UnsupportedFormat)
        );
    }

    #[test]
    fn check_ignores_extension() {
        let it = PipelineItem::from_bytes("logo.png", b"<svg/>".to_vec());
        assert_eq!(verdict(it, SignatureMode::Heuristic), Ok(()));
        let it = PipelineItem::from_bytes("logo.svg", b"not markup".to_vec());
        assert_eq!(
            verdict(it, SignatureMode::Heuristic),
            Err(GuardError::UnsupportedFormat)
        );
    }

    #[test]
    fn representation_checked_before_content() {
        let chunks = stream::iter(vec![Ok::<_, std::io::Error>(b"<svg/>".to_vec())]);
        let streamed = PipelineItem::new("", "a.svg", Contents::Stream(Box::pin(chunks)));
        assert_eq!(
            verdict(streamed, SignatureMode::Heuristic),
            Err(GuardError::UnsupportedRepresentation)
        );

        let null = PipelineItem::new("", "dir", Contents::Null);
        assert_eq!(
            verdict(null, SignatureMode::Strict),
            Err(GuardError::UnsupportedRepresentation)
        );
    }

    #[test]
    fn checked_moves_buffer_and_rejected_keeps_item() {
        let ok = check(
            PipelineItem::new("/icons", "/icons/a.svg", b"<svg/>".to_vec().into()),
            SignatureMode::Heuristic,
        )
        .unwrap();
        assert_eq!(ok.svg, b"<svg/>".to_vec());
        let back = ok.into_item();
        assert_eq!(back.base, PathBuf::from("/icons"));
        assert_eq!(back.contents.as_bytes(), Some(&b"<svg/>"[..]));

        let rejected = check(item(b"plain"), SignatureMode::Heuristic).unwrap_err();
        assert_eq!(rejected.reason, GuardError::UnsupportedFormat);
        assert_eq!(rejected.item.path, PathBuf::from("x.svg"));
        assert_eq!(rejected.item.contents.as_bytes(), Some(&b"plain"[..]));
    }
}
