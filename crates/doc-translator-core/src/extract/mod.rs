//! Text extraction from source documents.
//!
//! Each extractor yields an ordered list of non-blank text segments (one
//! per PDF page, EPUB spine item, or the whole TXT file). The chunker
//! treats them as an opaque ordered list.

mod epub;
mod pdf;
mod txt;

pub use epub::EpubExtractor;
pub use pdf::PdfExtractor;
pub use txt::TxtExtractor;

use std::path::Path;

use crate::error::{Error, Result};

/// File extensions with an extractor, lowercase, without the dot
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["txt", "pdf", "epub"];

/// Produces the ordered text segments of one document.
pub trait Extractor: Send {
    fn extract(&self) -> Result<Vec<String>>;
}

/// Pick the extractor for `path` by its extension (case-insensitive).
pub fn extractor_for(path: &Path) -> Result<Box<dyn Extractor>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "txt" => Ok(Box::new(TxtExtractor::new(path))),
        "pdf" => Ok(Box::new(PdfExtractor::from_file(path)?)),
        "epub" => Ok(Box::new(EpubExtractor::from_file(path)?)),
        _ => Err(Error::UnsupportedFormat(path.display().to_string())),
    }
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

const BLANK_CHARS: [char; 18] = [
    ' ', '\n', '\t', '\r', '\u{a0}', '\u{2000}', '\u{2001}', '\u{2002}', '\u{2003}', '\u{2004}',
    '\u{2005}', '\u{2006}', '\u{2007}', '\u{2008}', '\u{2009}', '\u{200a}', '\u{202f}', '\u{205f}',
];

/// Heuristic for pages/items with no real content: empty, near-empty,
/// mostly control characters, only exotic spaces, or a short run of symbols.
pub fn is_blank_page(text: &str) -> bool {
    let clean = text.trim();
    if clean.is_empty() {
        return true;
    }

    let total = clean.chars().count();
    let printable = clean
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .count();

    if printable < 2 {
        return true;
    }
    // Fewer than 10% printable
    if printable * 10 < total {
        return true;
    }
    if clean.chars().all(|c| BLANK_CHARS.contains(&c)) {
        return true;
    }
    total < 20 && clean.chars().all(|c| !c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_page_heuristics() {
        assert!(is_blank_page(""));
        assert!(is_blank_page("   \n\t "));
        assert!(is_blank_page("a"));
        assert!(is_blank_page("\u{a0}\u{2003}\u{a0}"));
        assert!(is_blank_page("— * — · —"));
        assert!(!is_blank_page("Chapter 1"));
        assert!(!is_blank_page("第一章"));
        assert!(!is_blank_page("12"));
    }

    #[test]
    fn test_extractor_for_rejects_unknown_extension() {
        let err = extractor_for(Path::new("book.docx")).err().unwrap();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("a/B.PDF")));
        assert!(is_supported(Path::new("novel.epub")));
        assert!(is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("notes.md")));
        assert!(!is_supported(Path::new("README")));
    }
}
