use std::path::Path;

use mupdf::{Document as MuDocument, TextPageOptions};
use tracing::debug;

use super::{Extractor, is_blank_page};
use crate::error::{Error, Result};

/// Page-by-page text extraction through mupdf.
pub struct PdfExtractor {
    bytes: Vec<u8>,
    page_count: usize,
}

impl PdfExtractor {
    /// Parse `bytes` to validate the document and read its page count
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        let doc = open(&bytes)?;
        let page_count = doc
            .page_count()
            .map_err(|e| Error::PdfOpen(format!("Failed to get page count: {e}")))?;

        Ok(Self {
            bytes,
            page_count: usize::try_from(page_count).unwrap_or(0),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            Error::PdfOpen(format!("Failed to read file {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(bytes)
    }

    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Plain text of one page: lines joined by `\n`, blocks separated by a blank line.
    fn page_text(doc: &MuDocument, page_num: usize) -> Result<String> {
        let extraction_error = |reason: String| Error::PdfTextExtraction { page: page_num, reason };

        let index = i32::try_from(page_num)
            .map_err(|_| extraction_error("page number out of range".to_string()))?;
        let page = doc
            .load_page(index)
            .map_err(|e| extraction_error(format!("Failed to load page: {e}")))?;
        let text_page = page
            .to_text_page(TextPageOptions::empty())
            .map_err(|e| extraction_error(format!("Failed to get text page: {e}")))?;

        let mut blocks = Vec::new();
        for block in text_page.blocks() {
            let lines: Vec<String> = block
                .lines()
                .map(|line| line.chars().filter_map(|c| c.char()).collect::<String>())
                .map(|line| line.trim_end().to_string())
                .filter(|line| !line.is_empty())
                .collect();
            if !lines.is_empty() {
                blocks.push(lines.join("\n"));
            }
        }
        Ok(blocks.join("\n\n"))
    }
}

impl Extractor for PdfExtractor {
    fn extract(&self) -> Result<Vec<String>> {
        let doc = open(&self.bytes)?;
        let mut pages = Vec::with_capacity(self.page_count);

        for page_num in 0..self.page_count {
            let text = Self::page_text(&doc, page_num)?;
            let text = text.trim();
            if is_blank_page(text) {
                debug!("Skipping blank page {}", page_num + 1);
                continue;
            }
            pages.push(text.to_string());
        }

        debug!("Extracted {}/{} pages", pages.len(), self.page_count);
        Ok(pages)
    }
}

fn open(bytes: &[u8]) -> Result<MuDocument> {
    MuDocument::from_bytes(bytes, "").map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))
}
