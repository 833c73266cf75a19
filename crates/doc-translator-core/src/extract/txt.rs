use std::path::{Path, PathBuf};

use super::Extractor;
use crate::error::Result;

/// Whole-file UTF-8 text source
pub struct TxtExtractor {
    path: PathBuf,
}

impl TxtExtractor {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Extractor for TxtExtractor {
    fn extract(&self) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(&self.path)?;
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        if content.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![content.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_whole_file_as_one_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "\u{feff}line one.\nline two.").unwrap();
        let segments = TxtExtractor::new(&path).extract().unwrap();
        assert_eq!(segments, vec!["line one.\nline two.".to_string()]);
    }

    #[test]
    fn test_empty_file_has_no_segments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();
        assert!(TxtExtractor::new(&path).extract().unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = TxtExtractor::new("/nonexistent/definitely/missing.txt").extract();
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }
}
