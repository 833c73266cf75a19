//! Batch-mode file filtering ahead of translation.

use std::path::Path;

use crate::extract::is_supported;
use crate::output::is_translated_output;
use crate::util::char_len;

/// Share of CJK ideographs among non-whitespace characters.
pub fn chinese_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut chinese = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if ('\u{4e00}'..='\u{9fff}').contains(&c) {
            chinese += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = chinese as f64 / total as f64;
    ratio
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Output of an earlier run
    AlreadyTranslated,
    /// Not a txt/pdf/epub file
    Unsupported,
    /// Extracted text shorter than the minimum
    TooShort(usize),
    /// Mostly Chinese already
    AlreadyChinese,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyTranslated => write!(f, "already a translation"),
            Self::Unsupported => write!(f, "unsupported format"),
            Self::TooShort(n) => write!(f, "only {n} characters"),
            Self::AlreadyChinese => write!(f, "already Chinese"),
        }
    }
}

/// Decides which batch inputs are worth translating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileFilter {
    pub min_chars: usize,
    pub chinese_ratio_threshold: f64,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self {
            min_chars: 1000,
            chinese_ratio_threshold: 0.3,
        }
    }
}

impl FileFilter {
    /// Checks that need only the file name.
    pub fn check_path(&self, path: &Path) -> Option<SkipReason> {
        if is_translated_output(path) {
            return Some(SkipReason::AlreadyTranslated);
        }
        if !is_supported(path) {
            return Some(SkipReason::Unsupported);
        }
        None
    }

    /// Checks on the extracted segments.
    pub fn check_content<S: AsRef<str>>(&self, segments: &[S]) -> Option<SkipReason> {
        let text: String = segments.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join("\n");
        let len = char_len(&text);
        if len < self.min_chars {
            return Some(SkipReason::TooShort(len));
        }
        if chinese_ratio(&text) >= self.chinese_ratio_threshold {
            return Some(SkipReason::AlreadyChinese);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chinese_ratio() {
        assert!((chinese_ratio("中文ab") - 0.5).abs() < f64::EPSILON);
        assert!(chinese_ratio("").abs() < f64::EPSILON);
        assert!(chinese_ratio("  \n ").abs() < f64::EPSILON);
        assert!((chinese_ratio("中 文") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_check_path() {
        let filter = FileFilter::default();
        assert_eq!(filter.check_path(Path::new("a translated.txt")), Some(SkipReason::AlreadyTranslated));
        assert_eq!(filter.check_path(Path::new("a.docx")), Some(SkipReason::Unsupported));
        assert_eq!(filter.check_path(Path::new("a.epub")), None);
    }

    #[test]
    fn test_check_content() {
        let filter = FileFilter::default();
        assert_eq!(filter.check_content(&["short"]), Some(SkipReason::TooShort(5)));

        let chinese = "中".repeat(600);
        let english = "e".repeat(600);
        assert_eq!(filter.check_content(&[&chinese, &english]), Some(SkipReason::AlreadyChinese));

        let mostly_english = format!("{}{}", "中".repeat(100), "e".repeat(1000));
        assert_eq!(filter.check_content(&[mostly_english]), None);
    }
}
