//! Persisting translated text.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

/// Suffix appended to the input stem to name the translated file
pub const TRANSLATED_SUFFIX: &str = " translated.txt";

/// Destination for a finished translation.
pub trait OutputSink: Send + Sync {
    fn write(&self, path: &Path, text: &str) -> Result<()>;
}

/// Writes UTF-8 files atomically: a temp file in the target directory
/// renamed over the destination, so readers never see partial output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSink;

impl OutputSink for FileSink {
    fn write(&self, path: &Path, text: &str) -> Result<()> {
        let output_error = |reason: String| Error::OutputWrite {
            path: path.display().to_string(),
            reason,
        };

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| output_error(format!("create directory: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| output_error(format!("create temp file: {e}")))?;
        tmp.write_all(text.as_bytes())
            .and_then(|()| tmp.flush())
            .map_err(|e| output_error(format!("write: {e}")))?;
        tmp.persist(path).map_err(|e| output_error(format!("rename: {}", e.error)))?;

        info!("Wrote {} bytes to {}", text.len(), path.display());
        Ok(())
    }
}

/// `<dir>/<stem> translated.txt`, with `dir` defaulting to the input's directory.
pub fn translated_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "output".to_string(), |s| s.to_string_lossy().into_owned());
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}{TRANSLATED_SUFFIX}"))
}

/// Whether `path` names a file this tool produced
pub fn is_translated_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TRANSLATED_SUFFIX))
}
