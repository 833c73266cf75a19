use thiserror::Error;

/// Unified error type for doc-translator-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Extraction (opening and reading PDF/EPUB/TXT sources)
/// - Translation operations (API requests, responses, rate limiting)
/// - Dispatch bookkeeping and output persistence
/// - Cache operations (initialization, reading, writing)
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Extraction Errors
    // ==========================================================================
    /// Input file has an extension no extractor handles
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Failed to extract text from a PDF page
    #[error("failed to extract text from page {page}: {reason}")]
    PdfTextExtraction { page: usize, reason: String },

    /// Failed to read an EPUB container
    #[error("failed to read EPUB: {0}")]
    EpubRead(String),

    // ==========================================================================
    // Translation Errors
    // ==========================================================================
    /// Translation API request failed
    #[error("translation API request failed: {0}")]
    TranslationRequest(String),

    /// Invalid response from translation API
    #[error("invalid translation API response: {0}")]
    TranslationInvalidResponse(String),

    /// Rate limited by translation API
    #[error("translation rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    TranslationRateLimited { retry_after: Option<u64> },

    /// API key not configured for translation service
    #[error("translation API key not configured")]
    TranslationMissingApiKey,

    /// Translation request timed out
    #[error("translation request timed out")]
    TranslationTimeout,

    // ==========================================================================
    // Dispatch / Output Errors
    // ==========================================================================
    /// A result slot was written twice or never written
    #[error("dispatch bookkeeping error: {0}")]
    Dispatch(String),

    /// Failed to persist the translated text
    #[error("failed to write output {path}: {reason}")]
    OutputWrite { path: String, reason: String },

    // ==========================================================================
    // Cache Errors
    // ==========================================================================
    /// Failed to initialize the cache
    #[error("failed to initialize cache: {0}")]
    CacheInit(String),

    /// Failed to write to cache
    #[error("failed to write to cache: {0}")]
    CacheWrite(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    /// Missing required configuration field
    #[error("missing required config field: {0}")]
    ConfigMissing(String),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Configuration-class errors that no retry can fix.
    ///
    /// These cross component boundaries; every other translation error is
    /// absorbed by the retrying worker.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TranslationMissingApiKey
                | Self::ConfigLoad(_)
                | Self::ConfigInvalid { .. }
                | Self::ConfigMissing(_)
        )
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
