use async_trait::async_trait;
use crate::error::Result;

/// Information about a translator backend
#[derive(Debug, Clone)]
pub struct TranslatorInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Model identifier sent to the backend
    pub model: String,
}

/// Trait for translation backends.
///
/// One call is one attempt: implementations must not retry internally.
/// Retrying belongs to [`RetryingWorker`](crate::worker::RetryingWorker).
#[async_trait]
pub trait Translator: Send + Sync {
    /// Get information about this translator
    fn info(&self) -> TranslatorInfo;

    /// Get the translator name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Translate one chunk of text into Chinese
    async fn translate(&self, text: &str) -> Result<String>;
}
