//! Document Translator Core Library
//!
//! Translates long documents into Chinese through an OpenAI-compatible
//! chat-completion API:
//! - Text extraction from TXT, PDF and EPUB
//! - Sentence-aware chunking under a character budget
//! - Bounded-concurrency dispatch with per-chunk retries
//! - Index-ordered reassembly with a partial-success policy
//! - Caching (memory and disk) of translated chunks

pub mod cache;
pub mod chunker;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod preprocess;
pub mod progress;
pub mod translator;
pub mod util;
pub mod worker;

pub use cache::{CacheKey, TranslationCache};
pub use chunker::{Chunk, Chunker};
pub use config::{AppConfig, CacheConfig, Provider, RunConfig, TranslatorConfig};
pub use dispatcher::{DispatchOutput, Dispatcher};
pub use error::{Error, Result};
pub use extract::{Extractor, extractor_for};
pub use output::{FileSink, OutputSink, translated_path};
pub use pipeline::{FailureReason, Pipeline, RunOutcome, RunReport, RunStats};
pub use preprocess::{FileFilter, SkipReason};
pub use progress::{LogProgress, NoProgress, ProgressEvent, ProgressSink};
pub use translator::{OpenAiTranslator, Translator, create_translator};
pub use worker::{ChunkResult, RetryPolicy, RetryingWorker};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// High-level translator that combines extraction, the pipeline and the cache
pub struct DocumentTranslator {
    translator: Arc<dyn Translator>,
    pipeline: Pipeline,
    config: AppConfig,
}

impl DocumentTranslator {
    /// Create a new document translator with the given configuration
    pub fn new(config: AppConfig) -> Result<Self> {
        config.run.validate()?;
        let translator = create_translator(&config.translator, config.run.api_timeout())?;
        Self::with_translator(translator, config)
    }

    /// Create with a custom translator
    pub fn with_translator(translator: Arc<dyn Translator>, config: AppConfig) -> Result<Self> {
        Self::with_sink(translator, Arc::new(FileSink), config)
    }

    /// Create with a custom translator and output sink
    pub fn with_sink(
        translator: Arc<dyn Translator>,
        sink: Arc<dyn OutputSink>,
        config: AppConfig,
    ) -> Result<Self> {
        let cache = TranslationCache::new(&config.cache)?;
        let pipeline = Pipeline::new(config.run.clone(), Arc::clone(&translator), sink)?.with_cache(cache);

        Ok(Self {
            translator,
            pipeline,
            config,
        })
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn translator_info(&self) -> translator::TranslatorInfo {
        self.translator.info()
    }

    /// Where the translation of `input` is written
    pub fn output_path(&self, input: &Path) -> PathBuf {
        translated_path(input, self.config.output_dir.as_deref())
    }

    /// Extract the text segments of `input` on the blocking pool.
    pub async fn extract(&self, input: &Path) -> Result<Vec<String>> {
        let path = input.to_path_buf();
        let segments = tokio::task::spawn_blocking(move || extractor_for(&path)?.extract())
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("extraction task failed: {e}"))))??;

        debug!("{}: {} segments", input.display(), segments.len());
        Ok(segments)
    }

    /// Translate already-extracted segments of `input`
    pub async fn translate_segments(
        &self,
        input: &Path,
        segments: &[String],
        progress: &dyn ProgressSink,
    ) -> Result<RunReport> {
        let output = self.output_path(input);
        info!("Translating {} -> {}", input.display(), output.display());
        self.pipeline.run(segments, &output, progress).await
    }

    /// Extract, translate and persist one file.
    pub async fn translate_file(&self, input: &Path, progress: &dyn ProgressSink) -> Result<RunReport> {
        let segments = self.extract(input).await?;
        self.translate_segments(input, &segments, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.translator.api_base, Provider::Akashml.api_base());
        assert_eq!(config.run, RunConfig::batch());
        assert!(config.output_dir.is_none());
    }

    #[test]
    fn test_new_without_api_key_is_fatal() {
        let mut config = AppConfig::default();
        config.translator.api_key = None;
        config.cache = CacheConfig::disabled();
        let err = DocumentTranslator::new(config).err().unwrap();
        assert!(err.is_fatal());
    }
}
