//! One document run: chunk, look up the cache, dispatch, merge, persist.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::cache::{CacheKey, TranslationCache};
use crate::chunker::{Chunk, Chunker};
use crate::config::RunConfig;
use crate::dispatcher::{DispatchOutput, Dispatcher};
use crate::error::{Error, Result};
use crate::output::OutputSink;
use crate::progress::ProgressSink;
use crate::translator::Translator;
use crate::util::char_len;
use crate::worker::{ChunkResult, RetryPolicy, RetryingWorker};

/// Why a run produced no output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Extraction yielded nothing to translate
    NoChunks,
    /// Every chunk exhausted its retries
    AllChunksFailed,
    /// The merged result was blank
    EmptyOutput,
    /// The sink rejected the result
    PersistFailed(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChunks => write!(f, "no text to translate"),
            Self::AllChunksFailed => write!(f, "all chunks failed"),
            Self::EmptyOutput => write!(f, "translation result is empty"),
            Self::PersistFailed(reason) => write!(f, "failed to save result: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Output written; some chunks may still carry failure placeholders
    Succeeded,
    Failed(FailureReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total_chunks: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Chunks served from the cache (counted in `succeeded` too)
    pub cached: usize,
    pub source_chars: usize,
    pub translated_chars: usize,
    pub duration: Duration,
}

impl RunStats {
    /// Source characters per second of wall time
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let chars = self.source_chars as f64;
        chars / secs
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} chunks ok ({} cached, {} failed) | {} -> {} chars | {:.1}s | {:.0} chars/s",
            self.succeeded,
            self.total_chunks,
            self.cached,
            self.failed,
            self.source_chars,
            self.translated_chars,
            self.duration.as_secs_f64(),
            self.throughput()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub stats: RunStats,
    /// 0-based indices of chunks left as placeholders
    pub failed_chunks: Vec<usize>,
}

impl RunReport {
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded)
    }

    fn failed(reason: FailureReason, stats: RunStats, failed_chunks: Vec<usize>) -> Self {
        Self {
            outcome: RunOutcome::Failed(reason),
            stats,
            failed_chunks,
        }
    }
}

/// Orchestrates a single document translation.
pub struct Pipeline {
    chunker: Chunker,
    dispatcher: Dispatcher,
    sink: Arc<dyn OutputSink>,
    cache: TranslationCache,
    model: String,
}

impl Pipeline {
    pub fn new(config: RunConfig, translator: Arc<dyn Translator>, sink: Arc<dyn OutputSink>) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::new(config.chunk_size, config.min_chunk_size)?;
        let model = translator.info().model;
        let worker = RetryingWorker::new(translator, RetryPolicy::from_run_config(&config))
            .with_content_logging(config.log_content);

        Ok(Self {
            chunker,
            dispatcher: Dispatcher::new(worker, config.max_workers),
            sink,
            cache: TranslationCache::disabled(),
            model,
        })
    }

    #[must_use]
    pub fn with_cache(mut self, cache: TranslationCache) -> Self {
        self.cache = cache;
        self
    }

    /// Translate `segments` and persist the merged text at `output`.
    ///
    /// `Ok` carries both successful and failed outcomes; `Err` is reserved
    /// for fatal configuration errors and internal dispatch faults.
    pub async fn run(&self, segments: &[String], output: &Path, progress: &dyn ProgressSink) -> Result<RunReport> {
        let started = Instant::now();
        let chunks = self.chunker.chunk_segments(segments);

        let mut stats = RunStats {
            total_chunks: chunks.len(),
            source_chars: chunks.iter().map(Chunk::char_len).sum(),
            ..RunStats::default()
        };

        if chunks.is_empty() {
            warn!("No content to translate");
            stats.duration = started.elapsed();
            return Ok(RunReport::failed(FailureReason::NoChunks, stats, Vec::new()));
        }
        info!(
            "Split {} chars into {} chunks (size {}, min {})",
            stats.source_chars,
            chunks.len(),
            self.chunker.chunk_size(),
            self.chunker.min_chunk_size()
        );

        let (cached, misses) = self.lookup_cached(&chunks).await;
        stats.cached = cached.len();
        if !cached.is_empty() {
            info!("{} of {} chunks served from cache", cached.len(), chunks.len());
        }

        let dispatched = self.dispatcher.dispatch(&misses, progress).await?;
        self.store_translations(&misses, &dispatched).await;

        let merged = assemble(chunks.len(), cached, dispatched)?;
        stats.succeeded = merged.success_count();
        stats.failed = merged.failure_count();
        stats.translated_chars = merged
            .results
            .iter()
            .filter_map(ChunkResult::translated_text)
            .map(char_len)
            .sum();
        let failed_chunks = merged.failed_indices();

        if merged.all_failed() {
            error!("All {} chunks failed, nothing written", chunks.len());
            stats.duration = started.elapsed();
            return Ok(RunReport::failed(FailureReason::AllChunksFailed, stats, failed_chunks));
        }

        let text = merged.merged_text();
        if text.trim().is_empty() {
            error!("Merged translation is empty, nothing written");
            stats.duration = started.elapsed();
            return Ok(RunReport::failed(FailureReason::EmptyOutput, stats, failed_chunks));
        }

        if let Err(e) = self.sink.write(output, &text) {
            error!("Failed to save {}: {}", output.display(), e);
            stats.duration = started.elapsed();
            return Ok(RunReport::failed(FailureReason::PersistFailed(e.to_string()), stats, failed_chunks));
        }

        stats.duration = started.elapsed();
        if failed_chunks.is_empty() {
            info!("Done: {}", stats);
        } else {
            warn!("Done with {} failed chunks: {}", failed_chunks.len(), stats);
        }

        Ok(RunReport {
            outcome: RunOutcome::Succeeded,
            stats,
            failed_chunks,
        })
    }

    async fn lookup_cached(&self, chunks: &[Chunk]) -> (Vec<ChunkResult>, Vec<Chunk>) {
        if !self.cache.is_enabled() {
            return (Vec::new(), chunks.to_vec());
        }

        let mut cached = Vec::new();
        let mut misses = Vec::new();
        for chunk in chunks {
            let key = CacheKey::new(&self.model, &chunk.content);
            match self.cache.get(&key).await {
                Some(text) => cached.push(ChunkResult::translated(chunk.index, text, 0)),
                None => misses.push(chunk.clone()),
            }
        }
        (cached, misses)
    }

    async fn store_translations(&self, chunks: &[Chunk], output: &DispatchOutput) {
        if !self.cache.is_enabled() {
            return;
        }
        for (chunk, result) in chunks.iter().zip(&output.results) {
            if let Some(text) = result.translated_text() {
                self.cache.insert(&CacheKey::new(&self.model, &chunk.content), text).await;
            }
        }
    }
}

/// Place cached and freshly dispatched results into one index-ordered output.
fn assemble(total: usize, cached: Vec<ChunkResult>, dispatched: DispatchOutput) -> Result<DispatchOutput> {
    let mut slots: Vec<Option<ChunkResult>> = vec![None; total];
    for result in cached.into_iter().chain(dispatched.results) {
        let index = result.index;
        let slot = slots
            .get_mut(index)
            .ok_or_else(|| Error::Dispatch(format!("chunk index {index} out of range")))?;
        if slot.replace(result).is_some() {
            return Err(Error::Dispatch(format!("chunk {} has two results", index + 1)));
        }
    }

    let results = slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or_else(|| Error::Dispatch(format!("chunk {} produced no result", i + 1))))
        .collect::<Result<Vec<_>>>()?;
    Ok(DispatchOutput { results })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_interleaves_cached_and_dispatched() {
        let cached = vec![ChunkResult::translated(1, "b", 0)];
        let dispatched = DispatchOutput {
            results: vec![ChunkResult::translated(0, "a", 1), ChunkResult::translated(2, "c", 1)],
        };
        let merged = assemble(3, cached, dispatched).unwrap();
        assert_eq!(merged.merged_text(), "a\nb\nc");
    }

    #[test]
    fn test_assemble_rejects_gaps_and_duplicates() {
        let gap = assemble(2, vec![ChunkResult::translated(0, "a", 1)], DispatchOutput::default());
        assert!(matches!(gap, Err(Error::Dispatch(_))));

        let dup = assemble(
            1,
            vec![ChunkResult::translated(0, "a", 0)],
            DispatchOutput { results: vec![ChunkResult::translated(0, "a", 1)] },
        );
        assert!(matches!(dup, Err(Error::Dispatch(_))));
    }

    #[test]
    fn test_stats_display_and_throughput() {
        let stats = RunStats {
            total_chunks: 4,
            succeeded: 3,
            failed: 1,
            cached: 1,
            source_chars: 1000,
            translated_chars: 600,
            duration: Duration::from_secs(2),
        };
        assert!((stats.throughput() - 500.0).abs() < f64::EPSILON);
        assert_eq!(
            stats.to_string(),
            "3/4 chunks ok (1 cached, 1 failed) | 1000 -> 600 chars | 2.0s | 500 chars/s"
        );
        assert!(RunStats::default().throughput().abs() < f64::EPSILON);
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(FailureReason::AllChunksFailed.to_string(), "all chunks failed");
        assert_eq!(
            FailureReason::PersistFailed("disk full".into()).to_string(),
            "failed to save result: disk full"
        );
    }
}
