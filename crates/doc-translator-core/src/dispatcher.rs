//! Bounded-concurrency fan-out of chunks to [`RetryingWorker`]s and
//! index-ordered fan-in of their results.

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::chunker::Chunk;
use crate::error::{Error, Result};
use crate::progress::{ProgressSink, ProgressTracker};
use crate::worker::{ChunkResult, RetryingWorker};

/// Results of one dispatch, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutput {
    pub results: Vec<ChunkResult>,
}

impl DispatchOutput {
    /// All chunk texts joined by newlines, placeholders included.
    pub fn merged_text(&self) -> String {
        self.results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Chunk indices whose retries were exhausted, ascending
    pub fn failed_indices(&self) -> Vec<usize> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.index)
            .collect()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.success_count() == 0
    }
}

/// Runs one worker invocation per chunk with at most `max_workers` in flight.
pub struct Dispatcher {
    worker: RetryingWorker,
    max_workers: usize,
}

impl Dispatcher {
    pub fn new(worker: RetryingWorker, max_workers: usize) -> Self {
        Self {
            worker,
            max_workers: max_workers.max(1),
        }
    }

    /// Translate every chunk and return results in the order `chunks` was given.
    ///
    /// Completion order is arbitrary; each result is written into the slot of
    /// its submission position, never appended. A failing chunk does not stop
    /// its siblings. Only a fatal (configuration) error aborts the dispatch.
    pub async fn dispatch(&self, chunks: &[Chunk], progress: &dyn ProgressSink) -> Result<DispatchOutput> {
        if chunks.is_empty() {
            return Ok(DispatchOutput::default());
        }

        let total = chunks.len();
        // Log tags count against the whole document, not just this batch
        let tag_total = chunks.iter().map(|c| c.index + 1).max().unwrap_or(total);
        info!("Dispatching {} chunks with {} workers", total, self.max_workers);

        let tracker = ProgressTracker::new(total);
        let mut slots: Vec<Option<ChunkResult>> = vec![None; total];

        let worker = &self.worker;
        let mut completions = stream::iter(chunks.iter().enumerate())
            .map(|(position, chunk)| async move { (position, worker.run(chunk, tag_total).await) })
            .buffer_unordered(self.max_workers);

        while let Some((position, outcome)) = completions.next().await {
            let result = outcome?;
            let slot = slots
                .get_mut(position)
                .ok_or_else(|| Error::Dispatch(format!("result position {position} out of range")))?;
            if slot.is_some() {
                return Err(Error::Dispatch(format!("chunk {} completed twice", result.index + 1)));
            }
            *slot = Some(result);

            if let Some(event) = tracker.record() {
                progress.on_progress(&event);
            }
        }

        let results = slots
            .into_iter()
            .zip(chunks)
            .map(|(slot, chunk)| {
                slot.ok_or_else(|| Error::Dispatch(format!("chunk {} produced no result", chunk.index + 1)))
            })
            .collect::<Result<Vec<_>>>()?;

        let output = DispatchOutput { results };
        let failed = output.failed_indices();
        if !failed.is_empty() {
            let numbers: Vec<usize> = failed.iter().map(|i| i + 1).collect();
            warn!("Failed chunks: {:?}", numbers);
        }
        Ok(output)
    }
}
