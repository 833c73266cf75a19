//! Per-chunk retry loop around a single [`Translator`] call.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::chunker::Chunk;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::translator::Translator;
use crate::util::{char_len, preview};

/// Longest wait a server `Retry-After` hint may impose
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(600);

/// Fixed retry policy: `max_retries` extra attempts, `retry_delay` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Upper bound on one adapter call
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, retry_delay: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            attempt_timeout,
        }
    }

    pub const fn from_run_config(config: &RunConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay(), config.api_timeout())
    }

    /// Total adapter calls for a chunk that never succeeds.
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Outcome of one chunk after the worker is done with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub index: usize,
    /// Translation on success, placeholder-wrapped source text on failure
    pub text: String,
    pub success: bool,
    /// Adapter calls made, including the successful one
    pub attempts: u32,
}

impl ChunkResult {
    pub fn translated(index: usize, text: impl Into<String>, attempts: u32) -> Self {
        Self {
            index,
            text: text.into(),
            success: true,
            attempts,
        }
    }

    pub fn failed(chunk: &Chunk, attempts: u32) -> Self {
        Self {
            index: chunk.index,
            text: failure_placeholder(chunk),
            success: false,
            attempts,
        }
    }

    pub fn translated_text(&self) -> Option<&str> {
        self.success.then_some(self.text.as_str())
    }
}

/// Untranslated source wrapped in markers tagged with the 1-based chunk number.
pub fn failure_placeholder(chunk: &Chunk) -> String {
    format!(
        "\n[翻译失败 - Chunk {}]\n{}\n[/翻译失败]\n",
        chunk.index + 1,
        chunk.content
    )
}

/// States of the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// About to make attempt `n` (0-based), after waiting `wait`
    Pending { n: u32, wait: Duration },
    Succeeded { text: String, attempts: u32 },
    Exhausted { attempts: u32 },
}

impl Attempt {
    pub const fn start() -> Self {
        Self::Pending {
            n: 0,
            wait: Duration::ZERO,
        }
    }

    /// Transition after attempt `n` produced `outcome`.
    ///
    /// Fatal errors are returned as `Err`; they end the loop without retry.
    pub fn advance(n: u32, outcome: Result<String>, policy: &RetryPolicy) -> Result<Self> {
        match outcome {
            Ok(text) => Ok(Self::Succeeded { text, attempts: n + 1 }),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) if n < policy.max_retries => {
                let hinted = match e {
                    Error::TranslationRateLimited { retry_after: Some(secs) } => {
                        Duration::from_secs(secs).min(MAX_RETRY_AFTER)
                    }
                    _ => Duration::ZERO,
                };
                Ok(Self::Pending {
                    n: n + 1,
                    wait: policy.retry_delay.max(hinted),
                })
            }
            Err(_) => Ok(Self::Exhausted { attempts: n + 1 }),
        }
    }
}

/// Translates one chunk under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryingWorker {
    translator: Arc<dyn Translator>,
    policy: RetryPolicy,
    log_content: bool,
}

impl RetryingWorker {
    pub fn new(translator: Arc<dyn Translator>, policy: RetryPolicy) -> Self {
        Self {
            translator,
            policy,
            log_content: false,
        }
    }

    /// Log 100-char previews of source and translation at debug level
    #[must_use]
    pub const fn with_content_logging(mut self, enabled: bool) -> Self {
        self.log_content = enabled;
        self
    }

    /// Run the retry loop for `chunk`; `total` is only used in log tags.
    ///
    /// Returns `Ok` for both success and exhaustion. `Err` means a fatal
    /// configuration error that no retry could fix.
    pub async fn run(&self, chunk: &Chunk, total: usize) -> Result<ChunkResult> {
        let tag = format!("[Chunk {}/{}]", chunk.index + 1, total);
        let mut state = Attempt::start();

        loop {
            state = match state {
                Attempt::Pending { n, wait } => {
                    if n > 0 {
                        warn!("{} retry {}/{} in {:?}", tag, n, self.policy.max_retries, wait);
                        tokio::time::sleep(wait).await;
                    } else {
                        debug!("{} start ({} chars)", tag, char_len(&chunk.content));
                        if self.log_content {
                            debug!("{} source: {}", tag, preview(&chunk.content, 100));
                        }
                    }

                    let outcome = self.attempt(&chunk.content).await;
                    if let Err(ref e) = outcome {
                        if e.is_fatal() {
                            error!("{} configuration error: {}", tag, e);
                        } else {
                            warn!("{} attempt {} failed: {}", tag, n + 1, e);
                        }
                    }
                    Attempt::advance(n, outcome, &self.policy)?
                }
                Attempt::Succeeded { text, attempts } => {
                    if self.log_content {
                        debug!("{} done: {}", tag, preview(&text, 100));
                    } else {
                        debug!("{} done", tag);
                    }
                    return Ok(ChunkResult::translated(chunk.index, text, attempts));
                }
                Attempt::Exhausted { attempts } => {
                    error!("{} giving up after {} attempts", tag, attempts);
                    return Ok(ChunkResult::failed(chunk, attempts));
                }
            };
        }
    }

    async fn attempt(&self, content: &str) -> Result<String> {
        let text = tokio::time::timeout(self.policy.attempt_timeout, self.translator.translate(content))
            .await
            .map_err(|_| Error::TranslationTimeout)??;

        if text.trim().is_empty() {
            return Err(Error::TranslationInvalidResponse("empty translation".to_string()));
        }
        Ok(text)
    }
}
