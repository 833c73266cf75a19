//! Completion tracking for a dispatch run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

/// Emit at most one event per this many percentage points (plus 100%).
pub const PROGRESS_STEP_PERCENT: usize = 5;

/// Snapshot of a run's progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub percent: usize,
    pub elapsed: Duration,
}

/// Receives coarse-grained progress events.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event);
    }
}

/// Discards all events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Logs each event at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        info!(
            "Progress: {}% ({}/{}) | elapsed {:.1}s",
            event.percent,
            event.completed,
            event.total,
            event.elapsed.as_secs_f64()
        );
    }
}

/// Monotonic completed-count with 5%-step event throttling.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    started: Instant,
    completed: AtomicUsize,
    last_reported: AtomicUsize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started: Instant::now(),
            completed: AtomicUsize::new(0),
            last_reported: AtomicUsize::new(0),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Count one finished chunk; returns an event if it crosses a reporting step.
    pub fn record(&self) -> Option<ProgressEvent> {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let percent = (completed * 100).checked_div(self.total).unwrap_or(100).min(100);

        self.last_reported
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                let due = percent >= last + PROGRESS_STEP_PERCENT || (percent == 100 && last < 100);
                due.then_some(percent)
            })
            .ok()
            .map(|_| ProgressEvent {
                completed,
                total: self.total,
                percent,
                elapsed: self.started.elapsed(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_every_five_percent() {
        let tracker = ProgressTracker::new(100);
        let percents: Vec<usize> = (0..100).filter_map(|_| tracker.record()).map(|e| e.percent).collect();
        let expected: Vec<usize> = (1..=20).map(|i| i * 5).collect();
        assert_eq!(percents, expected);
        assert_eq!(tracker.completed(), 100);
    }

    #[test]
    fn test_small_runs_report_each_step_and_completion() {
        let tracker = ProgressTracker::new(3);
        let events: Vec<ProgressEvent> = (0..3).filter_map(|_| tracker.record()).collect();
        assert_eq!(events.iter().map(|e| e.percent).collect::<Vec<_>>(), vec![33, 66, 100]);
        assert_eq!(events.last().unwrap().completed, 3);
    }

    #[test]
    fn test_hundred_percent_reported_once() {
        let tracker = ProgressTracker::new(1);
        assert_eq!(tracker.record().map(|e| e.percent), Some(100));
        assert!(tracker.record().is_none());
    }

    #[test]
    fn test_closure_sink() {
        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |e: &ProgressEvent| seen.lock().unwrap().push(e.percent);
        let tracker = ProgressTracker::new(2);
        while let Some(event) = tracker.record() {
            sink.on_progress(&event);
            if event.percent == 100 {
                break;
            }
        }
        assert_eq!(*seen.lock().unwrap(), vec![50, 100]);
    }
}
