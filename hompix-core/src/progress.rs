//! Progress reporting and cooperative cancellation for long-running stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Progress value published by a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Completion percentage in `0..=100`.
    Percent(u8),
    /// Stage of unknown length is running.
    Indeterminate,
}

/// Receiver for progress, status text and warnings.
///
/// Implementations must be cheap to call; stages call `is_cancelled` in
/// their inner loops.
pub trait ProgressSink: Send + Sync {
    /// Publishes a progress value.
    fn progress(&self, progress: Progress);

    /// Publishes a human-readable status line.
    fn status(&self, message: &str);

    /// Publishes a non-fatal warning.
    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }

    /// Returns true once cancellation has been requested.
    fn is_cancelled(&self) -> bool;
}

/// Sink that drops everything and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&self, _progress: Progress) {}

    fn status(&self, _message: &str) {}

    fn warn(&self, _message: &str) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Converts a running count into percent updates, emitting only on change.
#[derive(Debug)]
pub struct ProgressCounter {
    total: u64,
    last: Option<u8>,
}

impl ProgressCounter {
    /// Creates a counter for `total` units of work.
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self { total, last: None }
    }

    /// Reports `done` units complete. Returns the new percentage if it changed.
    #[allow(clippy::cast_possible_truncation)]
    pub fn update(&mut self, done: u64, sink: &dyn ProgressSink) -> Option<u8> {
        let percent = if self.total == 0 {
            100
        } else {
            (done.min(self.total) * 100 / self.total) as u8
        };
        if self.last == Some(percent) {
            return None;
        }
        self.last = Some(percent);
        sink.progress(Progress::Percent(percent));
        Some(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Progress>>,
    }

    impl ProgressSink for Recorder {
        fn progress(&self, progress: Progress) {
            self.seen.lock().unwrap().push(progress);
        }
        fn status(&self, _message: &str) {}
        fn is_cancelled(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_counter_emits_only_on_change() {
        let recorder = Recorder::default();
        let mut counter = ProgressCounter::new(1000);
        for done in 0..=1000 {
            counter.update(done, &recorder);
        }
        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 101);
        assert_eq!(seen.first(), Some(&Progress::Percent(0)));
        assert_eq!(seen.last(), Some(&Progress::Percent(100)));
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
