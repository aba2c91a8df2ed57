//! Bounded pool running imports in the background.
//!
//! Each submitted file runs as one task on a rayon pool and reports through
//! its own channel. The final [`ImportEvent::Finished`] is sent exactly once.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use hompix_core::{CancelFlag, ImportSettings, Progress, ProgressSink};

use crate::pipeline::{run_import, ImportOutcome};
use crate::Result;

/// Messages sent from an import task to its owner.
#[derive(Debug)]
pub enum ImportEvent {
    /// Stage progress.
    Progress(Progress),
    /// Stage status line.
    Status(String),
    /// Non-fatal warning.
    Warning(String),
    /// Import finished.
    Finished(ImportOutcome),
}

/// Progress sink forwarding everything to a channel.
struct ChannelProgress {
    tx: Sender<ImportEvent>,
    cancel: CancelFlag,
}

impl ProgressSink for ChannelProgress {
    fn progress(&self, progress: Progress) {
        let _ = self.tx.send(ImportEvent::Progress(progress));
    }

    fn status(&self, message: &str) {
        let _ = self.tx.send(ImportEvent::Status(message.to_string()));
    }

    fn warn(&self, message: &str) {
        log::warn!("{message}");
        let _ = self.tx.send(ImportEvent::Warning(message.to_string()));
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Owner side of one running import.
pub struct ImportHandle {
    path: PathBuf,
    cancel: CancelFlag,
    events: Receiver<ImportEvent>,
}

impl ImportHandle {
    /// File being imported.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Requests cancellation. The task stops at its next safe point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Event stream of the task.
    #[must_use]
    pub fn events(&self) -> &Receiver<ImportEvent> {
        &self.events
    }

    /// Blocks until the task finishes, passing every other event to `on_event`.
    ///
    /// A task that disappears without finishing counts as cancelled.
    pub fn wait_with<F: FnMut(&ImportEvent)>(self, mut on_event: F) -> ImportOutcome {
        for event in &self.events {
            if let ImportEvent::Finished(outcome) = event {
                return outcome;
            }
            on_event(&event);
        }
        ImportOutcome::Cancelled
    }

    /// Blocks until the task finishes.
    pub fn wait(self) -> ImportOutcome {
        self.wait_with(|_| {})
    }
}

/// Thread pool sized by the import thread budget.
pub struct ImportPool {
    pool: rayon::ThreadPool,
}

impl ImportPool {
    /// Creates a pool with `threads` workers.
    ///
    /// # Errors
    /// Returns an error if the worker threads cannot be started.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("hompix-import-{i}"))
            .build()?;
        log::debug!("import pool with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    /// Creates a pool sized by `settings.max_threads`.
    ///
    /// # Errors
    /// Returns an error if the worker threads cannot be started.
    pub fn from_settings(settings: &ImportSettings) -> Result<Self> {
        Self::new(settings.max_threads)
    }

    /// Number of worker threads.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queues an import of `path` and returns its handle.
    pub fn submit(&self, path: impl Into<PathBuf>, settings: Arc<ImportSettings>) -> ImportHandle {
        let path = path.into();
        let (tx, events) = channel();
        let cancel = CancelFlag::new();
        let sink = ChannelProgress {
            tx,
            cancel: cancel.clone(),
        };
        let task_path = path.clone();
        self.pool.spawn(move || {
            let outcome = run_import(&task_path, &settings, &sink);
            let _ = sink.tx.send(ImportEvent::Finished(outcome));
        });
        ImportHandle {
            path,
            cancel,
            events,
        }
    }
}
