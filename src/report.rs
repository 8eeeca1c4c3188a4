//! Structured reporting of batch progress.
//!
//! Inject an [`EventSink`] into [`crate::convert::convert_folder`] to receive
//! a [`BatchEvent`] for every milestone: files found, each job starting,
//! completing, being skipped or failing, and the final tally.
//!
//! # Why a sink instead of log lines?
//!
//! The library never decides how progress is shown. A terminal progress bar,
//! a GUI log list, a JSON log or a test assertion all consume the same typed
//! events. The trait is `Send + Sync` so a sink can be shared with a UI
//! thread behind an `Arc`.
//!
//! # Example
//!
//! ```rust
//! use md2pdf::{BatchEvent, CollectingSink, EventSink};
//!
//! let sink = CollectingSink::default();
//! sink.emit(BatchEvent::NoFilesFound { recursive: false });
//! assert_eq!(sink.events().len(), 1);
//! ```

use crate::output::BatchStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// A single progress event of a batch conversion.
///
/// `relative` paths are relative to the scanned folder, which is what users
/// recognise in log output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    /// The scan found no Markdown files.
    NoFilesFound { recursive: bool },

    /// Conversion is about to begin.
    BatchStarted { total: usize, recursive: bool },

    /// A file is being converted (1-indexed position).
    JobStarted {
        index: usize,
        total: usize,
        relative: PathBuf,
    },

    /// A PDF was written.
    JobCompleted {
        index: usize,
        total: usize,
        relative: PathBuf,
        output: PathBuf,
        duration_ms: u64,
    },

    /// The file was empty or whitespace-only; no PDF produced.
    JobSkipped {
        index: usize,
        total: usize,
        relative: PathBuf,
    },

    /// The file could not be converted.
    JobFailed {
        index: usize,
        total: usize,
        relative: PathBuf,
        error: String,
    },

    /// Every file has been attempted.
    BatchCompleted { stats: BatchStats },
}

/// Receives [`BatchEvent`]s from the conversion routine.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BatchEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: BatchEvent) {
        (**self).emit(event)
    }
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn emit(&self, event: BatchEvent) {
        (**self).emit(event)
    }
}

/// Discards every event.
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: BatchEvent) {}
}

/// Forwards events to `tracing` as human-readable lines.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: BatchEvent) {
        match event {
            BatchEvent::NoFilesFound { .. } => {
                warn!("No Markdown files found in the selected folder")
            }
            BatchEvent::BatchStarted { total, recursive } => info!(
                "Found {} Markdown files ({}); starting conversion",
                total,
                if recursive { "including subfolders" } else { "top folder only" }
            ),
            BatchEvent::JobStarted { relative, .. } => {
                info!("Converting: {}", relative.display())
            }
            BatchEvent::JobCompleted {
                relative, output, ..
            } => info!(
                "✓ Done: {} → {}",
                relative.display(),
                output
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            ),
            BatchEvent::JobSkipped { relative, .. } => {
                info!("Skipped (empty file): {}", relative.display())
            }
            BatchEvent::JobFailed {
                relative, error, ..
            } => warn!("✗ Failed ({}): {}", relative.display(), error),
            BatchEvent::BatchCompleted { stats } => info!(
                "Conversion finished: {} succeeded, {} failed, {} skipped",
                stats.converted, stats.failed, stats.skipped
            ),
        }
    }
}

/// Buffers every event in memory; handy for tests and for UIs that poll.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<BatchEvent>>,
}

impl CollectingSink {
    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<BatchEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: BatchEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
