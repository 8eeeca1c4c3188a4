//! Result types returned by the conversion entry points.

use crate::error::JobError;
use crate::pipeline::poll::RenderState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What happened to one Markdown file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// A PDF was written to `output`.
    Converted { output: PathBuf },
    /// The file was empty or whitespace-only.
    Skipped,
    /// The job failed; the batch continued.
    Failed { error: JobError },
}

/// One conversion job: a Markdown file and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Absolute or caller-supplied path of the Markdown file.
    pub source: PathBuf,
    /// `source` relative to the scanned folder.
    pub relative: PathBuf,
    /// Where the PDF goes (derived from `source`, whether or not it was written).
    pub output: PathBuf,
    pub outcome: JobOutcome,
    /// Last diagram render state seen before export, if polling ran.
    pub render_state: Option<RenderState>,
    /// The Markdown contains at least one Mermaid fence.
    #[serde(default)]
    pub has_diagrams: bool,
    pub duration_ms: u64,
}

impl JobResult {
    pub fn is_converted(&self) -> bool {
        matches!(self.outcome, JobOutcome::Converted { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, JobOutcome::Failed { .. })
    }
}

/// Aggregate counters of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Markdown files found by the scan.
    pub found: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

/// Full result of [`crate::convert::convert_folder`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    /// The folder that was scanned.
    pub root: PathBuf,
    /// One entry per file, in scan order.
    pub jobs: Vec<JobResult>,
    pub stats: BatchStats,
}

/// Derive the PDF path for a Markdown file: same folder, same stem, `.pdf`.
///
/// Deterministic and idempotent: `doc.md` always maps to `doc.pdf`.
pub fn output_path_for(source: &Path) -> PathBuf {
    source.with_extension("pdf")
}
