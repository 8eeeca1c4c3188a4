//! Error types for the md2pdf library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`Md2PdfError`] is **fatal**: the batch cannot start at all (folder
//!   missing, browser engine failed to launch, diagram script unavailable).
//!   Returned as `Err(Md2PdfError)` from the top-level entry points.
//!
//! * [`JobError`] is **non-fatal**: a single file failed (navigation timed
//!   out, PDF could not be written) but the rest of the batch is fine.
//!   Stored inside [`crate::output::JobOutcome::Failed`] so callers can
//!   report partial success instead of losing the whole folder to one file.
//!
//! * [`BrowserError`] marks the engine boundary. Implementations of
//!   [`crate::browser::BrowserView`] return it; the conversion layer maps it
//!   to a [`JobError`] or, for script failures, swallows it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The folder to convert does not exist.
    #[error("Folder not found: '{path}'\nCheck the path exists and is readable.")]
    DirectoryNotFound { path: PathBuf },

    /// The path exists but is a file, not a folder.
    #[error("'{path}' is not a folder")]
    NotADirectory { path: PathBuf },

    /// A single Markdown file passed to preview/convert does not exist.
    #[error("Markdown file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The browser engine could not be initialised; no conversion is possible.
    #[error(
        "Failed to start the browser engine: {0}\n\n\
Chromium or Google Chrome must be installed.\n\
  • Point --chrome (or CHROME_PATH) at the browser executable.\n\
  • On Linux containers you may need --no-sandbox style flags via --chrome-arg.\n"
    )]
    BrowserInitFailed(String),

    /// `mermaid.min.js` could not be located or fetched.
    #[error(
        "Diagram script unavailable: {0}\n\
Set MERMAID_JS_PATH=/path/to/mermaid.min.js or pass --mermaid-js."
    )]
    AssetUnavailable(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A single-file operation (preview, `--export`) failed.
    #[error("{0}")]
    Job(#[from] JobError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<mermaid_auto::MermaidAutoError> for Md2PdfError {
    fn from(e: mermaid_auto::MermaidAutoError) -> Self {
        Md2PdfError::AssetUnavailable(e.to_string())
    }
}

/// A non-fatal error for a single file.
///
/// The batch continues with the next file after recording it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum JobError {
    /// The Markdown file could not be read as UTF-8 text.
    #[error("failed to read '{path}': {detail}")]
    ReadFailed { path: PathBuf, detail: String },

    /// The temporary HTML document could not be written.
    #[error("failed to write temporary HTML: {detail}")]
    TempFile { detail: String },

    /// Navigation did not complete within the configured bound.
    #[error("page load timed out after {secs}s")]
    NavigationTimeout { secs: u64 },

    /// The engine reported that navigation failed.
    #[error("navigation failed: {detail}")]
    NavigationFailed { detail: String },

    /// Printing or writing the PDF failed.
    #[error("PDF export to '{path}' failed: {detail}")]
    ExportFailed { path: PathBuf, detail: String },
}

/// Errors raised by a [`crate::browser::BrowserView`] implementation.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Navigation was rejected or the page failed to load.
    #[error("navigation error: {0}")]
    Navigation(String),

    /// Script evaluation failed inside the engine.
    #[error("script execution failed: {0}")]
    Script(String),

    /// Print-to-PDF failed.
    #[error("print to PDF failed: {0}")]
    Print(String),

    /// The view has already been closed.
    #[error("browser view is closed")]
    Closed,
}
