//! # md2pdf
//!
//! Batch-convert a folder of Markdown files to PDF through a headless
//! Chromium, with [Mermaid](https://mermaid.js.org/) diagrams rendered
//! before each page is printed.
//!
//! ## Why a browser?
//!
//! Mermaid diagrams only exist once their JavaScript has run. Printing the
//! page from a real browser engine gives exactly what a reader sees on
//! screen: fonts, tables, syntax colours and rendered SVG diagrams. The hard
//! part is knowing *when* to print; this crate polls the page until every
//! diagram has become an SVG, within a bounded time, then prints anyway.
//!
//! ## Pipeline Overview
//!
//! ```text
//! folder
//!  │
//!  ├─ 1. Scan     *.md files (optionally recursive, dotfiles skipped)
//!  ├─ 2. Render   Markdown → HTML document with mermaid.min.js embedded
//!  ├─ 3. Load     temp .html → navigate (bounded by a timeout)
//!  ├─ 4. Poll     check script until diagrams are ready (≤ 20 checks)
//!  └─ 5. Export   print to A4 PDF → doc.md becomes doc.pdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "chromium")]
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use md2pdf::{convert_folder, BrowserOptions, ChromiumView, ConversionConfig,
//!              TokioSleeper, TracingSink};
//! use std::path::Path;
//!
//! let config = ConversionConfig::builder().recursive(true).build()?;
//! let mut view = ChromiumView::launch(&BrowserOptions::default()).await?;
//! let output = convert_folder(&mut view, Path::new("docs"), &config,
//!                             &TracingSink, &TokioSleeper).await?;
//! eprintln!("{} converted, {} failed", output.stats.converted, output.stats.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature    | Default | Description |
//! |------------|---------|-------------|
//! | `cli`      | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `chromium` | on      | [`ChromiumView`], a [`BrowserView`] over the DevTools protocol |
//!
//! With both disabled the library still renders, polls and exports through
//! any [`BrowserView`] you implement:
//! ```toml
//! md2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod browser;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod preview;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

#[cfg(feature = "chromium")]
pub use browser::ChromiumView;
pub use browser::BrowserView;
pub use config::{BrowserOptions, ConversionConfig, ConversionConfigBuilder, Orientation, PdfSettings, PollTiming};
pub use convert::{convert_file, convert_folder, list_markdown_files, preview_file, show_error_page};
pub use error::{BrowserError, JobError, Md2PdfError};
pub use output::{output_path_for, BatchOutput, BatchStats, JobOutcome, JobResult};
pub use pipeline::poll::{PollOutcome, RenderState, Sleeper, TokioSleeper};
pub use preview::{PreviewCommand, PreviewSession, PreviewShown};
pub use report::{BatchEvent, CollectingSink, EventSink, NoopSink, TracingSink};
