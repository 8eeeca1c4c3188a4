//! Interactive preview: one Markdown file at a time, with refresh and
//! stepping through the other files of the same folder.
//!
//! A [`PreviewSession`] only tracks *which* file is shown. Rendering goes
//! through [`preview_file`], so what the preview displays is exactly what a
//! conversion would print. When a file cannot be shown, the view switches to
//! an error page instead of keeping the previous document.

use crate::browser::BrowserView;
use crate::config::ConversionConfig;
use crate::convert::{check_file, list_markdown_files, preview_file, show_error_page};
use crate::error::Md2PdfError;
use crate::pipeline::poll::{PollOutcome, Sleeper};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A line typed by the user while a preview is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewCommand {
    Refresh,
    Next,
    Prev,
    Quit,
}

impl PreviewCommand {
    /// Parse `r`, `n`, `p` or `q` (or the full word), ignoring case and
    /// surrounding whitespace.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "r" | "refresh" => Some(Self::Refresh),
            "n" | "next" => Some(Self::Next),
            "p" | "prev" | "previous" => Some(Self::Prev),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// What [`PreviewSession::show`] ended up displaying.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewShown {
    Rendered(PollOutcome),
    /// The file could not be loaded; the view shows this message instead.
    Failed(String),
}

/// The file list of a preview and the position in it.
#[derive(Debug, Clone)]
pub struct PreviewSession {
    root: PathBuf,
    files: Vec<PathBuf>,
    index: usize,
}

impl PreviewSession {
    /// Start on `file`, with its folder's Markdown files as neighbours.
    ///
    /// `file` is always part of the list, even when a folder scan would skip
    /// it (a dotfile, another extension).
    ///
    /// # Errors
    /// [`Md2PdfError::FileNotFound`] when `file` is not an existing file.
    pub fn open(file: &Path, recursive: bool) -> Result<Self, Md2PdfError> {
        check_file(file)?;

        let root = match file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let current = match file.file_name() {
            Some(name) => root.join(name),
            None => file.to_path_buf(),
        };

        let mut files = list_markdown_files(&root, recursive)?;
        if !files.contains(&current) {
            files.push(current.clone());
            files.sort();
        }
        let index = files.iter().position(|f| *f == current).unwrap_or(0);
        debug!(
            "Preview of {} ({} files in {})",
            current.display(),
            files.len(),
            root.display()
        );

        Ok(Self { root, files, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// The file currently shown.
    pub fn current(&self) -> &Path {
        &self.files[self.index]
    }

    /// 1-based position of the current file and the list length.
    pub fn position(&self) -> (usize, usize) {
        (self.index + 1, self.files.len())
    }

    /// Move to the next file. `false` (and no move) at the end of the list.
    pub fn next(&mut self) -> bool {
        if self.index + 1 < self.files.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    /// Move to the previous file. `false` (and no move) at the start.
    pub fn prev(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// (Re)load the current file from disk into `view`.
    ///
    /// # Errors
    /// Only when not even the error page could be displayed.
    pub async fn show<V, S>(
        &self,
        view: &mut V,
        config: &ConversionConfig,
        sleeper: &S,
    ) -> Result<PreviewShown, Md2PdfError>
    where
        V: BrowserView + ?Sized,
        S: Sleeper + ?Sized,
    {
        match preview_file(view, self.current(), config, sleeper).await {
            Ok(poll) => Ok(PreviewShown::Rendered(poll)),
            Err(e) => {
                let message = format!("{}\n\n{}", self.current().display(), e);
                warn!("Preview failed: {}", message);
                show_error_page(view, &message, config).await?;
                Ok(PreviewShown::Failed(e.to_string()))
            }
        }
    }
}
