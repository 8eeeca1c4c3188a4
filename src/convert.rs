//! Conversion entry points: a whole folder, a single file, or a preview.
//!
//! Every entry point drives the same per-document sequence on a borrowed
//! [`BrowserView`]:
//!
//! ```text
//! read ─▶ render HTML ─▶ temp .html ─▶ navigate ─▶ poll ─▶ print ─▶ delete temp
//! ```
//!
//! Files are processed strictly one after another. Fatal conditions (missing
//! folder, unavailable diagram script) surface as [`Md2PdfError`]; anything
//! that goes wrong with one file is recorded in its [`JobResult`] and the
//! batch moves on.

use crate::browser::BrowserView;
use crate::config::ConversionConfig;
use crate::error::{JobError, Md2PdfError};
use crate::output::{output_path_for, BatchOutput, BatchStats, JobOutcome, JobResult};
use crate::pipeline::poll::{wait_for_render, PollOutcome, Sleeper};
use crate::pipeline::{asset, export, html, scan};
use crate::report::{BatchEvent, EventSink};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// List the Markdown files a batch over `dir` would convert.
///
/// # Errors
/// [`Md2PdfError::DirectoryNotFound`] / [`Md2PdfError::NotADirectory`] when
/// `dir` is not an existing folder.
pub fn list_markdown_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, Md2PdfError> {
    check_directory(dir)?;
    Ok(scan::scan_markdown_files(dir, recursive))
}

/// Convert every Markdown file in `dir` to a PDF next to it.
///
/// Progress is reported to `sink`. Returns `Ok` even if some files failed;
/// check `output.stats.failed`.
///
/// # Errors
/// Only for conditions that prevent the batch from starting: the folder is
/// missing, or `mermaid.min.js` cannot be resolved.
pub async fn convert_folder<V, S>(
    view: &mut V,
    dir: &Path,
    config: &ConversionConfig,
    sink: &dyn EventSink,
    sleeper: &S,
) -> Result<BatchOutput, Md2PdfError>
where
    V: BrowserView + ?Sized,
    S: Sleeper + ?Sized,
{
    let batch_start = Instant::now();
    let files = list_markdown_files(dir, config.recursive)?;

    if files.is_empty() {
        sink.emit(BatchEvent::NoFilesFound {
            recursive: config.recursive,
        });
        return Ok(BatchOutput {
            root: dir.to_path_buf(),
            ..BatchOutput::default()
        });
    }

    let script = asset::resolve_script(config).await?;
    let total = files.len();
    info!("Converting {} Markdown files in {}", total, dir.display());
    sink.emit(BatchEvent::BatchStarted {
        total,
        recursive: config.recursive,
    });

    let mut jobs = Vec::with_capacity(total);
    for (i, source) in files.iter().enumerate() {
        let index = i + 1;
        let relative = scan::relative_display(dir, source);
        sink.emit(BatchEvent::JobStarted {
            index,
            total,
            relative: relative.clone(),
        });

        let job = run_job(view, source, relative.clone(), &script, config, sleeper).await;

        sink.emit(match &job.outcome {
            JobOutcome::Converted { output } => BatchEvent::JobCompleted {
                index,
                total,
                relative,
                output: output.clone(),
                duration_ms: job.duration_ms,
            },
            JobOutcome::Skipped => BatchEvent::JobSkipped {
                index,
                total,
                relative,
            },
            JobOutcome::Failed { error } => BatchEvent::JobFailed {
                index,
                total,
                relative,
                error: error.to_string(),
            },
        });
        jobs.push(job);

        if index < total {
            sleeper.sleep(config.inter_file_delay).await;
        }
    }

    let stats = tally(&jobs, batch_start.elapsed().as_millis() as u64);
    info!(
        "Batch finished: {} converted, {} skipped, {} failed",
        stats.converted, stats.skipped, stats.failed
    );
    sink.emit(BatchEvent::BatchCompleted {
        stats: stats.clone(),
    });

    Ok(BatchOutput {
        root: dir.to_path_buf(),
        jobs,
        stats,
    })
}

/// Convert one Markdown file to a PDF next to it.
///
/// A per-file failure is returned inside the [`JobResult`], not as `Err`.
pub async fn convert_file<V, S>(
    view: &mut V,
    source: &Path,
    config: &ConversionConfig,
    sleeper: &S,
) -> Result<JobResult, Md2PdfError>
where
    V: BrowserView + ?Sized,
    S: Sleeper + ?Sized,
{
    check_file(source)?;
    let script = asset::resolve_script(config).await?;
    let relative = source
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| source.to_path_buf());
    Ok(run_job(view, source, relative, &script, config, sleeper).await)
}

/// Load `source` into `view` exactly as a conversion would, without printing.
///
/// Empty files show a short placeholder page instead. The document stays
/// displayed after return, so the caller may still export it with
/// [`crate::pipeline::export::export_pdf`].
pub async fn preview_file<V, S>(
    view: &mut V,
    source: &Path,
    config: &ConversionConfig,
    sleeper: &S,
) -> Result<PollOutcome, Md2PdfError>
where
    V: BrowserView + ?Sized,
    S: Sleeper + ?Sized,
{
    check_file(source)?;
    let markdown = read_markdown(source).await?;

    if markdown.trim().is_empty() {
        let placeholder = write_temp_html(html::EMPTY_PREVIEW_HTML)?;
        navigate(view, &placeholder, config).await?;
        discard(placeholder);
        return Ok(PollOutcome::default());
    }

    let script = asset::resolve_script(config).await?;
    let document = load_document(view, &markdown, &script, config, sleeper).await?;
    let poll = document.poll.clone();
    document.discard();
    Ok(poll)
}

/// Replace whatever `view` shows with an error page carrying `message`.
pub async fn show_error_page<V>(
    view: &mut V,
    message: &str,
    config: &ConversionConfig,
) -> Result<(), Md2PdfError>
where
    V: BrowserView + ?Sized,
{
    let page = write_temp_html(&html::error_preview_html(message))?;
    let shown = navigate(view, &page, config).await;
    discard(page);
    Ok(shown?)
}

// ── Per-document steps ───────────────────────────────────────────────────

/// A document loaded in the view, backed by a temp file that lives until
/// the document has been printed.
struct LoadedDocument {
    poll: PollOutcome,
    html_file: TempPath,
}

impl LoadedDocument {
    fn discard(self) {
        discard(self.html_file);
    }
}

async fn run_job<V, S>(
    view: &mut V,
    source: &Path,
    relative: PathBuf,
    script: &Path,
    config: &ConversionConfig,
    sleeper: &S,
) -> JobResult
where
    V: BrowserView + ?Sized,
    S: Sleeper + ?Sized,
{
    let start = Instant::now();
    let output = output_path_for(source);
    let mut render_state = None;
    let mut has_diagrams = false;

    let outcome = match read_markdown(source).await {
        Err(error) => JobOutcome::Failed { error },
        Ok(markdown) if markdown.trim().is_empty() => {
            debug!("{} is empty, skipping", relative.display());
            JobOutcome::Skipped
        }
        Ok(markdown) => {
            has_diagrams = html::contains_diagrams(&markdown);
            debug!(
                "{}: {}",
                relative.display(),
                if has_diagrams { "Mermaid diagrams found" } else { "no diagrams" }
            );
            match load_document(view, &markdown, script, config, sleeper).await {
                Err(error) => JobOutcome::Failed { error },
                Ok(document) => {
                    render_state = document.poll.final_state.clone();
                    let exported = export::export_pdf(view, &config.pdf, &output).await;
                    document.discard();
                    match exported {
                        Ok(_) => JobOutcome::Converted {
                            output: output.clone(),
                        },
                        Err(error) => JobOutcome::Failed { error },
                    }
                }
            }
        }
    };

    if let JobOutcome::Failed { ref error } = outcome {
        warn!("{}: {}", relative.display(), error);
    }

    JobResult {
        source: source.to_path_buf(),
        relative,
        output,
        outcome,
        render_state,
        has_diagrams,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Read a Markdown file as UTF-8, dropping a leading byte-order mark.
async fn read_markdown(source: &Path) -> Result<String, JobError> {
    let text = tokio::fs::read_to_string(source)
        .await
        .map_err(|e| JobError::ReadFailed {
            path: source.to_path_buf(),
            detail: e.to_string(),
        })?;
    Ok(strip_bom(text))
}

fn strip_bom(text: String) -> String {
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_owned(),
        None => text,
    }
}

/// Render, write, navigate and wait for diagrams.
async fn load_document<V, S>(
    view: &mut V,
    markdown: &str,
    script: &Path,
    config: &ConversionConfig,
    sleeper: &S,
) -> Result<LoadedDocument, JobError>
where
    V: BrowserView + ?Sized,
    S: Sleeper + ?Sized,
{
    let document = html::embed_script_path(&html::render_document(markdown), script);
    let html_file = write_temp_html(&document)?;

    if let Err(e) = navigate(view, &html_file, config).await {
        discard(html_file);
        return Err(e);
    }

    let poll = wait_for_render(view, &config.timing, sleeper).await;
    debug!(
        "Render wait done after {} checks (converged: {}, fallback: {})",
        poll.attempts, poll.converged, poll.fell_back
    );
    Ok(LoadedDocument { poll, html_file })
}

/// Navigate to a local file, bounded by the configured timeout.
async fn navigate<V>(view: &mut V, file: &Path, config: &ConversionConfig) -> Result<(), JobError>
where
    V: BrowserView + ?Sized,
{
    let limit = config.timing.navigation_timeout;
    let url = html::file_url(file);
    debug!("Navigating to {}", url);

    match tokio::time::timeout(limit, view.navigate(&url)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(JobError::NavigationFailed {
            detail: e.to_string(),
        }),
        Err(_) => Err(JobError::NavigationTimeout {
            secs: limit.as_secs(),
        }),
    }
}

fn write_temp_html(document: &str) -> Result<TempPath, JobError> {
    let temp_failed = |e: std::io::Error| JobError::TempFile {
        detail: e.to_string(),
    };
    let mut file = tempfile::Builder::new()
        .prefix("md2pdf-")
        .suffix(".html")
        .tempfile()
        .map_err(temp_failed)?;
    file.write_all(document.as_bytes()).map_err(temp_failed)?;
    file.flush().map_err(temp_failed)?;
    Ok(file.into_temp_path())
}

/// Best-effort delete of a temp document.
fn discard(path: TempPath) {
    let shown = path.display().to_string();
    if let Err(e) = path.close() {
        debug!("Could not delete temp file {}: {}", shown, e);
    }
}

// ── Validation and stats ─────────────────────────────────────────────────

fn check_directory(dir: &Path) -> Result<(), Md2PdfError> {
    if !dir.exists() {
        return Err(Md2PdfError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(Md2PdfError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }
    Ok(())
}

pub(crate) fn check_file(path: &Path) -> Result<(), Md2PdfError> {
    if !path.is_file() {
        return Err(Md2PdfError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn tally(jobs: &[JobResult], total_duration_ms: u64) -> BatchStats {
    let mut stats = BatchStats {
        found: jobs.len(),
        total_duration_ms,
        ..BatchStats::default()
    };
    for job in jobs {
        match job.outcome {
            JobOutcome::Converted { .. } => stats.converted += 1,
            JobOutcome::Skipped => stats.skipped += 1,
            JobOutcome::Failed { .. } => stats.failed += 1,
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job(outcome: JobOutcome) -> JobResult {
        JobResult {
            source: PathBuf::from("a.md"),
            relative: PathBuf::from("a.md"),
            output: PathBuf::from("a.pdf"),
            outcome,
            render_state: None,
            has_diagrams: false,
            duration_ms: 0,
        }
    }

    #[test]
    fn tally_counts_each_outcome() {
        let jobs = vec![
            job(JobOutcome::Converted {
                output: PathBuf::from("a.pdf"),
            }),
            job(JobOutcome::Skipped),
            job(JobOutcome::Failed {
                error: JobError::NavigationTimeout { secs: 10 },
            }),
            job(JobOutcome::Converted {
                output: PathBuf::from("b.pdf"),
            }),
        ];
        let stats = tally(&jobs, 42);
        assert_eq!(stats.found, 4);
        assert_eq!(stats.converted, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_duration_ms, 42);
    }

    #[test]
    fn missing_directory_is_fatal() {
        let err = list_markdown_files(Path::new("/no/such/folder"), false).unwrap_err();
        assert!(matches!(err, Md2PdfError::DirectoryNotFound { .. }));
    }

    #[test]
    fn file_instead_of_directory_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.md");
        std::fs::write(&file, "# A").unwrap();
        let err = list_markdown_files(&file, false).unwrap_err();
        assert!(matches!(err, Md2PdfError::NotADirectory { .. }));
    }

    #[test]
    fn temp_html_is_written_and_discarded() {
        let path = write_temp_html("<html></html>").unwrap();
        let kept = path.to_path_buf();
        assert!(kept.file_name().unwrap().to_string_lossy().starts_with("md2pdf-"));
        assert_eq!(kept.extension().unwrap(), "html");
        assert_eq!(std::fs::read_to_string(&kept).unwrap(), "<html></html>");

        discard(path);
        assert!(!kept.exists());
    }

    #[tokio::test]
    async fn unreadable_file_is_a_read_failure() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("latin1.md");
        std::fs::write(&file, [0x23, 0x20, 0xE9, 0xFF]).unwrap();

        let err = read_markdown(&file).await.unwrap_err();
        assert!(matches!(err, JobError::ReadFailed { .. }));
    }

    #[tokio::test]
    async fn leading_byte_order_mark_is_dropped() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("bom.md");
        std::fs::write(&file, "\u{feff}# Title\n").unwrap();

        let text = read_markdown(&file).await.unwrap();
        assert_eq!(text, "# Title\n");
    }

    #[test]
    fn only_a_leading_bom_is_stripped() {
        assert_eq!(strip_bom("\u{feff}\r\n".into()), "\r\n");
        assert_eq!(strip_bom("a\u{feff}b".into()), "a\u{feff}b");
        assert_eq!(strip_bom(String::new()), "");
    }
}
