//! PDF export: print the loaded document and write it next to its source.

use crate::browser::BrowserView;
use crate::config::PdfSettings;
use crate::error::JobError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Print the document currently loaded in `view` and write it to `output`.
///
/// Uses atomic write (temp file + rename) so a failed export never leaves a
/// truncated PDF behind. An existing file at `output` is replaced.
pub async fn export_pdf<V>(
    view: &mut V,
    settings: &PdfSettings,
    output: &Path,
) -> Result<u64, JobError>
where
    V: BrowserView + ?Sized,
{
    let bytes = view
        .print_to_pdf(settings)
        .await
        .map_err(|e| export_failed(output, e))?;

    let tmp_path = tmp_path_for(output);
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| export_failed(output, e))?;

    if let Err(e) = tokio::fs::rename(&tmp_path, output).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(export_failed(output, e));
    }

    debug!("Wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(bytes.len() as u64)
}

fn tmp_path_for(output: &Path) -> PathBuf {
    output.with_extension("pdf.tmp")
}

fn export_failed(path: &Path, e: impl std::fmt::Display) -> JobError {
    JobError::ExportFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}
