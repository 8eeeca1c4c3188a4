//! Locate `mermaid.min.js` for the generated documents.
//!
//! Resolution (and a possible first-run download) is blocking I/O, so it runs
//! in `spawn_blocking`. The returned path is absolute: it ends up in a
//! `file://` URL inside a document that lives in the system temp folder.

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use mermaid_auto::ResolveOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolve the Mermaid script for `config`.
///
/// Honours `config.mermaid_js` (must exist) and `config.offline`. Any failure
/// is fatal: without the script no document with diagrams can render.
pub async fn resolve_script(config: &ConversionConfig) -> Result<PathBuf, Md2PdfError> {
    let options = ResolveOptions {
        explicit: config.mermaid_js.clone(),
        allow_download: !config.offline,
    };

    if !mermaid_auto::is_mermaid_available() && options.explicit.is_none() && options.allow_download {
        info!(
            "Downloading mermaid {} (first run only)",
            mermaid_auto::MERMAID_VERSION
        );
    }

    let path = tokio::task::spawn_blocking(move || {
        mermaid_auto::resolve_mermaid_script(&options, None)
    })
    .await
    .map_err(|e| Md2PdfError::Internal(format!("Script resolution task panicked: {e}")))??;

    let path = absolute_script_path(&path);
    debug!("Using Mermaid script at {}", path.display());
    Ok(path)
}

/// Canonicalise `path`, dropping the `\\?\` verbatim prefix Windows adds,
/// which a `file:///` URL cannot carry.
pub fn absolute_script_path(path: &Path) -> PathBuf {
    let canonical = path
        .canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf());

    let text = canonical.to_string_lossy();
    match text.strip_prefix(r"\\?\") {
        Some(rest) => PathBuf::from(rest),
        None => canonical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn explicit_script_is_used() {
        let tmp = TempDir::new().unwrap();
        let script = tmp.path().join("mermaid.min.js");
        std::fs::write(&script, "window.mermaid = {};").unwrap();

        let config = ConversionConfig::builder()
            .mermaid_js(&script)
            .offline(true)
            .build()
            .unwrap();

        let resolved = resolve_script(&config).await.unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("mermaid.min.js"));
    }

    #[tokio::test]
    async fn missing_explicit_script_is_fatal() {
        let config = ConversionConfig::builder()
            .mermaid_js("/no/such/dir/mermaid.min.js")
            .build()
            .unwrap();

        let err = resolve_script(&config).await.unwrap_err();
        assert!(matches!(err, Md2PdfError::AssetUnavailable(_)));
    }

    #[test]
    fn relative_paths_become_absolute() {
        let p = absolute_script_path(Path::new("some/relative/mermaid.min.js"));
        assert!(p.is_absolute());
    }
}
