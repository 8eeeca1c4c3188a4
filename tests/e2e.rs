//! End-to-end tests against a real Chromium.
//!
//! These launch the browser and load `mermaid.min.js` (downloading it on
//! first use unless `MERMAID_JS_PATH` points at a copy). They are gated
//! behind the `E2E_ENABLED` environment variable so they do not run in CI
//! unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! In a container, Chromium usually needs its sandbox disabled:
//!   E2E_ENABLED=1 E2E_CHROME_ARGS=--no-sandbox cargo test --test e2e

#![cfg(feature = "chromium")]

use md2pdf::{
    convert_folder, preview_file, BrowserOptions, BrowserView, ChromiumView, CollectingSink,
    ConversionConfig, RenderState, TokioSleeper,
};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test if E2E_ENABLED is not set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

fn browser_options() -> BrowserOptions {
    BrowserOptions {
        chrome_executable: std::env::var_os("CHROME_PATH").map(Into::into),
        headed: false,
        extra_args: std::env::var("E2E_CHROME_ARGS")
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default(),
    }
}

/// Shorter waits than the defaults; still enough for Mermaid to initialise.
fn fast_config() -> ConversionConfig {
    ConversionConfig::builder()
        .warm_up(Duration::from_millis(500))
        .poll_interval(Duration::from_millis(250))
        .settle(Duration::from_millis(250))
        .inter_file_delay(Duration::ZERO)
        .build()
        .unwrap()
}

fn assert_pdf(path: &Path) {
    let bytes = std::fs::read(path)
        .unwrap_or_else(|e| panic!("missing PDF {}: {e}", path.display()));
    assert!(bytes.starts_with(b"%PDF-"), "{} is not a PDF", path.display());
    assert!(bytes.len() > 1000, "{} is suspiciously small", path.display());
}

const FLOWCHART: &str = "# Pipeline\n\n\
```mermaid\n\
graph LR\n  Scan --> Render --> Poll --> Export\n\
```\n\n\
| Step | Tool |\n|------|------|\n| Render | pulldown-cmark |\n| Print | Chromium |\n";

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_e2e_folder_with_diagrams() {
    e2e_skip_unless_enabled!();

    let docs = TempDir::new().unwrap();
    std::fs::write(docs.path().join("flow.md"), FLOWCHART).unwrap();
    std::fs::write(docs.path().join("plain.md"), "# Plain\n\nJust text, *no* diagrams.").unwrap();
    std::fs::write(docs.path().join("blank.md"), "\n\n").unwrap();

    let config = fast_config();
    let mut view = ChromiumView::launch(&browser_options()).await.unwrap();
    let sink = CollectingSink::default();

    let out = convert_folder(&mut view, docs.path(), &config, &sink, &TokioSleeper)
        .await
        .unwrap();
    view.close().await.unwrap();

    println!("{}", serde_json::to_string_pretty(&out.stats).unwrap());
    assert_eq!(out.stats.converted, 2);
    assert_eq!(out.stats.skipped, 1);
    assert_eq!(out.stats.failed, 0);

    assert_pdf(&docs.path().join("flow.pdf"));
    assert_pdf(&docs.path().join("plain.pdf"));
    assert!(!docs.path().join("blank.pdf").exists());

    let flow = out
        .jobs
        .iter()
        .find(|j| j.relative == Path::new("flow.md"))
        .unwrap();
    assert_eq!(flow.render_state, Some(RenderState::Ready));

    let plain = out
        .jobs
        .iter()
        .find(|j| j.relative == Path::new("plain.md"))
        .unwrap();
    assert_eq!(plain.render_state, Some(RenderState::NoDiagrams));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_e2e_preview_renders_diagram() {
    e2e_skip_unless_enabled!();

    let docs = TempDir::new().unwrap();
    let source = docs.path().join("flow.md");
    std::fs::write(&source, FLOWCHART).unwrap();

    let config = fast_config();
    let mut view = ChromiumView::launch(&browser_options()).await.unwrap();

    let poll = preview_file(&mut view, &source, &config, &TokioSleeper)
        .await
        .unwrap();
    let svg_count = view
        .execute_script("String(document.querySelectorAll('svg').length)")
        .await
        .unwrap();
    view.close().await.unwrap();

    assert!(poll.converged, "render did not converge: {poll:?}");
    assert_ne!(svg_count, "0");
    assert!(!docs.path().join("flow.pdf").exists());
}
