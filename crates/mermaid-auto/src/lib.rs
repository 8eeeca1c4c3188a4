//! # mermaid-auto
//!
//! Locate [Mermaid](https://mermaid.js.org/)'s browser bundle
//! (`mermaid.min.js`) on disk, downloading and caching it on first use, so a
//! generated HTML page can load it from a `file://` URL without any network
//! access at render time.
//!
//! ## Resolution order
//!
//! [`resolve_mermaid_script`] returns the first existing file from:
//!
//! 1. an explicit path supplied by the caller;
//! 2. `MERMAID_JS_PATH`;
//! 3. `assets/mermaid.min.js` or `Assets/mermaid.min.js` next to the running
//!    executable (the layout of a packaged install);
//! 4. the per-version cache, `~/.cache/md2pdf/mermaid-{VERSION}/`;
//! 5. a fresh download of the pinned npm tarball into that cache (skipped
//!    when downloads are disallowed).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mermaid_auto::{resolve_mermaid_script, ResolveOptions};
//!
//! let path = resolve_mermaid_script(&ResolveOptions::default(), Some(&|done, total| {
//!     if let Some(t) = total {
//!         eprint!("\rDownloading Mermaid: {}/{} bytes", done, t);
//!     }
//! }))
//! .expect("mermaid.min.js unavailable");
//! println!("{}", path.display());
//! ```
//!
//! ## Environment variable overrides
//!
//! - `MERMAID_JS_PATH`: path to an existing `mermaid.min.js`; skips download.
//! - `MERMAID_AUTO_CACHE_DIR`: override the default cache directory.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// The Mermaid release fetched when no local copy exists.
pub const MERMAID_VERSION: &str = "11.4.1";

/// File name of the browser bundle.
pub const SCRIPT_NAME: &str = "mermaid.min.js";

/// npm registry tarball base URL.
const REGISTRY_URL: &str = "https://registry.npmjs.org/mermaid/-";

/// Location of the bundle inside the npm tarball.
const SCRIPT_PATH_IN_ARCHIVE: &str = "package/dist/mermaid.min.js";

/// Upper bound for the npm tarball. Mermaid 11 packs to roughly 30 MiB.
const MAX_TARBALL_BYTES: u64 = 128 * 1024 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by mermaid-auto operations.
#[derive(Error, Debug)]
pub enum MermaidAutoError {
    /// An explicitly requested script path does not exist.
    #[error("Mermaid script not found at '{0}'")]
    NotFound(PathBuf),

    /// No local copy exists and downloading is disabled.
    #[error("No local copy of {SCRIPT_NAME} and downloads are disabled")]
    Offline,

    /// Could not create or navigate the local cache directory.
    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// gzip/tar extraction failed.
    #[error("Archive extraction failed: {0}")]
    Extract(String),
}

/// Options for [`resolve_mermaid_script`].
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Use this file and nothing else.
    pub explicit: Option<PathBuf>,
    /// Permit fetching the npm tarball when no local copy is found.
    pub allow_download: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            explicit: None,
            allow_download: true,
        }
    }
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the per-version cache directory for the Mermaid bundle.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/md2pdf/mermaid-{VERSION}/`
/// - **Linux**: `~/.cache/md2pdf/mermaid-{VERSION}/`
/// - **Windows**: `%LOCALAPPDATA%\md2pdf\mermaid-{VERSION}\`
///
/// Override by setting `MERMAID_AUTO_CACHE_DIR`.
pub fn mermaid_cache_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var("MERMAID_AUTO_CACHE_DIR") {
        return PathBuf::from(override_dir).join(format!("mermaid-{MERMAID_VERSION}"));
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("md2pdf").join(format!("mermaid-{MERMAID_VERSION}"))
}

/// Candidate locations next to the running executable.
pub fn bundled_candidates() -> Vec<PathBuf> {
    let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    else {
        return Vec::new();
    };
    candidates_in(&dir)
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("assets").join(SCRIPT_NAME),
        dir.join("Assets").join(SCRIPT_NAME),
    ]
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static DOWNLOADED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns the first local copy of the bundle, without touching the network.
///
/// Checks `MERMAID_JS_PATH`, the executable's asset folder, then the cache.
pub fn find_local_script() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("MERMAID_JS_PATH") {
        let pb = PathBuf::from(p);
        if pb.is_file() {
            return Some(pb);
        }
    }
    if let Some(p) = bundled_candidates().into_iter().find(|p| p.is_file()) {
        return Some(p);
    }
    let cached = mermaid_cache_dir().join(SCRIPT_NAME);
    cached.is_file().then_some(cached)
}

/// Returns `true` if a local copy exists (no download needed).
pub fn is_mermaid_available() -> bool {
    find_local_script().is_some()
}

/// Resolve `mermaid.min.js` to an absolute path, downloading it if allowed.
///
/// `on_progress` receives `(bytes_downloaded, total_size_option)` during a
/// download. Pass `None` to suppress progress callbacks.
///
/// # Thread safety
///
/// Safe to call from multiple threads simultaneously; a successful download
/// is remembered for the rest of the process.
pub fn resolve_mermaid_script(
    options: &ResolveOptions,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, MermaidAutoError> {
    if let Some(ref explicit) = options.explicit {
        if explicit.is_file() {
            return Ok(absolute(explicit));
        }
        return Err(MermaidAutoError::NotFound(explicit.clone()));
    }

    if let Some(local) = find_local_script() {
        return Ok(absolute(&local));
    }

    if let Some(path) = DOWNLOADED_PATH.get() {
        return Ok(path.clone());
    }

    if !options.allow_download {
        return Err(MermaidAutoError::Offline);
    }

    let path = download_to_cache(on_progress)?;
    let _ = DOWNLOADED_PATH.set(path.clone());
    Ok(path)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// Make `path` absolute without resolving symlinks.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn download_to_cache(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, MermaidAutoError> {
    let cache_dir = mermaid_cache_dir();
    let script_path = cache_dir.join(SCRIPT_NAME);

    let url = format!("{REGISTRY_URL}/mermaid-{MERMAID_VERSION}.tgz");

    std::fs::create_dir_all(&cache_dir).map_err(MermaidAutoError::CacheDir)?;

    let archive_bytes = download_bytes(&url, on_progress)?;
    extract_script(&archive_bytes, SCRIPT_PATH_IN_ARCHIVE, &script_path)?;

    Ok(absolute(&script_path))
}

/// Fetch the npm tarball, refusing anything larger than [`MAX_TARBALL_BYTES`]
/// or not gzip-compressed (registry error pages, captive portals).
fn download_bytes(
    url: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Vec<u8>, MermaidAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("mermaid-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| MermaidAutoError::Download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| MermaidAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(MermaidAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    if let Some(len) = total.filter(|&len| len > MAX_TARBALL_BYTES) {
        return Err(MermaidAutoError::Download(format!(
            "{url} is {len} bytes, over the {MAX_TARBALL_BYTES} byte limit"
        )));
    }

    let mut bytes = Vec::new();
    Progress {
        inner: response,
        done: 0,
        total,
        on_progress,
    }
    .take(MAX_TARBALL_BYTES + 1)
    .read_to_end(&mut bytes)
    .map_err(|e| MermaidAutoError::Download(format!("Read error: {e}")))?;

    check_tarball(&bytes)?;
    Ok(bytes)
}

/// Reader adapter reporting the running byte count.
struct Progress<'a, R> {
    inner: R,
    done: u64,
    total: Option<u64>,
    on_progress: Option<&'a dyn Fn(u64, Option<u64>)>,
}

impl<R: Read> Read for Progress<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.done += n as u64;
        if let Some(cb) = self.on_progress {
            cb(self.done, self.total);
        }
        Ok(n)
    }
}

fn check_tarball(bytes: &[u8]) -> Result<(), MermaidAutoError> {
    if bytes.len() as u64 > MAX_TARBALL_BYTES {
        return Err(MermaidAutoError::Download(format!(
            "tarball exceeds the {MAX_TARBALL_BYTES} byte limit"
        )));
    }
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Err(MermaidAutoError::Download(
            "response is not a gzip tarball".into(),
        ));
    }
    Ok(())
}

/// Extracts a single file from a gzipped tar archive into `dest_path`.
///
/// Writes to a sibling `.part` file first so an interrupted extraction never
/// leaves a truncated script in the cache.
fn extract_script(
    archive_bytes: &[u8],
    path_in_archive: &str,
    dest_path: &Path,
) -> Result<(), MermaidAutoError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let gz = GzDecoder::new(archive_bytes);
    let mut archive = Archive::new(gz);

    for entry in archive
        .entries()
        .map_err(|e| MermaidAutoError::Extract(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| MermaidAutoError::Extract(e.to_string()))?;
        let entry_path = entry
            .path()
            .map_err(|e| MermaidAutoError::Extract(e.to_string()))?;

        if entry_path.to_string_lossy() == path_in_archive {
            if entry.size() == 0 {
                return Err(MermaidAutoError::Extract(format!(
                    "'{path_in_archive}' is empty in archive"
                )));
            }
            let part = dest_path.with_extension("js.part");
            entry
                .unpack(&part)
                .map_err(|e| MermaidAutoError::Extract(format!("Unpack failed: {e}")))?;
            std::fs::rename(&part, dest_path)
                .map_err(|e| MermaidAutoError::Extract(format!("Rename failed: {e}")))?;
            return Ok(());
        }
    }

    Err(MermaidAutoError::Extract(format!(
        "'{path_in_archive}' not found in archive"
    )))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
