//! Folder scanning: find the Markdown files to convert.
//!
//! Only the file name is checked for a leading dot, so `notes/.draft.md` is
//! skipped while files inside a `.hidden/` folder are still found when
//! scanning recursively. Symlinks are not followed.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// List the `.md` files in `dir`, sorted by path.
///
/// With `recursive = false` only the folder's immediate children are listed.
/// An inaccessible folder yields an empty list rather than an error;
/// unreadable entries met during a recursive walk are skipped.
pub fn scan_markdown_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    let walker = if recursive {
        walker
    } else {
        walker.max_depth(1)
    };

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                if e.depth() == 0 {
                    warn!("Cannot read folder {}: {}", dir.display(), e);
                    return Vec::new();
                }
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && is_markdown_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    debug!("Scanned {}: {} Markdown files", dir.display(), files.len());
    files
}

/// `true` for a non-dotfile whose extension is `md` (any ASCII case).
pub fn is_markdown_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

/// `path` relative to `root` for display; falls back to the full path.
pub fn relative_display(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) {
        let p = dir.join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(p, "# x\n").unwrap();
    }

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| relative_display(root, f).to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_is_markdown_file() {
        assert!(is_markdown_file(Path::new("a/readme.md")));
        assert!(is_markdown_file(Path::new("README.MD")));
        assert!(!is_markdown_file(Path::new(".hidden.md")));
        assert!(!is_markdown_file(Path::new("notes.markdown")));
        assert!(!is_markdown_file(Path::new("page.mdx")));
        assert!(!is_markdown_file(Path::new("md")));
    }

    #[test]
    fn top_level_only_by_default() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.md");
        touch(tmp.path(), "a.md");
        touch(tmp.path(), "sub/c.md");
        touch(tmp.path(), "notes.txt");

        let files = scan_markdown_files(tmp.path(), false);
        assert_eq!(names(tmp.path(), &files), vec!["a.md", "b.md"]);
    }

    #[test]
    fn recursive_descends_and_sorts() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "z.md");
        touch(tmp.path(), "sub/c.md");
        touch(tmp.path(), "sub/deeper/d.md");
        touch(tmp.path(), ".hidden/e.md");

        let files = scan_markdown_files(tmp.path(), true);
        assert_eq!(
            names(tmp.path(), &files),
            vec![".hidden/e.md", "sub/c.md", "sub/deeper/d.md", "z.md"]
        );
    }

    #[test]
    fn dotfiles_are_excluded() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), ".draft.md");
        touch(tmp.path(), "sub/.secret.md");
        touch(tmp.path(), "keep.md");

        let files = scan_markdown_files(tmp.path(), true);
        assert_eq!(names(tmp.path(), &files), vec!["keep.md"]);
        for f in &files {
            let name = f.file_name().unwrap().to_string_lossy();
            assert!(!name.starts_with('.'));
            assert_eq!(f.extension().unwrap(), "md");
        }
    }

    #[test]
    fn missing_folder_yields_empty_list() {
        let tmp = TempDir::new().unwrap();
        let files = scan_markdown_files(&tmp.path().join("does-not-exist"), true);
        assert!(files.is_empty());
    }

    #[test]
    fn md_directories_are_not_files() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("folder.md")).unwrap();
        touch(tmp.path(), "real.md");

        let files = scan_markdown_files(tmp.path(), false);
        assert_eq!(names(tmp.path(), &files), vec!["real.md"]);
    }

    #[test]
    fn relative_display_strips_root() {
        let root = Path::new("/docs");
        assert_eq!(
            relative_display(root, Path::new("/docs/sub/a.md")),
            PathBuf::from("sub/a.md")
        );
        assert_eq!(
            relative_display(root, Path::new("/other/a.md")),
            PathBuf::from("/other/a.md")
        );
    }
}
