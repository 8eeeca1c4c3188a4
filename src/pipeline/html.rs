//! Markdown → standalone HTML document.
//!
//! The body is produced by `pulldown-cmark` with the GitHub-style extension
//! set (tables, footnotes, strikethrough, task lists) plus heading attributes
//! and smart punctuation. The wrapper document loads Mermaid from
//! [`MERMAID_PLACEHOLDER_SRC`]; [`embed_script_path`] swaps that placeholder
//! for the absolute `file://` URL of the real script before the document is
//! written to disk and navigated to.
//!
//! Fenced ```` ```mermaid ```` blocks come out as
//! `<pre><code class="language-mermaid">`, which is exactly what the status
//! script in [`crate::pipeline::poll`] looks for.

use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::path::Path;
use url::Url;

/// Script URL written into every document until [`embed_script_path`] runs.
pub const MERMAID_PLACEHOLDER_SRC: &str = "file:///Assets/mermaid.min.js";

/// Shown by the preview when a file has no content.
pub const EMPTY_PREVIEW_HTML: &str =
    "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"></head><body><h3>Empty file</h3></body></html>";

const ERROR_PREVIEW_HEAD: &str = "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"></head>\
<body style=\"font-family: sans-serif; padding: 20px\"><h3 style=\"color: #c0392b\">Error</h3><pre>";

const ERROR_PREVIEW_TAIL: &str = "</pre></body></html>";

const TEMPLATE_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <script src="file:///Assets/mermaid.min.js"></script>
    <script>
        document.addEventListener('DOMContentLoaded', function() {
            mermaid.initialize({
                startOnLoad: true,
                theme: 'default',
                securityLevel: 'loose',
                fontFamily: 'Meiryo, Yu Gothic, sans-serif'
            });
            mermaid.run();
        });
    </script>
    <style>
        body {
            font-family: 'Meiryo', 'Yu Gothic', sans-serif;
            padding: 20px;
            line-height: 1.6;
            color: #333;
        }
        h1, h2, h3, h4, h5, h6 {
            color: #2c3e50;
            margin-top: 1.5em;
            margin-bottom: 0.5em;
        }
        table {
            border-collapse: collapse;
            width: 100%;
            margin: 1em 0;
        }
        table th, table td {
            border: 1px solid #ddd;
            padding: 8px;
            text-align: left;
        }
        table th {
            background-color: #f2f2f2;
        }
        code {
            background-color: #f4f4f4;
            padding: 2px 4px;
            border-radius: 3px;
            font-family: 'Consolas', 'Monaco', monospace;
        }
        pre {
            background-color: #f4f4f4;
            padding: 10px;
            border-radius: 5px;
            overflow-x: auto;
        }
        blockquote {
            border-left: 4px solid #3498db;
            margin: 1em 0;
            padding-left: 1em;
            color: #666;
        }
        .mermaid-rendered {
            text-align: center;
            page-break-inside: avoid;
        }
    </style>
</head>
<body>
"#;

const TEMPLATE_TAIL: &str = "</body>\n</html>\n";

static MERMAID_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^ {0,3}(?:`{3,}|~{3,})[ \t]*mermaid\b").unwrap());

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Convert Markdown to a body fragment (no wrapper document).
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, markdown_options());
    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, parser);
    body
}

/// Convert Markdown to a complete HTML document.
///
/// Returns an empty string for empty or whitespace-only input; callers treat
/// that as "skip this file".
pub fn render_document(markdown: &str) -> String {
    if markdown.trim().is_empty() {
        return String::new();
    }
    let body = markdown_to_html(markdown);
    let mut doc = String::with_capacity(TEMPLATE_HEAD.len() + body.len() + TEMPLATE_TAIL.len());
    doc.push_str(TEMPLATE_HEAD);
    doc.push_str(&body);
    doc.push_str(TEMPLATE_TAIL);
    doc
}

/// `true` if the Markdown contains at least one Mermaid fence.
pub fn contains_diagrams(markdown: &str) -> bool {
    MERMAID_FENCE.is_match(markdown)
}

/// Point the document's Mermaid `<script src>` at `script_path`.
pub fn embed_script_path(html: &str, script_path: &Path) -> String {
    html.replace(MERMAID_PLACEHOLDER_SRC, &file_url(script_path))
}

/// Page shown by the preview in place of a document that could not be loaded.
pub fn error_preview_html(message: &str) -> String {
    let mut page =
        String::with_capacity(ERROR_PREVIEW_HEAD.len() + message.len() + ERROR_PREVIEW_TAIL.len());
    page.push_str(ERROR_PREVIEW_HEAD);
    for c in message.chars() {
        match c {
            '&' => page.push_str("&amp;"),
            '<' => page.push_str("&lt;"),
            '>' => page.push_str("&gt;"),
            '"' => page.push_str("&quot;"),
            _ => page.push(c),
        }
    }
    page.push_str(ERROR_PREVIEW_TAIL);
    page
}

/// Percent-encoded `file://` URL for a local path.
///
/// Relative paths are made absolute against the working directory first.
pub fn file_url(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match Url::from_file_path(&absolute) {
        Ok(url) => url.into(),
        // Only reachable for paths the platform cannot express as a URL.
        Err(()) => format!(
            "file:///{}",
            absolute.to_string_lossy().replace('\\', "/").trim_start_matches('/')
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_input_yields_empty_document() {
        assert_eq!(render_document(""), "");
        assert_eq!(render_document("   \n\t\r\n  "), "");
    }

    #[test]
    fn document_wraps_body() {
        let doc = render_document("# Title\n\nHello *world*");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<h1>Title</h1>"));
        assert!(doc.contains("<em>world</em>"));
        assert!(doc.trim_end().ends_with("</html>"));
        let body_at = doc.find("<body>").unwrap();
        let h1_at = doc.find("<h1>").unwrap();
        let close_at = doc.find("</body>").unwrap();
        assert!(body_at < h1_at && h1_at < close_at);
    }

    #[test]
    fn document_references_mermaid_placeholder() {
        let doc = render_document("text");
        assert!(doc.contains(MERMAID_PLACEHOLDER_SRC));
        assert!(doc.contains("mermaid.initialize"));
    }

    #[test]
    fn mermaid_fence_becomes_language_class() {
        let doc = render_document("```mermaid\ngraph TD; A-->B;\n```\n");
        assert!(doc.contains(r#"<code class="language-mermaid">"#), "got: {doc}");
        assert!(doc.contains("A--&gt;B"));
    }

    #[test]
    fn tables_and_strikethrough_enabled() {
        let doc = render_document("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n");
        assert!(doc.contains("<table>"));
        assert!(doc.contains("<del>gone</del>"));
    }

    #[test]
    fn task_lists_enabled() {
        let doc = render_document("- [x] done\n- [ ] todo\n");
        assert!(doc.contains(r#"type="checkbox""#));
    }

    #[test]
    fn html_special_chars_escaped_in_code() {
        let doc = render_document("`<script>`");
        assert!(doc.contains("&lt;script&gt;"));
    }

    #[test]
    fn non_ascii_text_survives() {
        let doc = render_document("# 見出し\n\nこんにちは 🌏");
        assert!(doc.contains("見出し"));
        assert!(doc.contains("こんにちは 🌏"));
    }

    #[test]
    fn test_contains_diagrams() {
        assert!(contains_diagrams("intro\n```mermaid\ngraph TD\n```"));
        assert!(contains_diagrams("~~~ mermaid\nsequenceDiagram\n~~~"));
        assert!(!contains_diagrams("```rust\nfn main() {}\n```"));
        assert!(!contains_diagrams("mention of mermaid in prose"));
    }

    #[cfg(unix)]
    #[test]
    fn embed_replaces_placeholder() {
        let doc = render_document("x");
        let out = embed_script_path(&doc, &PathBuf::from("/opt/md2pdf/assets/mermaid.min.js"));
        assert!(!out.contains(MERMAID_PLACEHOLDER_SRC));
        assert!(out.contains(r#"src="file:///opt/md2pdf/assets/mermaid.min.js""#));
    }

    #[cfg(unix)]
    #[test]
    fn file_url_escapes_reserved_characters() {
        assert_eq!(file_url(Path::new("/tmp/a b.html")), "file:///tmp/a%20b.html");
        assert_eq!(
            file_url(Path::new("/opt/C# tools/100%/mermaid.min.js")),
            "file:///opt/C%23%20tools/100%25/mermaid.min.js"
        );
        assert_eq!(file_url(Path::new("/docs/why?.html")), "file:///docs/why%3F.html");
    }

    #[cfg(unix)]
    #[test]
    fn file_url_round_trips_to_the_same_path() {
        let path = Path::new("/srv/notes #1/50% done?/doc.html");
        let url = Url::parse(&file_url(path)).unwrap();
        assert_eq!(url.to_file_path().unwrap(), path);
    }

    #[cfg(unix)]
    #[test]
    fn relative_paths_become_absolute_urls() {
        let url = file_url(Path::new("a.html"));
        assert!(url.starts_with("file:///"), "got: {url}");
        assert!(url.ends_with("/a.html"), "got: {url}");
    }

    #[cfg(windows)]
    #[test]
    fn file_url_normalises_windows_paths() {
        assert_eq!(
            file_url(Path::new(r"C:\Tools\Assets\mermaid.min.js")),
            "file:///C:/Tools/Assets/mermaid.min.js"
        );
        assert_eq!(
            file_url(Path::new(r"C:\My Docs\#1.html")),
            "file:///C:/My%20Docs/%231.html"
        );
    }

    #[test]
    fn error_page_shows_escaped_message() {
        let page = error_preview_html("could not read <a & b>.md");
        assert!(page.contains("<h3 style=\"color: #c0392b\">Error</h3>"));
        assert!(page.contains("could not read &lt;a &amp; b&gt;.md"));
        assert!(!page.contains("<a & b>"));
    }
}
