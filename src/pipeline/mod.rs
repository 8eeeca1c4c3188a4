//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements exactly one step. Only [`poll`] and [`export`]
//! talk to the browser engine, and only through
//! [`crate::browser::BrowserView`], so every stage is testable without a
//! real browser.
//!
//! ## Data Flow
//!
//! ```text
//! scan ──▶ html ──▶ (navigate) ──▶ poll ──▶ export
//! (*.md)   (doc)     (temp file)   (mermaid)  (.pdf)
//!            ▲
//!          asset (mermaid.min.js path)
//! ```
//!
//! 1. [`scan`]  : enumerate `*.md` files, skipping dot-files
//! 2. [`asset`] : resolve `mermaid.min.js` once per run; blocking I/O runs in
//!    `spawn_blocking`
//! 3. [`html`]  : Markdown → standalone HTML with the script URL embedded
//! 4. [`poll`]  : wait until diagrams have rendered, bounded in time
//! 5. [`export`]: print to PDF and write it atomically next to the source

pub mod asset;
pub mod export;
pub mod html;
pub mod poll;
pub mod scan;
