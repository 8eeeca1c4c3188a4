//! The browser engine seam.
//!
//! [`BrowserView`] is the whole contract the conversion pipeline needs from
//! an engine: navigate to a file URL and wait for the load to finish, run a
//! script and get its string result, print the current document to PDF.
//!
//! Methods take `&mut self`. A view is an owned handle that conversion and
//! preview borrow in turn, so the borrow checker guarantees that only one
//! navigation is ever in flight on it.
//!
//! [`chromium::ChromiumView`] (feature `chromium`) drives headless Chromium
//! through the DevTools protocol. Tests substitute a scripted fake.

use crate::config::PdfSettings;
use crate::error::BrowserError;

#[cfg(feature = "chromium")]
pub mod chromium;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumView;

/// An embedded browser surface that can load, script and print a document.
#[async_trait::async_trait]
pub trait BrowserView: Send {
    /// Navigate to `url` and return once the navigation has completed.
    ///
    /// Returns [`BrowserError::Navigation`] if the engine reports failure.
    /// Callers bound the wait with their own timeout.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Evaluate `script` in the current document and return its string result.
    async fn execute_script(&mut self, script: &str) -> Result<String, BrowserError>;

    /// Print the current document to PDF and return the file bytes.
    async fn print_to_pdf(&mut self, settings: &PdfSettings) -> Result<Vec<u8>, BrowserError>;

    /// Release the engine. Further calls return [`BrowserError::Closed`].
    async fn close(&mut self) -> Result<(), BrowserError> {
        Ok(())
    }
}
