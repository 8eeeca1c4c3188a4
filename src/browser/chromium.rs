//! [`BrowserView`] backed by Chromium over the DevTools protocol.
//!
//! One browser process and one page (tab) are kept for the lifetime of the
//! view and reused for every document. The protocol event loop runs on a
//! spawned task; it is aborted on [`BrowserView::close`] or drop.

use crate::browser::BrowserView;
use crate::config::{BrowserOptions, Orientation, PdfSettings};
use crate::error::{BrowserError, Md2PdfError};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Switches every launch gets: Mermaid is loaded from a `file://` URL by a
/// document that itself lives under `file://`.
const BASE_ARGS: &[&str] = &["--allow-file-access-from-files"];

/// A live Chromium tab.
pub struct ChromiumView {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
}

impl ChromiumView {
    /// Launch Chromium and open a blank tab.
    ///
    /// A launch failure is reported as [`Md2PdfError::BrowserInitFailed`]:
    /// without an engine no file can be converted.
    pub async fn launch(options: &BrowserOptions) -> Result<Self, Md2PdfError> {
        let mut builder = BrowserConfig::builder().args(BASE_ARGS.iter().copied());
        if options.headed {
            builder = builder.with_head();
        }
        if let Some(ref exe) = options.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        if !options.extra_args.is_empty() {
            builder = builder.args(options.extra_args.iter().cloned());
        }
        let config = builder.build().map_err(Md2PdfError::BrowserInitFailed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Md2PdfError::BrowserInitFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("DevTools handler error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(p) => p,
            Err(e) => {
                handler_task.abort();
                return Err(Md2PdfError::BrowserInitFailed(format!(
                    "could not open a tab: {e}"
                )));
            }
        };

        info!(
            "Browser engine ready ({})",
            if options.headed { "headed" } else { "headless" }
        );

        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            handler_task,
        })
    }

    fn page(&self) -> Result<&Page, BrowserError> {
        self.page.as_ref().ok_or(BrowserError::Closed)
    }
}

#[async_trait::async_trait]
impl BrowserView for ChromiumView {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn execute_script(&mut self, script: &str) -> Result<String, BrowserError> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        result
            .into_value::<String>()
            .map_err(|e| BrowserError::Script(format!("non-string result: {e}")))
    }

    async fn print_to_pdf(&mut self, settings: &PdfSettings) -> Result<Vec<u8>, BrowserError> {
        let params = print_params(settings);
        self.page()?
            .pdf(params)
            .await
            .map_err(|e| BrowserError::Print(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser did not close cleanly: {}", e);
            }
            // Reap the child process.
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
        Ok(())
    }
}

impl Drop for ChromiumView {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// Map [`PdfSettings`] onto `Page.printToPDF` parameters.
fn print_params(settings: &PdfSettings) -> PrintToPdfParams {
    PrintToPdfParams::builder()
        .landscape(settings.orientation == Orientation::Landscape)
        .display_header_footer(false)
        .print_background(settings.print_background)
        .scale(settings.scale)
        .paper_width(settings.page_width)
        .paper_height(settings.page_height)
        .margin_top(settings.margin_top)
        .margin_bottom(settings.margin_bottom)
        .margin_left(settings.margin_left)
        .margin_right(settings.margin_right)
        .prefer_css_page_size(false)
        .build()
}
