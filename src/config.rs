//! Configuration types for Markdown-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Timing knobs for the render wait live
//! in [`PollTiming`], page geometry in [`PdfSettings`], and how the browser
//! engine is launched in [`BrowserOptions`].

use crate::error::Md2PdfError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a batch (or single-file) conversion.
///
/// # Example
/// ```rust
/// use md2pdf::ConversionConfig;
/// use std::time::Duration;
///
/// let config = ConversionConfig::builder()
///     .recursive(true)
///     .warm_up(Duration::from_secs(1))
///     .build()
///     .unwrap();
/// assert!(config.recursive);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Descend into subfolders when scanning. Default: false.
    pub recursive: bool,

    /// Timing of the navigation wait and the diagram render poll.
    pub timing: PollTiming,

    /// Page geometry passed to the engine's print-to-PDF.
    pub pdf: PdfSettings,

    /// Pause between two files of a batch. Default: 100 ms.
    ///
    /// Gives the engine a moment to release the previous document before the
    /// next navigation starts.
    pub inter_file_delay: Duration,

    /// Explicit path to `mermaid.min.js`. If None, resolved by `mermaid-auto`.
    pub mermaid_js: Option<PathBuf>,

    /// Never download `mermaid.min.js`; fail if no local copy exists.
    pub offline: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            timing: PollTiming::default(),
            pdf: PdfSettings::default(),
            inter_file_delay: Duration::from_millis(100),
            mermaid_js: None,
            offline: false,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn recursive(mut self, v: bool) -> Self {
        self.config.recursive = v;
        self
    }

    pub fn timing(mut self, timing: PollTiming) -> Self {
        self.config.timing = timing;
        self
    }

    pub fn navigation_timeout(mut self, d: Duration) -> Self {
        self.config.timing.navigation_timeout = d;
        self
    }

    pub fn warm_up(mut self, d: Duration) -> Self {
        self.config.timing.warm_up = d;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.timing.max_attempts = n;
        self
    }

    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.config.timing.poll_interval = d;
        self
    }

    pub fn settle(mut self, d: Duration) -> Self {
        self.config.timing.settle = d;
        self
    }

    pub fn error_fallback(mut self, d: Duration) -> Self {
        self.config.timing.error_fallback = d;
        self
    }

    pub fn pdf(mut self, settings: PdfSettings) -> Self {
        self.config.pdf = settings;
        self
    }

    pub fn inter_file_delay(mut self, d: Duration) -> Self {
        self.config.inter_file_delay = d;
        self
    }

    pub fn mermaid_js(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.mermaid_js = Some(path.into());
        self
    }

    pub fn offline(mut self, v: bool) -> Self {
        self.config.offline = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        self.config.timing.validate()?;
        self.config.pdf.validate()?;
        Ok(self.config)
    }
}

// ── Poll timing ──────────────────────────────────────────────────────────

/// Delays and bounds of the render-completion wait.
///
/// Defaults: 10 s for the page to load, 3 s for Mermaid to initialise, up to
/// 20 status checks 500 ms apart, 1 s to settle, and 5 s when the status
/// check itself errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollTiming {
    /// Upper bound on a navigation. Exceeding it fails the job.
    pub navigation_timeout: Duration,
    /// Pause after navigation before the first status check.
    pub warm_up: Duration,
    /// Number of status checks before giving up on confirmation.
    pub max_attempts: u32,
    /// Pause between two status checks.
    pub poll_interval: Duration,
    /// Pause after the poll loop, converged or not.
    pub settle: Duration,
    /// Pause used instead of the settle delay when the status check errors.
    pub error_fallback: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(10),
            warm_up: Duration::from_secs(3),
            max_attempts: 20,
            poll_interval: Duration::from_millis(500),
            settle: Duration::from_secs(1),
            error_fallback: Duration::from_secs(5),
        }
    }
}

impl PollTiming {
    /// Timing with every delay set to zero; keeps the attempt cap and timeout.
    ///
    /// Useful for tests and for engines that render synchronously.
    pub fn immediate() -> Self {
        Self {
            warm_up: Duration::ZERO,
            poll_interval: Duration::ZERO,
            settle: Duration::ZERO,
            error_fallback: Duration::ZERO,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), Md2PdfError> {
        if self.max_attempts == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "poll attempts must be ≥ 1".into(),
            ));
        }
        if self.navigation_timeout.is_zero() {
            return Err(Md2PdfError::InvalidConfig(
                "navigation timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

// ── PDF settings ─────────────────────────────────────────────────────────

/// Page orientation of the exported PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Print-to-PDF settings. All lengths are in inches.
///
/// Defaults: A4 portrait (8.27 × 11.69 in), 10 mm margins, scale 1.0,
/// background graphics printed, whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfSettings {
    pub page_width: f64,
    pub page_height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub orientation: Orientation,
    pub scale: f64,
    pub print_background: bool,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            page_width: 8.27,
            page_height: 11.69,
            margin_top: 0.39,
            margin_bottom: 0.39,
            margin_left: 0.39,
            margin_right: 0.39,
            orientation: Orientation::Portrait,
            scale: 1.0,
            print_background: true,
        }
    }
}

impl PdfSettings {
    fn validate(&self) -> Result<(), Md2PdfError> {
        if self.page_width <= 0.0 || self.page_height <= 0.0 {
            return Err(Md2PdfError::InvalidConfig(format!(
                "page size must be positive, got {}×{} in",
                self.page_width, self.page_height
            )));
        }
        let margins = [
            self.margin_top,
            self.margin_bottom,
            self.margin_left,
            self.margin_right,
        ];
        if margins.iter().any(|m| *m < 0.0) {
            return Err(Md2PdfError::InvalidConfig(
                "margins must not be negative".into(),
            ));
        }
        if self.margin_left + self.margin_right >= self.page_width
            || self.margin_top + self.margin_bottom >= self.page_height
        {
            return Err(Md2PdfError::InvalidConfig(
                "margins leave no printable area".into(),
            ));
        }
        // Chromium rejects scales outside 0.1–2.0.
        if !(0.1..=2.0).contains(&self.scale) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "scale must be 0.1–2.0, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

// ── Browser options ──────────────────────────────────────────────────────

/// How the Chromium engine is launched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserOptions {
    /// Browser executable. If None, the engine's own detection is used.
    pub chrome_executable: Option<PathBuf>,
    /// Show a browser window (preview). Default: headless.
    pub headed: bool,
    /// Additional command-line switches for the browser process.
    pub extra_args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings() {
        let t = PollTiming::default();
        assert_eq!(t.navigation_timeout, Duration::from_secs(10));
        assert_eq!(t.warm_up, Duration::from_secs(3));
        assert_eq!(t.max_attempts, 20);
        assert_eq!(t.poll_interval, Duration::from_millis(500));
        assert_eq!(t.settle, Duration::from_secs(1));
        assert_eq!(t.error_fallback, Duration::from_secs(5));

        let c = ConversionConfig::default();
        assert!(!c.recursive);
        assert_eq!(c.inter_file_delay, Duration::from_millis(100));
    }

    #[test]
    fn a4_portrait_defaults() {
        let p = PdfSettings::default();
        assert_eq!(p.page_width, 8.27);
        assert_eq!(p.page_height, 11.69);
        assert_eq!(p.orientation, Orientation::Portrait);
        assert!(p.print_background);
    }

    #[test]
    fn builder_rejects_zero_attempts() {
        let err = ConversionConfig::builder().max_attempts(0).build();
        assert!(matches!(err, Err(Md2PdfError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_zero_navigation_timeout() {
        let err = ConversionConfig::builder()
            .navigation_timeout(Duration::ZERO)
            .build();
        assert!(matches!(err, Err(Md2PdfError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_oversized_margins() {
        let pdf = PdfSettings {
            margin_left: 5.0,
            margin_right: 5.0,
            ..PdfSettings::default()
        };
        let err = ConversionConfig::builder().pdf(pdf).build();
        assert!(matches!(err, Err(Md2PdfError::InvalidConfig(_))));
    }

    #[test]
    fn immediate_timing_keeps_cap() {
        let t = PollTiming::immediate();
        assert_eq!(t.max_attempts, 20);
        assert!(t.warm_up.is_zero());
        assert!(t.settle.is_zero());
    }

    #[test]
    fn builder_sets_fields() {
        let c = ConversionConfig::builder()
            .recursive(true)
            .max_attempts(5)
            .mermaid_js("/opt/mermaid.min.js")
            .build()
            .unwrap();
        assert!(c.recursive);
        assert_eq!(c.timing.max_attempts, 5);
        assert_eq!(c.mermaid_js, Some(PathBuf::from("/opt/mermaid.min.js")));
    }
}
