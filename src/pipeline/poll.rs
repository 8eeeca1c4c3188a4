//! Render-completion polling: wait until Mermaid has drawn every diagram.
//!
//! Mermaid renders asynchronously after the page has loaded, so printing as
//! soon as navigation completes captures raw code blocks instead of SVG.
//! [`wait_for_render`] runs [`CHECK_SCRIPT`] in the page until it reports
//! `ready` (or that there is nothing to render), within a fixed attempt cap.
//!
//! ## State machine
//!
//! ```text
//! WarmUp ──▶ Polling{0} ──▶ Polling{1} ──▶ … ──▶ Polling{max}
//!               │  ready / no diagrams              │ cap reached
//!               └──────────────┬────────────────────┘
//!                              ▼
//!                          Settling ──▶ Done
//!
//!   script execution error (any attempt) ──▶ Fallback ──▶ Done
//! ```
//!
//! Every path ends in `Done`; the caller exports whatever is on screen.
//! A possibly incomplete PDF beats a hung batch.
//!
//! All waiting goes through [`Sleeper`] so tests can run the machine without
//! real time passing.

use crate::browser::BrowserView;
use crate::config::PollTiming;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// In-page status check.
///
/// Returns one of `mermaid_not_loaded`, `no_mermaid_blocks`, `rendering`,
/// `svg_not_ready`, `ready`, or `error: <message>`. On the first pass it
/// moves each `code.language-mermaid` block into a `div.mermaid` container
/// marked `mermaid-rendered`, hides the original `<pre>` and re-runs Mermaid.
pub const CHECK_SCRIPT: &str = r#"
(function() {
    try {
        if (typeof mermaid === 'undefined') {
            return 'mermaid_not_loaded';
        }

        var blocks = document.querySelectorAll('code.language-mermaid');
        if (blocks.length === 0) {
            return 'no_mermaid_blocks';
        }

        var allMarked = true;
        for (var i = 0; i < blocks.length; i++) {
            var block = blocks[i];
            var pre = block.parentElement;
            if (pre && pre.tagName === 'PRE') {
                var next = pre.nextSibling;
                if (!next || !next.classList || !next.classList.contains('mermaid-rendered')) {
                    var container = document.createElement('div');
                    container.className = 'mermaid mermaid-rendered';
                    container.textContent = block.textContent;
                    pre.parentNode.insertBefore(container, pre.nextSibling);
                    pre.style.display = 'none';
                    allMarked = false;
                }
            }
        }

        if (!allMarked) {
            mermaid.run();
            return 'rendering';
        }

        var rendered = document.querySelectorAll('.mermaid-rendered');
        for (var j = 0; j < rendered.length; j++) {
            if (!rendered[j].innerHTML.includes('<svg')) {
                return 'svg_not_ready';
            }
        }

        return 'ready';
    } catch (e) {
        return 'error: ' + e.message;
    }
})();
"#;

/// Diagram rendering status reported by [`CHECK_SCRIPT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    /// The Mermaid global is not defined (script missing or still loading).
    NotLoaded,
    /// The document has no diagram blocks.
    NoDiagrams,
    /// Containers were just created and Mermaid was (re)started.
    Rendering,
    /// Containers exist but at least one has no SVG yet.
    NotReady,
    /// Every diagram has SVG output.
    Ready,
    /// The script caught an exception, or returned something unrecognised.
    Error(String),
}

impl RenderState {
    /// Parse a script result. Surrounding whitespace and JSON quotes are
    /// ignored; unrecognised text becomes [`RenderState::Error`].
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim().trim_matches('"');
        match s {
            "mermaid_not_loaded" => RenderState::NotLoaded,
            "no_mermaid_blocks" => RenderState::NoDiagrams,
            "rendering" => RenderState::Rendering,
            "svg_not_ready" => RenderState::NotReady,
            "ready" => RenderState::Ready,
            other => match other.strip_prefix("error:") {
                Some(msg) => RenderState::Error(msg.trim().to_string()),
                None => RenderState::Error(format!("unexpected status '{other}'")),
            },
        }
    }

    /// `true` for the states that end polling early.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderState::Ready | RenderState::NoDiagrams)
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::NotLoaded => f.write_str("not-loaded"),
            RenderState::NoDiagrams => f.write_str("no-diagrams"),
            RenderState::Rendering => f.write_str("rendering"),
            RenderState::NotReady => f.write_str("not-ready"),
            RenderState::Ready => f.write_str("ready"),
            RenderState::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// Source of delays for the poller.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real time via `tokio::time::sleep`.
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Phases of the render wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    WarmUp,
    /// `attempt` status checks have been made so far.
    Polling { attempt: u32 },
    Settling,
    Fallback,
    Done,
}

/// What the poller observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    /// Last status returned by the check script, if any ran successfully.
    pub final_state: Option<RenderState>,
    /// Status checks executed (including one that errored).
    pub attempts: u32,
    /// The loop stopped on `ready` or `no-diagrams`.
    pub converged: bool,
    /// A script execution error sent the poller down the fallback path.
    pub fell_back: bool,
}

/// Wait for diagram rendering to settle on the page currently loaded in
/// `view`. Never fails: every outcome ends with the caller free to export.
pub async fn wait_for_render<V, S>(view: &mut V, timing: &PollTiming, sleeper: &S) -> PollOutcome
where
    V: BrowserView + ?Sized,
    S: Sleeper + ?Sized,
{
    let mut outcome = PollOutcome::default();
    let mut phase = PollPhase::WarmUp;

    loop {
        phase = match phase {
            PollPhase::WarmUp => {
                sleeper.sleep(timing.warm_up).await;
                PollPhase::Polling { attempt: 0 }
            }
            PollPhase::Polling { attempt } if attempt >= timing.max_attempts => {
                debug!("Render not confirmed after {} checks", attempt);
                PollPhase::Settling
            }
            PollPhase::Polling { attempt } => {
                outcome.attempts = attempt + 1;
                match view.execute_script(CHECK_SCRIPT).await {
                    Ok(raw) => {
                        let state = RenderState::parse(&raw);
                        debug!("Render check {}/{}: {}", attempt + 1, timing.max_attempts, state);
                        let terminal = state.is_terminal();
                        outcome.final_state = Some(state);
                        if terminal {
                            outcome.converged = true;
                            PollPhase::Settling
                        } else {
                            sleeper.sleep(timing.poll_interval).await;
                            PollPhase::Polling {
                                attempt: attempt + 1,
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Render check failed, falling back to a fixed wait: {}", e);
                        PollPhase::Fallback
                    }
                }
            }
            PollPhase::Settling => {
                sleeper.sleep(timing.settle).await;
                PollPhase::Done
            }
            PollPhase::Fallback => {
                outcome.fell_back = true;
                sleeper.sleep(timing.error_fallback).await;
                PollPhase::Done
            }
            PollPhase::Done => break,
        };
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdfSettings;
    use crate::error::BrowserError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns queued script results, then `fallback` forever.
    struct ScriptedView {
        queue: VecDeque<Result<String, BrowserError>>,
        fallback: String,
        calls: u32,
    }

    impl ScriptedView {
        fn new(queue: Vec<Result<String, BrowserError>>, fallback: &str) -> Self {
            Self {
                queue: queue.into(),
                fallback: fallback.to_string(),
                calls: 0,
            }
        }
    }

    #[async_trait::async_trait]
    impl BrowserView for ScriptedView {
        async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn execute_script(&mut self, _script: &str) -> Result<String, BrowserError> {
            self.calls += 1;
            self.queue
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }

        async fn print_to_pdf(&mut self, _s: &PdfSettings) -> Result<Vec<u8>, BrowserError> {
            Ok(b"%PDF-1.7".to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn slept(&self) -> Vec<Duration> {
            self.slept.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_parse_states() {
        assert_eq!(RenderState::parse("mermaid_not_loaded"), RenderState::NotLoaded);
        assert_eq!(RenderState::parse("\"no_mermaid_blocks\""), RenderState::NoDiagrams);
        assert_eq!(RenderState::parse(" rendering \n"), RenderState::Rendering);
        assert_eq!(RenderState::parse("svg_not_ready"), RenderState::NotReady);
        assert_eq!(RenderState::parse("ready"), RenderState::Ready);
        assert_eq!(
            RenderState::parse("error: mermaid.run is not a function"),
            RenderState::Error("mermaid.run is not a function".into())
        );
        assert!(matches!(RenderState::parse("bogus"), RenderState::Error(_)));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RenderState::Ready.is_terminal());
        assert!(RenderState::NoDiagrams.is_terminal());
        assert!(!RenderState::Rendering.is_terminal());
        assert!(!RenderState::NotReady.is_terminal());
        assert!(!RenderState::NotLoaded.is_terminal());
        assert!(!RenderState::Error("x".into()).is_terminal());
    }

    #[test]
    fn check_script_emits_every_parsed_status() {
        for status in [
            "'mermaid_not_loaded'",
            "'no_mermaid_blocks'",
            "'rendering'",
            "'svg_not_ready'",
            "'ready'",
            "'error: '",
        ] {
            assert!(CHECK_SCRIPT.contains(status), "missing {status}");
        }
        assert!(CHECK_SCRIPT.contains("code.language-mermaid"));
        assert!(CHECK_SCRIPT.contains("mermaid-rendered"));
    }

    #[tokio::test]
    async fn no_diagrams_stops_on_first_check() {
        let mut view = ScriptedView::new(vec![], "no_mermaid_blocks");
        let sleeper = RecordingSleeper::default();
        let timing = PollTiming::default();

        let out = wait_for_render(&mut view, &timing, &sleeper).await;

        assert_eq!(view.calls, 1);
        assert_eq!(out.attempts, 1);
        assert!(out.converged);
        assert!(!out.fell_back);
        assert_eq!(out.final_state, Some(RenderState::NoDiagrams));
        // warm-up, then straight to settle
        assert_eq!(sleeper.slept(), vec![ms(3000), ms(1000)]);
    }

    #[tokio::test]
    async fn converges_after_rendering() {
        let mut view = ScriptedView::new(
            vec![
                Ok("rendering".into()),
                Ok("svg_not_ready".into()),
                Ok("ready".into()),
            ],
            "ready",
        );
        let sleeper = RecordingSleeper::default();
        let timing = PollTiming::default();

        let out = wait_for_render(&mut view, &timing, &sleeper).await;

        assert_eq!(view.calls, 3);
        assert_eq!(out.attempts, 3);
        assert!(out.converged);
        assert_eq!(out.final_state, Some(RenderState::Ready));
        assert_eq!(
            sleeper.slept(),
            vec![ms(3000), ms(500), ms(500), ms(1000)]
        );
    }

    #[tokio::test]
    async fn never_ready_exhausts_exactly_the_cap() {
        let mut view = ScriptedView::new(vec![], "svg_not_ready");
        let sleeper = RecordingSleeper::default();
        let timing = PollTiming::default();

        let out = wait_for_render(&mut view, &timing, &sleeper).await;

        assert_eq!(view.calls, 20);
        assert_eq!(out.attempts, 20);
        assert!(!out.converged);
        assert!(!out.fell_back);
        assert_eq!(out.final_state, Some(RenderState::NotReady));

        let slept = sleeper.slept();
        assert_eq!(slept.len(), 1 + 20 + 1);
        assert_eq!(slept[0], ms(3000));
        assert!(slept[1..21].iter().all(|d| *d == ms(500)));
        assert_eq!(slept[21], ms(1000));
    }

    #[tokio::test]
    async fn script_error_takes_fallback_path() {
        let mut view = ScriptedView::new(
            vec![
                Ok("rendering".into()),
                Err(BrowserError::Script("context destroyed".into())),
            ],
            "ready",
        );
        let sleeper = RecordingSleeper::default();
        let timing = PollTiming::default();

        let out = wait_for_render(&mut view, &timing, &sleeper).await;

        assert_eq!(view.calls, 2);
        assert_eq!(out.attempts, 2);
        assert!(out.fell_back);
        assert!(!out.converged);
        assert_eq!(out.final_state, Some(RenderState::Rendering));
        // no settle delay on the fallback path
        assert_eq!(sleeper.slept(), vec![ms(3000), ms(500), ms(5000)]);
    }

    #[tokio::test]
    async fn in_page_error_string_keeps_polling() {
        let mut view = ScriptedView::new(
            vec![Ok("error: boom".into()), Ok("ready".into())],
            "ready",
        );
        let sleeper = RecordingSleeper::default();
        let timing = PollTiming::default();

        let out = wait_for_render(&mut view, &timing, &sleeper).await;

        assert_eq!(out.attempts, 2);
        assert!(out.converged);
        assert!(!out.fell_back);
    }

    #[tokio::test]
    async fn custom_cap_is_respected() {
        let mut view = ScriptedView::new(vec![], "mermaid_not_loaded");
        let sleeper = RecordingSleeper::default();
        let timing = PollTiming {
            max_attempts: 3,
            ..PollTiming::immediate()
        };

        let out = wait_for_render(&mut view, &timing, &sleeper).await;

        assert_eq!(view.calls, 3);
        assert_eq!(out.final_state, Some(RenderState::NotLoaded));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_uses_virtual_time() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
