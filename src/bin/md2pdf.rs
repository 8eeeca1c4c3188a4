//! CLI binary for md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `BrowserOptions`, launches Chromium and reports
//! progress.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2pdf::{
    convert_file, convert_folder, list_markdown_files, BatchEvent, BrowserOptions, BrowserView,
    ChromiumView, ConversionConfig, EventSink, JobOutcome, PreviewCommand, PreviewSession,
    PreviewShown, TokioSleeper, TracingSink,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI event sink using indicatif ───────────────────────────────────────────

/// Terminal sink: a progress bar over the batch plus one log line per file.
struct CliSink {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl CliSink {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning folder…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Self {
            bar,
            failures: AtomicUsize::new(0),
        }
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }
}

impl EventSink for CliSink {
    fn emit(&self, event: BatchEvent) {
        match event {
            BatchEvent::NoFilesFound { recursive } => {
                self.bar.finish_and_clear();
                eprintln!(
                    "{} No Markdown files found{}",
                    yellow("⚠"),
                    if recursive { "" } else { " (try -r to include subfolders)" }
                );
            }
            BatchEvent::BatchStarted { total, recursive } => {
                self.activate_bar(total);
                self.bar.println(format!(
                    "{} {}",
                    cyan("◆"),
                    bold(&format!(
                        "Converting {total} Markdown files{}…",
                        if recursive { " (including subfolders)" } else { "" }
                    ))
                ));
            }
            BatchEvent::JobStarted { relative, .. } => {
                self.bar.set_message(relative.display().to_string());
            }
            BatchEvent::JobCompleted {
                relative,
                output,
                duration_ms,
                ..
            } => {
                let pdf = output
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.bar.println(format!(
                    "  {} {}  →  {}  {}",
                    green("✓"),
                    relative.display(),
                    pdf,
                    dim(&format!("{:.1}s", duration_ms as f64 / 1000.0)),
                ));
                self.bar.inc(1);
            }
            BatchEvent::JobSkipped { relative, .. } => {
                self.bar.println(format!(
                    "  {} {}  {}",
                    dim("–"),
                    relative.display(),
                    dim("(empty, skipped)")
                ));
                self.bar.inc(1);
            }
            BatchEvent::JobFailed {
                relative, error, ..
            } => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                // Truncate very long error messages to keep output tidy.
                let cut = error.char_indices().nth(100).map(|(i, _)| i);
                let msg = match cut {
                    Some(cut) => format!("{}\u{2026}", &error[..cut]),
                    None => error,
                };
                self.bar.println(format!(
                    "  {} {}  {}",
                    red("✗"),
                    relative.display(),
                    red(&msg)
                ));
                self.bar.inc(1);
            }
            BatchEvent::BatchCompleted { stats } => {
                self.bar.finish_and_clear();
                let failed = self.failures.load(Ordering::SeqCst);
                eprintln!(
                    "{} {} converted, {} failed, {} skipped  {}",
                    if failed == 0 { green("✔") } else { red("✘") },
                    bold(&stats.converted.to_string()),
                    if failed == 0 {
                        failed.to_string()
                    } else {
                        red(&failed.to_string())
                    },
                    stats.skipped,
                    dim(&format!("{:.1}s", stats.total_duration_ms as f64 / 1000.0)),
                );
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every .md file in a folder (PDFs are written next to them)
  md2pdf ./docs

  # Include subfolders
  md2pdf -r ./docs

  # Show which files would be converted
  md2pdf --list -r ./docs

  # Open one file in a browser window as it will be printed.
  # Type r to refresh, n / p for the next / previous file, q to quit.
  md2pdf --preview ./docs/guide.md

  # Convert that one file, then preview it
  md2pdf --preview ./docs/guide.md --export

  # Diagram-heavy documents: give Mermaid more time
  md2pdf --warmup-ms 5000 --poll-attempts 40 ./docs

  # Machine-readable summary
  md2pdf --json ./docs > report.json

ENVIRONMENT VARIABLES:
  CHROME_PATH             Chromium / Chrome executable
  MERMAID_JS_PATH         Path to an existing mermaid.min.js (skips download)
  MERMAID_AUTO_CACHE_DIR  Override the default mermaid.min.js cache directory
  RUST_LOG                Override log filtering (e.g. md2pdf=debug)

SETUP:
  Chromium or Google Chrome must be installed.

  mermaid.min.js is downloaded once from the npm registry on first run and
  cached in ~/.cache/md2pdf/mermaid-<version>/. Conversion itself never
  touches the network. Use --offline to forbid the download.
"#;

/// Convert a folder of Markdown files to PDF, rendering Mermaid diagrams.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert a folder of Markdown files to PDF, rendering Mermaid diagrams",
    long_about = "Convert every Markdown file in a folder to a PDF next to it. Documents are \
rendered by headless Chromium; Mermaid diagrams are given time to render before each page is \
printed to A4.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Folder containing the Markdown files.
    #[arg(required_unless_present = "preview")]
    dir: Option<PathBuf>,

    /// Include subfolders.
    #[arg(short, long, env = "MD2PDF_RECURSIVE")]
    recursive: bool,

    /// List the files that would be converted, then exit.
    #[arg(long, conflicts_with = "preview")]
    list: bool,

    /// Open one Markdown file in a browser window instead of converting a folder.
    #[arg(long, value_name = "FILE")]
    preview: Option<PathBuf>,

    /// With --preview: also write the file's PDF.
    #[arg(long, requires = "preview")]
    export: bool,

    /// Path to mermaid.min.js.
    #[arg(long, env = "MD2PDF_MERMAID_JS", value_name = "PATH")]
    mermaid_js: Option<PathBuf>,

    /// Never download mermaid.min.js.
    #[arg(long, env = "MD2PDF_OFFLINE")]
    offline: bool,

    /// Chromium / Chrome executable.
    #[arg(long, env = "CHROME_PATH", value_name = "PATH")]
    chrome: Option<PathBuf>,

    /// Extra switch passed to the browser (repeatable), e.g. --chrome-arg=--no-sandbox.
    #[arg(long = "chrome-arg", value_name = "ARG", allow_hyphen_values = true)]
    chrome_args: Vec<String>,

    /// Show the browser window during a batch.
    #[arg(long, env = "MD2PDF_HEADED")]
    headed: bool,

    /// Page load timeout in seconds.
    #[arg(long, env = "MD2PDF_NAV_TIMEOUT", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    nav_timeout: u64,

    /// Wait before the first diagram check, in milliseconds.
    #[arg(long, env = "MD2PDF_WARMUP_MS", default_value_t = 3000)]
    warmup_ms: u64,

    /// Maximum number of diagram checks.
    #[arg(long, env = "MD2PDF_POLL_ATTEMPTS", default_value_t = 20,
          value_parser = clap::value_parser!(u32).range(1..))]
    poll_attempts: u32,

    /// Pause between diagram checks, in milliseconds.
    #[arg(long, env = "MD2PDF_POLL_INTERVAL_MS", default_value_t = 500)]
    poll_interval_ms: u64,

    /// Pause after the checks end, before printing, in milliseconds.
    #[arg(long, env = "MD2PDF_SETTLE_MS", default_value_t = 1000)]
    settle_ms: u64,

    /// Fixed wait used when the diagram check itself fails, in milliseconds.
    #[arg(long, env = "MD2PDF_FALLBACK_MS", default_value_t = 5000)]
    fallback_ms: u64,

    /// Pause between two files, in milliseconds.
    #[arg(long, env = "MD2PDF_DELAY_MS", default_value_t = 100)]
    delay_ms: u64,

    /// Output a structured JSON report (BatchOutput) on stdout.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── List-only mode ───────────────────────────────────────────────────
    if cli.list {
        let dir = folder_arg(&cli)?;
        let files = list_markdown_files(dir, config.recursive)
            .with_context(|| format!("Cannot list {}", dir.display()))?;
        for file in &files {
            let rel = file.strip_prefix(dir).unwrap_or(file);
            println!("{}", rel.display());
        }
        if !cli.quiet {
            eprintln!("{} Markdown files", files.len());
        }
        return Ok(ExitCode::SUCCESS);
    }

    // ── Ensure mermaid.min.js is available ───────────────────────────────
    // On the very first run the script (~3 MB) is fetched from the npm
    // registry into ~/.cache/md2pdf/mermaid-{VERSION}/. Later runs only
    // check the path.
    if config.mermaid_js.is_none() && !config.offline && !mermaid_auto::is_mermaid_available() {
        fetch_mermaid(cli.quiet)?;
    }

    let browser = BrowserOptions {
        chrome_executable: cli.chrome.clone(),
        headed: cli.headed,
        extra_args: cli.chrome_args.clone(),
    };

    // ── Preview mode ─────────────────────────────────────────────────────
    if let Some(ref file) = cli.preview {
        return run_preview(&cli, file, &config, browser).await;
    }

    // ── Batch conversion ─────────────────────────────────────────────────
    let dir = folder_arg(&cli)?;
    let mut view = ChromiumView::launch(&browser)
        .await
        .context("Cannot start conversion")?;

    let result = if show_progress {
        let sink = CliSink::new();
        convert_folder(&mut view, dir, &config, &sink, &TokioSleeper).await
    } else {
        convert_folder(&mut view, dir, &config, &TracingSink, &TokioSleeper).await
    };
    let _ = view.close().await;
    let output = result.context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress && output.stats.found > 0 {
        eprintln!(
            "Converted {}/{} files in {}ms ({} skipped)",
            output.stats.converted,
            output.stats.found,
            output.stats.total_duration_ms,
            output.stats.skipped
        );
        if output.stats.failed > 0 {
            eprintln!("  {} files failed", output.stats.failed);
        }
    }

    Ok(if output.stats.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .recursive(cli.recursive)
        .navigation_timeout(Duration::from_secs(cli.nav_timeout))
        .warm_up(Duration::from_millis(cli.warmup_ms))
        .max_attempts(cli.poll_attempts)
        .poll_interval(Duration::from_millis(cli.poll_interval_ms))
        .settle(Duration::from_millis(cli.settle_ms))
        .error_fallback(Duration::from_millis(cli.fallback_ms))
        .inter_file_delay(Duration::from_millis(cli.delay_ms))
        .offline(cli.offline);

    if let Some(ref path) = cli.mermaid_js {
        builder = builder.mermaid_js(path);
    }

    builder.build().context("Invalid configuration")
}

fn folder_arg(cli: &Cli) -> Result<&Path> {
    cli.dir
        .as_deref()
        .context("A folder to convert is required")
}

/// Download mermaid.min.js with a byte progress bar.
fn fetch_mermaid(quiet: bool) -> Result<()> {
    let options = mermaid_auto::ResolveOptions::default();

    if quiet {
        // Quiet mode: download silently; errors still propagate.
        tokio::task::block_in_place(|| mermaid_auto::resolve_mermaid_script(&options, None))
            .context("Failed to download mermaid.min.js")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("Mermaid");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    // block_in_place keeps the callback borrow valid while taking the
    // blocking download off the executor's hot path.
    tokio::task::block_in_place(|| {
        mermaid_auto::resolve_mermaid_script(
            &options,
            Some(&|downloaded, total| {
                if let Some(t) = total {
                    if bar.length().unwrap_or(0) != t {
                        bar.set_length(t);
                    }
                }
                bar.set_position(downloaded);
            }),
        )
    })
    .context("Failed to download mermaid.min.js")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

fn report_preview(session: &PreviewSession, shown: &PreviewShown) {
    let (at, of) = session.position();
    let name = session.current().display().to_string();
    match shown {
        PreviewShown::Rendered(poll) => {
            let state = poll
                .final_state
                .as_ref()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".into());
            eprintln!(
                "{} [{at}/{of}] {}  {}",
                cyan("◆"),
                bold(&name),
                dim(&format!("(diagram status: {state})"))
            );
        }
        PreviewShown::Failed(error) => {
            eprintln!("{} [{at}/{of}] {}  {}", red("✘"), bold(&name), error);
        }
    }
}

/// `--preview FILE [--export]`.
async fn run_preview(
    cli: &Cli,
    file: &Path,
    config: &ConversionConfig,
    browser: BrowserOptions,
) -> Result<ExitCode> {
    let mut code = ExitCode::SUCCESS;

    // Headed Chromium builds may refuse to print, so the PDF is made headless.
    if cli.export {
        let mut view = ChromiumView::launch(&BrowserOptions {
            headed: false,
            ..browser.clone()
        })
        .await
        .context("Cannot start conversion")?;
        let job = convert_file(&mut view, file, config, &TokioSleeper).await;
        let _ = view.close().await;
        let job = job.context("Conversion failed")?;

        match job.outcome {
            JobOutcome::Converted { ref output } => {
                eprintln!("{} PDF written: {}", green("✔"), bold(&output.display().to_string()))
            }
            JobOutcome::Skipped => eprintln!("{} File is empty; no PDF written", yellow("⚠")),
            JobOutcome::Failed { ref error } => {
                eprintln!("{} {}", red("✘"), error);
                code = ExitCode::FAILURE;
            }
        }
    }

    let mut session = PreviewSession::open(file, config.recursive)
        .with_context(|| format!("Cannot preview {}", file.display()))?;

    let mut view = ChromiumView::launch(&BrowserOptions {
        headed: true,
        ..browser
    })
    .await
    .context("Cannot open preview")?;

    if !cli.quiet {
        eprintln!(
            "{}",
            dim("Commands: r = refresh, n = next file, p = previous file, q = quit")
        );
    }

    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut line = String::new();
    let mut show = true;
    loop {
        if show {
            let shown = session.show(&mut view, config, &TokioSleeper).await;
            let shown = match shown {
                Ok(s) => s,
                Err(e) => {
                    let _ = view.close().await;
                    return Err(e).context("Cannot display the preview");
                }
            };
            if !cli.quiet {
                report_preview(&session, &shown);
            }
        }

        line.clear();
        match stdin.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                let _ = view.close().await;
                return Err(e).context("Failed to read from stdin");
            }
        }

        show = match PreviewCommand::parse(&line) {
            Some(PreviewCommand::Quit) => break,
            Some(PreviewCommand::Refresh) => true,
            Some(PreviewCommand::Next) => {
                let moved = session.next();
                if !moved && !cli.quiet {
                    eprintln!("{}", dim("Already at the last file."));
                }
                moved
            }
            Some(PreviewCommand::Prev) => {
                let moved = session.prev();
                if !moved && !cli.quiet {
                    eprintln!("{}", dim("Already at the first file."));
                }
                moved
            }
            None => {
                if !line.trim().is_empty() {
                    eprintln!("{} Unknown command: {}", yellow("⚠"), line.trim());
                }
                false
            }
        };
    }

    let _ = view.close().await;
    Ok(code)
}
