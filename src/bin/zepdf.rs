//! CLI binary for zepdf.
//!
//! A thin shim over the library crate that maps subcommands to
//! `Orchestrator` calls and prints outcomes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use zepdf::{
    ConversionOutcome, DocumentFormat, Orchestrator, OrchestratorConfig, ProgressCallback,
    StageProgressCallback,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar whose length is the resolved stage count.
/// Conversions are short pipelines (one or two stages), so the bar mostly
/// communicates which backend is currently running.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl StageProgressCallback for CliProgress {
    fn on_job_start(&self, total_stages: usize) {
        self.bar.set_length(total_stages as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] stage {pos}/{len}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        self.bar.set_prefix("Converting");
    }

    fn on_stage_start(&self, _index: usize, _total: usize, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn on_stage_complete(&self, _index: usize, _total: usize) {
        self.bar.inc(1);
    }

    fn on_stage_error(&self, _index: usize, _total: usize, error: &str) {
        let msg = truncate_error(error);
        self.bar.println(format!("  {} {}", red("✗"), red(&msg)));
    }

    fn on_job_complete(&self, _success: bool) {
        self.bar.finish_and_clear();
    }
}

/// Cap an error line for the progress display. Counts characters, not
/// bytes, so multi-byte messages (backend stderr is arbitrary text) never
/// split mid-character.
fn truncate_error(error: &str) -> String {
    if error.chars().count() > 80 {
        let head: String = error.chars().take(79).collect();
        format!("{head}\u{2026}")
    } else {
        error.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Word to PDF (output next to the input)
  zepdf convert report.docx --to pdf

  # PDF to page images at 300 DPI, into a directory
  zepdf convert report.pdf --to png --dpi 300 -o pages/

  # PDF to Word (requires pdf2docx)
  zepdf convert report.pdf --to docx

  # Extract pages 1-3 and 7 into a new PDF
  zepdf split report.pdf --pages "1-3,7"

  # Stitch chapters together, in argument order
  zepdf merge ch1.pdf ch2.pdf ch3.pdf -o book.pdf

  # Metadata only, machine-readable
  zepdf inspect report.pdf --json

EXTERNAL TOOLS:
  Tool          Needed for                      Probed as
  ───────────   ─────────────────────────────   ─────────
  LibreOffice   office-format conversions       soffice
  unoconv       faster office bridge (opt.)     unoconv
  pdf2docx      PDF → DOCX                      pdf2docx
  poppler       fallback rasteriser (opt.)      pdftoppm

  Split, merge, and PDF → image work with none of them installed.

SUPPORTED TARGETS:
  pdf  docx  pptx  xlsx  rtf  odt  epub  jpg  png
"#;

/// Convert documents between formats, split and merge PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "zepdf",
    version,
    about = "Convert documents between formats, split and merge PDFs",
    long_about = "A document-conversion front door: routes each (source, target) format pair \
through the right backend chain (LibreOffice, pdf2docx, pdfium, poppler), with fallbacks, \
plus PDF page extraction and merging.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Rasterisation DPI for PDF → image conversions (72–600).
    #[arg(long, global = true, env = "ZEPDF_DPI", default_value_t = 150)]
    dpi: u32,

    /// Timeout for one external process invocation, in seconds.
    #[arg(long, global = true, env = "ZEPDF_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Output structured JSON instead of human-readable text.
    #[arg(long, global = true, env = "ZEPDF_JSON")]
    json: bool,

    /// Disable the progress display.
    #[arg(long, global = true, env = "ZEPDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ZEPDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ZEPDF_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a document to another format.
    Convert {
        /// Input document.
        input: PathBuf,

        /// Target format: pdf, docx, pptx, xlsx, rtf, odt, epub, jpg, png.
        #[arg(long = "to", value_name = "FORMAT")]
        target: String,

        /// Output directory (defaults to the input's directory).
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Extract selected pages of a PDF into a new PDF.
    Split {
        /// Input PDF.
        input: PathBuf,

        /// Page selection, e.g. "1-3, 5, 7-10". Pages are 1-indexed.
        #[arg(short, long)]
        pages: String,

        /// Output directory (defaults to the input's directory).
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Concatenate PDFs, in argument order, into one PDF.
    Merge {
        /// Input PDFs, at least two.
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        /// Output PDF path.
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Print a PDF's metadata without converting anything.
    Inspect {
        /// Input PDF.
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Suppress INFO-level library logs when the progress display is active;
    // the bar provides the feedback that matters.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let config = OrchestratorConfig::builder()
        .dpi(cli.dpi)
        .process_timeout_secs(cli.timeout)
        .build()
        .context("Invalid configuration")?;
    let mut orchestrator = Orchestrator::new(config);

    if show_progress {
        let cb = CliProgress::new();
        orchestrator.set_progress_callback(cb as ProgressCallback);
    }

    match cli.command {
        Command::Inspect { input } => {
            let meta = orchestrator
                .inspect(&input)
                .await
                .context("Failed to inspect PDF")?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
                );
            } else {
                println!("File:         {}", input.display());
                if let Some(ref t) = meta.title {
                    println!("Title:        {t}");
                }
                if let Some(ref a) = meta.author {
                    println!("Author:       {a}");
                }
                if let Some(ref s) = meta.subject {
                    println!("Subject:      {s}");
                }
                if let Some(ref p) = meta.producer {
                    println!("Producer:     {p}");
                }
                println!("Pages:        {}", meta.page_count);
                if let Some(ref v) = meta.pdf_version {
                    println!("PDF Version:  {v}");
                }
            }
            Ok(())
        }

        Command::Convert {
            input,
            target,
            output,
        } => {
            let target = parse_target(&target)?;
            let outcome = orchestrator
                .convert(&input, target, output.as_deref())
                .await;
            report(cli.json, cli.quiet, outcome)
        }

        Command::Split {
            input,
            pages,
            output,
        } => {
            let outcome = orchestrator.split(&input, &pages, output.as_deref()).await;
            report(cli.json, cli.quiet, outcome)
        }

        Command::Merge { inputs, output } => {
            let outcome = orchestrator.merge(&inputs, &output).await;
            report(cli.json, cli.quiet, outcome)
        }
    }
}

/// Parse `--to` into a target format, rejecting non-target formats early
/// with the full supported list in the message.
fn parse_target(s: &str) -> Result<DocumentFormat> {
    let format = DocumentFormat::from_extension(&s.trim().to_ascii_lowercase())
        .filter(|f| f.is_valid_target());
    format.with_context(|| {
        format!("Unsupported target '{s}'. Supported: pdf, docx, pptx, xlsx, rtf, odt, epub, jpg, png")
    })
}

/// Print the outcome and set the exit status.
fn report(json: bool, quiet: bool, outcome: ConversionOutcome) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?
        );
        if !outcome.is_success() {
            std::process::exit(1);
        }
        return Ok(());
    }

    match &outcome {
        ConversionOutcome::Success {
            artifacts,
            message,
            elapsed_ms,
        } => {
            if !quiet {
                eprintln!(
                    "{} {}  {}",
                    green("✔"),
                    bold(message),
                    dim(&format!("{elapsed_ms} ms"))
                );
            }
            // Artifact paths on stdout, one per line, for shell pipelines.
            for doc in artifacts {
                println!("{}", doc.path().display());
            }
            Ok(())
        }
        ConversionOutcome::Failure { message, .. } => {
            eprintln!("{} {}", red("✘"), message);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_errors_pass_through_untouched() {
        assert_eq!(truncate_error("soffice exited with 1"), "soffice exited with 1");
    }

    #[test]
    fn long_multibyte_errors_truncate_on_a_character_boundary() {
        let long = "é".repeat(100);
        let msg = truncate_error(&long);
        assert_eq!(msg.chars().count(), 80);
        assert!(msg.ends_with('\u{2026}'));
    }
}
