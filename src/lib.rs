//! # zepdf
//!
//! A document-conversion orchestrator: route any supported (source, target)
//! format pair through the right backend chain, plus PDF page surgery
//! (split and merge).
//!
//! ## Why this crate?
//!
//! No single tool converts everything well. The office suite handles Word,
//! spreadsheets, and presentations but reflows PDFs badly; `pdf2docx`
//! reconstructs real Word layout from PDF geometry; pdfium rasterises pages
//! accurately but only pages. This crate encodes which backend owns which
//! format pair, chains them through intermediate artifacts where one hop is
//! not enough, and falls back when a backend misfires — behind one facade
//! that always returns a single [`ConversionOutcome`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! request
//!  │
//!  ├─ 1. Validate  open input, check format, size cap, output dir
//!  ├─ 2. Probe     backend availability (once per orchestrator)
//!  ├─ 3. Route     (source, target) → ordered stages + fallbacks
//!  ├─ 4. Execute   run stages sequentially, intermediates in a temp
//!  │               workspace, deleted as soon as they are consumed
//!  └─ 5. Outcome   Success{artifacts} | Failure{kind, message}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zepdf::{DocumentFormat, Orchestrator, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = Orchestrator::new(OrchestratorConfig::default());
//!
//!     let outcome = orchestrator
//!         .convert("report.docx", DocumentFormat::Pdf, None)
//!         .await;
//!     println!("{}", outcome.message());
//!
//!     let outcome = orchestrator.split("report.pdf", "1-3,7", None).await;
//!     for doc in outcome.artifacts() {
//!         println!("wrote {}", doc.path().display());
//!     }
//! }
//! ```
//!
//! ## External backends
//!
//! | Tool | Used for | Probed as |
//! |------|----------|-----------|
//! | LibreOffice | office-format conversions | `soffice` |
//! | unoconv | faster office bridge (optional) | `unoconv` |
//! | pdf2docx | PDF → DOCX | `pdf2docx` |
//! | poppler | fallback rasteriser (optional) | `pdftoppm` |
//!
//! Split, merge, and PDF → image (via pdfium) work with none of them
//! installed. Everything else fails fast with a `BackendUnavailable`
//! outcome naming the missing tool.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `zepdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! zepdf = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod format;
pub mod orchestrator;
pub mod outcome;
pub mod pages;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod route;
mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};
pub use error::{ConvertError, FailureKind};
pub use format::{Document, DocumentFormat};
pub use orchestrator::{CancelHandle, Orchestrator};
pub use outcome::{ConversionOutcome, DocumentMetadata};
pub use pages::PageSelection;
pub use probe::BackendProbe;
pub use progress::{NoopProgressCallback, ProgressCallback, StageProgressCallback};
