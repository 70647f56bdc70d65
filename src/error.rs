//! Error types for the zepdf library.
//!
//! One enum, [`ConvertError`], covers every way a conversion can fail.
//! Variants group into five families that callers treat differently:
//!
//! * **Validation** — the request itself was malformed (unsupported target,
//!   bad page expression, empty merge list). Rejected before any backend
//!   is touched.
//! * **BackendUnavailable** — a required external capability is absent on
//!   this host. Not retried; the message names the missing dependency.
//! * **ProcessFailed** — an external process exited non-zero or produced no
//!   output. The adapter retries once through its internal fallback command
//!   before surfacing this.
//! * **Unreadable / Io** — a source document could not be parsed, or an
//!   output path could not be written. Fatal for the current pipeline.
//! * **Cancelled** — cooperative cancellation observed between stages.
//!
//! Nothing here escapes the orchestrator facade: every `ConvertError` is
//! folded into a [`crate::outcome::ConversionOutcome::Failure`] with a
//! [`FailureKind`] tag before it reaches the caller.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the zepdf library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Request validation ────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the input.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file extension does not map to any known document format.
    #[error("Unrecognised file format for '{path}'\nSupported inputs: pdf, doc(x), ppt(x), xls(x), rtf, odt, odp, ods, epub, mobi, jpg, png")]
    UnknownFormat { path: PathBuf },

    /// The requested target is not in the fixed set of output formats.
    #[error("Unsupported target format '{requested}'\nSupported targets: pdf, docx, pptx, xlsx, rtf, odt, epub, jpg, png")]
    UnsupportedTarget { requested: String },

    /// Request shape is invalid (empty merge list, oversized input, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A page-range expression could not be parsed, or selected no pages.
    #[error("Invalid page range '{expression}': {detail}\nExpected comma-separated pages or ranges, e.g. \"1-3, 5, 7-10\".")]
    InvalidPageRange { expression: String, detail: String },

    // ── Backend availability ──────────────────────────────────────────────
    /// A required external tool is not installed on this host.
    #[error("{backend} is not installed.\n{hint}")]
    BackendUnavailable { backend: String, hint: String },

    // ── External process failures ─────────────────────────────────────────
    /// An external conversion process failed after all fallback attempts.
    #[error("{command} failed: {detail}")]
    ProcessFailed { command: String, detail: String },

    /// A conversion process claimed success but its output file never appeared.
    #[error("{command} reported success but produced no output in '{dir}'")]
    MissingOutput { command: String, dir: PathBuf },

    // ── Document errors ───────────────────────────────────────────────────
    /// The source document could not be parsed by the PDF engine.
    #[error("Cannot read '{path}' as PDF: {detail}")]
    Unreadable { path: PathBuf, detail: String },

    /// Rasterisation failed for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Cancellation ──────────────────────────────────────────────────────
    /// The job was cancelled between stages.
    #[error("Conversion cancelled")]
    Cancelled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Classify this error into the coarse [`FailureKind`] carried by a
    /// failure outcome.
    pub fn kind(&self) -> FailureKind {
        match self {
            ConvertError::FileNotFound { .. }
            | ConvertError::PermissionDenied { .. }
            | ConvertError::UnknownFormat { .. }
            | ConvertError::UnsupportedTarget { .. }
            | ConvertError::InvalidRequest(_)
            | ConvertError::InvalidPageRange { .. }
            | ConvertError::InvalidConfig(_) => FailureKind::Validation,
            ConvertError::BackendUnavailable { .. } => FailureKind::BackendUnavailable,
            ConvertError::ProcessFailed { .. } | ConvertError::MissingOutput { .. } => {
                FailureKind::ProcessFailed
            }
            ConvertError::Unreadable { .. } | ConvertError::RasterisationFailed { .. } => {
                FailureKind::Unreadable
            }
            ConvertError::OutputWriteFailed { .. } => FailureKind::Io,
            ConvertError::Cancelled => FailureKind::Cancelled,
            ConvertError::Internal(_) => FailureKind::Internal,
        }
    }
}

/// Coarse failure classification carried across the orchestrator boundary.
///
/// Serializable so CLI `--json` output and host applications can branch on
/// it without parsing the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    BackendUnavailable,
    ProcessFailed,
    Unreadable,
    Io,
    Cancelled,
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_target_names_the_format() {
        let e = ConvertError::UnsupportedTarget {
            requested: "mobi".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("mobi"), "got: {msg}");
        assert!(msg.contains("Supported targets"));
    }

    #[test]
    fn backend_unavailable_carries_hint() {
        let e = ConvertError::BackendUnavailable {
            backend: "LibreOffice".into(),
            hint: "Install it with: apt install libreoffice".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("LibreOffice"));
        assert!(msg.contains("apt install"));
        assert_eq!(e.kind(), FailureKind::BackendUnavailable);
    }

    #[test]
    fn kind_classification() {
        assert_eq!(
            ConvertError::InvalidRequest("x".into()).kind(),
            FailureKind::Validation
        );
        assert_eq!(ConvertError::Cancelled.kind(), FailureKind::Cancelled);
        assert_eq!(
            ConvertError::ProcessFailed {
                command: "soffice".into(),
                detail: "exit 1".into()
            }
            .kind(),
            FailureKind::ProcessFailed
        );
        assert_eq!(
            ConvertError::Unreadable {
                path: "x.pdf".into(),
                detail: "bad xref".into()
            }
            .kind(),
            FailureKind::Unreadable
        );
    }

    #[test]
    fn failure_kind_serialises_snake_case() {
        let s = serde_json::to_string(&FailureKind::BackendUnavailable).unwrap();
        assert_eq!(s, "\"backend_unavailable\"");
    }
}
