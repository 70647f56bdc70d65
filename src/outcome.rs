//! The single result type that crosses the orchestrator boundary.
//!
//! Every operation — convert, split, merge — produces exactly one
//! [`ConversionOutcome`]: either a success with an ordered artifact list, or
//! a failure with a [`FailureKind`] tag and one human-readable message.
//! No partial or mixed states exist, and no error value ever escapes past
//! the facade. Callers that want per-call-site tuples can destructure; the
//! core never drifts between result shapes.

use crate::error::{ConvertError, FailureKind};
use crate::format::Document;
use serde::{Deserialize, Serialize};

/// Outcome of one conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// The pipeline ran to completion.
    Success {
        /// Final artifacts, in order. A single document for
        /// document-to-document conversions; one image per page for
        /// PDF-to-image conversions.
        artifacts: Vec<Document>,
        /// One human-readable summary line.
        message: String,
        /// Wall-clock duration of the whole job.
        elapsed_ms: u64,
    },
    /// The pipeline failed or was cancelled; all intermediates were cleaned
    /// up before this was returned.
    Failure {
        kind: FailureKind,
        /// The failing stage's message, not a generic wrapper.
        message: String,
        elapsed_ms: u64,
    },
}

impl ConversionOutcome {
    pub(crate) fn success(
        artifacts: Vec<Document>,
        message: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self::Success {
            artifacts,
            message: message.into(),
            elapsed_ms,
        }
    }

    pub(crate) fn failure(err: &ConvertError, elapsed_ms: u64) -> Self {
        Self::Failure {
            kind: err.kind(),
            message: err.to_string(),
            elapsed_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The artifact list (empty for failures).
    pub fn artifacts(&self) -> &[Document] {
        match self {
            Self::Success { artifacts, .. } => artifacts,
            Self::Failure { .. } => &[],
        }
    }

    /// The human-readable message for either variant.
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message, .. } => message,
        }
    }
}

/// Document metadata returned by `inspect`, without converting anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DocumentFormat;

    #[test]
    fn failure_carries_kind_and_message() {
        let err = ConvertError::BackendUnavailable {
            backend: "LibreOffice".into(),
            hint: "install it".into(),
        };
        let outcome = ConversionOutcome::failure(&err, 12);
        assert!(!outcome.is_success());
        assert!(outcome.artifacts().is_empty());
        assert!(outcome.message().contains("LibreOffice"));
        match outcome {
            ConversionOutcome::Failure { kind, .. } => {
                assert_eq!(kind, FailureKind::BackendUnavailable)
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn json_shape_is_tagged() {
        let doc = Document::produced("out/split_1.pdf".into(), DocumentFormat::Pdf);
        let outcome = ConversionOutcome::success(vec![doc], "PDF split successful", 40);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["artifacts"].as_array().unwrap().len(), 1);
        assert_eq!(json["message"], "PDF split successful");
    }
}
