//! PDF → DOCX via the dedicated `pdf2docx` converter.
//!
//! The office suite can open PDFs but reflows them badly; `pdf2docx`
//! reconstructs actual Word layout from the PDF's text and table geometry,
//! so the PDF → DOCX route uses it exclusively. No fallback: when the tool
//! is absent the route fails at resolve time with `BackendUnavailable`.

use crate::error::ConvertError;
use crate::format::{Document, DocumentFormat};
use crate::probe::BackendProbe;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// Convert a PDF to DOCX inside `output_dir`.
pub async fn convert(
    input: &Document,
    output_dir: &Path,
    probe: &BackendProbe,
    timeout_secs: u64,
) -> Result<Document, ConvertError> {
    if !probe.pdf_to_docx_available() {
        return Err(ConvertError::BackendUnavailable {
            backend: "pdf2docx".to_string(),
            hint: "Install the pdf2docx converter (pip install pdf2docx) for PDF → DOCX."
                .to_string(),
        });
    }

    let stem = input
        .path()
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            ConvertError::InvalidRequest(format!(
                "input path '{}' has no usable file stem",
                input.path().display()
            ))
        })?;
    let output = output_dir.join(format!("{stem}.docx"));

    let mut cmd = Command::new("pdf2docx");
    cmd.arg("convert").arg(input.path()).arg(&output);
    debug!("pdf2docx {} → {}", input.path().display(), output.display());
    super::office::run_checked(cmd, "pdf2docx", timeout_secs).await?;

    match super::office::find_produced_output(output_dir, stem, "docx") {
        Some(found) => {
            info!("pdf2docx produced {}", found.display());
            Ok(Document::produced(found, DocumentFormat::Docx))
        }
        None => Err(ConvertError::MissingOutput {
            command: "pdf2docx".to_string(),
            dir: output_dir.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_converter_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("doc.pdf");
        std::fs::write(&src, b"%PDF-1.7").unwrap();
        let input = Document::open(&src).unwrap();

        let probe = BackendProbe::assume(true, true, false, true);
        let err = convert(&input, dir.path(), &probe, 5).await.unwrap_err();
        assert!(matches!(err, ConvertError::BackendUnavailable { .. }));
        assert!(err.to_string().contains("pdf2docx"));
    }
}
