//! Format-pair routing: resolve a (source, target) pair into an ordered
//! pipeline of stages, with per-stage fallback adapters.
//!
//! Routing is data-driven over the closed [`DocumentFormat`] enum, so every
//! supported pair is visible in one `match` and an unsupported pair is a
//! compile-visible gap rather than a string fallthrough. Stages that need
//! the headless office suite are gated on the [`BackendProbe`] at resolve
//! time: if the suite is absent the whole route fails immediately with
//! `BackendUnavailable` — no partial pipeline ever starts for a capability
//! this design has no fallback for.
//!
//! The office adapter's internal unoconv-then-soffice retry is *not*
//! represented here; it is the adapter's own two-attempt policy
//! (see [`crate::pipeline::office`]).

use crate::error::ConvertError;
use crate::format::{Document, DocumentFormat};
use crate::pages::PageSelection;
use crate::probe::BackendProbe;
use std::path::PathBuf;

/// One adapter capability a stage can require.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability {
    /// Extract selected pages of a PDF into a new PDF.
    SplitPdf(PageSelection),
    /// Concatenate PDFs in list order into the given output file.
    MergePdf {
        inputs: Vec<Document>,
        output: PathBuf,
    },
    /// Convert a PDF to DOCX via the dedicated converter.
    PdfToDocx,
    /// Generic office-suite conversion to the given target format.
    OfficeConvert(DocumentFormat),
    /// Rasterise a PDF to one image per page, in-process via pdfium.
    RasterizePdf(DocumentFormat),
    /// Rasterise a PDF via the external `pdftoppm` process.
    RasterizePdftoppm(DocumentFormat),
}

impl Capability {
    /// Short human-readable label used in progress events and logs.
    pub fn label(&self) -> String {
        match self {
            Capability::SplitPdf(sel) => format!("split {} pages", sel.len()),
            Capability::MergePdf { inputs, .. } => format!("merge {} documents", inputs.len()),
            Capability::PdfToDocx => "pdf to docx".to_string(),
            Capability::OfficeConvert(t) => format!("office convert to {t}"),
            Capability::RasterizePdf(t) => format!("rasterise to {t}"),
            Capability::RasterizePdftoppm(t) => format!("rasterise to {t} (pdftoppm)"),
        }
    }

    /// The format of the artifact this capability produces.
    pub fn output_format(&self) -> DocumentFormat {
        match self {
            Capability::SplitPdf(_) | Capability::MergePdf { .. } => DocumentFormat::Pdf,
            Capability::PdfToDocx => DocumentFormat::Docx,
            Capability::OfficeConvert(t)
            | Capability::RasterizePdf(t)
            | Capability::RasterizePdftoppm(t) => *t,
        }
    }
}

/// One step of a resolved pipeline: a primary adapter plus the fallbacks
/// tried in order if the primary attempt fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub primary: Capability,
    pub fallbacks: Vec<Capability>,
}

impl Stage {
    fn single(primary: Capability) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
        }
    }

    pub fn label(&self) -> String {
        self.primary.label()
    }
}

/// Resolve the stage pipeline for a format-pair conversion.
///
/// Fails with `BackendUnavailable` when a required office-suite stage has a
/// negative probe, and with `InvalidRequest` for a no-op pair.
pub fn resolve(
    source: DocumentFormat,
    target: DocumentFormat,
    probe: &BackendProbe,
) -> Result<Vec<Stage>, ConvertError> {
    if source == target {
        return Err(ConvertError::InvalidRequest(format!(
            "input is already {target}; nothing to convert"
        )));
    }
    if !target.is_valid_target() {
        return Err(ConvertError::UnsupportedTarget {
            requested: target.to_string(),
        });
    }

    let route = match (source, target) {
        // PDF → DOCX uses the dedicated converter, not the office suite.
        (DocumentFormat::Pdf, DocumentFormat::Docx) => {
            require_pdf_to_docx(probe)?;
            vec![Stage::single(Capability::PdfToDocx)]
        }

        // PDF → image: in-process pdfium first, external pdftoppm as the
        // fallback rasteriser.
        (DocumentFormat::Pdf, t) if t.is_image() => vec![rasterize_stage(t)],

        // Word → image is a two-stage chain through an intermediate PDF.
        (s, t) if s.is_word() && t.is_image() => {
            require_office(probe)?;
            vec![
                Stage::single(Capability::OfficeConvert(DocumentFormat::Pdf)),
                rasterize_stage(t),
            ]
        }

        // Everything else — Word → PDF/office targets, PDF → office
        // targets, image/ebook inputs — goes through the office suite.
        (_, t) => {
            require_office(probe)?;
            vec![Stage::single(Capability::OfficeConvert(t))]
        }
    };

    Ok(route)
}

/// Route for a PDF split operation.
pub fn split_route(selection: PageSelection) -> Vec<Stage> {
    vec![Stage::single(Capability::SplitPdf(selection))]
}

/// Route for a PDF merge operation.
pub fn merge_route(inputs: Vec<Document>, output: PathBuf) -> Vec<Stage> {
    vec![Stage::single(Capability::MergePdf { inputs, output })]
}

fn rasterize_stage(target: DocumentFormat) -> Stage {
    Stage {
        primary: Capability::RasterizePdf(target),
        fallbacks: vec![Capability::RasterizePdftoppm(target)],
    }
}

fn require_office(probe: &BackendProbe) -> Result<(), ConvertError> {
    if probe.office_suite_available() {
        Ok(())
    } else {
        Err(ConvertError::BackendUnavailable {
            backend: "LibreOffice".to_string(),
            hint: "Install LibreOffice (the `soffice` command) for document conversion."
                .to_string(),
        })
    }
}

fn require_pdf_to_docx(probe: &BackendProbe) -> Result<(), ConvertError> {
    if probe.pdf_to_docx_available() {
        Ok(())
    } else {
        Err(ConvertError::BackendUnavailable {
            backend: "pdf2docx".to_string(),
            hint: "Install the pdf2docx converter (pip install pdf2docx) for PDF → DOCX."
                .to_string(),
        })
    }
}
