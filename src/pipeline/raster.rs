//! PDF rasterisation: one image file per page.
//!
//! The primary rasteriser is in-process pdfium. The `pdfium-render` crate
//! wraps the pdfium C++ library, which uses thread-local state internally
//! and is not safe to call from async contexts; all pdfium work therefore
//! runs inside `tokio::task::spawn_blocking`.
//!
//! The fallback rasteriser shells out to poppler's `pdftoppm`, which exists
//! on most hosts that lack a pdfium build. Both produce the same artifact
//! layout: `page_1.<ext>`, `page_2.<ext>`, … in the output directory, in
//! page order.
//!
//! Pixel sizing is DPI-driven but capped: page sizes vary wildly, and an A0
//! poster at 300 DPI would otherwise allocate a five-digit-pixel bitmap per
//! edge. The longest edge never exceeds `max_render_pixels`.

use crate::config::OrchestratorConfig;
use crate::error::ConvertError;
use crate::format::{Document, DocumentFormat};
use crate::probe::BackendProbe;
use pdfium_render::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Rasterise every page of `input` into `output_dir` via pdfium.
///
/// Returns the written page images in page order.
pub async fn rasterize(
    input: &Document,
    target: DocumentFormat,
    output_dir: &Path,
    config: &OrchestratorConfig,
) -> Result<Vec<Document>, ConvertError> {
    let path = input.path().to_path_buf();
    let out_dir = output_dir.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_render_pixels;

    let paths = tokio::task::spawn_blocking(move || {
        rasterize_blocking(&path, target, &out_dir, dpi, max_pixels)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("render task panicked: {e}")))??;

    info!(
        "rasterised {} pages of {} → {}",
        paths.len(),
        input.path().display(),
        output_dir.display()
    );
    Ok(paths
        .into_iter()
        .map(|p| Document::produced(p, target))
        .collect())
}

fn rasterize_blocking(
    pdf_path: &Path,
    target: DocumentFormat,
    output_dir: &Path,
    dpi: u32,
    max_pixels: u32,
) -> Result<Vec<PathBuf>, ConvertError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| ConvertError::Unreadable {
            path: pdf_path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total = pages.len() as usize;
    debug!("pdfium loaded {}: {} pages", pdf_path.display(), total);

    let scale = dpi as f32 / 72.0;
    let ext = target.extension();
    let mut written = Vec::with_capacity(total);

    let mut render_all = || -> Result<(), ConvertError> {
        for idx in 0..total {
            let page = pages
                .get(idx as u16)
                .map_err(|e| ConvertError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;

            // DPI sets the nominal size; the pixel cap bounds the longest edge.
            let width = ((page.width().value * scale).round() as i32).min(max_pixels as i32);
            let render_config = PdfRenderConfig::new()
                .set_target_width(width.max(1))
                .set_maximum_height(max_pixels as i32);

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ConvertError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                }
            })?;
            let image = bitmap.as_image();

            let out_path = output_dir.join(page_filename(idx + 1, ext));
            let write_result = match target {
                // JPEG has no alpha channel
                DocumentFormat::Jpg => image.to_rgb8().save(&out_path),
                _ => image.save(&out_path),
            };
            write_result.map_err(|e| ConvertError::OutputWriteFailed {
                path: out_path.clone(),
                source: std::io::Error::other(e.to_string()),
            })?;

            debug!(
                "page {} → {} ({}x{} px)",
                idx + 1,
                out_path.display(),
                image.width(),
                image.height()
            );
            written.push(out_path);
        }
        Ok(())
    };

    if let Err(e) = render_all() {
        // A half-rasterised document leaves no page images behind.
        remove_files(&written);
        return Err(e);
    }

    Ok(written)
}

/// Rasterise via the external `pdftoppm` process.
///
/// pdftoppm zero-pads its output numbering (`page-01.png`), so produced
/// files are renamed into the same `page_<n>.<ext>` layout the pdfium path
/// writes.
pub async fn rasterize_pdftoppm(
    input: &Document,
    target: DocumentFormat,
    output_dir: &Path,
    config: &OrchestratorConfig,
    probe: &BackendProbe,
) -> Result<Vec<Document>, ConvertError> {
    if !probe.pdftoppm_available() {
        return Err(ConvertError::BackendUnavailable {
            backend: "pdftoppm".to_string(),
            hint: "Install poppler-utils for the fallback rasteriser.".to_string(),
        });
    }

    let format_flag = match target {
        DocumentFormat::Png => "-png",
        _ => "-jpeg",
    };
    let prefix = output_dir.join("page");
    let ext = target.extension();

    // Snapshot `page-*` files already present: they belong to someone else
    // and are neither consumed nor deleted by this run.
    let preexisting: HashSet<PathBuf> = collect_pdftoppm_pages(output_dir, ext)?
        .into_iter()
        .map(|(_, path)| path)
        .collect();

    let mut cmd = Command::new("pdftoppm");
    cmd.arg(format_flag)
        .arg("-r")
        .arg(config.dpi.to_string())
        .arg(input.path())
        .arg(&prefix);
    if let Err(e) = super::office::run_checked(cmd, "pdftoppm", config.process_timeout_secs).await
    {
        // A failed or timed-out run leaves none of its partial pages behind.
        let partial: Vec<PathBuf> = new_pdftoppm_pages(output_dir, ext, &preexisting)
            .into_iter()
            .map(|(_, path)| path)
            .collect();
        remove_files(&partial);
        return Err(e);
    }

    let produced = new_pdftoppm_pages(output_dir, ext, &preexisting);
    if produced.is_empty() {
        return Err(ConvertError::MissingOutput {
            command: "pdftoppm".to_string(),
            dir: output_dir.to_path_buf(),
        });
    }

    let mut artifacts: Vec<Document> = Vec::with_capacity(produced.len());
    for (n, (_page, path)) in produced.iter().enumerate() {
        let renamed = output_dir.join(page_filename(n + 1, ext));
        if path != &renamed {
            if let Err(e) = std::fs::rename(path, &renamed) {
                let mut leftovers: Vec<PathBuf> = artifacts
                    .iter()
                    .map(|d| d.path().to_path_buf())
                    .collect();
                leftovers.extend(produced.iter().skip(n).map(|(_, p)| p.clone()));
                remove_files(&leftovers);
                return Err(ConvertError::OutputWriteFailed {
                    path: renamed,
                    source: e,
                });
            }
        }
        artifacts.push(Document::produced(renamed, target));
    }

    info!(
        "pdftoppm rasterised {} pages of {}",
        artifacts.len(),
        input.path().display()
    );
    Ok(artifacts)
}

fn page_filename(page: usize, ext: &str) -> String {
    format!("page_{page}.{ext}")
}

fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}

/// The `page-<n>.<ext>` files this run produced: everything matching the
/// pdftoppm pattern minus the snapshot taken before the process started.
fn new_pdftoppm_pages(
    dir: &Path,
    ext: &str,
    preexisting: &HashSet<PathBuf>,
) -> Vec<(usize, PathBuf)> {
    collect_pdftoppm_pages(dir, ext)
        .unwrap_or_default()
        .into_iter()
        .filter(|(_, path)| !preexisting.contains(path))
        .collect()
}

/// Collect `page-<n>.<ext>` files pdftoppm wrote, sorted by page number
/// (lexicographic order is wrong once numbering crosses a digit boundary).
fn collect_pdftoppm_pages(dir: &Path, ext: &str) -> Result<Vec<(usize, PathBuf)>, ConvertError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConvertError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut pages = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if !ext_matches {
            continue;
        }
        if let Some(num) = stem.strip_prefix("page-").and_then(|n| n.parse::<usize>().ok()) {
            pages.push((num, path));
        }
    }
    pages.sort_by_key(|(num, _)| *num);
    Ok(pages)
}
