//! Office-suite conversion adapter.
//!
//! This adapter owns a two-attempt policy that is invisible to routing: the
//! thin `unoconv` bridge is tried first (it reuses a running office instance
//! and starts faster), and on any failure the full
//! `soffice --headless --convert-to` invocation runs as the second attempt.
//! When both fail, the *second* attempt's error is surfaced — soffice is the
//! authoritative converter, so its diagnosis is the one worth reading.
//!
//! LibreOffice does not always report the file it produced, and is known to
//! vary the output extension's case. The adapter therefore locates the
//! produced file itself: exact expected name first, then a case-insensitive
//! scan of the output directory, and returns the path it actually found.

use crate::error::ConvertError;
use crate::format::{Document, DocumentFormat};
use crate::probe::BackendProbe;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Convert `input` to `target` inside `output_dir` via the office suite.
///
/// Returns the document actually produced, wherever the suite put it.
pub async fn convert(
    input: &Document,
    target: DocumentFormat,
    output_dir: &Path,
    probe: &BackendProbe,
    timeout_secs: u64,
) -> Result<Document, ConvertError> {
    let ext = target.extension();
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
    let expected = output_dir.join(format!("{stem}.{ext}"));

    // Attempt 1: the unoconv bridge, when present. Failure here is only
    // logged; soffice gets the final word.
    if probe.office_bridge_available() {
        let mut cmd = Command::new("unoconv");
        cmd.arg("-f")
            .arg(ext)
            .arg("-o")
            .arg(&expected)
            .arg(input.path());
        match run_checked(cmd, "unoconv", timeout_secs).await {
            Ok(()) => {
                if let Some(found) = find_produced_output(output_dir, stem, ext) {
                    debug!("unoconv produced {}", found.display());
                    return Ok(Document::produced(found, target));
                }
                warn!("unoconv exited cleanly but produced no output, falling back to soffice");
            }
            Err(e) => warn!("unoconv attempt failed ({e}), falling back to soffice"),
        }
    }

    // Attempt 2: soffice headless. This one's error surfaces.
    if !probe.office_suite_available() {
        return Err(ConvertError::BackendUnavailable {
            backend: "LibreOffice".to_string(),
            hint: "Install LibreOffice (the `soffice` command) for document conversion."
                .to_string(),
        });
    }

    let mut cmd = Command::new("soffice");
    cmd.arg("--headless")
        .arg("--convert-to")
        .arg(ext)
        .arg("--outdir")
        .arg(output_dir)
        .arg(input.path());
    run_checked(cmd, "soffice", timeout_secs).await?;

    match find_produced_output(output_dir, stem, ext) {
        Some(found) => {
            debug!("soffice produced {}", found.display());
            Ok(Document::produced(found, target))
        }
        None => Err(ConvertError::MissingOutput {
            command: "soffice".to_string(),
            dir: output_dir.to_path_buf(),
        }),
    }
}

/// Run a command to completion under the configured timeout, mapping
/// non-zero exit and spawn failures to `ProcessFailed`. Shared with the
/// other external-process adapters in this module tree.
pub(super) async fn run_checked(
    mut cmd: Command,
    name: &str,
    timeout_secs: u64,
) -> Result<(), ConvertError> {
    cmd.kill_on_drop(true);
    debug!("running {name}: {cmd:?}");

    let result = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()).await;

    let output = match result {
        Err(_elapsed) => {
            return Err(ConvertError::ProcessFailed {
                command: name.to_string(),
                detail: format!("timed out after {timeout_secs}s"),
            });
        }
        Ok(Err(e)) => {
            return Err(ConvertError::ProcessFailed {
                command: name.to_string(),
                detail: format!("failed to start: {e}"),
            });
        }
        Ok(Ok(output)) => output,
    };

    if output.status.success() {
        Ok(())
    } else {
        Err(ConvertError::ProcessFailed {
            command: name.to_string(),
            detail: format!(
                "exit {}: {}",
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr_excerpt(&output.stderr)
            ),
        })
    }
}

/// Locate the file a converter produced for `stem` with extension `ext`:
/// exact name first, then a case-insensitive directory scan.
pub(super) fn find_produced_output(dir: &Path, stem: &str, ext: &str) -> Option<PathBuf> {
    let exact = dir.join(format!("{stem}.{ext}"));
    if exact.is_file() {
        return Some(exact);
    }

    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let stem_matches = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.eq_ignore_ascii_case(stem));
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if stem_matches && ext_matches {
            return Some(path);
        }
    }
    None
}

/// Last non-empty stderr line, truncated. Office suites write paragraphs of
/// warnings; the final line almost always carries the actual failure.
fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let line = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("(no stderr)")
        .trim()
        .to_string();
    if line.chars().count() > 200 {
        let truncated: String = line.chars().take(200).collect();
        format!("{truncated}...")
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_exact_output_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"%PDF").unwrap();
        let found = find_produced_output(dir.path(), "report", "pdf").unwrap();
        assert_eq!(found, dir.path().join("report.pdf"));
    }

    #[test]
    fn scan_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Report.PDF"), b"%PDF").unwrap();
        let found = find_produced_output(dir.path(), "report", "pdf").unwrap();
        assert_eq!(found, dir.path().join("Report.PDF"));
    }

    #[test]
    fn no_match_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("other.pdf"), b"%PDF").unwrap();
        assert!(find_produced_output(dir.path(), "report", "pdf").is_none());
        assert!(find_produced_output(dir.path(), "other", "docx").is_none());
    }

    #[test]
    fn stderr_excerpt_keeps_last_line() {
        let noise = b"Warning: fontconfig\nWarning: something else\nError: source file could not be loaded\n";
        assert_eq!(
            stderr_excerpt(noise),
            "Error: source file could not be loaded"
        );
        assert_eq!(stderr_excerpt(b""), "(no stderr)");
    }

    #[tokio::test]
    async fn missing_backends_fail_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("doc.docx");
        std::fs::write(&input_path, b"fake").unwrap();
        let input = Document::open(&input_path).unwrap();

        let probe = BackendProbe::assume(false, false, false, false);
        let err = convert(&input, DocumentFormat::Pdf, dir.path(), &probe, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::BackendUnavailable { .. }));
    }
}
