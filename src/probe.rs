//! Backend-availability probing.
//!
//! Every external tool the orchestrator can invoke is probed exactly once
//! per orchestrator lifetime and the results carried as a plain value.
//! Re-probing per stage would spawn a process lookup on every pipeline step;
//! a value also makes routing testable — tests construct a probe with
//! [`BackendProbe::assume`] instead of depending on what happens to be
//! installed on the build machine.
//!
//! Absence of a tool is a normal result, never an error: probes return
//! `false` on any detection failure.

use tracing::debug;

/// Cached presence of each external conversion tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendProbe {
    office_suite: bool,
    office_bridge: bool,
    pdf_to_docx: bool,
    pdftoppm: bool,
}

impl BackendProbe {
    /// Probe the current host. Cheap (one PATH lookup per tool) and
    /// infallible; run once when the orchestrator is constructed.
    pub fn detect() -> Self {
        let probe = Self {
            office_suite: exists("soffice"),
            office_bridge: exists("unoconv"),
            pdf_to_docx: exists("pdf2docx"),
            pdftoppm: exists("pdftoppm"),
        };
        debug!(?probe, "backend probe complete");
        probe
    }

    /// Construct a probe with fixed answers. For tests and for hosts that
    /// manage tool discovery themselves.
    pub fn assume(office_suite: bool, office_bridge: bool, pdf_to_docx: bool, pdftoppm: bool) -> Self {
        Self {
            office_suite,
            office_bridge,
            pdf_to_docx,
            pdftoppm,
        }
    }

    /// Is the headless office suite (`soffice`) invocable?
    pub fn office_suite_available(&self) -> bool {
        self.office_suite
    }

    /// Is the thinner CLI bridge (`unoconv`) invocable? Only consulted
    /// inside the office adapter's two-attempt policy, never for routing.
    pub fn office_bridge_available(&self) -> bool {
        self.office_bridge
    }

    /// Is the PDF-to-Word converter (`pdf2docx`) invocable?
    pub fn pdf_to_docx_available(&self) -> bool {
        self.pdf_to_docx
    }

    /// Is the fallback rasteriser (`pdftoppm`) invocable?
    pub fn pdftoppm_available(&self) -> bool {
        self.pdftoppm
    }
}

fn exists(name: &str) -> bool {
    which::which(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assume_fixes_answers() {
        let probe = BackendProbe::assume(true, false, true, false);
        assert!(probe.office_suite_available());
        assert!(!probe.office_bridge_available());
        assert!(probe.pdf_to_docx_available());
        assert!(!probe.pdftoppm_available());
    }

    #[test]
    fn detect_never_panics() {
        // Whatever the host has installed, detection is infallible.
        let _ = BackendProbe::detect();
    }

    #[test]
    fn nonsense_executable_is_absent() {
        assert!(!exists("zepdf-definitely-not-a-real-binary"));
    }
}
