//! The pipeline executor and the backend adapters it drives.
//!
//! A resolved route is a list of [`Stage`]s run strictly in order. Each
//! stage consumes the previous stage's artifacts and produces the next;
//! intermediates live in the orchestrator's [`TempWorkspace`] and are
//! deleted the moment the following stage has consumed them, so a job never
//! holds more than one intermediate generation on disk. Only the final
//! stage writes into the caller's output directory.
//!
//! Failure handling is strict: the first stage whose primary and fallback
//! attempts are all exhausted aborts the job, remaining intermediates are
//! removed, and the failing adapter's error is surfaced unchanged. An
//! absent fallback tool never masks the primary's diagnosis. Adapters that
//! write multiple files into the final output directory (the rasterisers)
//! delete their own partial output on error, so a failed job leaves the
//! destination as it found it.
//!
//! Cancellation is cooperative and checked at stage boundaries. A stage in
//! flight runs to completion; its outputs are then cleaned up like any
//! other abandoned intermediate.

pub mod docx;
pub mod office;
pub mod pdfpages;
pub mod raster;

use crate::config::OrchestratorConfig;
use crate::error::ConvertError;
use crate::format::Document;
use crate::probe::BackendProbe;
use crate::progress::ProgressCallback;
use crate::route::{Capability, Stage};
use crate::workspace::TempWorkspace;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs one resolved route to completion.
pub(crate) struct PipelineExecutor<'a> {
    pub config: &'a OrchestratorConfig,
    pub probe: BackendProbe,
    pub workspace: &'a TempWorkspace,
    pub progress: ProgressCallback,
    pub cancel: Arc<AtomicBool>,
}

impl PipelineExecutor<'_> {
    /// Execute `stages` starting from `input`, writing final artifacts into
    /// `final_dir`. Returns the last stage's artifacts in order.
    pub async fn execute(
        &self,
        input: Document,
        stages: &[Stage],
        final_dir: &Path,
    ) -> Result<Vec<Document>, ConvertError> {
        let total = stages.len();
        self.progress.on_job_start(total);

        let mut current = vec![input];
        for (index, stage) in stages.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                self.cleanup(&current);
                self.progress.on_job_complete(false);
                return Err(ConvertError::Cancelled);
            }

            let label = stage.label();
            self.progress.on_stage_start(index, total, &label);
            debug!("stage {}/{}: {}", index + 1, total, label);

            let is_last = index + 1 == total;
            let out_dir = if is_last {
                final_dir.to_path_buf()
            } else {
                self.workspace.dir()?.to_path_buf()
            };

            match self.run_stage(stage, &current, &out_dir).await {
                Ok(produced) => {
                    // The consumed generation is no longer needed.
                    self.cleanup(&current);
                    current = produced;
                    self.progress.on_stage_complete(index, total);
                }
                Err(e) => {
                    self.progress.on_stage_error(index, total, &e.to_string());
                    self.cleanup(&current);
                    self.progress.on_job_complete(false);
                    return Err(e);
                }
            }
        }

        self.progress.on_job_complete(true);
        Ok(current)
    }

    /// Run one stage: the primary capability, then fallbacks in order.
    ///
    /// The surfaced error is the most informative failed attempt's: a
    /// fallback that turns out to be uninstalled keeps the primary's error.
    async fn run_stage(
        &self,
        stage: &Stage,
        inputs: &[Document],
        out_dir: &Path,
    ) -> Result<Vec<Document>, ConvertError> {
        let mut last_err = match self.attempt(&stage.primary, inputs, out_dir).await {
            Ok(produced) => return Ok(produced),
            Err(e) => e,
        };

        for fallback in &stage.fallbacks {
            warn!(
                "'{}' failed ({}); trying fallback '{}'",
                stage.primary.label(),
                last_err,
                fallback.label()
            );
            match self.attempt(fallback, inputs, out_dir).await {
                Ok(produced) => return Ok(produced),
                Err(ConvertError::BackendUnavailable { backend, .. }) => {
                    debug!("fallback backend {backend} unavailable, keeping primary error");
                }
                Err(e) => last_err = e,
            }
        }

        Err(last_err)
    }

    async fn attempt(
        &self,
        capability: &Capability,
        inputs: &[Document],
        out_dir: &Path,
    ) -> Result<Vec<Document>, ConvertError> {
        let input = inputs
            .first()
            .ok_or_else(|| ConvertError::Internal("stage has no input artifact".into()))?;
        let timeout = self.config.process_timeout_secs;

        match capability {
            Capability::SplitPdf(selection) => {
                Ok(vec![pdfpages::split(input, selection, out_dir).await?])
            }
            Capability::MergePdf { inputs, output } => {
                Ok(vec![pdfpages::merge(inputs, output).await?])
            }
            Capability::PdfToDocx => {
                Ok(vec![docx::convert(input, out_dir, &self.probe, timeout).await?])
            }
            Capability::OfficeConvert(target) => Ok(vec![
                office::convert(input, *target, out_dir, &self.probe, timeout).await?,
            ]),
            Capability::RasterizePdf(target) => {
                raster::rasterize(input, *target, out_dir, self.config).await
            }
            Capability::RasterizePdftoppm(target) => {
                raster::rasterize_pdftoppm(input, *target, out_dir, self.config, &self.probe)
                    .await
            }
        }
    }

    /// Remove abandoned or consumed intermediates. Caller-supplied inputs
    /// and final artifacts are outside the workspace and survive untouched.
    fn cleanup(&self, artifacts: &[Document]) {
        for doc in artifacts {
            self.workspace.discard(doc.path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::PageSelection;
    use crate::progress::{NoopProgressCallback, StageProgressCallback};
    use crate::route;
    use std::sync::atomic::AtomicUsize;

    fn executor<'a>(
        config: &'a OrchestratorConfig,
        workspace: &'a TempWorkspace,
        progress: ProgressCallback,
        cancel: Arc<AtomicBool>,
    ) -> PipelineExecutor<'a> {
        PipelineExecutor {
            config,
            probe: BackendProbe::assume(false, false, false, false),
            workspace,
            progress,
            cancel,
        }
    }

    #[tokio::test]
    async fn split_stage_runs_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("five.pdf");
        pdfpages::tests::create_test_pdf(&src, 5);

        let config = OrchestratorConfig::default();
        let workspace = TempWorkspace::new();
        let exec = executor(
            &config,
            &workspace,
            Arc::new(NoopProgressCallback),
            Arc::new(AtomicBool::new(false)),
        );

        let input = Document::open(&src).unwrap();
        let selection = PageSelection::parse("1-2", 5).unwrap();
        let artifacts = exec
            .execute(input, &route::split_route(selection), dir.path())
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].path().exists());
        assert_eq!(
            lopdf::Document::load(artifacts[0].path())
                .unwrap()
                .get_pages()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn cancellation_observed_before_first_stage() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("doc.pdf");
        pdfpages::tests::create_test_pdf(&src, 2);

        let config = OrchestratorConfig::default();
        let workspace = TempWorkspace::new();
        let cancel = Arc::new(AtomicBool::new(true));
        let exec = executor(&config, &workspace, Arc::new(NoopProgressCallback), cancel);

        let input = Document::open(&src).unwrap();
        let selection = PageSelection::parse("1", 2).unwrap();
        let err = exec
            .execute(input, &route::split_route(selection), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::Cancelled));
        // No output appeared.
        let produced: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("split_"))
            .collect();
        assert!(produced.is_empty());
    }

    struct CountingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        job_completes: AtomicUsize,
    }

    impl StageProgressCallback for CountingCallback {
        fn on_stage_start(&self, _i: usize, _n: usize, _label: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_stage_complete(&self, _i: usize, _n: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_job_complete(&self, _success: bool) {
            self.job_completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn progress_events_fire_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("doc.pdf");
        pdfpages::tests::create_test_pdf(&src, 3);

        let cb = Arc::new(CountingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            job_completes: AtomicUsize::new(0),
        });
        let config = OrchestratorConfig::default();
        let workspace = TempWorkspace::new();
        let exec = executor(
            &config,
            &workspace,
            cb.clone(),
            Arc::new(AtomicBool::new(false)),
        );

        let input = Document::open(&src).unwrap();
        let selection = PageSelection::parse("2-3", 3).unwrap();
        exec.execute(input, &route::split_route(selection), dir.path())
            .await
            .unwrap();

        assert_eq!(cb.starts.load(Ordering::SeqCst), 1);
        assert_eq!(cb.completes.load(Ordering::SeqCst), 1);
        assert_eq!(cb.job_completes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_stage_surfaces_adapter_error() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("junk.pdf");
        std::fs::write(&junk, b"not a pdf").unwrap();

        let config = OrchestratorConfig::default();
        let workspace = TempWorkspace::new();
        let exec = executor(
            &config,
            &workspace,
            Arc::new(NoopProgressCallback),
            Arc::new(AtomicBool::new(false)),
        );

        let input = Document::open(&junk).unwrap();
        let selection = PageSelection::from_indices(vec![0], 1).unwrap();
        let err = exec
            .execute(input, &route::split_route(selection), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Unreadable { .. }));
    }
}
