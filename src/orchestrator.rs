//! The orchestrator facade: the only entry point host applications use.
//!
//! One [`Orchestrator`] owns the validated configuration, the
//! once-per-lifetime backend probe, the scratch workspace, and the progress
//! callback. Every operation validates the request, resolves a route,
//! hands it to the pipeline executor, and folds the result into a single
//! [`ConversionOutcome`] — no `ConvertError` ever crosses this boundary
//! from the conversion operations.
//!
//! Jobs are serialised: the external office backends misbehave under
//! concurrent invocation, so a second job submitted while one runs waits
//! on an async mutex rather than being rejected. Cancellation is
//! cooperative via [`CancelHandle`] and takes effect at stage boundaries.

use crate::config::OrchestratorConfig;
use crate::error::ConvertError;
use crate::format::{Document, DocumentFormat};
use crate::outcome::{ConversionOutcome, DocumentMetadata};
use crate::pages::PageSelection;
use crate::pipeline::{pdfpages, PipelineExecutor};
use crate::probe::BackendProbe;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::route;
use crate::workspace::TempWorkspace;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Cooperative cancellation handle for the orchestrator's current job.
///
/// Cloneable and cheap; hand it to whatever drives your UI. Cancellation
/// is observed between pipeline stages, never mid-stage. The flag stays
/// set until [`CancelHandle::reset`] so a cancel issued between jobs still
/// stops the next one from starting.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Document-conversion orchestrator.
///
/// # Example
/// ```no_run
/// use zepdf::{DocumentFormat, Orchestrator, OrchestratorConfig};
///
/// # async fn run() {
/// let orchestrator = Orchestrator::new(OrchestratorConfig::default());
/// let outcome = orchestrator
///     .convert("report.docx", DocumentFormat::Pdf, None)
///     .await;
/// println!("{}", outcome.message());
/// # }
/// ```
pub struct Orchestrator {
    config: OrchestratorConfig,
    probe: BackendProbe,
    workspace: TempWorkspace,
    progress: ProgressCallback,
    cancel: Arc<AtomicBool>,
    job_lock: Mutex<()>,
}

impl Orchestrator {
    /// Build an orchestrator. Backends are probed here, exactly once; a
    /// `probe_override` in the config skips detection entirely.
    pub fn new(config: OrchestratorConfig) -> Self {
        let probe = config.probe_override.unwrap_or_else(BackendProbe::detect);
        Self {
            config,
            probe,
            workspace: TempWorkspace::new(),
            progress: Arc::new(NoopProgressCallback),
            cancel: Arc::new(AtomicBool::new(false)),
            job_lock: Mutex::new(()),
        }
    }

    /// Replace the progress callback. Call before submitting jobs.
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress = callback;
    }

    /// The probe results this orchestrator operates with.
    pub fn probe(&self) -> &BackendProbe {
        &self.probe
    }

    /// A handle that cancels the running (or next) job.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: self.cancel.clone(),
        }
    }

    /// Convert `input` to `target`, writing into `output_dir` (defaults to
    /// the input's directory).
    pub async fn convert(
        &self,
        input: impl AsRef<Path>,
        target: DocumentFormat,
        output_dir: Option<&Path>,
    ) -> ConversionOutcome {
        let started = Instant::now();
        let _job = self.job_lock.lock().await;
        let result = self.convert_inner(input.as_ref(), target, output_dir).await;
        self.finish(result, started)
    }

    async fn convert_inner(
        &self,
        input: &Path,
        target: DocumentFormat,
        output_dir: Option<&Path>,
    ) -> Result<(Vec<Document>, String), ConvertError> {
        let doc = self.accept(input)?;
        let out_dir = self.resolve_output_dir(input, output_dir)?;
        let stages = route::resolve(doc.format(), target, &self.probe)?;

        info!(
            "convert {} ({}) → {} [{} stage(s)]",
            input.display(),
            doc.format(),
            target,
            stages.len()
        );

        let artifacts = self.executor().execute(doc, &stages, &out_dir).await?;
        let message = if target.is_image() {
            format!(
                "Converted {} to {} page image(s)",
                file_name(input),
                artifacts.len()
            )
        } else {
            format!("Converted {} to {target}", file_name(input))
        };
        Ok((artifacts, message))
    }

    /// Extract the pages selected by `expression` into a new PDF.
    pub async fn split(
        &self,
        input: impl AsRef<Path>,
        expression: &str,
        output_dir: Option<&Path>,
    ) -> ConversionOutcome {
        let started = Instant::now();
        let _job = self.job_lock.lock().await;
        let result = self.split_inner(input.as_ref(), expression, output_dir).await;
        self.finish(result, started)
    }

    async fn split_inner(
        &self,
        input: &Path,
        expression: &str,
        output_dir: Option<&Path>,
    ) -> Result<(Vec<Document>, String), ConvertError> {
        let doc = self.accept(input)?;
        require_pdf(&doc, "split")?;
        let out_dir = self.resolve_output_dir(input, output_dir)?;

        // The expression is validated against the real page count, so a
        // malformed range fails before any output is touched.
        let total = pdfpages::page_count(doc.path()).await?;
        let selection = PageSelection::parse(expression, total)?;

        info!(
            "split {}: {} of {} pages",
            input.display(),
            selection.len(),
            total
        );

        let stages = route::split_route(selection.clone());
        let artifacts = self.executor().execute(doc, &stages, &out_dir).await?;
        let message = format!(
            "PDF split successful: {} page(s) → {}",
            selection.len(),
            artifacts
                .first()
                .map_or_else(String::new, |d| file_name(d.path()))
        );
        Ok((artifacts, message))
    }

    /// Concatenate `inputs`, in order, into a single PDF at `output`.
    pub async fn merge(
        &self,
        inputs: &[PathBuf],
        output: impl AsRef<Path>,
    ) -> ConversionOutcome {
        let started = Instant::now();
        let _job = self.job_lock.lock().await;
        let result = self.merge_inner(inputs, output.as_ref()).await;
        self.finish(result, started)
    }

    async fn merge_inner(
        &self,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<(Vec<Document>, String), ConvertError> {
        if inputs.len() < 2 {
            return Err(ConvertError::InvalidRequest(format!(
                "merge needs at least two PDFs, got {}",
                inputs.len()
            )));
        }
        let mut docs = Vec::with_capacity(inputs.len());
        for path in inputs {
            let doc = self.accept(path)?;
            require_pdf(&doc, "merge")?;
            docs.push(doc);
        }
        if DocumentFormat::from_path(output)? != DocumentFormat::Pdf {
            return Err(ConvertError::InvalidRequest(format!(
                "merge output must be a .pdf path, got '{}'",
                output.display()
            )));
        }
        let out_dir = output.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = out_dir {
            ensure_dir(dir)?;
        }

        info!("merge {} documents → {}", docs.len(), output.display());

        let nominal_input = docs[0].clone();
        let stages = route::merge_route(docs, output.to_path_buf());
        let final_dir = out_dir.map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let artifacts = self
            .executor()
            .execute(nominal_input, &stages, &final_dir)
            .await?;
        let message = format!(
            "Merged {} documents into {}",
            inputs.len(),
            file_name(output)
        );
        Ok((artifacts, message))
    }

    /// Read a PDF's metadata without converting anything.
    ///
    /// Unlike the conversion operations this returns a plain `Result`;
    /// there is no pipeline and nothing to clean up.
    pub async fn inspect(&self, input: impl AsRef<Path>) -> Result<DocumentMetadata, ConvertError> {
        let doc = self.accept(input.as_ref())?;
        require_pdf(&doc, "inspect")?;
        pdfpages::inspect(doc.path()).await
    }

    /// Blocking wrapper around [`Orchestrator::convert`] for hosts without
    /// an async runtime of their own.
    pub fn convert_sync(
        &self,
        input: impl AsRef<Path>,
        target: DocumentFormat,
        output_dir: Option<&Path>,
    ) -> Result<ConversionOutcome, ConvertError> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| ConvertError::Internal(format!("failed to create runtime: {e}")))?;
        Ok(runtime.block_on(self.convert(input, target, output_dir)))
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn executor(&self) -> PipelineExecutor<'_> {
        PipelineExecutor {
            config: &self.config,
            probe: self.probe,
            workspace: &self.workspace,
            progress: self.progress.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Validate and open an input document.
    fn accept(&self, path: &Path) -> Result<Document, ConvertError> {
        let doc = Document::open(path)?;
        if doc.size_bytes() > self.config.max_input_bytes {
            return Err(ConvertError::InvalidRequest(format!(
                "'{}' is {} bytes; the limit is {} MB",
                path.display(),
                doc.size_bytes(),
                self.config.max_input_bytes / (1024 * 1024)
            )));
        }
        Ok(doc)
    }

    fn resolve_output_dir(
        &self,
        input: &Path,
        output_dir: Option<&Path>,
    ) -> Result<PathBuf, ConvertError> {
        let dir = match output_dir {
            Some(d) => d.to_path_buf(),
            None => input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        };
        ensure_dir(&dir)?;
        Ok(dir)
    }

    fn finish(
        &self,
        result: Result<(Vec<Document>, String), ConvertError>,
        started: Instant,
    ) -> ConversionOutcome {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok((artifacts, message)) => {
                info!("{message} ({elapsed_ms} ms)");
                ConversionOutcome::success(artifacts, message, elapsed_ms)
            }
            Err(e) => {
                warn!("job failed after {elapsed_ms} ms: {e}");
                ConversionOutcome::failure(&e, elapsed_ms)
            }
        }
    }
}

fn require_pdf(doc: &Document, operation: &str) -> Result<(), ConvertError> {
    if doc.format() == DocumentFormat::Pdf {
        Ok(())
    } else {
        Err(ConvertError::InvalidRequest(format!(
            "{operation} requires a PDF input, got {}",
            doc.format()
        )))
    }
}

fn ensure_dir(dir: &Path) -> Result<(), ConvertError> {
    std::fs::create_dir_all(dir).map_err(|e| ConvertError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source: e,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
