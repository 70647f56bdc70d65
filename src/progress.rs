//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an `Arc<dyn StageProgressCallback>` via
//! [`crate::orchestrator::Orchestrator::set_progress_callback`] to receive
//! events as the pipeline runs each stage. Events fire in non-decreasing
//! stage order; there is no concurrent stage execution, so no interleaving.
//!
//! Callbacks keep the library ignorant of how the host communicates:
//! forward them to a progress bar, a status line, a channel — the pipeline
//! does not care.

use std::sync::Arc;

/// Called by the pipeline executor as it runs each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `Send + Sync` because the pipeline runs on a
/// worker task, not the caller's thread.
pub trait StageProgressCallback: Send + Sync {
    /// Called once before the first stage, with the resolved stage count.
    fn on_job_start(&self, total_stages: usize) {
        let _ = total_stages;
    }

    /// Called just before a stage begins. `label` names the stage's
    /// capability (e.g. "office convert to pdf").
    fn on_stage_start(&self, stage_index: usize, total_stages: usize, label: &str) {
        let _ = (stage_index, total_stages, label);
    }

    /// Called when a stage completes successfully.
    fn on_stage_complete(&self, stage_index: usize, total_stages: usize) {
        let _ = (stage_index, total_stages);
    }

    /// Called when a stage fails after its fallbacks are exhausted.
    fn on_stage_error(&self, stage_index: usize, total_stages: usize, error: &str) {
        let _ = (stage_index, total_stages, error);
    }

    /// Called once after the pipeline finishes, successfully or not.
    fn on_job_complete(&self, success: bool) {
        let _ = success;
    }
}

/// No-op implementation used when no callback is configured.
pub struct NoopProgressCallback;

impl StageProgressCallback for NoopProgressCallback {}

/// Convenience alias for the stored callback type.
pub type ProgressCallback = Arc<dyn StageProgressCallback>;
