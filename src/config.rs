//! Configuration for the conversion orchestrator.
//!
//! Every knob lives in one [`OrchestratorConfig`] built via its builder.
//! Keeping the knobs together makes configs trivial to share, log, and diff
//! between two runs; the builder lets callers set only what they care about
//! and rely on documented defaults for the rest.

use crate::error::ConvertError;
use crate::probe::BackendProbe;
use serde::{Deserialize, Serialize};

/// Orchestrator-wide settings.
///
/// Built via [`OrchestratorConfig::builder()`] or
/// [`OrchestratorConfig::default()`].
///
/// # Example
/// ```rust
/// use zepdf::OrchestratorConfig;
///
/// let config = OrchestratorConfig::builder()
///     .dpi(200)
///     .process_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Rasterisation DPI hint for PDF → image stages. Range: 72–600. Default: 150.
    ///
    /// 150 DPI keeps page images sharp for screen use while staying well
    /// under typical memory limits. Raise to 300 for print-quality output.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4000.
    ///
    /// A safety cap independent of DPI: a 300-DPI render of an A0 poster
    /// would otherwise allocate a five-digit-pixel bitmap per edge. Either
    /// dimension is capped, the other scales proportionally.
    pub max_render_pixels: u32,

    /// Wall-clock timeout for one external process invocation, in seconds.
    /// Default: 300.
    ///
    /// Office-suite conversions of large spreadsheets routinely take tens of
    /// seconds; five minutes covers pathological documents without hanging
    /// a job forever on a wedged soffice instance.
    pub process_timeout_secs: u64,

    /// Maximum accepted input size in bytes. Default: 200 MB.
    ///
    /// Oversized inputs are rejected at validation time, before any backend
    /// is touched.
    pub max_input_bytes: u64,

    /// Fixed probe results instead of detecting at construction.
    ///
    /// Tests inject `BackendProbe::assume(..)` here; production callers
    /// leave it `None` and get one real detection per orchestrator.
    #[serde(skip)]
    pub probe_override: Option<BackendProbe>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_render_pixels: 4000,
            process_timeout_secs: 300,
            max_input_bytes: 200 * 1024 * 1024,
            probe_override: None,
        }
    }
}

impl OrchestratorConfig {
    /// Create a new builder.
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`OrchestratorConfig`].
#[derive(Debug)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_render_pixels(mut self, px: u32) -> Self {
        self.config.max_render_pixels = px.max(100);
        self
    }

    pub fn process_timeout_secs(mut self, secs: u64) -> Self {
        self.config.process_timeout_secs = secs.max(1);
        self
    }

    pub fn max_input_bytes(mut self, bytes: u64) -> Self {
        self.config.max_input_bytes = bytes;
        self
    }

    pub fn probe(mut self, probe: BackendProbe) -> Self {
        self.config.probe_override = Some(probe);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OrchestratorConfig, ConvertError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ConvertError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.max_input_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "max_input_bytes must be non-zero".into(),
            ));
        }
        Ok(self.config)
    }
}
