//! Engine configuration.
//!
//! All file paths, block sizes and device choices are injected through an
//! [`EngineConfig`]; nothing in the engine is hard-coded to a location. The
//! configuration can be built in code, or loaded from YAML:
//!
//! ```yaml
//! model:
//!   path: models/llvc_model.onnx
//!   intra_threads: 1
//!   optimization_level: extended
//!
//! batch:
//!   block_size: 1024
//!   tail_policy: drop
//!
//! realtime:
//!   frame_size: 512
//!   input_device: "MacBook Pro Microphone"
//! ```
//!
//! Every field is optional in YAML; missing fields take their defaults.

use crate::error::{LlvcError, LlvcResult};
use crate::framing::TailPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sample rate the model was trained at. The engine runs at this rate only.
pub const MODEL_SAMPLE_RATE: u32 = 16_000;

// ============================================================================
// Model Configuration
// ============================================================================

/// Graph optimization level applied when the model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    /// No graph optimizations
    Disable,
    /// Constant folding and redundant node elimination
    Basic,
    /// Basic plus node fusions
    #[default]
    Extended,
    /// Everything, including layout optimizations
    All,
}

/// How to load the streaming model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the ONNX model file
    #[serde(default)]
    pub path: PathBuf,

    /// Intra-op threads for the inference engine. Default: 1
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// Graph optimization level. Default: extended
    #[serde(default)]
    pub optimization_level: OptimizationLevel,
}

fn default_intra_threads() -> usize {
    1
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            intra_threads: default_intra_threads(),
            optimization_level: OptimizationLevel::default(),
        }
    }
}

impl ModelConfig {
    /// Create a config for the model at `path` with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Batch / Realtime Configuration
// ============================================================================

/// Settings for offline (file to file) processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Samples per inference call. Default: 1024
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// What happens to a trailing partial block. Default: drop
    #[serde(default)]
    pub tail_policy: TailPolicy,
}

fn default_block_size() -> usize {
    1024
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            tail_policy: TailPolicy::default(),
        }
    }
}

/// Settings for live audio device processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Samples per device callback and per inference call. Default: 512
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,

    /// Input device name (substring match). `None` selects the default device.
    #[serde(default)]
    pub input_device: Option<String>,

    /// Output device name (substring match). `None` selects the default device.
    #[serde(default)]
    pub output_device: Option<String>,
}

fn default_frame_size() -> usize {
    512
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            input_device: None,
            output_device: None,
        }
    }
}

impl RealtimeConfig {
    /// Wall-clock budget for one frame, in seconds.
    pub fn frame_deadline_secs(&self, sample_rate: u32) -> f64 {
        self.frame_size as f64 / sample_rate as f64
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Complete configuration for one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub model: ModelConfig,

    /// Audio sample rate in Hz. Must equal [`MODEL_SAMPLE_RATE`].
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,
}

fn default_sample_rate() -> u32 {
    MODEL_SAMPLE_RATE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            sample_rate: default_sample_rate(),
            batch: BatchConfig::default(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> LlvcResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> LlvcResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            LlvcError::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&yaml)
    }

    /// Checks that the configuration is usable before any resource is opened.
    pub fn validate(&self) -> LlvcResult<()> {
        if self.model.path.as_os_str().is_empty() {
            return Err(LlvcError::config("model.path is not set"));
        }
        if self.model.intra_threads == 0 {
            return Err(LlvcError::config("model.intra_threads must be at least 1"));
        }
        if self.sample_rate != MODEL_SAMPLE_RATE {
            return Err(LlvcError::config(format!(
                "sample_rate {} is not supported, the model runs at {} Hz",
                self.sample_rate, MODEL_SAMPLE_RATE
            )));
        }
        if self.batch.block_size == 0 {
            return Err(LlvcError::config("batch.block_size must be at least 1"));
        }
        if self.realtime.frame_size == 0 {
            return Err(LlvcError::config("realtime.frame_size must be at least 1"));
        }
        if u32::try_from(self.realtime.frame_size).is_err() {
            return Err(LlvcError::config(format!(
                "realtime.frame_size {} exceeds the largest device buffer ({})",
                self.realtime.frame_size,
                u32::MAX
            )));
        }
        Ok(())
    }
}
