//! Unified error types for llvc-core.
//!
//! Every failure the engine can surface maps to one variant of [`LlvcError`].
//! Errors are plain values: nothing in the engine relies on unwinding, which
//! matters for the realtime path where a failure has to be recorded from
//! inside an audio callback.
//!
//! # Error Taxonomy
//!
//! ```text
//! LlvcError
//! ├── ModelLoad(String)          -- model file missing/corrupt, fatal before any session
//! ├── ShapeMismatch { .. }       -- block or state tensor does not match the model contract
//! ├── InferenceRuntime(String)   -- execution engine failure during a forward pass
//! ├── AudioDevice(String)        -- device open/start/stop failure
//! ├── FileIo(String)             -- empty/missing input signal or failed output write
//! └── Config(String)             -- invalid engine configuration
//! ```

use thiserror::Error;

/// The canonical error type for llvc-core.
#[derive(Error, Debug)]
pub enum LlvcError {
    /// Model file missing, unreadable, or not a valid streaming model
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// A block or state tensor does not have the shape the model expects
    #[error("Shape mismatch for '{tensor}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Name of the offending tensor (`input`, `enc_buf`, ...)
        tensor: String,
        /// Shape required by the model contract
        expected: Vec<usize>,
        /// Shape that was supplied or returned
        actual: Vec<usize>,
    },

    /// The inference engine failed while executing the model
    #[error("Inference runtime error: {0}")]
    InferenceRuntime(String),

    /// Audio device could not be opened, started or stopped
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// Input signal missing/empty or output could not be written
    #[error("File I/O error: {0}")]
    FileIo(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Discriminant of [`LlvcError`] without its payload.
///
/// Cheap to copy and compare, so the realtime callback can publish the kind
/// of a failure through an atomic or a channel without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ModelLoad,
    ShapeMismatch,
    InferenceRuntime,
    AudioDevice,
    FileIo,
    Config,
}

impl ErrorKind {
    /// Stable lowercase name, used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ModelLoad => "model_load",
            ErrorKind::ShapeMismatch => "shape_mismatch",
            ErrorKind::InferenceRuntime => "inference_runtime",
            ErrorKind::AudioDevice => "audio_device",
            ErrorKind::FileIo => "file_io",
            ErrorKind::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for llvc-core.
pub type LlvcResult<T> = Result<T, LlvcError>;

impl LlvcError {
    /// Returns the payload-free kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlvcError::ModelLoad(_) => ErrorKind::ModelLoad,
            LlvcError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            LlvcError::InferenceRuntime(_) => ErrorKind::InferenceRuntime,
            LlvcError::AudioDevice(_) => ErrorKind::AudioDevice,
            LlvcError::FileIo(_) => ErrorKind::FileIo,
            LlvcError::Config(_) => ErrorKind::Config,
        }
    }

    /// Create a model load error.
    pub fn model_load(msg: impl Into<String>) -> Self {
        LlvcError::ModelLoad(msg.into())
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(tensor: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        LlvcError::ShapeMismatch {
            tensor: tensor.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create an inference runtime error.
    pub fn inference(msg: impl Into<String>) -> Self {
        LlvcError::InferenceRuntime(msg.into())
    }

    /// Create an audio device error.
    pub fn audio_device(msg: impl Into<String>) -> Self {
        LlvcError::AudioDevice(msg.into())
    }

    /// Create a file I/O error.
    pub fn file_io(msg: impl Into<String>) -> Self {
        LlvcError::FileIo(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        LlvcError::Config(msg.into())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions from library errors
// ─────────────────────────────────────────────────────────────────────────────

impl From<std::io::Error> for LlvcError {
    fn from(e: std::io::Error) -> Self {
        LlvcError::FileIo(e.to_string())
    }
}

impl From<hound::Error> for LlvcError {
    fn from(e: hound::Error) -> Self {
        LlvcError::FileIo(format!("WAV codec: {}", e))
    }
}

impl From<serde_yaml::Error> for LlvcError {
    fn from(e: serde_yaml::Error) -> Self {
        LlvcError::Config(e.to_string())
    }
}
