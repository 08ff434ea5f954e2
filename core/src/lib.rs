//! LLVC Core - stateful block inference for streaming voice conversion.
//!
//! A causal voice conversion model is run one fixed-size block at a time.
//! Between blocks the model's causal context lives in four state tensors,
//! which are threaded from each call into the next so that block-wise
//! output matches whole-signal output.
//!
//! ## Module Organization
//!
//! ### Engine
//! - [`state`] - The four state tensors and their lifecycle
//! - [`runtime_adapter`] - Model contract and the ONNX Runtime backend
//! - [`session`] - One model bound to one evolving state
//! - [`framing`] - Batch block framing and realtime re-blocking
//! - [`pipeline`] - Batch and realtime drivers
//!
//! ### Supporting
//! - [`config`] - Engine configuration (YAML)
//! - [`error`] - Error taxonomy
//! - [`stats`] - Timing and real-time factor
//! - [`audio`] - WAV files and live devices
//! - [`testing`] - Mock model and test signals

// ============================================================================
// Engine
// ============================================================================

/// Recurrent state tensors and the state manager
pub mod state;

/// Streaming model contract and backends
pub mod runtime_adapter;

/// Streaming session (model + committed state)
pub mod session;

/// Block framing and frame re-blocking
pub mod framing;

/// Batch and realtime drivers
pub mod pipeline;

// ============================================================================
// Supporting
// ============================================================================

/// Engine configuration
pub mod config;

/// Unified error types
pub mod error;

/// Per-session timing
pub mod stats;

/// WAV and device I/O
pub mod audio;

/// Mocks and fixtures for tests and benchmarks
pub mod testing;

/// Common imports
pub mod prelude;

pub use error::{ErrorKind, LlvcError, LlvcResult};
