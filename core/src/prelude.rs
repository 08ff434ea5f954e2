//! Prelude module for convenient imports.
//!
//! ```rust
//! use llvc_core::prelude::*;
//!
//! let mut driver = BatchDriver::new(MockStreamingModel::new(), MODEL_SAMPLE_RATE);
//! let (out, report) = driver.process_signal(&vec![0.0; 2048], 1024, TailPolicy::Drop)?;
//! assert_eq!(out.len(), 2048);
//! assert_eq!(report.blocks, 2);
//! # Ok::<(), LlvcError>(())
//! ```

pub use crate::config::{
    BatchConfig, EngineConfig, ModelConfig, OptimizationLevel, RealtimeConfig, MODEL_SAMPLE_RATE,
};
pub use crate::error::{ErrorKind, LlvcError, LlvcResult};
pub use crate::framing::{BlockFramer, FrameAccumulator, TailPolicy};
pub use crate::pipeline::{
    BatchDriver, BatchReport, BlockSink, BlockSource, RealtimeProcessor, WavSink,
};
pub use crate::runtime_adapter::{InferenceOutput, StreamingModel};
pub use crate::session::StreamingSession;
pub use crate::state::{ModelState, StateKind, StateManager};
pub use crate::testing::MockStreamingModel;

#[cfg(feature = "onnx")]
pub use crate::runtime_adapter::OnnxStreamingModel;

#[cfg(feature = "device")]
pub use crate::audio::device::DeviceStream;
