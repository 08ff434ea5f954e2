//! Runtime Adapter module - interface to the streaming voice conversion model.
//!
//! A [`StreamingModel`] runs one forward pass of a fixed, pretrained causal
//! model: it takes one block of samples plus the four state tensors and
//! returns an output block of the same length plus four replacement state
//! tensors.
//!
//! # Module Organization
//!
//! - `onnx` - ONNX Runtime backend (feature `onnx`)
//!
//! # Model Contract
//!
//! | Direction | Name                  | Shape             |
//! |-----------|-----------------------|-------------------|
//! | input     | `input`               | `[1, 1, L]`       |
//! | input     | `enc_buf`             | `[1, 512, 510]`   |
//! | input     | `dec_buf`             | `[1, 2, 13, 256]` |
//! | input     | `out_buf`             | `[1, 512, 4]`     |
//! | input     | `convnet_pre_ctx`     | `[1, 1, 24]`      |
//! | output    | `output`              | `[1, 1, L]`       |
//! | output    | `new_enc_buf`         | as `enc_buf`      |
//! | output    | `new_dec_buf`         | as `dec_buf`      |
//! | output    | `new_out_buf`         | as `out_buf`      |
//! | output    | `new_convnet_pre_ctx` | as `convnet_pre_ctx` |
//!
//! # Example
//!
//! ```rust,no_run
//! use llvc_core::config::ModelConfig;
//! use llvc_core::runtime_adapter::{OnnxStreamingModel, StreamingModel};
//! use llvc_core::state::ModelState;
//!
//! let mut model = OnnxStreamingModel::load(&ModelConfig::new("llvc_model.onnx"))?;
//! let out = model.infer(&vec![0.0; 1024], &ModelState::zeros())?;
//! assert_eq!(out.block.len(), 1024);
//! # Ok::<(), llvc_core::LlvcError>(())
//! ```

use crate::error::{LlvcError, LlvcResult};
use crate::state::ModelState;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxStreamingModel;

/// Name of the audio input tensor.
pub const INPUT_NAME: &str = "input";

/// Name of the audio output tensor.
pub const OUTPUT_NAME: &str = "output";

/// Result of one forward pass.
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    /// Converted samples, same length as the input block
    pub block: Vec<f32>,
    /// Replacement state for the next call
    pub state: ModelState,
}

/// One forward pass of a causal streaming model.
///
/// For fixed weights, `infer` must be a deterministic function of `block`
/// and `state`: no hidden state may survive between calls. This is what
/// makes block-wise processing equivalent to processing the whole signal.
///
/// `infer` takes `&mut self` because inference engines need exclusive access
/// to their session while running. It must not mutate anything that affects
/// later results.
///
/// Failure is all-or-nothing: on `Err` no partial output or state is
/// returned, and the caller's state is untouched because it is only borrowed.
pub trait StreamingModel: Send {
    /// Short identifier used in logs (e.g. "onnx").
    fn name(&self) -> &str;

    /// Runs the model on `block` starting from `state`.
    fn infer(&mut self, block: &[f32], state: &ModelState) -> LlvcResult<InferenceOutput>;
}

impl<M: StreamingModel + ?Sized> StreamingModel for Box<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn infer(&mut self, block: &[f32], state: &ModelState) -> LlvcResult<InferenceOutput> {
        (**self).infer(block, state)
    }
}

/// Checks the inputs of a forward pass against the model contract.
pub fn check_inputs(block: &[f32], state: &ModelState) -> LlvcResult<()> {
    if block.is_empty() {
        return Err(LlvcError::shape_mismatch(INPUT_NAME, &[1, 1, 1], &[1, 1, 0]));
    }
    state.validate()
}

/// Checks the outputs of a forward pass: length preserved, state shapes fixed.
pub fn check_outputs(input_len: usize, output: &InferenceOutput) -> LlvcResult<()> {
    if output.block.len() != input_len {
        return Err(LlvcError::shape_mismatch(
            OUTPUT_NAME,
            &[1, 1, input_len],
            &[1, 1, output.block.len()],
        ));
    }
    output.state.validate()
}
