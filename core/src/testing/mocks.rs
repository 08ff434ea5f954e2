//! Mock streaming model for testing.
//!
//! [`MockStreamingModel`] behaves like a real causal streaming model without
//! needing a model file. It is a small recursive filter:
//!
//! ```text
//! y[n] = sum_{k=0}^{23} h[k] * x[n-k] + FEEDBACK * y[n-1]
//! ```
//!
//! All history lives in the four state tensors, nothing in the mock itself:
//!
//! - `convnet_pre_ctx` holds the last 24 input samples
//! - `out_buf[0, 0, 3]` holds the last output sample
//! - `dec_buf[0, 0, 0, 0]` counts processed samples
//! - `enc_buf[0, 0, 0]` accumulates input energy
//!
//! Every sample is computed with the same operations in the same order no
//! matter how the signal is split, so block-wise output is bit-identical to
//! whole-signal output.

use crate::error::{LlvcError, LlvcResult};
use crate::runtime_adapter::{check_inputs, InferenceOutput, StreamingModel};
use crate::state::{ModelState, StateKind};
use ndarray::{ArrayD, IxDyn};
use std::time::Duration;

const CONTEXT: usize = 24;
const FEEDBACK: f32 = 0.5;

/// Fault injected by [`MockStreamingModel::fail_on_call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Return `InferenceRuntime`
    Runtime,
    /// Return an output block one sample short
    BadOutputLength,
    /// Return a `dec_buf` with a dimension missing
    BadStateShape,
}

/// Deterministic causal model carrying its context in [`ModelState`].
#[derive(Debug, Clone)]
pub struct MockStreamingModel {
    taps: [f32; CONTEXT],
    call_count: usize,
    failure: Option<(usize, FailureMode)>,
    latency: Duration,
}

impl Default for MockStreamingModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStreamingModel {
    pub fn new() -> Self {
        let mut taps = [0.0f32; CONTEXT];
        for (k, tap) in taps.iter_mut().enumerate() {
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            *tap = sign * 0.4 * 0.8f32.powi(k as i32);
        }
        Self {
            taps,
            call_count: 0,
            failure: None,
            latency: Duration::ZERO,
        }
    }

    /// Fails the `call`-th invocation (1-based) with `mode`. Other calls succeed.
    pub fn fail_on_call(mut self, call: usize, mode: FailureMode) -> Self {
        self.failure = Some((call, mode));
        self
    }

    /// Sleeps for `latency` on every call, to exercise deadline accounting.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of times `infer` was called, including failed calls.
    pub fn call_count(&self) -> usize {
        self.call_count
    }

    fn injected_failure(&self) -> Option<FailureMode> {
        match self.failure {
            Some((call, mode)) if call == self.call_count => Some(mode),
            _ => None,
        }
    }
}

impl StreamingModel for MockStreamingModel {
    fn name(&self) -> &str {
        "mock"
    }

    fn infer(&mut self, block: &[f32], state: &ModelState) -> LlvcResult<InferenceOutput> {
        self.call_count += 1;
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        check_inputs(block, state)?;

        let failure = self.injected_failure();
        if failure == Some(FailureMode::Runtime) {
            return Err(LlvcError::inference(format!(
                "injected failure on call {}",
                self.call_count
            )));
        }

        let ctx = state.get(StateKind::ConvnetPreCtx);
        let mut history: Vec<f32> = ctx.iter().copied().collect();
        history.extend_from_slice(block);

        let mut prev = state.get(StateKind::OutBuf)[[0, 0, 3]];
        let mut energy = state.get(StateKind::EncBuf)[[0, 0, 0]];
        let mut output = Vec::with_capacity(block.len());
        for n in 0..block.len() {
            let newest = CONTEXT + n;
            let mut acc = 0.0f32;
            for (k, tap) in self.taps.iter().enumerate() {
                acc += tap * history[newest - k];
            }
            let y = acc + FEEDBACK * prev;
            energy += block[n] * block[n];
            output.push(y);
            prev = y;
        }

        let mut next = state.clone();
        next.get_mut(StateKind::ConvnetPreCtx)
            .iter_mut()
            .zip(&history[history.len() - CONTEXT..])
            .for_each(|(dst, &src)| *dst = src);
        next.get_mut(StateKind::OutBuf)[[0, 0, 3]] = prev;
        next.get_mut(StateKind::EncBuf)[[0, 0, 0]] = energy;
        next.get_mut(StateKind::DecBuf)[[0, 0, 0, 0]] += block.len() as f32;

        match failure {
            Some(FailureMode::BadOutputLength) => {
                output.pop();
            }
            Some(FailureMode::BadStateShape) => {
                *next.get_mut(StateKind::DecBuf) = ArrayD::zeros(IxDyn(&[1, 2, 13]));
            }
            _ => {}
        }

        Ok(InferenceOutput {
            block: output,
            state: next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impulse_response_is_causal() {
        let mut model = MockStreamingModel::new();
        let mut impulse = vec![0.0f32; 8];
        impulse[3] = 1.0;

        let out = model.infer(&impulse, &ModelState::zeros()).unwrap();
        assert!(out.block[..3].iter().all(|&s| s == 0.0));
        assert!(out.block[3] != 0.0);
    }

    #[test]
    fn test_state_carries_context() {
        let mut model = MockStreamingModel::new();
        let first = model.infer(&[1.0; 4], &ModelState::zeros()).unwrap();
        assert_eq!(first.state.get(StateKind::DecBuf)[[0, 0, 0, 0]], 4.0);
        assert_eq!(first.state.get(StateKind::ConvnetPreCtx)[[0, 0, 23]], 1.0);

        // Same input, different state: different output.
        let from_zero = model.infer(&[0.0; 4], &ModelState::zeros()).unwrap();
        let from_first = model.infer(&[0.0; 4], &first.state).unwrap();
        assert_ne!(from_zero.block, from_first.block);
    }

    #[test]
    fn test_injected_failures() {
        let mut model = MockStreamingModel::new().fail_on_call(2, FailureMode::BadOutputLength);
        assert_eq!(model.infer(&[0.0; 8], &ModelState::zeros()).unwrap().block.len(), 8);
        assert_eq!(model.infer(&[0.0; 8], &ModelState::zeros()).unwrap().block.len(), 7);
        assert_eq!(model.call_count(), 2);

        let mut model = MockStreamingModel::new().fail_on_call(1, FailureMode::Runtime);
        assert!(matches!(
            model.infer(&[0.0; 8], &ModelState::zeros()),
            Err(LlvcError::InferenceRuntime(_))
        ));
    }
}
