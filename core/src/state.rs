//! Recurrent state carried between streaming inference calls.
//!
//! The model keeps its causal context in four fixed-shape tensors. They are
//! held together in a [`ModelState`] bundle and replaced as one unit after
//! every successful forward pass, so a caller can never observe a mix of old
//! and new tensors.
//!
//! | Tensor            | Shape           | Context carried            |
//! |-------------------|-----------------|----------------------------|
//! | `enc_buf`         | `[1, 512, 510]` | encoder memory             |
//! | `dec_buf`         | `[1, 2, 13, 256]` | decoder memory           |
//! | `out_buf`         | `[1, 512, 4]`   | output-path memory         |
//! | `convnet_pre_ctx` | `[1, 1, 24]`    | convolutional pre-context  |

use crate::error::{LlvcError, LlvcResult};
use ndarray::{ArrayD, IxDyn};

/// Identifies one of the four state tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    EncBuf,
    DecBuf,
    OutBuf,
    ConvnetPreCtx,
}

impl StateKind {
    /// All state tensors, in model input order.
    pub const ALL: [StateKind; 4] = [
        StateKind::EncBuf,
        StateKind::DecBuf,
        StateKind::OutBuf,
        StateKind::ConvnetPreCtx,
    ];

    /// Model input name for this tensor.
    pub fn input_name(&self) -> &'static str {
        match self {
            StateKind::EncBuf => "enc_buf",
            StateKind::DecBuf => "dec_buf",
            StateKind::OutBuf => "out_buf",
            StateKind::ConvnetPreCtx => "convnet_pre_ctx",
        }
    }

    /// Model output name carrying the replacement for this tensor.
    pub fn output_name(&self) -> &'static str {
        match self {
            StateKind::EncBuf => "new_enc_buf",
            StateKind::DecBuf => "new_dec_buf",
            StateKind::OutBuf => "new_out_buf",
            StateKind::ConvnetPreCtx => "new_convnet_pre_ctx",
        }
    }

    /// Fixed shape of this tensor for the lifetime of a session.
    pub fn shape(&self) -> &'static [usize] {
        match self {
            StateKind::EncBuf => &[1, 512, 510],
            StateKind::DecBuf => &[1, 2, 13, 256],
            StateKind::OutBuf => &[1, 512, 4],
            StateKind::ConvnetPreCtx => &[1, 1, 24],
        }
    }

    /// Number of elements in this tensor.
    pub fn numel(&self) -> usize {
        self.shape().iter().product()
    }
}

/// The four state tensors of one streaming session, moved as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    enc_buf: ArrayD<f32>,
    dec_buf: ArrayD<f32>,
    out_buf: ArrayD<f32>,
    convnet_pre_ctx: ArrayD<f32>,
}

impl ModelState {
    /// Zero-filled state with the fixed shapes.
    pub fn zeros() -> Self {
        Self {
            enc_buf: ArrayD::zeros(IxDyn(StateKind::EncBuf.shape())),
            dec_buf: ArrayD::zeros(IxDyn(StateKind::DecBuf.shape())),
            out_buf: ArrayD::zeros(IxDyn(StateKind::OutBuf.shape())),
            convnet_pre_ctx: ArrayD::zeros(IxDyn(StateKind::ConvnetPreCtx.shape())),
        }
    }

    /// Builds a state bundle from four tensors, checking every shape.
    pub fn from_tensors(
        enc_buf: ArrayD<f32>,
        dec_buf: ArrayD<f32>,
        out_buf: ArrayD<f32>,
        convnet_pre_ctx: ArrayD<f32>,
    ) -> LlvcResult<Self> {
        let state = Self {
            enc_buf,
            dec_buf,
            out_buf,
            convnet_pre_ctx,
        };
        state.validate()?;
        Ok(state)
    }

    /// Builds a state bundle from flat buffers, as returned by an inference engine.
    ///
    /// `data` must yield the tensors in [`StateKind::ALL`] order.
    pub fn from_flat(data: [Vec<f32>; 4]) -> LlvcResult<Self> {
        let [enc, dec, out, ctx] = data;
        Ok(Self {
            enc_buf: flat_to_array(StateKind::EncBuf, enc)?,
            dec_buf: flat_to_array(StateKind::DecBuf, dec)?,
            out_buf: flat_to_array(StateKind::OutBuf, out)?,
            convnet_pre_ctx: flat_to_array(StateKind::ConvnetPreCtx, ctx)?,
        })
    }

    /// Borrows one tensor.
    pub fn get(&self, kind: StateKind) -> &ArrayD<f32> {
        match kind {
            StateKind::EncBuf => &self.enc_buf,
            StateKind::DecBuf => &self.dec_buf,
            StateKind::OutBuf => &self.out_buf,
            StateKind::ConvnetPreCtx => &self.convnet_pre_ctx,
        }
    }

    /// Mutably borrows one tensor. Crate-internal: only models write state.
    pub(crate) fn get_mut(&mut self, kind: StateKind) -> &mut ArrayD<f32> {
        match kind {
            StateKind::EncBuf => &mut self.enc_buf,
            StateKind::DecBuf => &mut self.dec_buf,
            StateKind::OutBuf => &mut self.out_buf,
            StateKind::ConvnetPreCtx => &mut self.convnet_pre_ctx,
        }
    }

    /// Checks all four shapes against the fixed contract.
    pub fn validate(&self) -> LlvcResult<()> {
        for kind in StateKind::ALL {
            let actual = self.get(kind).shape();
            if actual != kind.shape() {
                return Err(LlvcError::shape_mismatch(
                    kind.input_name(),
                    kind.shape(),
                    actual,
                ));
            }
        }
        Ok(())
    }

    /// True if every element of every tensor is exactly zero.
    pub fn is_zeroed(&self) -> bool {
        StateKind::ALL
            .iter()
            .all(|&kind| self.get(kind).iter().all(|&v| v == 0.0))
    }

    /// Largest absolute element-wise difference to `other` across all tensors.
    pub fn max_abs_diff(&self, other: &ModelState) -> f32 {
        StateKind::ALL
            .iter()
            .flat_map(|&kind| {
                self.get(kind)
                    .iter()
                    .zip(other.get(kind).iter())
                    .map(|(a, b)| (a - b).abs())
            })
            .fold(0.0, f32::max)
    }
}

fn flat_to_array(kind: StateKind, data: Vec<f32>) -> LlvcResult<ArrayD<f32>> {
    if data.len() != kind.numel() {
        return Err(LlvcError::shape_mismatch(
            kind.output_name(),
            kind.shape(),
            &[data.len()],
        ));
    }
    ArrayD::from_shape_vec(IxDyn(kind.shape()), data)
        .map_err(|e| LlvcError::inference(format!("{}: {}", kind.output_name(), e)))
}

/// Owns the committed state of one session.
///
/// The state only changes through [`StateManager::commit`], which takes a
/// whole replacement bundle by value. A failed inference never reaches
/// `commit`, so the previous state stays intact and can be retried.
#[derive(Debug)]
pub struct StateManager {
    current: ModelState,
    commits: u64,
}

impl StateManager {
    /// Allocates the zero state. Called once when a session starts.
    pub fn initialize() -> Self {
        log::trace!("Initializing zeroed streaming state");
        Self {
            current: ModelState::zeros(),
            commits: 0,
        }
    }

    /// The state to feed into the next inference call.
    pub fn current(&self) -> &ModelState {
        &self.current
    }

    /// Replaces all four tensors with `next`.
    ///
    /// A bundle with a wrong shape is rejected and the held state is kept.
    pub fn commit(&mut self, next: ModelState) -> LlvcResult<()> {
        next.validate()?;
        self.current = next;
        self.commits += 1;
        Ok(())
    }

    /// Number of successful commits since initialization or the last reset.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Returns to the zero state, as if the session had just started.
    pub fn reset(&mut self) {
        self.current = ModelState::zeros();
        self.commits = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_kind_contract() {
        assert_eq!(StateKind::EncBuf.shape(), &[1, 512, 510]);
        assert_eq!(StateKind::DecBuf.shape(), &[1, 2, 13, 256]);
        assert_eq!(StateKind::OutBuf.shape(), &[1, 512, 4]);
        assert_eq!(StateKind::ConvnetPreCtx.shape(), &[1, 1, 24]);
        assert_eq!(StateKind::ConvnetPreCtx.numel(), 24);
        assert_eq!(StateKind::EncBuf.numel(), 512 * 510);
        assert_eq!(StateKind::DecBuf.output_name(), "new_dec_buf");
    }

    #[test]
    fn test_zero_state() {
        let state = ModelState::zeros();
        assert!(state.validate().is_ok());
        assert!(state.is_zeroed());
        for kind in StateKind::ALL {
            assert_eq!(state.get(kind).shape(), kind.shape());
        }
    }

    #[test]
    fn test_from_tensors_rejects_wrong_shape() {
        let zeros = ModelState::zeros();
        let result = ModelState::from_tensors(
            zeros.get(StateKind::EncBuf).clone(),
            zeros.get(StateKind::DecBuf).clone(),
            ArrayD::zeros(IxDyn(&[1, 512, 5])),
            zeros.get(StateKind::ConvnetPreCtx).clone(),
        );
        match result {
            Err(LlvcError::ShapeMismatch { tensor, .. }) => assert_eq!(tensor, "out_buf"),
            other => panic!("expected shape mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_from_flat_rejects_wrong_length() {
        let result = ModelState::from_flat([
            vec![0.0; StateKind::EncBuf.numel()],
            vec![0.0; StateKind::DecBuf.numel()],
            vec![0.0; StateKind::OutBuf.numel()],
            vec![0.0; 23],
        ]);
        assert!(matches!(result, Err(LlvcError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_commit_replaces_whole_bundle() {
        let mut manager = StateManager::initialize();
        assert!(manager.current().is_zeroed());

        let mut next = ModelState::zeros();
        next.get_mut(StateKind::EncBuf).fill(1.0);
        next.get_mut(StateKind::ConvnetPreCtx).fill(2.0);
        manager.commit(next.clone()).unwrap();

        assert_eq!(manager.current(), &next);
        assert_eq!(manager.commits(), 1);
    }

    #[test]
    fn test_rejected_commit_keeps_previous_state() {
        let mut manager = StateManager::initialize();
        let mut good = ModelState::zeros();
        good.get_mut(StateKind::OutBuf).fill(0.5);
        manager.commit(good.clone()).unwrap();

        let mut bad = ModelState::zeros();
        *bad.get_mut(StateKind::DecBuf) = ArrayD::zeros(IxDyn(&[1, 2, 13]));
        assert!(manager.commit(bad).is_err());

        assert_eq!(manager.current(), &good);
        assert_eq!(manager.commits(), 1);
    }

    #[test]
    fn test_reset() {
        let mut manager = StateManager::initialize();
        let mut next = ModelState::zeros();
        next.get_mut(StateKind::EncBuf).fill(3.0);
        manager.commit(next).unwrap();

        manager.reset();
        assert!(manager.current().is_zeroed());
        assert_eq!(manager.commits(), 0);
    }

    #[test]
    fn test_max_abs_diff() {
        let a = ModelState::zeros();
        let mut b = ModelState::zeros();
        b.get_mut(StateKind::OutBuf)[[0, 3, 2]] = -0.25;
        assert_eq!(a.max_abs_diff(&b), 0.25);
        assert_eq!(a.max_abs_diff(&a), 0.0);
    }
}
