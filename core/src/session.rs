//! Streaming session: one loaded model bound to one evolving state.
//!
//! A [`StreamingSession`] is the only way the engine calls a model. Each
//! [`process_block`](StreamingSession::process_block) call feeds the block
//! and the committed state to the model, and on success commits the returned
//! state as a whole. On failure nothing is committed, so the session can be
//! retried with another block, reset, or dropped.
//!
//! Calls must arrive in signal order from a single owner. `process_block`
//! takes `&mut self`, so the borrow checker enforces the single owner; signal
//! order is the caller's responsibility.

use crate::error::{LlvcError, LlvcResult};
use crate::runtime_adapter::{check_outputs, StreamingModel, INPUT_NAME};
use crate::state::{ModelState, StateManager};
use crate::stats::SessionStats;
use std::time::{Duration, Instant};

/// A model plus its committed state.
pub struct StreamingSession<M: StreamingModel> {
    model: M,
    state: StateManager,
    block_size: Option<usize>,
    stats: SessionStats,
    last_block_time: Duration,
}

impl<M: StreamingModel> StreamingSession<M> {
    /// Starts a session with zeroed state.
    pub fn new(model: M) -> Self {
        log::info!("Starting streaming session on '{}' model", model.name());
        Self {
            model,
            state: StateManager::initialize(),
            block_size: None,
            stats: SessionStats::default(),
            last_block_time: Duration::ZERO,
        }
    }

    /// Requires every block to be exactly `block_size` samples.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Counts blocks whose inference takes longer than `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.stats.deadline = Some(deadline);
        self
    }

    /// Runs one block through the model and commits the new state.
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the block is empty, has the wrong fixed size, or
    ///   the model returns tensors of the wrong shape
    /// - `InferenceRuntime` if the model fails
    ///
    /// The committed state is unchanged on any error.
    pub fn process_block(&mut self, block: &[f32]) -> LlvcResult<Vec<f32>> {
        if let Some(expected) = self.block_size {
            if block.len() != expected {
                self.stats.record_failure();
                return Err(LlvcError::shape_mismatch(
                    INPUT_NAME,
                    &[1, 1, expected],
                    &[1, 1, block.len()],
                ));
            }
        }

        let start = Instant::now();
        let result = self
            .model
            .infer(block, self.state.current())
            .and_then(|output| check_outputs(block.len(), &output).map(|_| output));
        let elapsed = start.elapsed();

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                self.stats.record_failure();
                log::debug!("Block {} failed: {}", self.stats.blocks, e);
                return Err(e);
            }
        };

        self.state.commit(output.state)?;
        self.last_block_time = elapsed;
        self.stats.record_block(block.len(), elapsed);
        log::trace!(
            "Block {} ({} samples) took {:?}",
            self.stats.blocks,
            block.len(),
            elapsed
        );

        Ok(output.block)
    }

    /// Like [`process_block`](Self::process_block), writing into `output`.
    ///
    /// `output` must be as long as `input`; it is left untouched on error.
    pub fn process_into(&mut self, input: &[f32], output: &mut [f32]) -> LlvcResult<()> {
        if output.len() != input.len() {
            return Err(LlvcError::shape_mismatch(
                "output",
                &[1, 1, input.len()],
                &[1, 1, output.len()],
            ));
        }
        let converted = self.process_block(input)?;
        output.copy_from_slice(&converted);
        Ok(())
    }

    /// The committed state that the next block will start from.
    pub fn state(&self) -> &ModelState {
        self.state.current()
    }

    /// Number of blocks committed since the session started or was reset.
    pub fn blocks_processed(&self) -> u64 {
        self.state.commits()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Inference time of the most recent successful block.
    pub fn last_block_time(&self) -> Duration {
        self.last_block_time
    }

    pub fn block_size(&self) -> Option<usize> {
        self.block_size
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Re-zeroes the state and clears the counters, keeping the loaded model.
    ///
    /// Equivalent to dropping the session and starting a new one on the same model.
    pub fn reset(&mut self) {
        log::debug!(
            "Resetting streaming session after {} block(s)",
            self.state.commits()
        );
        self.state.reset();
        self.stats = SessionStats {
            deadline: self.stats.deadline,
            ..Default::default()
        };
        self.last_block_time = Duration::ZERO;
    }

    /// Ends the session and hands the model back.
    pub fn into_model(self) -> M {
        self.model
    }
}

impl<M: StreamingModel> std::fmt::Debug for StreamingSession<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingSession")
            .field("model", &self.model.name())
            .field("block_size", &self.block_size)
            .field("blocks", &self.state.commits())
            .finish()
    }
}
