//! Block framing for batch and realtime processing.
//!
//! - [`BlockFramer`] slices a loaded signal into fixed-size blocks, lazily,
//!   in signal order. What happens to a trailing remainder shorter than the
//!   block size is decided by [`TailPolicy`].
//! - [`FrameAccumulator`] sits between an audio host and the engine in
//!   realtime mode. Hosts deliver buffers of whatever size they like; the
//!   accumulator releases exact frames on the input side and queues
//!   processed samples on the output side.

use crate::error::{LlvcError, LlvcResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::VecDeque;

/// Handling of a trailing partial block in batch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailPolicy {
    /// The remainder is neither processed nor emitted.
    #[default]
    Drop,
    /// The remainder is zero-padded to a full block, processed, and only the
    /// samples that correspond to real input are emitted.
    ZeroPad,
}

impl std::str::FromStr for TailPolicy {
    type Err = LlvcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(TailPolicy::Drop),
            "pad" | "zero_pad" => Ok(TailPolicy::ZeroPad),
            other => Err(LlvcError::config(format!(
                "Unknown tail policy '{}' (expected drop or pad)",
                other
            ))),
        }
    }
}

/// One block handed to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Block<'a> {
    /// Index of the first sample of this block within the signal
    pub offset: usize,
    /// Exactly `block_size` samples
    pub samples: Cow<'a, [f32]>,
    /// How many leading samples are real input (less than `samples.len()`
    /// only for a zero-padded tail)
    pub valid_len: usize,
}

impl Block<'_> {
    /// True if this block was zero-padded.
    pub fn is_padded(&self) -> bool {
        self.valid_len < self.samples.len()
    }
}

/// Lazy iterator of fixed-size blocks over a signal.
///
/// Blocks are `[0..L)`, `[L..2L)`, ... and stop once fewer than `L` samples
/// remain. For a signal of `N = k*L + r` samples, `Drop` yields `k` blocks
/// and `ZeroPad` yields `k + 1` when `r > 0`.
#[derive(Debug, Clone)]
pub struct BlockFramer<'a> {
    signal: &'a [f32],
    block_size: usize,
    policy: TailPolicy,
    position: usize,
    done: bool,
}

impl<'a> BlockFramer<'a> {
    /// Frames `signal` into blocks of `block_size`.
    pub fn new(signal: &'a [f32], block_size: usize, policy: TailPolicy) -> LlvcResult<Self> {
        if block_size == 0 {
            return Err(LlvcError::config("block size must be at least 1"));
        }
        Ok(Self {
            signal,
            block_size,
            policy,
            position: 0,
            done: false,
        })
    }

    /// A single block covering the whole signal.
    ///
    /// The signal must not be empty.
    pub fn whole(signal: &'a [f32]) -> LlvcResult<Self> {
        if signal.is_empty() {
            return Err(LlvcError::file_io("input signal is empty"));
        }
        Self::new(signal, signal.len(), TailPolicy::Drop)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn policy(&self) -> TailPolicy {
        self.policy
    }

    /// Number of full blocks in the signal.
    pub fn full_blocks(&self) -> usize {
        self.signal.len() / self.block_size
    }

    /// Samples left over after the last full block.
    pub fn remainder(&self) -> usize {
        self.signal.len() % self.block_size
    }

    /// Total number of blocks this framer yields.
    pub fn block_count(&self) -> usize {
        match self.policy {
            TailPolicy::ZeroPad if self.remainder() > 0 => self.full_blocks() + 1,
            _ => self.full_blocks(),
        }
    }

    /// Number of output samples a complete run emits.
    pub fn output_len(&self) -> usize {
        match self.policy {
            TailPolicy::Drop => self.full_blocks() * self.block_size,
            TailPolicy::ZeroPad => self.signal.len(),
        }
    }

    /// Number of input samples a complete run never processes.
    pub fn dropped_len(&self) -> usize {
        self.signal.len() - self.output_len()
    }
}

impl<'a> Iterator for BlockFramer<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let start = self.position;
        let end = start + self.block_size;
        if end <= self.signal.len() {
            self.position = end;
            return Some(Block {
                offset: start,
                samples: Cow::Borrowed(&self.signal[start..end]),
                valid_len: self.block_size,
            });
        }

        self.done = true;
        let remaining = &self.signal[start..];
        match self.policy {
            TailPolicy::ZeroPad if !remaining.is_empty() => {
                let mut padded = vec![0.0f32; self.block_size];
                padded[..remaining.len()].copy_from_slice(remaining);
                self.position = self.signal.len();
                Some(Block {
                    offset: start,
                    samples: Cow::Owned(padded),
                    valid_len: remaining.len(),
                })
            }
            _ => {
                if !remaining.is_empty() {
                    log::debug!(
                        "Dropping {} trailing sample(s) shorter than block size {}",
                        remaining.len(),
                        self.block_size
                    );
                }
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let consumed = self.position / self.block_size;
        let left = self.block_count().saturating_sub(consumed);
        (left, Some(left))
    }
}

impl ExactSizeIterator for BlockFramer<'_> {}

// ============================================================================
// Realtime re-blocking
// ============================================================================

/// Counters kept by a [`FrameAccumulator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatorStats {
    /// Input samples received from the host
    pub samples_in: u64,
    /// Exact frames released for processing
    pub frames_released: u64,
    /// Queued samples written back to the host, priming silence included
    pub samples_out: u64,
    /// Output samples filled with silence because nothing was ready
    pub underrun_samples: u64,
    /// Queued output samples discarded because the backlog exceeded its cap
    pub overflow_samples: u64,
}

/// Re-blocks host audio buffers into exact frames and back.
///
/// Input samples are released strictly in arrival order as frames of
/// `frame_size`; nothing is skipped or reordered. Processed frames go into an
/// output queue that the host drains at its own buffer size.
///
/// The output queue starts with one frame of silence. With equal input and
/// output buffer sizes that is enough to never run dry while processing keeps
/// up, at a fixed latency of one frame.
///
/// Input and output devices run on separate clocks, so the output queue can
/// drift upwards. Whatever is left after serving a host buffer is capped at
/// [`MAX_BACKLOG_FRAMES`] frames; the oldest samples beyond that are dropped.
/// The input side is never trimmed.
#[derive(Debug)]
pub struct FrameAccumulator {
    frame_size: usize,
    pending: VecDeque<f32>,
    ready: VecDeque<f32>,
    stats: AccumulatorStats,
}

/// Output backlog cap, in frames, kept after each host buffer is filled.
pub const MAX_BACKLOG_FRAMES: usize = 2;

impl FrameAccumulator {
    pub fn new(frame_size: usize) -> LlvcResult<Self> {
        if frame_size == 0 {
            return Err(LlvcError::config("frame size must be at least 1"));
        }
        let mut accumulator = Self {
            frame_size,
            pending: VecDeque::with_capacity(frame_size * 4),
            ready: VecDeque::with_capacity(frame_size * 4),
            stats: AccumulatorStats::default(),
        };
        accumulator.prime();
        Ok(accumulator)
    }

    fn prime(&mut self) {
        self.ready.extend(std::iter::repeat(0.0).take(self.frame_size));
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Appends samples delivered by the input device.
    pub fn push_input(&mut self, samples: &[f32]) {
        self.pending.extend(samples.iter().copied());
        self.stats.samples_in += samples.len() as u64;
    }

    /// Input samples not yet released as a frame.
    pub fn pending_input(&self) -> usize {
        self.pending.len()
    }

    /// Moves the next full frame into `frame`.
    ///
    /// Returns `false` and leaves `frame` untouched if less than one frame is
    /// pending. `frame` must be exactly `frame_size` long.
    pub fn pop_frame(&mut self, frame: &mut [f32]) -> bool {
        if self.pending.len() < self.frame_size || frame.len() != self.frame_size {
            return false;
        }
        for (dst, src) in frame.iter_mut().zip(self.pending.drain(..self.frame_size)) {
            *dst = src;
        }
        self.stats.frames_released += 1;
        true
    }

    /// Queues a processed frame for output.
    pub fn push_output(&mut self, samples: &[f32]) {
        self.ready.extend(samples.iter().copied());
    }

    /// Processed samples waiting to be played.
    pub fn ready_output(&self) -> usize {
        self.ready.len()
    }

    /// Upper bound on [`ready_output`](Self::ready_output) between host buffers.
    pub fn max_backlog(&self) -> usize {
        self.frame_size * MAX_BACKLOG_FRAMES
    }

    /// Fills a host output buffer, padding with silence on underrun.
    ///
    /// Returns the number of samples taken from the queue.
    pub fn fill_output(&mut self, out: &mut [f32]) -> usize {
        let available = self.ready.len().min(out.len());
        for (dst, src) in out.iter_mut().zip(self.ready.drain(..available)) {
            *dst = src;
        }
        out[available..].fill(0.0);

        self.stats.samples_out += available as u64;
        self.stats.underrun_samples += (out.len() - available) as u64;
        self.trim_backlog();
        available
    }

    fn trim_backlog(&mut self) {
        let excess = self.ready.len().saturating_sub(self.max_backlog());
        if excess == 0 {
            return;
        }
        if self.stats.overflow_samples == 0 {
            log::warn!(
                "Output backlog exceeded {} samples; dropping the oldest to hold latency",
                self.max_backlog()
            );
        }
        self.ready.drain(..excess);
        self.stats.overflow_samples += excess as u64;
    }

    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }

    /// Discards all queued samples and counters.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.ready.clear();
        self.stats = AccumulatorStats::default();
        self.prime();
    }
}
