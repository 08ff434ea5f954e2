//! Pipeline drivers - compose framing, session and output.
//!
//! Both drivers run the same [`StreamingSession`](crate::session::StreamingSession);
//! they differ only in where blocks come from and where output goes.
//!
//! - [`BatchDriver`] pulls blocks from a [`BlockSource`] and hands results to a
//!   [`BlockSink`] until the source is exhausted or a block fails.
//! - [`RealtimeProcessor`] is driven by an audio host, one buffer per
//!   callback, and never returns an error by unwinding.

mod batch;
mod realtime;

pub use batch::{BatchDriver, BatchReport, DriverPhase};
pub use realtime::{ProcessorStatus, RealtimeProcessor, RealtimeReport};

use crate::error::{LlvcError, LlvcResult};
use crate::framing::{Block, BlockFramer};

/// Something that yields blocks in signal order.
pub trait BlockSource {
    /// The next block, or `None` when the source is exhausted.
    fn produce_block(&mut self) -> Option<Block<'_>>;

    /// Number of blocks left, if known.
    fn remaining_blocks(&self) -> Option<usize> {
        None
    }
}

/// Something that receives converted blocks in signal order.
pub trait BlockSink {
    /// Accepts the converted samples of the block that started at `offset`.
    ///
    /// `samples` holds only the valid part of the block, so it is shorter
    /// than the block for a zero-padded tail.
    fn consume_output_block(&mut self, offset: usize, samples: &[f32]) -> LlvcResult<()>;

    /// Called once after the last block.
    fn finalize(&mut self) -> LlvcResult<()> {
        Ok(())
    }
}

impl BlockSource for BlockFramer<'_> {
    fn produce_block(&mut self) -> Option<Block<'_>> {
        self.next()
    }

    fn remaining_blocks(&self) -> Option<usize> {
        Some(self.len())
    }
}

/// Writes each block at its input offset, so the output lines up with the input.
impl BlockSink for Vec<f32> {
    fn consume_output_block(&mut self, offset: usize, samples: &[f32]) -> LlvcResult<()> {
        let end = offset + samples.len();
        if self.len() < end {
            self.resize(end, 0.0);
        }
        self[offset..end].copy_from_slice(samples);
        Ok(())
    }
}

/// Streams converted blocks into a WAV writer, which must receive blocks in order.
pub struct WavSink<W: std::io::Write + std::io::Seek> {
    writer: Option<hound::WavWriter<W>>,
    written: usize,
}

impl WavSink<std::io::BufWriter<std::fs::File>> {
    /// Creates a mono 32-bit float WAV file at `path`.
    pub fn create(path: impl AsRef<std::path::Path>, sample_rate: u32) -> LlvcResult<Self> {
        let path = path.as_ref();
        let writer = hound::WavWriter::create(path, crate::audio::wav::float_spec(sample_rate))
            .map_err(|e| {
                LlvcError::file_io(format!("Failed to create {}: {}", path.display(), e))
            })?;
        Ok(Self {
            writer: Some(writer),
            written: 0,
        })
    }
}

impl<W: std::io::Write + std::io::Seek> WavSink<W> {
    /// Samples written so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl<W: std::io::Write + std::io::Seek> BlockSink for WavSink<W> {
    fn consume_output_block(&mut self, offset: usize, samples: &[f32]) -> LlvcResult<()> {
        if offset != self.written {
            return Err(LlvcError::file_io(format!(
                "out-of-order block at offset {} (expected {})",
                offset, self.written
            )));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LlvcError::file_io("WAV sink already finalized"))?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        self.written += samples.len();
        Ok(())
    }

    fn finalize(&mut self) -> LlvcResult<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}
