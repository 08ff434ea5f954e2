//! Batch driver: a whole signal, block by block, from zero state.

use super::{BlockSink, BlockSource};
use crate::error::{LlvcError, LlvcResult};
use crate::framing::{BlockFramer, TailPolicy};
use crate::runtime_adapter::StreamingModel;
use crate::session::StreamingSession;
use crate::stats::real_time_factor;
use std::time::{Duration, Instant};

/// Where a [`BatchDriver`] is in its run.
///
/// ```text
/// Idle -> Initialized -> (Framing -> Inferring)* -> Finalized
///                                              \-> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    /// No run started yet
    Idle,
    /// State zeroed, no block framed yet
    Initialized,
    /// Taking the next block from the source
    Framing,
    /// Running a block through the model
    Inferring,
    /// All blocks processed and the sink finalized
    Finalized,
    /// The run was aborted by an error
    Failed,
}

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Inference calls made
    pub blocks: u64,
    /// Samples handed to the model, including zero padding
    pub processed_samples: u64,
    /// Samples written to the sink
    pub output_samples: u64,
    /// Wall time for the whole run, framing and output included
    pub processing_time: Duration,
    /// Wall time spent inside the model
    pub inference_time: Duration,
    /// Slowest single block
    pub max_block_time: Duration,
    pub sample_rate: u32,
}

impl BatchReport {
    /// Duration of the emitted audio.
    pub fn audio_duration(&self) -> Duration {
        Duration::from_secs_f64(self.output_samples as f64 / self.sample_rate as f64)
    }

    /// Audio seconds per wall second for the whole run.
    pub fn real_time_factor(&self) -> Option<f64> {
        real_time_factor(self.audio_duration(), self.processing_time)
    }
}

/// Runs a finite source through a session into a sink.
///
/// Every run starts from zero state. The first failing block aborts the run
/// and the error is returned as is; blocks already consumed by the sink stay
/// there, nothing is retried.
pub struct BatchDriver<M: StreamingModel> {
    session: StreamingSession<M>,
    sample_rate: u32,
    phase: DriverPhase,
}

impl<M: StreamingModel> BatchDriver<M> {
    pub fn new(model: M, sample_rate: u32) -> Self {
        Self {
            session: StreamingSession::new(model),
            sample_rate,
            phase: DriverPhase::Idle,
        }
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    /// The session of the last run, for inspecting its state and stats.
    pub fn session(&self) -> &StreamingSession<M> {
        &self.session
    }

    pub fn into_session(self) -> StreamingSession<M> {
        self.session
    }

    /// Drains `source` through the model into `sink`.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> LlvcResult<BatchReport>
    where
        S: BlockSource + ?Sized,
        K: BlockSink + ?Sized,
    {
        self.session.reset();
        self.phase = DriverPhase::Initialized;
        log::info!(
            "Batch run started ({} block(s) expected)",
            source
                .remaining_blocks()
                .map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );

        let start = Instant::now();
        let result = self.drain(source, sink);
        let processing_time = start.elapsed();

        let output_samples = match result {
            Ok(n) => n,
            Err(e) => {
                self.phase = DriverPhase::Failed;
                log::error!(
                    "Batch run aborted after {} block(s): {}",
                    self.session.blocks_processed(),
                    e
                );
                return Err(e);
            }
        };
        self.phase = DriverPhase::Finalized;

        let stats = self.session.stats();
        let report = BatchReport {
            blocks: stats.blocks,
            processed_samples: stats.samples,
            output_samples,
            processing_time,
            inference_time: stats.inference_time,
            max_block_time: stats.max_block_time,
            sample_rate: self.sample_rate,
        };
        log::info!(
            "Batch run finished: {} block(s), {:.2}s audio in {:.3}s (RTF {})",
            report.blocks,
            report.audio_duration().as_secs_f64(),
            report.processing_time.as_secs_f64(),
            report
                .real_time_factor()
                .map_or_else(|| "n/a".to_string(), |rtf| format!("{:.2}", rtf))
        );
        Ok(report)
    }

    fn drain<S, K>(&mut self, source: &mut S, sink: &mut K) -> LlvcResult<u64>
    where
        S: BlockSource + ?Sized,
        K: BlockSink + ?Sized,
    {
        let mut written = 0u64;
        loop {
            self.phase = DriverPhase::Framing;
            let Some(block) = source.produce_block() else {
                break;
            };

            self.phase = DriverPhase::Inferring;
            let output = self.session.process_block(&block.samples)?;
            let valid = &output[..block.valid_len];
            sink.consume_output_block(block.offset, valid)?;
            written += valid.len() as u64;

            log::debug!(
                "Block at {} done in {:?}",
                block.offset,
                self.session.last_block_time()
            );
        }
        sink.finalize()?;
        Ok(written)
    }

    /// Converts `signal` in blocks of `block_size`.
    ///
    /// Output has `k * block_size` samples with [`TailPolicy::Drop`] and
    /// `signal.len()` samples with [`TailPolicy::ZeroPad`].
    pub fn process_signal(
        &mut self,
        signal: &[f32],
        block_size: usize,
        tail_policy: TailPolicy,
    ) -> LlvcResult<(Vec<f32>, BatchReport)> {
        if signal.is_empty() {
            return Err(LlvcError::file_io("input signal is empty"));
        }
        let mut framer = BlockFramer::new(signal, block_size, tail_policy)?;
        if framer.dropped_len() > 0 {
            log::info!(
                "{} trailing sample(s) shorter than block size {} will be dropped",
                framer.dropped_len(),
                block_size
            );
        }
        let mut output = Vec::with_capacity(framer.output_len());
        let report = self.run(&mut framer, &mut output)?;
        Ok((output, report))
    }

    /// Converts `signal` as one block.
    ///
    /// The model is only known to behave for streaming block sizes; use this
    /// to compare against block-wise output.
    pub fn process_whole(&mut self, signal: &[f32]) -> LlvcResult<(Vec<f32>, BatchReport)> {
        let mut framer = BlockFramer::whole(signal)?;
        log::warn!(
            "Processing {} samples as a single block; the model is only validated for streaming block sizes",
            signal.len()
        );
        let mut output = Vec::with_capacity(signal.len());
        let report = self.run(&mut framer, &mut output)?;
        Ok((output, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, FailureMode, MockStreamingModel};

    #[test]
    fn test_phases() {
        let mut driver = BatchDriver::new(MockStreamingModel::new(), 16000);
        assert_eq!(driver.phase(), DriverPhase::Idle);

        driver
            .process_signal(&fixtures::noise(2048, 1), 1024, TailPolicy::Drop)
            .unwrap();
        assert_eq!(driver.phase(), DriverPhase::Finalized);
    }

    #[test]
    fn test_report() {
        let mut driver = BatchDriver::new(MockStreamingModel::new(), 16000);
        let (out, report) = driver
            .process_signal(&fixtures::noise(5000, 2), 1024, TailPolicy::Drop)
            .unwrap();

        assert_eq!(out.len(), 4096);
        assert_eq!(report.blocks, 4);
        assert_eq!(report.output_samples, 4096);
        assert_eq!(report.processed_samples, 4096);
        assert_eq!(report.audio_duration(), Duration::from_millis(256));
    }

    #[test]
    fn test_zero_pad_emits_full_length() {
        let mut driver = BatchDriver::new(MockStreamingModel::new(), 16000);
        let (out, report) = driver
            .process_signal(&fixtures::noise(1500, 3), 1024, TailPolicy::ZeroPad)
            .unwrap();

        assert_eq!(out.len(), 1500);
        assert_eq!(report.blocks, 2);
        assert_eq!(report.processed_samples, 2048);
    }

    #[test]
    fn test_abort_on_failure() {
        let model = MockStreamingModel::new().fail_on_call(2, FailureMode::Runtime);
        let mut driver = BatchDriver::new(model, 16000);
        let signal = fixtures::noise(4096, 4);

        let mut framer = BlockFramer::new(&signal, 1024, TailPolicy::Drop).unwrap();
        let mut out = Vec::new();
        let err = driver.run(&mut framer, &mut out).unwrap_err();

        assert!(matches!(err, LlvcError::InferenceRuntime(_)));
        assert_eq!(driver.phase(), DriverPhase::Failed);
        // Only the block before the failure reached the sink.
        assert_eq!(out.len(), 1024);
        assert_eq!(driver.session().model().call_count(), 2);
    }

    #[test]
    fn test_empty_signal_is_rejected() {
        let mut driver = BatchDriver::new(MockStreamingModel::new(), 16000);
        assert!(matches!(
            driver.process_signal(&[], 1024, TailPolicy::Drop),
            Err(LlvcError::FileIo(_))
        ));
        assert!(matches!(
            driver.process_whole(&[]),
            Err(LlvcError::FileIo(_))
        ));
        assert_eq!(driver.phase(), DriverPhase::Idle);
    }

    #[test]
    fn test_each_run_starts_from_zero_state() {
        let mut driver = BatchDriver::new(MockStreamingModel::new(), 16000);
        let signal = fixtures::noise(2048, 5);

        let (first, _) = driver.process_signal(&signal, 512, TailPolicy::Drop).unwrap();
        let (second, _) = driver.process_signal(&signal, 512, TailPolicy::Drop).unwrap();
        assert_eq!(first, second);
    }
}
