//! Realtime driver: one host audio buffer per call.
//!
//! A [`RealtimeProcessor`] is the context object an audio callback owns for
//! the lifetime of a stream. It never panics and never propagates an error
//! out of the callback. The first failure is recorded as an [`ErrorKind`],
//! the failing block's output and every later buffer are silence, and the
//! controlling thread reads the failure after stopping the stream.

use crate::error::{ErrorKind, LlvcError, LlvcResult};
use crate::framing::{AccumulatorStats, FrameAccumulator};
use crate::runtime_adapter::StreamingModel;
use crate::session::StreamingSession;
use crate::stats::SessionStats;
use std::time::Duration;

/// Health of a [`RealtimeProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorStatus {
    Running,
    /// A block failed; output is silence from then on.
    Failed(ErrorKind),
}

/// Final counters of a realtime run.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeReport {
    pub frame_size: usize,
    pub deadline: Duration,
    pub session: SessionStats,
    pub buffers: AccumulatorStats,
    pub status: ProcessorStatus,
}

/// Session plus framing state for one live stream.
pub struct RealtimeProcessor<M: StreamingModel> {
    session: StreamingSession<M>,
    accumulator: FrameAccumulator,
    frame_in: Vec<f32>,
    frame_out: Vec<f32>,
    deadline: Duration,
    status: ProcessorStatus,
    error: Option<LlvcError>,
}

impl<M: StreamingModel> RealtimeProcessor<M> {
    /// Wraps `model` for frames of `frame_size` at `sample_rate`.
    pub fn new(model: M, frame_size: usize, sample_rate: u32) -> LlvcResult<Self> {
        let accumulator = FrameAccumulator::new(frame_size)?;
        let deadline = Duration::from_secs_f64(frame_size as f64 / sample_rate as f64);
        let session = StreamingSession::new(model)
            .with_block_size(frame_size)
            .with_deadline(deadline);
        log::info!(
            "Realtime processor ready: {} samples per frame, {:?} deadline",
            frame_size,
            deadline
        );
        Ok(Self {
            session,
            accumulator,
            frame_in: vec![0.0; frame_size],
            frame_out: vec![0.0; frame_size],
            deadline,
            status: ProcessorStatus::Running,
            error: None,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.accumulator.frame_size()
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn status(&self) -> ProcessorStatus {
        self.status
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ProcessorStatus::Failed(_))
    }

    /// The full error behind a [`ProcessorStatus::Failed`], once.
    pub fn take_error(&mut self) -> Option<LlvcError> {
        self.error.take()
    }

    pub fn session(&self) -> &StreamingSession<M> {
        &self.session
    }

    /// Processes exactly one frame into `output`.
    ///
    /// `input` and `output` must both be `frame_size` long. On failure, or
    /// after an earlier failure, `output` is silence and the error kind is
    /// returned.
    pub fn process_frame(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), ErrorKind> {
        if let ProcessorStatus::Failed(kind) = self.status {
            output.fill(0.0);
            return Err(kind);
        }
        match self.session.process_into(input, output) {
            Ok(()) => {
                self.note_timing();
                Ok(())
            }
            Err(e) => {
                output.fill(0.0);
                Err(self.fail(e))
            }
        }
    }

    /// Processes a host buffer pair of any size.
    ///
    /// Input is re-blocked into whole frames, each processed frame is queued,
    /// and `output` is filled from the queue with silence for anything not
    /// yet processed. Output lags input by one frame.
    pub fn render(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), ErrorKind> {
        if let ProcessorStatus::Failed(kind) = self.status {
            output.fill(0.0);
            return Err(kind);
        }

        self.accumulator.push_input(input);
        while self.accumulator.pop_frame(&mut self.frame_in) {
            if let Err(e) = self
                .session
                .process_into(&self.frame_in, &mut self.frame_out)
            {
                output.fill(0.0);
                return Err(self.fail(e));
            }
            self.note_timing();
            self.accumulator.push_output(&self.frame_out);
        }
        self.accumulator.fill_output(output);
        Ok(())
    }

    fn note_timing(&mut self) {
        let elapsed = self.session.last_block_time();
        if elapsed > self.deadline && self.session.stats().overruns == 1 {
            log::warn!(
                "Frame took {:?}, over the {:?} deadline; audio will drop out",
                elapsed,
                self.deadline
            );
        }
    }

    fn fail(&mut self, error: LlvcError) -> ErrorKind {
        let kind = error.kind();
        log::error!("Realtime processing stopped ({}): {}", kind, error);
        self.status = ProcessorStatus::Failed(kind);
        self.error = Some(error);
        kind
    }

    /// Counters collected so far.
    pub fn report(&self) -> RealtimeReport {
        RealtimeReport {
            frame_size: self.frame_size(),
            deadline: self.deadline,
            session: self.session.stats().clone(),
            buffers: self.accumulator.stats(),
            status: self.status,
        }
    }

    /// Returns to zero state with empty buffers, clearing any failure.
    pub fn reset(&mut self) {
        self.session.reset();
        self.accumulator.reset();
        self.status = ProcessorStatus::Running;
        self.error = None;
    }

    pub fn into_session(self) -> StreamingSession<M> {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, FailureMode, MockStreamingModel};

    #[test]
    fn test_deadline_from_frame_size() {
        let processor = RealtimeProcessor::new(MockStreamingModel::new(), 512, 16000).unwrap();
        assert_eq!(processor.deadline(), Duration::from_millis(32));
    }

    #[test]
    fn test_process_frame_matches_session() {
        let signal = fixtures::noise(1024, 9);
        let mut processor = RealtimeProcessor::new(MockStreamingModel::new(), 512, 16000).unwrap();
        let mut session = StreamingSession::new(MockStreamingModel::new());

        let mut out = vec![0.0; 512];
        for frame in signal.chunks_exact(512) {
            processor.process_frame(frame, &mut out).unwrap();
            assert_eq!(out, session.process_block(frame).unwrap());
        }
        assert_eq!(processor.report().session.blocks, 2);
    }

    #[test]
    fn test_wrong_frame_size_fails_with_silence() {
        let mut processor = RealtimeProcessor::new(MockStreamingModel::new(), 512, 16000).unwrap();
        let mut out = vec![1.0; 256];

        let kind = processor.process_frame(&[0.5; 256], &mut out).unwrap_err();
        assert_eq!(kind, ErrorKind::ShapeMismatch);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(processor.session().state().is_zeroed());
    }

    #[test]
    fn test_failure_is_sticky() {
        let model = MockStreamingModel::new().fail_on_call(1, FailureMode::Runtime);
        let mut processor = RealtimeProcessor::new(model, 4, 16000).unwrap();
        let mut out = [1.0f32; 4];

        assert_eq!(
            processor.process_frame(&[0.1; 4], &mut out),
            Err(ErrorKind::InferenceRuntime)
        );
        assert_eq!(
            processor.render(&[0.1; 4], &mut out),
            Err(ErrorKind::InferenceRuntime)
        );
        assert_eq!(out, [0.0; 4]);
        assert_eq!(processor.status(), ProcessorStatus::Failed(ErrorKind::InferenceRuntime));
        assert!(matches!(
            processor.take_error(),
            Some(LlvcError::InferenceRuntime(_))
        ));
        assert_eq!(processor.session().model().call_count(), 1);

        processor.reset();
        assert_eq!(processor.status(), ProcessorStatus::Running);
    }

    #[test]
    fn test_render_reblocks_odd_buffers() {
        let signal = fixtures::noise(48, 11);
        let mut processor = RealtimeProcessor::new(MockStreamingModel::new(), 16, 16000).unwrap();

        let mut rendered = Vec::new();
        for chunk in signal.chunks(10) {
            let mut out = vec![0.0; chunk.len()];
            processor.render(chunk, &mut out).unwrap();
            rendered.extend_from_slice(&out);
        }
        // Flush whatever was processed but not yet played.
        let mut tail = vec![0.0; 16];
        processor.render(&[], &mut tail).unwrap();
        rendered.extend_from_slice(&tail);

        let mut session = StreamingSession::new(MockStreamingModel::new());
        let expected: Vec<f32> = signal
            .chunks_exact(16)
            .flat_map(|frame| session.process_block(frame).unwrap())
            .collect();

        // One frame of silence, then the converted stream without gaps.
        assert_eq!(rendered.len(), 64);
        assert!(rendered[..16].iter().all(|&s| s == 0.0));
        assert_eq!(&rendered[16..], &expected[..]);
        assert_eq!(processor.report().buffers.underrun_samples, 0);
        assert_eq!(processor.report().session.blocks, 3);
    }

    #[test]
    fn test_render_latency_stays_bounded_with_clock_drift() {
        let mut processor = RealtimeProcessor::new(MockStreamingModel::new(), 512, 16000).unwrap();
        let input = fixtures::noise(520, 3);
        let mut out = [0.0f32; 512];
        for _ in 0..2000 {
            processor.render(&input, &mut out).unwrap();
        }

        let report = processor.report();
        assert_eq!(report.buffers.samples_in, 1_040_000);
        assert_eq!(report.buffers.underrun_samples, 0);
        assert!(report.buffers.overflow_samples > 0);
        // Every released frame went through the model.
        assert_eq!(report.session.blocks, report.buffers.frames_released);
        assert_eq!(report.status, ProcessorStatus::Running);
    }

    #[test]
    fn test_overruns_are_counted() {
        let model = MockStreamingModel::new().with_latency(Duration::from_millis(5));
        // 16 samples at 16 kHz is a 1 ms deadline.
        let mut processor = RealtimeProcessor::new(model, 16, 16000).unwrap();
        let mut out = [0.0f32; 16];
        processor.process_frame(&[0.0; 16], &mut out).unwrap();
        processor.process_frame(&[0.0; 16], &mut out).unwrap();

        let report = processor.report();
        assert_eq!(report.session.overruns, 2);
        assert_eq!(report.status, ProcessorStatus::Running);
    }
}
