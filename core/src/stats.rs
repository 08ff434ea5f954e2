//! Per-session timing counters.

use std::time::Duration;

/// Timing of the inference calls made by one session.
///
/// When a per-block deadline is set (realtime mode), blocks that take longer
/// are counted as overruns. Nothing reacts to an overrun; the count is only
/// reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Successful inference calls
    pub blocks: u64,
    /// Samples produced by successful calls
    pub samples: u64,
    /// Failed inference calls
    pub failures: u64,
    /// Sum of inference wall time
    pub inference_time: Duration,
    /// Slowest single call
    pub max_block_time: Duration,
    /// Per-block deadline, if any
    pub deadline: Option<Duration>,
    /// Calls that exceeded `deadline`
    pub overruns: u64,
}

impl SessionStats {
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline: Some(deadline),
            ..Default::default()
        }
    }

    /// Records a successful call. Returns `true` if it missed the deadline.
    pub fn record_block(&mut self, samples: usize, elapsed: Duration) -> bool {
        self.blocks += 1;
        self.samples += samples as u64;
        self.inference_time += elapsed;
        self.max_block_time = self.max_block_time.max(elapsed);

        let overrun = self.deadline.is_some_and(|d| elapsed > d);
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Mean inference time per block.
    pub fn mean_block_time(&self) -> Duration {
        if self.blocks == 0 {
            return Duration::ZERO;
        }
        let nanos = self.inference_time.as_nanos() / u128::from(self.blocks);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Audio duration covered by the processed samples.
    pub fn audio_duration(&self, sample_rate: u32) -> Duration {
        Duration::from_secs_f64(self.samples as f64 / sample_rate as f64)
    }

    /// Real-time factor over inference time only: audio seconds per wall second.
    ///
    /// Values above 1 are faster than real time. `None` before any timed call.
    pub fn real_time_factor(&self, sample_rate: u32) -> Option<f64> {
        real_time_factor(self.audio_duration(sample_rate), self.inference_time)
    }
}

/// Audio seconds processed per wall-clock second.
pub fn real_time_factor(audio: Duration, wall: Duration) -> Option<f64> {
    let wall = wall.as_secs_f64();
    (wall > 0.0).then(|| audio.as_secs_f64() / wall)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_mean() {
        let mut stats = SessionStats::default();
        stats.record_block(1024, Duration::from_millis(10));
        stats.record_block(1024, Duration::from_millis(30));

        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.samples, 2048);
        assert_eq!(stats.mean_block_time(), Duration::from_millis(20));
        assert_eq!(stats.max_block_time, Duration::from_millis(30));
        assert_eq!(stats.overruns, 0);
    }

    #[test]
    fn test_mean_with_huge_block_count() {
        let stats = SessionStats {
            blocks: 1 << 32,
            inference_time: Duration::from_secs(1 << 32),
            ..SessionStats::default()
        };
        assert_eq!(stats.mean_block_time(), Duration::from_secs(1));
    }

    #[test]
    fn test_deadline_overruns() {
        let mut stats = SessionStats::with_deadline(Duration::from_millis(32));
        assert!(!stats.record_block(512, Duration::from_millis(31)));
        assert!(stats.record_block(512, Duration::from_millis(40)));
        assert_eq!(stats.overruns, 1);
    }

    #[test]
    fn test_real_time_factor() {
        let mut stats = SessionStats::default();
        assert_eq!(stats.real_time_factor(16000), None);

        // 1 s of audio in 250 ms
        stats.record_block(16000, Duration::from_millis(250));
        let rtf = stats.real_time_factor(16000).unwrap();
        assert!((rtf - 4.0).abs() < 1e-9);
        assert_eq!(stats.audio_duration(16000), Duration::from_secs(1));
    }
}
