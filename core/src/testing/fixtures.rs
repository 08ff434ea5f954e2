//! Test signals.
//!
//! All generators are deterministic so tests can compare outputs exactly.

use crate::config::MODEL_SAMPLE_RATE;

/// Silence at the model rate.
pub fn silence(num_samples: usize) -> Vec<f32> {
    vec![0.0f32; num_samples]
}

/// Silence of the given duration at the model rate.
pub fn sample_audio_16khz(duration_secs: f32) -> Vec<f32> {
    silence((MODEL_SAMPLE_RATE as f32 * duration_secs) as usize)
}

/// Generate a sine wave.
///
/// # Arguments
/// * `sample_rate` - Sample rate in Hz
/// * `frequency` - Frequency in Hz
/// * `duration_secs` - Duration in seconds
pub fn sine_wave(sample_rate: u32, frequency: f32, duration_secs: f32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.5 * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Pseudo-random samples in `[-0.5, 0.5)` from a fixed seed.
pub fn noise(num_samples: usize, seed: u64) -> Vec<f32> {
    let mut x = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..num_samples)
        .map(|_| {
            x = x
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((x >> 40) as f32 / (1u64 << 24) as f32) - 0.5
        })
        .collect()
}
