//! WAV file input and output.
//!
//! Signals are mono f32 at a fixed rate. Integer PCM input is scaled to
//! `[-1.0, 1.0)`; output is always written as 32-bit float.

use crate::error::{LlvcError, LlvcResult};
use std::io::{Read, Seek, Write};
use std::path::Path;

/// Reads a mono WAV file recorded at `sample_rate`.
///
/// # Errors
///
/// `FileIo` if the file is missing or undecodable, is not mono, has another
/// sample rate, or holds no samples. The engine must not start on an empty
/// signal.
pub fn read_wav(path: impl AsRef<Path>, sample_rate: u32) -> LlvcResult<Vec<f32>> {
    let path = path.as_ref();
    let reader = hound::WavReader::open(path).map_err(|e| {
        LlvcError::file_io(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let samples = decode(reader, sample_rate)
        .map_err(|e| LlvcError::file_io(format!("{}: {}", path.display(), e)))?;
    log::debug!("Read {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Decodes WAV data from any reader. See [`read_wav`].
pub fn decode_wav<R: Read>(reader: R, sample_rate: u32) -> LlvcResult<Vec<f32>> {
    decode(hound::WavReader::new(reader)?, sample_rate)
}

fn decode<R: Read>(mut reader: hound::WavReader<R>, sample_rate: u32) -> LlvcResult<Vec<f32>> {
    let spec = reader.spec();
    if spec.channels != 1 {
        return Err(LlvcError::file_io(format!(
            "expected mono audio, got {} channels",
            spec.channels
        )));
    }
    if spec.sample_rate != sample_rate {
        return Err(LlvcError::file_io(format!(
            "expected {} Hz audio, got {} Hz",
            sample_rate, spec.sample_rate
        )));
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max_value = match 1i64.checked_shl(u32::from(bits).saturating_sub(1)) {
                Some(val) if bits <= 32 => val as f32,
                _ => {
                    return Err(LlvcError::file_io(format!(
                        "unsupported bits_per_sample: {}",
                        bits
                    )))
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_value))
                .collect::<Result<_, _>>()?
        }
    };

    if samples.is_empty() {
        return Err(LlvcError::file_io("input signal is empty"));
    }
    Ok(samples)
}

pub(crate) fn float_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    }
}

/// Writes `samples` as a mono 32-bit float WAV file.
pub fn write_wav(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> LlvcResult<()> {
    let path = path.as_ref();
    let writer = hound::WavWriter::create(path, float_spec(sample_rate)).map_err(|e| {
        LlvcError::file_io(format!("Failed to create {}: {}", path.display(), e))
    })?;
    encode(writer, samples)
        .map_err(|e| LlvcError::file_io(format!("Failed to write {}: {}", path.display(), e)))?;
    log::debug!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}

/// Encodes `samples` into any seekable writer. See [`write_wav`].
pub fn encode_wav<W: Write + Seek>(writer: W, samples: &[f32], sample_rate: u32) -> LlvcResult<()> {
    encode(hound::WavWriter::new(writer, float_spec(sample_rate))?, samples)
}

fn encode<W: Write + Seek>(mut writer: hound::WavWriter<W>, samples: &[f32]) -> LlvcResult<()> {
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
