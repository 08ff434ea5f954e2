//! `blocks` and `full`: WAV file in, converted WAV file out.

use super::utils::{format_rtf, format_secs, print_field};
use anyhow::{Context, Result};
use colored::*;
use llvc_core::audio::wav::{read_wav, write_wav};
use llvc_core::config::EngineConfig;
use llvc_core::framing::{BlockFramer, TailPolicy};
use llvc_core::pipeline::{BatchDriver, BatchReport, WavSink};
use llvc_core::runtime_adapter::OnnxStreamingModel;
use std::path::Path;

fn load_driver(config: &EngineConfig) -> Result<BatchDriver<OnnxStreamingModel>> {
    config.validate().context("Invalid configuration")?;
    let model = OnnxStreamingModel::load(&config.model)
        .with_context(|| format!("Failed to load model {}", config.model.path.display()))?;
    Ok(BatchDriver::new(model, config.sample_rate))
}

fn print_report(mode: &str, input_len: usize, report: &BatchReport, output: &Path) {
    println!("{} {}", "✓".green(), format!("{} conversion complete", mode).bold());
    print_field("input samples", input_len);
    print_field("output samples", report.output_samples);
    print_field("blocks", report.blocks);
    print_field("audio", format_secs(report.audio_duration()));
    print_field("processing", format_secs(report.processing_time));
    print_field("inference", format_secs(report.inference_time));
    print_field("slowest block", format_secs(report.max_block_time));
    print_field("real-time factor", format_rtf(report.real_time_factor()));
    print_field("written to", output.display());
}

/// Converts `input` block by block, streaming blocks straight into `output`.
///
/// On a failing block the run aborts; blocks before it stay in the file.
pub fn run_blocks(config: &EngineConfig, input: &Path, output: &Path) -> Result<()> {
    let mut driver = load_driver(config)?;
    let signal = read_wav(input, config.sample_rate)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let block_size = config.batch.block_size;
    let mut framer = BlockFramer::new(&signal, block_size, config.batch.tail_policy)?;
    if config.batch.tail_policy == TailPolicy::Drop && framer.dropped_len() > 0 {
        println!(
            "{} last {} sample(s) are shorter than a block and will be dropped",
            "!".yellow(),
            framer.dropped_len()
        );
    }

    let mut sink = WavSink::create(output, config.sample_rate)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let report = driver
        .run(&mut framer, &mut sink)
        .with_context(|| format!("Conversion of {} failed", input.display()))?;

    print_report(
        &format!("Block ({} samples)", block_size),
        signal.len(),
        &report,
        output,
    );
    Ok(())
}

/// Converts `input` as a single block and writes the result to `output`.
pub fn run_full(config: &EngineConfig, input: &Path, output: &Path) -> Result<()> {
    let mut driver = load_driver(config)?;
    let signal = read_wav(input, config.sample_rate)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let (converted, report) = driver
        .process_whole(&signal)
        .with_context(|| format!("Conversion of {} failed", input.display()))?;
    write_wav(output, &converted, config.sample_rate)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    print_report("Whole-signal", signal.len(), &report, output);
    Ok(())
}
