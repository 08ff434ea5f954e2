//! `live` and `devices`: real-time conversion through audio devices.

use super::utils::{format_secs, print_field};
use anyhow::{bail, Context, Result};
use colored::*;
use llvc_core::audio::device::{list_devices, DeviceDirection, DeviceStream, StreamEvent};
use llvc_core::config::EngineConfig;
use llvc_core::pipeline::{ProcessorStatus, RealtimeProcessor, RealtimeReport};
use llvc_core::runtime_adapter::OnnxStreamingModel;
use std::io::BufRead;

/// Prints the devices of the default host.
pub fn list() -> Result<()> {
    let devices = list_devices().context("Failed to enumerate audio devices")?;
    if devices.is_empty() {
        println!("No audio devices found");
        return Ok(());
    }

    for direction in [DeviceDirection::Input, DeviceDirection::Output] {
        println!("{}", format!("{} devices:", direction).bold());
        for device in devices.iter().filter(|d| d.direction == direction) {
            let marker = if device.is_default {
                " (default)".green().to_string()
            } else {
                String::new()
            };
            println!("  {}{}", device.name, marker);
        }
    }
    Ok(())
}

fn print_report(report: &RealtimeReport) {
    let stats = &report.session;
    println!("{}", "Stream summary".bold());
    print_field("frames", stats.blocks);
    print_field("frame size", report.frame_size);
    print_field("deadline", format_secs(report.deadline));
    print_field("mean inference", format_secs(stats.mean_block_time()));
    print_field("slowest frame", format_secs(stats.max_block_time));
    let overruns = if stats.overruns > 0 {
        stats.overruns.to_string().yellow().to_string()
    } else {
        "0".to_string()
    };
    print_field("deadline misses", overruns);
    print_field("underrun samples", report.buffers.underrun_samples);
    print_field("dropped backlog samples", report.buffers.overflow_samples);
}

/// Streams input device to output device until Enter or a fatal error.
pub fn run_live(config: &EngineConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let model = OnnxStreamingModel::load(&config.model)
        .with_context(|| format!("Failed to load model {}", config.model.path.display()))?;
    let processor = RealtimeProcessor::new(model, config.realtime.frame_size, config.sample_rate)?;

    let stream = DeviceStream::start(processor, &config.realtime, config.sample_rate)
        .context("Failed to start audio streams")?;

    let stop_tx = stream.event_sender();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        let _ = stop_tx.send(StreamEvent::StopRequested);
    });
    println!(
        "{} Streaming ({} samples per frame). Press Enter to stop.",
        "●".red(),
        config.realtime.frame_size
    );

    let event = stream.wait();
    let mut processor = stream.stop().context("Failed to stop audio streams")?;
    let report = processor.report();
    print_report(&report);

    match event {
        StreamEvent::StopRequested => {}
        StreamEvent::DeviceError(message) => bail!("Audio device error: {}", message),
        StreamEvent::ProcessorFailed(kind) => match processor.take_error() {
            Some(e) => return Err(e).context("Realtime processing failed"),
            None => bail!("Realtime processing failed ({})", kind),
        },
    }
    if let ProcessorStatus::Failed(kind) = report.status {
        bail!("Realtime processing failed ({})", kind);
    }

    println!("{} Stopped", "✓".green());
    Ok(())
}
