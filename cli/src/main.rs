//! LLVC CLI - run the streaming voice conversion engine on files or live audio.
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`commands`] | Command handlers organized by subcommand |
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `blocks` | Convert a WAV file block by block |
//! | `full` | Convert a WAV file as a single block |
//! | `live` | Convert microphone input to speaker output in real time |
//! | `devices` | List audio devices |
//!
//! Configuration is layered: built-in defaults, then the `--config` YAML
//! file, then command-line flags and `LLVC_*` environment variables.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use llvc_core::config::{EngineConfig, OptimizationLevel};
use llvc_core::framing::TailPolicy;
use std::path::PathBuf;

/// LLVC CLI - Streaming voice conversion
#[derive(Parser)]
#[command(name = "llvc")]
#[command(about = "LLVC CLI - Run a causal voice conversion model on files or live audio", long_about = None)]
struct Cli {
    /// Engine configuration file (YAML)
    #[arg(long, global = true, env = "LLVC_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the ONNX model (overrides model.path)
    #[arg(long, global = true, env = "LLVC_MODEL", value_name = "PATH")]
    model: Option<PathBuf>,

    /// Intra-op threads for inference (overrides model.intra_threads)
    #[arg(long, global = true, value_name = "N")]
    threads: Option<usize>,

    /// Graph optimization level: disable, basic, extended, all
    #[arg(long, global = true, value_name = "LEVEL", value_parser = parse_optimization_level)]
    optimization: Option<OptimizationLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a WAV file block by block with state carried across blocks
    Blocks {
        /// Input WAV file (mono, 16 kHz)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output WAV file (mono, 16 kHz, 32-bit float)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Samples per block (overrides batch.block_size)
        #[arg(short, long, value_name = "N")]
        block_size: Option<usize>,

        /// Trailing partial block: drop or pad (overrides batch.tail_policy)
        #[arg(long, value_name = "POLICY")]
        tail: Option<TailPolicy>,
    },
    /// Convert a WAV file as one block covering the whole signal
    Full {
        /// Input WAV file (mono, 16 kHz)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output WAV file (mono, 16 kHz, 32-bit float)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
    /// Convert live input to live output until Enter is pressed
    Live {
        /// Samples per frame (overrides realtime.frame_size)
        #[arg(short, long, value_name = "N")]
        frame_size: Option<usize>,

        /// Input device name, substring match (overrides realtime.input_device)
        #[arg(long, value_name = "NAME")]
        input_device: Option<String>,

        /// Output device name, substring match (overrides realtime.output_device)
        #[arg(long, value_name = "NAME")]
        output_device: Option<String>,
    },
    /// List audio input and output devices
    Devices,
}

fn parse_optimization_level(s: &str) -> Result<OptimizationLevel, String> {
    match s {
        "disable" => Ok(OptimizationLevel::Disable),
        "basic" => Ok(OptimizationLevel::Basic),
        "extended" => Ok(OptimizationLevel::Extended),
        "all" => Ok(OptimizationLevel::All),
        other => Err(format!(
            "unknown optimization level '{}' (expected disable, basic, extended or all)",
            other
        )),
    }
}

/// Defaults, then the config file, then global flags.
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(model) = &cli.model {
        config.model.path = model.clone();
    }
    if let Some(threads) = cli.threads {
        config.model.intra_threads = threads;
    }
    if let Some(level) = cli.optimization {
        config.model.optimization_level = level;
    }
    Ok(config)
}

fn run_command(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Blocks {
            input,
            output,
            block_size,
            tail,
        } => {
            if let Some(block_size) = block_size {
                config.batch.block_size = block_size;
            }
            if let Some(tail) = tail {
                config.batch.tail_policy = tail;
            }
            commands::convert::run_blocks(&config, &input, &output)
        }
        Commands::Full { input, output } => commands::convert::run_full(&config, &input, &output),
        Commands::Live {
            frame_size,
            input_device,
            output_device,
        } => {
            if let Some(frame_size) = frame_size {
                config.realtime.frame_size = frame_size;
            }
            if input_device.is_some() {
                config.realtime.input_device = input_device;
            }
            if output_device.is_some() {
                config.realtime.output_device = output_device;
            }
            commands::live::run_live(&config)
        }
        Commands::Devices => commands::live::list(),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = run_command(cli);
    if let Err(e) = &result {
        log::error!("{:#}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "llvc",
            "--model",
            "m.onnx",
            "--threads",
            "2",
            "blocks",
            "in.wav",
            "out.wav",
            "--tail",
            "pad",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.model.path, PathBuf::from("m.onnx"));
        assert_eq!(config.model.intra_threads, 2);
        match cli.command {
            Commands::Blocks { tail, block_size, .. } => {
                assert_eq!(tail, Some(TailPolicy::ZeroPad));
                assert_eq!(block_size, None);
            }
            _ => panic!("expected blocks"),
        }
    }

    #[test]
    fn test_bad_optimization_level() {
        assert!(parse_optimization_level("max").is_err());
        assert_eq!(
            parse_optimization_level("basic").unwrap(),
            OptimizationLevel::Basic
        );
    }
}
