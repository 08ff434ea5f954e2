//! Live audio through cpal.
//!
//! A [`DeviceStream`] opens one mono f32 input stream and one output stream
//! at the model rate and drives a [`RealtimeProcessor`] from the output
//! callback. The input callback only queues samples; all inference happens
//! on the output callback thread, one caller at a time.
//!
//! The processor is shared with the callback for the lifetime of the stream
//! and handed back by [`DeviceStream::stop`] once both streams are dropped.
//! The controlling thread has no access to it in between.

use crate::config::RealtimeConfig;
use crate::error::{ErrorKind, LlvcError, LlvcResult};
use crate::pipeline::RealtimeProcessor;
use crate::runtime_adapter::StreamingModel;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Direction of an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDirection {
    Input,
    Output,
}

impl std::fmt::Display for DeviceDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceDirection::Input => f.write_str("input"),
            DeviceDirection::Output => f.write_str("output"),
        }
    }
}

/// An audio device visible to the default host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub direction: DeviceDirection,
    pub is_default: bool,
}

/// Something the controlling thread should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The user asked to stop
    StopRequested,
    /// The processor failed; it now outputs silence
    ProcessorFailed(ErrorKind),
    /// The host reported a stream error
    DeviceError(String),
}

/// Lists input and output devices of the default host.
pub fn list_devices() -> LlvcResult<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_in = host.default_input_device().and_then(|d| d.name().ok());
    let default_out = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    let inputs = host
        .input_devices()
        .map_err(|e| LlvcError::audio_device(format!("Failed to list input devices: {}", e)))?;
    for device in inputs {
        if let Ok(name) = device.name() {
            devices.push(DeviceInfo {
                is_default: default_in.as_deref() == Some(name.as_str()),
                name,
                direction: DeviceDirection::Input,
            });
        }
    }

    let outputs = host
        .output_devices()
        .map_err(|e| LlvcError::audio_device(format!("Failed to list output devices: {}", e)))?;
    for device in outputs {
        if let Ok(name) = device.name() {
            devices.push(DeviceInfo {
                is_default: default_out.as_deref() == Some(name.as_str()),
                name,
                direction: DeviceDirection::Output,
            });
        }
    }
    Ok(devices)
}

fn find_device(
    host: &cpal::Host,
    direction: DeviceDirection,
    wanted: Option<&str>,
) -> LlvcResult<cpal::Device> {
    let Some(wanted) = wanted else {
        let device = match direction {
            DeviceDirection::Input => host.default_input_device(),
            DeviceDirection::Output => host.default_output_device(),
        };
        return device.ok_or_else(|| {
            LlvcError::audio_device(format!("No default {} device available", direction))
        });
    };

    let devices: Vec<cpal::Device> = match direction {
        DeviceDirection::Input => host.input_devices().map(|d| d.collect()),
        DeviceDirection::Output => host.output_devices().map(|d| d.collect()),
    }
    .map_err(|e| LlvcError::audio_device(format!("Failed to list {} devices: {}", direction, e)))?;

    let needle = wanted.to_lowercase();
    devices
        .into_iter()
        .find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .ok_or_else(|| {
            LlvcError::audio_device(format!("No {} device matching '{}'", direction, wanted))
        })
}

fn device_name(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "<unnamed>".to_string())
}

/// A running pair of device streams.
pub struct DeviceStream<M: StreamingModel + 'static> {
    input: cpal::Stream,
    output: cpal::Stream,
    processor: Arc<Mutex<RealtimeProcessor<M>>>,
    events_tx: Sender<StreamEvent>,
    events_rx: Receiver<StreamEvent>,
}

impl<M: StreamingModel + 'static> DeviceStream<M> {
    /// Opens both devices and starts streaming through `processor`.
    ///
    /// # Errors
    ///
    /// `AudioDevice` if a device can't be found, a stream can't be built at
    /// mono / `sample_rate`, or a stream fails to start.
    pub fn start(
        processor: RealtimeProcessor<M>,
        config: &RealtimeConfig,
        sample_rate: u32,
    ) -> LlvcResult<Self> {
        let host = cpal::default_host();
        let input_device =
            find_device(&host, DeviceDirection::Input, config.input_device.as_deref())?;
        let output_device =
            find_device(&host, DeviceDirection::Output, config.output_device.as_deref())?;
        log::info!(
            "Audio devices: input '{}', output '{}'",
            device_name(&input_device),
            device_name(&output_device)
        );

        let (events_tx, events_rx) = mpsc::channel();
        let processor = Arc::new(Mutex::new(processor));
        let captured: Arc<Mutex<VecDeque<f32>>> =
            Arc::new(Mutex::new(VecDeque::with_capacity(config.frame_size * 8)));

        let input = {
            let captured = Arc::clone(&captured);
            build_stream(config.frame_size, sample_rate, |stream_config| {
                let captured = Arc::clone(&captured);
                let err_tx = events_tx.clone();
                input_device.build_input_stream(
                    stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if let Ok(mut queue) = captured.lock() {
                            queue.extend(data.iter().copied());
                        }
                    },
                    move |err| report_stream_error(&err_tx, "input", err),
                    None,
                )
            })?
        };

        let output = build_stream(config.frame_size, sample_rate, |stream_config| {
            let captured = Arc::clone(&captured);
            let processor = Arc::clone(&processor);
            let fail_tx = events_tx.clone();
            let err_tx = events_tx.clone();
            let mut scratch: Vec<f32> = Vec::with_capacity(config.frame_size * 8);
            let mut reported = false;
            output_device.build_output_stream(
                stream_config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    scratch.clear();
                    if let Ok(mut queue) = captured.lock() {
                        scratch.extend(queue.drain(..));
                    }
                    let result = match processor.lock() {
                        Ok(mut processor) => processor.render(&scratch, out),
                        Err(_) => {
                            out.fill(0.0);
                            Err(ErrorKind::AudioDevice)
                        }
                    };
                    if let Err(kind) = result {
                        if !reported {
                            reported = true;
                            let _ = fail_tx.send(StreamEvent::ProcessorFailed(kind));
                        }
                    }
                },
                move |err| report_stream_error(&err_tx, "output", err),
                None,
            )
        })?;

        input
            .play()
            .map_err(|e| LlvcError::audio_device(format!("Failed to start input stream: {}", e)))?;
        output
            .play()
            .map_err(|e| LlvcError::audio_device(format!("Failed to start output stream: {}", e)))?;
        log::info!(
            "Streaming at {} Hz, {} samples per frame",
            sample_rate,
            config.frame_size
        );

        Ok(Self {
            input,
            output,
            processor,
            events_tx,
            events_rx,
        })
    }

    /// A sender the caller can use to post [`StreamEvent::StopRequested`].
    pub fn event_sender(&self) -> Sender<StreamEvent> {
        self.events_tx.clone()
    }

    /// Blocks until the next event.
    pub fn wait(&self) -> StreamEvent {
        // `self` holds a sender, so the channel can't disconnect.
        self.events_rx
            .recv()
            .unwrap_or(StreamEvent::StopRequested)
    }

    /// Stops both streams and returns the processor.
    ///
    /// Both streams are dropped before this returns, so no callback is
    /// running when the processor is handed back.
    pub fn stop(self) -> LlvcResult<RealtimeProcessor<M>> {
        let Self {
            input,
            output,
            processor,
            ..
        } = self;
        drop(input);
        drop(output);
        log::info!("Audio streams stopped");

        let processor = Arc::try_unwrap(processor)
            .map_err(|_| LlvcError::audio_device("Audio callback still holds the processor"))?;
        processor
            .into_inner()
            .map_err(|_| LlvcError::audio_device("Audio callback panicked"))
    }
}

/// Builds a stream with a fixed buffer of `frame_size`, falling back to the
/// host's default buffer size if the device refuses it.
fn build_stream<F>(frame_size: usize, sample_rate: u32, mut build: F) -> LlvcResult<cpal::Stream>
where
    F: FnMut(&cpal::StreamConfig) -> Result<cpal::Stream, cpal::BuildStreamError>,
{
    let buffer_frames = u32::try_from(frame_size).map_err(|_| {
        LlvcError::config(format!("frame size {} is too large for a device buffer", frame_size))
    })?;
    let fixed = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Fixed(buffer_frames),
    };
    build(&fixed)
        .or_else(|e| {
            log::debug!(
                "Fixed buffer of {} not accepted ({}), using host default",
                frame_size,
                e
            );
            let flexible = cpal::StreamConfig {
                buffer_size: cpal::BufferSize::Default,
                ..fixed
            };
            build(&flexible)
        })
        .map_err(|e| {
            LlvcError::audio_device(format!(
                "Failed to open mono f32 stream at {} Hz: {}",
                sample_rate, e
            ))
        })
}

fn report_stream_error(tx: &Sender<StreamEvent>, side: &str, err: cpal::StreamError) {
    log::error!("Audio {} stream error: {}", side, err);
    let _ = tx.send(StreamEvent::DeviceError(format!("{} stream: {}", side, err)));
}
