// Microphone capture and speaker playback through cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleRate, Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::device::{DeviceInfo, ResolvedDevice};
use super::frame::{i16_to_f32, AudioParams};
use super::host::{AudioHost, AudioStream, FaultSender, OpenedPlayback};
use super::playback::{PlaybackSink, DEFAULT_PLAYBACK_BUFFER_CHUNKS};
use super::queue::{FrameAssembler, FrameSender};
use crate::error::{SessionError, SessionResult};

/// cpal-backed audio host
pub struct CpalHost {
    host: cpal::Host,
    playback_buffer_chunks: usize,
}

impl CpalHost {
    pub fn new() -> Self {
        Self::with_playback_buffer(DEFAULT_PLAYBACK_BUFFER_CHUNKS)
    }

    pub fn with_playback_buffer(playback_buffer_chunks: usize) -> Self {
        let host = cpal::default_host();
        info!("cpal host initialized: {:?}", host.id());

        Self {
            host,
            playback_buffer_chunks: playback_buffer_chunks.max(1),
        }
    }

    fn output_device(&self, device: ResolvedDevice) -> SessionResult<Device> {
        match device {
            ResolvedDevice::Default => self
                .host
                .default_output_device()
                .ok_or_else(|| SessionError::Device("no default output device".to_string())),
            ResolvedDevice::Index(index) => {
                let mut devices = self
                    .host
                    .devices()
                    .map_err(|e| SessionError::Device(e.to_string()))?;
                usize::try_from(index)
                    .ok()
                    .and_then(|i| devices.nth(i))
                    .ok_or_else(|| SessionError::Device(format!("no audio device at index {}", index)))
            }
        }
    }

    fn stream_config(params: &AudioParams, fixed_block: bool) -> StreamConfig {
        StreamConfig {
            channels: params.channels,
            sample_rate: SampleRate(params.sample_rate),
            buffer_size: if fixed_block {
                BufferSize::Fixed(params.frame_samples() as u32)
            } else {
                BufferSize::Default
            },
        }
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHost for CpalHost {
    fn name(&self) -> &str {
        "cpal"
    }

    fn output_devices(&self) -> SessionResult<Vec<DeviceInfo>> {
        let devices = self
            .host
            .devices()
            .map_err(|e| SessionError::Device(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, dev)| {
                let output_channels = dev
                    .supported_output_configs()
                    .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                    .unwrap_or(0);

                DeviceInfo {
                    index,
                    name: dev.name().unwrap_or_else(|_| "Unknown".to_string()),
                    output_channels,
                }
            })
            .collect())
    }

    fn open_playback(
        &mut self,
        params: &AudioParams,
        device: ResolvedDevice,
        faults: FaultSender,
    ) -> SessionResult<OpenedPlayback> {
        let dev = self.output_device(device)?;
        let chunks = self.playback_buffer_chunks;

        let (stream, tx) = match build_output(&dev, &Self::stream_config(params, true), chunks, faults.clone()) {
            Ok(built) => built,
            Err(e) => {
                warn!("Fixed block size rejected by output device ({}); retrying with default", e);
                build_output(&dev, &Self::stream_config(params, false), chunks, faults)
                    .map_err(|e| SessionError::Device(e.to_string()))?
            }
        };

        stream
            .play()
            .map_err(|e| SessionError::Device(e.to_string()))?;

        info!(
            "Playback stream opened on {} ({}Hz, {} channels)",
            dev.name().unwrap_or_else(|_| device.to_string()),
            params.sample_rate,
            params.channels
        );

        Ok(OpenedPlayback {
            stream: Box::new(CpalStream::new(stream, "playback")),
            sink: Arc::new(CpalPlaybackSink { tx }),
        })
    }

    fn open_capture(
        &mut self,
        params: &AudioParams,
        frames: FrameSender,
        faults: FaultSender,
    ) -> SessionResult<Box<dyn AudioStream>> {
        let dev = self
            .host
            .default_input_device()
            .ok_or_else(|| SessionError::Device("no input device available".to_string()))?;

        let stream = match build_input(&dev, &Self::stream_config(params, true), *params, frames.clone(), faults.clone()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Fixed block size rejected by input device ({}); retrying with default", e);
                build_input(&dev, &Self::stream_config(params, false), *params, frames, faults)
                    .map_err(|e| SessionError::Device(e.to_string()))?
            }
        };

        stream
            .play()
            .map_err(|e| SessionError::Device(e.to_string()))?;

        info!(
            "Capture stream opened on {} ({}Hz, {} channels, {} samples/frame)",
            dev.name().unwrap_or_else(|_| "Unknown".to_string()),
            params.sample_rate,
            params.channels,
            params.frame_samples()
        );

        Ok(Box::new(CpalStream::new(stream, "capture")))
    }
}

fn build_output(
    dev: &Device,
    config: &StreamConfig,
    buffer_chunks: usize,
    faults: FaultSender,
) -> Result<(Stream, mpsc::Sender<Vec<i16>>), cpal::BuildStreamError> {
    let (tx, mut rx) = mpsc::channel::<Vec<i16>>(buffer_chunks);
    let mut pending: VecDeque<i16> = VecDeque::new();

    let stream = dev.build_output_stream(
        config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            for out in data.iter_mut() {
                if pending.is_empty() {
                    if let Ok(chunk) = rx.try_recv() {
                        pending.extend(chunk);
                    }
                }
                // Underrun plays silence
                *out = pending.pop_front().map(i16_to_f32).unwrap_or(0.0);
            }
        },
        move |err| {
            let _ = faults.send(SessionError::Device(format!("playback stream: {}", err)));
        },
        None,
    )?;

    Ok((stream, tx))
}

fn build_input(
    dev: &Device,
    config: &StreamConfig,
    params: AudioParams,
    frames: FrameSender,
    faults: FaultSender,
) -> Result<Stream, cpal::BuildStreamError> {
    let mut assembler = FrameAssembler::new(params, frames);

    dev.build_input_stream(
        config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            assembler.push_f32(data);
        },
        move |err| {
            let _ = faults.send(SessionError::Device(format!("capture stream: {}", err)));
        },
        None,
    )
}

/// Feeds the output callback; `write` waits while the device buffer is full
struct CpalPlaybackSink {
    tx: mpsc::Sender<Vec<i16>>,
}

#[async_trait::async_trait]
impl PlaybackSink for CpalPlaybackSink {
    async fn write(&self, samples: Vec<i16>) -> SessionResult<()> {
        self.tx
            .send(samples)
            .await
            .map_err(|_| SessionError::Device("playback stream closed".to_string()))
    }
}

/// Owns a cpal stream. Dropping the inner stream releases the device.
struct CpalStream {
    stream: Option<Stream>,
    label: &'static str,
}

impl CpalStream {
    fn new(stream: Stream, label: &'static str) -> Self {
        Self {
            stream: Some(stream),
            label,
        }
    }
}

impl AudioStream for CpalStream {
    fn close(&mut self) -> SessionResult<()> {
        if let Some(stream) = self.stream.take() {
            let paused = stream.pause();
            drop(stream);
            info!("{} stream closed", self.label);
            paused.map_err(|e| SessionError::Device(e.to_string()))?;
        }
        Ok(())
    }
}
