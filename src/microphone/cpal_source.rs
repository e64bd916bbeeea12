//! Live microphone capture over cpal.
//!
//! The cpal stream delivers audio on its own callback thread. Each callback
//! becomes one [`AudioFrame`] sent over a channel; [`CaptureSource::grab`]
//! blocks on that channel for at most the poll interval, so the recorder
//! loop stays synchronous.

use super::{AudioFrame, CaptureBackend, CaptureSource};
use crate::error::{Error, Result};
use crate::settings::RecordingSettings;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, Stream, StreamConfig, SupportedStreamConfigRange};
use log::{debug, info, warn};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

enum CaptureMessage {
    Frame(Vec<i16>),
    Failed(String),
}

/// Information about an available audio input device
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub sample_rates: Vec<(u32, u32)>,
    pub max_channels: u16,
}

pub struct CpalCaptureSource {
    backend: CaptureBackend,
    device_name: Option<String>,
    sample_rate: u32,
    channels: u16,
    poll_interval: Duration,
    stream: Option<Stream>,
    frames_rx: Option<Receiver<CaptureMessage>>,
}

impl CpalCaptureSource {
    pub fn new(settings: &RecordingSettings) -> Self {
        Self {
            backend: settings.capture_backend,
            device_name: settings.device.clone(),
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            stream: None,
            frames_rx: None,
        }
    }

    fn find_device(&self, host: &Host) -> Result<Device> {
        match self.device_name {
            Some(ref wanted) => {
                let devices = host
                    .input_devices()
                    .map_err(|e| Error::Capture(format!("failed to list input devices: {}", e)))?;
                for device in devices {
                    if let Ok(name) = device.name() {
                        if name == *wanted || name.contains(wanted.as_str()) {
                            return Ok(device);
                        }
                    }
                }
                Err(Error::Capture(format!("input device '{}' not found", wanted)))
            }
            None => host
                .default_input_device()
                .ok_or_else(|| Error::Capture("no default input device found".to_string())),
        }
    }

    /// Pick a device configuration at the requested rate, preferring the
    /// requested channel count. Rate conversion is not done here.
    fn select_config(&self, device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let ranges: Vec<SupportedStreamConfigRange> = device
            .supported_input_configs()
            .map_err(|e| Error::Capture(format!("failed to query device configs: {}", e)))?
            .filter(|range| {
                range.min_sample_rate().0 <= self.sample_rate
                    && self.sample_rate <= range.max_sample_rate().0
            })
            .collect();

        let best = ranges
            .iter()
            .find(|r| r.channels() == self.channels)
            .or_else(|| ranges.iter().max_by_key(|r| r.channels()))
            .cloned()
            .ok_or_else(|| {
                Error::Capture(format!(
                    "device does not support capturing at {} Hz",
                    self.sample_rate
                ))
            })?;

        if best.channels() != self.channels {
            warn!(
                "Device captures {} channels, adapting to {}",
                best.channels(),
                self.channels
            );
        }

        let supported = best.with_sample_rate(cpal::SampleRate(self.sample_rate));
        let sample_format = supported.sample_format();
        Ok((supported.into(), sample_format))
    }

    fn build_stream<T>(
        &self,
        device: &Device,
        config: &StreamConfig,
        frames_tx: Sender<CaptureMessage>,
    ) -> Result<Stream>
    where
        T: cpal::Sample + cpal::SizedSample,
        i16: cpal::FromSample<T>,
    {
        let device_channels = config.channels as usize;
        let target_channels = self.channels as usize;
        let error_tx = frames_tx.clone();

        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    let samples = remap_channels(data, device_channels, target_channels);
                    // receiver gone means the recorder is shutting down
                    let _ = frames_tx.send(CaptureMessage::Frame(samples));
                },
                move |err| {
                    log::error!("Audio input stream error: {}", err);
                    let _ = error_tx.send(CaptureMessage::Failed(err.to_string()));
                },
                None,
            )
            .map_err(|e| Error::Capture(format!("failed to build input stream: {}", e)))
    }
}

/// Convert interleaved device samples to 16-bit with `target` channels.
/// Mono is duplicated across outputs; surplus device channels are dropped.
fn remap_channels<T>(data: &[T], device_channels: usize, target: usize) -> Vec<i16>
where
    T: cpal::Sample,
    i16: cpal::FromSample<T>,
{
    if device_channels == target || device_channels == 0 {
        return data.iter().map(|&s| s.to_sample::<i16>()).collect();
    }

    let mut out = Vec::with_capacity(data.len() / device_channels * target);
    for frame in data.chunks_exact(device_channels) {
        for ch in 0..target {
            let source = ch.min(device_channels - 1);
            out.push(frame[source].to_sample::<i16>());
        }
    }
    out
}

impl CaptureSource for CpalCaptureSource {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            warn!("Capture already started");
            return Ok(());
        }

        let host = self.backend.host()?;
        let device = self.find_device(&host)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let (config, sample_format) = self.select_config(&device)?;

        info!(
            "Starting capture: backend={}, device={}, rate={} Hz, device_channels={}, format={:?}",
            self.backend, device_name, config.sample_rate.0, config.channels, sample_format
        );

        let (frames_tx, frames_rx) = channel::<CaptureMessage>();
        let stream = match sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(&device, &config, frames_tx)?,
            SampleFormat::I16 => self.build_stream::<i16>(&device, &config, frames_tx)?,
            SampleFormat::U16 => self.build_stream::<u16>(&device, &config, frames_tx)?,
            SampleFormat::I32 => self.build_stream::<i32>(&device, &config, frames_tx)?,
            other => {
                return Err(Error::Capture(format!(
                    "unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::Capture(format!("failed to start input stream: {}", e)))?;

        self.stream = Some(stream);
        self.frames_rx = Some(frames_rx);
        Ok(())
    }

    fn grab(&mut self) -> Result<Option<AudioFrame>> {
        let rx = self
            .frames_rx
            .as_ref()
            .ok_or_else(|| Error::Capture("capture not started".to_string()))?;

        match rx.recv_timeout(self.poll_interval) {
            Ok(CaptureMessage::Frame(samples)) => Ok(Some(AudioFrame {
                samples,
                channels: self.channels,
                sample_rate: self.sample_rate,
            })),
            Ok(CaptureMessage::Failed(msg)) => Err(Error::Capture(msg)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Capture("input stream closed".to_string()))
            }
        }
    }

    fn drain(&mut self) -> Vec<AudioFrame> {
        if let Some(stream) = self.stream.as_ref() {
            if let Err(e) = stream.pause() {
                debug!("Pausing input stream failed: {}", e);
            }
        }
        let Some(rx) = self.frames_rx.as_ref() else {
            return Vec::new();
        };

        let mut frames = Vec::new();
        while let Ok(message) = rx.try_recv() {
            match message {
                CaptureMessage::Frame(samples) => frames.push(AudioFrame {
                    samples,
                    channels: self.channels,
                    sample_rate: self.sample_rate,
                }),
                CaptureMessage::Failed(msg) => warn!("Input stream error while draining: {}", msg),
            }
        }
        debug!("Drained {} queued frames", frames.len());
        frames
    }

    fn stop(&mut self) {
        // Dropping the stream stops it
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Pausing input stream failed: {}", e);
            }
            info!("Capture stopped");
        }
        self.frames_rx = None;
    }
}

impl Drop for CpalCaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// List input devices for a capture backend.
pub fn list_input_devices(backend: CaptureBackend) -> Result<Vec<InputDeviceInfo>> {
    let host = backend.host()?;
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let devices = host
        .input_devices()
        .map_err(|e| Error::Capture(format!("failed to list input devices: {}", e)))?;

    let mut infos = Vec::new();
    for device in devices {
        let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
        let (sample_rates, max_channels) = match device.supported_input_configs() {
            Ok(configs) => {
                let configs: Vec<_> = configs.collect();
                let rates = configs
                    .iter()
                    .map(|c| (c.min_sample_rate().0, c.max_sample_rate().0))
                    .collect();
                let channels = configs.iter().map(|c| c.channels()).max().unwrap_or(0);
                (rates, channels)
            }
            Err(e) => {
                debug!("Could not query configs for {}: {}", name, e);
                (Vec::new(), 0)
            }
        };

        infos.push(InputDeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            sample_rates,
            max_channels,
        });
    }

    Ok(infos)
}
