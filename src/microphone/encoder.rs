//! MP3 file output backed by LAME.

use super::{AudioFrame, FrameSink};
use crate::error::{Error, Result};
use crate::settings::RecordingSettings;
use log::{debug, info};
use mp3lame_encoder::{Bitrate, Builder, Encoder, FlushNoGap, InterleavedPcm, MonoPcm, Quality};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// LAME needs at least this much room to flush its final frames.
const FLUSH_BUFFER_BYTES: usize = 7200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp3Params {
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate_kbps: u16,
    pub quality: u8,
}

impl Default for Mp3Params {
    fn default() -> Self {
        Self::from(&RecordingSettings::default())
    }
}

impl From<&RecordingSettings> for Mp3Params {
    fn from(settings: &RecordingSettings) -> Self {
        Self {
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            bitrate_kbps: settings.bitrate_kbps,
            quality: settings.quality,
        }
    }
}

fn bitrate(kbps: u16) -> Result<Bitrate> {
    Ok(match kbps {
        8 => Bitrate::Kbps8,
        16 => Bitrate::Kbps16,
        24 => Bitrate::Kbps24,
        32 => Bitrate::Kbps32,
        40 => Bitrate::Kbps40,
        48 => Bitrate::Kbps48,
        64 => Bitrate::Kbps64,
        80 => Bitrate::Kbps80,
        96 => Bitrate::Kbps96,
        112 => Bitrate::Kbps112,
        128 => Bitrate::Kbps128,
        160 => Bitrate::Kbps160,
        192 => Bitrate::Kbps192,
        224 => Bitrate::Kbps224,
        256 => Bitrate::Kbps256,
        320 => Bitrate::Kbps320,
        other => {
            return Err(Error::InvalidArgument(format!(
                "unsupported MP3 bitrate {} kbps",
                other
            )))
        }
    })
}

fn quality(level: u8) -> Result<Quality> {
    Ok(match level {
        0 => Quality::Best,
        1 => Quality::SecondBest,
        2 => Quality::NearBest,
        3 => Quality::VeryNice,
        4 => Quality::Nice,
        5 => Quality::Good,
        6 => Quality::Decent,
        7 => Quality::Ok,
        8 => Quality::SecondWorst,
        9 => Quality::Worst,
        other => {
            return Err(Error::InvalidArgument(format!(
                "MP3 quality must be 0..=9, got {}",
                other
            )))
        }
    })
}

fn lame_error<E: std::fmt::Debug>(stage: &str, err: E) -> Error {
    Error::Encode(format!("{}: {:?}", stage, err))
}

fn build_encoder(params: &Mp3Params) -> Result<Encoder> {
    let channels = u8::try_from(params.channels)
        .ok()
        .filter(|c| (1..=2).contains(c))
        .ok_or_else(|| {
            Error::InvalidArgument(format!("MP3 supports 1 or 2 channels, got {}", params.channels))
        })?;

    let mut builder =
        Builder::new().ok_or_else(|| Error::Encode("failed to allocate LAME encoder".to_string()))?;
    builder
        .set_num_channels(channels)
        .map_err(|e| lame_error("set channels", e))?;
    builder
        .set_sample_rate(params.sample_rate)
        .map_err(|e| lame_error("set sample rate", e))?;
    builder
        .set_brate(bitrate(params.bitrate_kbps)?)
        .map_err(|e| lame_error("set bitrate", e))?;
    builder
        .set_quality(quality(params.quality)?)
        .map_err(|e| lame_error("set quality", e))?;
    builder.build().map_err(|e| lame_error("initialize encoder", e))
}

/// Writes captured frames to an MP3 file. The file is created by
/// [`FrameSink::start`] and completed by [`FrameSink::finish`].
pub struct Mp3FileWriter {
    path: PathBuf,
    params: Mp3Params,
    encoder: Option<Encoder>,
    writer: Option<BufWriter<File>>,
    mp3_buffer: Vec<u8>,
    bytes_written: u64,
}

impl Mp3FileWriter {
    pub fn new<P: AsRef<Path>>(path: P, params: Mp3Params) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            params,
            encoder: None,
            writer: None,
            mp3_buffer: Vec::new(),
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn write_pending(&mut self) -> Result<()> {
        if self.mp3_buffer.is_empty() {
            return Ok(());
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::Encode("MP3 writer not started".to_string()))?;
        writer.write_all(&self.mp3_buffer)?;
        self.bytes_written += self.mp3_buffer.len() as u64;
        self.mp3_buffer.clear();
        Ok(())
    }
}

impl FrameSink for Mp3FileWriter {
    fn start(&mut self) -> Result<()> {
        let encoder = build_encoder(&self.params)?;
        let file = File::create(&self.path).map_err(|e| {
            Error::Encode(format!("failed to create {}: {}", self.path.display(), e))
        })?;

        self.encoder = Some(encoder);
        self.writer = Some(BufWriter::new(file));
        self.bytes_written = 0;

        info!(
            "Writing MP3: path={}, rate={} Hz, channels={}, bitrate={} kbps",
            self.path.display(),
            self.params.sample_rate,
            self.params.channels,
            self.params.bitrate_kbps
        );
        Ok(())
    }

    fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if frame.channels != self.params.channels || frame.sample_rate != self.params.sample_rate {
            return Err(Error::Encode(format!(
                "frame format {} Hz/{} ch does not match encoder {} Hz/{} ch",
                frame.sample_rate, frame.channels, self.params.sample_rate, self.params.channels
            )));
        }
        let channels = frame.channels as usize;
        if frame.samples.len() % channels != 0 {
            return Err(Error::Encode(format!(
                "frame of {} samples is not a whole number of {}-channel frames",
                frame.samples.len(),
                channels
            )));
        }

        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| Error::Encode("MP3 writer not started".to_string()))?;

        let per_channel = frame.samples.len() / channels;
        self.mp3_buffer
            .reserve(mp3lame_encoder::max_required_buffer_size(per_channel));

        let encoded = if channels == 1 {
            encoder.encode_to_vec(MonoPcm(&frame.samples), &mut self.mp3_buffer)
        } else {
            encoder.encode_to_vec(InterleavedPcm(&frame.samples), &mut self.mp3_buffer)
        }
        .map_err(|e| lame_error("encode", e))?;

        debug!("Encoded {} samples into {} bytes", frame.samples.len(), encoded);
        self.write_pending()
    }

    fn finish(&mut self) -> Result<()> {
        let mut encoder = self
            .encoder
            .take()
            .ok_or_else(|| Error::Encode("MP3 writer not started".to_string()))?;

        self.mp3_buffer.reserve(FLUSH_BUFFER_BYTES);
        encoder
            .flush_to_vec::<FlushNoGap>(&mut self.mp3_buffer)
            .map_err(|e| lame_error("flush", e))?;
        self.write_pending()?;

        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        info!(
            "Finished MP3 {} ({} bytes)",
            self.path.display(),
            self.bytes_written
        );
        Ok(())
    }

    fn abort(&mut self) {
        self.encoder = None;
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
        self.mp3_buffer.clear();
    }
}

impl Drop for Mp3FileWriter {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            debug!("MP3 writer dropped before finish, file may be truncated");
            self.abort();
        }
    }
}
