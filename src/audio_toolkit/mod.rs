//! Decode pipeline: container → PCM frames → normalized samples → moving
//! average → report.

pub mod audio;
mod report;

pub use audio::{extract_samples, moving_average, MediaReader, PcmFrame};
pub use report::SmoothingReport;

use crate::error::Result;
use crate::settings::Settings;
use std::path::Path;

/// Normalized samples from the first channel of the first audio stream in
/// a file.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// Decode the first audio stream of `path` into normalized samples.
///
/// Nothing is returned unless the whole stream decodes; a failure anywhere
/// discards the samples collected so far.
pub fn load_samples<P: AsRef<Path>>(path: P, skip_decode_errors: bool) -> Result<DecodedAudio> {
    let reader = MediaReader::open(path.as_ref())?;
    let stream = reader.select_audio_stream()?;
    let frames = reader.into_frames(stream, skip_decode_errors)?;
    let samples = extract_samples(frames)?;

    log::info!(
        "Decoded {} samples from {}",
        samples.len(),
        path.as_ref().display()
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: stream.sample_rate,
        channels: stream.channels,
    })
}

/// Decode `path` and smooth it with a moving average of `window` samples.
pub fn smooth_file<P: AsRef<Path>>(
    path: P,
    window: usize,
    settings: &Settings,
) -> Result<SmoothingReport> {
    let decoded = load_samples(path, settings.skip_decode_errors)?;
    let smoothed = moving_average(&decoded.samples, window)?;

    log::info!(
        "Smoothed {} samples into {} with window {}",
        decoded.samples.len(),
        smoothed.len(),
        window
    );

    Ok(SmoothingReport {
        original_samples: decoded.samples.len(),
        processed_samples: smoothed.len(),
        window,
        sample_rate: decoded.sample_rate,
        channels: decoded.channels,
    })
}
