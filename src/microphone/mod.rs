//! Microphone recording
//!
//! Records the default (or a named) input device for a fixed wall-clock
//! duration into an MP3 file.
//!
//! # Architecture
//!
//! Capture and encoding sit behind two small traits so the recorder loop
//! does not depend on a particular audio host or codec:
//!
//! - [`CaptureSource`] produces live audio frames. [`CpalCaptureSource`]
//!   implements it over the cpal host picked by [`CaptureBackend`].
//! - [`FrameSink`] consumes them. [`Mp3FileWriter`] encodes with LAME.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use wavesmooth::microphone::record_from_microphone;
//! use wavesmooth::settings::RecordingSettings;
//!
//! let summary = record_from_microphone(
//!     "take.mp3",
//!     Duration::from_secs(5),
//!     &RecordingSettings::default(),
//! )?;
//! println!("wrote {} samples", summary.samples_written);
//! # Ok::<(), wavesmooth::Error>(())
//! ```

mod backend;
mod cpal_source;
mod encoder;
mod recorder;

pub use backend::CaptureBackend;
pub use cpal_source::{list_input_devices, CpalCaptureSource, InputDeviceInfo};
pub use encoder::{Mp3FileWriter, Mp3Params};
pub use recorder::{MicrophoneRecorder, RecorderState, RecordingSummary};

use crate::error::Result;
use crate::settings::RecordingSettings;
use std::path::Path;
use std::time::Duration;

/// Interleaved 16-bit PCM captured from an input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

/// Something that produces live audio frames.
pub trait CaptureSource {
    /// Open the device and begin capturing.
    fn start(&mut self) -> Result<()>;

    /// Block until a frame is available or the source's poll interval
    /// passes. `Ok(None)` means nothing arrived in time.
    fn grab(&mut self) -> Result<Option<AudioFrame>>;

    /// Stop delivering new audio and return frames captured but not yet
    /// grabbed.
    fn drain(&mut self) -> Vec<AudioFrame> {
        Vec::new()
    }

    /// Stop capturing and release the device. Safe to call repeatedly.
    fn stop(&mut self);
}

/// Something that consumes captured frames, typically an encoder writing a
/// file.
pub trait FrameSink {
    fn start(&mut self) -> Result<()>;

    fn write_frame(&mut self, frame: &AudioFrame) -> Result<()>;

    /// Flush and close the output.
    fn finish(&mut self) -> Result<()>;

    /// Release resources without finalizing, after an error.
    fn abort(&mut self) {}
}

/// Record the configured input device into an MP3 file at `output`.
pub fn record_from_microphone<P: AsRef<Path>>(
    output: P,
    duration: Duration,
    settings: &RecordingSettings,
) -> Result<RecordingSummary> {
    settings.validate()?;

    let source = CpalCaptureSource::new(settings);
    let sink = Mp3FileWriter::new(output.as_ref(), Mp3Params::from(settings));
    let mut recorder = MicrophoneRecorder::new(source, sink);
    recorder.record(duration)
}
