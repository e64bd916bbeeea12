//! Conversion of decoded PCM frames into normalized samples.

use super::loader::{PcmFrame, BYTES_PER_SAMPLE};
use crate::error::{Error, Result};

/// Full-scale divisor for signed 16-bit PCM.
pub const I16_FULL_SCALE: f64 = 32768.0;

/// Map a raw 16-bit sample into [-1.0, 1.0).
#[inline]
pub fn normalize_sample(raw: i16) -> f64 {
    raw as f64 / I16_FULL_SCALE
}

/// Append the normalized samples of one frame to `out`.
///
/// Reads `frame.sample_count` little-endian 16-bit values from the start of
/// the frame buffer. A buffer shorter than that is rejected before anything
/// is appended.
pub fn extract_frame(frame: &PcmFrame, out: &mut Vec<f64>) -> Result<()> {
    let needed = frame
        .sample_count
        .checked_mul(BYTES_PER_SAMPLE)
        .ok_or(Error::OutOfRange {
            needed: usize::MAX,
            available: frame.data.len(),
        })?;

    let bytes = frame.data.get(..needed).ok_or(Error::OutOfRange {
        needed,
        available: frame.data.len(),
    })?;

    out.reserve(frame.sample_count);
    out.extend(
        bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|b| normalize_sample(i16::from_le_bytes([b[0], b[1]]))),
    );
    Ok(())
}

/// Drain a frame sequence into one ordered sample sequence. The first error,
/// from the source or from a malformed frame, aborts extraction.
pub fn extract_samples<I>(frames: I) -> Result<Vec<f64>>
where
    I: IntoIterator<Item = Result<PcmFrame>>,
{
    let mut samples = Vec::new();
    let mut frame_count = 0usize;
    for frame in frames {
        extract_frame(&frame?, &mut samples)?;
        frame_count += 1;
    }
    log::debug!(
        "Extracted {} samples from {} frames",
        samples.len(),
        frame_count
    );
    Ok(samples)
}
