// Re-export all decode components
mod extractor;
mod loader;
mod smoothing;

pub use extractor::{extract_frame, extract_samples, normalize_sample, I16_FULL_SCALE};
pub use loader::{AudioStream, FrameReader, MediaReader, PcmFrame, BYTES_PER_SAMPLE};
pub use smoothing::moving_average;
