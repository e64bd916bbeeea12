//! Error types shared by the decode and record pipelines.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the library. Every variant aborts the operation that
/// produced it; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("no audio stream found")]
    NoAudioStream,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("capture backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("frame buffer too short: need {needed} bytes, have {available}")]
    OutOfRange { needed: usize, available: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
