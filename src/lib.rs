//! # wavesmooth
//!
//! Two independent audio pipelines:
//!
//! - **Decode and smooth**: open a media file, decode its first audio stream
//!   to 16-bit PCM, normalize the samples to [-1.0, 1.0] and run a
//!   moving-average pass over them ([`audio_toolkit`]).
//! - **Record**: capture an input device for a fixed duration into an MP3
//!   file ([`microphone`]).
//!
//! ```rust,no_run
//! use wavesmooth::{audio_toolkit::smooth_file, Settings};
//!
//! let settings = Settings::default();
//! let report = smooth_file(&settings.input_path, settings.window_size, &settings)?;
//! println!("{}", report);
//! # Ok::<(), wavesmooth::Error>(())
//! ```

pub mod audio_toolkit;
pub mod error;
pub mod microphone;
pub mod settings;

pub use error::{Error, Result};
pub use settings::Settings;

/// Default `env_logger` filter for the binaries. Decoder internals are
/// only interesting when something goes wrong.
pub const DEFAULT_LOG_FILTER: &str = "info,symphonia=warn";

/// Initialise logging for a binary. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER);
    // ignore a second init
    let _ = env_logger::Builder::from_env(env).try_init();
}
