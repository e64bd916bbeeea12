use crate::error::{Error, Result};
use crate::microphone::CaptureBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Bitrates the LAME encoder accepts, in kbps.
pub const SUPPORTED_BITRATES_KBPS: &[u16] = &[
    8, 16, 24, 32, 40, 48, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_input_path")]
    pub input_path: PathBuf,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Log and skip packets the codec rejects instead of aborting the run.
    #[serde(default)]
    pub skip_decode_errors: bool,
    #[serde(default)]
    pub recording: RecordingSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecordingSettings {
    #[serde(default)]
    pub capture_backend: CaptureBackend,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u16,
    /// LAME quality, 0 is best and 9 is worst.
    #[serde(default)]
    pub quality: u8,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_input_path() -> PathBuf {
    PathBuf::from("input.mp3")
}

fn default_window_size() -> usize {
    100
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_channels() -> u16 {
    2
}

fn default_bitrate_kbps() -> u16 {
    192
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            window_size: default_window_size(),
            skip_decode_errors: false,
            recording: RecordingSettings::default(),
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            capture_backend: CaptureBackend::default(),
            device: None,
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bitrate_kbps: default_bitrate_kbps(),
            quality: 0,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Settings {
    /// Parse settings from a TOML file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let settings: Settings = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `explicit` if given, otherwise from the user config
    /// directory when a settings file exists there, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            log::debug!("Loading settings from {}", path.display());
            return Self::from_file(path);
        }

        match default_settings_path() {
            Some(path) if path.is_file() => {
                log::debug!("Loading settings from {}", path.display());
                Self::from_file(&path)
            }
            _ => {
                log::debug!("No settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::Config("window_size must be at least 1".to_string()));
        }
        self.recording.validate()
    }
}

impl RecordingSettings {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be positive".to_string()));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(Error::Config(format!(
                "channels must be 1 or 2, got {}",
                self.channels
            )));
        }
        if self.quality > 9 {
            return Err(Error::Config(format!(
                "quality must be between 0 and 9, got {}",
                self.quality
            )));
        }
        if !SUPPORTED_BITRATES_KBPS.contains(&self.bitrate_kbps) {
            return Err(Error::Config(format!(
                "unsupported bitrate {} kbps",
                self.bitrate_kbps
            )));
        }
        Ok(())
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("wavesmooth").join(SETTINGS_FILE_NAME))
}
