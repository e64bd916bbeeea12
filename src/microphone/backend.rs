//! Capture backend selection.
//!
//! The backend is chosen by name at call time and resolved to one of the
//! audio hosts cpal was built with. FFmpeg-style device format names are
//! accepted as aliases so existing configurations keep working:
//! `avfoundation` selects Core Audio and `dshow` selects WASAPI.

use crate::error::{Error, Result};
use cpal::Host;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackend {
    Alsa,
    Jack,
    #[serde(alias = "avfoundation")]
    CoreAudio,
    #[serde(alias = "dshow")]
    Wasapi,
    Asio,
}

impl Default for CaptureBackend {
    fn default() -> Self {
        #[cfg(target_os = "macos")]
        return CaptureBackend::CoreAudio;
        #[cfg(target_os = "windows")]
        return CaptureBackend::Wasapi;
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        return CaptureBackend::Alsa;
    }
}

impl CaptureBackend {
    pub const ALL: [CaptureBackend; 5] = [
        CaptureBackend::Alsa,
        CaptureBackend::Jack,
        CaptureBackend::CoreAudio,
        CaptureBackend::Wasapi,
        CaptureBackend::Asio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureBackend::Alsa => "alsa",
            CaptureBackend::Jack => "jack",
            CaptureBackend::CoreAudio => "coreaudio",
            CaptureBackend::Wasapi => "wasapi",
            CaptureBackend::Asio => "asio",
        }
    }

    /// The name cpal reports for the matching host.
    pub fn host_name(&self) -> &'static str {
        match self {
            CaptureBackend::Alsa => "ALSA",
            CaptureBackend::Jack => "JACK",
            CaptureBackend::CoreAudio => "CoreAudio",
            CaptureBackend::Wasapi => "WASAPI",
            CaptureBackend::Asio => "ASIO",
        }
    }

    pub fn is_available(&self) -> bool {
        cpal::available_hosts()
            .iter()
            .any(|id| id.name().eq_ignore_ascii_case(self.host_name()))
    }

    /// Open the cpal host for this backend.
    pub fn host(&self) -> Result<Host> {
        let id = cpal::available_hosts()
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(self.host_name()))
            .ok_or_else(|| {
                Error::BackendUnavailable(format!(
                    "{} is not available in this build (available: {})",
                    self.as_str(),
                    available_host_names().join(", ")
                ))
            })?;

        let host = cpal::host_from_id(id)
            .map_err(|e| Error::BackendUnavailable(format!("{}: {}", self.as_str(), e)))?;
        log::debug!("Using capture backend {} ({})", self.as_str(), id.name());
        Ok(host)
    }
}

fn available_host_names() -> Vec<&'static str> {
    cpal::available_hosts().iter().map(|id| id.name()).collect()
}

impl fmt::Display for CaptureBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alsa" => Ok(CaptureBackend::Alsa),
            "jack" => Ok(CaptureBackend::Jack),
            "coreaudio" | "core-audio" | "avfoundation" => Ok(CaptureBackend::CoreAudio),
            "wasapi" | "dshow" => Ok(CaptureBackend::Wasapi),
            "asio" => Ok(CaptureBackend::Asio),
            other => Err(Error::InvalidArgument(format!(
                "unknown capture backend '{}'",
                other
            ))),
        }
    }
}
