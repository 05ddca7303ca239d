use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::format::CaptureFormat;
use crate::traits::presence::StatusNotice;

/// Configuration for capture sessions run by one controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    /// Requested device format (default: 44100 Hz, stereo, PCM 16-bit).
    pub format: CaptureFormat,

    /// Duration of audio held by the read buffer, in milliseconds (default: 20).
    pub buffer_millis: u32,

    /// Consecutive transient reads tolerated before the session fails (default: 3).
    pub transient_retry_limit: u32,

    /// Persistent status shown while recording.
    pub notice: StatusNotice,
}

impl CaptureConfiguration {
    /// Checks session policy. The format itself is checked when the device
    /// is opened, so a bad format surfaces from `start`.
    pub fn validate(&self) -> Result<(), String> {
        if self.transient_retry_limit == 0 {
            return Err("transient retry limit must be at least 1".into());
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            format: CaptureFormat::default(),
            buffer_millis: 20,
            transient_retry_limit: 3,
            notice: StatusNotice::default(),
        }
    }
}
