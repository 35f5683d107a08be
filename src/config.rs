//! Runtime settings for the bridge.
//!
//! Process-wide, set once at startup: default capture geometry, the audio
//! sample contract shared with the engine, and engine environment key/values
//! applied through [`crate::engine::MediaEngine::setenv`] before any session
//! exists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::MediaEngine;
use crate::errors::BridgeError;

/// Root settings structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    pub video: VideoSettings,
    pub audio: AudioSettings,
    /// Key/value pairs handed to the engine verbatim at startup. There is
    /// no teardown counterpart; set once, before any session is created.
    #[serde(default)]
    pub engine_env: BTreeMap<String, String>,
}

/// Default capture geometry used when building configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    pub default_width: u32,
    pub default_height: u32,
    pub default_fps: u32,
}

/// The fixed audio contract shared with the engine: pushed capture audio and
/// pulled render audio both use this rate and channel count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            video: VideoSettings {
                default_width: 640,
                default_height: 480,
                default_fps: 30,
            },
            audio: AudioSettings {
                sample_rate: 48_000,
                channels: 2,
            },
            engine_env: BTreeMap::new(),
        }
    }
}

impl BridgeSettings {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, BridgeError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("settings file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| BridgeError::settings(format!("failed to read settings file: {}", e)))?;

        let settings: BridgeSettings = toml::from_str(&contents)
            .map_err(|e| BridgeError::settings(format!("failed to parse settings file: {}", e)))?;

        log::info!("loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to a TOML file, creating parent directories as needed.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), BridgeError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BridgeError::settings(format!("failed to create settings directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| BridgeError::settings(format!("failed to serialize settings: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| BridgeError::settings(format!("failed to write settings file: {}", e)))?;

        log::info!("saved settings to {:?}", path);
        Ok(())
    }

    /// Default settings file path.
    pub fn default_path() -> PathBuf {
        PathBuf::from("mediabridge.toml")
    }

    /// Load from the default location or fall back to defaults.
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("failed to load settings, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate settings values.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.video.default_width == 0 || self.video.default_height == 0 {
            return Err(BridgeError::settings("invalid default resolution"));
        }
        if self.video.default_fps == 0 || self.video.default_fps > 120 {
            return Err(BridgeError::settings("default fps must be 1-120"));
        }
        if !matches!(self.audio.sample_rate, 16_000 | 44_100 | 48_000) {
            return Err(BridgeError::settings(
                "audio sample rate must be 16000, 44100 or 48000",
            ));
        }
        if self.audio.channels == 0 || self.audio.channels > 2 {
            return Err(BridgeError::settings("audio channels must be 1 or 2"));
        }
        Ok(())
    }

    /// Apply `engine_env` through the engine's process-wide setter. Call
    /// once at startup, before creating any session.
    pub fn apply_engine_env<E: MediaEngine + ?Sized>(&self, engine: &E) {
        for (name, value) in &self.engine_env {
            log::debug!("engine env: {}={}", name, value);
            engine.setenv(name, value);
        }
    }
}
