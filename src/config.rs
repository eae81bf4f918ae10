//! Application configuration
//!
//! Loaded from TOML. Every section has defaults so a partial file, or no file
//! at all, yields a working configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::profiles::{default_profiles, find_or_first, VoiceProfile};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,
    pub session: SessionConfig,
    pub visualizer: VisualizerConfig,
    /// Voice profile catalog
    pub voices: Vec<VoiceProfile>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            playback: PlaybackConfig::default(),
            session: SessionConfig::default(),
            visualizer: VisualizerConfig::default(),
            voices: default_profiles(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path, or from the platform config directory.
    ///
    /// An explicit path must exist. The platform file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Platform config file location
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "voice-morph").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Write the configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.capture.sample_rate == 0 || self.playback.sample_rate == 0 {
            return Err(Error::Config("sample rates must be non-zero".to_string()));
        }
        if self.playback.channels == 0 {
            return Err(Error::Config("playback channel count must be non-zero".to_string()));
        }
        if self.capture.block_size == 0 {
            return Err(Error::Config("capture block size must be non-zero".to_string()));
        }
        if self.voices.is_empty() {
            return Err(Error::Config("at least one voice profile is required".to_string()));
        }
        Ok(())
    }

    /// Profile selected at startup
    pub fn initial_voice(&self) -> Option<&VoiceProfile> {
        find_or_first(&self.voices, &self.session.default_voice)
    }
}

/// Microphone capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Sample rate requested from the input device. Capture is downmixed to mono.
    pub sample_rate: u32,
    /// Samples per block handed to the capture pipeline
    pub block_size: usize,
    /// Input device name, or the system default when unset
    pub device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_CAPTURE_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            device: None,
        }
    }
}

impl CaptureConfig {
    /// Mime type attached to every outbound block
    pub fn mime_type(&self) -> String {
        format!("{};rate={}", PCM_MIME_TYPE, self.sample_rate)
    }
}

/// Speaker playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Rate of the audio returned by the service
    pub sample_rate: u32,
    pub channels: u16,
    /// Output device name, or the system default when unset
    pub device: Option<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_PLAYBACK_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            device: None,
        }
    }
}

/// Remote session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub model: String,
    /// Prebuilt synthetic voice
    pub voice_name: String,
    /// Profile id selected at startup
    pub default_voice: String,
    /// How long to wait for the transport to open; 0 waits forever
    pub open_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            voice_name: DEFAULT_VOICE_NAME.to_string(),
            default_voice: "girl".to_string(),
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    pub fn open_timeout(&self) -> Option<Duration> {
        (self.open_timeout_ms > 0).then(|| Duration::from_millis(self.open_timeout_ms))
    }
}

/// Waveform display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub enabled: bool,
    /// Analyser window in samples
    pub fft_size: usize,
    /// Redraws per second while active
    pub fps: u32,
    /// Surface size in cells
    pub width: usize,
    pub height: usize,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fft_size: DEFAULT_FFT_SIZE,
            fps: DEFAULT_VISUALIZER_FPS,
            width: 64,
            height: 9,
        }
    }
}

impl VisualizerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }
}
