//! Configuration management for clipcam
//!
//! Provides TOML loading, saving and validation for the camera, recording
//! and storage settings the controller runs with.

use crate::errors::CameraError;
use crate::quality::QualityTier;
use crate::types::{AudioSource, PreviewMode, Resolution, VideoSource};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipCamConfig {
    pub camera: CameraConfig,
    pub recording: RecordingConfig,
    pub storage: StorageConfig,
}

/// Camera-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Device to open ("0" for the first camera)
    pub device_id: String,
    /// Surface kind that receives preview frames
    pub preview_mode: PreviewMode,
    /// Surface size assumed before the host reports one [width, height]
    pub fallback_surface: [u32; 2],
}

/// Recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Clip length cap in seconds
    pub max_duration_secs: u32,
    /// Rotation hint written into the output, in degrees
    pub orientation_hint: u32,
    pub quality: QualityTier,
    pub audio_source: AudioSource,
    pub video_source: VideoSource,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory recordings are written to
    pub output_directory: String,
    /// File name prefix before the timestamp
    pub file_prefix: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_id: "0".to_string(),
            preview_mode: PreviewMode::Dedicated,
            fallback_surface: [1280, 720],
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 10,
            orientation_hint: 90,
            quality: QualityTier::High,
            audio_source: AudioSource::Camcorder,
            video_source: VideoSource::Camera,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            file_prefix: "VID_".to_string(),
        }
    }
}

/// `<platform video dir>/clipcam`, or `./recordings` when there is no home
fn default_output_directory() -> String {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
    match home {
        Some(home) => PathBuf::from(home)
            .join("Videos")
            .join("clipcam")
            .to_string_lossy()
            .to_string(),
        None => "./recordings".to_string(),
    }
}

impl CameraConfig {
    pub fn fallback_surface(&self) -> Resolution {
        Resolution::new(self.fallback_surface[0], self.fallback_surface[1])
    }
}

impl ClipCamConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CameraError::InitializationError(format!("Failed to read config file: {}", e))
        })?;

        let config: ClipCamConfig = toml::from_str(&contents).map_err(|e| {
            CameraError::InitializationError(format!("Failed to parse config file: {}", e))
        })?;

        config
            .validate()
            .map_err(|e| CameraError::InitializationError(format!("Invalid config: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::InitializationError(format!(
                    "Failed to create config directory: {}",
                    e
                ))
            })?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            CameraError::InitializationError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            CameraError::InitializationError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("clipcam.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.device_id.trim().is_empty() {
            return Err("Camera device id must not be empty".to_string());
        }
        if self.camera.fallback_surface[0] == 0 || self.camera.fallback_surface[1] == 0 {
            return Err("Invalid fallback surface size".to_string());
        }

        if self.recording.max_duration_secs == 0 || self.recording.max_duration_secs > 600 {
            return Err("Max duration must be between 1 and 600 seconds".to_string());
        }
        if !matches!(self.recording.orientation_hint, 0 | 90 | 180 | 270) {
            return Err("Orientation hint must be 0, 90, 180 or 270".to_string());
        }

        if self.storage.output_directory.trim().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }
        if self.storage.file_prefix.contains(['/', '\\']) {
            return Err("File prefix must not contain path separators".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClipCamConfig::default();
        assert_eq!(config.recording.max_duration_secs, 10);
        assert_eq!(config.recording.orientation_hint, 90);
        assert_eq!(config.recording.quality, QualityTier::High);
        assert_eq!(config.camera.device_id, "0");
    }

    #[test]
    fn test_config_validation() {
        let config = ClipCamConfig::default();
        assert!(config.validate().is_ok());

        let mut bad_orientation = config.clone();
        bad_orientation.recording.orientation_hint = 45;
        assert!(bad_orientation.validate().is_err());

        let mut bad_duration = ClipCamConfig::default();
        bad_duration.recording.max_duration_secs = 0;
        assert!(bad_duration.validate().is_err());

        let mut bad_prefix = ClipCamConfig::default();
        bad_prefix.storage.file_prefix = "../VID_".to_string();
        assert!(bad_prefix.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("clipcam.toml");

        let mut config = ClipCamConfig::default();
        config.camera.preview_mode = PreviewMode::Texture;
        config.storage.output_directory = dir.path().to_string_lossy().to_string();
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = ClipCamConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.camera.preview_mode, PreviewMode::Texture);
        assert_eq!(loaded.storage.output_directory, config.storage.output_directory);
    }

    #[test]
    fn test_config_toml_format() {
        let config = ClipCamConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[recording]"));
        assert!(toml_string.contains("[storage]"));
        assert!(toml_string.contains("orientation_hint"));
        assert!(toml_string.contains("quality = \"high\""));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ClipCamConfig::load_from_file("nonexistent_file.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().recording.max_duration_secs, 10);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        let mut config = ClipCamConfig::default();
        config.recording.orientation_hint = 30;
        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        assert!(ClipCamConfig::load_from_file(&path).is_err());
    }
}
