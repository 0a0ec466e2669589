//! Recorder configuration types

use crate::config::RecordingConfig;
use crate::errors::CameraError;
use crate::quality::CamcorderProfile;
use crate::types::{AudioSource, VideoSource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Everything a recorder is configured with before `prepare`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderSettings {
    pub audio_source: AudioSource,
    pub video_source: VideoSource,
    pub profile: CamcorderProfile,
    pub output_path: Option<PathBuf>,
    /// Recording stops by itself after this long
    pub max_duration: Option<Duration>,
    /// Degrees clockwise the player should rotate the video
    pub orientation_hint: u32,
}

impl RecorderSettings {
    pub fn new(profile: CamcorderProfile) -> Self {
        Self {
            audio_source: AudioSource::default(),
            video_source: VideoSource::default(),
            profile,
            output_path: None,
            max_duration: None,
            orientation_hint: 0,
        }
    }

    /// Sources and limits from the recording config section
    pub fn from_config(config: &RecordingConfig, profile: CamcorderProfile) -> Self {
        Self::new(profile)
            .with_sources(config.audio_source, config.video_source)
            .with_max_duration(Duration::from_secs(config.max_duration_secs as u64))
            .with_orientation_hint(config.orientation_hint)
    }

    pub fn with_sources(mut self, audio: AudioSource, video: VideoSource) -> Self {
        self.audio_source = audio;
        self.video_source = video;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_max_duration(mut self, max: Duration) -> Self {
        self.max_duration = Some(max);
        self
    }

    pub fn with_orientation_hint(mut self, degrees: u32) -> Self {
        self.orientation_hint = degrees;
        self
    }

    /// Checks a recorder runs at `prepare`
    pub fn validate(&self) -> Result<(), CameraError> {
        if self.output_path.is_none() {
            return Err(CameraError::ConfigurationError("output path not set".to_string()));
        }
        if !matches!(self.orientation_hint, 0 | 90 | 180 | 270) {
            return Err(CameraError::ConfigurationError(format!(
                "unsupported orientation hint {}",
                self.orientation_hint
            )));
        }
        if self.profile.video_frame_width == 0 || self.profile.video_frame_height == 0 {
            return Err(CameraError::ConfigurationError(
                "profile has no frame size".to_string(),
            ));
        }
        if self.profile.video_frame_rate == 0 {
            return Err(CameraError::ConfigurationError(
                "profile has no frame rate".to_string(),
            ));
        }
        if matches!(self.max_duration, Some(d) if d.is_zero()) {
            return Err(CameraError::ConfigurationError(
                "max duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Statistics returned after finishing a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingStats {
    pub video_frames: u64,
    /// Opus packets muxed; zero for video-only clips
    pub audio_frames: u64,
    pub dropped_frames: u64,
    pub duration_secs: f64,
    pub bytes_written: u64,
    /// The recorder hit `max_duration` before `stop` was called
    pub reached_max_duration: bool,
    pub output_path: String,
}

impl RecordingStats {
    /// Average bitrate achieved, bits per second
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes_written as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}
