//! Camcorder quality profiles
//!
//! A profile bundles the encoding parameters for a quality tier. The recorder
//! takes the tier's bitrate and frame rate but records at whatever size the
//! resolution selection picked for the current preview surface.
use crate::types::Resolution;
use serde::{Deserialize, Serialize};

/// Quality tiers a profile can be requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// 480p at 30fps, lower bitrate
    Low,
    /// 1080p at 30fps, highest bitrate the device offers
    #[default]
    High,
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityTier::Low => write!(f, "low"),
            QualityTier::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "480p" => Ok(QualityTier::Low),
            "high" | "1080p" => Ok(QualityTier::High),
            other => Err(format!("Unknown quality tier: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    H264,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputContainer {
    Mp4,
}

impl OutputContainer {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputContainer::Mp4 => "mp4",
        }
    }
}

/// Encoding parameters for one quality tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamcorderProfile {
    pub tier: QualityTier,
    pub container: OutputContainer,
    pub video_codec: VideoCodec,
    pub video_bitrate: u32,
    pub video_frame_rate: u32,
    pub video_frame_width: u32,
    pub video_frame_height: u32,
    pub audio_bitrate: u32,
    pub audio_sample_rate: u32,
    pub audio_channels: u16,
}

impl CamcorderProfile {
    /// Profile the platform would hand out for `tier`
    pub fn get(tier: QualityTier) -> Self {
        match tier {
            QualityTier::Low => Self {
                tier,
                container: OutputContainer::Mp4,
                video_codec: VideoCodec::H264,
                video_bitrate: 1_500_000,
                video_frame_rate: 30,
                video_frame_width: 640,
                video_frame_height: 480,
                audio_bitrate: 64_000,
                audio_sample_rate: 44_100,
                audio_channels: 1,
            },
            QualityTier::High => Self {
                tier,
                container: OutputContainer::Mp4,
                video_codec: VideoCodec::H264,
                video_bitrate: 10_000_000,
                video_frame_rate: 30,
                video_frame_width: 1920,
                video_frame_height: 1080,
                audio_bitrate: 128_000,
                audio_sample_rate: 48_000,
                audio_channels: 2,
            },
        }
    }

    /// Same tier, recorded at `size` instead of the tier's nominal frame size
    pub fn with_resolution(mut self, size: Resolution) -> Self {
        self.video_frame_width = size.width;
        self.video_frame_height = size.height;
        self
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.video_frame_width, self.video_frame_height)
    }
}
