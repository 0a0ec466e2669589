//! Shared value types for the capture controller

use serde::{Deserialize, Serialize};

/// Frame size reported by a camera backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Long side over short side, so a portrait surface compares equal to its
    /// landscape sensor size.
    pub fn aspect_ratio(&self) -> f64 {
        let long = self.width.max(self.height) as f64;
        let short = self.width.min(self.height).max(1) as f64;
        long / short
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| format!("resolution should be WIDTHxHEIGHT, got: {}", s))?;
        let width = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
        let height = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
        if width == 0 || height == 0 {
            return Err(format!("resolution must be non-zero, got: {}", s));
        }
        Ok(Self { width, height })
    }
}

/// Which surface kind receives preview frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewMode {
    /// Dedicated preview component owned by the camera
    #[default]
    Dedicated,
    /// Passthrough texture surface
    Texture,
}

/// Whole-system capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    PermissionPending,
    PreviewOnly,
    /// Background prepare in flight; the button is disabled
    Starting,
    Recording,
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CaptureState::Idle => "idle",
            CaptureState::PermissionPending => "permission_pending",
            CaptureState::PreviewOnly => "preview_only",
            CaptureState::Starting => "starting",
            CaptureState::Recording => "recording",
        };
        f.write_str(s)
    }
}

/// Label of the single capture button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonLabel {
    Start,
    Stop,
}

impl ButtonLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonLabel::Start => "Start",
            ButtonLabel::Stop => "Stop",
        }
    }
}

/// Audio input fed to the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSource {
    #[default]
    Camcorder,
    Microphone,
    None,
}

/// Video input fed to the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoSource {
    #[default]
    Camera,
    Surface,
}

/// RGB frame pulled from a camera device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub device_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl CameraFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, device_id: String) -> Self {
        Self {
            data,
            width,
            height,
            device_id,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}
