//! Video recording for clipcam
//!
//! A `MediaRecorder` follows a fixed lifecycle:
//!
//! ```text
//! Initial --configure/set_camera--> Initial --prepare--> Prepared --start--> Recording
//!     Recording --stop--> Stopped          any --release--> Released
//! ```
//!
//! It is unusable until `prepare` succeeds and terminal after `stop` or
//! `release`. `RecorderGuard` owns one exclusively and releases it on drop.
//!
//! With the `recording` feature, `Mp4RecorderFactory` records H.264 into MP4
//! using openh264 and muxide.
//!
//! # Example
//! ```rust,ignore
//! use clipcam::recording::{Mp4RecorderFactory, RecorderFactory, RecorderGuard};
//!
//! let mut recorder = RecorderGuard::new(Mp4RecorderFactory.create());
//! recorder.set_camera(device.shared())?;
//! recorder.configure(settings)?;
//! recorder.prepare()?;
//! recorder.start()?;
//! // ...
//! let stats = recorder.stop()?;
//! ```

mod settings;

#[cfg(feature = "recording")]
mod encoder;
#[cfg(feature = "recording")]
mod mp4;

pub use settings::{RecorderSettings, RecordingStats};

#[cfg(feature = "recording")]
pub use encoder::{EncodedFrame, H264Encoder};
#[cfg(feature = "recording")]
pub use mp4::{Mp4Recorder, Mp4RecorderFactory};

use crate::errors::CameraError;
use crate::platform::SharedDevice;

/// Recorder lifecycle position
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RecorderState {
    Initial,
    Prepared,
    Recording,
    Stopped,
    Released,
}

impl RecorderState {
    /// Fail with `IllegalState` unless the recorder is in `expected`
    pub fn require(self, expected: RecorderState, operation: &str) -> Result<(), CameraError> {
        if self == expected {
            Ok(())
        } else {
            Err(CameraError::IllegalState(format!(
                "{} called in state {:?}, expected {:?}",
                operation, self, expected
            )))
        }
    }
}

/// Capture-to-file resource bound to a camera device
pub trait MediaRecorder: Send {
    fn state(&self) -> RecorderState;

    /// Bind the camera frames are pulled from. Only valid in `Initial`.
    fn set_camera(&mut self, device: SharedDevice) -> Result<(), CameraError>;

    /// Apply sources, profile, output path and limits. Only valid in `Initial`.
    fn configure(&mut self, settings: RecorderSettings) -> Result<(), CameraError>;

    /// Validate configuration and open the output. Fails with `IllegalState`,
    /// `ConfigurationError` or `IoError`.
    fn prepare(&mut self) -> Result<(), CameraError>;

    fn start(&mut self) -> Result<(), CameraError>;

    /// Finish the file. A failure leaves a partial or empty file behind.
    fn stop(&mut self) -> Result<RecordingStats, CameraError>;

    /// Free everything; safe to call in any state, more than once
    fn release(&mut self);
}

/// Creates recorders
pub trait RecorderFactory: Send + Sync {
    fn create(&self) -> Box<dyn MediaRecorder>;
}

/// Exclusive ownership of a recorder; releases on drop
pub struct RecorderGuard {
    recorder: Box<dyn MediaRecorder>,
}

impl RecorderGuard {
    pub fn new(recorder: Box<dyn MediaRecorder>) -> Self {
        Self { recorder }
    }

    pub fn state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn set_camera(&mut self, device: SharedDevice) -> Result<(), CameraError> {
        self.recorder.set_camera(device)
    }

    pub fn configure(&mut self, settings: RecorderSettings) -> Result<(), CameraError> {
        self.recorder.configure(settings)
    }

    pub fn prepare(&mut self) -> Result<(), CameraError> {
        self.recorder.prepare()
    }

    pub fn start(&mut self) -> Result<(), CameraError> {
        self.recorder.start()
    }

    pub fn stop(&mut self) -> Result<RecordingStats, CameraError> {
        self.recorder.stop()
    }

    /// Release now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for RecorderGuard {
    fn drop(&mut self) {
        if self.recorder.state() != RecorderState::Released {
            self.recorder.release();
            log::debug!("Released recorder");
        }
    }
}

impl std::fmt::Debug for RecorderGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderGuard")
            .field("state", &self.recorder.state())
            .finish()
    }
}
