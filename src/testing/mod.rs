//! Testing utilities for clipcam
//!
//! In-memory camera, recorder and permission backends that record every call,
//! so controller behaviour can be checked without hardware.

pub mod mocks;
pub mod synthetic_data;

pub use mocks::{MockCameraBackend, MockRecorderFactory, ScriptedPermissions};
pub use synthetic_data::synthetic_video_frame;
