//! Camera device abstraction
//!
//! A `CameraDevice` is the opened camera. It is exclusively owned through a
//! `DeviceGuard`, which releases it on drop so every exit path (including a
//! pause racing a background start) gives the device back.

use crate::errors::CameraError;
use crate::types::{CameraFrame, PreviewMode, Resolution};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub mod native;

pub use native::{NativeCamera, NativeCameraBackend};

/// Where preview frames go and at what size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewTarget {
    pub mode: PreviewMode,
    pub size: Resolution,
}

/// An opened camera
pub trait CameraDevice: Send {
    fn device_id(&self) -> &str;

    /// Sizes the preview stream can run at
    fn supported_preview_sizes(&mut self) -> Result<Vec<Resolution>, CameraError>;

    /// Sizes the recorder can capture at. Empty means "same as preview".
    fn supported_video_sizes(&mut self) -> Result<Vec<Resolution>, CameraError>;

    fn set_preview_size(&mut self, size: Resolution) -> Result<(), CameraError>;

    fn start_preview(&mut self, target: &PreviewTarget) -> Result<(), CameraError>;

    fn stop_preview(&mut self) -> Result<(), CameraError>;

    fn is_previewing(&self) -> bool;

    /// Pull the next RGB frame
    fn capture_frame(&mut self) -> Result<CameraFrame, CameraError>;

    /// Newest frame the running preview delivered and nobody took yet.
    /// `None` while the preview is stopped.
    fn preview_frame(&mut self) -> Result<Option<CameraFrame>, CameraError>;

    /// Hand frame delivery over to a recorder
    fn unlock(&mut self) -> Result<(), CameraError>;

    /// Take frame delivery back from a recorder
    fn lock(&mut self) -> Result<(), CameraError>;

    /// Close the device. Further calls fail.
    fn release(&mut self);
}

/// Opens camera devices
pub trait CameraBackend: Send + Sync {
    fn open(&self, device_id: &str) -> Result<Box<dyn CameraDevice>, CameraError>;
}

/// Device shared between the controller and a recorder bound to it
pub type SharedDevice = Arc<Mutex<Box<dyn CameraDevice>>>;

/// Lock a shared device, recovering from a panic in another holder
pub fn lock_device(device: &SharedDevice) -> MutexGuard<'_, Box<dyn CameraDevice>> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive ownership of an opened camera
pub struct DeviceGuard {
    device: SharedDevice,
    device_id: String,
}

impl DeviceGuard {
    pub fn open(backend: &dyn CameraBackend, device_id: &str) -> Result<Self, CameraError> {
        let device = backend.open(device_id)?;
        log::info!("Opened camera {}", device_id);
        Ok(Self {
            device: Arc::new(Mutex::new(device)),
            device_id: device_id.to_string(),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Handle for a recorder; the guard still decides when the device closes
    pub fn shared(&self) -> SharedDevice {
        self.device.clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut dyn CameraDevice) -> R) -> R {
        let mut device = lock_device(&self.device);
        f(device.as_mut())
    }

    /// Release now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        let mut device = lock_device(&self.device);
        if device.is_previewing() {
            if let Err(e) = device.stop_preview() {
                log::warn!("Failed to stop preview on release: {}", e);
            }
        }
        device.release();
        log::info!("Released camera {}", self.device_id);
    }
}

impl std::fmt::Debug for DeviceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceGuard")
            .field("device_id", &self.device_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCameraBackend;

    #[test]
    fn test_guard_releases_on_drop() {
        let backend = MockCameraBackend::new();
        {
            let guard = DeviceGuard::open(&backend, "0").unwrap();
            guard
                .with(|d| {
                    d.start_preview(&PreviewTarget {
                        mode: PreviewMode::Dedicated,
                        size: Resolution::new(640, 480),
                    })
                })
                .unwrap();
            assert_eq!(backend.live_devices(), 1);
        }
        assert_eq!(backend.live_devices(), 0);
        assert!(backend.log().contains(&"stop_preview".to_string()));
    }

    #[test]
    fn test_shared_handle_outlives_guard_but_device_is_closed() {
        let backend = MockCameraBackend::new();
        let guard = DeviceGuard::open(&backend, "0").unwrap();
        let shared = guard.shared();
        guard.release();
        assert_eq!(backend.live_devices(), 0);
        assert!(lock_device(&shared).capture_frame().is_err());
    }

    #[test]
    fn test_open_failure_leaves_nothing_live() {
        let backend = MockCameraBackend::new();
        backend.fail_open(true);
        assert!(DeviceGuard::open(&backend, "0").is_err());
        assert_eq!(backend.live_devices(), 0);
    }
}
