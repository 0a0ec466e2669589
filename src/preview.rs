//! Preview surface adapter
//!
//! Forwards surface lifecycle to the open camera: created starts the preview,
//! changed restarts it at the new size, destroyed stops it. The last reported
//! surface size is what recording sizes are matched against.

use crate::errors::CameraError;
use crate::platform::{CameraDevice, PreviewTarget};
use crate::types::{CameraFrame, PreviewMode, Resolution};

#[derive(Debug, Clone)]
pub struct PreviewAdapter {
    mode: PreviewMode,
    surface: Option<Resolution>,
    fallback: Resolution,
}

impl PreviewAdapter {
    pub fn new(mode: PreviewMode, fallback: Resolution) -> Self {
        Self {
            mode,
            surface: None,
            fallback,
        }
    }

    pub fn mode(&self) -> PreviewMode {
        self.mode
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// Current surface size, or the configured fallback before one exists
    pub fn target_size(&self) -> Resolution {
        self.surface.unwrap_or(self.fallback)
    }

    fn target(&self) -> PreviewTarget {
        PreviewTarget {
            mode: self.mode,
            size: self.target_size(),
        }
    }

    pub fn surface_created(
        &mut self,
        size: Resolution,
        device: Option<&mut dyn CameraDevice>,
    ) -> Result<(), CameraError> {
        self.surface = Some(size);
        match device {
            Some(device) => self.attach(device),
            None => Ok(()),
        }
    }

    pub fn surface_changed(
        &mut self,
        size: Resolution,
        device: Option<&mut dyn CameraDevice>,
    ) -> Result<(), CameraError> {
        self.surface = Some(size);
        let Some(device) = device else {
            return Ok(());
        };
        if device.is_previewing() {
            // a stop on a surface that is already gone is harmless
            if let Err(e) = device.stop_preview() {
                log::debug!("Ignoring stop_preview failure on surface change: {}", e);
            }
        }
        device.start_preview(&self.target())
    }

    pub fn surface_destroyed(&mut self, device: Option<&mut dyn CameraDevice>) -> Result<(), CameraError> {
        self.surface = None;
        match device {
            Some(device) if device.is_previewing() => device.stop_preview(),
            _ => Ok(()),
        }
    }

    /// Latest preview frame for the surface to draw; `None` without a surface
    pub fn frame(&self, device: &mut dyn CameraDevice) -> Result<Option<CameraFrame>, CameraError> {
        if self.surface.is_none() {
            return Ok(None);
        }
        device.preview_frame()
    }

    /// Start preview on a freshly opened device if a surface exists
    pub fn attach(&self, device: &mut dyn CameraDevice) -> Result<(), CameraError> {
        if self.surface.is_none() {
            log::debug!("No preview surface yet; preview deferred");
            return Ok(());
        }
        if device.is_previewing() {
            return Ok(());
        }
        device.start_preview(&self.target())
    }
}
