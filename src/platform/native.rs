use super::{CameraBackend, CameraDevice, PreviewTarget};
use crate::errors::CameraError;
use crate::types::{CameraFrame, Resolution};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    Buffer, CallbackCamera,
};
use std::sync::{Arc, Mutex, PoisonError};

/// Formats slower than this are offered for preview only
pub const MIN_RECORDING_FPS: u32 = 24;

/// Opens local cameras through nokhwa
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCameraBackend;

impl CameraBackend for NativeCameraBackend {
    fn open(&self, device_id: &str) -> Result<Box<dyn CameraDevice>, CameraError> {
        let index = device_id
            .parse::<u32>()
            .map_err(|_| CameraError::InitializationError(format!("Invalid device ID: {}", device_id)))?;

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let latest: Arc<Mutex<Option<Buffer>>> = Arc::new(Mutex::new(None));
        let slot = latest.clone();
        // keep only the newest buffer; it is decoded when the host asks for it
        let camera = CallbackCamera::new(CameraIndex::Index(index), requested, move |buffer| {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(buffer);
        })
        .map_err(|e| CameraError::InitializationError(format!("Failed to open camera: {}", e)))?;

        Ok(Box::new(NativeCamera {
            camera: Some(camera),
            device_id: device_id.to_string(),
            formats: None,
            latest,
            previewing: false,
            unlocked: false,
        }))
    }
}

/// nokhwa-backed camera device
pub struct NativeCamera {
    camera: Option<CallbackCamera>,
    device_id: String,
    /// (size, fps) pairs, queried once
    formats: Option<Vec<(Resolution, u32)>>,
    /// Filled by the stream callback
    latest: Arc<Mutex<Option<Buffer>>>,
    previewing: bool,
    unlocked: bool,
}

impl NativeCamera {
    fn camera(&mut self) -> Result<&mut CallbackCamera, CameraError> {
        self.camera
            .as_mut()
            .ok_or_else(|| CameraError::CaptureError(format!("Camera {} was released", self.device_id)))
    }

    fn formats(&mut self) -> Result<&[(Resolution, u32)], CameraError> {
        if self.formats.is_none() {
            let queried = self
                .camera()?
                .compatible_camera_formats()
                .map_err(|e| CameraError::InitializationError(format!("Failed to query formats: {}", e)))?;
            let mut formats: Vec<(Resolution, u32)> = queried
                .iter()
                .map(|f| {
                    let res = f.resolution();
                    (Resolution::new(res.width_x, res.height_y), f.frame_rate())
                })
                .collect();
            formats.sort_by_key(|(size, fps)| (std::cmp::Reverse(size.area()), std::cmp::Reverse(*fps)));
            log::debug!("Camera {} reports {} formats", self.device_id, formats.len());
            self.formats = Some(formats);
        }
        Ok(self.formats.as_deref().unwrap_or_default())
    }

    fn ensure_stream(&mut self) -> Result<(), CameraError> {
        let camera = self.camera()?;
        if !camera.is_stream_open() {
            camera
                .open_stream()
                .map_err(|e| CameraError::PreviewError(format!("Failed to start stream: {}", e)))?;
        }
        Ok(())
    }
}

// Only reached through the `SharedDevice` mutex
unsafe impl Send for NativeCamera {}

fn decode_rgb(buffer: &Buffer, device_id: &str) -> Result<CameraFrame, CameraError> {
    let rgb = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| CameraError::CaptureError(format!("Failed to decode frame: {}", e)))?;
    let (width, height) = (rgb.width(), rgb.height());
    Ok(CameraFrame::new(rgb.into_raw(), width, height, device_id.to_string()))
}

fn unique_sizes(formats: &[(Resolution, u32)], min_fps: u32) -> Vec<Resolution> {
    let mut sizes: Vec<Resolution> = Vec::new();
    for (size, fps) in formats {
        if *fps >= min_fps && !sizes.contains(size) {
            sizes.push(*size);
        }
    }
    sizes
}

impl CameraDevice for NativeCamera {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn supported_preview_sizes(&mut self) -> Result<Vec<Resolution>, CameraError> {
        Ok(unique_sizes(self.formats()?, 0))
    }

    fn supported_video_sizes(&mut self) -> Result<Vec<Resolution>, CameraError> {
        Ok(unique_sizes(self.formats()?, MIN_RECORDING_FPS))
    }

    fn set_preview_size(&mut self, size: Resolution) -> Result<(), CameraError> {
        let camera = self.camera()?;
        camera
            .set_resolution(nokhwa::utils::Resolution::new(size.width, size.height))
            .map_err(|e| CameraError::PreviewError(format!("Failed to set resolution {}: {}", size, e)))
    }

    fn start_preview(&mut self, target: &PreviewTarget) -> Result<(), CameraError> {
        log::debug!(
            "Starting preview on camera {} ({:?} surface {})",
            self.device_id,
            target.mode,
            target.size
        );
        self.ensure_stream()?;
        self.previewing = true;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), CameraError> {
        self.previewing = false;
        if self.unlocked {
            // recorder still pulls frames from the stream
            return Ok(());
        }
        let camera = self.camera()?;
        if camera.is_stream_open() {
            camera
                .stop_stream()
                .map_err(|e| CameraError::PreviewError(format!("Failed to stop stream: {}", e)))?;
        }
        Ok(())
    }

    fn is_previewing(&self) -> bool {
        self.previewing
    }

    fn capture_frame(&mut self) -> Result<CameraFrame, CameraError> {
        self.ensure_stream()?;
        let buffer = self
            .camera()?
            .poll_frame()
            .map_err(|e| CameraError::CaptureError(format!("Failed to capture frame: {}", e)))?;
        decode_rgb(&buffer, &self.device_id)
    }

    fn preview_frame(&mut self) -> Result<Option<CameraFrame>, CameraError> {
        self.camera()?;
        let buffer = self.latest.lock().unwrap_or_else(PoisonError::into_inner).take();
        match buffer {
            Some(buffer) if self.previewing => decode_rgb(&buffer, &self.device_id).map(Some),
            _ => Ok(None),
        }
    }

    fn unlock(&mut self) -> Result<(), CameraError> {
        self.camera()?;
        self.unlocked = true;
        Ok(())
    }

    fn lock(&mut self) -> Result<(), CameraError> {
        self.camera()?;
        self.unlocked = false;
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if camera.is_stream_open() {
                if let Err(e) = camera.stop_stream() {
                    log::warn!("Failed to stop stream on camera {}: {}", self.device_id, e);
                }
            }
        }
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.previewing = false;
        self.unlocked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_sizes_filters_slow_formats() {
        let formats = vec![
            (Resolution::new(1920, 1080), 5),
            (Resolution::new(1280, 720), 30),
            (Resolution::new(1280, 720), 60),
            (Resolution::new(640, 480), 30),
        ];
        assert_eq!(
            unique_sizes(&formats, MIN_RECORDING_FPS),
            vec![Resolution::new(1280, 720), Resolution::new(640, 480)]
        );
        assert_eq!(unique_sizes(&formats, 0).len(), 3);
    }

    #[test]
    fn test_invalid_device_id_rejected() {
        let result = NativeCameraBackend.open("front");
        assert!(matches!(result, Err(CameraError::InitializationError(_))));
    }

    #[test]
    #[ignore = "Requires camera hardware - run manually"]
    fn test_open_first_camera() {
        let mut device = NativeCameraBackend.open("0").unwrap();
        let sizes = device.supported_video_sizes().unwrap();
        println!("Video sizes: {:?}", sizes);
        device.start_preview(&PreviewTarget {
            mode: crate::types::PreviewMode::Dedicated,
            size: sizes[0],
        })
        .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(500));
        let frame = device.preview_frame().unwrap();
        println!("Preview frame: {:?}", frame.map(|f| f.resolution()));
        device.release();
    }
}
