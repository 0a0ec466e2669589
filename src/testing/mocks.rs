//! Mock backends

use super::synthetic_data::synthetic_video_frame;
use crate::errors::CameraError;
use crate::permissions::{
    Permission, PermissionInfo, PermissionProvider, PermissionStatus, REQUIRED_PERMISSIONS,
};
use crate::platform::{lock_device, CameraBackend, CameraDevice, PreviewTarget, SharedDevice};
use crate::recording::{
    MediaRecorder, RecorderFactory, RecorderSettings, RecorderState, RecordingStats,
};
use crate::types::{CameraFrame, Resolution};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Camera ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CameraState {
    live: usize,
    opened: usize,
    fail_open: bool,
    fail_capture: bool,
    open_delay: Duration,
    preview_sizes: Vec<Resolution>,
    video_sizes: Vec<Resolution>,
    log: Vec<String>,
}

/// Camera backend whose devices produce synthetic frames
#[derive(Clone)]
pub struct MockCameraBackend {
    state: Arc<Mutex<CameraState>>,
}

impl MockCameraBackend {
    pub fn new() -> Self {
        Self::with_sizes(
            vec![
                Resolution::new(1280, 720),
                Resolution::new(640, 480),
                Resolution::new(320, 240),
            ],
            vec![
                Resolution::new(1920, 1080),
                Resolution::new(1280, 720),
                Resolution::new(640, 480),
                Resolution::new(320, 240),
            ],
        )
    }

    pub fn with_sizes(preview_sizes: Vec<Resolution>, video_sizes: Vec<Resolution>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CameraState {
                preview_sizes,
                video_sizes,
                ..CameraState::default()
            })),
        }
    }

    pub fn fail_open(&self, fail: bool) {
        lock(&self.state).fail_open = fail;
    }

    pub fn fail_capture(&self, fail: bool) {
        lock(&self.state).fail_capture = fail;
    }

    /// Make `open` block, to widen the window a background start runs in
    pub fn set_open_delay(&self, delay: Duration) {
        lock(&self.state).open_delay = delay;
    }

    /// Devices opened and not yet released
    pub fn live_devices(&self) -> usize {
        lock(&self.state).live
    }

    pub fn opened_count(&self) -> usize {
        lock(&self.state).opened
    }

    pub fn log(&self) -> Vec<String> {
        lock(&self.state).log.clone()
    }
}

impl Default for MockCameraBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for MockCameraBackend {
    fn open(&self, device_id: &str) -> Result<Box<dyn CameraDevice>, CameraError> {
        let delay = lock(&self.state).open_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = lock(&self.state);
        if state.fail_open {
            state.log.push(format!("open {} failed", device_id));
            return Err(CameraError::InitializationError(format!(
                "Camera {} is in use",
                device_id
            )));
        }
        state.live += 1;
        state.opened += 1;
        state.log.push(format!("open {}", device_id));
        let size = state.preview_sizes.first().copied().unwrap_or(Resolution::new(320, 240));

        Ok(Box::new(MockCamera {
            device_id: device_id.to_string(),
            state: self.state.clone(),
            size,
            previewing: false,
            released: false,
            frame_number: 0,
        }))
    }
}

struct MockCamera {
    device_id: String,
    state: Arc<Mutex<CameraState>>,
    size: Resolution,
    previewing: bool,
    released: bool,
    frame_number: u64,
}

impl MockCamera {
    fn check_open(&self) -> Result<(), CameraError> {
        if self.released {
            Err(CameraError::CaptureError(format!("Camera {} was released", self.device_id)))
        } else {
            Ok(())
        }
    }

    fn record(&self, entry: String) {
        lock(&self.state).log.push(entry);
    }
}

impl CameraDevice for MockCamera {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn supported_preview_sizes(&mut self) -> Result<Vec<Resolution>, CameraError> {
        self.check_open()?;
        Ok(lock(&self.state).preview_sizes.clone())
    }

    fn supported_video_sizes(&mut self) -> Result<Vec<Resolution>, CameraError> {
        self.check_open()?;
        Ok(lock(&self.state).video_sizes.clone())
    }

    fn set_preview_size(&mut self, size: Resolution) -> Result<(), CameraError> {
        self.check_open()?;
        self.size = size;
        self.record(format!("set_preview_size {}", size));
        Ok(())
    }

    fn start_preview(&mut self, target: &PreviewTarget) -> Result<(), CameraError> {
        self.check_open()?;
        self.previewing = true;
        self.record(format!("start_preview {:?} {}", target.mode, target.size));
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), CameraError> {
        self.check_open()?;
        self.previewing = false;
        self.record("stop_preview".to_string());
        Ok(())
    }

    fn is_previewing(&self) -> bool {
        self.previewing
    }

    fn capture_frame(&mut self) -> Result<CameraFrame, CameraError> {
        self.check_open()?;
        if lock(&self.state).fail_capture {
            return Err(CameraError::CaptureError("scripted capture failure".to_string()));
        }
        self.frame_number += 1;
        let mut frame = synthetic_video_frame(self.frame_number, self.size.width, self.size.height);
        frame.device_id = self.device_id.clone();
        Ok(frame)
    }

    fn preview_frame(&mut self) -> Result<Option<CameraFrame>, CameraError> {
        self.check_open()?;
        if !self.previewing {
            return Ok(None);
        }
        self.capture_frame().map(Some)
    }

    fn unlock(&mut self) -> Result<(), CameraError> {
        self.check_open()?;
        self.record("unlock".to_string());
        Ok(())
    }

    fn lock(&mut self) -> Result<(), CameraError> {
        self.check_open()?;
        self.record("lock".to_string());
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.previewing = false;
        let mut state = lock(&self.state);
        state.live = state.live.saturating_sub(1);
        state.log.push(format!("release {}", self.device_id));
    }
}

// ── Recorder ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecorderShared {
    live: usize,
    created: usize,
    fail_prepare: bool,
    fail_stop: bool,
    last_settings: Option<RecorderSettings>,
    log: Vec<String>,
}

/// Recorder factory whose recorders write a placeholder file and never encode
#[derive(Clone, Default)]
pub struct MockRecorderFactory {
    shared: Arc<Mutex<RecorderShared>>,
}

impl MockRecorderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// `prepare` creates the output file, then fails with an I/O error
    pub fn fail_prepare(&self, fail: bool) {
        lock(&self.shared).fail_prepare = fail;
    }

    /// `stop` fails, leaving the output file behind
    pub fn fail_stop(&self, fail: bool) {
        lock(&self.shared).fail_stop = fail;
    }

    /// Recorders created and not yet released
    pub fn live_recorders(&self) -> usize {
        lock(&self.shared).live
    }

    pub fn created_count(&self) -> usize {
        lock(&self.shared).created
    }

    pub fn last_settings(&self) -> Option<RecorderSettings> {
        lock(&self.shared).last_settings.clone()
    }

    pub fn log(&self) -> Vec<String> {
        lock(&self.shared).log.clone()
    }
}

impl RecorderFactory for MockRecorderFactory {
    fn create(&self) -> Box<dyn MediaRecorder> {
        let mut shared = lock(&self.shared);
        shared.live += 1;
        shared.created += 1;
        shared.log.push("create".to_string());
        Box::new(MockRecorder {
            state: RecorderState::Initial,
            shared: self.shared.clone(),
            device: None,
            settings: None,
        })
    }
}

struct MockRecorder {
    state: RecorderState,
    shared: Arc<Mutex<RecorderShared>>,
    device: Option<SharedDevice>,
    settings: Option<RecorderSettings>,
}

impl MockRecorder {
    fn record(&self, entry: &str) {
        lock(&self.shared).log.push(entry.to_string());
    }
}

impl MediaRecorder for MockRecorder {
    fn state(&self) -> RecorderState {
        self.state
    }

    fn set_camera(&mut self, device: SharedDevice) -> Result<(), CameraError> {
        self.state.require(RecorderState::Initial, "set_camera")?;
        self.device = Some(device);
        self.record("set_camera");
        Ok(())
    }

    fn configure(&mut self, settings: RecorderSettings) -> Result<(), CameraError> {
        self.state.require(RecorderState::Initial, "configure")?;
        lock(&self.shared).last_settings = Some(settings.clone());
        self.settings = Some(settings);
        self.record("configure");
        Ok(())
    }

    fn prepare(&mut self) -> Result<(), CameraError> {
        self.state.require(RecorderState::Initial, "prepare")?;
        if self.device.is_none() {
            return Err(CameraError::IllegalState("prepare called without a camera".to_string()));
        }
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| CameraError::IllegalState("prepare called before configure".to_string()))?;
        settings.validate()?;

        if let Some(path) = &settings.output_path {
            std::fs::write(path, b"mock")?;
        }
        if lock(&self.shared).fail_prepare {
            self.record("prepare failed");
            return Err(CameraError::IoError("scripted prepare failure".to_string()));
        }
        self.state = RecorderState::Prepared;
        self.record("prepare");
        Ok(())
    }

    fn start(&mut self) -> Result<(), CameraError> {
        self.state.require(RecorderState::Prepared, "start")?;
        if let Some(device) = &self.device {
            lock_device(device).capture_frame()?;
        }
        self.state = RecorderState::Recording;
        self.record("start");
        Ok(())
    }

    fn stop(&mut self) -> Result<RecordingStats, CameraError> {
        self.state.require(RecorderState::Recording, "stop")?;
        self.state = RecorderState::Stopped;
        if lock(&self.shared).fail_stop {
            self.record("stop failed");
            return Err(CameraError::StopFailed("scripted stop failure".to_string()));
        }
        self.record("stop");
        Ok(RecordingStats {
            video_frames: 1,
            audio_frames: 0,
            dropped_frames: 0,
            duration_secs: 0.1,
            bytes_written: 4,
            reached_max_duration: false,
            output_path: self
                .settings
                .as_ref()
                .and_then(|s| s.output_path.as_ref())
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default(),
        })
    }

    fn release(&mut self) {
        if self.state == RecorderState::Released {
            return;
        }
        self.state = RecorderState::Released;
        self.device = None;
        let mut shared = lock(&self.shared);
        shared.live = shared.live.saturating_sub(1);
        shared.log.push("release".to_string());
    }
}

// ── Permissions ─────────────────────────────────────────────────────────────

/// Permission provider with statuses set by the test
#[derive(Default)]
pub struct ScriptedPermissions {
    statuses: Mutex<HashMap<Permission, PermissionStatus>>,
    requests: Mutex<Vec<Vec<Permission>>>,
}

impl ScriptedPermissions {
    /// Nothing granted yet
    pub fn new() -> Self {
        Self::default()
    }

    pub fn granted() -> Self {
        let provider = Self::new();
        provider.grant_all();
        provider
    }

    pub fn set(&self, permission: Permission, status: PermissionStatus) {
        lock(&self.statuses).insert(permission, status);
    }

    pub fn grant_all(&self) {
        for p in REQUIRED_PERMISSIONS {
            self.set(p, PermissionStatus::Granted);
        }
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn last_request(&self) -> Option<Vec<Permission>> {
        lock(&self.requests).last().cloned()
    }
}

impl PermissionProvider for ScriptedPermissions {
    fn check(&self, permission: Permission) -> PermissionInfo {
        let status = lock(&self.statuses)
            .get(&permission)
            .copied()
            .unwrap_or(PermissionStatus::NotDetermined);
        PermissionInfo {
            permission,
            status,
            message: format!("{} {}", permission, status),
            can_request: status != PermissionStatus::Restricted,
        }
    }

    fn request(&self, permissions: &[Permission]) {
        lock(&self.requests).push(permissions.to_vec());
    }
}
