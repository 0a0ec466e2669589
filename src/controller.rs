//! Recording controller
//!
//! Owns the device and recorder handles and turns button taps into
//! start/stop. Starting runs on a background task so the host's UI thread
//! never blocks on opening the camera or preparing the recorder; the button
//! is disabled until that task posts its result.
//!
//! Every `on_pause` bumps a session generation. A start task that finishes
//! under a stale generation discards its clip. Its camera is released, or
//! becomes the preview device if the host resumed in the meantime. Until
//! that task settles `on_resume` opens nothing, so at most one camera is
//! ever held.

use crate::config::ClipCamConfig;
use crate::errors::CameraError;
use crate::permissions::{missing_permissions, Permission, PermissionProvider, PermissionStatus, REQUIRED_PERMISSIONS};
use crate::platform::{CameraBackend, DeviceGuard, PreviewTarget};
use crate::preview::PreviewAdapter;
use crate::quality::CamcorderProfile;
use crate::recording::{RecorderFactory, RecorderGuard, RecorderSettings, RecorderState};
use crate::resolution::select_video_size;
use crate::storage::OutputFile;
use crate::types::{ButtonLabel, CameraFrame, CaptureState, Resolution};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

const PERMISSION_TOAST: &str = "Camera, microphone and storage permissions are all required";

/// UI update posted to the host's main thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum UiEvent {
    Label(ButtonLabel),
    Enabled(bool),
    Toast(String),
}

/// Snapshot of the controller for hosts that poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub state: CaptureState,
    pub is_recording: bool,
    pub button_label: ButtonLabel,
    pub button_enabled: bool,
    pub has_device: bool,
    pub has_recorder: bool,
    pub last_output: Option<String>,
}

/// Handles of a recorder that is prepared against an open device
struct Armed {
    device: DeviceGuard,
    recorder: RecorderGuard,
    output: OutputFile,
}

impl Armed {
    /// Throw away a clip nobody is waiting for and keep only the camera
    fn discard_clip(self) -> DeviceGuard {
        let Armed {
            device,
            mut recorder,
            output,
        } = self;
        if recorder.state() == RecorderState::Recording {
            if let Err(e) = recorder.stop() {
                log::debug!("Stop of abandoned recording failed: {}", e);
            }
        }
        recorder.release();
        output.discard();
        reclaim(&device);
        device
    }
}

struct Session {
    state: CaptureState,
    active: bool,
    label: ButtonLabel,
    enabled: bool,
    device: Option<DeviceGuard>,
    recorder: Option<RecorderGuard>,
    output: Option<OutputFile>,
    preview: PreviewAdapter,
    last_output: Option<PathBuf>,
    in_flight: usize,
}

impl Session {
    /// State to fall back to when nothing is recording
    fn resting_state(&self) -> CaptureState {
        if self.active {
            CaptureState::PreviewOnly
        } else {
            CaptureState::Idle
        }
    }
}

struct Inner {
    permissions: Arc<dyn PermissionProvider>,
    cameras: Arc<dyn CameraBackend>,
    recorders: Arc<dyn RecorderFactory>,
    config: Mutex<ClipCamConfig>,
    events: UnboundedSender<UiEvent>,
    generation: AtomicU64,
    session: Mutex<Session>,
    settled: Condvar,
}

/// Tap-to-record controller. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct RecordingController {
    inner: Arc<Inner>,
}

impl RecordingController {
    pub fn new(
        permissions: Arc<dyn PermissionProvider>,
        cameras: Arc<dyn CameraBackend>,
        recorders: Arc<dyn RecorderFactory>,
        config: ClipCamConfig,
    ) -> (Self, UnboundedReceiver<UiEvent>) {
        let (events, receiver) = unbounded_channel();
        let preview = PreviewAdapter::new(config.camera.preview_mode, config.camera.fallback_surface());
        let inner = Inner {
            permissions,
            cameras,
            recorders,
            config: Mutex::new(config),
            events,
            generation: AtomicU64::new(0),
            session: Mutex::new(Session {
                state: CaptureState::Idle,
                active: false,
                label: ButtonLabel::Start,
                enabled: true,
                device: None,
                recorder: None,
                output: None,
                preview,
                last_output: None,
                in_flight: 0,
            }),
            settled: Condvar::new(),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            receiver,
        )
    }

    /// Controller on the local machine's camera, recording to MP4
    #[cfg(feature = "recording")]
    pub fn with_system_backends(config: ClipCamConfig) -> (Self, UnboundedReceiver<UiEvent>) {
        let permissions = crate::permissions::SystemPermissions::new(&config.storage.output_directory);
        Self::new(
            Arc::new(permissions),
            Arc::new(crate::platform::NativeCameraBackend),
            Arc::new(crate::recording::Mp4RecorderFactory),
            config,
        )
    }

    // ── Host lifecycle ──────────────────────────────────────────────────────

    /// Host became visible: open the camera for preview if allowed
    pub fn on_resume(&self) {
        let mut session = self.inner.lock_session();
        session.active = true;
        if !missing_permissions(self.inner.permissions.as_ref()).is_empty() {
            log::info!("Permissions missing; preview waits for a grant");
            return;
        }
        if session.state == CaptureState::Idle {
            session.state = CaptureState::PreviewOnly;
        }
        if session.in_flight > 0 {
            // the start task holds the camera; its commit hands it to preview
            log::debug!("Start task still running; preview waits for it");
            let label = session.label;
            self.inner.set_button(&mut session, label, false);
            return;
        }
        if session.device.is_none() {
            self.inner.open_preview(&mut session, None);
        }
    }

    /// Host is going away: release both handles, cancel any pending start
    pub fn on_pause(&self) {
        let mut session = self.inner.lock_session();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Pausing controller, generation {}", generation);

        let was_recording = session.state == CaptureState::Recording;
        if let Some(mut recorder) = session.recorder.take() {
            let stopped = if recorder.state() == RecorderState::Recording {
                recorder.stop().map(|_| ())
            } else {
                Ok(())
            };
            recorder.release();
            match (session.output.take(), stopped) {
                (Some(output), Ok(())) if was_recording => session.last_output = Some(output.into_path()),
                (Some(output), Ok(())) => output.discard(),
                (Some(output), Err(e)) => {
                    log::warn!("Recorder failed to stop on pause: {}", e);
                    output.discard();
                }
                (None, _) => {}
            }
        }
        if let Some(device) = session.device.take() {
            device.release();
        }

        session.active = false;
        session.state = CaptureState::Idle;
        self.inner.set_button(&mut session, ButtonLabel::Start, true);
        self.inner.settled.notify_all();
    }

    pub fn on_permissions_result(&self, results: &[(Permission, PermissionStatus)]) {
        let granted = REQUIRED_PERMISSIONS.iter().all(|required| {
            results
                .iter()
                .any(|(p, status)| p == required && *status == PermissionStatus::Granted)
        });

        {
            let mut session = self.inner.lock_session();
            if session.state == CaptureState::PermissionPending {
                session.state = session.resting_state();
            }
        }

        if granted {
            log::info!("All permissions granted");
            self.start_capture();
        } else {
            log::info!("Permission request denied: {:?}", results);
            self.inner.emit(UiEvent::Toast(PERMISSION_TOAST.to_string()));
        }
    }

    // ── Surface callbacks ───────────────────────────────────────────────────

    pub fn surface_created(&self, size: Resolution) {
        self.with_preview(|preview, device| preview.surface_created(size, device));
    }

    pub fn surface_changed(&self, size: Resolution) {
        self.with_preview(|preview, device| preview.surface_changed(size, device));
    }

    pub fn surface_destroyed(&self) {
        self.with_preview(|preview, device| preview.surface_destroyed(device));
    }

    fn with_preview(
        &self,
        f: impl FnOnce(&mut PreviewAdapter, Option<&mut dyn crate::platform::CameraDevice>) -> Result<(), CameraError>,
    ) {
        let mut session = self.inner.lock_session();
        let Session { preview, device, .. } = &mut *session;
        let result = match device {
            Some(device) => device.with(|d| f(preview, Some(d))),
            None => f(preview, None),
        };
        if let Err(e) = result {
            log::warn!("Preview surface update failed: {}", e);
        }
    }

    /// Newest preview frame for the host to draw
    pub fn preview_frame(&self) -> Option<CameraFrame> {
        let session = self.inner.lock_session();
        let device = session.device.as_ref()?;
        match device.with(|d| session.preview.frame(d)) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("No preview frame: {}", e);
                None
            }
        }
    }

    // ── Capture ─────────────────────────────────────────────────────────────

    /// Button tap
    pub fn capture_action(&self) {
        let missing = missing_permissions(self.inner.permissions.as_ref());
        if missing.is_empty() {
            self.start_capture();
            return;
        }

        log::info!("Requesting permissions: {:?}", missing);
        {
            let mut session = self.inner.lock_session();
            if session.state != CaptureState::Starting && session.state != CaptureState::Recording {
                session.state = CaptureState::PermissionPending;
            }
        }
        self.inner.permissions.request(&REQUIRED_PERMISSIONS);
        self.inner.emit(UiEvent::Toast(PERMISSION_TOAST.to_string()));
    }

    /// Stop if recording, otherwise start on a background task and return
    pub fn start_capture(&self) {
        let mut session = self.inner.lock_session();
        match session.state {
            CaptureState::Starting => {
                log::debug!("Start already in progress; tap ignored");
            }
            CaptureState::Recording => self.inner.stop_recording(&mut session),
            _ if session.in_flight > 0 => {
                log::debug!("Cancelled start still settling; tap ignored");
            }
            _ => self.spawn_start(&mut session),
        }
    }

    fn spawn_start(&self, session: &mut Session) {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        session.state = CaptureState::Starting;
        session.in_flight += 1;
        let label = session.label;
        self.inner.set_button(session, label, false);

        let pending = Pending {
            generation,
            device: session.device.take(),
            recorder: session.recorder.take(),
            output: session.output.take(),
            target: PreviewTarget {
                mode: session.preview.mode(),
                size: session.preview.target_size(),
            },
        };

        let inner = self.inner.clone();
        let spawned = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || inner.run_start(pending));
                Ok(())
            }
            Err(_) => std::thread::Builder::new()
                .name("clipcam-start".to_string())
                .spawn(move || inner.run_start(pending))
                .map(|_| ()),
        };

        if let Err(e) = spawned {
            // The closure and everything it owned are gone with the failed spawn
            log::error!("Failed to spawn start task: {}", e);
            session.in_flight -= 1;
            session.state = session.resting_state();
            self.inner.set_button(session, ButtonLabel::Start, true);
        }
    }

    /// Prepare a recorder against the camera without starting it.
    ///
    /// Returns `false` when the output file cannot be created or the recorder
    /// rejects its configuration; the recorder is released in both cases.
    /// Also `false` while paused or while a start task is running.
    pub fn prepare_video_recorder(&self) -> bool {
        let mut session = self.inner.lock_session();
        if !session.active {
            log::debug!("prepare_video_recorder ignored while paused");
            return false;
        }
        if session.in_flight > 0 || matches!(session.state, CaptureState::Starting | CaptureState::Recording) {
            log::debug!("prepare_video_recorder ignored while {}", session.state);
            return false;
        }
        if session.recorder.is_some() {
            return true;
        }
        let target = PreviewTarget {
            mode: session.preview.mode(),
            size: session.preview.target_size(),
        };
        match self.inner.arm(session.device.take(), target) {
            Ok(armed) => {
                session.device = Some(armed.device);
                session.recorder = Some(armed.recorder);
                session.output = Some(armed.output);
                true
            }
            Err(device) => {
                session.device = device;
                false
            }
        }
    }

    /// Block until no start task is in flight, or `timeout` passes
    pub fn wait_for_settled(&self, timeout: Duration) -> bool {
        let session = self.inner.lock_session();
        let (_session, result) = self
            .inner
            .settled
            .wait_timeout_while(session, timeout, |s| s.in_flight > 0)
            .unwrap_or_else(PoisonError::into_inner);
        !result.timed_out()
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> CaptureState {
        self.inner.lock_session().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == CaptureState::Recording
    }

    pub fn has_device(&self) -> bool {
        self.inner.lock_session().device.is_some()
    }

    pub fn has_recorder(&self) -> bool {
        self.inner.lock_session().recorder.is_some()
    }

    pub fn status(&self) -> CaptureStatus {
        let session = self.inner.lock_session();
        CaptureStatus {
            state: session.state,
            is_recording: session.state == CaptureState::Recording,
            button_label: session.label,
            button_enabled: session.enabled,
            has_device: session.device.is_some(),
            has_recorder: session.recorder.is_some(),
            last_output: session
                .last_output
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// Path of the last clip that finished cleanly
    pub fn last_output(&self) -> Option<PathBuf> {
        self.inner.lock_session().last_output.clone()
    }

    pub fn config(&self) -> ClipCamConfig {
        self.inner.config()
    }

    /// Replace the configuration; takes effect on the next start
    pub fn set_config(&self, config: ClipCamConfig) -> Result<(), CameraError> {
        config.validate().map_err(CameraError::ConfigurationError)?;
        *self.inner.config.lock().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }
}

/// What a start task takes with it off the UI thread
struct Pending {
    generation: u64,
    device: Option<DeviceGuard>,
    recorder: Option<RecorderGuard>,
    output: Option<OutputFile>,
    target: PreviewTarget,
}

impl Inner {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn config(&self) -> ClipCamConfig {
        self.config.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn emit(&self, event: UiEvent) {
        if let Err(e) = self.events.send(event) {
            log::trace!("UI event dropped, no receiver: {:?}", e.0);
        }
    }

    fn set_button(&self, session: &mut Session, label: ButtonLabel, enabled: bool) {
        if session.label != label {
            session.label = label;
            self.emit(UiEvent::Label(label));
        }
        if session.enabled != enabled {
            session.enabled = enabled;
            self.emit(UiEvent::Enabled(enabled));
        }
    }

    /// Hold `device` (or a freshly opened camera) as the preview device
    fn open_preview(&self, session: &mut Session, device: Option<DeviceGuard>) {
        let device = match device {
            Some(device) => device,
            None => {
                let device_id = self.config().camera.device_id;
                match DeviceGuard::open(self.cameras.as_ref(), &device_id) {
                    Ok(device) => device,
                    Err(e) => {
                        log::error!("Failed to open camera {} for preview: {}", device_id, e);
                        return;
                    }
                }
            }
        };
        if let Err(e) = device.with(|d| session.preview.attach(d)) {
            log::warn!("Preview failed to start: {}", e);
        }
        session.device = Some(device);
    }

    /// Open (or reuse) the camera, pick a size and prepare a recorder on it
    fn arm(&self, device: Option<DeviceGuard>, target: PreviewTarget) -> Result<Armed, Option<DeviceGuard>> {
        let config = self.config();
        let device = match device {
            Some(device) => device,
            None => match DeviceGuard::open(self.cameras.as_ref(), &config.camera.device_id) {
                Ok(device) => device,
                Err(e) => {
                    log::error!("Failed to open camera {}: {}", config.camera.device_id, e);
                    return Err(None);
                }
            },
        };

        let selected = device.with(|d| {
            let video = d.supported_video_sizes()?;
            let preview = d.supported_preview_sizes()?;
            Ok::<_, CameraError>(select_video_size(&video, &preview, target.size.width, target.size.height))
        });
        let size = match selected {
            Ok(Some(size)) => size,
            Ok(None) => {
                log::error!("Camera {} reports no usable sizes", device.device_id());
                return Err(Some(device));
            }
            Err(e) => {
                log::error!("Failed to query camera sizes: {}", e);
                return Err(Some(device));
            }
        };
        log::info!("Selected {} for a {} surface", size, target.size);

        let profile = CamcorderProfile::get(config.recording.quality).with_resolution(size);

        let bound = device.with(|d| {
            if d.is_previewing() {
                d.stop_preview()?;
            }
            d.set_preview_size(size)?;
            d.start_preview(&target)?;
            d.unlock()
        });
        if let Err(e) = bound {
            log::warn!("Failed to bind preview surface: {}", e);
            reclaim(&device);
            return Err(Some(device));
        }

        let mut recorder = RecorderGuard::new(self.recorders.create());

        let output = match OutputFile::create(
            Path::new(&config.storage.output_directory),
            &config.storage.file_prefix,
            profile.container.extension(),
        ) {
            Ok(output) => output,
            Err(e) => {
                log::error!("No output file: {}", e);
                recorder.release();
                reclaim(&device);
                return Err(Some(device));
            }
        };

        let settings = RecorderSettings::from_config(&config.recording, profile).with_output_path(output.path());
        let prepared = recorder
            .set_camera(device.shared())
            .and_then(|_| recorder.configure(settings))
            .and_then(|_| recorder.prepare());
        if let Err(e) = prepared {
            if e.is_prepare_failure() {
                log::warn!("Recorder prepare failed: {}", e);
            } else {
                log::error!("Recorder setup failed: {}", e);
            }
            recorder.release();
            output.discard();
            reclaim(&device);
            return Err(Some(device));
        }

        Ok(Armed {
            device,
            recorder,
            output,
        })
    }

    /// Body of the background start task
    fn run_start(&self, pending: Pending) {
        let Pending {
            generation,
            device,
            recorder,
            output,
            target,
        } = pending;

        let armed = match (device, recorder, output) {
            (Some(device), Some(recorder), Some(output)) => Ok(Armed {
                device,
                recorder,
                output,
            }),
            (device, recorder, output) => {
                if let Some(recorder) = recorder {
                    recorder.release();
                }
                if let Some(output) = output {
                    output.discard();
                }
                self.arm(device, target)
            }
        };

        let started = armed.and_then(|mut armed| match armed.recorder.start() {
            Ok(()) => Ok(armed),
            Err(e) => {
                log::error!("Recorder failed to start: {}", e);
                let Armed {
                    device,
                    recorder,
                    output,
                } = armed;
                recorder.release();
                output.discard();
                reclaim(&device);
                Err(Some(device))
            }
        });

        let mut session = self.lock_session();
        session.in_flight = session.in_flight.saturating_sub(1);

        if self.generation.load(Ordering::SeqCst) != generation {
            let device = match started {
                Ok(armed) => Some(armed.discard_clip()),
                Err(device) => device,
            };
            if session.active {
                // resumed while this task ran; its camera becomes the preview device
                log::info!("Start finished after pause and resume; clip discarded");
                if session.device.is_none() {
                    self.open_preview(&mut session, device);
                } else if let Some(device) = device {
                    device.release();
                }
                self.set_button(&mut session, ButtonLabel::Start, true);
            } else {
                log::info!("Start finished after pause; releasing its handles");
                if let Some(device) = device {
                    device.release();
                }
            }
            self.settled.notify_all();
            return;
        }

        match started {
            Ok(armed) => {
                log::info!("Recording to {}", armed.output.path().display());
                session.device = Some(armed.device);
                session.recorder = Some(armed.recorder);
                session.output = Some(armed.output);
                session.state = CaptureState::Recording;
                self.set_button(&mut session, ButtonLabel::Stop, true);
            }
            Err(device) => {
                session.device = device;
                session.state = session.resting_state();
                self.set_button(&mut session, ButtonLabel::Start, true);
            }
        }
        self.settled.notify_all();
    }

    fn stop_recording(&self, session: &mut Session) {
        if let Some(mut recorder) = session.recorder.take() {
            let stopped = recorder.stop();
            recorder.release();
            match (stopped, session.output.take()) {
                (Ok(stats), Some(output)) => {
                    log::info!(
                        "Saved {} ({} frames, {:.1}s)",
                        output.path().display(),
                        stats.video_frames,
                        stats.duration_secs
                    );
                    session.last_output = Some(output.into_path());
                }
                (Err(e), Some(output)) => {
                    log::warn!("Recorder failed to stop: {}", e);
                    output.discard();
                }
                (_, None) => {}
            }
        }
        if let Some(device) = session.device.take() {
            device.release();
        }
        session.state = session.resting_state();
        self.set_button(session, ButtonLabel::Start, true);
    }
}

/// Take frame delivery back from a recorder that never ran
fn reclaim(device: &DeviceGuard) {
    if let Err(e) = device.with(|d| d.lock()) {
        log::debug!("Camera relock failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCameraBackend, MockRecorderFactory, ScriptedPermissions};

    const SETTLE: Duration = Duration::from_secs(5);

    struct Rig {
        controller: RecordingController,
        events: UnboundedReceiver<UiEvent>,
        cameras: MockCameraBackend,
        recorders: MockRecorderFactory,
        permissions: Arc<ScriptedPermissions>,
        _dir: tempfile::TempDir,
    }

    fn rig(permissions: ScriptedPermissions) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClipCamConfig::default();
        config.storage.output_directory = dir.path().to_string_lossy().to_string();
        let cameras = MockCameraBackend::new();
        let recorders = MockRecorderFactory::new();
        let permissions = Arc::new(permissions);
        let (controller, events) = RecordingController::new(
            permissions.clone(),
            Arc::new(cameras.clone()),
            Arc::new(recorders.clone()),
            config,
        );
        Rig {
            controller,
            events,
            cameras,
            recorders,
            permissions,
            _dir: dir,
        }
    }

    fn drain(events: &mut UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn test_tap_starts_then_stops() {
        let mut rig = rig(ScriptedPermissions::granted());
        rig.controller.on_resume();
        assert!(rig.controller.has_device());

        rig.controller.capture_action();
        assert!(rig.controller.wait_for_settled(SETTLE));
        assert!(rig.controller.is_recording());
        assert_eq!(
            drain(&mut rig.events),
            vec![
                UiEvent::Enabled(false),
                UiEvent::Label(ButtonLabel::Stop),
                UiEvent::Enabled(true)
            ]
        );

        let settings = rig.recorders.last_settings().unwrap();
        assert_eq!(settings.max_duration, Some(Duration::from_secs(10)));
        assert_eq!(settings.orientation_hint, 90);

        rig.controller.capture_action();
        assert!(!rig.controller.is_recording());
        assert!(!rig.controller.has_device());
        assert!(!rig.controller.has_recorder());
        assert_eq!(rig.cameras.live_devices(), 0);
        assert_eq!(rig.recorders.live_recorders(), 0);
        assert_eq!(drain(&mut rig.events), vec![UiEvent::Label(ButtonLabel::Start)]);
        assert!(rig.controller.last_output().unwrap().exists());
    }

    #[test]
    fn test_preview_device_is_reused_for_recording() {
        let rig = rig(ScriptedPermissions::granted());
        rig.controller.on_resume();
        rig.controller.surface_created(Resolution::new(720, 1280));
        rig.controller.capture_action();
        assert!(rig.controller.wait_for_settled(SETTLE));
        assert_eq!(rig.cameras.opened_count(), 1);
        // portrait 9:16 surface matches 16:9 at the nearest area
        assert_eq!(
            rig.recorders.last_settings().unwrap().profile.resolution(),
            Resolution::new(1280, 720)
        );
    }

    #[test]
    fn test_missing_permission_requests_and_toasts() {
        let mut rig = rig(ScriptedPermissions::new());
        rig.controller.capture_action();
        assert_eq!(rig.controller.state(), CaptureState::PermissionPending);
        assert_eq!(rig.permissions.request_count(), 1);
        assert_eq!(rig.permissions.last_request().unwrap(), REQUIRED_PERMISSIONS.to_vec());
        assert!(matches!(drain(&mut rig.events).as_slice(), [UiEvent::Toast(_)]));
        assert_eq!(rig.cameras.opened_count(), 0);
    }

    #[test]
    fn test_permission_grant_starts_capture() {
        let rig = rig(ScriptedPermissions::new());
        rig.controller.capture_action();
        rig.permissions.grant_all();
        let results: Vec<_> = REQUIRED_PERMISSIONS
            .iter()
            .map(|p| (*p, PermissionStatus::Granted))
            .collect();
        rig.controller.on_permissions_result(&results);
        assert!(rig.controller.wait_for_settled(SETTLE));
        assert!(rig.controller.is_recording());
    }

    #[test]
    fn test_partial_grant_toasts_and_stays_idle() {
        let mut rig = rig(ScriptedPermissions::new());
        rig.controller.capture_action();
        drain(&mut rig.events);
        rig.controller.on_permissions_result(&[
            (Permission::WriteStorage, PermissionStatus::Granted),
            (Permission::RecordAudio, PermissionStatus::Denied),
            (Permission::Camera, PermissionStatus::Granted),
        ]);
        assert!(!rig.controller.is_recording());
        assert_eq!(rig.controller.state(), CaptureState::Idle);
        assert!(matches!(drain(&mut rig.events).as_slice(), [UiEvent::Toast(_)]));
    }

    #[test]
    fn test_prepare_failure_releases_recorder_and_output() {
        let mut rig = rig(ScriptedPermissions::granted());
        rig.recorders.fail_prepare(true);
        rig.controller.on_resume();
        rig.controller.capture_action();
        assert!(rig.controller.wait_for_settled(SETTLE));

        assert!(!rig.controller.is_recording());
        assert_eq!(rig.controller.state(), CaptureState::PreviewOnly);
        assert_eq!(rig.recorders.live_recorders(), 0);
        // preview device kept for the next try
        assert!(rig.controller.has_device());
        assert_eq!(
            drain(&mut rig.events),
            vec![UiEvent::Enabled(false), UiEvent::Enabled(true)]
        );
        assert_eq!(std::fs::read_dir(rig._dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stop_failure_deletes_partial_file() {
        let rig = rig(ScriptedPermissions::granted());
        rig.recorders.fail_stop(true);
        rig.controller.capture_action();
        assert!(rig.controller.wait_for_settled(SETTLE));
        assert!(rig.controller.is_recording());

        rig.controller.capture_action();
        assert!(!rig.controller.is_recording());
        assert!(rig.controller.last_output().is_none());
        assert_eq!(std::fs::read_dir(rig._dir.path()).unwrap().count(), 0);
        assert_eq!(rig.cameras.live_devices(), 0);
    }

    #[test]
    fn test_open_failure_resets_button() {
        let mut rig = rig(ScriptedPermissions::granted());
        rig.cameras.fail_open(true);
        rig.controller.capture_action();
        assert!(rig.controller.wait_for_settled(SETTLE));
        assert!(!rig.controller.is_recording());
        assert!(!rig.controller.has_device());
        assert_eq!(
            drain(&mut rig.events),
            vec![UiEvent::Enabled(false), UiEvent::Enabled(true)]
        );
    }

    #[test]
    fn test_prepare_video_recorder_then_tap_starts_prepared() {
        let rig = rig(ScriptedPermissions::granted());
        rig.controller.on_resume();
        assert!(rig.controller.prepare_video_recorder());
        assert!(rig.controller.has_recorder());
        assert_eq!(rig.recorders.created_count(), 1);

        rig.controller.start_capture();
        assert!(rig.controller.wait_for_settled(SETTLE));
        assert!(rig.controller.is_recording());
        assert_eq!(rig.recorders.created_count(), 1);
    }

    #[test]
    fn test_prepare_video_recorder_false_on_bad_directory() {
        let rig = rig(ScriptedPermissions::granted());
        rig.controller.on_resume();
        let blocker = rig._dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let mut config = rig.controller.config();
        config.storage.output_directory = blocker.to_string_lossy().to_string();
        rig.controller.set_config(config).unwrap();

        assert!(!rig.controller.prepare_video_recorder());
        assert!(!rig.controller.has_recorder());
        assert_eq!(rig.recorders.live_recorders(), 0);
    }

    #[test]
    fn test_prepare_video_recorder_refused_while_paused() {
        let rig = rig(ScriptedPermissions::granted());
        assert!(!rig.controller.prepare_video_recorder());

        rig.controller.on_resume();
        rig.controller.on_pause();
        assert!(!rig.controller.prepare_video_recorder());
        assert!(!rig.controller.has_device());
        assert!(!rig.controller.has_recorder());
        // only the resume opened a camera
        assert_eq!(rig.cameras.opened_count(), 1);
        assert_eq!(rig.cameras.live_devices(), 0);
        assert_eq!(rig.recorders.created_count(), 0);
    }

    #[test]
    fn test_prepare_video_recorder_refused_during_start() {
        let rig = rig(ScriptedPermissions::granted());
        // resumed without a camera, so the start task has to open one
        rig.cameras.fail_open(true);
        rig.controller.on_resume();
        rig.cameras.fail_open(false);
        rig.cameras.set_open_delay(Duration::from_millis(200));

        rig.controller.capture_action();
        assert!(!rig.controller.prepare_video_recorder());
        assert!(rig.controller.wait_for_settled(SETTLE));
        assert!(rig.controller.is_recording());
        assert_eq!(rig.recorders.created_count(), 1);
    }

    #[test]
    fn test_stale_start_hands_camera_to_resumed_preview() {
        let mut rig = rig(ScriptedPermissions::granted());
        rig.cameras.set_open_delay(Duration::from_millis(200));
        rig.controller.surface_created(Resolution::new(1280, 720));

        rig.controller.capture_action();
        rig.controller.on_pause();
        rig.controller.on_resume();
        assert!(!rig.controller.status().button_enabled);
        assert!(rig.controller.wait_for_settled(SETTLE));

        assert_eq!(rig.controller.state(), CaptureState::PreviewOnly);
        assert!(rig.controller.has_device());
        assert!(!rig.controller.has_recorder());
        assert!(rig.controller.status().button_enabled);
        assert_eq!(rig.cameras.opened_count(), 1);
        assert_eq!(rig.cameras.live_devices(), 1);
        assert_eq!(rig.recorders.live_recorders(), 0);
        assert!(!drain(&mut rig.events).contains(&UiEvent::Label(ButtonLabel::Stop)));
        assert_eq!(std::fs::read_dir(rig._dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_preview_frames_follow_surface_and_device() {
        let rig = rig(ScriptedPermissions::granted());
        assert!(rig.controller.preview_frame().is_none());

        rig.controller.on_resume();
        // no surface yet
        assert!(rig.controller.preview_frame().is_none());

        rig.controller.surface_created(Resolution::new(1280, 720));
        let frame = rig.controller.preview_frame().expect("frame while previewing");
        assert_eq!(frame.resolution(), Resolution::new(1280, 720));

        // preview keeps running under the recorder
        rig.controller.capture_action();
        assert!(rig.controller.wait_for_settled(SETTLE));
        assert!(rig.controller.preview_frame().is_some());

        rig.controller.on_pause();
        assert!(rig.controller.preview_frame().is_none());
    }

    #[test]
    fn test_set_config_rejects_invalid() {
        let rig = rig(ScriptedPermissions::granted());
        let mut config = rig.controller.config();
        config.recording.orientation_hint = 45;
        assert!(rig.controller.set_config(config).is_err());
        assert_eq!(rig.controller.config().recording.orientation_hint, 90);
    }

    #[tokio::test]
    async fn test_start_runs_on_blocking_pool_inside_runtime() {
        let rig = rig(ScriptedPermissions::granted());
        rig.controller.capture_action();
        let controller = rig.controller.clone();
        let settled = tokio::task::spawn_blocking(move || controller.wait_for_settled(SETTLE))
            .await
            .unwrap();
        assert!(settled);
        assert!(rig.controller.is_recording());
        rig.controller.on_pause();
        assert_eq!(rig.cameras.live_devices(), 0);
    }
}
