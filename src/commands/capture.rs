use crate::controller::{CaptureStatus, RecordingController, UiEvent};
use crate::permissions::{Permission, PermissionStatus};
use crate::types::{CameraFrame, Resolution};
use std::sync::Arc;
use tauri::command;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{Mutex as AsyncMutex, RwLock};

/// The app's controller plus the receiving end of its UI events
pub(crate) struct ControllerSlot {
    pub(crate) controller: RecordingController,
    events: AsyncMutex<UnboundedReceiver<UiEvent>>,
}

lazy_static::lazy_static! {
    static ref GLOBAL_CONTROLLER: Arc<RwLock<Option<Arc<ControllerSlot>>>> = Arc::new(RwLock::new(None));
}

/// One host-reported permission outcome
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PermissionResult {
    pub permission: Permission,
    pub status: PermissionStatus,
}

pub(crate) async fn get_or_create_controller() -> Result<Arc<ControllerSlot>, String> {
    if let Some(slot) = GLOBAL_CONTROLLER.read().await.as_ref() {
        return Ok(slot.clone());
    }

    let mut guard = GLOBAL_CONTROLLER.write().await;
    if let Some(slot) = guard.as_ref() {
        return Ok(slot.clone());
    }

    let config = super::config::current_config()?;
    log::info!("Creating capture controller for camera {}", config.camera.device_id);
    let (controller, events) = RecordingController::with_system_backends(config);
    let slot = Arc::new(ControllerSlot {
        controller,
        events: AsyncMutex::new(events),
    });
    *guard = Some(slot.clone());
    Ok(slot)
}

/// Controller if one was created, without creating it
pub(crate) async fn existing_controller() -> Option<RecordingController> {
    GLOBAL_CONTROLLER
        .read()
        .await
        .as_ref()
        .map(|slot| slot.controller.clone())
}

/// Run a controller hook off the async executor; hooks may open or close devices
async fn run_hook<F>(hook: F) -> Result<CaptureStatus, String>
where
    F: FnOnce(&RecordingController) + Send + 'static,
{
    let slot = get_or_create_controller().await?;
    tokio::task::spawn_blocking(move || {
        hook(&slot.controller);
        slot.controller.status()
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))
}

/// Host became visible
#[command]
pub async fn resume_capture() -> Result<CaptureStatus, String> {
    log::info!("Resuming capture controller");
    run_hook(|c| c.on_resume()).await
}

/// Host went to the background; releases camera and recorder
#[command]
pub async fn pause_capture() -> Result<CaptureStatus, String> {
    log::info!("Pausing capture controller");
    run_hook(|c| c.on_pause()).await
}

/// The record button was tapped
#[command]
pub async fn capture_action() -> Result<CaptureStatus, String> {
    run_hook(|c| c.capture_action()).await
}

/// Answer to a permission request the controller issued
#[command]
pub async fn submit_permission_results(results: Vec<PermissionResult>) -> Result<CaptureStatus, String> {
    let results: Vec<(Permission, PermissionStatus)> =
        results.into_iter().map(|r| (r.permission, r.status)).collect();
    run_hook(move |c| c.on_permissions_result(&results)).await
}

/// Preview surface was created or resized
#[command]
pub async fn set_preview_surface(width: u32, height: u32) -> Result<CaptureStatus, String> {
    if width == 0 || height == 0 {
        return Err(format!("Invalid surface size {}x{}", width, height));
    }
    let size = Resolution::new(width, height);
    run_hook(move |c| {
        if c.status().has_device {
            c.surface_changed(size);
        } else {
            c.surface_created(size);
        }
    })
    .await
}

/// Preview surface was destroyed
#[command]
pub async fn clear_preview_surface() -> Result<CaptureStatus, String> {
    run_hook(|c| c.surface_destroyed()).await
}

#[command]
pub async fn get_capture_status() -> Result<CaptureStatus, String> {
    let slot = get_or_create_controller().await?;
    Ok(slot.controller.status())
}

/// Next pending UI update (non-blocking)
#[command]
pub async fn poll_ui_event() -> Result<Option<UiEvent>, String> {
    let slot = get_or_create_controller().await?;
    let mut events = slot.events.lock().await;
    Ok(events.try_recv().ok())
}

/// Newest RGB preview frame, or `None` when no preview is running
#[command]
pub async fn get_preview_frame() -> Result<Option<CameraFrame>, String> {
    let slot = get_or_create_controller().await?;
    tokio::task::spawn_blocking(move || slot.controller.preview_frame())
        .await
        .map_err(|e| format!("Task join error: {}", e))
}
