//! clipcam: tap-to-record camera capture for Tauri applications
//!
//! A single controller previews a camera, records short clips through a
//! media recorder and writes them to local storage, after checking the
//! permissions a recording needs.
//!
//! # Features
//! - Permission-gated start/stop from one button
//! - Best-fit recording size for the preview surface
//! - 10 second MP4 clips with an orientation hint
//! - Opus audio track from the default microphone (`audio` feature)
//! - RAII device and recorder handles, released on pause
//!
//! # Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! clipcam = { version = "0.1", features = ["recording"] }
//! tauri = { version = "2.0", features = ["protocol-asset"] }
//! ```
//!
//! Then in your Tauri app:
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(clipcam::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
#[cfg(feature = "audio")]
pub mod audio;
#[cfg(feature = "recording")]
pub mod commands;
pub mod config;
pub mod controller;
pub mod errors;
pub mod permissions;
pub mod platform;
pub mod preview;
pub mod quality;
pub mod recording;
pub mod resolution;
pub mod storage;
pub mod types;

// Mock backends and synthetic frames for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::ClipCamConfig;
pub use controller::{CaptureStatus, RecordingController, UiEvent};
pub use errors::CameraError;
pub use resolution::select_video_size;
pub use types::{ButtonLabel, CameraFrame, CaptureState, PreviewMode, Resolution};

#[cfg(feature = "recording")]
use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the clipcam plugin with all commands
#[cfg(feature = "recording")]
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("clipcam")
        .invoke_handler(tauri::generate_handler![
            // Host lifecycle and button
            commands::capture::resume_capture,
            commands::capture::pause_capture,
            commands::capture::capture_action,
            commands::capture::submit_permission_results,
            commands::capture::set_preview_surface,
            commands::capture::clear_preview_surface,
            commands::capture::get_capture_status,
            commands::capture::poll_ui_event,
            commands::capture::get_preview_frame,
            // Permissions
            commands::permissions::check_capture_permissions,
            // Configuration
            commands::config::get_config,
            commands::config::update_config,
        ])
        .build()
}

/// Initialize logging for the capture system
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "clipcam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        recording: cfg!(feature = "recording"),
        audio: cfg!(feature = "audio"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Whether the MP4 recorder is compiled in
    pub recording: bool,
    /// Whether clips can carry an audio track
    pub audio: bool,
}
