use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera initialization error: {0}")]
    InitializationError(String),
    #[error("Permission denied error: {0}")]
    PermissionDenied(String),
    #[error("Capture error: {0}")]
    CaptureError(String),
    #[error("Preview error: {0}")]
    PreviewError(String),
    /// Recorder used out of order (configure after prepare, start before prepare, ...)
    #[error("Illegal recorder state: {0}")]
    IllegalState(String),
    #[error("Recorder configuration error: {0}")]
    ConfigurationError(String),
    #[error("Recorder stop failed: {0}")]
    StopFailed(String),
    #[cfg(feature = "recording")]
    #[error("Encoding error: {0}")]
    EncodingError(String),
    #[cfg(feature = "recording")]
    #[error("Muxing error: {0}")]
    MuxingError(String),
    #[cfg(feature = "audio")]
    #[error("Audio error: {0}")]
    AudioError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl CameraError {
    /// Errors that abort a recorder `prepare` rather than indicating a broken device.
    pub fn is_prepare_failure(&self) -> bool {
        match self {
            CameraError::IllegalState(_) | CameraError::ConfigurationError(_) | CameraError::IoError(_) => true,
            // no usable microphone for the configured audio source
            #[cfg(feature = "audio")]
            CameraError::AudioError(_) => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for CameraError {
    fn from(e: std::io::Error) -> Self {
        CameraError::IoError(e.to_string())
    }
}
