pub mod config;
#[cfg(feature = "v4l")]
pub mod device;
pub mod pacing;
pub mod replay;
pub mod slot;
pub mod source;

use thiserror::Error;

pub use config::{CaptureConfig, SourceKind, open_source};
#[cfg(feature = "v4l")]
pub use device::V4lSource;
pub use pacing::CapturePacing;
pub use replay::ReplaySource;
pub use slot::{FrameReceiver, FrameSender, frame_channel};
pub use source::CameraSource;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture already running")]
    AlreadyRunning,

    #[error("Capture source has been disposed")]
    Disposed,

    #[error("Capture I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Classify an I/O failure while opening `what`.
    pub(crate) fn from_open(what: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                CaptureError::PermissionDenied(format!("{what}: {err}"))
            }
            std::io::ErrorKind::NotFound => {
                CaptureError::DeviceUnavailable(format!("{what}: {err}"))
            }
            _ => CaptureError::Io(err),
        }
    }
}
