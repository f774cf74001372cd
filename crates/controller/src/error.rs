use capture::CaptureError;
use inference::{InferenceError, PostprocessError};
use preprocess::PreprocessError;
use serde::Serialize;
use thiserror::Error;

/// Stable classification of pipeline failures, used for metric labels and
/// failure events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Capture,
    Preprocessing,
    Inference,
    Postprocessing,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Capture => "capture",
            ErrorKind::Preprocessing => "preprocessing",
            ErrorKind::Inference => "inference",
            ErrorKind::Postprocessing => "postprocessing",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Preprocessing failed: {0}")]
    Preprocessing(#[from] PreprocessError),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Postprocessing failed: {0}")]
    Postprocessing(#[from] PostprocessError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A stage worker panicked or was cancelled.
    #[error("{kind} stage aborted: {reason}")]
    Aborted { kind: ErrorKind, reason: String },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Capture(_) => ErrorKind::Capture,
            PipelineError::Preprocessing(_) => ErrorKind::Preprocessing,
            PipelineError::Inference(_) => ErrorKind::Inference,
            PipelineError::Postprocessing(_) => ErrorKind::Postprocessing,
            PipelineError::Configuration(_) => ErrorKind::Configuration,
            PipelineError::Aborted { kind, .. } => *kind,
        }
    }

    /// Per-frame failures that the next frame may not hit. Capture and
    /// configuration failures end the session.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Inference(InferenceError::Released) => false,
            PipelineError::Preprocessing(_)
            | PipelineError::Inference(_)
            | PipelineError::Postprocessing(_) => true,
            PipelineError::Aborted { .. } => true,
            PipelineError::Capture(_) | PipelineError::Configuration(_) => false,
        }
    }
}
