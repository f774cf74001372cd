pub mod backend;
pub mod labels;
pub mod processing;

// Re-export commonly used types for convenience
#[cfg(feature = "ort-backend")]
pub use backend::ort::{ExecutionProvider, OrtBackend};
pub use backend::{InferenceEngine, InferenceError};
pub use labels::Labels;
pub use processing::{
    Candidate, ClassificationPostProcessor, DetectionPostProcessor, OutputLayout, Postprocess,
    PostprocessError, non_max_suppression,
};
