pub mod classification;
pub mod detection;
pub mod layout;
pub mod nms;

use schema::{BoundingBox, ModelOutput, TensorBuffer, TensorError};
use thiserror::Error;

pub use classification::ClassificationPostProcessor;
pub use detection::DetectionPostProcessor;
pub use layout::OutputLayout;
pub use nms::non_max_suppression;

#[derive(Error, Debug)]
pub enum PostprocessError {
    #[error("Model produced no output tensors")]
    MissingOutput,

    #[error("Unexpected output shape: {0}")]
    UnexpectedShape(String),

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

/// Decodes raw model outputs into structured results.
pub trait Postprocess: Send + Sync {
    fn postprocess(&self, outputs: &[TensorBuffer]) -> Result<ModelOutput, PostprocessError>;
}

/// A decoded box before NMS, in normalized letterbox space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_index: usize,
}

/// Split a `[1, a, b]` or `[a, b]` shape into `(a, b)`.
pub(crate) fn matrix_dims(tensor: &TensorBuffer) -> Result<(usize, usize), PostprocessError> {
    match tensor.shape() {
        [1, a, b] | [a, b] => Ok((*a, *b)),
        other => Err(PostprocessError::UnexpectedShape(format!(
            "expected [1, a, b] or [a, b], got {other:?}"
        ))),
    }
}

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
