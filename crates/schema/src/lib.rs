//! Data model shared by every stage of the pipeline.

pub mod detection;
pub mod frame;
pub mod letterbox;
pub mod tensor;
pub mod timing;

pub use detection::{BoundingBox, Classification, Detection, ModelOutput};
pub use frame::Frame;
pub use letterbox::LetterboxTransform;
pub use tensor::{ElementType, MAX_TENSOR_DIMS, TensorBuffer, TensorError};
pub use timing::TimingSample;
