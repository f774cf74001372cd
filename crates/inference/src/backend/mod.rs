use schema::{TensorBuffer, TensorError};
use thiserror::Error;

#[cfg(feature = "ort-backend")]
pub mod ort;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Forward pass failed: {0}")]
    Forward(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Engine has been released")]
    Released,

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

/// A loaded model. Callers guarantee a single `forward` at a time.
pub trait InferenceEngine: Send + 'static {
    fn load_model(path: &str) -> Result<Self, InferenceError>
    where
        Self: Sized;

    /// Run the model on the given input tensors, returning its output tensors
    /// in the model's declared output order.
    fn forward(&mut self, inputs: Vec<TensorBuffer>) -> Result<Vec<TensorBuffer>, InferenceError>;

    /// Release native resources. Must be idempotent; `forward` afterwards
    /// returns [`InferenceError::Released`].
    fn dispose(&mut self) -> Result<(), InferenceError> {
        Ok(())
    }
}
