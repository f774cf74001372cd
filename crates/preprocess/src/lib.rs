pub mod classification;
pub mod config;
pub mod decode;
pub mod letterbox;
pub mod normalize;

use schema::{LetterboxTransform, TensorBuffer, TensorError};
use thiserror::Error;

pub use classification::ClassificationPreProcessor;
pub use config::{
    ColorOrder, DEFAULT_INPUT_SIZE, LETTERBOX_COLOR, Normalization, PreprocessConfig, ResizeMode,
};
pub use decode::{DecodedImage, decode_rgb};
pub use letterbox::LetterboxPreProcessor;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Empty frame")]
    EmptyInput,

    #[error("Failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Buffer size mismatch: expected {expected}, got {actual} bytes")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Resize failed: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),

    #[error("Image buffer error: {0}")]
    ImageBuffer(#[from] fast_image_resize::ImageBufferError),

    #[error("Tensor packing failed: {0}")]
    Tensor(#[from] TensorError),
}

/// Result of preprocessing: input tensors plus, for letterboxed inputs, the
/// transform needed to map results back to the source image.
#[derive(Debug)]
pub struct PreprocessResult {
    pub tensors: Vec<TensorBuffer>,
    pub transform: Option<LetterboxTransform>,
    /// Size of the decoded source image.
    pub source_size: (u32, u32),
}

/// Trait for image preprocessing implementations
pub trait Preprocess: Send {
    /// Decode an encoded frame (JPEG, PNG) and preprocess it for inference.
    fn preprocess(&mut self, encoded: &[u8]) -> Result<PreprocessResult, PreprocessError> {
        let image = decode_rgb(encoded)?;
        self.preprocess_rgb(&image.pixels, image.width, image.height)
    }

    /// Preprocess already decoded pixels.
    ///
    /// # Arguments
    /// * `pixels` - RGB pixel data in HWC format
    /// * `width` - Image width
    /// * `height` - Image height
    fn preprocess_rgb(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<PreprocessResult, PreprocessError>;

    /// Get the input size this preprocessor targets
    fn input_size(&self) -> (u32, u32);
}

/// Reject pixel buffers whose length does not match `width * height * 3`.
pub(crate) fn check_rgb_buffer(pixels: &[u8], width: u32, height: u32) -> Result<(), PreprocessError> {
    if width == 0 || height == 0 {
        return Err(PreprocessError::InvalidDimensions { width, height });
    }

    let expected = width as usize * height as usize * 3;
    if pixels.len() != expected {
        return Err(PreprocessError::SizeMismatch {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}
