use crate::config::{ColorOrder, DEFAULT_INPUT_SIZE, LETTERBOX_COLOR, PreprocessConfig};
use crate::normalize::pack_chw;
use crate::{Preprocess, PreprocessError, PreprocessResult, check_rgb_buffer};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use schema::LetterboxTransform;

/// Detection-model preprocessor: aspect-preserving resize onto a padded
/// canvas, scaled to [0, 1], packed CHW.
pub struct LetterboxPreProcessor {
    input_size: (u32, u32),
    pad_color: [u8; 3],
    color_order: ColorOrder,
    resizer: Resizer,
    letterboxed_buffer: Vec<u8>,
}

impl LetterboxPreProcessor {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self::with_config(&PreprocessConfig {
            input_size,
            ..PreprocessConfig::default()
        })
    }

    /// Mean/std and resize mode in `config` do not apply to letterboxed inputs.
    pub fn with_config(config: &PreprocessConfig) -> Self {
        let (w, h) = config.input_size;
        Self {
            input_size: config.input_size,
            pad_color: config.pad_color,
            color_order: config.color_order,
            resizer: Resizer::new(),
            letterboxed_buffer: vec![0; (w * h * 3) as usize],
        }
    }

    /// Resize into the internal canvas and return the transform used.
    fn resize_and_letterbox(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<LetterboxTransform, PreprocessError> {
        let _s = span!("resize_and_letterbox");

        let transform = LetterboxTransform::compute((width, height), self.input_size);
        let (new_width, new_height) = transform.scaled_size();
        let offset_x = transform.offset_x as u32;
        let offset_y = transform.offset_y as u32;

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        self.resizer.resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        for px in self.letterboxed_buffer.chunks_exact_mut(3) {
            px.copy_from_slice(&self.pad_color);
        }

        let resized_data = resized.buffer();
        let stride = self.input_size.0 * 3;
        let row_bytes = (new_width * 3) as usize;

        for y in 0..new_height {
            let src_row = (y * new_width * 3) as usize;
            let dst_row = ((y + offset_y) * stride + offset_x * 3) as usize;

            self.letterboxed_buffer[dst_row..dst_row + row_bytes]
                .copy_from_slice(&resized_data[src_row..src_row + row_bytes]);
        }

        Ok(transform)
    }

    /// The padded canvas produced by the last call, RGB HWC.
    pub fn canvas(&self) -> &[u8] {
        &self.letterboxed_buffer
    }
}

impl Default for LetterboxPreProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}

impl Preprocess for LetterboxPreProcessor {
    fn preprocess_rgb(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<PreprocessResult, PreprocessError> {
        let _s = span!("letterbox_preprocess");

        tracing::trace!(
            width,
            height,
            pixel_bytes = pixels.len(),
            "Preprocessing frame dimensions"
        );

        check_rgb_buffer(pixels, width, height)?;

        let transform = self.resize_and_letterbox(pixels, width, height)?;
        let (w, h) = self.input_size;
        let input = pack_chw(&self.letterboxed_buffer, w, h, None, self.color_order)?
            .with_name("images");

        Ok(PreprocessResult {
            tensors: vec![input],
            transform: Some(transform),
            source_size: (width, height),
        })
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::encode_png;

    fn pixel_at(canvas: &[u8], width: u32, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * width + x) * 3) as usize;
        [canvas[i], canvas[i + 1], canvas[i + 2]]
    }

    /// Test letterboxing preserves aspect ratio
    #[test]
    fn test_letterboxing_preserves_aspect_ratio() {
        let pixels = vec![128u8; 1280 * 720 * 3];

        let mut preprocessor = LetterboxPreProcessor::new((640, 640));
        let result = preprocessor.preprocess_rgb(&pixels, 1280, 720).unwrap();
        let transform = result.transform.expect("Detection path yields a transform");

        assert_eq!(transform.scale, 0.5);
        assert_eq!(transform.scaled_size(), (640, 360));
        assert_eq!(transform.offset_x, 0.0, "X offset should be 0 for wide image");
        assert_eq!(transform.offset_y, 140.0, "Y offset should center vertically");

        assert_eq!(result.tensors.len(), 1);
        assert_eq!(result.tensors[0].shape(), &[1, 3, 640, 640]);
    }

    #[test]
    fn padding_uses_pad_color_and_content_is_centered() {
        let pixels = vec![200u8; 64 * 32 * 3];
        let mut preprocessor = LetterboxPreProcessor::new((64, 64));
        preprocessor.preprocess_rgb(&pixels, 64, 32).unwrap();

        let canvas = preprocessor.canvas();
        assert_eq!(pixel_at(canvas, 64, 10, 5), LETTERBOX_COLOR, "Top band is padding");
        assert_eq!(pixel_at(canvas, 64, 10, 60), LETTERBOX_COLOR, "Bottom band is padding");
        assert_eq!(pixel_at(canvas, 64, 10, 32), [200, 200, 200], "Center holds the image");
    }

    #[test]
    fn custom_pad_color() {
        let config = PreprocessConfig {
            input_size: (32, 32),
            pad_color: [0, 0, 0],
            ..PreprocessConfig::default()
        };
        let mut preprocessor = LetterboxPreProcessor::with_config(&config);
        let result = preprocessor.preprocess_rgb(&vec![255u8; 32 * 16 * 3], 32, 16).unwrap();

        let values = result.tensors[0].to_f32_vec().unwrap();
        // First row is padding, scaled to [0, 1]
        assert_eq!(values[0], 0.0);
        // Row 16 is image content
        assert_eq!(values[16 * 32], 1.0);
    }

    /// Test buffer size mismatch detection
    #[test]
    fn test_buffer_size_mismatch_detection() {
        let pixels = vec![0u8; 200]; // Wrong size for 10x10

        let mut preprocessor = LetterboxPreProcessor::default();
        let result = preprocessor.preprocess_rgb(&pixels, 10, 10);

        assert!(
            matches!(result, Err(PreprocessError::SizeMismatch { expected: 300, actual: 200 })),
            "Size mismatch should return error"
        );
    }

    #[test]
    fn encoded_frame_goes_through_decode() {
        let png = encode_png(1280, 720, [255, 0, 0]);
        let mut preprocessor = LetterboxPreProcessor::new((640, 640));
        let result = preprocessor.preprocess(&png).unwrap();

        assert_eq!(result.source_size, (1280, 720));
        let values = result.tensors[0].to_f32_vec().unwrap();
        let spatial = 640 * 640;
        let center = 320 * 640 + 320;
        assert!((values[center] - 1.0).abs() < 1e-6, "Red plane is saturated");
        assert!(values[spatial + center].abs() < 1e-6, "Green plane is empty");
    }

    #[test]
    fn empty_frame_is_an_error() {
        let mut preprocessor = LetterboxPreProcessor::default();
        assert!(matches!(
            preprocessor.preprocess(&[]),
            Err(PreprocessError::EmptyInput)
        ));
    }
}
