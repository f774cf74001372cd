use crate::config::{ColorOrder, Normalization, PreprocessConfig, ResizeMode};
use crate::normalize::pack_chw;
use crate::{Preprocess, PreprocessError, PreprocessResult, check_rgb_buffer};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};

/// Classification-model preprocessor: stretch or center-crop to the target
/// size, then normalize and pack CHW. No letterbox transform is produced.
pub struct ClassificationPreProcessor {
    input_size: (u32, u32),
    normalization: Option<Normalization>,
    resize_mode: ResizeMode,
    color_order: ColorOrder,
    resizer: Resizer,
}

impl ClassificationPreProcessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            input_size: config.input_size,
            normalization: config.normalization,
            resize_mode: config.resize_mode,
            color_order: config.color_order,
            resizer: Resizer::new(),
        }
    }

    fn resize_options(&self, width: u32, height: u32) -> ResizeOptions {
        let options =
            ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));

        match self.resize_mode {
            ResizeMode::Stretch => options,
            ResizeMode::CenterCrop => {
                let (left, top, crop_w, crop_h) = center_crop(width, height, self.input_size);
                options.crop(left, top, crop_w, crop_h)
            }
        }
    }
}

/// Largest centered window of the source with the target's aspect ratio.
fn center_crop(width: u32, height: u32, target: (u32, u32)) -> (f64, f64, f64, f64) {
    let (w, h) = (width as f64, height as f64);
    let target_aspect = target.0 as f64 / target.1 as f64;

    if w / h > target_aspect {
        let crop_w = h * target_aspect;
        ((w - crop_w) / 2.0, 0.0, crop_w, h)
    } else {
        let crop_h = w / target_aspect;
        (0.0, (h - crop_h) / 2.0, w, crop_h)
    }
}

impl Preprocess for ClassificationPreProcessor {
    fn preprocess_rgb(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<PreprocessResult, PreprocessError> {
        let _s = span!("classification_preprocess");

        check_rgb_buffer(pixels, width, height)?;

        let (target_w, target_h) = self.input_size;
        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        let mut resized = Image::new(target_w, target_h, PixelType::U8x3);
        let options = self.resize_options(width, height);

        self.resizer.resize(&src, &mut resized, &options)?;

        let input = pack_chw(
            resized.buffer(),
            target_w,
            target_h,
            self.normalization.as_ref(),
            self.color_order,
        )?;

        Ok(PreprocessResult {
            tensors: vec![input],
            transform: None,
            source_size: (width, height),
        })
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }
}
