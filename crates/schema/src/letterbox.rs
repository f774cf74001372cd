use serde::{Deserialize, Serialize};

/// Parameters of an aspect-preserving resize onto a padded canvas.
///
/// `scale = min(target_w / source_w, target_h / source_h)` and the offsets
/// center the scaled image on the target canvas (in target pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LetterboxTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub source_width: u32,
    pub source_height: u32,
    pub target_width: u32,
    pub target_height: u32,
}

impl LetterboxTransform {
    pub fn compute(source: (u32, u32), target: (u32, u32)) -> Self {
        let (source_width, source_height) = source;
        let (target_width, target_height) = target;

        let scale = if source_width == 0 || source_height == 0 {
            0.0
        } else {
            (target_width as f32 / source_width as f32)
                .min(target_height as f32 / source_height as f32)
        };

        let mut transform = Self {
            scale,
            offset_x: 0.0,
            offset_y: 0.0,
            source_width,
            source_height,
            target_width,
            target_height,
        };

        let (scaled_width, scaled_height) = transform.scaled_size();
        transform.offset_x = ((target_width - scaled_width) / 2) as f32;
        transform.offset_y = ((target_height - scaled_height) / 2) as f32;
        transform
    }

    /// Size of the resized image before padding, never larger than the canvas.
    pub fn scaled_size(&self) -> (u32, u32) {
        let scaled = |src: u32, target: u32| {
            ((src as f32 * self.scale).round() as u32).clamp(1, target.max(1))
        };
        (
            scaled(self.source_width, self.target_width),
            scaled(self.source_height, self.target_height),
        )
    }
}
