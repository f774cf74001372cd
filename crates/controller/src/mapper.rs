//! Coordinate conversion between letterboxed model input and the source image.
//!
//! Both spaces use boxes normalized to [0, 1]. Without a transform (or with a
//! degenerate zero scale) boxes pass through unchanged.

use schema::{BoundingBox, Detection, LetterboxTransform};

fn usable(transform: Option<&LetterboxTransform>) -> Option<&LetterboxTransform> {
    transform.filter(|t| t.scale != 0.0 && t.source_width > 0 && t.source_height > 0)
}

/// Map a box from letterbox-normalized space to source-normalized space.
pub fn to_original_space(bbox: BoundingBox, transform: Option<&LetterboxTransform>) -> BoundingBox {
    let Some(t) = usable(transform) else {
        return bbox;
    };

    let (tw, th) = (t.target_width as f32, t.target_height as f32);
    let (sw, sh) = (t.source_width as f32, t.source_height as f32);

    BoundingBox::new(
        (bbox.x * tw - t.offset_x) / t.scale / sw,
        (bbox.y * th - t.offset_y) / t.scale / sh,
        bbox.width * tw / t.scale / sw,
        bbox.height * th / t.scale / sh,
    )
}

/// Inverse of [`to_original_space`].
pub fn to_letterbox_space(bbox: BoundingBox, transform: Option<&LetterboxTransform>) -> BoundingBox {
    let Some(t) = usable(transform) else {
        return bbox;
    };

    let (tw, th) = (t.target_width as f32, t.target_height as f32);
    let (sw, sh) = (t.source_width as f32, t.source_height as f32);

    BoundingBox::new(
        (bbox.x * sw * t.scale + t.offset_x) / tw,
        (bbox.y * sh * t.scale + t.offset_y) / th,
        bbox.width * sw * t.scale / tw,
        bbox.height * sh * t.scale / th,
    )
}

/// Rewrite detections into source space, clipped to the image.
pub fn map_detections(
    detections: Vec<Detection>,
    transform: Option<&LetterboxTransform>,
) -> Vec<Detection> {
    detections
        .into_iter()
        .map(|mut d| {
            d.bbox = to_original_space(d.bbox, transform).clamp_unit();
            d
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: BoundingBox, b: BoundingBox) {
        for (x, y) in [(a.x, b.x), (a.y, b.y), (a.width, b.width), (a.height, b.height)] {
            assert!((x - y).abs() < 1e-4, "{a:?} != {b:?}");
        }
    }

    /// 800x600 into 512x512: scale 0.64, scaled 512x384, offset (0, 64)
    #[test]
    fn test_coordinate_inverse_transformation() {
        let t = LetterboxTransform::compute((800, 600), (512, 512));
        assert_eq!(t.offset_y, 64.0);

        // (204.8, 204.8)-(307.2, 307.2) in 512 space
        let bbox = BoundingBox::from_corners(0.4, 0.4, 0.6, 0.6);
        let mapped = to_original_space(bbox, Some(&t));

        // Pixels: x1 = 204.8 / 0.64 = 320, y1 = (204.8 - 64) / 0.64 = 220
        let px = mapped.to_pixels(800, 600);
        assert!((px.x - 320.0).abs() < 0.1, "x1 incorrect: {}", px.x);
        assert!((px.y - 220.0).abs() < 0.1, "y1 incorrect: {}", px.y);
        assert!((px.x2() - 480.0).abs() < 0.1, "x2 incorrect: {}", px.x2());
        assert!((px.y2() - 380.0).abs() < 0.1, "y2 incorrect: {}", px.y2());
    }

    #[test]
    fn test_round_trip() {
        let transforms = [
            LetterboxTransform::compute((1280, 720), (640, 640)),
            LetterboxTransform::compute((600, 800), (512, 512)),
            LetterboxTransform::compute((320, 240), (640, 640)),
        ];
        let boxes = [
            BoundingBox::new(0.1, 0.2, 0.3, 0.4),
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            BoundingBox::new(0.45, 0.5, 0.01, 0.02),
        ];

        for t in &transforms {
            for b in boxes {
                let there = to_letterbox_space(b, Some(t));
                assert_close(to_original_space(there, Some(t)), b);
            }
        }
    }

    #[test]
    fn test_passthrough_without_transform() {
        let b = BoundingBox::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(to_original_space(b, None), b);

        let degenerate = LetterboxTransform::compute((0, 0), (640, 640));
        assert_eq!(degenerate.scale, 0.0);
        assert_eq!(to_original_space(b, Some(&degenerate)), b);
    }

    /// Boxes reaching into the padding are clipped to the image
    #[test]
    fn test_coordinates_clamped_to_image_bounds() {
        let t = LetterboxTransform::compute((1280, 720), (640, 640));
        let detections = vec![Detection {
            class_index: 0,
            class_name: "person".into(),
            confidence: 0.9,
            // Starts in the top padding band (offset_y = 140 of 640)
            bbox: BoundingBox::from_corners(-0.05, 0.1, 0.5, 0.5),
        }];

        let mapped = map_detections(detections, Some(&t));
        let b = mapped[0].bbox;
        assert_eq!(b.x, 0.0, "Negative x1 should be clamped to 0");
        assert_eq!(b.y, 0.0, "Negative y1 should be clamped to 0");
        assert!(b.x2() <= 1.0 && b.y2() <= 1.0);
    }
}
