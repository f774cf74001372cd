use serde::{Deserialize, Serialize};

/// Axis-aligned box in top-left + size form, normalized to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Convert bounding box from center-width-height format to corner format
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::from_corners(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn x2(&self) -> f32 {
        self.x + self.width
    }

    pub fn y2(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-union. Zero-area boxes never overlap anything.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let area_a = self.area();
        let area_b = other.area();
        if area_a <= 0.0 || area_b <= 0.0 {
            return 0.0;
        }

        let ix = (self.x2().min(other.x2()) - self.x.max(other.x)).max(0.0);
        let iy = (self.y2().min(other.y2()) - self.y.max(other.y)).max(0.0);
        let intersection = ix * iy;
        let union = area_a + area_b - intersection;

        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Clip the box to the unit square.
    pub fn clamp_unit(&self) -> Self {
        let x1 = self.x.clamp(0.0, 1.0);
        let y1 = self.y.clamp(0.0, 1.0);
        let x2 = self.x2().clamp(0.0, 1.0);
        let y2 = self.y2().clamp(0.0, 1.0);
        Self::from_corners(x1, y1, x2, y2)
    }

    /// Scale a normalized box to pixel units of a `width` x `height` image.
    pub fn to_pixels(&self, width: u32, height: u32) -> Self {
        Self::new(
            self.x * width as f32,
            self.y * height as f32,
            self.width * width as f32,
            self.height * height as f32,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_index: usize,
    pub class_name: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub class_index: usize,
    pub class_name: String,
    pub confidence: f32,
}

/// Decoded result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "results", rename_all = "snake_case")]
pub enum ModelOutput {
    Classifications(Vec<Classification>),
    Detections(Vec<Detection>),
}

impl ModelOutput {
    pub fn len(&self) -> usize {
        match self {
            ModelOutput::Classifications(c) => c.len(),
            ModelOutput::Detections(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn detections(&self) -> Option<&[Detection]> {
        match self {
            ModelOutput::Detections(d) => Some(d),
            ModelOutput::Classifications(_) => None,
        }
    }

    pub fn classifications(&self) -> Option<&[Classification]> {
        match self {
            ModelOutput::Classifications(c) => Some(c),
            ModelOutput::Detections(_) => None,
        }
    }
}
