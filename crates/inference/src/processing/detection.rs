use super::{Postprocess, PostprocessError, layout::OutputLayout, nms::non_max_suppression};
use crate::labels::Labels;
use schema::{Detection, ModelOutput, TensorBuffer};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_MAX_DETECTIONS: usize = 100;

/// Decodes detection outputs, applies NMS and caps the result count.
///
/// Boxes are returned normalized to the letterboxed model input; mapping back
/// to the source image is the caller's job.
pub struct DetectionPostProcessor {
    pub layout: OutputLayout,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Model input size, used to normalize pixel-unit layouts.
    pub input_size: (u32, u32),
    pub labels: Labels,
}

impl DetectionPostProcessor {
    pub fn new(layout: OutputLayout, input_size: (u32, u32)) -> Self {
        Self {
            layout,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
            input_size,
            labels: Labels::default(),
        }
    }

    /// Decode, threshold and suppress without the output wrapper.
    #[tracing::instrument(skip(self, outputs), fields(layout = ?self.layout))]
    pub fn detect(&self, outputs: &[TensorBuffer]) -> Result<Vec<Detection>, PostprocessError> {
        let candidates = self
            .layout
            .decode(outputs, self.input_size, self.confidence_threshold)?;
        let before = candidates.len();

        let mut kept = non_max_suppression(candidates, self.iou_threshold);
        kept.truncate(self.max_detections);

        tracing::debug!(candidates = before, kept = kept.len(), "Detections decoded");

        Ok(kept
            .into_iter()
            .map(|c| Detection {
                class_index: c.class_index,
                class_name: self.labels.name(c.class_index),
                confidence: c.confidence,
                bbox: c.bbox,
            })
            .collect())
    }
}

impl Postprocess for DetectionPostProcessor {
    fn postprocess(&self, outputs: &[TensorBuffer]) -> Result<ModelOutput, PostprocessError> {
        self.detect(outputs).map(ModelOutput::Detections)
    }
}
