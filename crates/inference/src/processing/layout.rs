use super::{Candidate, PostprocessError, matrix_dims, sigmoid};
use schema::{BoundingBox, TensorBuffer};

/// How a detection model lays out its raw output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// One `[1, N, 5 + K]` tensor of `(cx, cy, w, h, objectness, scores..)`
    /// rows in input-pixel units.
    YoloV5,
    /// One `[1, 4 + K, N]` channel-major tensor without objectness, in
    /// input-pixel units. Also used by YOLO11.
    YoloV8,
    /// `[1, N, 4]` normalized `cxcywh` boxes plus `[1, N, C]` class logits
    /// where class 0 is background.
    Detr,
}

impl std::str::FromStr for OutputLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yolov5" => Ok(OutputLayout::YoloV5),
            "yolov8" | "yolo11" | "yolov11" => Ok(OutputLayout::YoloV8),
            "detr" | "rfdetr" | "rf-detr" => Ok(OutputLayout::Detr),
            other => Err(format!("unknown detection layout {other:?}")),
        }
    }
}

/// Index and value of the largest finite score. Ties keep the lowest index.
#[inline]
fn argmax(scores: impl Iterator<Item = f32>) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, s) in scores.enumerate() {
        if !s.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best
}

impl OutputLayout {
    /// Number of output tensors the layout consumes.
    pub fn output_count(self) -> usize {
        match self {
            OutputLayout::YoloV5 | OutputLayout::YoloV8 => 1,
            OutputLayout::Detr => 2,
        }
    }

    /// Decode raw outputs into candidates at or above `confidence_threshold`,
    /// with boxes normalized to the `input_size` canvas.
    pub fn decode(
        self,
        outputs: &[TensorBuffer],
        input_size: (u32, u32),
        confidence_threshold: f32,
    ) -> Result<Vec<Candidate>, PostprocessError> {
        if outputs.len() < self.output_count() {
            return Err(PostprocessError::MissingOutput);
        }

        match self {
            OutputLayout::YoloV5 => decode_yolov5(&outputs[0], input_size, confidence_threshold),
            OutputLayout::YoloV8 => decode_yolov8(&outputs[0], input_size, confidence_threshold),
            OutputLayout::Detr => decode_detr(&outputs[0], &outputs[1], confidence_threshold),
        }
    }
}

/// NaN never passes.
#[inline]
fn passes(confidence: f32, threshold: f32) -> bool {
    confidence.is_finite() && confidence >= threshold
}

fn pixel_box(cx: f32, cy: f32, w: f32, h: f32, input_size: (u32, u32)) -> BoundingBox {
    let (iw, ih) = (input_size.0 as f32, input_size.1 as f32);
    BoundingBox::from_center(cx / iw, cy / ih, w / iw, h / ih)
}

fn decode_yolov5(
    output: &TensorBuffer,
    input_size: (u32, u32),
    threshold: f32,
) -> Result<Vec<Candidate>, PostprocessError> {
    let (rows, width) = matrix_dims(output)?;
    if width < 6 {
        return Err(PostprocessError::UnexpectedShape(format!(
            "YOLOv5 rows need 5 + K values, got {width}"
        )));
    }

    let data = output.to_f32_vec()?;
    let mut candidates = Vec::new();

    for row in data.chunks_exact(width).take(rows) {
        let objectness = row[4];
        let Some((class_index, score)) = argmax(row[5..].iter().copied()) else {
            continue;
        };
        let confidence = objectness * score;
        if !passes(confidence, threshold) {
            continue;
        }

        candidates.push(Candidate {
            bbox: pixel_box(row[0], row[1], row[2], row[3], input_size),
            confidence,
            class_index,
        });
    }

    Ok(candidates)
}

fn decode_yolov8(
    output: &TensorBuffer,
    input_size: (u32, u32),
    threshold: f32,
) -> Result<Vec<Candidate>, PostprocessError> {
    let (channels, anchors) = matrix_dims(output)?;
    if channels < 5 {
        return Err(PostprocessError::UnexpectedShape(format!(
            "YOLOv8 output needs 4 + K channels, got {channels}"
        )));
    }

    let data = output.to_f32_vec()?;
    let at = |c: usize, i: usize| data[c * anchors + i];
    let mut candidates = Vec::new();

    for i in 0..anchors {
        let Some((class_index, confidence)) = argmax((4..channels).map(|c| at(c, i))) else {
            continue;
        };
        if !passes(confidence, threshold) {
            continue;
        }

        candidates.push(Candidate {
            bbox: pixel_box(at(0, i), at(1, i), at(2, i), at(3, i), input_size),
            confidence,
            class_index,
        });
    }

    Ok(candidates)
}

fn decode_detr(
    boxes: &TensorBuffer,
    logits: &TensorBuffer,
    threshold: f32,
) -> Result<Vec<Candidate>, PostprocessError> {
    let (num_queries, box_width) = matrix_dims(boxes)?;
    let (logit_queries, num_classes) = matrix_dims(logits)?;

    if box_width != 4 || logit_queries != num_queries || num_classes < 2 {
        return Err(PostprocessError::UnexpectedShape(format!(
            "DETR expects [N, 4] boxes and [N, C>=2] logits, got {:?} and {:?}",
            boxes.shape(),
            logits.shape()
        )));
    }

    let dets = boxes.to_f32_vec()?;
    let logits = logits.to_f32_vec()?;
    let mut candidates = Vec::new();

    for i in 0..num_queries {
        // Skip index 0 (background); real classes are 1-indexed
        let row = &logits[i * num_classes..(i + 1) * num_classes];
        let Some((class_offset, max_logit)) = argmax(row[1..].iter().copied()) else {
            continue;
        };

        let confidence = sigmoid(max_logit);
        if !passes(confidence, threshold) {
            continue;
        }

        let b = &dets[i * 4..i * 4 + 4];
        candidates.push(Candidate {
            bbox: BoundingBox::from_center(b[0], b[1], b[2], b[3]),
            confidence,
            class_index: class_offset,
        });
    }

    Ok(candidates)
}
