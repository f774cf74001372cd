use super::Candidate;
use common::span_debug;

/// Greedy non-maximum suppression.
///
/// Candidates are visited by descending confidence; equal confidences keep
/// their input order. A candidate is dropped when its IoU with any kept box
/// is at or above `iou_threshold`. Suppression is class-agnostic.
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    let _s = span_debug!("nms", candidates = candidates.len());

    // sort_by is stable
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.bbox.iou(&candidate.bbox) >= iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }

    tracing::trace!(kept = kept.len(), "NMS complete");
    kept
}
