use super::{Postprocess, PostprocessError};
use crate::labels::Labels;
use schema::{Classification, ModelOutput, TensorBuffer};

/// Decodes a single logits (or probabilities) vector into the top-k classes.
pub struct ClassificationPostProcessor {
    pub top_k: usize,
    /// Set to `false` when the model already ends in a softmax.
    pub apply_softmax: bool,
    pub labels: Labels,
}

impl ClassificationPostProcessor {
    pub fn new(top_k: usize, labels: Labels) -> Self {
        Self {
            top_k,
            apply_softmax: true,
            labels,
        }
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

impl Postprocess for ClassificationPostProcessor {
    fn postprocess(&self, outputs: &[TensorBuffer]) -> Result<ModelOutput, PostprocessError> {
        let _s = common::span_debug!("classification_postprocess");

        let logits = outputs.first().ok_or(PostprocessError::MissingOutput)?;
        match logits.shape() {
            [_] | [1, _] => {}
            other => {
                return Err(PostprocessError::UnexpectedShape(format!(
                    "expected [K] or [1, K] logits, got {other:?}"
                )));
            }
        }

        let values = logits.to_f32_vec()?;
        let scores = if self.apply_softmax {
            softmax(&values)
        } else {
            values
        };

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(self.top_k);

        let results = ranked
            .into_iter()
            .map(|(class_index, confidence)| Classification {
                class_index,
                class_name: self.labels.name(class_index),
                confidence,
            })
            .collect();

        Ok(ModelOutput::Classifications(results))
    }
}
