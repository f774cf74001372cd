use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stage latencies of one pipeline run, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimingSample {
    pub preprocess_ms: f64,
    pub infer_ms: f64,
    pub postprocess_ms: f64,
    pub total_ms: f64,
}

impl TimingSample {
    pub fn from_durations(
        preprocess: Duration,
        infer: Duration,
        postprocess: Duration,
        total: Duration,
    ) -> Self {
        Self {
            preprocess_ms: as_ms(preprocess),
            infer_ms: as_ms(infer),
            postprocess_ms: as_ms(postprocess),
            total_ms: as_ms(total),
        }
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
