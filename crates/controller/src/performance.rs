use schema::TimingSample;
use serde::Serialize;

/// Running per-stage latency statistics for a capture session.
#[derive(Debug, Clone, Default)]
pub struct PerformanceTracker {
    frame_count: u64,
    means: TimingSample,
    last: Option<TimingSample>,
}

/// Immutable view of the tracker handed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PerformanceSnapshot {
    pub running_means: TimingSample,
    pub last_sample: Option<TimingSample>,
    pub frame_count: u64,
    pub fps: f64,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, sample: TimingSample) {
        self.frame_count += 1;
        let n = self.frame_count as f64;

        let mean = |current: f64, value: f64| current + (value - current) / n;
        self.means = TimingSample {
            preprocess_ms: mean(self.means.preprocess_ms, sample.preprocess_ms),
            infer_ms: mean(self.means.infer_ms, sample.infer_ms),
            postprocess_ms: mean(self.means.postprocess_ms, sample.postprocess_ms),
            total_ms: mean(self.means.total_ms, sample.total_ms),
        };
        self.last = Some(sample);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let fps = if self.frame_count == 0 || self.means.total_ms <= 0.0 {
            0.0
        } else {
            1000.0 / self.means.total_ms
        };

        PerformanceSnapshot {
            running_means: self.means,
            last_sample: self.last,
            frame_count: self.frame_count,
            fps,
        }
    }
}
