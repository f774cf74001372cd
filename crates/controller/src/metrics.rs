use crate::error::ErrorKind;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

/// OpenTelemetry instruments for the frame pipeline. Without a configured
/// meter provider they are no-ops.
#[derive(Clone)]
pub struct PipelineMetrics {
    duration: Histogram<f64>,
    frames: Counter<u64>,
    dropped: Counter<u64>,
    failures: Counter<u64>,
    detections: Counter<u64>,
}

impl PipelineMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.001, 0.002, 0.005, 0.007, 0.01, 0.015, 0.02, 0.025, 0.03, 0.04, 0.05, 0.075, 0.1,
            0.15, 0.2, 0.5,
        ];

        Self {
            duration: meter
                .f64_histogram("pipeline_duration_seconds")
                .with_description("Time to run a frame through preprocess, inference and postprocess")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            frames: meter
                .u64_counter("pipeline_frames_total")
                .with_description("Total frames published")
                .build(),
            dropped: meter
                .u64_counter("pipeline_frames_dropped_total")
                .with_description("Frames dropped before processing")
                .build(),
            failures: meter
                .u64_counter("pipeline_frame_failures_total")
                .with_description("Frames that failed a pipeline stage")
                .build(),
            detections: meter
                .u64_counter("pipeline_detections_total")
                .with_description("Total detections published")
                .build(),
        }
    }

    pub fn record_published(&self, total_seconds: f64, detections: usize) {
        self.duration.record(total_seconds, &[]);
        self.frames.add(1, &[]);
        self.detections.add(detections as u64, &[]);
    }

    /// `reason` is `busy` (controller was processing) or `displaced`
    /// (overwritten in the capture slot).
    pub fn record_dropped(&self, count: u64, reason: &'static str) {
        if count > 0 {
            self.dropped.add(count, &[KeyValue::new("reason", reason)]);
        }
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        self.failures.add(1, &[KeyValue::new("kind", kind.as_str())]);
    }
}
