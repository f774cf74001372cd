use crate::{error::ErrorKind, performance::PerformanceSnapshot};
use schema::{ModelOutput, TimingSample};
use serde::Serialize;
use std::sync::Arc;

/// One published pipeline run. Boxes are in source-image space.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub frame_sequence: u64,
    pub captured_at_ns: u64,
    pub output: ModelOutput,
    pub timing: TimingSample,
    pub stats: PerformanceSnapshot,
}

/// A frame that failed a pipeline stage.
#[derive(Debug, Clone, Serialize)]
pub struct FrameFailure {
    pub frame_sequence: u64,
    pub kind: ErrorKind,
    pub transient: bool,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Published(Arc<PipelineResult>),
    Failed(FrameFailure),
}
