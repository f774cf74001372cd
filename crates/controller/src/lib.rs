pub mod config;
pub mod error;
pub mod events;
pub mod family;
pub mod mapper;
pub mod metrics;
pub mod performance;
pub mod service;
pub mod session;
pub mod state_machine;

pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError};
pub use events::{FrameFailure, PipelineEvent, PipelineResult};
pub use family::{ClassificationFamily, DetectionFamily, ModelFamily, ModelKind};
pub use metrics::PipelineMetrics;
pub use performance::{PerformanceSnapshot, PerformanceTracker};
pub use service::{FramePipelineController, SubmitOutcome};
pub use session::Session;
pub use state_machine::{PipelineState, Transition};
