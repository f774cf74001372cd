use serde::Serialize;

/// Lifecycle of the frame pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Processing,
    Disposing,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A frame was accepted.
    Submit,
    /// The in-flight run finished (successfully or not).
    Complete,
    /// Disposal was requested.
    Dispose,
}

impl PipelineState {
    /// The state reached by applying `transition`, or `None` when the
    /// transition is not allowed from this state.
    pub fn next(self, transition: Transition) -> Option<PipelineState> {
        use PipelineState::*;
        use Transition::*;

        match (self, transition) {
            (Idle, Submit) => Some(Processing),
            (Processing, Complete) => Some(Idle),
            (Idle | Processing, Dispose) => Some(Disposing),
            (Disposing, Complete) => Some(Disposed),
            _ => None,
        }
    }

    pub fn accepts_frames(self) -> bool {
        self == PipelineState::Idle
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Disposing | PipelineState::Disposed)
    }
}
