use std::time::{Duration, Instant};

/// Enforces a minimum interval between captured frames.
#[derive(Debug, Clone, Copy)]
pub struct CapturePacing {
    min_interval: Duration,
}

impl CapturePacing {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    pub fn from_fps(max_fps: f64) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / max_fps))
    }

    pub fn frame_duration(&self) -> Duration {
        self.min_interval
    }

    /// Time left in the current frame budget, if any.
    pub fn remaining(&self, started: Instant) -> Option<Duration> {
        let elapsed = started.elapsed();
        if elapsed < self.min_interval {
            Some(self.min_interval - elapsed)
        } else {
            tracing::trace!("Capture took longer than frame budget: {:?}", elapsed);
            None
        }
    }
}
