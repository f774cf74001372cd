use crate::{CameraSource, CaptureError, CapturePacing, ReplaySource};
use common::config::env_or;
use std::{path::PathBuf, str::FromStr, time::Duration};

const DEFAULT_SOURCE: &str = "v4l:0";
const DEFAULT_MIN_INTERVAL_MS: u64 = 33;

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Loop over the images of a directory.
    Replay(PathBuf),
    /// V4L2 device index.
    V4l(u32),
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("replay", dir)) if !dir.is_empty() => Ok(SourceKind::Replay(PathBuf::from(dir))),
            Some(("v4l", index)) => index
                .parse()
                .map(SourceKind::V4l)
                .map_err(|e| format!("invalid v4l device index {index:?}: {e}")),
            _ => Err(format!(
                "unknown capture source {s:?}, expected replay:<dir> or v4l:<index>"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub source: SourceKind,
    pub min_interval: Duration,
}

impl CaptureConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let raw = std::env::var("CAPTURE_SOURCE").unwrap_or_else(|_| DEFAULT_SOURCE.to_string());
        let source = raw.parse::<SourceKind>().map_err(|e: String| anyhow::anyhow!(e))?;

        let min_interval =
            Duration::from_millis(env_or("MIN_CAPTURE_INTERVAL_MS", DEFAULT_MIN_INTERVAL_MS));

        Ok(Self {
            source,
            min_interval,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.min_interval.is_zero(),
            "MIN_CAPTURE_INTERVAL_MS must be greater than zero"
        );
        Ok(())
    }
}

/// Build the configured camera source.
pub fn open_source(config: &CaptureConfig) -> Result<Box<dyn CameraSource>, CaptureError> {
    let pacing = CapturePacing::new(config.min_interval);

    match &config.source {
        SourceKind::Replay(dir) => Ok(Box::new(ReplaySource::new(dir.clone(), pacing))),
        #[cfg(feature = "v4l")]
        SourceKind::V4l(index) => Ok(Box::new(crate::V4lSource::new(*index, pacing))),
        #[cfg(not(feature = "v4l"))]
        SourceKind::V4l(index) => Err(CaptureError::DeviceUnavailable(format!(
            "v4l:{index} requested but capture was built without the v4l feature"
        ))),
    }
}
