use crate::family::ModelKind;
use anyhow::{Result, anyhow, bail, ensure};
use capture::{CaptureConfig, SourceKind};
use common::{
    Environment,
    config::{env_list, env_or},
};
use inference::OutputLayout;
use preprocess::{ColorOrder, LETTERBOX_COLOR, Normalization, PreprocessConfig, ResizeMode};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

const DEFAULT_MODEL_PATH: &str = "/models/model.onnx";

/// Immutable per-session configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub environment: Environment,
    pub otel_endpoint: Option<String>,
    pub model_path: String,
    pub model_kind: ModelKind,
    pub labels_path: Option<PathBuf>,
    pub preprocess: PreprocessConfig,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub top_k: usize,
    pub apply_softmax: bool,
    pub capture: CaptureConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            otel_endpoint: None,
            model_path: DEFAULT_MODEL_PATH.to_string(),
            model_kind: ModelKind::Detection(OutputLayout::YoloV8),
            labels_path: None,
            preprocess: PreprocessConfig::default(),
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            max_detections: 100,
            top_k: 5,
            apply_softmax: true,
            capture: CaptureConfig {
                source: SourceKind::V4l(0),
                min_interval: Duration::from_millis(33),
            },
        }
    }
}

/// Parse `key` with `T::from_str`, rejecting unknown values instead of
/// silently falling back.
fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr<Err = String>,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e| anyhow!("{key}: {e}")),
        _ => Ok(default),
    }
}

/// Read a comma-separated triple such as `NORM_MEAN=0.485,0.456,0.406`.
fn triple<T>(key: &str) -> Result<Option<[T; 3]>>
where
    T: FromStr + Copy,
    T::Err: std::fmt::Display,
{
    let Some(values) = env_list::<T>(key)? else {
        return Ok(None);
    };
    let array: [T; 3] = values
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("{key} must have exactly 3 values, got {}", values.len()))?;
    Ok(Some(array))
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let environment = Environment::from_env();

        let otel_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|s| !s.is_empty());

        let model_path = env::var("MODEL_PATH").unwrap_or(defaults.model_path);
        let model_kind = parse_var("MODEL_KIND", defaults.model_kind)?;
        let labels_path = env::var("LABELS_PATH").ok().map(PathBuf::from);

        let input_size = (
            env_or("INPUT_WIDTH", defaults.preprocess.input_size.0),
            env_or("INPUT_HEIGHT", defaults.preprocess.input_size.1),
        );

        let normalization = match (triple::<f32>("NORM_MEAN")?, triple::<f32>("NORM_STD")?) {
            (Some(mean), Some(std)) => Some(Normalization { mean, std }),
            (None, None) => None,
            _ => bail!("NORM_MEAN and NORM_STD must be set together"),
        };

        let preprocess = PreprocessConfig {
            input_size,
            normalization,
            pad_color: triple::<u8>("PAD_COLOR")?.unwrap_or(LETTERBOX_COLOR),
            resize_mode: parse_var("RESIZE_MODE", ResizeMode::default())?,
            color_order: parse_var("COLOR_ORDER", ColorOrder::default())?,
        };

        Ok(Self {
            environment,
            otel_endpoint,
            model_path,
            model_kind,
            labels_path,
            preprocess,
            confidence_threshold: env_or("CONFIDENCE_THRESHOLD", defaults.confidence_threshold),
            iou_threshold: env_or("IOU_THRESHOLD", defaults.iou_threshold),
            max_detections: env_or("MAX_DETECTIONS", defaults.max_detections),
            top_k: env_or("TOP_K", defaults.top_k),
            apply_softmax: env_or("APPLY_SOFTMAX", defaults.apply_softmax),
            capture: CaptureConfig::from_env()?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        ensure!(
            unit.contains(&self.confidence_threshold),
            "CONFIDENCE_THRESHOLD must be within [0, 1], got {}",
            self.confidence_threshold
        );
        ensure!(
            unit.contains(&self.iou_threshold),
            "IOU_THRESHOLD must be within [0, 1], got {}",
            self.iou_threshold
        );

        let (w, h) = self.preprocess.input_size;
        ensure!(w > 0 && h > 0, "Input size must be non-zero, got {w}x{h}");

        if let Some(norm) = &self.preprocess.normalization {
            ensure!(
                norm.std.iter().all(|s| *s != 0.0),
                "NORM_STD must not contain zero"
            );
        }

        ensure!(self.top_k > 0, "TOP_K must be at least 1");
        ensure!(self.max_detections > 0, "MAX_DETECTIONS must be at least 1");

        self.capture.validate()
    }
}
