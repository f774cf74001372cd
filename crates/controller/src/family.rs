use crate::config::PipelineConfig;
use inference::{
    ClassificationPostProcessor, DetectionPostProcessor, Labels, OutputLayout, Postprocess,
    PostprocessError,
};
use preprocess::{
    ClassificationPreProcessor, LetterboxPreProcessor, Preprocess, PreprocessError,
    PreprocessResult,
};
use schema::{ModelOutput, TensorBuffer};
use std::str::FromStr;

/// Which model family the pipeline runs, selected once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Classification,
    Detection(OutputLayout),
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classification" | "classifier" => Ok(ModelKind::Classification),
            other => other
                .parse::<OutputLayout>()
                .map(ModelKind::Detection)
                .map_err(|_| format!("unknown model kind {other:?}")),
        }
    }
}

/// Family-specific pre- and post-processing around the engine.
pub trait ModelFamily: Send {
    fn kind(&self) -> ModelKind;

    fn preprocess(&mut self, encoded: &[u8]) -> Result<PreprocessResult, PreprocessError>;

    fn postprocess(&self, outputs: &[TensorBuffer]) -> Result<ModelOutput, PostprocessError>;

    /// Output published when postprocessing fails.
    fn empty_output(&self) -> ModelOutput;
}

pub struct ClassificationFamily {
    pre: ClassificationPreProcessor,
    post: ClassificationPostProcessor,
}

impl ClassificationFamily {
    pub fn new(pre: ClassificationPreProcessor, post: ClassificationPostProcessor) -> Self {
        Self { pre, post }
    }
}

impl ModelFamily for ClassificationFamily {
    fn kind(&self) -> ModelKind {
        ModelKind::Classification
    }

    fn preprocess(&mut self, encoded: &[u8]) -> Result<PreprocessResult, PreprocessError> {
        self.pre.preprocess(encoded)
    }

    fn postprocess(&self, outputs: &[TensorBuffer]) -> Result<ModelOutput, PostprocessError> {
        self.post.postprocess(outputs)
    }

    fn empty_output(&self) -> ModelOutput {
        ModelOutput::Classifications(Vec::new())
    }
}

pub struct DetectionFamily {
    pre: LetterboxPreProcessor,
    post: DetectionPostProcessor,
}

impl DetectionFamily {
    pub fn new(pre: LetterboxPreProcessor, post: DetectionPostProcessor) -> Self {
        Self { pre, post }
    }
}

impl ModelFamily for DetectionFamily {
    fn kind(&self) -> ModelKind {
        ModelKind::Detection(self.post.layout)
    }

    fn preprocess(&mut self, encoded: &[u8]) -> Result<PreprocessResult, PreprocessError> {
        self.pre.preprocess(encoded)
    }

    fn postprocess(&self, outputs: &[TensorBuffer]) -> Result<ModelOutput, PostprocessError> {
        self.post.postprocess(outputs)
    }

    fn empty_output(&self) -> ModelOutput {
        ModelOutput::Detections(Vec::new())
    }
}

impl ModelKind {
    /// Build the family described by `config`.
    pub fn build(self, config: &PipelineConfig, labels: Labels) -> Box<dyn ModelFamily> {
        match self {
            ModelKind::Classification => {
                let mut post = ClassificationPostProcessor::new(config.top_k, labels);
                post.apply_softmax = config.apply_softmax;
                Box::new(ClassificationFamily::new(
                    ClassificationPreProcessor::new(&config.preprocess),
                    post,
                ))
            }
            ModelKind::Detection(layout) => {
                let post = DetectionPostProcessor {
                    layout,
                    confidence_threshold: config.confidence_threshold,
                    iou_threshold: config.iou_threshold,
                    max_detections: config.max_detections,
                    input_size: config.preprocess.input_size,
                    labels,
                };
                Box::new(DetectionFamily::new(
                    LetterboxPreProcessor::with_config(&config.preprocess),
                    post,
                ))
            }
        }
    }
}
