use super::{InferenceEngine, InferenceError};
use ort::{
    session::{Session, SessionInputValue, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use schema::{ElementType, TensorBuffer};

/// Input name used when a tensor carries none.
const DEFAULT_INPUT_NAME: &str = "images";

#[derive(Debug, Clone, Copy)]
pub enum ExecutionProvider {
    Cpu,
    #[cfg(feature = "cuda")]
    Cuda,
}

/// ONNX Runtime engine for float32 models.
pub struct OrtBackend {
    session: Option<Session>,
}

fn load_error(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::ModelLoad(e.to_string())
}

fn forward_error(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Forward(e.to_string())
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        path: &str,
        provider: ExecutionProvider,
    ) -> Result<Self, InferenceError> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        #[allow(unused_mut)]
        let mut builder = Session::builder()
            .map_err(load_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_error)?
            .with_intra_threads(4)
            .map_err(load_error)?;

        match provider {
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder
                    .with_execution_providers([
                        ort::execution_providers::CUDAExecutionProvider::default()
                            .with_device_id(0)
                            .build()
                            .error_on_failure(),
                    ])
                    .map_err(load_error)?;
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path).map_err(load_error)?;

        tracing::info!(path, "Model loaded");
        Ok(Self {
            session: Some(session),
        })
    }
}

impl InferenceEngine for OrtBackend {
    fn load_model(path: &str) -> Result<Self, InferenceError> {
        #[cfg(feature = "cuda")]
        let provider = ExecutionProvider::Cuda;
        #[cfg(not(feature = "cuda"))]
        let provider = ExecutionProvider::Cpu;

        Self::load_model_with_provider(path, provider)
    }

    fn forward(&mut self, inputs: Vec<TensorBuffer>) -> Result<Vec<TensorBuffer>, InferenceError> {
        let session = self.session.as_mut().ok_or(InferenceError::Released)?;

        let mut arrays = Vec::with_capacity(inputs.len());
        for tensor in &inputs {
            if tensor.dtype() != ElementType::Float32 {
                return Err(InferenceError::UnsupportedInput(format!(
                    "{} input, only float32 is supported",
                    tensor.dtype()
                )));
            }
            let name = tensor.name().unwrap_or(DEFAULT_INPUT_NAME).to_string();
            arrays.push((name, tensor.to_array()?));
        }

        let mut session_inputs: Vec<(String, SessionInputValue<'_>)> =
            Vec::with_capacity(arrays.len());
        for (name, array) in &arrays {
            let value = TensorRef::from_array_view(array.view()).map_err(forward_error)?;
            session_inputs.push((name.clone(), value.into()));
        }

        let outputs = session.run(session_inputs).map_err(forward_error)?;

        let mut results = Vec::with_capacity(outputs.len());
        for (name, value) in outputs.iter() {
            let array = value.try_extract_array::<f32>().map_err(forward_error)?;
            results.push(TensorBuffer::from_array(array.to_owned())?.with_name(name));
        }

        Ok(results)
    }

    fn dispose(&mut self) -> Result<(), InferenceError> {
        if self.session.take().is_some() {
            tracing::info!("ONNX Runtime session released");
        }
        Ok(())
    }
}
