use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum tensor rank accepted by the engine boundary.
pub const MAX_TENSOR_DIMS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Float32,
    Int32,
    Int8,
    Uint8,
}

impl ElementType {
    pub fn size_of(self) -> usize {
        match self {
            ElementType::Float32 | ElementType::Int32 => 4,
            ElementType::Int8 | ElementType::Uint8 => 1,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Float32 => "float32",
            ElementType::Int32 => "int32",
            ElementType::Int8 => "int8",
            ElementType::Uint8 => "uint8",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
    #[error("invalid rank {0} (must be 1-{MAX_TENSOR_DIMS})")]
    InvalidRank(usize),

    #[error("invalid dimension size at index {index}: {size} (must be > 0)")]
    InvalidDimension { index: usize, size: usize },

    #[error("payload size mismatch: got {actual} bytes, expected {expected} bytes")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("element type mismatch: expected {expected}, got {actual}")]
    ElementTypeMismatch {
        expected: ElementType,
        actual: ElementType,
    },
}

/// Typed, shaped, contiguous buffer exchanged with the inference engine.
///
/// `data.len() == shape.iter().product() * dtype.size_of()` holds for every
/// value built through the constructors.
#[derive(Clone, PartialEq)]
pub struct TensorBuffer {
    shape: Vec<usize>,
    dtype: ElementType,
    data: Vec<u8>,
    name: Option<String>,
}

impl TensorBuffer {
    pub fn new(shape: Vec<usize>, dtype: ElementType, data: Vec<u8>) -> Result<Self, TensorError> {
        let expected = expected_len(&shape, dtype)?;
        if data.len() != expected {
            return Err(TensorError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            shape,
            dtype,
            data,
            name: None,
        })
    }

    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Result<Self, TensorError> {
        Self::new(
            shape,
            ElementType::Float32,
            bytemuck::cast_slice(values).to_vec(),
        )
    }

    pub fn from_i32(shape: Vec<usize>, values: &[i32]) -> Result<Self, TensorError> {
        Self::new(
            shape,
            ElementType::Int32,
            bytemuck::cast_slice(values).to_vec(),
        )
    }

    pub fn from_i8(shape: Vec<usize>, values: &[i8]) -> Result<Self, TensorError> {
        Self::new(shape, ElementType::Int8, bytemuck::cast_slice(values).to_vec())
    }

    pub fn from_u8(shape: Vec<usize>, values: Vec<u8>) -> Result<Self, TensorError> {
        Self::new(shape, ElementType::Uint8, values)
    }

    /// Pack a float32 ndarray in row-major order.
    pub fn from_array(array: ArrayD<f32>) -> Result<Self, TensorError> {
        let shape = array.shape().to_vec();
        let contiguous = array.as_standard_layout();
        match contiguous.as_slice() {
            Some(values) => Self::from_f32(shape, values),
            None => Self::from_f32(shape, &contiguous.iter().copied().collect::<Vec<_>>()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Decode a float32 payload. The payload is copied into an aligned vector.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>, TensorError> {
        self.expect_dtype(ElementType::Float32)?;
        Ok(bytemuck::pod_collect_to_vec(&self.data))
    }

    pub fn to_i32_vec(&self) -> Result<Vec<i32>, TensorError> {
        self.expect_dtype(ElementType::Int32)?;
        Ok(bytemuck::pod_collect_to_vec(&self.data))
    }

    /// View a float32 payload as an n-dimensional array with this tensor's shape.
    pub fn to_array(&self) -> Result<ArrayD<f32>, TensorError> {
        let values = self.to_f32_vec()?;
        let expected = values.len();
        ArrayD::from_shape_vec(IxDyn(&self.shape), values).map_err(|_| TensorError::SizeMismatch {
            expected: self.element_count(),
            actual: expected,
        })
    }

    fn expect_dtype(&self, expected: ElementType) -> Result<(), TensorError> {
        if self.dtype != expected {
            return Err(TensorError::ElementTypeMismatch {
                expected,
                actual: self.dtype,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for TensorBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorBuffer")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .field("bytes", &self.data.len())
            .finish()
    }
}

fn expected_len(shape: &[usize], dtype: ElementType) -> Result<usize, TensorError> {
    if shape.is_empty() || shape.len() > MAX_TENSOR_DIMS {
        return Err(TensorError::InvalidRank(shape.len()));
    }
    if let Some(index) = shape.iter().position(|&d| d == 0) {
        return Err(TensorError::InvalidDimension { index, size: 0 });
    }
    Ok(shape.iter().product::<usize>() * dtype.size_of())
}
