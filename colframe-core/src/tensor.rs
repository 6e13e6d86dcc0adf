//! Dense tensor values carried through dataframe columns

use std::fmt;

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 32-bit floating point
    F32,

    /// 32-bit signed integer
    I32,
}

/// Trait for types that can be stored in a [`Tensor`]
pub trait Element: Pod + Send + Sync + 'static {
    /// Wrap owned elements into tensor storage
    fn wrap(data: Vec<Self>) -> TensorData;

    /// Borrow the elements if the storage holds this type
    fn view(data: &TensorData) -> Option<&[Self]>;

    /// Convert from a double, truncating toward zero for integer types
    fn from_f64(value: f64) -> Self;
}

impl Element for f32 {
    fn wrap(data: Vec<Self>) -> TensorData {
        TensorData::F32(data)
    }

    fn view(data: &TensorData) -> Option<&[Self]> {
        match data {
            TensorData::F32(values) => Some(values),
            TensorData::I32(_) => None,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Element for i32 {
    fn wrap(data: Vec<Self>) -> TensorData {
        TensorData::I32(data)
    }

    fn view(data: &TensorData) -> Option<&[Self]> {
        match data {
            TensorData::I32(values) => Some(values),
            TensorData::F32(_) => None,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value as i32
    }
}

/// Owned element storage of a tensor
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    /// 32-bit float elements
    F32(Vec<f32>),

    /// 32-bit integer elements
    I32(Vec<i32>),
}

impl TensorData {
    fn zeros(element_type: ElementType, len: usize) -> Self {
        match element_type {
            ElementType::F32 => TensorData::F32(vec![0.0; len]),
            ElementType::I32 => TensorData::I32(vec![0; len]),
        }
    }

    fn len(&self) -> usize {
        match self {
            TensorData::F32(values) => values.len(),
            TensorData::I32(values) => values.len(),
        }
    }

    fn element_type(&self) -> ElementType {
        match self {
            TensorData::F32(_) => ElementType::F32,
            TensorData::I32(_) => ElementType::I32,
        }
    }
}

/// A dense, row-major multidimensional tensor
#[derive(Clone, PartialEq)]
pub struct Tensor {
    /// Shape of the tensor (dimensions)
    shape: Vec<usize>,

    /// Element storage
    data: TensorData,
}

impl Tensor {
    /// Create a zero-filled tensor
    pub fn zeros(element_type: ElementType, shape: Vec<usize>) -> Self {
        let size = shape.iter().product();
        Self {
            shape,
            data: TensorData::zeros(element_type, size),
        }
    }

    /// Create a tensor from a vector
    pub fn from_vec<T: Element>(data: Vec<T>, shape: Vec<usize>) -> Result<Self> {
        let expected_size: usize = shape.iter().product();
        if data.len() != expected_size {
            return Err(Error::InvalidArgument(format!(
                "Vector length {} does not match shape product {}",
                data.len(),
                expected_size
            )));
        }

        Ok(Self {
            shape,
            data: T::wrap(data),
        })
    }

    /// Stack equally shaped tensors along a new leading dimension
    pub fn stack(tensors: &[&Tensor]) -> Result<Self> {
        let first = tensors
            .first()
            .ok_or_else(|| Error::InvalidArgument("Cannot stack zero tensors".into()))?;

        let mut shape = Vec::with_capacity(first.ndim() + 1);
        shape.push(tensors.len());
        shape.extend_from_slice(&first.shape);

        let mut out = Tensor::zeros(first.element_type(), shape);
        let step = first.len();
        for (i, tensor) in tensors.iter().enumerate() {
            if tensor.shape != first.shape || tensor.element_type() != first.element_type() {
                return Err(Error::TypeMismatch(format!(
                    "Cannot stack {:?}{:?} with {:?}{:?}",
                    tensor.element_type(),
                    tensor.shape,
                    first.element_type(),
                    first.shape
                )));
            }
            let range = i * step..(i + 1) * step;
            match (&mut out.data, &tensor.data) {
                (TensorData::F32(dst), TensorData::F32(src)) => dst[range].copy_from_slice(src),
                (TensorData::I32(dst), TensorData::I32(src)) => dst[range].copy_from_slice(src),
                _ => unreachable!("element types checked above"),
            }
        }

        Ok(out)
    }

    /// Get the shape of the tensor
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the number of dimensions
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get the element type
    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    /// Get the underlying storage
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Borrow the elements as a typed slice
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::view(&self.data)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("element_type", &self.element_type())
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}
