//! Scalar-to-tensor encodings

use colframe_core::{
    ColumnId, Dataframe, Element, ElementType, Error, FillContext, MapTransform, Result, RowFn,
    Tensor, Value,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Options for [`one_hot`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneHotOptions {
    /// Length of the encoded vector; labels must lie in `[0, depth)`
    pub depth: usize,

    /// Value at the label's index
    pub on_value: f64,

    /// Value everywhere else
    pub off_value: f64,

    /// Element type of the produced tensors
    pub element_type: ElementType,
}

impl Default for OneHotOptions {
    fn default() -> Self {
        Self {
            depth: 0,
            on_value: 1.0,
            off_value: 0.0,
            element_type: ElementType::F32,
        }
    }
}

impl OneHotOptions {
    /// Float one-hot vectors of the given depth
    pub fn with_depth(depth: usize) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }
}

/// Map transform turning integer labels into one-hot tensors of shape `[depth]`
#[derive(Debug, Clone)]
pub struct OneHot {
    options: OneHotOptions,
}

impl OneHot {
    /// Create the transform; `depth` must be positive
    pub fn new(options: OneHotOptions) -> Result<Self> {
        if options.depth == 0 {
            return Err(Error::InvalidArgument("One-hot depth must be at least 1".into()));
        }
        Ok(Self { options })
    }

    fn encode(&self, label: &Value) -> Result<Value> {
        let label = label.expect_int()?;
        let index = usize::try_from(label)
            .map_err(|_| Error::InvalidArgument(format!("Negative one-hot label {label}")))?;
        if index >= self.options.depth {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.options.depth,
            });
        }

        let tensor = match self.options.element_type {
            ElementType::F32 => self.filled::<f32>(index)?,
            ElementType::I32 => self.filled::<i32>(index)?,
        };
        Ok(Value::from(tensor))
    }

    fn filled<T: Element>(&self, index: usize) -> Result<Tensor> {
        let mut data = vec![T::from_f64(self.options.off_value); self.options.depth];
        data[index] = T::from_f64(self.options.on_value);
        Tensor::from_vec(data, vec![self.options.depth])
    }
}

impl MapTransform for OneHot {
    fn apply(&self, inputs: &[Vec<Value>], _batch_size: usize, _ctx: &FillContext<'_>) -> Result<Vec<Value>> {
        let labels = inputs
            .first()
            .ok_or_else(|| Error::InvalidArgument("One-hot needs a label column".into()))?;
        labels.iter().map(|label| self.encode(label)).collect()
    }
}

/// Register a one-hot encoding of the integer label `column`
pub fn one_hot(frame: &Dataframe, column: ColumnId, options: OneHotOptions) -> Result<ColumnId> {
    let id = frame.register_map(OneHot::new(options)?, &[column])?;
    debug!(frame = %frame.id(), column, id, depth = options.depth, "registered one-hot");
    Ok(id)
}

/// Register a column wrapping each numeric value of `column` into a tensor
/// of shape `[1]`
pub fn copy_scalar(frame: &Dataframe, column: ColumnId, element_type: ElementType) -> Result<ColumnId> {
    let copy = RowFn::new(move |value: &Value| -> Result<Value> {
        let scalar = value
            .as_f64()
            .ok_or_else(|| Error::TypeMismatch(format!("expected a number, found {}", value.kind())))?;
        let tensor = match element_type {
            ElementType::F32 => Tensor::from_vec(vec![f32::from_f64(scalar)], vec![1])?,
            ElementType::I32 => Tensor::from_vec(vec![i32::from_f64(scalar)], vec![1])?,
        };
        Ok(Value::from(tensor))
    });
    frame.register_map(copy, &[column])
}
