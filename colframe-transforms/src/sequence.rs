//! Sequence masking and truncation over tensor columns

use colframe_core::{
    ColumnId, Dataframe, Element, Error, FillContext, MapTransform, Result, Tensor, TensorData, Value,
};
use tracing::debug;

fn lengths(value: &Value) -> Result<&[i32]> {
    let tensor = value.expect_tensor()?;
    match (tensor.ndim(), tensor.as_slice::<i32>()) {
        (1, Some(lengths)) => Ok(lengths),
        _ => Err(Error::TypeMismatch(format!(
            "expected a rank-1 I32 lengths tensor, found {:?}{:?}",
            tensor.element_type(),
            tensor.shape()
        ))),
    }
}

fn clamp_length(length: i32, limit: usize) -> usize {
    usize::try_from(length).unwrap_or(0).min(limit)
}

/// Square attention masks from sequence lengths
///
/// For a lengths tensor `I32[b]` produces `I32[b, m, m]` holding `1` where
/// both the row and the column index are below that sequence's length.
#[derive(Debug, Clone, Copy)]
pub struct SequenceMask {
    variable_length: bool,
    max_length: usize,
}

impl SequenceMask {
    /// Masks of side `max_length`, or of the batch's longest sequence
    /// (capped at `max_length`) when `variable_length` is set
    pub fn new(variable_length: bool, max_length: usize) -> Self {
        Self {
            variable_length,
            max_length,
        }
    }

    fn mask(&self, value: &Value) -> Result<Value> {
        let lengths = lengths(value)?;
        let side = if self.variable_length {
            lengths
                .iter()
                .map(|&len| clamp_length(len, self.max_length))
                .max()
                .unwrap_or(0)
        } else {
            self.max_length
        };

        let mut data = vec![0i32; lengths.len() * side * side];
        for (b, &len) in lengths.iter().enumerate() {
            let len = clamp_length(len, side);
            let plane = &mut data[b * side * side..(b + 1) * side * side];
            for row in plane.chunks_mut(side.max(1)).take(len) {
                row[..len].fill(1);
            }
        }
        Ok(Value::from(Tensor::from_vec(data, vec![lengths.len(), side, side])?))
    }
}

impl MapTransform for SequenceMask {
    fn apply(&self, inputs: &[Vec<Value>], _batch_size: usize, _ctx: &FillContext<'_>) -> Result<Vec<Value>> {
        let column = inputs
            .first()
            .ok_or_else(|| Error::InvalidArgument("Sequence mask needs a lengths column".into()))?;
        column.iter().map(|value| self.mask(value)).collect()
    }
}

/// Register a square sequence mask over the lengths tensors of `column`
pub fn sequence_mask(
    frame: &Dataframe,
    column: ColumnId,
    variable_length: bool,
    max_length: usize,
) -> Result<ColumnId> {
    if max_length == 0 {
        return Err(Error::InvalidArgument("Mask length must be at least 1".into()));
    }
    let id = frame.register_map(SequenceMask::new(variable_length, max_length), &[column])?;
    debug!(frame = %frame.id(), column, id, variable_length, max_length, "registered sequence mask");
    Ok(id)
}

/// Cut padded sequences down to the longest real length of their batch
///
/// Takes a `[b, L]` tensor and an `I32[b]` lengths tensor and keeps the
/// first `max(lengths)` entries of every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct Truncate;

impl Truncate {
    fn truncate(input: &Value, lengths_value: &Value) -> Result<Value> {
        let tensor = input.expect_tensor()?;
        let lengths = lengths(lengths_value)?;
        let (batch, width) = match tensor.shape() {
            &[batch, width] if batch == lengths.len() => (batch, width),
            shape => {
                return Err(Error::TypeMismatch(format!(
                    "expected a [{}, L] tensor, found {shape:?}",
                    lengths.len()
                )))
            }
        };
        let keep = lengths
            .iter()
            .map(|&len| clamp_length(len, width))
            .max()
            .unwrap_or(0);

        let out = match tensor.data() {
            TensorData::F32(data) => keep_prefix::<f32>(data, batch, width, keep)?,
            TensorData::I32(data) => keep_prefix::<i32>(data, batch, width, keep)?,
        };
        Ok(Value::from(out))
    }
}

fn keep_prefix<T: Element>(data: &[T], batch: usize, width: usize, keep: usize) -> Result<Tensor> {
    let mut out = Vec::with_capacity(batch * keep);
    for row in data.chunks(width.max(1)).take(batch) {
        out.extend_from_slice(&row[..keep]);
    }
    Tensor::from_vec(out, vec![batch, keep])
}

impl MapTransform for Truncate {
    fn apply(&self, inputs: &[Vec<Value>], _batch_size: usize, _ctx: &FillContext<'_>) -> Result<Vec<Value>> {
        let [inputs, lengths] = inputs else {
            return Err(Error::InvalidArgument(
                "Truncate needs an input and a lengths column".into(),
            ));
        };
        inputs
            .iter()
            .zip(lengths)
            .map(|(input, lengths)| Self::truncate(input, lengths))
            .collect()
    }
}

/// Register a column truncating the `[b, L]` tensors of `input` to the
/// longest length in the matching row of `lengths`
pub fn truncate(frame: &Dataframe, input: ColumnId, lengths: ColumnId) -> Result<ColumnId> {
    let id = frame.register_map(Truncate, &[input, lengths])?;
    debug!(frame = %frame.id(), input, lengths, id, "registered truncate");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lengths_value(lengths: &[i32]) -> Value {
        Value::from(Tensor::from_vec(lengths.to_vec(), vec![lengths.len()]).unwrap())
    }

    #[test]
    fn test_fixed_mask() {
        let mask = SequenceMask::new(false, 4).mask(&lengths_value(&[2, 3])).unwrap();
        let tensor = mask.expect_tensor().unwrap();
        assert_eq!(tensor.shape(), &[2, 4, 4]);
        #[rustfmt::skip]
        let expected = [
            1, 1, 0, 0,
            1, 1, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
            1, 1, 1, 0,
            1, 1, 1, 0,
            1, 1, 1, 0,
            0, 0, 0, 0,
        ];
        assert_eq!(tensor.as_slice::<i32>(), Some(&expected[..]));
    }

    #[test]
    fn test_variable_mask() {
        let mask = SequenceMask::new(true, 4).mask(&lengths_value(&[2, 3])).unwrap();
        let tensor = mask.expect_tensor().unwrap();
        assert_eq!(tensor.shape(), &[2, 3, 3]);
        #[rustfmt::skip]
        let expected = [
            1, 1, 0,
            1, 1, 0,
            0, 0, 0,
            1, 1, 1,
            1, 1, 1,
            1, 1, 1,
        ];
        assert_eq!(tensor.as_slice::<i32>(), Some(&expected[..]));
    }

    #[test]
    fn test_lengths_are_clamped() {
        let mask = SequenceMask::new(false, 2).mask(&lengths_value(&[5, -1])).unwrap();
        assert_eq!(
            mask.expect_tensor().unwrap().as_slice::<i32>(),
            Some(&[1, 1, 1, 1, 0, 0, 0, 0][..])
        );
    }

    #[test]
    fn test_truncate_keeps_longest_prefix() {
        let input = Value::from(Tensor::from_vec((1..=8).map(|v| v as f32).collect(), vec![2, 4]).unwrap());
        let out = Truncate::truncate(&input, &lengths_value(&[2, 3])).unwrap();
        let tensor = out.expect_tensor().unwrap();
        assert_eq!(tensor.shape(), &[2, 3]);
        assert_eq!(tensor.as_slice::<f32>(), Some(&[1.0, 2.0, 3.0, 5.0, 6.0, 7.0][..]));
    }

    #[test]
    fn test_truncate_rejects_mismatched_batch() {
        let input = Value::from(Tensor::from_vec(vec![0i32; 6], vec![3, 2]).unwrap());
        assert!(matches!(
            Truncate::truncate(&input, &lengths_value(&[1, 2])),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            SequenceMask::new(false, 2).mask(&Value::Int(3)),
            Err(Error::TypeMismatch(_))
        ));
    }
}
