//! Batching rows of tensors into larger tensors

use colframe_core::{ColumnId, Dataframe, Error, FillContext, Result, Tensor, Value};
use tracing::debug;

/// Aggregator stacking a window of tuple rows into per-group batches
#[derive(Debug, Clone, Copy)]
struct Batcher {
    width: usize,
    batch_size: usize,
    group_count: usize,
}

impl Batcher {
    fn stack_group(&self, rows: &[Value], out: &mut Vec<Value>) -> Result<()> {
        for member in 0..self.width {
            let tensors = rows
                .iter()
                .map(|row| Ok(row.member(member)?.expect_tensor()?.as_ref()))
                .collect::<Result<Vec<&Tensor>>>()?;
            out.push(Value::from(Tensor::stack(&tensors)?));
        }
        Ok(())
    }
}

impl colframe_core::Aggregator for Batcher {
    fn aggregate(&self, window: &[Value], _ctx: &FillContext<'_>) -> Result<Value> {
        let mut out = Vec::with_capacity(self.width * self.group_count);
        for group in window.chunks(self.batch_size).take(self.group_count) {
            self.stack_group(group, &mut out)?;
        }
        Ok(Value::tuple(out))
    }
}

/// Batch tensor columns into a new store
///
/// Each row of the returned store's column 0 is a tuple of
/// `group_count * columns.len()` tensors in group-major order: for every
/// group, one tensor per input column stacking up to `batch_size`
/// consecutive rows along a new leading axis. The last row may hold fewer
/// rows per group, and groups with no rows left are omitted.
///
/// The input columns are packed into a tuple column registered on `frame`.
pub fn batching(
    frame: &Dataframe,
    columns: &[ColumnId],
    batch_size: usize,
    group_count: usize,
) -> Result<Dataframe> {
    if batch_size == 0 || group_count == 0 {
        return Err(Error::InvalidArgument(format!(
            "Batch size and group count must be positive, got {batch_size} and {group_count}"
        )));
    }

    let tuple = frame.register_tuple(columns)?;
    let batcher = Batcher {
        width: columns.len(),
        batch_size,
        group_count,
    };
    let batched = frame.register_reduce(batcher, tuple, batch_size * group_count)?;
    debug!(
        frame = %frame.id(),
        batched = %batched.id(),
        batch_size,
        group_count,
        "registered batching"
    );
    Ok(batched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use colframe_core::Aggregator;

    fn vector(values: &[f32]) -> Value {
        Value::from(Tensor::from_vec(values.to_vec(), vec![values.len()]).unwrap())
    }

    #[test]
    fn test_short_window_omits_empty_groups() {
        let batcher = Batcher {
            width: 2,
            batch_size: 2,
            group_count: 3,
        };
        let rows: Vec<Value> = (0..3)
            .map(|i| Value::tuple(vec![vector(&[i as f32]), vector(&[10.0 + i as f32, 0.0])]))
            .collect();

        let out = batcher.aggregate(&rows, &FillContext::new(0, None)).unwrap();
        let members = out.as_tuple().unwrap();
        assert_eq!(members.len(), 4);
        assert_eq!(members[0].expect_tensor().unwrap().shape(), &[2, 1]);
        assert_eq!(members[1].expect_tensor().unwrap().shape(), &[2, 2]);
        assert_eq!(members[2].expect_tensor().unwrap().shape(), &[1, 1]);
        assert_eq!(
            members[3].expect_tensor().unwrap().as_slice::<f32>(),
            Some(&[12.0, 0.0][..])
        );
    }

    #[test]
    fn test_non_tensor_member_is_rejected() {
        let batcher = Batcher {
            width: 1,
            batch_size: 2,
            group_count: 1,
        };
        let rows = vec![Value::tuple(vec![Value::Int(1)])];
        assert!(matches!(
            batcher.aggregate(&rows, &FillContext::new(0, None)),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_rejects_empty_batches() {
        let frame = Dataframe::new(4);
        assert!(batching(&frame, &[], 2, 1).is_err());
        assert!(matches!(batching(&frame, &[0], 0, 1), Err(Error::InvalidArgument(_))));
    }
}
