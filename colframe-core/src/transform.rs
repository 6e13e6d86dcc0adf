//! Transform traits for derived columns

use crate::column::FillContext;
use crate::error::Result;
use crate::value::Value;

/// A row-wise transform behind a map column
///
/// `inputs` holds one vector per dependency column, each with `batch_size`
/// values in row order. The transform must return exactly `batch_size`
/// outputs, one per row, in the same order.
pub trait MapTransform: Send + Sync {
    /// Transform a batch of rows
    fn apply(&self, inputs: &[Vec<Value>], batch_size: usize, ctx: &FillContext<'_>) -> Result<Vec<Value>>;
}

impl<F> MapTransform for F
where
    F: Fn(&[Vec<Value>], usize, &FillContext<'_>) -> Result<Vec<Value>> + Send + Sync,
{
    fn apply(&self, inputs: &[Vec<Value>], batch_size: usize, ctx: &FillContext<'_>) -> Result<Vec<Value>> {
        self(inputs, batch_size, ctx)
    }
}

/// A window aggregation behind a reduce column
///
/// The final window of a store may be short; it receives exactly the
/// remaining values, never padding.
pub trait Aggregator: Send + Sync {
    /// Fold one window into a single value
    fn aggregate(&self, window: &[Value], ctx: &FillContext<'_>) -> Result<Value>;
}

impl<F> Aggregator for F
where
    F: Fn(&[Value], &FillContext<'_>) -> Result<Value> + Send + Sync,
{
    fn aggregate(&self, window: &[Value], ctx: &FillContext<'_>) -> Result<Value> {
        self(window, ctx)
    }
}

/// Adapts a per-row function of a single input column into a [`MapTransform`]
pub struct RowFn<F> {
    func: F,
}

impl<F> RowFn<F>
where
    F: Fn(&Value) -> Result<Value> + Send + Sync,
{
    /// Wrap a per-row function
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> MapTransform for RowFn<F>
where
    F: Fn(&Value) -> Result<Value> + Send + Sync,
{
    fn apply(&self, inputs: &[Vec<Value>], _batch_size: usize, _ctx: &FillContext<'_>) -> Result<Vec<Value>> {
        let column = inputs.first().ok_or_else(|| {
            crate::error::Error::InvalidArgument("row function requires one input column".into())
        })?;
        column.iter().map(&self.func).collect()
    }
}
