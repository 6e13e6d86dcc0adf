//! Source trait for externally supplied column data

use crate::column::FillContext;
use crate::error::Result;
use crate::value::Value;

/// Per-row accessor behind a source column
///
/// `rows` are physical row indices (the store's permutation is already
/// applied). Implementations must return exactly one value per index, in
/// order. Every call is one upstream access: the cursor batches all rows it
/// needs for a fill into a single call.
pub trait RowSource: Send + Sync {
    /// Produce the values for the given rows
    fn fetch(&self, rows: &[usize], ctx: &FillContext<'_>) -> Result<Vec<Value>>;
}

impl<F> RowSource for F
where
    F: Fn(&[usize], &FillContext<'_>) -> Result<Vec<Value>> + Send + Sync,
{
    fn fetch(&self, rows: &[usize], ctx: &FillContext<'_>) -> Result<Vec<Value>> {
        self(rows, ctx)
    }
}

/// A source backed by a shared vector of values
#[derive(Debug, Clone)]
pub struct VecSource {
    values: std::sync::Arc<[Value]>,
}

impl VecSource {
    /// Create a source over the given values
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into(),
        }
    }

    /// Number of rows this source can serve
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the source is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl RowSource for VecSource {
    fn fetch(&self, rows: &[usize], _ctx: &FillContext<'_>) -> Result<Vec<Value>> {
        rows.iter()
            .map(|&row| {
                self.values
                    .get(row)
                    .cloned()
                    .ok_or_else(|| crate::error::Error::out_of_range(row, self.values.len()))
            })
            .collect()
    }
}
