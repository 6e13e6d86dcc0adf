//! In-memory array adapter

use std::sync::Arc;

use colframe_core::{Dataframe, RowSource, Value, VecSource};
use tracing::debug;

use crate::error::{Error, Result};

/// Build a single-column dataframe whose rows are `values`
pub fn from_values(values: Vec<Value>) -> Dataframe {
    let source = VecSource::new(values);
    let frame = Dataframe::new(source.len());
    frame.register_source(source);
    debug!(frame = %frame.id(), rows = frame.row_count(), "dataframe from values");
    frame
}

/// Build a dataframe with one source column per input vector
///
/// Every column must have the same length; an empty input gives a
/// zero-row, zero-column store.
pub fn from_columns(columns: Vec<Vec<Value>>) -> Result<Dataframe> {
    let row_count = columns.first().map_or(0, Vec::len);
    if let Some((index, column)) = columns
        .iter()
        .enumerate()
        .find(|(_, column)| column.len() != row_count)
    {
        return Err(Error::InvalidArgument(format!(
            "column {index} has {} rows, expected {row_count}",
            column.len()
        )));
    }

    let sources = columns
        .into_iter()
        .map(|column| Arc::new(VecSource::new(column)) as Arc<dyn RowSource>)
        .collect();
    let frame = Dataframe::from_sources(row_count, sources);
    debug!(
        frame = %frame.id(),
        rows = row_count,
        columns = frame.column_count(),
        "dataframe from columns"
    );
    Ok(frame)
}

/// Build a single-column dataframe from anything convertible into values
pub fn from_iter<I, T>(items: I) -> Dataframe
where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
{
    from_values(items.into_iter().map(Into::into).collect())
}
