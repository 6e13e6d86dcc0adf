//! Lazy columnar dataframe for ML data pipelines
//!
//! A [`Dataframe`] is a store of equally long columns. Columns are either
//! externally supplied per-row accessors or derivation nodes (maps, windowed
//! reductions, tuples and tuple extractions) over previously registered
//! columns. Nothing is computed at registration time: values are produced
//! lazily, in batches, when a [`Cursor`] walks the store, and each value is
//! computed at most once while the cursor holds it in its cache.
//!
//! ```
//! use colframe_core::{Dataframe, FillContext, Result, Value};
//!
//! let frame = Dataframe::new(4);
//! let x = frame.register_source(|rows: &[usize], _ctx: &FillContext<'_>| -> Result<Vec<Value>> {
//!     Ok(rows.iter().map(|&r| Value::from(r as i64)).collect())
//! });
//! let sums = frame.register_reduce(
//!     |window: &[Value], _ctx: &FillContext<'_>| -> Result<Value> {
//!         Ok(Value::from(window.iter().filter_map(Value::as_int).sum::<i64>()))
//!     },
//!     x,
//!     2,
//! )?;
//!
//! let rows: Vec<_> = sums.iter(&[0])?.collect::<Result<_>>()?;
//! assert_eq!(rows, vec![vec![Value::Int(1)], vec![Value::Int(5)]]);
//! # Ok::<(), colframe_core::Error>(())
//! ```

#![warn(missing_docs)]

mod cache;
pub mod column;
pub mod config;
pub mod cursor;
pub mod error;
mod eval;
pub mod frame;
mod shuffle;
pub mod source;
pub mod stream;
pub mod tensor;
pub mod transform;
pub mod value;

// Re-export key types for convenience
pub use column::{ColumnId, ColumnKind, FillContext};
pub use config::CursorConfig;
pub use cursor::{Cursor, CursorStats, Row};
pub use error::{Error, Result};
pub use frame::Dataframe;
pub use source::{RowSource, VecSource};
pub use stream::{HostStream, Stream, StreamAffinity};
pub use tensor::{Element, ElementType, Tensor, TensorData};
pub use transform::{Aggregator, MapTransform, RowFn};
pub use value::{Handle, Value};
