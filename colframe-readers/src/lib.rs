//! Source adapters for colframe dataframes
//!
//! Ingestion collaborators that present external data as source columns:
//! in-memory value arrays and CSV text. Each adapter returns a ready
//! [`Dataframe`](colframe_core::Dataframe) whose columns can be derived from
//! like any other.

#![warn(missing_docs)]

mod error;

pub mod array;
pub mod csv;

pub use crate::array::{from_columns, from_iter, from_values};
pub use crate::csv::{from_csv_path, from_csv_reader, CsvOptions};
pub use crate::error::{Error, Result};
