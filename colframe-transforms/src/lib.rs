//! Map and reduce specializations for colframe dataframes
//!
//! Each helper registers an ordinary derived column (or, for batching, a
//! reduce-derived store), so results are computed lazily and cached by the
//! cursor like any other column.

#![warn(missing_docs)]

pub mod batch;
pub mod encode;
pub mod sequence;

pub use batch::batching;
pub use encode::{copy_scalar, one_hot, OneHot, OneHotOptions};
pub use sequence::{sequence_mask, truncate, SequenceMask, Truncate};
