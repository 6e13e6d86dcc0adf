//! Execution streams handed to transforms that dispatch work elsewhere
//!
//! The cursor never parallelizes on its own. A stream attached to a cursor
//! is passed to sources and to map transforms registered with a
//! [`StreamAffinity`]; after such a fill the cursor synchronizes the stream
//! before it treats the rows as cached.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Where a transform prefers its work to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamAffinity {
    /// The caller's thread
    Host,

    /// An accelerator queue, identified by device ordinal
    Device(u32),
}

/// An execution queue supplied by the caller of a cursor operation
pub trait Stream: Send + Sync {
    /// The placement of this stream
    fn affinity(&self) -> StreamAffinity;

    /// Block until all work enqueued on this stream has completed
    fn synchronize(&self) -> Result<()>;
}

/// A stream that runs everything inline on the caller's thread
#[derive(Debug, Default, Clone, Copy)]
pub struct HostStream;

impl Stream for HostStream {
    fn affinity(&self) -> StreamAffinity {
        StreamAffinity::Host
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}
