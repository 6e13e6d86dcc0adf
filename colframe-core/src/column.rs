//! Column definitions: the derivation nodes of a dataframe

use std::fmt;
use std::sync::Arc;

use crate::frame::Dataframe;
use crate::source::RowSource;
use crate::stream::{Stream, StreamAffinity};
use crate::transform::{Aggregator, MapTransform};

/// Index of a column within its store
pub type ColumnId = usize;

/// Context handed to every upstream invocation
#[derive(Clone, Copy)]
pub struct FillContext<'a> {
    column: ColumnId,
    stream: Option<&'a dyn Stream>,
}

impl<'a> FillContext<'a> {
    /// Create a context for a fill of `column`
    pub fn new(column: ColumnId, stream: Option<&'a dyn Stream>) -> Self {
        Self { column, stream }
    }

    /// The column being filled
    pub fn column(&self) -> ColumnId {
        self.column
    }

    /// The stream to enqueue work on, if the column asked for one
    pub fn stream(&self) -> Option<&'a dyn Stream> {
        self.stream
    }
}

impl fmt::Debug for FillContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillContext")
            .field("column", &self.column)
            .field("stream", &self.stream.map(Stream::affinity))
            .finish()
    }
}

/// Kind of a registered column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Externally supplied per-row accessor
    Source,
    /// Row-wise transform over other columns
    Map,
    /// Windowed aggregation of another store's column
    Reduce,
    /// Composite of several columns
    Tuple,
    /// One member of a tuple column
    Extract,
}

/// Windowed aggregation reading a column of another store
#[derive(Clone)]
pub(crate) struct ReduceDef {
    /// Durable reference to the source store
    pub(crate) source: Dataframe,
    pub(crate) column: ColumnId,
    pub(crate) window: usize,
    /// Source logical order captured at registration
    pub(crate) order: Option<Arc<[usize]>>,
    pub(crate) aggregator: Arc<dyn Aggregator>,
}

#[derive(Clone)]
pub(crate) enum ColumnDef {
    Source {
        source: Arc<dyn RowSource>,
    },
    Map {
        transform: Arc<dyn MapTransform>,
        dependencies: Vec<ColumnId>,
        stream_affinity: Option<StreamAffinity>,
    },
    Reduce(ReduceDef),
    Tuple {
        members: Vec<ColumnId>,
    },
    Extract {
        tuple: ColumnId,
        member: usize,
    },
}

impl ColumnDef {
    pub(crate) fn kind(&self) -> ColumnKind {
        match self {
            ColumnDef::Source { .. } => ColumnKind::Source,
            ColumnDef::Map { .. } => ColumnKind::Map,
            ColumnDef::Reduce(_) => ColumnKind::Reduce,
            ColumnDef::Tuple { .. } => ColumnKind::Tuple,
            ColumnDef::Extract { .. } => ColumnKind::Extract,
        }
    }
}

impl fmt::Debug for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnDef::Source { .. } => f.write_str("Source"),
            ColumnDef::Map {
                dependencies,
                stream_affinity,
                ..
            } => f
                .debug_struct("Map")
                .field("dependencies", dependencies)
                .field("stream_affinity", stream_affinity)
                .finish_non_exhaustive(),
            ColumnDef::Reduce(def) => f
                .debug_struct("Reduce")
                .field("source", &def.source.id())
                .field("column", &def.column)
                .field("window", &def.window)
                .finish_non_exhaustive(),
            ColumnDef::Tuple { members } => f.debug_struct("Tuple").field("members", members).finish(),
            ColumnDef::Extract { tuple, member } => f
                .debug_struct("Extract")
                .field("tuple", tuple)
                .field("member", member)
                .finish(),
        }
    }
}
