//! The column store: a fixed row count and an append-only column registry

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use static_assertions::assert_impl_all;
use tracing::debug;
use uuid::Uuid;

use crate::column::{ColumnDef, ColumnId, ColumnKind, ReduceDef};
use crate::config::CursorConfig;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::shuffle;
use crate::source::RowSource;
use crate::stream::StreamAffinity;
use crate::transform::{Aggregator, MapTransform};

/// A lazily evaluated dataframe
///
/// Cloning is cheap and yields another handle to the same store. Columns
/// are only ever appended, so ids stay valid for the lifetime of the store;
/// stores derived by [`Dataframe::register_reduce`] keep their source alive.
#[derive(Clone)]
pub struct Dataframe {
    inner: Arc<FrameInner>,
}

assert_impl_all!(Dataframe: Send, Sync, Clone);

struct FrameInner {
    /// Identity used in log events
    id: Uuid,

    /// Number of rows every column of this store has
    row_count: usize,

    /// Column registry, index = column id
    columns: RwLock<Vec<Arc<ColumnDef>>>,

    /// Optional column names
    names: RwLock<HashMap<String, ColumnId>>,

    /// Logical position -> physical row, identity when `None`
    permutation: RwLock<Option<Arc<[usize]>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn check_dependency(column: ColumnId, column_count: usize) -> Result<()> {
    if column < column_count {
        Ok(())
    } else {
        Err(Error::InvalidDependency {
            column,
            column_count,
        })
    }
}

impl Dataframe {
    /// Create an empty store with the given row count
    pub fn new(row_count: usize) -> Self {
        let id = Uuid::new_v4();
        debug!(frame = %id, row_count, "created dataframe");
        Self {
            inner: Arc::new(FrameInner {
                id,
                row_count,
                columns: RwLock::new(Vec::new()),
                names: RwLock::new(HashMap::new()),
                permutation: RwLock::new(None),
            }),
        }
    }

    /// Create a store whose first columns are the given sources, in order
    pub fn from_sources(row_count: usize, sources: Vec<Arc<dyn RowSource>>) -> Self {
        let frame = Self::new(row_count);
        for source in sources {
            frame.register_source_arc(source);
        }
        frame
    }

    /// Identity of this store
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Number of rows; authoritative for every cursor over this store
    pub fn row_count(&self) -> usize {
        self.inner.row_count
    }

    /// Number of registered columns
    pub fn column_count(&self) -> usize {
        read(&self.inner.columns).len()
    }

    /// Append a source column
    pub fn register_source<S: RowSource + 'static>(&self, source: S) -> ColumnId {
        self.register_source_arc(Arc::new(source))
    }

    /// Append a source column from a shared accessor
    pub fn register_source_arc(&self, source: Arc<dyn RowSource>) -> ColumnId {
        self.push(ColumnDef::Source { source })
    }

    /// Append a map column over one or more existing columns
    pub fn register_map<T: MapTransform + 'static>(
        &self,
        transform: T,
        dependencies: &[ColumnId],
    ) -> Result<ColumnId> {
        self.register_map_inner(Arc::new(transform), dependencies, None)
    }

    /// Append a map column whose transform receives the cursor's stream
    pub fn register_map_on<T: MapTransform + 'static>(
        &self,
        transform: T,
        dependencies: &[ColumnId],
        affinity: StreamAffinity,
    ) -> Result<ColumnId> {
        self.register_map_inner(Arc::new(transform), dependencies, Some(affinity))
    }

    fn register_map_inner(
        &self,
        transform: Arc<dyn MapTransform>,
        dependencies: &[ColumnId],
        stream_affinity: Option<StreamAffinity>,
    ) -> Result<ColumnId> {
        if dependencies.is_empty() {
            return Err(Error::InvalidArgument(
                "A map column needs at least one dependency".into(),
            ));
        }
        self.try_push(|columns| {
            for &dep in dependencies {
                check_dependency(dep, columns.len())?;
            }
            Ok(ColumnDef::Map {
                transform,
                dependencies: dependencies.to_vec(),
                stream_affinity,
            })
        })
    }

    /// Reduce consecutive windows of `column` into a new store
    ///
    /// The new store has `ceil(row_count / window)` rows and a single
    /// column 0. Windows follow this store's logical order as of this call;
    /// the last window may be short.
    pub fn register_reduce<A: Aggregator + 'static>(
        &self,
        aggregator: A,
        column: ColumnId,
        window: usize,
    ) -> Result<Dataframe> {
        if window == 0 {
            return Err(Error::InvalidArgument("Window size must be at least 1".into()));
        }
        check_dependency(column, self.column_count())?;

        let row_count = self.row_count().div_ceil(window);
        let reduced = Dataframe::new(row_count);
        reduced.push(ColumnDef::Reduce(ReduceDef {
            source: self.clone(),
            column,
            window,
            order: self.permutation(),
            aggregator: Arc::new(aggregator),
        }));
        debug!(
            source = %self.id(),
            frame = %reduced.id(),
            column,
            window,
            row_count,
            "registered reduce"
        );
        Ok(reduced)
    }

    /// Append a column packing the given columns into one tuple value
    pub fn register_tuple(&self, members: &[ColumnId]) -> Result<ColumnId> {
        if members.is_empty() {
            return Err(Error::InvalidArgument("A tuple needs at least one member".into()));
        }
        self.try_push(|columns| {
            for &member in members {
                check_dependency(member, columns.len())?;
            }
            Ok(ColumnDef::Tuple {
                members: members.to_vec(),
            })
        })
    }

    /// Append a column reading one member out of a tuple-valued column
    ///
    /// The member index is validated now when `tuple` is a tuple column;
    /// for other columns (e.g. sources producing tuples) it is checked per
    /// row when values are resolved.
    pub fn register_extract(&self, tuple: ColumnId, member: usize) -> Result<ColumnId> {
        self.try_push(|columns| {
            check_dependency(tuple, columns.len())?;
            if let ColumnDef::Tuple { members } = columns[tuple].as_ref() {
                if member >= members.len() {
                    return Err(Error::out_of_range(member, members.len()));
                }
            }
            Ok(ColumnDef::Extract { tuple, member })
        })
    }

    /// Number of members of a tuple column
    pub fn tuple_size(&self, column: ColumnId) -> Result<usize> {
        match self.column(column)?.as_ref() {
            ColumnDef::Tuple { members } => Ok(members.len()),
            other => Err(Error::TypeMismatch(format!(
                "column {column} is a {:?} column, not a tuple",
                other.kind()
            ))),
        }
    }

    /// Kind of a registered column
    pub fn column_kind(&self, column: ColumnId) -> Result<ColumnKind> {
        Ok(self.column(column)?.kind())
    }

    /// Attach a name to a column
    ///
    /// A name refers to at most one column; naming a second column with it
    /// fails with [`Error::InvalidArgument`].
    pub fn name_column(&self, column: ColumnId, name: &str) -> Result<()> {
        check_dependency(column, self.column_count())?;
        let mut names = write(&self.inner.names);
        match names.get(name) {
            Some(&existing) if existing != column => Err(Error::InvalidArgument(format!(
                "Column name {name:?} already refers to column {existing}"
            ))),
            _ => {
                names.insert(name.to_string(), column);
                Ok(())
            }
        }
    }

    /// Look up a column by name
    pub fn column_id(&self, name: &str) -> Option<ColumnId> {
        read(&self.inner.names).get(name).copied()
    }

    /// Install a fresh seeded permutation, replacing any previous one
    pub fn shuffle(&self, seed: u64) {
        let order = shuffle::permutation(self.row_count(), seed);
        *write(&self.inner.permutation) = Some(order);
        debug!(frame = %self.id(), seed, "shuffled dataframe");
    }

    /// The current permutation, `None` while rows are in identity order
    pub fn permutation(&self) -> Option<Arc<[usize]>> {
        read(&self.inner.permutation).clone()
    }

    /// Open a cursor over the given columns
    pub fn iter(&self, columns: &[ColumnId]) -> Result<Cursor> {
        self.iter_with_config(columns, CursorConfig::default())
    }

    /// Open a cursor over the given columns with explicit settings
    pub fn iter_with_config(&self, columns: &[ColumnId], config: CursorConfig) -> Result<Cursor> {
        Cursor::new(self.clone(), columns, config)
    }

    pub(crate) fn column(&self, column: ColumnId) -> Result<Arc<ColumnDef>> {
        let columns = read(&self.inner.columns);
        columns
            .get(column)
            .cloned()
            .ok_or_else(|| Error::out_of_range(column, columns.len()))
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<ColumnDef>> {
        read(&self.inner.columns).clone()
    }

    fn push(&self, def: ColumnDef) -> ColumnId {
        let mut columns = write(&self.inner.columns);
        columns.push(Arc::new(def));
        columns.len() - 1
    }

    fn try_push(
        &self,
        build: impl FnOnce(&[Arc<ColumnDef>]) -> Result<ColumnDef>,
    ) -> Result<ColumnId> {
        let mut columns = write(&self.inner.columns);
        let def = build(&columns)?;
        columns.push(Arc::new(def));
        Ok(columns.len() - 1)
    }
}

impl fmt::Debug for Dataframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataframe")
            .field("id", &self.inner.id)
            .field("row_count", &self.inner.row_count)
            .field("columns", &*read(&self.inner.columns))
            .field("shuffled", &read(&self.inner.permutation).is_some())
            .finish()
    }
}
