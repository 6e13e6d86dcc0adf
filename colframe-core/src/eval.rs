//! Cache-or-compute resolution of column values
//!
//! Every resolution first consults the per-column cache; the rows that are
//! still missing are computed with one upstream invocation for the whole
//! batch and memoized, so a (column, row) pair is computed at most once for
//! as long as its cache window holds it.

use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::CacheSet;
use crate::column::{ColumnDef, ColumnId, FillContext, ReduceDef};
use crate::cursor::CursorStats;
use crate::error::{Error, Result};
use crate::frame::Dataframe;
use crate::shuffle::physical;
use crate::stream::Stream;
use crate::value::Value;

pub(crate) struct Resolver<'a> {
    pub(crate) defs: &'a [Arc<ColumnDef>],
    /// Logical position -> physical row of the store being resolved
    pub(crate) order: Option<&'a [usize]>,
    pub(crate) caches: &'a mut CacheSet,
    pub(crate) stream: Option<&'a dyn Stream>,
    pub(crate) synchronize: bool,
    pub(crate) stats: &'a mut CursorStats,
    /// Rows memoized by the current fill, undone if the fill fails
    pub(crate) journal: Vec<(ColumnId, usize)>,
}

impl Resolver<'_> {
    /// Resolve several columns at the same positions as one fill
    ///
    /// Either every column resolves, or the caches are left exactly as they
    /// were before the call.
    pub(crate) fn fill(&mut self, columns: &[ColumnId], positions: &[usize]) -> Result<Vec<Vec<Value>>> {
        self.journal.clear();
        let filled = columns
            .iter()
            .map(|&column| self.resolve(column, positions))
            .collect::<Result<Vec<_>>>();
        if filled.is_err() {
            trace!(rows = self.journal.len(), "rolling back failed fill");
            for (column, row) in self.journal.drain(..) {
                self.caches.remove(column, row);
            }
        }
        filled
    }

    /// Values of `column` at the given logical positions, in order
    pub(crate) fn resolve(&mut self, column: ColumnId, positions: &[usize]) -> Result<Vec<Value>> {
        let def = self
            .defs
            .get(column)
            .cloned()
            .ok_or_else(|| Error::out_of_range(column, self.defs.len()))?;

        let missing: Vec<usize> = positions
            .iter()
            .copied()
            .filter(|&p| self.caches.get(column, p).is_none())
            .collect();
        let hits = positions.len() - missing.len();
        self.stats.cache_hits += hits as u64;
        if hits > 0 {
            trace!(column, hits, "cache hit");
        }

        let mut computed = if missing.is_empty() {
            Vec::new().into_iter()
        } else {
            self.stats.cache_misses += missing.len() as u64;
            let values = self.compute(column, &def, &missing)?;
            if values.len() != missing.len() {
                return Err(Error::MissingData {
                    column,
                    expected: missing.len(),
                    actual: values.len(),
                });
            }
            values.into_iter()
        };

        let mut out = Vec::with_capacity(positions.len());
        let mut fresh = Vec::with_capacity(missing.len());
        for &position in positions {
            if let Some(value) = self.caches.get(column, position) {
                out.push(value.clone());
            } else if let Some(value) = computed.next() {
                out.push(value.clone());
                fresh.push((position, value));
            }
        }
        for (position, value) in fresh {
            if self.caches.insert(column, position, value) {
                self.journal.push((column, position));
            }
        }

        Ok(out)
    }

    fn compute(&mut self, column: ColumnId, def: &ColumnDef, positions: &[usize]) -> Result<Vec<Value>> {
        match def {
            ColumnDef::Source { source } => {
                let rows: Vec<usize> = positions.iter().map(|&p| physical(self.order, p)).collect();
                debug!(column, rows = rows.len(), "source fill");
                self.stats.upstream_calls += 1;
                self.stats.source_fetches += 1;
                let values = source.fetch(&rows, &FillContext::new(column, self.stream))?;
                self.sync(self.stream)?;
                Ok(values)
            }
            ColumnDef::Map {
                transform,
                dependencies,
                stream_affinity,
            } => {
                let inputs = dependencies
                    .iter()
                    .map(|&dep| self.resolve(dep, positions))
                    .collect::<Result<Vec<_>>>()?;
                let stream = stream_affinity.and(self.stream);
                debug!(column, rows = positions.len(), "map fill");
                self.stats.upstream_calls += 1;
                let values = transform.apply(&inputs, positions.len(), &FillContext::new(column, stream))?;
                self.sync(stream)?;
                Ok(values)
            }
            ColumnDef::Tuple { members } => {
                let resolved = members
                    .iter()
                    .map(|&member| self.resolve(member, positions))
                    .collect::<Result<Vec<_>>>()?;
                Ok((0..positions.len())
                    .map(|i| Value::tuple(resolved.iter().map(|values| values[i].clone()).collect()))
                    .collect())
            }
            ColumnDef::Extract { tuple, member } => self
                .resolve(*tuple, positions)?
                .iter()
                .map(|value| value.member(*member).cloned())
                .collect(),
            ColumnDef::Reduce(reduce) => self.reduce(column, reduce, positions),
        }
    }

    fn reduce(&mut self, column: ColumnId, def: &ReduceDef, positions: &[usize]) -> Result<Vec<Value>> {
        let source_rows = def.source.row_count();
        let windows: Vec<Range<usize>> = positions
            .iter()
            .map(|&p| {
                let start = physical(self.order, p) * def.window;
                start..(start + def.window).min(source_rows)
            })
            .collect();
        let source_positions: Vec<usize> = windows.iter().flat_map(Clone::clone).collect();

        debug!(
            column,
            windows = windows.len(),
            source = %def.source.id(),
            "reduce fill"
        );
        let values = evaluate(
            &def.source,
            def.column,
            def.order.as_deref(),
            &source_positions,
            self.stream,
            self.synchronize,
            self.stats,
        )?;

        let ctx = FillContext::new(column, None);
        let mut out = Vec::with_capacity(windows.len());
        let mut offset = 0;
        for window in &windows {
            let end = offset + window.len();
            self.stats.upstream_calls += 1;
            out.push(def.aggregator.aggregate(&values[offset..end], &ctx)?);
            offset = end;
        }
        Ok(out)
    }

    fn sync(&self, stream: Option<&dyn Stream>) -> Result<()> {
        match stream {
            Some(stream) if self.synchronize => stream.synchronize(),
            _ => Ok(()),
        }
    }
}

/// Resolve positions of another store with a transient cache
///
/// Used by reduce columns: the source store's values are memoized only for
/// the duration of this one fill, and only for the columns it reads.
pub(crate) fn evaluate(
    frame: &Dataframe,
    column: ColumnId,
    order: Option<&[usize]>,
    positions: &[usize],
    stream: Option<&dyn Stream>,
    synchronize: bool,
    stats: &mut CursorStats,
) -> Result<Vec<Value>> {
    let Some(&base) = positions.iter().min() else {
        return Ok(Vec::new());
    };
    let defs = frame.snapshot();
    let mut caches = CacheSet::new(defs.len(), base, positions.len());

    Resolver {
        defs: &defs,
        order,
        caches: &mut caches,
        stream,
        synchronize,
        stats,
        journal: Vec::new(),
    }
    .resolve(column, positions)
}
