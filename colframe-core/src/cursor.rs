//! Sequential, memoizing iteration over a dataframe

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::CacheSet;
use crate::column::{ColumnDef, ColumnId};
use crate::config::CursorConfig;
use crate::error::{Error, Result};
use crate::eval::Resolver;
use crate::frame::Dataframe;
use crate::stream::Stream;
use crate::value::Value;

/// One row of a cursor: a value per requested column, in request order
pub type Row = Vec<Value>;

/// Counters describing the work a cursor has done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStats {
    /// Calls into sources, map transforms and aggregators
    pub upstream_calls: u64,
    /// Calls into sources only
    pub source_fetches: u64,
    /// Values served from a column cache
    pub cache_hits: u64,
    /// Values that had to be computed
    pub cache_misses: u64,
}

/// Iteration state over a fixed set of columns of a [`Dataframe`]
///
/// The cursor snapshots the store's columns and row order when it is
/// created; columns registered or reshuffles made afterwards are only seen
/// by cursors created later. Values are computed lazily and at most once per
/// cache window: rows that were prefetched or peeked are served from the
/// per-column caches when the cursor reaches them.
pub struct Cursor {
    frame: Dataframe,
    defs: Vec<Arc<ColumnDef>>,
    order: Option<Arc<[usize]>>,
    columns: Vec<ColumnId>,
    position: usize,
    prefetched: usize,
    caches: CacheSet,
    stream: Option<Arc<dyn Stream>>,
    config: CursorConfig,
    stats: CursorStats,
}

impl Cursor {
    pub(crate) fn new(frame: Dataframe, columns: &[ColumnId], config: CursorConfig) -> Result<Self> {
        let defs = frame.snapshot();
        if let Some(&bad) = columns.iter().find(|&&column| column >= defs.len()) {
            return Err(Error::out_of_range(bad, defs.len()));
        }
        let caches = CacheSet::new(defs.len(), 0, config.initial_cache_capacity);
        let order = frame.permutation();

        debug!(
            store = %frame.id(),
            columns = columns.len(),
            rows = frame.row_count(),
            shuffled = order.is_some(),
            "cursor created"
        );

        Ok(Self {
            frame,
            defs,
            order,
            columns: columns.to_vec(),
            position: 0,
            prefetched: 0,
            caches,
            stream: None,
            config,
            stats: CursorStats::default(),
        })
    }

    /// Attach the execution stream handed to sources and stream-affine maps
    #[must_use]
    pub fn with_stream(mut self, stream: Arc<dyn Stream>) -> Self {
        self.stream = Some(stream);
        self
    }

    /// The store this cursor iterates
    pub fn frame(&self) -> &Dataframe {
        &self.frame
    }

    /// The requested columns, in row order
    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    /// Row count of the underlying store
    pub fn row_count(&self) -> usize {
        self.frame.row_count()
    }

    /// Logical position of the next row to be returned
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of rows ahead of the position that are already computed
    pub fn prefetched(&self) -> usize {
        self.prefetched
    }

    /// Whether every row has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.row_count()
    }

    /// Work counters since creation
    pub fn stats(&self) -> CursorStats {
        self.stats
    }

    /// The cursor's configuration
    pub fn config(&self) -> &CursorConfig {
        &self.config
    }

    /// Return the next row, or `None` once all rows have been consumed
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.next_rows(1)?.and_then(|mut rows| rows.pop()))
    }

    /// Return up to `count` rows and advance past them
    ///
    /// Fewer rows are returned when fewer remain. `None` means the cursor
    /// was already exhausted; the position is left unchanged. A request for
    /// zero rows returns an empty batch without touching any column.
    pub fn next_rows(&mut self, count: usize) -> Result<Option<Vec<Row>>> {
        if count == 0 {
            return Ok(Some(Vec::new()));
        }
        let remaining = self.row_count().saturating_sub(self.position);
        if remaining == 0 {
            return Ok(None);
        }

        let n = count.min(remaining);
        let positions: Vec<usize> = (self.position..self.position + n).collect();
        let columns = self.fill(&positions)?;
        self.advance(n);

        Ok(Some(transpose(columns, n)))
    }

    /// Advance past up to `count` rows without computing them
    ///
    /// Returns the number of rows skipped.
    pub fn skip_rows(&mut self, count: usize) -> usize {
        let n = count.min(self.row_count().saturating_sub(self.position));
        self.advance(n);
        n
    }

    /// Compute up to `count` rows beyond the prefetch frontier
    ///
    /// The request is clamped to the rows that remain; the number of rows
    /// actually prefetched is returned. Fails with
    /// [`Error::PrefetchOverflow`] when the frontier already sits at the end
    /// of the store; a request for zero rows always returns `Ok(0)`. If an
    /// upstream call fails, nothing computed by this call stays cached and
    /// the frontier does not move.
    pub fn prefetch(&mut self, count: usize) -> Result<usize> {
        if count == 0 {
            return Ok(0);
        }
        let row_count = self.row_count();
        let frontier = self.position + self.prefetched;
        if frontier >= row_count {
            return Err(Error::PrefetchOverflow { frontier, row_count });
        }

        let n = count.min(row_count - frontier);
        let positions: Vec<usize> = (frontier..frontier + n).collect();
        self.fill(&positions)?;
        self.prefetched += n;

        debug!(frontier, rows = n, "prefetched");
        Ok(n)
    }

    /// Value of `column` at `lookahead` rows past the position
    ///
    /// Any column of the store may be peeked, not just the requested ones.
    /// The value is memoized, so a later [`next_row`](Self::next_row) does
    /// not compute it again. Returns `None` past the last row.
    pub fn peek(&mut self, column: ColumnId, lookahead: usize) -> Result<Option<Value>> {
        if column >= self.defs.len() {
            return Err(Error::out_of_range(column, self.defs.len()));
        }
        let target = match self.position.checked_add(lookahead) {
            Some(target) if target < self.row_count() => target,
            _ => return Ok(None),
        };

        let mut values = self.resolver().fill(&[column], &[target])?;
        Ok(values.pop().and_then(|mut values| values.pop()))
    }

    /// Move to logical row `position`, discarding all cached and prefetched
    /// values
    ///
    /// Positioning at the row count is allowed and yields an exhausted
    /// cursor.
    pub fn set_cursor(&mut self, position: usize) -> Result<()> {
        let row_count = self.row_count();
        if position > row_count {
            return Err(Error::out_of_range(position, row_count + 1));
        }

        self.caches.reset(position);
        self.position = position;
        self.prefetched = 0;

        debug!(position, "cursor repositioned");
        Ok(())
    }

    /// Total values currently memoized across all column caches
    pub fn cached_values(&self) -> usize {
        self.caches.cached_rows()
    }

    fn resolver(&mut self) -> Resolver<'_> {
        Resolver {
            defs: &self.defs,
            order: self.order.as_deref(),
            caches: &mut self.caches,
            stream: self.stream.as_deref(),
            synchronize: self.config.synchronize_streams,
            stats: &mut self.stats,
            journal: Vec::new(),
        }
    }

    /// Resolve every requested column at `positions`
    fn fill(&mut self, positions: &[usize]) -> Result<Vec<Vec<Value>>> {
        let columns = self.columns.clone();
        self.resolver().fill(&columns, positions)
    }

    fn advance(&mut self, n: usize) {
        self.position += n;
        self.prefetched = self.prefetched.saturating_sub(n);
        self.caches.advance_to(self.position);
        trace!(position = self.position, "advanced");
    }
}

/// Turn per-column value vectors into rows
fn transpose(columns: Vec<Vec<Value>>, rows: usize) -> Vec<Row> {
    let mut columns: Vec<_> = columns.into_iter().map(Vec::into_iter).collect();
    (0..rows)
        .map(|_| {
            columns
                .iter_mut()
                .map(|values| values.next().unwrap_or_default())
                .collect()
        })
        .collect()
}

impl Iterator for Cursor {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.row_count().saturating_sub(self.position);
        (0, Some(remaining))
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("store", &self.frame.id())
            .field("columns", &self.columns)
            .field("position", &self.position)
            .field("prefetched", &self.prefetched)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::column::FillContext;

    fn counted_source(frame: &Dataframe) -> (ColumnId, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = frame.register_source(move |rows: &[usize], _ctx: &FillContext<'_>| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(rows.iter().map(|&r| Value::from(r as i64)).collect())
        });
        (id, calls)
    }

    #[test]
    fn test_next_rows_returns_short_tail() {
        let frame = Dataframe::new(5);
        let (col, _) = counted_source(&frame);
        let mut cursor = frame.iter(&[col]).unwrap();

        assert_eq!(cursor.next_rows(3).unwrap().unwrap().len(), 3);
        let tail = cursor.next_rows(3).unwrap().unwrap();
        assert_eq!(tail, vec![vec![Value::Int(3)], vec![Value::Int(4)]]);
        assert!(cursor.next_rows(3).unwrap().is_none());
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn test_zero_count_does_not_advance() {
        let frame = Dataframe::new(2);
        let (col, calls) = counted_source(&frame);
        let mut cursor = frame.iter(&[col]).unwrap();

        assert_eq!(cursor.next_rows(0).unwrap(), Some(Vec::new()));
        assert_eq!(cursor.position(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_prefetch_clamps_then_overflows() {
        let frame = Dataframe::new(4);
        let (col, calls) = counted_source(&frame);
        let mut cursor = frame.iter(&[col]).unwrap();

        assert_eq!(cursor.prefetch(10).unwrap(), 4);
        assert_eq!(cursor.prefetched(), 4);
        assert!(matches!(
            cursor.prefetch(1),
            Err(Error::PrefetchOverflow { frontier: 4, row_count: 4 })
        ));

        let rows: Vec<Row> = cursor.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cursor.prefetched(), 0);
    }

    #[test]
    fn test_skip_does_not_compute() {
        let frame = Dataframe::new(6);
        let (col, calls) = counted_source(&frame);
        let mut cursor = frame.iter(&[col]).unwrap();

        assert_eq!(cursor.skip_rows(4), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cursor.next_row().unwrap(), Some(vec![Value::Int(4)]));
        assert_eq!(cursor.skip_rows(10), 1);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_peek_is_memoized() {
        let frame = Dataframe::new(3);
        let (col, calls) = counted_source(&frame);
        let mut cursor = frame.iter(&[col]).unwrap();

        assert_eq!(cursor.peek(col, 1).unwrap(), Some(Value::Int(1)));
        assert_eq!(cursor.peek(col, 1).unwrap(), Some(Value::Int(1)));
        assert_eq!(cursor.peek(col, 3).unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cursor.next_row().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        cursor.next_row().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cursor.stats().cache_hits, 2);
    }

    #[test]
    fn test_set_cursor_bounds() {
        let frame = Dataframe::new(3);
        let (col, _) = counted_source(&frame);
        let mut cursor = frame.iter(&[col]).unwrap();

        cursor.set_cursor(3).unwrap();
        assert!(cursor.next_row().unwrap().is_none());
        assert!(matches!(
            cursor.set_cursor(4),
            Err(Error::IndexOutOfRange { index: 4, .. })
        ));
    }

    #[test]
    fn test_caches_are_evicted_behind_the_position() {
        let frame = Dataframe::new(8);
        let (col, _) = counted_source(&frame);
        let mut cursor = frame.iter(&[col]).unwrap();

        cursor.prefetch(6).unwrap();
        assert_eq!(cursor.cached_values(), 6);
        cursor.next_rows(4).unwrap();
        assert_eq!(cursor.cached_values(), 2);
        assert_eq!(cursor.prefetched(), 2);
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let frame = Dataframe::new(3);
        let (col, _) = counted_source(&frame);
        assert!(matches!(
            frame.iter(&[col, 7]),
            Err(Error::IndexOutOfRange { index: 7, len: 1 })
        ));
        let mut cursor = frame.iter(&[col]).unwrap();
        assert!(cursor.peek(3, 0).is_err());
    }
}
