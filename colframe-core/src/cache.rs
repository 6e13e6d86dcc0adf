//! Per-column memo of computed row values

use std::collections::VecDeque;

use crate::column::ColumnId;
use crate::value::Value;

/// A queue of memoized values for consecutive logical rows
///
/// Slot `i` holds row `base + i`; `None` marks a row inside the window that
/// has not been computed yet. Rows before `base` have been consumed and can
/// not be cached again until the window is reset.
#[derive(Debug, Clone, Default)]
pub(crate) struct ColumnCache {
    base: usize,
    slots: VecDeque<Option<Value>>,
}

impl ColumnCache {
    pub(crate) fn with_capacity(base: usize, capacity: usize) -> Self {
        Self {
            base,
            slots: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn get(&self, row: usize) -> Option<&Value> {
        let offset = row.checked_sub(self.base)?;
        self.slots.get(offset)?.as_ref()
    }

    /// Memoize `value` for `row`; rows behind the window are dropped
    ///
    /// Returns whether the value was stored.
    pub(crate) fn insert(&mut self, row: usize, value: Value) -> bool {
        let Some(offset) = row.checked_sub(self.base) else {
            return false;
        };
        if offset >= self.slots.len() {
            self.slots.resize(offset + 1, None);
        }
        self.slots[offset] = Some(value);
        true
    }

    pub(crate) fn remove(&mut self, row: usize) {
        if let Some(slot) = row
            .checked_sub(self.base)
            .and_then(|offset| self.slots.get_mut(offset))
        {
            *slot = None;
        }
    }

    /// Evict every row before `row` and move the window start there
    pub(crate) fn advance_to(&mut self, row: usize) {
        let consumed = row.saturating_sub(self.base);
        if consumed >= self.slots.len() {
            self.slots.clear();
        } else {
            self.slots.drain(..consumed);
        }
        self.base = self.base.max(row);
    }

    /// Drop everything and restart the window at `base`
    pub(crate) fn reset(&mut self, base: usize) {
        self.slots.clear();
        self.base = base;
    }

    /// Number of computed rows currently held
    pub(crate) fn cached_rows(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// The caches of every column of one store
///
/// A column's cache is only allocated once a value of that column is
/// memoized. All windows start at the set's `base`.
#[derive(Debug, Clone, Default)]
pub(crate) struct CacheSet {
    base: usize,
    capacity: usize,
    columns: Vec<Option<ColumnCache>>,
}

impl CacheSet {
    pub(crate) fn new(column_count: usize, base: usize, capacity: usize) -> Self {
        Self {
            base,
            capacity,
            columns: vec![None; column_count],
        }
    }

    pub(crate) fn get(&self, column: ColumnId, row: usize) -> Option<&Value> {
        self.columns.get(column)?.as_ref()?.get(row)
    }

    pub(crate) fn insert(&mut self, column: ColumnId, row: usize, value: Value) -> bool {
        let (base, capacity) = (self.base, self.capacity);
        match self.columns.get_mut(column) {
            Some(slot) => slot
                .get_or_insert_with(|| ColumnCache::with_capacity(base, capacity))
                .insert(row, value),
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, column: ColumnId, row: usize) {
        if let Some(Some(cache)) = self.columns.get_mut(column) {
            cache.remove(row);
        }
    }

    pub(crate) fn advance_to(&mut self, row: usize) {
        self.base = self.base.max(row);
        for cache in self.columns.iter_mut().flatten() {
            cache.advance_to(row);
        }
    }

    /// Release every column cache and restart at `base`
    pub(crate) fn reset(&mut self, base: usize) {
        self.base = base;
        self.columns.iter_mut().for_each(|slot| *slot = None);
    }

    pub(crate) fn cached_rows(&self) -> usize {
        self.columns.iter().flatten().map(ColumnCache::cached_rows).sum()
    }

    /// Number of columns with an allocated cache
    #[cfg(test)]
    pub(crate) fn allocated(&self) -> usize {
        self.columns.iter().flatten().count()
    }
}
