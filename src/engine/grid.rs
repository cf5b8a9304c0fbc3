//! In-memory authoritative grid.
//!
//! The cache maps cell keys to colors. It is derived state: the durable store is
//! the source of truth and [`GridCache::hydrate`] rebuilds the mapping from it
//! at startup. After that the coordinator is its only writer.
//!
//! Lifecycle: construct → hydrate → serve → (optional) [`GridCache::clear`].

use crate::types::{Cell, CellKey};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct GridCache {
    cells: HashMap<CellKey, String>,
}

impl GridCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load persisted cells. Returns the number of cells loaded.
    pub fn hydrate<I>(&mut self, cells: I) -> usize
    where
        I: IntoIterator<Item = Cell>,
    {
        let mut loaded = 0;
        for cell in cells {
            self.cells.insert(cell.key, cell.color);
            loaded += 1;
        }
        loaded
    }

    /// Full key→color mapping, sorted by key so snapshots are deterministic.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(CellKey, String)> {
        let mut entries: Vec<_> = self
            .cells
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Insert or overwrite a cell color.
    pub fn set(&mut self, key: CellKey, color: String) {
        self.cells.insert(key, color);
    }

    /// Remove a cell. Returns `false` if it was not present.
    pub fn erase(&mut self, key: &CellKey) -> bool {
        self.cells.remove(key).is_some()
    }

    #[must_use]
    pub fn get(&self, key: &CellKey) -> Option<&str> {
        self.cells.get(key).map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Op {
        Paint(&'static str, &'static str),
        Erase(&'static str),
    }

    fn apply(ops: &[Op]) -> GridCache {
        let mut grid = GridCache::new();
        for op in ops {
            match op {
                Op::Paint(k, c) => grid.set(CellKey::new(*k), c.to_string()),
                Op::Erase(k) => {
                    grid.erase(&CellKey::new(*k));
                }
            }
        }
        grid
    }

    #[test]
    fn test_set_overwrites() {
        let grid = apply(&[Op::Paint("4,2", "#FF0000"), Op::Paint("4,2", "#00FF00")]);
        assert_eq!(grid.get(&CellKey::new("4,2")), Some("#00FF00"));
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_erase_absent_is_noop() {
        let mut grid = apply(&[Op::Paint("1,1", "#FFFFFF")]);
        let before = grid.snapshot();
        assert!(!grid.erase(&CellKey::new("9,9")));
        assert_eq!(grid.snapshot(), before);
    }

    #[test]
    fn test_last_operation_per_key_wins() {
        let replayed = apply(&[
            Op::Paint("0,0", "#111111"),
            Op::Paint("0,1", "#222222"),
            Op::Erase("0,0"),
            Op::Paint("0,2", "#333333"),
            Op::Erase("0,2"),
            Op::Paint("0,2", "#444444"),
            Op::Paint("0,1", "#555555"),
        ]);
        let last_only = apply(&[
            Op::Erase("0,0"),
            Op::Paint("0,2", "#444444"),
            Op::Paint("0,1", "#555555"),
        ]);
        assert_eq!(replayed.snapshot(), last_only.snapshot());
    }

    #[test]
    fn test_hydrate_and_snapshot_sorted() {
        let mut grid = GridCache::new();
        let loaded = grid.hydrate(vec![
            Cell::new(CellKey::new("2,0"), "#2"),
            Cell::new(CellKey::new("1,0"), "#1"),
        ]);
        assert_eq!(loaded, 2);
        let keys: Vec<_> = grid.snapshot().into_iter().map(|(k, _)| k.into_string()).collect();
        assert_eq!(keys, vec!["1,0", "2,0"]);
    }

    #[test]
    fn test_clear() {
        let mut grid = apply(&[Op::Paint("1,1", "#FFFFFF")]);
        grid.clear();
        assert!(grid.is_empty());
    }
}
