//! Global discovered-cell tracking for the minimap.
//!
//! Discovery is shared across every character in the same world: a cell
//! becomes discovered the first time any character's visible or minimap set
//! includes it, and stays discovered for all characters from then on.
//! Re-discovery is idempotent except that the timestamp always reflects the
//! most recent sighting.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredCell {
    pub level: i32,
    pub x: i32,
    pub y: i32,
    pub discovered_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    level: i32,
    x: i32,
    y: i32,
}

pub trait DiscoveryStore: Send + Sync {
    /// Record `(level, x, y)` as discovered at `now_ms`. Shared across every
    /// character. Idempotent: repeated calls only ever advance the timestamp.
    fn mark_discovered(&self, level: i32, x: i32, y: i32, now_ms: u64);

    /// All cells discovered on `level` within Chebyshev `radius` of
    /// `(cx, cy)`, ordered by `(y asc, x asc)`.
    fn get_discovered_in_radius(
        &self,
        level: i32,
        cx: i32,
        cy: i32,
        radius: i32,
    ) -> Vec<DiscoveredCell>;
}

#[derive(Default)]
pub struct InMemoryDiscoveryStore {
    cells: RwLock<HashMap<Key, DiscoveredCell>>,
}

impl InMemoryDiscoveryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiscoveryStore for InMemoryDiscoveryStore {
    fn mark_discovered(&self, level: i32, x: i32, y: i32, now_ms: u64) {
        let key = Key { level, x, y };
        let mut cells = self.cells.write();
        cells
            .entry(key)
            .and_modify(|cell| {
                if now_ms > cell.discovered_at_ms {
                    cell.discovered_at_ms = now_ms;
                }
            })
            .or_insert(DiscoveredCell {
                level,
                x,
                y,
                discovered_at_ms: now_ms,
            });
    }

    fn get_discovered_in_radius(
        &self,
        level: i32,
        cx: i32,
        cy: i32,
        radius: i32,
    ) -> Vec<DiscoveredCell> {
        let cells = self.cells.read();
        let mut out: Vec<DiscoveredCell> = cells
            .iter()
            .filter(|(key, _)| {
                key.level == level && (key.x - cx).abs() <= radius && (key.y - cy).abs() <= radius
            })
            .map(|(_, cell)| *cell)
            .collect();
        out.sort_by_key(|c| (c.y, c.x));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_discovered_is_idempotent_and_keeps_latest_timestamp() {
        let store = InMemoryDiscoveryStore::new();
        store.mark_discovered(0, 1, 1, 100);
        store.mark_discovered(0, 1, 1, 50);
        store.mark_discovered(0, 1, 1, 200);
        let cells = store.get_discovered_in_radius(0, 1, 1, 0);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].discovered_at_ms, 200);
    }

    #[test]
    fn radius_query_orders_by_y_then_x() {
        let store = InMemoryDiscoveryStore::new();
        store.mark_discovered(0, 2, 0, 1);
        store.mark_discovered(0, 0, 0, 1);
        store.mark_discovered(0, 1, -1, 1);
        let cells = store.get_discovered_in_radius(0, 0, 0, 5);
        let coords: Vec<(i32, i32)> = cells.iter().map(|c| (c.x, c.y)).collect();
        assert_eq!(coords, vec![(1, -1), (0, 0), (2, 0)]);
    }

    #[test]
    fn radius_query_excludes_out_of_range_cells_and_other_levels() {
        let store = InMemoryDiscoveryStore::new();
        store.mark_discovered(0, 10, 10, 1);
        store.mark_discovered(1, 0, 0, 1);
        let cells = store.get_discovered_in_radius(0, 0, 0, 3);
        assert!(cells.is_empty());
    }

    #[test]
    fn discovery_is_shared_across_characters() {
        // One character's movement marks a cell discovered; any other
        // character querying the same world sees it too.
        let store = InMemoryDiscoveryStore::new();
        store.mark_discovered(0, 5, 5, 1);
        let cells = store.get_discovered_in_radius(0, 5, 5, 0);
        assert_eq!(cells.len(), 1);
        assert_eq!((cells[0].x, cells[0].y), (5, 5));
    }
}
