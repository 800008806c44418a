//! Sparse overlay store: per-edge and per-cell overrides that always
//! supersede generated base. Writes are symmetric and every write path is
//! idempotent given the same arguments.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::chunkgen::Dir;
use crate::rng::{mix, Rng};

/// Resolved edge kind, superset of the raw generator encoding plus locks and
/// the secret-lever variant which only ever comes from an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Wall,
    Open,
    DoorLocked,
    DoorUnlocked,
    LeverSecret,
}

impl EdgeKind {
    pub fn is_traversable(self) -> bool {
        matches!(self, EdgeKind::Open | EdgeKind::DoorUnlocked | EdgeKind::LeverSecret)
    }

    /// Doors of any kind block sight even when they permit movement.
    pub fn is_visible_through(self) -> bool {
        matches!(self, EdgeKind::Open | EdgeKind::LeverSecret)
    }
}

/// Optional metadata carried by a door-kind edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeLockMeta {
    pub difficulty: Option<u32>,
    /// Non-owning reference; a dangling id resolves to "no linked entity".
    pub linked_key_entity: Option<String>,
    pub default_state_on_reset: Option<EdgeKind>,
    /// Lazy-frontier marker: this door triggers expansion on first
    /// movement-purpose resolution.
    #[serde(default)]
    pub frontier: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeOverride {
    pub kind: EdgeKind,
    pub meta: EdgeLockMeta,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    HubRoom,
    Room,
    Corridor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMeta {
    pub kind: CellKind,
    pub area_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub level: i32,
    pub x: i32,
    pub y: i32,
    pub dir: Dir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub level: i32,
    pub x: i32,
    pub y: i32,
}

/// Read/write contract for the sparse overlay store.
pub trait OverlayStore: Send + Sync {
    fn get_edge_override(&self, level: i32, x: i32, y: i32, dir: Dir) -> Option<EdgeOverride>;
    fn get_cell_override(&self, level: i32, x: i32, y: i32) -> Option<CellMeta>;
    fn write_edge_both_ways(
        &self,
        level: i32,
        x: i32,
        y: i32,
        dir: Dir,
        kind: EdgeKind,
        meta: EdgeLockMeta,
        now_ms: u64,
    );
    fn write_cell(&self, level: i32, x: i32, y: i32, meta: CellMeta);
    /// Does a cell override already exist at this position?
    fn has_cell(&self, level: i32, x: i32, y: i32) -> bool {
        self.get_cell_override(level, x, y).is_some()
    }
}

/// In-memory overlay store. Guarded by a single mutex so frontier expansion
/// can hold the lock across its whole check-then-carve critical section —
/// the per-row-atomic guarantee the kernel requires.
#[derive(Default)]
pub struct InMemoryOverlayStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    edges: HashMap<EdgeKey, EdgeOverride>,
    cells: HashMap<CellKey, CellMeta>,
}

impl InMemoryOverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_edge_locked(
        inner: &mut Inner,
        level: i32,
        x: i32,
        y: i32,
        dir: Dir,
        kind: EdgeKind,
        meta: EdgeLockMeta,
        now_ms: u64,
    ) {
        let (dx, dy) = dir.delta();
        let (nx, ny) = (x + dx, y + dy);
        inner.edges.insert(
            EdgeKey { level, x, y, dir },
            EdgeOverride {
                kind,
                meta: meta.clone(),
                updated_at_ms: now_ms,
            },
        );
        inner.edges.insert(
            EdgeKey {
                level,
                x: nx,
                y: ny,
                dir: dir.opposite(),
            },
            EdgeOverride {
                kind,
                meta,
                updated_at_ms: now_ms,
            },
        );
    }

    /// Lock the store for the whole of a frontier-expansion transaction.
    /// `body` re-checks the destination and performs its writes while the
    /// lock is held, so two concurrent resolutions of the same frontier
    /// collapse to one outcome.
    pub fn with_transaction<R>(&self, body: impl FnOnce(&mut dyn OverlayTx) -> R) -> R {
        let mut inner = self.inner.lock();
        let mut tx = OverlayTxImpl { inner: &mut inner };
        body(&mut tx)
    }
}

impl OverlayStore for InMemoryOverlayStore {
    fn get_edge_override(&self, level: i32, x: i32, y: i32, dir: Dir) -> Option<EdgeOverride> {
        self.inner.lock().edges.get(&EdgeKey { level, x, y, dir }).cloned()
    }

    fn get_cell_override(&self, level: i32, x: i32, y: i32) -> Option<CellMeta> {
        self.inner.lock().cells.get(&CellKey { level, x, y }).cloned()
    }

    fn write_edge_both_ways(
        &self,
        level: i32,
        x: i32,
        y: i32,
        dir: Dir,
        kind: EdgeKind,
        meta: EdgeLockMeta,
        now_ms: u64,
    ) {
        let mut inner = self.inner.lock();
        Self::write_edge_locked(&mut inner, level, x, y, dir, kind, meta, now_ms);
    }

    fn write_cell(&self, level: i32, x: i32, y: i32, meta: CellMeta) {
        self.inner.lock().cells.insert(CellKey { level, x, y }, meta);
    }
}

/// Transactional handle used by frontier expansion. Kept as a trait so the
/// expansion algorithm below doesn't need to know it is talking to the
/// in-memory store specifically.
pub trait OverlayTx {
    fn get_edge(&self, level: i32, x: i32, y: i32, dir: Dir) -> Option<EdgeOverride>;
    fn get_cell(&self, level: i32, x: i32, y: i32) -> Option<CellMeta>;
    fn write_edge(
        &mut self,
        level: i32,
        x: i32,
        y: i32,
        dir: Dir,
        kind: EdgeKind,
        meta: EdgeLockMeta,
        now_ms: u64,
    );
    fn write_cell(&mut self, level: i32, x: i32, y: i32, meta: CellMeta);
}

struct OverlayTxImpl<'a> {
    inner: &'a mut Inner,
}

impl OverlayTx for OverlayTxImpl<'_> {
    fn get_edge(&self, level: i32, x: i32, y: i32, dir: Dir) -> Option<EdgeOverride> {
        self.inner.edges.get(&EdgeKey { level, x, y, dir }).cloned()
    }

    fn get_cell(&self, level: i32, x: i32, y: i32) -> Option<CellMeta> {
        self.inner.cells.get(&CellKey { level, x, y }).cloned()
    }

    fn write_edge(
        &mut self,
        level: i32,
        x: i32,
        y: i32,
        dir: Dir,
        kind: EdgeKind,
        meta: EdgeLockMeta,
        now_ms: u64,
    ) {
        InMemoryOverlayStore::write_edge_locked(self.inner, level, x, y, dir, kind, meta, now_ms);
    }

    fn write_cell(&mut self, level: i32, x: i32, y: i32, meta: CellMeta) {
        self.inner.cells.insert(CellKey { level, x, y }, meta);
    }
}

// ---------------------------------------------------------------------------
// Seed hub initializer
// ---------------------------------------------------------------------------

/// Ensure the 2×2 seed hub exists for `level`, called lazily on any
/// non-minimap query. Idempotent: a hub already present is left untouched.
pub fn ensure_seed_hub(store: &InMemoryOverlayStore, world_seed: u32, level: i32, now_ms: u64) {
    store.with_transaction(|tx| {
        if tx.get_cell(level, 0, 0).is_some() {
            return;
        }

        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            tx.write_cell(
                level,
                x,
                y,
                CellMeta {
                    kind: CellKind::HubRoom,
                    area_id: Some("hub".to_string()),
                },
            );
        }

        // Interior edges of the 2x2 room are open.
        tx.write_edge(level, 0, 0, Dir::E, EdgeKind::Open, EdgeLockMeta::default(), now_ms);
        tx.write_edge(level, 0, 0, Dir::S, EdgeKind::Open, EdgeLockMeta::default(), now_ms);
        tx.write_edge(level, 1, 0, Dir::S, EdgeKind::Open, EdgeLockMeta::default(), now_ms);
        tx.write_edge(level, 0, 1, Dir::E, EdgeKind::Open, EdgeLockMeta::default(), now_ms);

        // Perimeter walls except 1-2 deterministically chosen frontier doors.
        let perimeter: [(i32, i32, Dir); 8] = [
            (0, 0, Dir::N),
            (0, 0, Dir::W),
            (1, 0, Dir::N),
            (1, 0, Dir::E),
            (0, 1, Dir::W),
            (0, 1, Dir::S),
            (1, 1, Dir::E),
            (1, 1, Dir::S),
        ];
        for &(x, y, dir) in &perimeter {
            tx.write_edge(level, x, y, dir, EdgeKind::Wall, EdgeLockMeta::default(), now_ms);
        }

        let mut rng = Rng::new(mix(world_seed, level, 0, 0, "seed_hub"));
        let door_count = rng.int(1, 3);
        let mut indices: Vec<usize> = (0..perimeter.len()).collect();
        rng.shuffle_in_place(&mut indices);
        for &i in indices.iter().take(door_count as usize) {
            let (x, y, dir) = perimeter[i];
            tx.write_edge(
                level,
                x,
                y,
                dir,
                EdgeKind::DoorUnlocked,
                EdgeLockMeta {
                    frontier: true,
                    ..Default::default()
                },
                now_ms,
            );
        }
    });
}

// ---------------------------------------------------------------------------
// Frontier expansion
// ---------------------------------------------------------------------------

/// Triggered when the oracle resolves a frontier door for `purpose=movement`.
/// The whole check-then-carve sequence runs inside one overlay transaction so
/// concurrent resolutions of the same door converge to one outcome.
pub fn expand_frontier(
    store: &InMemoryOverlayStore,
    world_seed: u32,
    level: i32,
    x: i32,
    y: i32,
    dir: Dir,
    now_ms: u64,
) {
    store.with_transaction(|tx| {
        let (dx, dy) = dir.delta();
        let (nx, ny) = (x + dx, y + dy);

        let Some(mut edge) = tx.get_edge(level, x, y, dir) else {
            return;
        };
        if !edge.meta.frontier {
            return;
        }

        if tx.get_cell(level, nx, ny).is_some() {
            edge.meta.frontier = false;
            tx.write_edge(level, x, y, dir, edge.kind, edge.meta, now_ms);
            return;
        }

        let source_is_room = matches!(
            tx.get_cell(level, x, y).map(|c| c.kind),
            Some(CellKind::HubRoom) | Some(CellKind::Room)
        );

        let mut rng = Rng::new(mix(
            world_seed,
            level,
            x * 4 + dir_code(dir),
            y,
            "expand_v1",
        ));

        let place_room = if source_is_room {
            false
        } else {
            rng.float01() >= 0.72
        };

        if place_room {
            if !try_place_room(tx, &mut rng, level, x, y, dir, nx, ny, now_ms) {
                place_corridor(tx, &mut rng, level, x, y, dir, nx, ny, now_ms);
            }
        } else {
            place_corridor(tx, &mut rng, level, x, y, dir, nx, ny, now_ms);
        }

        // Clear the original door's frontier flag; it stays door_unlocked.
        edge.meta.frontier = false;
        tx.write_edge(level, x, y, dir, edge.kind, edge.meta, now_ms);
    });
}

fn dir_code(dir: Dir) -> i32 {
    match dir {
        Dir::N => 0,
        Dir::E => 1,
        Dir::S => 2,
        Dir::W => 3,
    }
}

fn place_corridor(
    tx: &mut dyn OverlayTx,
    rng: &mut Rng,
    level: i32,
    x: i32,
    y: i32,
    dir: Dir,
    nx: i32,
    ny: i32,
    now_ms: u64,
) {
    tx.write_cell(
        level,
        nx,
        ny,
        CellMeta {
            kind: CellKind::Corridor,
            area_id: None,
        },
    );

    // Back edge is the entrance door, no longer frontier.
    tx.write_edge(
        level,
        nx,
        ny,
        dir.opposite(),
        EdgeKind::DoorUnlocked,
        EdgeLockMeta::default(),
        now_ms,
    );

    // Weighted 0/1/2 new frontier doors among the other three directions.
    let others: Vec<Dir> = Dir::all().into_iter().filter(|&d| d != dir.opposite()).collect();
    let mut shuffled = others.clone();
    rng.shuffle_in_place(&mut shuffled);

    let roll = rng.float01();
    let new_door_count = if roll < 0.3 {
        0
    } else if roll < 0.8 {
        1
    } else {
        2
    };

    for (i, &d) in shuffled.iter().enumerate() {
        if (i as i32) < new_door_count {
            tx.write_edge(
                level,
                nx,
                ny,
                d,
                EdgeKind::DoorUnlocked,
                EdgeLockMeta {
                    frontier: true,
                    ..Default::default()
                },
                now_ms,
            );
        } else {
            tx.write_edge(level, nx, ny, d, EdgeKind::Wall, EdgeLockMeta::default(), now_ms);
        }
    }
}

fn try_place_room(
    tx: &mut dyn OverlayTx,
    rng: &mut Rng,
    level: i32,
    x: i32,
    y: i32,
    dir: Dir,
    nx: i32,
    ny: i32,
    now_ms: u64,
) -> bool {
    // A 2x2 room forward of the entrance, anchored so (nx, ny) is one corner
    // closest to the entrance.
    let (ox, oy) = match dir {
        Dir::N => (nx, ny - 1),
        Dir::S => (nx, ny),
        Dir::E => (nx, ny),
        Dir::W => (nx - 1, ny),
    };
    let cells = [(ox, oy), (ox + 1, oy), (ox, oy + 1), (ox + 1, oy + 1)];
    if cells.iter().any(|&(cx, cy)| tx.get_cell(level, cx, cy).is_some()) {
        return false;
    }

    for &(cx, cy) in &cells {
        tx.write_cell(
            level,
            cx,
            cy,
            CellMeta {
                kind: CellKind::Room,
                area_id: None,
            },
        );
    }

    // Interior edges open.
    tx.write_edge(level, ox, oy, Dir::E, EdgeKind::Open, EdgeLockMeta::default(), now_ms);
    tx.write_edge(level, ox, oy, Dir::S, EdgeKind::Open, EdgeLockMeta::default(), now_ms);
    tx.write_edge(level, ox + 1, oy, Dir::S, EdgeKind::Open, EdgeLockMeta::default(), now_ms);
    tx.write_edge(level, ox, oy + 1, Dir::E, EdgeKind::Open, EdgeLockMeta::default(), now_ms);

    // Perimeter walls except the entrance (non-frontier) and, with ~55%
    // probability, one additional frontier door on another perimeter edge.
    let perimeter: [(i32, i32, Dir); 8] = [
        (ox, oy, Dir::N),
        (ox, oy, Dir::W),
        (ox + 1, oy, Dir::N),
        (ox + 1, oy, Dir::E),
        (ox, oy + 1, Dir::W),
        (ox, oy + 1, Dir::S),
        (ox + 1, oy + 1, Dir::E),
        (ox + 1, oy + 1, Dir::S),
    ];
    let entrance = (nx, ny, dir.opposite());
    for &(px, py, pdir) in &perimeter {
        if (px, py, pdir) == entrance {
            continue;
        }
        tx.write_edge(level, px, py, pdir, EdgeKind::Wall, EdgeLockMeta::default(), now_ms);
    }
    tx.write_edge(
        level,
        entrance.0,
        entrance.1,
        entrance.2,
        EdgeKind::DoorUnlocked,
        EdgeLockMeta::default(),
        now_ms,
    );

    if rng.float01() < 0.55 {
        let candidates: Vec<&(i32, i32, Dir)> =
            perimeter.iter().filter(|&&e| e != entrance).collect();
        if let Some(&&(px, py, pdir)) = candidates.first() {
            tx.write_edge(
                level,
                px,
                py,
                pdir,
                EdgeKind::DoorUnlocked,
                EdgeLockMeta {
                    frontier: true,
                    ..Default::default()
                },
                now_ms,
            );
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_edge_both_ways_is_symmetric() {
        let store = InMemoryOverlayStore::new();
        store.write_edge_both_ways(1, 5, 5, Dir::E, EdgeKind::DoorUnlocked, EdgeLockMeta::default(), 0);
        let fwd = store.get_edge_override(1, 5, 5, Dir::E).unwrap();
        let back = store.get_edge_override(1, 6, 5, Dir::W).unwrap();
        assert_eq!(fwd.kind, back.kind);
    }

    #[test]
    fn write_is_idempotent() {
        let store = InMemoryOverlayStore::new();
        store.write_edge_both_ways(1, 0, 0, Dir::E, EdgeKind::Open, EdgeLockMeta::default(), 10);
        store.write_edge_both_ways(1, 0, 0, Dir::E, EdgeKind::Open, EdgeLockMeta::default(), 20);
        let e = store.get_edge_override(1, 0, 0, Dir::E).unwrap();
        assert_eq!(e.kind, EdgeKind::Open);
        assert_eq!(e.updated_at_ms, 20);
    }

    #[test]
    fn ensure_seed_hub_is_idempotent_and_opens_hub_interior() {
        let store = InMemoryOverlayStore::new();
        ensure_seed_hub(&store, 42, 1, 0);
        ensure_seed_hub(&store, 42, 1, 0);
        assert_eq!(
            store.get_edge_override(1, 0, 0, Dir::E).unwrap().kind,
            EdgeKind::Open
        );
        assert_eq!(
            store.get_edge_override(1, 0, 0, Dir::S).unwrap().kind,
            EdgeKind::Open
        );
    }

    #[test]
    fn expansion_clears_frontier_and_describes_destination() {
        let store = InMemoryOverlayStore::new();
        ensure_seed_hub(&store, 7, 1, 0);

        // Find a frontier door on the hub.
        let candidates = [
            (0, 0, Dir::N),
            (0, 0, Dir::W),
            (1, 0, Dir::N),
            (1, 0, Dir::E),
            (0, 1, Dir::W),
            (0, 1, Dir::S),
            (1, 1, Dir::E),
            (1, 1, Dir::S),
        ];
        let frontier = candidates
            .iter()
            .find(|&&(x, y, d)| {
                store
                    .get_edge_override(1, x, y, d)
                    .map(|e| e.meta.frontier)
                    .unwrap_or(false)
            })
            .copied()
            .expect("hub always has at least one frontier door");

        let (x, y, d) = frontier;
        expand_frontier(&store, 7, 1, x, y, d, 1_000);

        let resolved = store.get_edge_override(1, x, y, d).unwrap();
        assert!(!resolved.meta.frontier);
        assert_eq!(resolved.kind, EdgeKind::DoorUnlocked);

        let (dx, dy) = d.delta();
        assert!(store.has_cell(1, x + dx, y + dy));
    }

    #[test]
    fn two_expansions_of_same_frontier_converge() {
        let store = InMemoryOverlayStore::new();
        ensure_seed_hub(&store, 7, 1, 0);
        let candidates = [
            (0, 0, Dir::N),
            (0, 0, Dir::W),
            (1, 0, Dir::N),
            (1, 0, Dir::E),
            (0, 1, Dir::W),
            (0, 1, Dir::S),
            (1, 1, Dir::E),
            (1, 1, Dir::S),
        ];
        let (x, y, d) = candidates
            .iter()
            .find(|&&(x, y, d)| {
                store
                    .get_edge_override(1, x, y, d)
                    .map(|e| e.meta.frontier)
                    .unwrap_or(false)
            })
            .copied()
            .expect("hub always has at least one frontier door");

        expand_frontier(&store, 7, 1, x, y, d, 1_000);
        let first = store.get_cell_override(1, x + d.delta().0, y + d.delta().1);
        expand_frontier(&store, 7, 1, x, y, d, 2_000);
        let second = store.get_cell_override(1, x + d.delta().0, y + d.delta().1);
        assert_eq!(first, second);
    }
}
