//! The edge oracle: the single function every other module calls to learn
//! whether a given cell edge can be crossed or seen through.
//!
//! Resolution order is strict and never reordered:
//! 1. Overlay edge override, if one exists — it always wins.
//! 2. The seeded hub fact, lazily materialized on first touch.
//! 3. The chunk-boundary rule for edges that sit on a chunk seam.
//! 4. The generator's raw decode.
//!
//! A frontier door resolved for `Purpose::Movement` triggers expansion
//! before the call returns, so the caller always observes the post-expansion
//! world.

use crate::chunkgen::{ChunkCache, Dir, GeneratorVersion, EDGE_DOOR_UNLOCKED, EDGE_OPEN};
use crate::overlay::{ensure_seed_hub, expand_frontier, EdgeKind, InMemoryOverlayStore, OverlayStore};

/// Why the caller is asking about an edge. Movement purposes trigger frontier
/// expansion; everything else (sight, minimap) only reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Movement,
    Sight,
    Minimap,
}

pub struct WorldModel {
    pub seed: u32,
    pub generator: GeneratorVersion,
    chunks: ChunkCache,
    overlay: InMemoryOverlayStore,
}

impl WorldModel {
    pub fn new(seed: u32, generator: GeneratorVersion) -> Self {
        Self {
            seed,
            generator,
            chunks: ChunkCache::new(),
            overlay: InMemoryOverlayStore::new(),
        }
    }

    pub fn overlay(&self) -> &InMemoryOverlayStore {
        &self.overlay
    }

    /// Resolve the edge in direction `dir` out of cell `(x, y)` on `level`.
    /// The seed hub is materialized lazily on any non-minimap query, never on
    /// a minimap-only read.
    pub fn edge_type(&self, level: i32, x: i32, y: i32, dir: Dir, purpose: Purpose) -> EdgeKind {
        if purpose != Purpose::Minimap {
            ensure_seed_hub(&self.overlay, self.seed, level, 0);
        }

        if let Some(over) = self.overlay.get_edge_override(level, x, y, dir) {
            if purpose == Purpose::Movement && over.meta.frontier {
                expand_frontier(&self.overlay, self.seed, level, x, y, dir, 0);
                if let Some(resolved) = self.overlay.get_edge_override(level, x, y, dir) {
                    return resolved.kind;
                }
            }
            return over.kind;
        }

        self.decode_generated(level, x, y, dir)
    }

    pub fn can_traverse(&self, level: i32, x: i32, y: i32, dir: Dir) -> bool {
        self.edge_type(level, x, y, dir, Purpose::Movement).is_traversable()
    }

    pub fn can_see_through(&self, level: i32, x: i32, y: i32, dir: Dir) -> bool {
        self.edge_type(level, x, y, dir, Purpose::Sight).is_visible_through()
    }

    /// Decode the raw generator value for an edge, applying the
    /// chunk-boundary mod-8 opening rule where the edge sits on a seam.
    fn decode_generated(&self, level: i32, x: i32, y: i32, dir: Dir) -> EdgeKind {
        let (dx, dy) = dir.delta();
        let (nx, ny) = (x + dx, y + dy);

        let (cx, lx) = crate::chunkgen::chunk_coord(x);
        let (cy, ly) = crate::chunkgen::chunk_coord(y);
        let crosses_chunk = crate::chunkgen::chunk_coord(nx).0 != cx
            || crate::chunkgen::chunk_coord(ny).0 != cy;

        if crosses_chunk {
            return self.boundary_edge(level, x, y, nx, ny, dir);
        }

        let chunk = self.chunks.get_or_generate(self.seed, level, cx, cy, self.generator);
        raw_to_kind(chunk.edge_at(lx, ly, dir))
    }

    /// Chunk-seam rule: one in eight boundary cells (by the row/column index
    /// modulo 8) is open, keyed off the lower of the two adjoining global
    /// coordinates so both chunks agree without consulting one another's
    /// local data.
    fn boundary_edge(&self, _level: i32, x: i32, y: i32, nx: i32, ny: i32, dir: Dir) -> EdgeKind {
        let along = match dir {
            Dir::E | Dir::W => y,
            Dir::N | Dir::S => x,
        };
        let _ = (nx, ny);
        if along.rem_euclid(8) == 0 {
            EdgeKind::Open
        } else {
            EdgeKind::Wall
        }
    }
}

fn raw_to_kind(raw: u8) -> EdgeKind {
    match raw {
        EDGE_OPEN => EdgeKind::Open,
        EDGE_DOOR_UNLOCKED => EdgeKind::DoorUnlocked,
        _ => EdgeKind::Wall,
    }
}

/// Visibility ray: walk outward from `(x, y)` in `dir` up to `max_range`
/// cells, stopping at (and including) the first blocking edge.
pub fn visible_cells(
    world: &WorldModel,
    level: i32,
    x: i32,
    y: i32,
    dir: Dir,
    max_range: i32,
) -> Vec<(i32, i32)> {
    let mut out = Vec::new();
    let (dx, dy) = dir.delta();
    let (mut cx, mut cy) = (x, y);
    for _ in 0..max_range {
        if !world.can_see_through(level, cx, cy, dir) {
            break;
        }
        cx += dx;
        cy += dy;
        out.push((cx, cy));
    }
    out
}

/// Approximate compass direction from `(x, y)` toward the world hub at
/// `(0, 0)` on `level`, used by the snapshot's "hub" hint.
pub fn approximate_dir_to_hub(x: i32, y: i32) -> Option<Dir> {
    if x == 0 && y == 0 {
        return None;
    }
    if x.abs() >= y.abs() {
        Some(if x > 0 { Dir::W } else { Dir::E })
    } else {
        Some(if y > 0 { Dir::N } else { Dir::S })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_interior_edges_are_open() {
        let world = WorldModel::new(42, GeneratorVersion::Maze);
        assert_eq!(
            world.edge_type(0, 0, 0, Dir::E, Purpose::Sight),
            EdgeKind::Open
        );
    }

    #[test]
    fn edge_symmetry_holds_across_overlay_and_generated_edges() {
        let world = WorldModel::new(7, GeneratorVersion::Maze);
        for level in [0] {
            for x in -2..66 {
                for y in -2..66 {
                    for dir in Dir::all() {
                        let (dx, dy) = dir.delta();
                        let forward = world.edge_type(level, x, y, dir, Purpose::Sight);
                        let backward =
                            world.edge_type(level, x + dx, y + dy, dir.opposite(), Purpose::Sight);
                        assert_eq!(forward.is_traversable(), backward.is_traversable());
                    }
                }
            }
        }
    }

    #[test]
    fn movement_through_frontier_door_expands_and_then_stabilizes() {
        let world = WorldModel::new(99, GeneratorVersion::Maze);
        let frontier = Dir::all().into_iter().find(|&d| {
            world
                .overlay()
                .get_edge_override(0, 0, 0, d)
                .map(|e| e.meta.frontier)
                .unwrap_or(false)
        });
        // ensure_seed_hub only runs on first edge_type call; trigger it.
        let _ = world.edge_type(0, 0, 0, Dir::N, Purpose::Sight);
        let frontier = frontier.or_else(|| {
            Dir::all().into_iter().find(|&d| {
                world
                    .overlay()
                    .get_edge_override(0, 0, 0, d)
                    .map(|e| e.meta.frontier)
                    .unwrap_or(false)
            })
        });
        if let Some(dir) = frontier {
            assert!(world.can_traverse(0, 0, 0, dir));
            let (dx, dy) = dir.delta();
            assert!(world.overlay().has_cell(0, dx, dy));
        }
    }

    #[test]
    fn minimap_only_query_does_not_materialize_hub() {
        let world = WorldModel::new(123, GeneratorVersion::Maze);
        assert!(!world.overlay().has_cell(0, 0, 0));

        let _ = world.edge_type(0, 0, 0, Dir::E, Purpose::Minimap);
        assert!(!world.overlay().has_cell(0, 0, 0));

        let _ = world.edge_type(0, 0, 0, Dir::E, Purpose::Sight);
        assert!(world.overlay().has_cell(0, 0, 0));
    }

    #[test]
    fn approximate_dir_to_hub_picks_dominant_axis() {
        assert_eq!(approximate_dir_to_hub(5, 1), Some(Dir::W));
        assert_eq!(approximate_dir_to_hub(-5, 1), Some(Dir::E));
        assert_eq!(approximate_dir_to_hub(1, 5), Some(Dir::N));
        assert_eq!(approximate_dir_to_hub(0, 0), None);
    }
}
