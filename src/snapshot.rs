//! Snapshot builder: assembles the observable view sent after every
//! `auth_ok` and every successful action.

use serde::Serialize;

use crate::chunkgen::Dir;
use crate::discovery::DiscoveryStore;
use crate::overlay::EdgeKind;
use crate::protocol::{CellEdges, CellView, Cooldowns, Dir4, HubView, WorldState, YouView};
use crate::world::{approximate_dir_to_hub, visible_cells, Purpose, WorldModel};

const VISIBILITY_RANGE: i32 = 3;
const MINIMAP_RADIUS: i32 = 12;
const FOOT_SCALE: f64 = 5.0;

/// Internal digest payload: `digest({you, cooldowns, visible})`.
/// Kept separate from [`WorldState`] because `world_hash` must be computed
/// before it can be embedded in the outer struct.
#[derive(Serialize)]
struct HashInput<'a> {
    you: &'a YouView,
    cooldowns: &'a Cooldowns,
    visible: &'a [CellView],
}

pub struct SnapshotPose {
    pub level: i32,
    pub x: i32,
    pub y: i32,
    pub face: Dir4,
    pub hp: i32,
    pub status: Vec<String>,
}

fn dir4_to_dir(d: Dir4) -> Dir {
    match d {
        Dir4::N => Dir::N,
        Dir4::E => Dir::E,
        Dir4::S => Dir::S,
        Dir4::W => Dir::W,
    }
}

fn dir_to_dir4(d: Dir) -> Dir4 {
    match d {
        Dir::N => Dir4::N,
        Dir::E => Dir4::E,
        Dir::S => Dir4::S,
        Dir::W => Dir4::W,
    }
}

fn edges_at(world: &WorldModel, level: i32, x: i32, y: i32, purpose: Purpose) -> CellEdges {
    CellEdges {
        n: world.edge_type(level, x, y, Dir::N, purpose),
        e: world.edge_type(level, x, y, Dir::E, purpose),
        s: world.edge_type(level, x, y, Dir::S, purpose),
        w: world.edge_type(level, x, y, Dir::W, purpose),
    }
}

/// Ray-walk visibility: from the player cell, advance up to
/// [`VISIBILITY_RANGE`] cells per cardinal as long as the forward edge is
/// open or a secret lever. Doors block sight even though they permit
/// movement. Every visited cell (the player's own included) appears once.
fn build_visible_cells(world: &WorldModel, level: i32, x: i32, y: i32) -> Vec<CellView> {
    let mut seen = std::collections::HashSet::new();
    let mut cells = Vec::new();

    let mut push = |cx: i32, cy: i32, cells: &mut Vec<CellView>| {
        if seen.insert((cx, cy)) {
            cells.push(CellView {
                x: cx,
                y: cy,
                edges: edges_at(world, level, cx, cy, Purpose::Sight),
            });
        }
    };

    push(x, y, &mut cells);
    for dir in Dir::all() {
        for (cx, cy) in visible_cells(world, level, x, y, dir, VISIBILITY_RANGE) {
            push(cx, cy, &mut cells);
        }
    }
    cells
}

fn build_minimap_cells(
    world: &WorldModel,
    discovery: &dyn DiscoveryStore,
    level: i32,
    x: i32,
    y: i32,
) -> Vec<CellView> {
    discovery
        .get_discovered_in_radius(level, x, y, MINIMAP_RADIUS)
        .into_iter()
        .map(|cell| CellView {
            x: cell.x,
            y: cell.y,
            edges: edges_at(world, level, cell.x, cell.y, Purpose::Minimap),
        })
        .collect()
}

/// Build the full `world_state` payload for one character at one moment.
pub fn build_snapshot(
    world: &WorldModel,
    discovery: &dyn DiscoveryStore,
    pose: &SnapshotPose,
    cooldowns: Cooldowns,
    now_ms: u64,
) -> WorldState {
    let you = YouView {
        level: pose.level,
        x: pose.x,
        y: pose.y,
        face: pose.face,
        hp: pose.hp,
        status: pose.status.clone(),
    };

    let dist_feet = ((f64::from(pose.x).powi(2) + f64::from(pose.y).powi(2)).sqrt() * FOOT_SCALE)
        .round() as i64;
    let hub = HubView {
        level: pose.level,
        x: 0,
        y: 0,
        dist_feet,
        direction: approximate_dir_to_hub(pose.x, pose.y).map(dir_to_dir4),
    };

    let visible_cells = build_visible_cells(world, pose.level, pose.x, pose.y);
    let minimap_cells = build_minimap_cells(world, discovery, pose.level, pose.x, pose.y);

    let world_hash = crate::digest::digest(&HashInput {
        you: &you,
        cooldowns: &cooldowns,
        visible: &visible_cells,
    });

    WorldState {
        now: Some(now_ms),
        you,
        hub,
        cooldowns,
        world_hash,
        visible_cells,
        minimap_cells,
        nearby_entities: None,
    }
}

pub fn dir4_as_dir(d: Dir4) -> Dir {
    dir4_to_dir(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunkgen::GeneratorVersion;
    use crate::discovery::InMemoryDiscoveryStore;
    use crate::overlay::OverlayStore;

    fn pose(x: i32, y: i32) -> SnapshotPose {
        SnapshotPose {
            level: 1,
            x,
            y,
            face: Dir4::N,
            hp: 10,
            status: vec![],
        }
    }

    #[test]
    fn snapshot_hash_is_stable_for_identical_state() {
        let world = WorldModel::new(1, GeneratorVersion::Maze);
        let discovery = InMemoryDiscoveryStore::new();
        let cooldowns = Cooldowns {
            move_ready_at_ms: 0,
            turn_ready_at_ms: 0,
        };
        let a = build_snapshot(&world, &discovery, &pose(0, 0), cooldowns.clone(), 1000);
        let b = build_snapshot(&world, &discovery, &pose(0, 0), cooldowns, 1000);
        assert_eq!(a.world_hash, b.world_hash);
    }

    #[test]
    fn door_blocks_visibility_but_shows_in_visible_cells_as_boundary() {
        let world = WorldModel::new(5, GeneratorVersion::Maze);
        world.overlay().write_edge_both_ways(
            1,
            0,
            0,
            Dir::E,
            EdgeKind::DoorUnlocked,
            Default::default(),
            0,
        );
        let visible = build_visible_cells(&world, 1, 0, 0);
        // Only the player's own cell is visible east; the door blocks sight.
        assert!(!visible.iter().any(|c| c.x == 1 && c.y == 0));
    }

    #[test]
    fn hub_dist_feet_uses_foot_scale() {
        let world = WorldModel::new(1, GeneratorVersion::Maze);
        let discovery = InMemoryDiscoveryStore::new();
        let cooldowns = Cooldowns {
            move_ready_at_ms: 0,
            turn_ready_at_ms: 0,
        };
        let snap = build_snapshot(&world, &discovery, &pose(3, 4), cooldowns, 0);
        assert_eq!(snap.hub.dist_feet, 25); // sqrt(9+16) * 5 = 25
    }
}
