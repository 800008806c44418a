//! Frontier expansion scenarios: two independent fresh stores with the same
//! seed converge, and two concurrent resolutions of one frontier converge to
//! a single outcome.

use dungeon_world::chunkgen::Dir;
use dungeon_world::overlay::{ensure_seed_hub, expand_frontier, InMemoryOverlayStore, OverlayStore};

fn first_frontier_door(store: &InMemoryOverlayStore, level: i32) -> (i32, i32, Dir) {
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
    candidates
        .into_iter()
        .find(|&(x, y, d)| {
            store
                .get_edge_override(level, x, y, d)
                .map(|e| e.meta.frontier)
                .unwrap_or(false)
        })
        .expect("seed hub always carries at least one frontier door")
}

#[test]
fn two_independent_fresh_stores_with_same_seed_expand_identically() {
    let seed = 5150;
    let level = 1;

    let store_a = InMemoryOverlayStore::new();
    ensure_seed_hub(&store_a, seed, level, 0);
    let (x, y, d) = first_frontier_door(&store_a, level);
    expand_frontier(&store_a, seed, level, x, y, d, 0);

    let store_b = InMemoryOverlayStore::new();
    ensure_seed_hub(&store_b, seed, level, 0);
    expand_frontier(&store_b, seed, level, x, y, d, 0);

    let (dx, dy) = d.delta();
    let cell_a = store_a.get_cell_override(level, x + dx, y + dy);
    let cell_b = store_b.get_cell_override(level, x + dx, y + dy);
    assert_eq!(cell_a, cell_b);
}

#[test]
fn frontier_flag_clears_and_destination_cell_is_fully_described() {
    let store = InMemoryOverlayStore::new();
    ensure_seed_hub(&store, 2024, 0, 0);
    let (x, y, d) = first_frontier_door(&store, 0);

    expand_frontier(&store, 2024, 0, x, y, d, 0);

    let edge = store.get_edge_override(0, x, y, d).unwrap();
    assert!(!edge.meta.frontier);

    let (dx, dy) = d.delta();
    assert!(store.get_cell_override(0, x + dx, y + dy).is_some());
    for dir in Dir::all() {
        assert!(store.get_edge_override(0, x + dx, y + dy, dir).is_some());
    }
}
