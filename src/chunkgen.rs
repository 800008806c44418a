//! Chunk generator: produces the base edge encoding of a 64×64 tile of the
//! world from `(seed, level, chunkX, chunkY)`.
//!
//! Two variants are implemented and selected by [`GeneratorVersion`]: the
//! canonical recursive-backtracker maze (`"maze"`) and a BSP dungeon
//! (`"bsp_v4"`). Both are pure functions of their inputs — no shared mutable
//! state, no I/O — and results are memoized in an `Arc`-valued
//! `RwLock<HashMap<..>>` keyed by the generation inputs.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::rng::{mix, Rng};

/// Side length of a chunk, in cells.
pub const CHUNK_SIZE: i32 = 64;
const CELLS_PER_CHUNK: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Raw edge encoding as produced by the generator.
pub const EDGE_WALL: u8 = 0;
pub const EDGE_OPEN: u8 = 1;
pub const EDGE_DOOR_UNLOCKED: u8 = 2;

/// Which generator a world is tagged with. Overlay data produced against one
/// variant remains valid under another — overlays win absolutely — so
/// worlds may be created against either without format migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorVersion {
    Maze,
    BspV4,
}

impl GeneratorVersion {
    pub fn label(self) -> &'static str {
        match self {
            GeneratorVersion::Maze => "maze",
            GeneratorVersion::BspV4 => "bsp_v4",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "maze" => Some(GeneratorVersion::Maze),
            "bsp_v4" => Some(GeneratorVersion::BspV4),
            _ => None,
        }
    }
}

/// Cardinal direction. `N`/`W` edges are derived from the neighbor's `S`/`E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dir {
    N,
    E,
    S,
    W,
}

impl Dir {
    pub fn opposite(self) -> Dir {
        match self {
            Dir::N => Dir::S,
            Dir::E => Dir::W,
            Dir::S => Dir::N,
            Dir::W => Dir::E,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::N => (0, -1),
            Dir::E => (1, 0),
            Dir::S => (0, 1),
            Dir::W => (-1, 0),
        }
    }

    pub fn all() -> [Dir; 4] {
        [Dir::N, Dir::E, Dir::S, Dir::W]
    }
}

/// The decoded base edges of one 64×64 chunk.
#[derive(Debug, Clone)]
pub struct ChunkEdges {
    pub seed: u32,
    pub level: i32,
    pub chunk_x: i32,
    pub chunk_y: i32,
    pub generator: GeneratorVersion,
    /// East-going edge of each local cell, row-major (`ly * 64 + lx`).
    pub east: Vec<u8>,
    /// South-going edge of each local cell, row-major.
    pub south: Vec<u8>,
}

impl ChunkEdges {
    /// Decode the edge in direction `dir` for local cell `(lx, ly)`.
    ///
    /// `W`/`N` look at the neighboring local cell's `E`/`S` edge; at the
    /// chunk's own west/north border they report wall (the oracle resolves
    /// the true cross-chunk value separately, per the chunk-boundary rule).
    pub fn edge_at(&self, lx: i32, ly: i32, dir: Dir) -> u8 {
        debug_assert!((0..CHUNK_SIZE).contains(&lx) && (0..CHUNK_SIZE).contains(&ly));
        let idx = |x: i32, y: i32| (y * CHUNK_SIZE + x) as usize;
        match dir {
            Dir::E => self.east[idx(lx, ly)],
            Dir::S => self.south[idx(lx, ly)],
            Dir::W => {
                if lx == 0 {
                    EDGE_WALL
                } else {
                    self.east[idx(lx - 1, ly)]
                }
            }
            Dir::N => {
                if ly == 0 {
                    EDGE_WALL
                } else {
                    self.south[idx(lx, ly - 1)]
                }
            }
        }
    }
}

/// Chunk coordinate containing global cell `x`, plus the local coordinate.
/// Negative coordinates use Euclidean remainder so `local` is always in
/// `[0, 63]`.
pub fn chunk_coord(global: i32) -> (i32, i32) {
    let chunk = global.div_euclid(CHUNK_SIZE);
    let local = global.rem_euclid(CHUNK_SIZE);
    (chunk, local)
}

/// Generate a chunk. Pure function of its inputs — safe to call from any
/// thread, any number of times, with identical results.
pub fn generate_chunk(
    seed: u32,
    level: i32,
    cx: i32,
    cy: i32,
    generator: GeneratorVersion,
) -> ChunkEdges {
    match generator {
        GeneratorVersion::Maze => maze::generate(seed, level, cx, cy),
        GeneratorVersion::BspV4 => bsp::generate(seed, level, cx, cy),
    }
}

/// Memoizing cache over [`generate_chunk`], keyed by every input that
/// affects the result. Mirrors `HeightmapTerrain`'s
/// `RwLock<HashMap<(cx, cy, lod), Arc<HeightChunk>>>` cache shape exactly.
#[derive(Default)]
pub struct ChunkCache {
    cache: RwLock<HashMap<(u32, i32, i32, i32, GeneratorVersion), Arc<ChunkEdges>>>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_generate(
        &self,
        seed: u32,
        level: i32,
        cx: i32,
        cy: i32,
        generator: GeneratorVersion,
    ) -> Arc<ChunkEdges> {
        let key = (seed, level, cx, cy, generator);
        if let Some(hit) = self.cache.read().get(&key) {
            return hit.clone();
        }
        let mut cache = self.cache.write();
        match cache.entry(key) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(v) => {
                let chunk = Arc::new(generate_chunk(seed, level, cx, cy, generator));
                v.insert(chunk.clone());
                chunk
            }
        }
    }
}

fn new_wall_grids() -> (Vec<u8>, Vec<u8>) {
    (vec![EDGE_WALL; CELLS_PER_CHUNK], vec![EDGE_WALL; CELLS_PER_CHUNK])
}

fn idx(x: i32, y: i32) -> usize {
    (y * CHUNK_SIZE + x) as usize
}

// ---------------------------------------------------------------------------
// Variant A: recursive-backtracker maze with overlay rooms and doors
// ---------------------------------------------------------------------------

mod maze {
    use super::*;

    const ROOM_ATTEMPTS: i32 = 30;
    const DOOR_PROBABILITY: f64 = 0.06;

    pub fn generate(seed: u32, level: i32, cx: i32, cy: i32) -> ChunkEdges {
        let mut rng = Rng::new(mix(seed, level, cx, cy, "maze"));
        let (mut east, mut south) = new_wall_grids();

        carve_maze(&mut rng, &mut east, &mut south);
        place_rooms(&mut rng, &mut east, &mut south);
        sprinkle_doors(&mut rng, &mut east, &mut south);

        ChunkEdges {
            seed,
            level,
            chunk_x: cx,
            chunk_y: cy,
            generator: GeneratorVersion::Maze,
            east,
            south,
        }
    }

    fn open_edge(east: &mut [u8], south: &mut [u8], x: i32, y: i32, dir: Dir) {
        match dir {
            Dir::E => east[idx(x, y)] = EDGE_OPEN,
            Dir::S => south[idx(x, y)] = EDGE_OPEN,
            Dir::W => east[idx(x - 1, y)] = EDGE_OPEN,
            Dir::N => south[idx(x, y - 1)] = EDGE_OPEN,
        }
    }

    fn carve_maze(rng: &mut Rng, east: &mut [u8], south: &mut [u8]) {
        let mut visited = vec![false; CELLS_PER_CHUNK];
        let start = (rng.int(0, CHUNK_SIZE), rng.int(0, CHUNK_SIZE));
        let mut stack = vec![start];
        visited[idx(start.0, start.1)] = true;

        while let Some(&(x, y)) = stack.last() {
            let mut dirs = Dir::all();
            rng.shuffle_in_place(&mut dirs);

            let mut stepped = false;
            for dir in dirs {
                let (dx, dy) = dir.delta();
                let (nx, ny) = (x + dx, y + dy);
                if !(0..CHUNK_SIZE).contains(&nx) || !(0..CHUNK_SIZE).contains(&ny) {
                    continue;
                }
                if visited[idx(nx, ny)] {
                    continue;
                }
                open_edge(east, south, x, y, dir);
                visited[idx(nx, ny)] = true;
                stack.push((nx, ny));
                stepped = true;
                break;
            }

            if !stepped {
                stack.pop();
            }
        }
    }

    fn place_rooms(rng: &mut Rng, east: &mut [u8], south: &mut [u8]) {
        for _ in 0..ROOM_ATTEMPTS {
            let w = rng.int(2, 6);
            let h = rng.int(2, 6);
            let margin = 1;
            let max_x = CHUNK_SIZE - w - margin;
            let max_y = CHUNK_SIZE - h - margin;
            if max_x <= margin || max_y <= margin {
                continue;
            }
            let x0 = rng.int(margin, max_x);
            let y0 = rng.int(margin, max_y);

            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    if x + 1 < x0 + w {
                        east[idx(x, y)] = EDGE_OPEN;
                    }
                    if y + 1 < y0 + h {
                        south[idx(x, y)] = EDGE_OPEN;
                    }
                }
            }

            let perimeter_openings = rng.int(1, 4);
            for _ in 0..perimeter_openings {
                open_random_perimeter_edge(rng, east, south, x0, y0, w, h);
            }
        }
    }

    fn open_random_perimeter_edge(
        rng: &mut Rng,
        east: &mut [u8],
        south: &mut [u8],
        x0: i32,
        y0: i32,
        w: i32,
        h: i32,
    ) {
        // Pick a random perimeter cell and a direction pointing outward.
        let side = rng.int(0, 4);
        let (x, y, dir) = match side {
            0 => (rng.int(x0, x0 + w), y0, Dir::N),
            1 => (x0 + w - 1, rng.int(y0, y0 + h), Dir::E),
            2 => (rng.int(x0, x0 + w), y0 + h - 1, Dir::S),
            _ => (x0, rng.int(y0, y0 + h), Dir::W),
        };
        let (dx, dy) = dir.delta();
        let (nx, ny) = (x + dx, y + dy);
        if (0..CHUNK_SIZE).contains(&nx) && (0..CHUNK_SIZE).contains(&ny) {
            open_edge(east, south, x, y, dir);
        }
    }

    fn sprinkle_doors(rng: &mut Rng, east: &mut [u8], south: &mut [u8]) {
        for e in east.iter_mut().chain(south.iter_mut()) {
            if *e == EDGE_OPEN && rng.float01() < DOOR_PROBABILITY {
                *e = EDGE_DOOR_UNLOCKED;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Variant B: BSP dungeon with corridor connections
// ---------------------------------------------------------------------------

mod bsp {
    use super::*;

    const MIN_LEAF: i32 = 8;
    const WIDEN_DENOMINATOR: i32 = 12;

    struct Leaf {
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        left: Option<Box<Leaf>>,
        right: Option<Box<Leaf>>,
        room: Option<(i32, i32, i32, i32)>,
    }

    impl Leaf {
        fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
            Self {
                x,
                y,
                w,
                h,
                left: None,
                right: None,
                room: None,
            }
        }

        fn split(&mut self, rng: &mut Rng) -> bool {
            if self.left.is_some() || self.right.is_some() {
                return false;
            }
            let split_horizontally = if self.w > self.h {
                false
            } else if self.h > self.w {
                true
            } else {
                rng.int(0, 2) == 0
            };

            if split_horizontally {
                if self.h < MIN_LEAF * 2 {
                    return false;
                }
                let split = rng.int(MIN_LEAF, self.h - MIN_LEAF);
                self.left = Some(Box::new(Leaf::new(self.x, self.y, self.w, split)));
                self.right = Some(Box::new(Leaf::new(
                    self.x,
                    self.y + split,
                    self.w,
                    self.h - split,
                )));
            } else {
                if self.w < MIN_LEAF * 2 {
                    return false;
                }
                let split = rng.int(MIN_LEAF, self.w - MIN_LEAF);
                self.left = Some(Box::new(Leaf::new(self.x, self.y, split, self.h)));
                self.right = Some(Box::new(Leaf::new(
                    self.x + split,
                    self.y,
                    self.w - split,
                    self.h,
                )));
            }
            true
        }

        fn center(&self) -> (i32, i32) {
            if let Some((rx, ry, rw, rh)) = self.room {
                (rx + rw / 2, ry + rh / 2)
            } else {
                (self.x + self.w / 2, self.y + self.h / 2)
            }
        }
    }

    fn build_tree(rng: &mut Rng, leaf: &mut Leaf, depth: u32) {
        if depth == 0 {
            return;
        }
        if leaf.split(rng) {
            if let Some(left) = leaf.left.as_deref_mut() {
                build_tree(rng, left, depth - 1);
            }
            if let Some(right) = leaf.right.as_deref_mut() {
                build_tree(rng, right, depth - 1);
            }
        }
    }

    fn place_rooms(rng: &mut Rng, leaf: &mut Leaf) {
        if leaf.left.is_none() && leaf.right.is_none() {
            let margin = 1;
            let rw = (leaf.w - margin * 2).clamp(2, leaf.w);
            let rh = (leaf.h - margin * 2).clamp(2, leaf.h);
            let slack_x = leaf.w - rw;
            let slack_y = leaf.h - rh;
            let rx = leaf.x + rng.int(0, slack_x + 1);
            let ry = leaf.y + rng.int(0, slack_y + 1);
            leaf.room = Some((rx, ry, rw, rh));
            return;
        }
        if let Some(left) = leaf.left.as_deref_mut() {
            place_rooms(rng, left);
        }
        if let Some(right) = leaf.right.as_deref_mut() {
            place_rooms(rng, right);
        }
    }

    fn carve_room(east: &mut [u8], south: &mut [u8], rx: i32, ry: i32, rw: i32, rh: i32) {
        for y in ry..ry + rh {
            for x in rx..rx + rw {
                if !(0..CHUNK_SIZE).contains(&x) || !(0..CHUNK_SIZE).contains(&y) {
                    continue;
                }
                if x + 1 < rx + rw && x + 1 < CHUNK_SIZE {
                    east[idx(x, y)] = EDGE_OPEN;
                }
                if y + 1 < ry + rh && y + 1 < CHUNK_SIZE {
                    south[idx(x, y)] = EDGE_OPEN;
                }
            }
        }
    }

    fn carve_corridor(
        rng: &mut Rng,
        east: &mut [u8],
        south: &mut [u8],
        from: (i32, i32),
        to: (i32, i32),
    ) {
        let (x0, y0) = from;
        let (x1, y1) = to;
        let widen = rng.int(0, WIDEN_DENOMINATOR) == 0;

        let horizontal_first = rng.int(0, 2) == 0;
        let mut x = x0;
        let mut y = y0;

        let step_h = |east: &mut [u8], x: &mut i32, y: i32, target_x: i32, widen: bool| {
            while *x != target_x {
                let dir = if target_x > *x { Dir::E } else { Dir::W };
                let (dx, _) = dir.delta();
                let cur = if dx > 0 { *x } else { *x - 1 };
                if (0..CHUNK_SIZE).contains(&cur) {
                    east[idx(cur, y)] = EDGE_OPEN;
                    if widen && y + 1 < CHUNK_SIZE {
                        east[idx(cur, y + 1)] = EDGE_OPEN;
                    }
                }
                *x += dx;
            }
        };
        let step_v = |south: &mut [u8], x: i32, y: &mut i32, target_y: i32, widen: bool| {
            while *y != target_y {
                let dir = if target_y > *y { Dir::S } else { Dir::N };
                let (_, dy) = dir.delta();
                let cur = if dy > 0 { *y } else { *y - 1 };
                if (0..CHUNK_SIZE).contains(&cur) {
                    south[idx(x, cur)] = EDGE_OPEN;
                    if widen && x + 1 < CHUNK_SIZE {
                        south[idx(x + 1, cur)] = EDGE_OPEN;
                    }
                }
                *y += dy;
            }
        };

        if horizontal_first {
            step_h(east, &mut x, y, x1, widen);
            step_v(south, x, &mut y, y1, widen);
        } else {
            step_v(south, x, &mut y, y1, widen);
            step_h(east, &mut x, y, x1, widen);
        }
    }

    fn connect(rng: &mut Rng, east: &mut [u8], south: &mut [u8], leaf: &Leaf) {
        if let (Some(left), Some(right)) = (leaf.left.as_deref(), leaf.right.as_deref()) {
            connect(rng, east, south, left);
            connect(rng, east, south, right);
            carve_corridor(rng, east, south, left.center(), right.center());
        }
    }

    fn carve_rooms(east: &mut [u8], south: &mut [u8], leaf: &Leaf) {
        if let Some((rx, ry, rw, rh)) = leaf.room {
            carve_room(east, south, rx, ry, rw, rh);
        }
        if let Some(left) = leaf.left.as_deref() {
            carve_rooms(east, south, left);
        }
        if let Some(right) = leaf.right.as_deref() {
            carve_rooms(east, south, right);
        }
    }

    fn is_room_cell(leaf: &Leaf, x: i32, y: i32) -> bool {
        if let Some((rx, ry, rw, rh)) = leaf.room {
            if x >= rx && x < rx + rw && y >= ry && y < ry + rh {
                return true;
            }
        }
        if let Some(left) = leaf.left.as_deref() {
            if is_room_cell(left, x, y) {
                return true;
            }
        }
        if let Some(right) = leaf.right.as_deref() {
            if is_room_cell(right, x, y) {
                return true;
            }
        }
        false
    }

    /// Promote open edges crossing a room↔corridor boundary to doors;
    /// sanitize any accidental door elsewhere back to open.
    fn place_doors(east: &mut [u8], south: &mut [u8], root: &Leaf) {
        for y in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let here_room = is_room_cell(root, x, y);
                if x + 1 < CHUNK_SIZE {
                    let e = east[idx(x, y)];
                    if e != EDGE_WALL {
                        let there_room = is_room_cell(root, x + 1, y);
                        let boundary = here_room != there_room;
                        east[idx(x, y)] = if boundary { EDGE_DOOR_UNLOCKED } else { EDGE_OPEN };
                    }
                }
                if y + 1 < CHUNK_SIZE {
                    let s = south[idx(x, y)];
                    if s != EDGE_WALL {
                        let there_room = is_room_cell(root, x, y + 1);
                        let boundary = here_room != there_room;
                        south[idx(x, y)] = if boundary { EDGE_DOOR_UNLOCKED } else { EDGE_OPEN };
                    }
                }
            }
        }
    }

    /// Guarantee every room has at least one door by synthesizing one on its
    /// shortest perimeter wall if sanitization left it door-less.
    fn ensure_room_doors(east: &mut [u8], south: &mut [u8], leaf: &Leaf) {
        if let Some((rx, ry, rw, rh)) = leaf.room {
            let has_door = (ry..ry + rh).any(|y| {
                (rx..rx + rw).any(|x| {
                    (x + 1 < CHUNK_SIZE && east[idx(x, y)] == EDGE_DOOR_UNLOCKED)
                        || (x > 0 && east[idx(x - 1, y)] == EDGE_DOOR_UNLOCKED)
                        || (y + 1 < CHUNK_SIZE && south[idx(x, y)] == EDGE_DOOR_UNLOCKED)
                        || (y > 0 && south[idx(x, y - 1)] == EDGE_DOOR_UNLOCKED)
                })
            });
            if !has_door && rx + rw < CHUNK_SIZE {
                let x = rx + rw - 1;
                let y = ry + rh / 2;
                east[idx(x, y)] = EDGE_DOOR_UNLOCKED;
            }
        }
        if let Some(left) = leaf.left.as_deref() {
            ensure_room_doors(east, south, left);
        }
        if let Some(right) = leaf.right.as_deref() {
            ensure_room_doors(east, south, right);
        }
    }

    pub fn generate(seed: u32, level: i32, cx: i32, cy: i32) -> ChunkEdges {
        let mut rng = Rng::new(mix(seed, level, cx, cy, "bsp_v4"));
        let (mut east, mut south) = new_wall_grids();

        let mut root = Leaf::new(0, 0, CHUNK_SIZE, CHUNK_SIZE);
        build_tree(&mut rng, &mut root, 4);
        place_rooms(&mut rng, &mut root);
        carve_rooms(&mut east, &mut south, &root);
        connect(&mut rng, &mut east, &mut south, &root);
        place_doors(&mut east, &mut south, &root);
        ensure_room_doors(&mut east, &mut south, &root);

        ChunkEdges {
            seed,
            level,
            chunk_x: cx,
            chunk_y: cy,
            generator: GeneratorVersion::BspV4,
            east,
            south,
        }
    }
}
