// Incremental A* over the tile grid.
//
// `PathFinder::next_tile(map, from, to)` answers "which tile should a unit at
// `from` step onto next to reach `to`?" without ever blocking the tick loop:
// each call expands at most `iterations` nodes of a resumable `AStar` search
// and returns `Pending` if the search is not finished yet. A search that has
// not finished after `max_tries` calls is abandoned with `PathNotFound`.
//
// Once a search completes, the path is cached and walked one tile per call.
// The cache stays valid while the destination is unchanged and the unit is
// where the last answer sent it; if the next cached tile has stopped being
// passable, the search restarts from the current tile.
//
// Passability is a plain predicate over tiles (`fn(&GameMap, TileRef) ->
// bool`; boats use "is water"). Search start and destination are always
// enterable, so a boat can leave a shore tile and land on one. Every step
// costs 1; `f = g + weight * manhattan(tile, goal)`.
//
// The open set is a `BinaryHeap` (min-heap via reversed ordering) keyed by
// `(f, h, insertion sequence)`. Score and came-from maps are `FxHashMap`s,
// used for lookup only, so hash order never influences the result.
//
// See also: `map.rs` for neighbour order, `execution/transport_ship.rs` for
// the main caller.
//
// **Critical constraint: determinism.** For identical map state and inputs
// the sequence of returned tiles is identical on every run. Ties between
// equally good candidates resolve by lower heuristic, then by discovery
// order, and neighbours are discovered in the map's fixed N, E, S, W order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::map::GameMap;
use crate::types::TileRef;

/// Tile passability predicate.
pub type Passable = fn(&GameMap, TileRef) -> bool;

/// Boats travel over water.
pub fn is_water(map: &GameMap, tile: TileRef) -> bool {
    map.is_water(tile)
}

/// Answer to one `next_tile` query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathFindResult {
    /// Step onto this tile; it is the destination.
    Completed(TileRef),
    /// Step onto this tile; the destination is further on.
    NextTile(TileRef),
    /// Search still running. Ask again next tick.
    Pending,
    /// The destination is unreachable (or the search budget ran out).
    PathNotFound,
}

/// Entry in the open set (min-heap via reversed ordering).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OpenEntry {
    f: u32,
    h: u32,
    seq: u64,
    tile: TileRef,
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: smallest (f, h, seq) is "greatest".
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SearchStatus {
    Completed,
    Pending,
    NoPath,
}

/// One resumable A* search from `start` to `goal`.
#[derive(Debug)]
struct AStar {
    start: TileRef,
    goal: TileRef,
    weight: u32,
    iterations: u32,
    max_tries: u32,
    tries: u32,
    seq: u64,
    open: BinaryHeap<OpenEntry>,
    g_score: FxHashMap<TileRef, u32>,
    came_from: FxHashMap<TileRef, TileRef>,
    closed: FxHashSet<TileRef>,
}

impl AStar {
    fn new(
        map: &GameMap,
        start: TileRef,
        goal: TileRef,
        iterations: u32,
        max_tries: u32,
        weight: u32,
    ) -> Self {
        let mut search = Self {
            start,
            goal,
            weight,
            iterations,
            max_tries,
            tries: 0,
            seq: 0,
            open: BinaryHeap::new(),
            g_score: FxHashMap::default(),
            came_from: FxHashMap::default(),
            closed: FxHashSet::default(),
        };
        search.g_score.insert(start, 0);
        search.push(map, start, 0);
        search
    }

    fn push(&mut self, map: &GameMap, tile: TileRef, g: u32) {
        let h = map.manhattan_dist(tile, self.goal);
        self.open.push(OpenEntry {
            f: g.saturating_add(h.saturating_mul(self.weight)),
            h,
            seq: self.seq,
            tile,
        });
        self.seq += 1;
    }

    /// Expand up to `iterations` nodes.
    fn compute(&mut self, map: &GameMap, passable: Passable) -> SearchStatus {
        if self.tries >= self.max_tries {
            return SearchStatus::NoPath;
        }
        self.tries += 1;
        let mut budget = self.iterations;

        while budget > 0 {
            let Some(current) = self.open.pop() else {
                return SearchStatus::NoPath;
            };
            if current.tile == self.goal {
                return SearchStatus::Completed;
            }
            if !self.closed.insert(current.tile) {
                continue;
            }
            budget -= 1;

            let current_g = self.g_score.get(&current.tile).copied().unwrap_or(u32::MAX);
            for neighbor in map.neighbors(current.tile) {
                if self.closed.contains(&neighbor) {
                    continue;
                }
                if neighbor != self.goal && !passable(map, neighbor) {
                    continue;
                }
                let tentative = current_g.saturating_add(1);
                if tentative < self.g_score.get(&neighbor).copied().unwrap_or(u32::MAX) {
                    self.g_score.insert(neighbor, tentative);
                    self.came_from.insert(neighbor, current.tile);
                    self.push(map, neighbor, tentative);
                }
            }
        }

        if self.tries >= self.max_tries {
            SearchStatus::NoPath
        } else {
            SearchStatus::Pending
        }
    }

    /// Path after `start`, ending at `goal`. Only meaningful once `compute`
    /// returned `Completed`.
    fn path(&self) -> VecDeque<TileRef> {
        let mut path = VecDeque::new();
        let mut current = self.goal;
        while current != self.start {
            path.push_front(current);
            match self.came_from.get(&current) {
                Some(&prev) => current = prev,
                None => break,
            }
        }
        path
    }
}

/// Stateful next-step oracle for one moving unit.
#[derive(Debug)]
pub struct PathFinder {
    iterations: u32,
    max_tries: u32,
    weight: u32,
    passable: Passable,
    dst: Option<TileRef>,
    /// Where the unit should be now: the search start, or the last tile
    /// handed out.
    origin: Option<TileRef>,
    search: Option<AStar>,
    path: Option<VecDeque<TileRef>>,
}

impl PathFinder {
    pub fn new(iterations: u32, max_tries: u32, passable: Passable) -> Self {
        Self {
            iterations: iterations.max(1),
            max_tries: max_tries.max(1),
            weight: 1,
            passable,
            dst: None,
            origin: None,
            search: None,
            path: None,
        }
    }

    /// Heuristic weight. Values above 1 trade optimality for fewer
    /// expansions.
    pub fn with_heuristic_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    fn reset(&mut self, from: TileRef, to: TileRef) {
        self.dst = Some(to);
        self.origin = Some(from);
        self.search = None;
        self.path = None;
    }

    pub fn next_tile(&mut self, map: &GameMap, from: TileRef, to: TileRef) -> PathFindResult {
        if from == to {
            return PathFindResult::Completed(to);
        }
        if self.dst != Some(to) || self.origin != Some(from) {
            self.reset(from, to);
        }

        if self.path.is_some() {
            if let Some(result) = self.step(map, to) {
                return result;
            }
            // Next cached tile is blocked: search again from here.
            self.reset(from, to);
        }

        let (iterations, max_tries, weight) = (self.iterations, self.max_tries, self.weight);
        let search = self
            .search
            .get_or_insert_with(|| AStar::new(map, from, to, iterations, max_tries, weight));
        match search.compute(map, self.passable) {
            SearchStatus::Completed => {
                self.path = Some(search.path());
                self.search = None;
                self.step(map, to).unwrap_or(PathFindResult::PathNotFound)
            }
            SearchStatus::Pending => PathFindResult::Pending,
            SearchStatus::NoPath => {
                self.search = None;
                self.dst = None;
                self.origin = None;
                PathFindResult::PathNotFound
            }
        }
    }

    /// Take the next cached tile, or `None` if it is missing or blocked.
    fn step(&mut self, map: &GameMap, to: TileRef) -> Option<PathFindResult> {
        let path = self.path.as_mut()?;
        let next = *path.front()?;
        if next != to && !(self.passable)(map, next) {
            return None;
        }
        path.pop_front();
        self.origin = Some(next);
        Some(if next == to {
            PathFindResult::Completed(next)
        } else {
            PathFindResult::NextTile(next)
        })
    }
}
