// Dense 2D terrain grid.
//
// Terrain is stored as a flat `Vec<Terrain>` indexed by `x + y * width`
// (`TileRef`), giving O(1) lookups. The map is immutable once built; tile
// ownership and units live in `World`, not here.
//
// Neighbours are 4-connected and returned in a fixed order (N, E, S, W).
// The map does not wrap at its edges. That fixed order is what makes
// breadth-first searches and A* tie-breaking reproducible across replicas.
//
// Maps can be built from ASCII rows (`~` water, anything else land), which
// is how tests and the dev config describe small worlds.
//
// See also: `world.rs` for ownership, `pathfinding.rs` for searches over
// the grid.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::{Cell, TileRef};

/// Terrain of one tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terrain {
    #[default]
    Land,
    Water,
}

/// Up to four neighbours, no heap allocation.
pub type Neighbors = SmallVec<[TileRef; 4]>;

/// Immutable terrain grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMap {
    width: u32,
    height: u32,
    terrain: Vec<Terrain>,
}

impl GameMap {
    /// Create an all-land map.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            terrain: vec![Terrain::Land; width as usize * height as usize],
        }
    }

    /// Build a map from ASCII rows: `~` is water, any other char is land.
    /// Rows shorter than the first are padded with land.
    pub fn from_ascii(rows: &[&str]) -> Self {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |r| r.chars().count()) as u32;
        let mut map = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate().take(width as usize) {
                if ch == '~' {
                    map.terrain[x + y * width as usize] = Terrain::Water;
                }
            }
        }
        map
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn num_tiles(&self) -> usize {
        self.terrain.len()
    }

    /// Set terrain. No-op for out-of-range tiles.
    pub fn set_terrain(&mut self, tile: TileRef, terrain: Terrain) {
        if let Some(t) = self.terrain.get_mut(tile.index()) {
            *t = terrain;
        }
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    /// Tile at `cell`, or `None` if out of bounds.
    pub fn tile_at(&self, cell: Cell) -> Option<TileRef> {
        self.in_bounds(cell)
            .then(|| TileRef(cell.x as u32 + cell.y as u32 * self.width))
    }

    pub fn cell(&self, tile: TileRef) -> Cell {
        Cell::new(
            (tile.0 % self.width.max(1)) as i32,
            (tile.0 / self.width.max(1)) as i32,
        )
    }

    /// Terrain of `tile`. Out-of-range tiles read as land.
    pub fn terrain(&self, tile: TileRef) -> Terrain {
        self.terrain.get(tile.index()).copied().unwrap_or_default()
    }

    pub fn is_water(&self, tile: TileRef) -> bool {
        self.terrain(tile) == Terrain::Water
    }

    pub fn is_land(&self, tile: TileRef) -> bool {
        !self.is_water(tile)
    }

    /// Land tile with at least one water neighbour.
    pub fn is_shore(&self, tile: TileRef) -> bool {
        self.is_land(tile) && self.neighbors(tile).iter().any(|&n| self.is_water(n))
    }

    /// 4-connected neighbours in N, E, S, W order.
    pub fn neighbors(&self, tile: TileRef) -> Neighbors {
        let c = self.cell(tile);
        let mut out = Neighbors::new();
        for (dx, dy) in [(0, -1), (1, 0), (0, 1), (-1, 0)] {
            if let Some(n) = self.tile_at(Cell::new(c.x + dx, c.y + dy)) {
                out.push(n);
            }
        }
        out
    }

    pub fn manhattan_dist(&self, a: TileRef, b: TileRef) -> u32 {
        let ca = self.cell(a);
        let cb = self.cell(b);
        ca.x.abs_diff(cb.x) + ca.y.abs_diff(cb.y)
    }

    /// All tile refs in index order.
    pub fn tiles(&self) -> impl Iterator<Item = TileRef> + '_ {
        (0..self.terrain.len() as u32).map(TileRef)
    }
}
