// Core types shared across the simulation.
//
// Spatial types (`Cell`, `TileRef`) and the compact arena indices executions
// hold instead of references (`PlayerIdx`, `UnitId`). Wire-level identities
// (`PlayerId`, `UnitType`, ...) live in `frontier_protocol` and are
// re-exported here for convenience.
//
// **Critical constraint: determinism.** Indices are assigned in creation
// order by `World`; nothing here depends on hashing or allocation addresses.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use frontier_protocol::{GameType, PlayerId, PlayerType, UnitType};

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A grid position. `x` grows east, `y` grows south.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Dense tile index into a `GameMap`: `x + y * width`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileRef(pub u32);

impl TileRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Arena indices
// ---------------------------------------------------------------------------

/// Index of a player in `World`'s player table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerIdx(pub u16);

impl PlayerIdx {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Monotonic unit id. Never reused within a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unit({})", self.0)
    }
}

/// Who an action is aimed at: a player, or unclaimed land.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Player(PlayerIdx),
    TerraNullius,
}

impl Target {
    pub fn player(self) -> Option<PlayerIdx> {
        match self {
            Target::Player(p) => Some(p),
            Target::TerraNullius => None,
        }
    }

    /// Whether a tile with this owner belongs to the target.
    pub fn owns(self, owner: Option<PlayerIdx>) -> bool {
        owner == self.player()
    }
}

impl From<Option<PlayerIdx>> for Target {
    fn from(owner: Option<PlayerIdx>) -> Self {
        owner.map_or(Target::TerraNullius, Target::Player)
    }
}
