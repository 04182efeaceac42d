// World arena: every entity the executions act on, held by stable index.
//
// Players live in a `Vec<Player>` indexed by `PlayerIdx`, tile ownership in a
// `Vec<Option<PlayerIdx>>` parallel to the map (`None` is terra nullius),
// and units in a `BTreeMap<UnitId, Unit>` keyed by a monotonic id. Executions
// hold these indices, never references, and change the world only through
// the mutation methods below (`add_troops`, `conquer`, `move_unit`, ...).
// All fields are private, so there is no other way in.
//
// Mutations that clients may want to show append a `SimEvent` to the
// outgoing log, stamped with the current tick. `SimState` drains the log
// once per tick.
//
// Spatial helpers used by the boat execution also live here because they
// need both terrain and ownership:
// - `closest_shore_from_player`: the launch tile, the owner's shore tile
//   nearest the destination;
// - `target_transport_tile`: resolve a clicked cell to a landing tile, a BFS
//   over the clicked owner's land for the nearest shore.
//
// See also: `map.rs` for terrain, `execution/` for the mutators' callers,
// `sim.rs` which owns the `World` as part of `SimState`.
//
// **Critical constraint: determinism.** Iteration is always in index order
// (`Vec`, `BTreeMap`, `BTreeSet`); the BFS visits neighbours in map order.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::event::{MessageType, SimEvent, SimEventKind};
use crate::map::GameMap;
use crate::types::{PlayerId, PlayerIdx, PlayerType, TileRef, UnitId, UnitType};

/// A player's state. Read-only outside the arena.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub idx: PlayerIdx,
    pub id: PlayerId,
    pub name: String,
    pub player_type: PlayerType,
    pub troops: u32,
    pub gold: u64,
    /// Desired troop share of population, in thousandths.
    pub target_troop_ratio: u32,
    /// Player this one's bots/UI are focusing.
    pub target: Option<PlayerIdx>,
    pub spawned: bool,
}

/// A unit on the map. Transport ships carry troops; other kinds carry none.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub unit_type: UnitType,
    pub owner: PlayerIdx,
    pub tile: TileRef,
    pub troops: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct World {
    map: GameMap,
    tick: u64,
    players: Vec<Player>,
    owners: Vec<Option<PlayerIdx>>,
    units: BTreeMap<UnitId, Unit>,
    next_unit_id: u64,
    /// Unordered pairs stored as `(min, max)`.
    alliances: BTreeSet<(PlayerIdx, PlayerIdx)>,
    /// `(requestor, recipient)`.
    alliance_requests: BTreeSet<(PlayerIdx, PlayerIdx)>,
    #[serde(skip)]
    events: Vec<SimEvent>,
}

fn pair(a: PlayerIdx, b: PlayerIdx) -> (PlayerIdx, PlayerIdx) {
    if a <= b { (a, b) } else { (b, a) }
}

impl World {
    pub fn new(map: GameMap) -> Self {
        let owners = vec![None; map.num_tiles()];
        Self {
            map,
            tick: 0,
            players: Vec::new(),
            owners,
            units: BTreeMap::new(),
            next_unit_id: 0,
            alliances: BTreeSet::new(),
            alliance_requests: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    pub(crate) fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    /// Register a player, or return the existing index if `id` is known.
    pub fn add_player(&mut self, id: PlayerId, name: String, player_type: PlayerType) -> PlayerIdx {
        if let Some(idx) = self.player_by_id(&id) {
            return idx;
        }
        let idx = PlayerIdx(u16::try_from(self.players.len()).unwrap_or(u16::MAX));
        self.players.push(Player {
            idx,
            id,
            name,
            player_type,
            troops: 0,
            gold: 0,
            target_troop_ratio: 1_000,
            target: None,
            spawned: false,
        });
        idx
    }

    pub fn player(&self, idx: PlayerIdx) -> Option<&Player> {
        self.players.get(idx.index())
    }

    pub fn player_by_id(&self, id: &PlayerId) -> Option<PlayerIdx> {
        self.players.iter().find(|p| p.id == *id).map(|p| p.idx)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    fn player_mut(&mut self, idx: PlayerIdx) -> Option<&mut Player> {
        self.players.get_mut(idx.index())
    }

    /// Troops of `idx`, 0 for unknown players.
    pub fn troops(&self, idx: PlayerIdx) -> u32 {
        self.player(idx).map_or(0, |p| p.troops)
    }

    pub fn add_troops(&mut self, idx: PlayerIdx, troops: u32) {
        if let Some(p) = self.player_mut(idx) {
            p.troops = p.troops.saturating_add(troops);
        }
    }

    /// Remove up to `troops`, never going below zero. Returns the amount
    /// actually removed.
    pub fn remove_troops(&mut self, idx: PlayerIdx, troops: u32) -> u32 {
        match self.player_mut(idx) {
            Some(p) => {
                let removed = troops.min(p.troops);
                p.troops -= removed;
                removed
            }
            None => 0,
        }
    }

    pub fn add_gold(&mut self, idx: PlayerIdx, gold: u64) {
        if let Some(p) = self.player_mut(idx) {
            p.gold = p.gold.saturating_add(gold);
        }
    }

    /// Spend `gold` if the player has that much. Returns whether it was spent.
    pub fn remove_gold(&mut self, idx: PlayerIdx, gold: u64) -> bool {
        match self.player_mut(idx) {
            Some(p) if p.gold >= gold => {
                p.gold -= gold;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn mark_spawned(&mut self, idx: PlayerIdx) {
        if let Some(p) = self.player_mut(idx) {
            p.spawned = true;
        }
    }

    pub fn set_target(&mut self, idx: PlayerIdx, target: PlayerIdx) {
        if let Some(p) = self.player_mut(idx) {
            p.target = Some(target);
        }
    }

    /// Ratio in thousandths, clamped to `0..=1000`.
    pub fn set_target_troop_ratio(&mut self, idx: PlayerIdx, permille: u32) {
        if let Some(p) = self.player_mut(idx) {
            p.target_troop_ratio = permille.min(1_000);
        }
    }

    // -----------------------------------------------------------------------
    // Territory
    // -----------------------------------------------------------------------

    pub fn owner(&self, tile: TileRef) -> Option<PlayerIdx> {
        self.owners.get(tile.index()).copied().flatten()
    }

    /// Give `tile` to `idx`. No-op if it is already theirs or out of range.
    pub fn conquer(&mut self, idx: PlayerIdx, tile: TileRef) {
        let Some(slot) = self.owners.get_mut(tile.index()) else {
            return;
        };
        if *slot == Some(idx) {
            return;
        }
        let previous = slot.replace(idx);
        self.emit(SimEventKind::TileConquered {
            tile,
            conqueror: idx,
            previous,
        });
    }

    /// Return `tile` to terra nullius.
    pub fn relinquish(&mut self, tile: TileRef) {
        if let Some(slot) = self.owners.get_mut(tile.index()) {
            *slot = None;
        }
    }

    /// Tiles owned by `idx`, in index order.
    pub fn tiles_owned(&self, idx: PlayerIdx) -> Vec<TileRef> {
        self.map
            .tiles()
            .filter(|&t| self.owner(t) == Some(idx))
            .collect()
    }

    pub fn num_tiles_owned(&self, idx: PlayerIdx) -> usize {
        self.owners.iter().filter(|&&o| o == Some(idx)).count()
    }

    /// Owned tiles with at least one neighbour not owned by `idx`.
    pub fn border_tiles(&self, idx: PlayerIdx) -> Vec<TileRef> {
        self.map
            .tiles()
            .filter(|&t| {
                self.owner(t) == Some(idx)
                    && self
                        .map
                        .neighbors(t)
                        .iter()
                        .any(|&n| self.owner(n) != Some(idx))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Units
    // -----------------------------------------------------------------------

    pub fn build_unit(
        &mut self,
        owner: PlayerIdx,
        unit_type: UnitType,
        troops: u32,
        tile: TileRef,
    ) -> UnitId {
        let id = UnitId(self.next_unit_id);
        self.next_unit_id += 1;
        self.units.insert(
            id,
            Unit {
                id,
                unit_type,
                owner,
                tile,
                troops,
            },
        );
        self.emit(SimEventKind::UnitBuilt {
            unit: id,
            unit_type,
            owner,
            tile,
        });
        id
    }

    /// Move a unit. Returns false if it no longer exists.
    pub fn move_unit(&mut self, id: UnitId, tile: TileRef) -> bool {
        match self.units.get_mut(&id) {
            Some(unit) => {
                unit.tile = tile;
                true
            }
            None => false,
        }
    }

    pub fn delete_unit(&mut self, id: UnitId) -> Option<Unit> {
        let unit = self.units.remove(&id)?;
        self.emit(SimEventKind::UnitDeleted {
            unit: id,
            unit_type: unit.unit_type,
            owner: unit.owner,
        });
        Some(unit)
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn units_of(&self, owner: PlayerIdx, unit_type: UnitType) -> impl Iterator<Item = &Unit> {
        self.units
            .values()
            .filter(move |u| u.owner == owner && u.unit_type == unit_type)
    }

    // -----------------------------------------------------------------------
    // Diplomacy
    // -----------------------------------------------------------------------

    pub fn is_allied(&self, a: PlayerIdx, b: PlayerIdx) -> bool {
        a != b && self.alliances.contains(&pair(a, b))
    }

    pub fn create_alliance(&mut self, a: PlayerIdx, b: PlayerIdx) {
        if a == b || !self.alliances.insert(pair(a, b)) {
            return;
        }
        self.alliance_requests.remove(&(a, b));
        self.alliance_requests.remove(&(b, a));
        self.emit(SimEventKind::AllianceFormed { a, b });
    }

    /// Returns whether there was an alliance to break.
    pub fn break_alliance(&mut self, breaker: PlayerIdx, other: PlayerIdx) -> bool {
        if !self.alliances.remove(&pair(breaker, other)) {
            return false;
        }
        self.emit(SimEventKind::AllianceBroken { breaker, other });
        true
    }

    /// Record a pending request. Returns false if one is already pending.
    pub fn add_alliance_request(&mut self, requestor: PlayerIdx, recipient: PlayerIdx) -> bool {
        self.alliance_requests.insert((requestor, recipient))
    }

    /// Remove a pending request. Returns whether one existed.
    pub fn take_alliance_request(&mut self, requestor: PlayerIdx, recipient: PlayerIdx) -> bool {
        self.alliance_requests.remove(&(requestor, recipient))
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    pub fn display_message(
        &mut self,
        text: impl Into<String>,
        message_type: MessageType,
        player: Option<PlayerIdx>,
    ) {
        self.emit(SimEventKind::DisplayMessage {
            text: text.into(),
            message_type,
            player,
        });
    }

    pub fn emit(&mut self, kind: SimEventKind) {
        self.events.push(SimEvent {
            tick: self.tick,
            kind,
        });
    }

    // -----------------------------------------------------------------------
    // Spatial queries
    // -----------------------------------------------------------------------

    /// The shore tile of `idx` nearest to `target` (Manhattan distance,
    /// ties to the lower tile index).
    pub fn closest_shore_from_player(&self, idx: PlayerIdx, target: TileRef) -> Option<TileRef> {
        self.map
            .tiles()
            .filter(|&t| self.owner(t) == Some(idx) && self.map.is_shore(t))
            .min_by_key(|&t| (self.map.manhattan_dist(t, target), t))
    }

    /// Resolve a clicked tile to a landing tile for a transport ship.
    ///
    /// A shore tile is its own landing tile. An inland tile resolves to the
    /// nearest shore tile with the same owner, searching at most
    /// `max_radius` steps over that owner's land. Water never resolves.
    pub fn target_transport_tile(&self, tile: TileRef, max_radius: u32) -> Option<TileRef> {
        if self.map.is_water(tile) || tile.index() >= self.map.num_tiles() {
            return None;
        }
        if self.map.is_shore(tile) {
            return Some(tile);
        }
        let owner = self.owner(tile);
        let mut seen = BTreeSet::from([tile]);
        let mut queue = VecDeque::from([(tile, 0u32)]);
        while let Some((current, dist)) = queue.pop_front() {
            if self.map.is_shore(current) {
                return Some(current);
            }
            if dist >= max_radius {
                continue;
            }
            for n in self.map.neighbors(current) {
                if self.map.is_land(n) && self.owner(n) == owner && seen.insert(n) {
                    queue.push_back((n, dist + 1));
                }
            }
        }
        None
    }
}
