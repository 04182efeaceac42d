// Data-driven game configuration.
//
// All numeric policy the sim consults lives in `GameConfig`, loaded from JSON
// (the `config` value carried by the authority's `start` message). Executions
// never use magic numbers; they read boat limits, path-finder budgets, attack
// costs and unit costs from here. Every field has a default, so a partial
// JSON object (or `{}`) is a valid config.
//
// `GameConfig::dev()` is the development preset: a short spawn phase for
// single-player games and one tenth of the normal unit costs.
//
// See also: `sim.rs` which owns the `GameConfig` as part of `SimState`,
// `execution/transport_ship.rs` for the boat policy helpers.
//
// **Critical constraint: determinism.** Config values feed directly into
// simulation logic. All replicas of a game must use identical configs; the
// fields are integers so no float rounding can differ between platforms.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{GameType, PlayerIdx, Target, UnitType};
use crate::world::World;

/// Failure to load a config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid game config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid game config: {field} must be non-zero")]
    Zero { field: &'static str },
}

/// Gold cost of each buildable unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitCosts {
    pub transport_ship: u64,
    pub warship: u64,
    pub port: u64,
    pub city: u64,
    pub defense_post: u64,
    pub missile_silo: u64,
}

impl Default for UnitCosts {
    fn default() -> Self {
        Self {
            transport_ship: 0,
            warship: 250_000,
            port: 100_000,
            city: 250_000,
            defense_post: 25_000,
            missile_silo: 1_000_000,
        }
    }
}

impl UnitCosts {
    pub fn cost(&self, unit: UnitType) -> u64 {
        match unit {
            UnitType::TransportShip => self.transport_ship,
            UnitType::Warship => self.warship,
            UnitType::Port => self.port,
            UnitType::City => self.city,
            UnitType::DefensePost => self.defense_post,
            UnitType::MissileSilo => self.missile_silo,
        }
    }
}

/// Every tunable simulation parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub game_type: GameType,

    /// Maximum concurrent transport ships per player.
    pub boat_max_number: u32,
    /// Default boat payload is `owner troops / boat_attack_divisor`.
    pub boat_attack_divisor: u32,
    /// Ticks between successive boat moves.
    pub ticks_per_move: u64,
    /// How far (BFS steps over the clicked player's land) to look for a
    /// shore tile when the clicked tile is inland.
    pub boat_target_search_radius: u32,

    /// Node expansions per `PathFinder::next_tile` call.
    pub path_iterations: u32,
    /// Calls a single search may span before it is abandoned.
    pub path_max_tries: u32,
    /// `f = g + weight * manhattan`. 1 keeps the heuristic admissible.
    pub path_heuristic_weight: u32,

    /// Ticks at the start of the game during which only spawns run.
    pub num_spawn_phase_turns: u64,
    pub starting_troops: u32,
    pub starting_gold: u64,
    /// Manhattan radius of the territory claimed around a spawn cell.
    pub spawn_radius: u32,

    /// Troops spent to take an unowned tile.
    pub attack_cost_per_tile: u32,
    /// Troops spent to take a tile owned by another player.
    pub attack_cost_per_defended_tile: u32,
    /// Upper bound on tiles one attack conquers per tick.
    pub attack_tiles_per_tick: u32,

    /// Default donation is `sender troops / donate_divisor`.
    pub donate_divisor: u32,

    pub unit_costs: UnitCosts,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            game_type: GameType::Singleplayer,
            boat_max_number: 3,
            boat_attack_divisor: 5,
            ticks_per_move: 1,
            boat_target_search_radius: 10,
            path_iterations: 10_000,
            path_max_tries: 2,
            path_heuristic_weight: 1,
            num_spawn_phase_turns: 100,
            starting_troops: 1_000,
            starting_gold: 0,
            spawn_radius: 2,
            attack_cost_per_tile: 1,
            attack_cost_per_defended_tile: 2,
            attack_tiles_per_tick: 4,
            donate_divisor: 3,
            unit_costs: UnitCosts::default(),
        }
    }
}

impl GameConfig {
    /// Development preset for `game_type`.
    pub fn dev(game_type: GameType) -> Self {
        let base = UnitCosts::default();
        Self {
            game_type,
            num_spawn_phase_turns: match game_type {
                GameType::Singleplayer => 40,
                GameType::Public | GameType::Private => 200,
            },
            unit_costs: UnitCosts {
                transport_ship: base.transport_ship / 10,
                warship: base.warship / 10,
                port: base.port / 10,
                city: base.city / 10,
                defense_post: base.defense_post / 10,
                missile_silo: base.missile_silo / 10,
            },
            ..Self::default()
        }
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from an already-decoded JSON value (the `config`
    /// field of a `start` message). `null` yields the defaults.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config = Self::deserialize(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("boat_attack_divisor", self.boat_attack_divisor),
            ("donate_divisor", self.donate_divisor),
            ("path_iterations", self.path_iterations),
            ("path_max_tries", self.path_max_tries),
            ("attack_tiles_per_tick", self.attack_tiles_per_tick),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.ticks_per_move == 0 {
            return Err(ConfigError::Zero {
                field: "ticks_per_move",
            });
        }
        Ok(())
    }

    /// Default boat payload when `owner` attacks `target`. The current
    /// policy is a fixed share of the owner's troops whatever the target.
    pub fn boat_attack_amount(&self, world: &World, owner: PlayerIdx, _target: Target) -> u32 {
        world.troops(owner) / self.boat_attack_divisor.max(1)
    }

    /// Default donation for a sender with `sender_troops`.
    pub fn donate_amount(&self, sender_troops: u32) -> u32 {
        sender_troops / self.donate_divisor.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::GameMap;
    use crate::types::{PlayerId, PlayerType};

    #[test]
    fn empty_json_is_default() {
        assert_eq!(GameConfig::from_json("{}").unwrap(), GameConfig::default());
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let config = GameConfig::from_json(r#"{"boat_max_number": 7}"#).unwrap();
        assert_eq!(config.boat_max_number, 7);
        assert_eq!(config.ticks_per_move, GameConfig::default().ticks_per_move);
    }

    #[test]
    fn zero_divisor_is_rejected() {
        let err = GameConfig::from_json(r#"{"boat_attack_divisor": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Zero {
                field: "boat_attack_divisor"
            }
        ));
    }

    #[test]
    fn value_round_trip_and_null() {
        let config = GameConfig::dev(GameType::Public);
        assert_eq!(GameConfig::from_value(&config.to_value()).unwrap(), config);
        assert_eq!(
            GameConfig::from_value(&serde_json::Value::Null).unwrap(),
            GameConfig::default()
        );
    }

    #[test]
    fn dev_preset() {
        let sp = GameConfig::dev(GameType::Singleplayer);
        assert_eq!(sp.num_spawn_phase_turns, 40);
        assert_eq!(GameConfig::dev(GameType::Private).num_spawn_phase_turns, 200);
        assert_eq!(
            sp.unit_costs.cost(UnitType::City),
            UnitCosts::default().cost(UnitType::City) / 10
        );
    }

    #[test]
    fn default_amounts() {
        let config = GameConfig::default();
        let mut world = World::new(GameMap::from_ascii(&["..~~.."]));
        let owner = world.add_player(PlayerId::new("Owner000"), "Owner".into(), PlayerType::Human);
        let other = world.add_player(PlayerId::new("Other000"), "Other".into(), PlayerType::Bot);
        world.add_troops(owner, 100);
        assert_eq!(config.boat_attack_amount(&world, owner, Target::TerraNullius), 20);
        assert_eq!(config.boat_attack_amount(&world, owner, Target::Player(other)), 20);
        assert_eq!(config.boat_attack_amount(&world, other, Target::Player(owner)), 0);
        assert_eq!(config.donate_amount(100), 33);
    }
}
