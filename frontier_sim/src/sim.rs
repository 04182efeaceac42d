// Top-level simulation state and turn loop.
//
// `SimState` owns the world arena, the execution scheduler and the game
// config. The authority numbers turns; every replica applies the same turns
// in the same order, and each turn advances the world by exactly one tick:
//
//   apply_turn(turn):
//     1. convert the turn's intents to executions, in turn order
//        (`Execution::from_intent`; unknown players are dropped with a warning);
//     2. run one scheduler tick (init pending, tick active, prune);
//     3. drain the world's event log into a `StepResult`.
//
// The sim is a pure function `(state, turns) -> (new_state, events)`, which
// is what makes lockstep replicas agree. `world_json` snapshots the arena
// for replica comparison and debugging.
//
// See also: `scheduler.rs` for the per-tick lifecycle, `world.rs` for the
// arena, `execution/` for what intents turn into.
//
// **Critical constraint: determinism.** No wall-clock time, no hashing order,
// no randomness. Turn numbers that skip or repeat are logged but applied, so
// a replica never silently diverges from the authority's stream.

use frontier_protocol::{Intent, Turn, TurnNumber};
use log::{debug, warn};

use crate::config::GameConfig;
use crate::event::SimEvent;
use crate::execution::Execution;
use crate::map::GameMap;
use crate::scheduler::ExecutionScheduler;
use crate::world::World;

/// The result of applying one turn.
#[derive(Clone, Debug, Default)]
pub struct StepResult {
    /// Tick that was simulated.
    pub tick: u64,
    /// Events emitted during the tick, in emission order.
    pub events: Vec<SimEvent>,
    /// Intents that produced no execution.
    pub rejected: usize,
}

#[derive(Debug)]
pub struct SimState {
    config: GameConfig,
    world: World,
    scheduler: ExecutionScheduler,
    tick: u64,
    next_turn: TurnNumber,
}

impl SimState {
    pub fn new(map: GameMap, config: GameConfig) -> Self {
        Self {
            config,
            world: World::new(map),
            scheduler: ExecutionScheduler::new(),
            tick: 0,
            next_turn: TurnNumber(0),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn scheduler(&self) -> &ExecutionScheduler {
        &self.scheduler
    }

    /// Next tick to be simulated.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn in_spawn_phase(&self) -> bool {
        self.tick < self.config.num_spawn_phase_turns
    }

    /// Queue executions for `intents` without advancing time.
    pub fn add_intents(&mut self, intents: &[Intent]) -> usize {
        let mut rejected = 0;
        for intent in intents {
            match Execution::from_intent(intent, &self.world) {
                Some(execution) => self.scheduler.add(execution),
                None => rejected += 1,
            }
        }
        rejected
    }

    /// Apply one authority turn: its intents, then one tick.
    pub fn apply_turn(&mut self, turn: &Turn) -> StepResult {
        if turn.turn_number != self.next_turn {
            warn!(
                "applying turn {} but expected {}",
                turn.turn_number.0, self.next_turn.0
            );
        }
        self.next_turn = turn.turn_number.next();
        let rejected = self.add_intents(&turn.intents);
        let mut result = self.advance();
        result.rejected = rejected;
        result
    }

    /// Run one tick with no new intents.
    pub fn advance(&mut self) -> StepResult {
        let tick = self.tick;
        self.world.set_tick(tick);
        self.scheduler.tick(&mut self.world, &self.config, tick);
        self.tick += 1;
        let events = self.world.drain_events();
        debug!("tick {tick}: {} events, {} executions", events.len(), self.scheduler.len());
        StepResult {
            tick,
            events,
            rejected: 0,
        }
    }

    /// Snapshot of the world arena, for replica comparison.
    pub fn world_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SimEventKind;
    use crate::types::{Cell, PlayerType, UnitType};
    use frontier_protocol::{ClientId, GameId, IntentAction, PlayerId};

    const MAP: &[&str] = &[
        "....~~~~~~....",
        "....~~~~~~....",
        "....~~~~~~....",
        "....~~~~~~....",
    ];

    fn turn(n: u64, intents: Vec<Intent>) -> Turn {
        Turn {
            turn_number: TurnNumber(n),
            game_id: GameId::new("G4me0001"),
            intents,
        }
    }

    fn intent(action: IntentAction) -> Intent {
        Intent::new(ClientId::new("Cl1ent00"), action)
    }

    fn spawn(id: &str, x: i32, y: i32) -> Intent {
        intent(IntentAction::Spawn {
            player_id: PlayerId::new(id),
            name: id.to_owned(),
            player_type: PlayerType::Human,
            x,
            y,
        })
    }

    fn config() -> GameConfig {
        GameConfig {
            num_spawn_phase_turns: 1,
            starting_troops: 100,
            spawn_radius: 1,
            ..GameConfig::default()
        }
    }

    #[test]
    fn spawn_phase_ends_after_configured_turns() {
        let mut sim = SimState::new(GameMap::from_ascii(MAP), config());
        assert!(sim.in_spawn_phase());
        sim.apply_turn(&turn(0, vec![spawn("PlayerAA", 1, 1)]));
        assert!(!sim.in_spawn_phase());
        let p = sim.world().player_by_id(&PlayerId::new("PlayerAA")).unwrap();
        assert_eq!(sim.world().troops(p), 100);
    }

    #[test]
    fn one_tick_per_turn_and_events_are_stamped() {
        let mut sim = SimState::new(GameMap::from_ascii(MAP), config());
        let first = sim.apply_turn(&turn(0, vec![spawn("PlayerAA", 1, 1)]));
        assert_eq!(first.tick, 0);
        assert!(first.events.iter().all(|e| e.tick == 0));
        assert!(first
            .events
            .iter()
            .any(|e| matches!(e.kind, SimEventKind::TileConquered { .. })));
        let second = sim.apply_turn(&turn(1, vec![]));
        assert_eq!(second.tick, 1);
        assert_eq!(sim.tick(), 2);
    }

    #[test]
    fn boat_crosses_and_lands() {
        let mut sim = SimState::new(GameMap::from_ascii(MAP), config());
        sim.apply_turn(&turn(0, vec![spawn("PlayerAA", 3, 1)]));
        let p = sim.world().player_by_id(&PlayerId::new("PlayerAA")).unwrap();
        let boat = intent(IntentAction::Boat {
            attacker_id: PlayerId::new("PlayerAA"),
            target_id: None,
            troops: Some(40),
            x: 10,
            y: 1,
        });
        let step = sim.apply_turn(&turn(1, vec![boat]));
        assert_eq!(step.rejected, 0);
        assert!(step.events.iter().any(|e| matches!(
            e.kind,
            SimEventKind::UnitBuilt {
                unit_type: UnitType::TransportShip,
                ..
            }
        )));

        let landing = sim.world().map().tile_at(Cell::new(10, 1)).unwrap();
        for n in 2..20 {
            sim.apply_turn(&turn(n, vec![]));
        }
        assert_eq!(sim.world().owner(landing), Some(p));
        assert_eq!(sim.world().units_of(p, UnitType::TransportShip).count(), 0);
    }

    #[test]
    fn unknown_player_intents_are_counted_as_rejected() {
        let mut sim = SimState::new(GameMap::from_ascii(MAP), config());
        let step = sim.apply_turn(&turn(
            0,
            vec![intent(IntentAction::TargetPlayer {
                requestor: PlayerId::new("Nobody00"),
                target: PlayerId::new("Nobody01"),
            })],
        ));
        assert_eq!(step.rejected, 1);
    }

    #[test]
    fn world_json_is_stable_for_identical_histories() {
        let run = || {
            let mut sim = SimState::new(GameMap::from_ascii(MAP), config());
            sim.apply_turn(&turn(0, vec![spawn("PlayerAA", 1, 1), spawn("PlayerBB", 12, 2)]));
            for n in 1..5 {
                sim.apply_turn(&turn(n, vec![]));
            }
            sim.world_json().unwrap()
        };
        assert_eq!(run(), run());
    }
}
