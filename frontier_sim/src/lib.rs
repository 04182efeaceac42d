// frontier_sim: deterministic territorial-conquest simulation.
//
// This crate contains the authoritative game logic: the tile map, the world
// arena, the incremental path finder, the execution engine that turns
// intents into multi-tick actions, and the turn loop. It depends only on
// `frontier_protocol` (for intent and turn types) and can be tested,
// benchmarked and run headless. Both the relay's clients and the in-process
// single-player authority drive the same `SimState`.
//
// Module overview:
// - `sim.rs`:          `SimState`, one tick per authority turn.
// - `scheduler.rs`:    `ExecutionScheduler`, the init/tick/prune lifecycle.
// - `execution/`:      `Execution` enum and one module per kind; the boat
//                      state machine lives in `transport_ship.rs`.
// - `world.rs`:        `World` arena: players, ownership, units, alliances,
//                      behind a narrow mutation API.
// - `map.rs`:          `GameMap` terrain grid, 4-neighbourhood in fixed order.
// - `pathfinding.rs`:  Resumable, budgeted A* (`PathFinder`).
// - `event.rs`:        Player-visible `SimEvent`s.
// - `config.rs`:       `GameConfig`, every numeric policy the sim reads.
// - `types.rs`:        `Cell`, `TileRef`, arena indices, `Target`.
//
// **Critical constraint: determinism.** Given the same map, config and turn
// stream, every replica produces the same world. No wall-clock time, no OS
// entropy, no iteration over hash maps. Use `BTreeMap`/`Vec` for anything
// whose order can leak into results.

pub mod config;
pub mod event;
pub mod execution;
pub mod map;
pub mod pathfinding;
pub mod scheduler;
pub mod sim;
pub mod types;
pub mod world;

pub use config::{ConfigError, GameConfig};
pub use sim::{SimState, StepResult};
