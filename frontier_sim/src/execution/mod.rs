// Executions: multi-tick actions over the world.
//
// Every accepted intent becomes one `Execution`, a tagged variant with one
// payload struct per kind. The scheduler drives them through a fixed
// lifecycle using the dispatch methods on the enum:
//
// - `init(ctx)` exactly once, before the first `tick`;
// - `tick(ctx)` once per simulation step while `is_active()`;
// - `active_during_spawn_phase()` gates both of the above during the
//   pre-game spawn phase;
// - `owner()` names the responsible player for attribution.
//
// Executions hold arena indices (`PlayerIdx`, `UnitId`, `TileRef`), never
// references, and change the world only through `World`'s mutation API.
// Follow-on work (a boat landing schedules a land attack) goes through
// `ExecCtx::schedule`, which queues it for the next tick.
//
// Most kinds are one-shot: they act on their first tick and deactivate.
// `TransportShip` and `Attack` are the long-running state machines.
//
// See also: `scheduler.rs` for the lifecycle driver, `world.rs` for the
// mutation API, `transport_ship.rs` for the boat state machine.
//
// **Critical constraint: determinism.** `from_intent` and every execution
// body are pure functions of the world, the config and the tick.

mod alliance;
mod attack;
mod build_unit;
mod player;
mod spawn;
mod transport_ship;

pub use alliance::{AllianceReplyExecution, AllianceRequestExecution, BreakAllianceExecution};
pub use attack::AttackExecution;
pub use build_unit::BuildUnitExecution;
pub use player::{DonateExecution, EmojiExecution, TargetPlayerExecution, TroopRatioExecution};
pub use spawn::SpawnExecution;
pub use transport_ship::{BoatPhase, TransportShipExecution};

use frontier_protocol::{EmojiRecipient, Intent, IntentAction};
use log::warn;

use crate::config::GameConfig;
use crate::types::{Cell, PlayerId, PlayerIdx, Target};
use crate::world::World;

/// What an execution may touch during `init` and `tick`.
pub struct ExecCtx<'a> {
    pub world: &'a mut World,
    pub config: &'a GameConfig,
    pub tick: u64,
    follow_ons: &'a mut Vec<Execution>,
}

impl<'a> ExecCtx<'a> {
    pub fn new(
        world: &'a mut World,
        config: &'a GameConfig,
        tick: u64,
        follow_ons: &'a mut Vec<Execution>,
    ) -> Self {
        Self {
            world,
            config,
            tick,
            follow_ons,
        }
    }

    /// Queue an execution created during this tick. It is initialised at
    /// the start of the next tick.
    pub fn schedule(&mut self, execution: Execution) {
        self.follow_ons.push(execution);
    }

    pub fn in_spawn_phase(&self) -> bool {
        self.tick < self.config.num_spawn_phase_turns
    }
}

#[derive(Debug)]
pub enum Execution {
    TransportShip(TransportShipExecution),
    Attack(AttackExecution),
    Spawn(SpawnExecution),
    Donate(DonateExecution),
    AllianceRequest(AllianceRequestExecution),
    AllianceReply(AllianceReplyExecution),
    BreakAlliance(BreakAllianceExecution),
    TargetPlayer(TargetPlayerExecution),
    Emoji(EmojiExecution),
    TroopRatio(TroopRatioExecution),
    BuildUnit(BuildUnitExecution),
}

impl Execution {
    pub fn init(&mut self, ctx: &mut ExecCtx<'_>) {
        match self {
            Execution::TransportShip(e) => e.init(ctx),
            Execution::Attack(e) => e.init(ctx),
            Execution::Spawn(e) => e.init(ctx),
            Execution::Donate(e) => e.init(ctx),
            Execution::AllianceRequest(e) => e.init(ctx),
            Execution::AllianceReply(e) => e.init(ctx),
            Execution::BreakAlliance(e) => e.init(ctx),
            Execution::TargetPlayer(e) => e.init(ctx),
            Execution::Emoji(e) => e.init(ctx),
            Execution::TroopRatio(e) => e.init(ctx),
            Execution::BuildUnit(e) => e.init(ctx),
        }
    }

    pub fn tick(&mut self, ctx: &mut ExecCtx<'_>) {
        match self {
            Execution::TransportShip(e) => e.tick(ctx),
            Execution::Attack(e) => e.tick(ctx),
            Execution::Spawn(e) => e.tick(ctx),
            Execution::Donate(e) => e.tick(ctx),
            Execution::AllianceRequest(e) => e.tick(ctx),
            Execution::AllianceReply(e) => e.tick(ctx),
            Execution::BreakAlliance(e) => e.tick(ctx),
            Execution::TargetPlayer(e) => e.tick(ctx),
            Execution::Emoji(e) => e.tick(ctx),
            Execution::TroopRatio(e) => e.tick(ctx),
            Execution::BuildUnit(e) => e.tick(ctx),
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Execution::TransportShip(e) => e.is_active(),
            Execution::Attack(e) => e.is_active(),
            Execution::Spawn(e) => e.is_active(),
            Execution::Donate(e) => e.is_active(),
            Execution::AllianceRequest(e) => e.is_active(),
            Execution::AllianceReply(e) => e.is_active(),
            Execution::BreakAlliance(e) => e.is_active(),
            Execution::TargetPlayer(e) => e.is_active(),
            Execution::Emoji(e) => e.is_active(),
            Execution::TroopRatio(e) => e.is_active(),
            Execution::BuildUnit(e) => e.is_active(),
        }
    }

    /// Responsible player. `None` only for a spawn that has not run yet.
    pub fn owner(&self) -> Option<PlayerIdx> {
        match self {
            Execution::TransportShip(e) => Some(e.owner()),
            Execution::Attack(e) => Some(e.owner()),
            Execution::Spawn(e) => e.owner(),
            Execution::Donate(e) => Some(e.owner()),
            Execution::AllianceRequest(e) => Some(e.owner()),
            Execution::AllianceReply(e) => Some(e.owner()),
            Execution::BreakAlliance(e) => Some(e.owner()),
            Execution::TargetPlayer(e) => Some(e.owner()),
            Execution::Emoji(e) => Some(e.owner()),
            Execution::TroopRatio(e) => Some(e.owner()),
            Execution::BuildUnit(e) => Some(e.owner()),
        }
    }

    /// Only spawns run while players are still placing themselves.
    pub fn active_during_spawn_phase(&self) -> bool {
        matches!(self, Execution::Spawn(_))
    }

    /// Map an accepted intent to its execution.
    ///
    /// Intents naming a player the world does not know (other than the
    /// spawning player of a `spawn`) are rejected with a warning.
    pub fn from_intent(intent: &Intent, world: &World) -> Option<Execution> {
        let resolve = |id: &PlayerId| {
            let idx = world.player_by_id(id);
            if idx.is_none() {
                warn!(
                    "dropping {} intent from {}: unknown player {id}",
                    intent.type_name(),
                    intent.client_id
                );
            }
            idx
        };
        let resolve_target = |id: &Option<PlayerId>| match id {
            None => Some(Target::TerraNullius),
            Some(id) => resolve(id).map(Target::Player),
        };

        let execution = match &intent.action {
            IntentAction::AllianceRequest {
                requestor,
                recipient,
            } => Execution::AllianceRequest(AllianceRequestExecution::new(
                resolve(requestor)?,
                resolve(recipient)?,
            )),
            IntentAction::AllianceRequestReply {
                requestor,
                recipient,
                accept,
            } => Execution::AllianceReply(AllianceReplyExecution::new(
                resolve(requestor)?,
                resolve(recipient)?,
                *accept,
            )),
            IntentAction::BreakAlliance {
                requestor,
                recipient,
            } => Execution::BreakAlliance(BreakAllianceExecution::new(
                resolve(requestor)?,
                resolve(recipient)?,
            )),
            IntentAction::Spawn {
                player_id,
                name,
                player_type,
                x,
                y,
            } => Execution::Spawn(SpawnExecution::new(
                player_id.clone(),
                name.clone(),
                *player_type,
                Cell::new(*x, *y),
            )),
            IntentAction::Attack {
                attacker_id,
                target_id,
                troops,
                ..
            } => Execution::Attack(AttackExecution::new(
                resolve(attacker_id)?,
                resolve_target(target_id)?,
                *troops,
                None,
                true,
            )),
            IntentAction::Boat {
                attacker_id,
                target_id,
                troops,
                x,
                y,
            } => Execution::TransportShip(TransportShipExecution::new(
                resolve(attacker_id)?,
                resolve_target(target_id)?,
                Cell::new(*x, *y),
                *troops,
            )),
            IntentAction::TargetPlayer { requestor, target } => Execution::TargetPlayer(
                TargetPlayerExecution::new(resolve(requestor)?, resolve(target)?),
            ),
            IntentAction::Emoji {
                sender,
                recipient,
                emoji,
            } => {
                let recipient = match recipient {
                    EmojiRecipient::AllPlayers => None,
                    EmojiRecipient::Player(id) => Some(resolve(id)?),
                };
                Execution::Emoji(EmojiExecution::new(resolve(sender)?, recipient, emoji.clone()))
            }
            IntentAction::Donate {
                sender,
                recipient,
                troops,
            } => Execution::Donate(DonateExecution::new(
                resolve(sender)?,
                resolve(recipient)?,
                *troops,
            )),
            IntentAction::TroopRatio { player, ratio } => {
                Execution::TroopRatio(TroopRatioExecution::new(resolve(player)?, *ratio))
            }
            IntentAction::BuildUnit { player, unit, x, y } => Execution::BuildUnit(
                BuildUnitExecution::new(resolve(player)?, *unit, Cell::new(*x, *y)),
            ),
        };
        Some(execution)
    }
}
