// Transport-ship (boat) execution.
//
// Ferries troops from the owner's coast to a landing tile across water:
//
//   Initializing --init ok--> Pathing --dst reached--> Arrived
//        |                       |
//        +--init failure--> Failed <--PathNotFound / boat destroyed
//
// Init commits `min(requested, owner troops)` from the owner (a null request
// uses `GameConfig::boat_attack_amount`). It then fails, refunding the
// commitment, when:
// - the owner already has `boat_max_number` transport ships (the owner alone
//   also gets a "No boats available" warning);
// - the clicked cell does not resolve to a landing tile;
// - the owner has no shore tile to launch from.
// Otherwise a transport unit carrying the troops is built on the launch tile.
//
// While pathing, the boat moves at most once per `ticks_per_move`, one tile
// per move, asking the `PathFinder` for each step. A missing boat (destroyed
// by something else) is detected before any movement. On arrival exactly one
// of these happens, then the boat is removed:
// 1. landing tile already owned by the launcher: troops go home;
// 2. target is a player allied with the launcher: troops are donated;
// 3. otherwise: the landing tile is conquered and a follow-on `Attack` with
//    the carried troops is scheduled.
//
// `PathNotFound` clears the destination and fails the execution. The boat
// unit is removed as well (it does not linger on the water holding one of
// the owner's `boat_max_number` slots), and the carried troops are lost
// with it.

use log::{debug, warn};

use super::{AttackExecution, ExecCtx, Execution};
use crate::event::MessageType;
use crate::pathfinding::{PathFindResult, PathFinder, is_water};
use crate::types::{Cell, PlayerIdx, Target, TileRef, UnitId, UnitType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoatPhase {
    Initializing,
    Pathing,
    Arrived,
    Failed,
}

#[derive(Debug)]
pub struct TransportShipExecution {
    owner: PlayerIdx,
    target: Target,
    cell: Cell,
    requested: Option<u32>,
    troops: u32,
    src: Option<TileRef>,
    dst: Option<TileRef>,
    boat: Option<UnitId>,
    last_move: u64,
    phase: BoatPhase,
    path_finder: Option<PathFinder>,
}

impl TransportShipExecution {
    pub fn new(owner: PlayerIdx, target: Target, cell: Cell, troops: Option<u32>) -> Self {
        Self {
            owner,
            target,
            cell,
            requested: troops,
            troops: 0,
            src: None,
            dst: None,
            boat: None,
            last_move: 0,
            phase: BoatPhase::Initializing,
            path_finder: None,
        }
    }

    pub fn phase(&self) -> BoatPhase {
        self.phase
    }

    /// Troops aboard (0 before a successful init).
    pub fn troops(&self) -> u32 {
        self.troops
    }

    pub fn boat(&self) -> Option<UnitId> {
        self.boat
    }

    pub fn src(&self) -> Option<TileRef> {
        self.src
    }

    pub fn dst(&self) -> Option<TileRef> {
        self.dst
    }

    pub fn owner(&self) -> PlayerIdx {
        self.owner
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, BoatPhase::Initializing | BoatPhase::Pathing)
    }

    fn fail_init(&mut self, ctx: &mut ExecCtx<'_>, committed: u32) {
        ctx.world.add_troops(self.owner, committed);
        self.phase = BoatPhase::Failed;
    }

    pub fn init(&mut self, ctx: &mut ExecCtx<'_>) {
        if self.phase != BoatPhase::Initializing {
            return;
        }
        self.last_move = ctx.tick;

        let requested = self.requested.unwrap_or_else(|| {
            ctx.config.boat_attack_amount(ctx.world, self.owner, self.target)
        });
        let committed = ctx.world.remove_troops(self.owner, requested);

        let max = ctx.config.boat_max_number;
        let active = ctx
            .world
            .units_of(self.owner, UnitType::TransportShip)
            .count();
        if active >= max as usize {
            ctx.world.display_message(
                format!("No boats available, max {max}"),
                MessageType::Warn,
                Some(self.owner),
            );
            self.fail_init(ctx, committed);
            return;
        }

        let dst = ctx
            .world
            .map()
            .tile_at(self.cell)
            .and_then(|t| {
                ctx.world
                    .target_transport_tile(t, ctx.config.boat_target_search_radius)
            });
        let Some(dst) = dst else {
            warn!(
                "player {:?} cannot send ship to {:?}: no landing tile near {}",
                self.owner, self.target, self.cell
            );
            self.fail_init(ctx, committed);
            return;
        };

        let Some(src) = ctx.world.closest_shore_from_player(self.owner, dst) else {
            warn!(
                "player {:?} cannot build transport ship: no shore to launch from",
                self.owner
            );
            self.fail_init(ctx, committed);
            return;
        };

        self.troops = committed;
        self.src = Some(src);
        self.dst = Some(dst);
        self.boat = Some(
            ctx.world
                .build_unit(self.owner, UnitType::TransportShip, committed, src),
        );
        self.path_finder = Some(
            PathFinder::new(
                ctx.config.path_iterations,
                ctx.config.path_max_tries,
                is_water,
            )
            .with_heuristic_weight(ctx.config.path_heuristic_weight),
        );
        self.phase = BoatPhase::Pathing;
    }

    pub fn tick(&mut self, ctx: &mut ExecCtx<'_>) {
        if self.phase != BoatPhase::Pathing {
            return;
        }
        let (Some(boat), Some(dst)) = (self.boat, self.dst) else {
            self.phase = BoatPhase::Failed;
            return;
        };
        let Some(at) = ctx.world.unit(boat).map(|u| u.tile) else {
            debug!("transport ship {boat} destroyed in flight");
            self.phase = BoatPhase::Failed;
            return;
        };
        if ctx.tick.saturating_sub(self.last_move) < ctx.config.ticks_per_move {
            return;
        }
        self.last_move = ctx.tick;

        if at == dst {
            self.arrive(ctx, boat, dst);
            return;
        }

        let Some(path_finder) = self.path_finder.as_mut() else {
            self.phase = BoatPhase::Failed;
            return;
        };
        match path_finder.next_tile(ctx.world.map(), at, dst) {
            PathFindResult::Completed(next) | PathFindResult::NextTile(next) => {
                ctx.world.move_unit(boat, next);
            }
            PathFindResult::Pending => {
                debug!("transport ship {boat} still computing path");
            }
            PathFindResult::PathNotFound => {
                warn!("transport ship {boat}: no path to destination");
                self.dst = None;
                ctx.world.delete_unit(boat);
                self.phase = BoatPhase::Failed;
            }
        }
    }

    fn arrive(&mut self, ctx: &mut ExecCtx<'_>, boat: UnitId, dst: TileRef) {
        let owner = self.owner;
        if ctx.world.owner(dst) == Some(owner) {
            ctx.world.add_troops(owner, self.troops);
        } else if let Some(ally) = self
            .target
            .player()
            .filter(|&t| ctx.world.is_allied(owner, t))
        {
            ctx.world.add_troops(ally, self.troops);
        } else {
            ctx.world.conquer(owner, dst);
            ctx.schedule(Execution::Attack(AttackExecution::new(
                owner,
                self.target,
                self.troops,
                Some(dst),
                false,
            )));
        }
        ctx.world.delete_unit(boat);
        self.phase = BoatPhase::Arrived;
    }
}
