// Land attack: conquer the target's tiles along a front, paying troops per
// tile, until the troops or the front run out.
//
// An attack either draws its troops from the attacker at init
// (`remove_troops`, the normal intent path) or already carries them (the
// follow-on a boat schedules after landing, whose troops left the owner at
// launch). With a `source` tile the front grows outward from that tile
// only; without one it is the attacker's whole border with the target.
//
// Each tick takes up to `attack_tiles_per_tick` frontier tiles in tile-index
// order, each costing `attack_cost_per_tile` (terra nullius) or
// `attack_cost_per_defended_tile` (another player's land). A tick that takes
// nothing ends the attack and sends the remaining troops home. Attacks on
// allies are refused; an alliance formed mid-attack also ends it.

use std::collections::BTreeSet;

use log::warn;

use super::ExecCtx;
use crate::types::{PlayerIdx, Target, TileRef};

#[derive(Debug)]
pub struct AttackExecution {
    attacker: PlayerIdx,
    target: Target,
    troops: u32,
    source: Option<TileRef>,
    remove_troops: bool,
    /// Tiles taken by this attack; the front when `source` is set.
    claimed: BTreeSet<TileRef>,
    /// Whether `troops` have left the attacker and must be returned.
    in_hand: bool,
    active: bool,
}

impl AttackExecution {
    pub fn new(
        attacker: PlayerIdx,
        target: Target,
        troops: u32,
        source: Option<TileRef>,
        remove_troops: bool,
    ) -> Self {
        Self {
            attacker,
            target,
            troops,
            source,
            remove_troops,
            claimed: BTreeSet::new(),
            in_hand: !remove_troops,
            active: true,
        }
    }

    pub fn owner(&self) -> PlayerIdx {
        self.attacker
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn troops(&self) -> u32 {
        self.troops
    }

    pub fn removes_troops(&self) -> bool {
        self.remove_troops
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn target_allied(&self, ctx: &ExecCtx<'_>) -> bool {
        self.target
            .player()
            .is_some_and(|t| ctx.world.is_allied(self.attacker, t))
    }

    pub fn init(&mut self, ctx: &mut ExecCtx<'_>) {
        if self.target.player() == Some(self.attacker) {
            warn!("player {:?} cannot attack itself", self.attacker);
            self.finish(ctx);
            return;
        }
        if self.target_allied(ctx) {
            warn!(
                "player {:?} cannot attack ally {:?}",
                self.attacker, self.target
            );
            self.finish(ctx);
            return;
        }
        if self.remove_troops {
            self.troops = ctx.world.remove_troops(self.attacker, self.troops);
            self.in_hand = true;
        }
        if let Some(source) = self.source {
            self.claimed.insert(source);
        }
    }

    pub fn tick(&mut self, ctx: &mut ExecCtx<'_>) {
        if !self.active {
            return;
        }
        if self.target_allied(ctx) {
            self.finish(ctx);
            return;
        }

        let front = self.front(ctx);
        let mut taken = 0;
        for tile in front {
            if taken >= ctx.config.attack_tiles_per_tick {
                break;
            }
            let cost = match ctx.world.owner(tile) {
                None => ctx.config.attack_cost_per_tile,
                Some(_) => ctx.config.attack_cost_per_defended_tile,
            };
            if self.troops < cost || self.troops == 0 {
                break;
            }
            self.troops -= cost;
            ctx.world.conquer(self.attacker, tile);
            self.claimed.insert(tile);
            taken += 1;
        }
        if taken == 0 {
            self.finish(ctx);
        }
    }

    /// Target-owned land tiles adjacent to the attack's base, index order.
    fn front(&self, ctx: &ExecCtx<'_>) -> BTreeSet<TileRef> {
        let world = &*ctx.world;
        let map = world.map();
        let bases: Vec<TileRef> = match self.source {
            Some(_) => self
                .claimed
                .iter()
                .copied()
                .filter(|&t| world.owner(t) == Some(self.attacker))
                .collect(),
            None => world.border_tiles(self.attacker),
        };
        let mut front = BTreeSet::new();
        for base in bases {
            for n in map.neighbors(base) {
                let owner = world.owner(n);
                if map.is_land(n) && owner != Some(self.attacker) && self.target.owns(owner) {
                    front.insert(n);
                }
            }
        }
        front
    }

    fn finish(&mut self, ctx: &mut ExecCtx<'_>) {
        if self.in_hand && self.troops > 0 {
            ctx.world.add_troops(self.attacker, self.troops);
        }
        self.troops = 0;
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::execution::Execution;
    use crate::map::GameMap;
    use crate::types::{Cell, PlayerId, PlayerType};
    use crate::world::World;

    fn setup(rows: &[&str]) -> (World, PlayerIdx, PlayerIdx) {
        let mut world = World::new(GameMap::from_ascii(rows));
        let a = world.add_player(PlayerId::new("Attack00"), "A".into(), PlayerType::Human);
        let b = world.add_player(PlayerId::new("Defend00"), "B".into(), PlayerType::Human);
        (world, a, b)
    }

    fn tile(world: &World, x: i32, y: i32) -> TileRef {
        world.map().tile_at(Cell::new(x, y)).unwrap()
    }

    fn run(world: &mut World, config: &GameConfig, exec: &mut AttackExecution) {
        let mut follow_ons: Vec<Execution> = Vec::new();
        let mut ctx = ExecCtx::new(world, config, 0, &mut follow_ons);
        exec.init(&mut ctx);
        for tick in 0..100 {
            if !exec.is_active() {
                break;
            }
            let mut ctx = ExecCtx::new(world, config, tick, &mut follow_ons);
            exec.tick(&mut ctx);
        }
    }

    #[test]
    fn conquers_terra_nullius_until_troops_run_out() {
        let (mut world, a, _) = setup(&["......"]);
        let home = tile(&world, 0, 0);
        world.conquer(a, home);
        world.add_troops(a, 10);
        let config = GameConfig::default();
        let mut exec = AttackExecution::new(a, Target::TerraNullius, 3, None, true);
        run(&mut world, &config, &mut exec);
        assert!(!exec.is_active());
        // 3 troops at cost 1 take three tiles.
        assert_eq!(world.num_tiles_owned(a), 4);
        assert_eq!(world.troops(a), 7);
    }

    #[test]
    fn leftover_troops_return_when_front_is_empty() {
        let (mut world, a, _) = setup(&["..~~"]);
        world.conquer(a, tile(&world, 0, 0));
        world.add_troops(a, 50);
        let config = GameConfig::default();
        let mut exec = AttackExecution::new(a, Target::TerraNullius, 20, None, true);
        run(&mut world, &config, &mut exec);
        assert_eq!(world.num_tiles_owned(a), 2);
        assert_eq!(world.troops(a), 49);
    }

    #[test]
    fn defended_tiles_cost_more() {
        let (mut world, a, b) = setup(&["...."]);
        world.conquer(a, tile(&world, 0, 0));
        for x in 1..4 {
            world.conquer(b, tile(&world, x, 0));
        }
        let config = GameConfig::default();
        let mut exec = AttackExecution::new(a, Target::Player(b), 5, None, false);
        run(&mut world, &config, &mut exec);
        // Cost 2 each: two tiles, one troop comes home.
        assert_eq!(world.num_tiles_owned(a), 3);
        assert_eq!(world.owner(tile(&world, 3, 0)), Some(b));
        assert_eq!(world.troops(a), 1);
    }

    #[test]
    fn allied_target_is_refused_and_carried_troops_return() {
        let (mut world, a, b) = setup(&["...."]);
        world.conquer(a, tile(&world, 0, 0));
        world.conquer(b, tile(&world, 1, 0));
        world.create_alliance(a, b);
        let config = GameConfig::default();
        let mut exec = AttackExecution::new(a, Target::Player(b), 30, None, false);
        run(&mut world, &config, &mut exec);
        assert_eq!(world.owner(tile(&world, 1, 0)), Some(b));
        assert_eq!(world.troops(a), 30);
    }

    #[test]
    fn sourced_attack_grows_from_landing_tile() {
        // Attacker home at x=0; landing at x=5. Unowned land everywhere.
        let (mut world, a, _) = setup(&["........"]);
        world.conquer(a, tile(&world, 0, 0));
        let landing = tile(&world, 5, 0);
        world.conquer(a, landing);
        let mut config = GameConfig::default();
        config.attack_tiles_per_tick = 2;
        let mut exec = AttackExecution::new(a, Target::TerraNullius, 2, Some(landing), false);
        run(&mut world, &config, &mut exec);
        // (4,0) and (6,0) are taken, home's neighbour (1,0) is not.
        assert_eq!(world.owner(tile(&world, 4, 0)), Some(a));
        assert_eq!(world.owner(tile(&world, 6, 0)), Some(a));
        assert_eq!(world.owner(tile(&world, 1, 0)), None);
    }
}
