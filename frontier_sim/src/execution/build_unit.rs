// Build a structure or warship.
//
// Structures (port, city, defense post, missile silo) go on a land tile the
// player owns; a port additionally needs a shore tile. A warship launches
// from the player's port nearest the clicked cell. The gold cost comes from
// `GameConfig::unit_costs` and is only spent if every check passes.
// Transport ships are not built here; they come from boat intents.

use super::ExecCtx;
use crate::event::MessageType;
use crate::types::{Cell, PlayerIdx, TileRef, UnitType};

#[derive(Debug)]
pub struct BuildUnitExecution {
    player: PlayerIdx,
    unit: UnitType,
    cell: Cell,
    active: bool,
}

impl BuildUnitExecution {
    pub fn new(player: PlayerIdx, unit: UnitType, cell: Cell) -> Self {
        Self {
            player,
            unit,
            cell,
            active: true,
        }
    }

    pub fn owner(&self) -> PlayerIdx {
        self.player
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn init(&mut self, _ctx: &mut ExecCtx<'_>) {}

    /// Where the unit would go, if anywhere.
    fn placement(&self, ctx: &ExecCtx<'_>) -> Option<TileRef> {
        let world = &*ctx.world;
        let map = world.map();
        let tile = map.tile_at(self.cell)?;
        match self.unit {
            UnitType::TransportShip => None,
            UnitType::Warship => world
                .units_of(self.player, UnitType::Port)
                .map(|port| port.tile)
                .min_by_key(|&t| (map.manhattan_dist(t, tile), t)),
            UnitType::Port => {
                (world.owner(tile) == Some(self.player) && map.is_shore(tile)).then_some(tile)
            }
            UnitType::City | UnitType::DefensePost | UnitType::MissileSilo => {
                (world.owner(tile) == Some(self.player) && map.is_land(tile)).then_some(tile)
            }
        }
    }

    pub fn tick(&mut self, ctx: &mut ExecCtx<'_>) {
        self.active = false;
        let Some(tile) = self.placement(ctx) else {
            ctx.world.display_message(
                format!("Cannot build {:?} at {}", self.unit, self.cell),
                MessageType::Warn,
                Some(self.player),
            );
            return;
        };
        let cost = ctx.config.unit_costs.cost(self.unit);
        if !ctx.world.remove_gold(self.player, cost) {
            ctx.world.display_message(
                format!("Not enough gold to build {:?}", self.unit),
                MessageType::Warn,
                Some(self.player),
            );
            return;
        }
        ctx.world.build_unit(self.player, self.unit, 0, tile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::execution::Execution;
    use crate::map::GameMap;
    use crate::types::{PlayerId, PlayerType};
    use crate::world::World;

    fn build(world: &mut World, config: &GameConfig, p: PlayerIdx, unit: UnitType, x: i32, y: i32) {
        let mut follow_ons: Vec<Execution> = Vec::new();
        let mut exec = BuildUnitExecution::new(p, unit, Cell::new(x, y));
        let mut ctx = ExecCtx::new(world, config, 500, &mut follow_ons);
        exec.init(&mut ctx);
        exec.tick(&mut ctx);
    }

    fn setup() -> (World, PlayerIdx) {
        let mut world = World::new(GameMap::from_ascii(&["...~", "...~"]));
        let p = world.add_player(PlayerId::new("Pl4yer01"), "Ada".into(), PlayerType::Human);
        for t in world.map().tiles().collect::<Vec<_>>() {
            if world.map().is_land(t) {
                world.conquer(p, t);
            }
        }
        (world, p)
    }

    #[test]
    fn city_costs_gold() {
        let (mut world, p) = setup();
        let config = GameConfig::default();
        let cost = config.unit_costs.cost(UnitType::City);
        world.add_gold(p, cost + 5);
        build(&mut world, &config, p, UnitType::City, 0, 0);
        assert_eq!(world.units_of(p, UnitType::City).count(), 1);
        assert_eq!(world.player(p).unwrap().gold, 5);
    }

    #[test]
    fn insufficient_gold_builds_nothing() {
        let (mut world, p) = setup();
        let config = GameConfig::default();
        build(&mut world, &config, p, UnitType::City, 0, 0);
        assert_eq!(world.units_of(p, UnitType::City).count(), 0);
    }

    #[test]
    fn port_needs_shore_and_warship_needs_port() {
        let (mut world, p) = setup();
        let mut config = GameConfig::default();
        config.unit_costs.port = 0;
        config.unit_costs.warship = 0;
        build(&mut world, &config, p, UnitType::Warship, 2, 0);
        assert_eq!(world.units_of(p, UnitType::Warship).count(), 0);
        build(&mut world, &config, p, UnitType::Port, 0, 0);
        assert_eq!(world.units_of(p, UnitType::Port).count(), 0);
        build(&mut world, &config, p, UnitType::Port, 2, 1);
        assert_eq!(world.units_of(p, UnitType::Port).count(), 1);
        build(&mut world, &config, p, UnitType::Warship, 3, 0);
        let port_tile = world.map().tile_at(Cell::new(2, 1)).unwrap();
        let warship = world.units_of(p, UnitType::Warship).next().unwrap();
        assert_eq!(warship.tile, port_tile);
    }
}
