// Spawn: place a player on the map during the spawn phase.
//
// The first spawn registers the player and grants the starting troops and
// gold. Spawning again during the spawn phase moves the player: the old
// territory is released and a new one claimed. Territory is every unowned
// land tile within `spawn_radius` (Manhattan) of the chosen cell. Spawns
// after the spawn phase, or on water, are ignored.

use log::warn;

use super::ExecCtx;
use crate::event::MessageType;
use crate::types::{Cell, PlayerId, PlayerIdx, PlayerType};

#[derive(Debug)]
pub struct SpawnExecution {
    player_id: PlayerId,
    name: String,
    player_type: PlayerType,
    cell: Cell,
    player: Option<PlayerIdx>,
    active: bool,
}

impl SpawnExecution {
    pub fn new(player_id: PlayerId, name: String, player_type: PlayerType, cell: Cell) -> Self {
        Self {
            player_id,
            name,
            player_type,
            cell,
            player: None,
            active: true,
        }
    }

    pub fn owner(&self) -> Option<PlayerIdx> {
        self.player
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn init(&mut self, ctx: &mut ExecCtx<'_>) {
        self.player = Some(ctx.world.add_player(
            self.player_id.clone(),
            self.name.clone(),
            self.player_type,
        ));
    }

    pub fn tick(&mut self, ctx: &mut ExecCtx<'_>) {
        self.active = false;
        let Some(player) = self.player else {
            return;
        };
        if !ctx.in_spawn_phase() {
            warn!("ignoring spawn of {} after the spawn phase", self.player_id);
            return;
        }
        let map = ctx.world.map();
        let Some(center) = map.tile_at(self.cell).filter(|&t| map.is_land(t)) else {
            warn!("ignoring spawn of {} at {}: not land", self.player_id, self.cell);
            return;
        };

        let radius = ctx.config.spawn_radius;
        let claim: Vec<_> = map
            .tiles()
            .filter(|&t| {
                map.is_land(t)
                    && map.manhattan_dist(t, center) <= radius
                    && ctx.world.owner(t).is_none_or(|o| o == player)
            })
            .collect();

        for tile in ctx.world.tiles_owned(player) {
            ctx.world.relinquish(tile);
        }
        for tile in claim {
            ctx.world.conquer(player, tile);
        }

        let first_spawn = ctx.world.player(player).is_some_and(|p| !p.spawned);
        if first_spawn {
            ctx.world.add_troops(player, ctx.config.starting_troops);
            ctx.world.add_gold(player, ctx.config.starting_gold);
            ctx.world.mark_spawned(player);
            ctx.world.display_message(
                format!("{} joined the game", self.name),
                MessageType::Info,
                None,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::execution::Execution;
    use crate::map::GameMap;
    use crate::world::World;

    fn spawn(world: &mut World, config: &GameConfig, tick: u64, x: i32, y: i32) -> SpawnExecution {
        let mut follow_ons: Vec<Execution> = Vec::new();
        let mut exec = SpawnExecution::new(
            PlayerId::new("Pl4yer01"),
            "Ada".into(),
            PlayerType::Human,
            Cell::new(x, y),
        );
        let mut ctx = ExecCtx::new(world, config, tick, &mut follow_ons);
        exec.init(&mut ctx);
        exec.tick(&mut ctx);
        exec
    }

    #[test]
    fn first_spawn_claims_radius_and_grants_troops() {
        let mut world = World::new(GameMap::new(9, 9));
        let config = GameConfig::default();
        let exec = spawn(&mut world, &config, 0, 4, 4);
        let p = exec.owner().unwrap();
        // Manhattan radius 2 diamond: 1 + 4 + 8 tiles.
        assert_eq!(world.num_tiles_owned(p), 13);
        assert_eq!(world.troops(p), config.starting_troops);
        assert!(!exec.is_active());
    }

    #[test]
    fn respawn_moves_territory_without_extra_troops() {
        let mut world = World::new(GameMap::new(12, 12));
        let config = GameConfig::default();
        let p = spawn(&mut world, &config, 0, 2, 2).owner().unwrap();
        spawn(&mut world, &config, 1, 9, 9);
        let home = world.map().tile_at(Cell::new(2, 2)).unwrap();
        let new_home = world.map().tile_at(Cell::new(9, 9)).unwrap();
        assert_eq!(world.owner(home), None);
        assert_eq!(world.owner(new_home), Some(p));
        assert_eq!(world.troops(p), config.starting_troops);
    }

    #[test]
    fn late_or_wet_spawns_are_ignored() {
        let mut world = World::new(GameMap::from_ascii(&["~~~", "~.~", "~~~"]));
        let config = GameConfig::default();
        let p = spawn(&mut world, &config, 0, 0, 0).owner().unwrap();
        assert_eq!(world.num_tiles_owned(p), 0);
        spawn(&mut world, &config, config.num_spawn_phase_turns, 1, 1);
        assert_eq!(world.num_tiles_owned(p), 0);
    }
}
