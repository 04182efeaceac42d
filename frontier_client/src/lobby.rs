// Per-session identity bundle.
//
// A `LobbyConfig` is assembled by the lobby before the game starts and
// handed to the `Transport`, which keeps it unchanged for the whole
// connection lifetime. Every outgoing envelope and every intent built from
// a UI event takes its ids from here.

use frontier_protocol::{ClientId, GameId, GameType, PersistentId, PlayerId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyConfig {
    pub client_id: ClientId,
    pub game_id: GameId,
    pub persistent_id: PersistentId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub game_type: GameType,
}

impl LobbyConfig {
    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    /// Single-player games run against the in-process authority.
    pub fn is_local(&self) -> bool {
        self.game_type == GameType::Singleplayer
    }
}
