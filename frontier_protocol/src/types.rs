// Core ID types for the Frontier protocol.
//
// Identity newtypes shared by `intent.rs`, `message.rs`, the sim (which keys
// players by `PlayerId`), and the relay's session bookkeeping. All of them
// serialize transparently as plain JSON strings so the wire format stays
// readable (`"clientID": "Ab12Cd34"`).
//
// Format rules (checked by `schema.rs`, not by construction. Parsing a
// newtype never fails, validation decides whether the value is trusted):
// - client, game and player ids: exactly `ID_LEN` ASCII alphanumerics;
// - persistent ids: 1..=`MAX_PERSISTENT_ID_LEN` characters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Length of every client, game, and player id.
pub const ID_LEN: usize = 8;

/// Upper bound for persistent (cross-session) ids.
pub const MAX_PERSISTENT_ID_LEN: usize = 64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(/// Identifies one client connection identity (one browser tab, one process).
ClientId);
string_id!(/// Identifies one game session on the authority.
GameId);
string_id!(/// Long-lived identity of a user across sessions.
PersistentId);
string_id!(/// Identifies a player inside a game.
PlayerId);

/// Monotonically increasing turn number. Turn `n` is the `n`-th turn the
/// authority produced, starting at 0.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TurnNumber(pub u64);

impl TurnNumber {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Kind of game session. Single-player games run against an in-process
/// authority; the others connect to a relay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    #[default]
    Singleplayer,
    Public,
    Private,
}

/// Returns true if `s` is a well-formed client/game/player id.
pub fn is_valid_id(s: &str) -> bool {
    s.len() == ID_LEN && s.bytes().all(|b| b.is_ascii_alphanumeric())
}
