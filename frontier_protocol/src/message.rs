// Protocol envelopes exchanged between clients and the authority.
//
// Two enums define the full vocabulary:
// - `ClientMessage`: client → authority (`join`, `intent`, `ping`, `log`).
// - `ServerMessage`: authority → client (`start`, `turn`, `desync`, `error`).
//
// Both are internally tagged by `type` so every message is self-describing.
// The same JSON travels over the relay's TCP framing and into the in-process
// `LocalServer` used for single-player games, so the two authorities share
// one contract.
//
// Construction helpers on `ClientMessage` validate before returning (see
// `schema.rs`): an envelope that fails its schema is never handed to a
// socket. Deserialized messages are validated separately by
// `schema::parse_client_message` / `parse_server_message`.

use serde::{Deserialize, Serialize};

use crate::intent::Intent;
use crate::schema::{self, ProtocolError};
use crate::types::{ClientId, GameId, PersistentId, TurnNumber};

/// Messages sent by a client to the authority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Join (or rejoin) a game, asking for every turn from `lastTurn` on.
    Join {
        #[serde(rename = "gameID")]
        game_id: GameId,
        #[serde(rename = "clientID")]
        client_id: ClientId,
        #[serde(rename = "persistentID")]
        persistent_id: PersistentId,
        username: String,
        #[serde(rename = "lastTurn")]
        last_turn: TurnNumber,
    },
    /// A player intent for the next turn.
    Intent {
        #[serde(rename = "clientID")]
        client_id: ClientId,
        #[serde(rename = "gameID")]
        game_id: GameId,
        intent: Intent,
    },
    /// Keep-alive.
    Ping {
        #[serde(rename = "clientID")]
        client_id: ClientId,
        #[serde(rename = "gameID")]
        game_id: GameId,
    },
    /// Client-side log line forwarded to the authority.
    Log {
        #[serde(rename = "gameID")]
        game_id: GameId,
        #[serde(rename = "clientID")]
        client_id: ClientId,
        #[serde(rename = "persistentID")]
        persistent_id: PersistentId,
        log: String,
        #[serde(default)]
        severity: LogSeverity,
    },
}

/// Severity attached to forwarded client logs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// Messages sent by the authority to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Game start (or catch-up after a rejoin). `turns` replays every turn
    /// from the client's `lastTurn` onward. `config` is opaque to the
    /// protocol; the sim interprets it.
    Start {
        #[serde(rename = "gameID")]
        game_id: GameId,
        config: serde_json::Value,
        turns: Vec<Turn>,
    },
    /// One turn's worth of intents.
    Turn { turn: Turn },
    /// Replicas disagreed about the world at this turn.
    Desync {
        #[serde(rename = "turnNumber")]
        turn_number: TurnNumber,
    },
    /// The authority refused the last message.
    Error { reason: String },
}

/// The ordered intents the authority accepted for one turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(rename = "turnNumber")]
    pub turn_number: TurnNumber,
    #[serde(rename = "gameID")]
    pub game_id: GameId,
    pub intents: Vec<Intent>,
}

impl ClientMessage {
    /// Build a validated `join` envelope.
    pub fn join(
        game_id: GameId,
        client_id: ClientId,
        persistent_id: PersistentId,
        username: String,
        last_turn: TurnNumber,
    ) -> Result<Self, ProtocolError> {
        let msg = ClientMessage::Join {
            game_id,
            client_id,
            persistent_id,
            username,
            last_turn,
        };
        schema::validate_client_message(&msg)?;
        Ok(msg)
    }

    /// Build a validated `intent` envelope.
    pub fn intent(
        client_id: ClientId,
        game_id: GameId,
        intent: Intent,
    ) -> Result<Self, ProtocolError> {
        let msg = ClientMessage::Intent {
            client_id,
            game_id,
            intent,
        };
        schema::validate_client_message(&msg)?;
        Ok(msg)
    }

    /// Build a validated `ping` envelope.
    pub fn ping(client_id: ClientId, game_id: GameId) -> Result<Self, ProtocolError> {
        let msg = ClientMessage::Ping { client_id, game_id };
        schema::validate_client_message(&msg)?;
        Ok(msg)
    }

    /// Build a validated `log` envelope.
    pub fn log(
        game_id: GameId,
        client_id: ClientId,
        persistent_id: PersistentId,
        log: String,
        severity: LogSeverity,
    ) -> Result<Self, ProtocolError> {
        let msg = ClientMessage::Log {
            game_id,
            client_id,
            persistent_id,
            log,
            severity,
        };
        schema::validate_client_message(&msg)?;
        Ok(msg)
    }

    /// The client id carried by every envelope.
    pub fn client_id(&self) -> &ClientId {
        match self {
            ClientMessage::Join { client_id, .. }
            | ClientMessage::Intent { client_id, .. }
            | ClientMessage::Ping { client_id, .. }
            | ClientMessage::Log { client_id, .. } => client_id,
        }
    }

    /// The game id carried by every envelope.
    pub fn game_id(&self) -> &GameId {
        match self {
            ClientMessage::Join { game_id, .. }
            | ClientMessage::Intent { game_id, .. }
            | ClientMessage::Ping { game_id, .. }
            | ClientMessage::Log { game_id, .. } => game_id,
        }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerMessage {
    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
