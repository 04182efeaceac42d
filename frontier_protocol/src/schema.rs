// Boundary validation: parse or reject.
//
// serde handles the structural half of the schema (tags, field names,
// types). This module adds the value rules serde cannot express, and is
// the single gate every message passes before anything trusts it:
//
// - ids are `ID_LEN` ASCII alphanumerics, persistent ids are bounded;
// - usernames are 1..=`MAX_USERNAME_LEN` characters;
// - an intent's `clientID` must equal its envelope's `clientID`, so every
//   intent is attributable to exactly the connection that sent it;
// - ratios are finite and within [0, 1]; emojis and logs are bounded;
// - a server `start` replays contiguous, ascending turns.
//
// A failure here is a protocol error for that one message. Callers drop the
// message and keep the channel open.

use thiserror::Error;

use crate::intent::{EmojiRecipient, Intent, IntentAction};
use crate::message::{ClientMessage, ServerMessage, Turn};
use crate::types::{MAX_PERSISTENT_ID_LEN, PlayerId, is_valid_id};

pub const MAX_USERNAME_LEN: usize = 32;
pub const MAX_EMOJI_LEN: usize = 8;
pub const MAX_LOG_LEN: usize = 10_000;

/// Why a message was rejected.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid {field}: {value:?}")]
    InvalidId { field: &'static str, value: String },
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("intent clientID {intent} does not match envelope clientID {envelope}")]
    ClientMismatch { envelope: String, intent: String },
    #[error("turns out of order: expected {expected}, got {got}")]
    TurnOrder { expected: u64, got: u64 },
}

/// Parse JSON bytes into a validated `ClientMessage`.
pub fn parse_client_message(bytes: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg: ClientMessage = serde_json::from_slice(bytes)?;
    validate_client_message(&msg)?;
    Ok(msg)
}

/// Parse JSON bytes into a validated `ServerMessage`.
pub fn parse_server_message(bytes: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg: ServerMessage = serde_json::from_slice(bytes)?;
    validate_server_message(&msg)?;
    Ok(msg)
}

pub fn validate_client_message(msg: &ClientMessage) -> Result<(), ProtocolError> {
    check_id("clientID", msg.client_id().as_str())?;
    check_id("gameID", msg.game_id().as_str())?;
    match msg {
        ClientMessage::Join {
            persistent_id,
            username,
            ..
        } => {
            check_persistent_id(persistent_id.as_str())?;
            check_len("username", username, 1, MAX_USERNAME_LEN)?;
        }
        ClientMessage::Intent {
            client_id, intent, ..
        } => {
            if intent.client_id != *client_id {
                return Err(ProtocolError::ClientMismatch {
                    envelope: client_id.to_string(),
                    intent: intent.client_id.to_string(),
                });
            }
            validate_intent(intent)?;
        }
        ClientMessage::Ping { .. } => {}
        ClientMessage::Log {
            persistent_id, log, ..
        } => {
            check_persistent_id(persistent_id.as_str())?;
            check_len("log", log, 0, MAX_LOG_LEN)?;
        }
    }
    Ok(())
}

pub fn validate_server_message(msg: &ServerMessage) -> Result<(), ProtocolError> {
    match msg {
        ServerMessage::Start { game_id, turns, .. } => {
            check_id("gameID", game_id.as_str())?;
            let mut expected = turns.first().map(|t| t.turn_number.0);
            for turn in turns {
                match expected {
                    Some(exp) if turn.turn_number.0 != exp => {
                        return Err(ProtocolError::TurnOrder {
                            expected: exp,
                            got: turn.turn_number.0,
                        });
                    }
                    _ => {}
                }
                validate_turn(turn)?;
                expected = Some(turn.turn_number.0 + 1);
            }
        }
        ServerMessage::Turn { turn } => validate_turn(turn)?,
        ServerMessage::Desync { .. } | ServerMessage::Error { .. } => {}
    }
    Ok(())
}

fn validate_turn(turn: &Turn) -> Result<(), ProtocolError> {
    check_id("gameID", turn.game_id.as_str())?;
    turn.intents.iter().try_for_each(validate_intent)
}

/// Value checks for a single intent.
pub fn validate_intent(intent: &Intent) -> Result<(), ProtocolError> {
    check_id("clientID", intent.client_id.as_str())?;
    match &intent.action {
        IntentAction::AllianceRequest {
            requestor,
            recipient,
        }
        | IntentAction::AllianceRequestReply {
            requestor,
            recipient,
            ..
        }
        | IntentAction::BreakAlliance {
            requestor,
            recipient,
        } => {
            check_player("requestor", requestor)?;
            check_player("recipient", recipient)?;
        }
        IntentAction::Spawn {
            player_id, name, ..
        } => {
            check_player("playerID", player_id)?;
            check_len("name", name, 1, MAX_USERNAME_LEN)?;
        }
        IntentAction::Attack {
            attacker_id,
            target_id,
            ..
        }
        | IntentAction::Boat {
            attacker_id,
            target_id,
            ..
        } => {
            check_player("attackerID", attacker_id)?;
            if let Some(target) = target_id {
                check_player("targetID", target)?;
            }
        }
        IntentAction::TargetPlayer { requestor, target } => {
            check_player("requestor", requestor)?;
            check_player("target", target)?;
        }
        IntentAction::Emoji {
            sender,
            recipient,
            emoji,
        } => {
            check_player("sender", sender)?;
            if let EmojiRecipient::Player(id) = recipient {
                check_player("recipient", id)?;
            }
            check_len("emoji", emoji, 1, MAX_EMOJI_LEN)?;
        }
        IntentAction::Donate {
            sender, recipient, ..
        } => {
            check_player("sender", sender)?;
            check_player("recipient", recipient)?;
        }
        IntentAction::TroopRatio { player, ratio } => {
            check_player("player", player)?;
            if !ratio.is_finite() || !(0.0..=1.0).contains(ratio) {
                return Err(ProtocolError::InvalidField {
                    field: "ratio",
                    reason: format!("{ratio} is not within [0, 1]"),
                });
            }
        }
        IntentAction::BuildUnit { player, .. } => check_player("player", player)?,
    }
    Ok(())
}

fn check_id(field: &'static str, value: &str) -> Result<(), ProtocolError> {
    if is_valid_id(value) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidId {
            field,
            value: value.to_owned(),
        })
    }
}

fn check_player(field: &'static str, id: &PlayerId) -> Result<(), ProtocolError> {
    check_id(field, id.as_str())
}

fn check_persistent_id(value: &str) -> Result<(), ProtocolError> {
    if value.is_empty() || value.chars().count() > MAX_PERSISTENT_ID_LEN {
        return Err(ProtocolError::InvalidId {
            field: "persistentID",
            value: value.to_owned(),
        });
    }
    Ok(())
}

fn check_len(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ProtocolError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ProtocolError::InvalidField {
            field,
            reason: format!("length {len} not within {min}..={max}"),
        });
    }
    Ok(())
}
