// UI events the transport listens for.
//
// The UI emits one of these on the `EventBus` whenever the player does
// something that should reach the authority. Each intent event implements
// `IntentEvent`, a pure mapping from the event plus the session's
// `LobbyConfig` to the wire `IntentAction`; the transport wraps the action
// in an `Intent` carrying the lobby's client id and sends it.
//
// Events that act "as me" (spawn, attack, boat, target, emoji, troop ratio,
// build) take the acting player from the lobby. Alliance and donate events
// name both parties explicitly, matching their wire payloads.
//
// `SendLogEvent` is not an intent: it becomes a `log` envelope.

use frontier_protocol::{EmojiRecipient, IntentAction, LogSeverity, PlayerId, PlayerType, UnitType};

use crate::lobby::LobbyConfig;

/// A UI event that maps to exactly one intent.
pub trait IntentEvent: 'static {
    fn to_action(&self, lobby: &LobbyConfig) -> IntentAction;
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendAllianceRequestIntentEvent {
    pub requestor: PlayerId,
    pub recipient: PlayerId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendAllianceReplyIntentEvent {
    /// Who sent the original request.
    pub requestor: PlayerId,
    /// Who is replying.
    pub recipient: PlayerId,
    pub accepted: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendBreakAllianceIntentEvent {
    pub requestor: PlayerId,
    pub recipient: PlayerId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendSpawnIntentEvent {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendAttackIntentEvent {
    /// `None` attacks unclaimed land.
    pub target_id: Option<PlayerId>,
    pub troops: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendBoatAttackIntentEvent {
    pub target_id: Option<PlayerId>,
    pub x: i32,
    pub y: i32,
    /// `None` lets the authority pick the default boat size.
    pub troops: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuildUnitIntentEvent {
    pub unit: UnitType,
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendTargetPlayerIntentEvent {
    pub target_id: PlayerId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendEmojiIntentEvent {
    pub recipient: EmojiRecipient,
    pub emoji: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendDonateIntentEvent {
    pub sender: PlayerId,
    pub recipient: PlayerId,
    pub troops: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendSetTargetTroopRatioEvent {
    pub ratio: f64,
}

/// A client-side log line forwarded to the authority.
#[derive(Clone, Debug, PartialEq)]
pub struct SendLogEvent {
    pub severity: LogSeverity,
    pub log: String,
}

impl IntentEvent for SendAllianceRequestIntentEvent {
    fn to_action(&self, _lobby: &LobbyConfig) -> IntentAction {
        IntentAction::AllianceRequest {
            requestor: self.requestor.clone(),
            recipient: self.recipient.clone(),
        }
    }
}

impl IntentEvent for SendAllianceReplyIntentEvent {
    fn to_action(&self, _lobby: &LobbyConfig) -> IntentAction {
        IntentAction::AllianceRequestReply {
            requestor: self.requestor.clone(),
            recipient: self.recipient.clone(),
            accept: self.accepted,
        }
    }
}

impl IntentEvent for SendBreakAllianceIntentEvent {
    fn to_action(&self, _lobby: &LobbyConfig) -> IntentAction {
        IntentAction::BreakAlliance {
            requestor: self.requestor.clone(),
            recipient: self.recipient.clone(),
        }
    }
}

impl IntentEvent for SendSpawnIntentEvent {
    fn to_action(&self, lobby: &LobbyConfig) -> IntentAction {
        IntentAction::Spawn {
            player_id: lobby.player_id.clone(),
            name: lobby.player_name().to_owned(),
            player_type: PlayerType::Human,
            x: self.x,
            y: self.y,
        }
    }
}

impl IntentEvent for SendAttackIntentEvent {
    fn to_action(&self, lobby: &LobbyConfig) -> IntentAction {
        IntentAction::Attack {
            attacker_id: lobby.player_id.clone(),
            target_id: self.target_id.clone(),
            troops: self.troops,
            source_x: None,
            source_y: None,
            target_x: None,
            target_y: None,
        }
    }
}

impl IntentEvent for SendBoatAttackIntentEvent {
    fn to_action(&self, lobby: &LobbyConfig) -> IntentAction {
        IntentAction::Boat {
            attacker_id: lobby.player_id.clone(),
            target_id: self.target_id.clone(),
            troops: self.troops,
            x: self.x,
            y: self.y,
        }
    }
}

impl IntentEvent for BuildUnitIntentEvent {
    fn to_action(&self, lobby: &LobbyConfig) -> IntentAction {
        IntentAction::BuildUnit {
            player: lobby.player_id.clone(),
            unit: self.unit,
            x: self.x,
            y: self.y,
        }
    }
}

impl IntentEvent for SendTargetPlayerIntentEvent {
    fn to_action(&self, lobby: &LobbyConfig) -> IntentAction {
        IntentAction::TargetPlayer {
            requestor: lobby.player_id.clone(),
            target: self.target_id.clone(),
        }
    }
}

impl IntentEvent for SendEmojiIntentEvent {
    fn to_action(&self, lobby: &LobbyConfig) -> IntentAction {
        IntentAction::Emoji {
            sender: lobby.player_id.clone(),
            recipient: self.recipient.clone(),
            emoji: self.emoji.clone(),
        }
    }
}

impl IntentEvent for SendDonateIntentEvent {
    fn to_action(&self, _lobby: &LobbyConfig) -> IntentAction {
        IntentAction::Donate {
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            troops: self.troops,
        }
    }
}

impl IntentEvent for SendSetTargetTroopRatioEvent {
    fn to_action(&self, lobby: &LobbyConfig) -> IntentAction {
        IntentAction::TroopRatio {
            player: lobby.player_id.clone(),
            ratio: self.ratio,
        }
    }
}
