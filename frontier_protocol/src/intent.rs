// Player intents: the only way a client asks the authority to change the
// world.
//
// An `Intent` is the issuing client's id plus an `IntentAction`. On the wire
// both are flattened into one JSON object discriminated by `type`:
//
//   {"type":"boat","clientID":"Ab12Cd34","attackerID":"Pl4y3r01",
//    "targetID":null,"troops":150,"x":12,"y":7}
//
// Field names follow the wire schema exactly (`attackerID`, `sourceX`, ...),
// hence the per-field renames. Nullable fields are `Option`s: a `null`
// `targetID` means terra nullius, a `null` boat/donate `troops` means "let
// the authority pick the default amount".
//
// Intents are immutable values. The authority wraps each accepted intent in
// an execution (see `frontier_sim::execution`); the intent itself is dropped
// once the turn it arrived in has been applied.
//
// See also: `message.rs` for the `intent` envelope, `schema.rs` for the
// value checks applied before an intent is trusted.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::{ClientId, PlayerId};

/// A single player action, attributed to the client that issued it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
    #[serde(flatten)]
    pub action: IntentAction,
}

/// What the intent asks for. The serde tag is the wire `type` field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntentAction {
    #[serde(rename = "allianceRequest")]
    AllianceRequest {
        requestor: PlayerId,
        recipient: PlayerId,
    },
    /// Sent by the recipient of an alliance request.
    #[serde(rename = "allianceRequestReply")]
    AllianceRequestReply {
        requestor: PlayerId,
        recipient: PlayerId,
        accept: bool,
    },
    #[serde(rename = "breakAlliance")]
    BreakAlliance {
        requestor: PlayerId,
        recipient: PlayerId,
    },
    #[serde(rename = "spawn")]
    Spawn {
        #[serde(rename = "playerID")]
        player_id: PlayerId,
        name: String,
        #[serde(rename = "playerType")]
        player_type: PlayerType,
        x: i32,
        y: i32,
    },
    /// Land attack. Source/target coordinates are optional hints.
    #[serde(rename = "attack")]
    Attack {
        #[serde(rename = "attackerID")]
        attacker_id: PlayerId,
        #[serde(rename = "targetID")]
        target_id: Option<PlayerId>,
        troops: u32,
        #[serde(rename = "sourceX")]
        source_x: Option<i32>,
        #[serde(rename = "sourceY")]
        source_y: Option<i32>,
        #[serde(rename = "targetX")]
        target_x: Option<i32>,
        #[serde(rename = "targetY")]
        target_y: Option<i32>,
    },
    /// Transport-ship attack landing at (or near) cell `(x, y)`.
    #[serde(rename = "boat")]
    Boat {
        #[serde(rename = "attackerID")]
        attacker_id: PlayerId,
        #[serde(rename = "targetID")]
        target_id: Option<PlayerId>,
        troops: Option<u32>,
        x: i32,
        y: i32,
    },
    #[serde(rename = "targetPlayer")]
    TargetPlayer {
        requestor: PlayerId,
        target: PlayerId,
    },
    #[serde(rename = "emoji")]
    Emoji {
        sender: PlayerId,
        recipient: EmojiRecipient,
        emoji: String,
    },
    #[serde(rename = "donate")]
    Donate {
        sender: PlayerId,
        recipient: PlayerId,
        troops: Option<u32>,
    },
    /// Fraction of population the player wants kept as troops, in `[0, 1]`.
    #[serde(rename = "troop_ratio")]
    TroopRatio { player: PlayerId, ratio: f64 },
    #[serde(rename = "build_unit")]
    BuildUnit {
        player: PlayerId,
        unit: UnitType,
        x: i32,
        y: i32,
    },
}

impl Intent {
    pub fn new(client_id: ClientId, action: IntentAction) -> Self {
        Self { client_id, action }
    }

    /// The player this intent is attributable to.
    pub fn player(&self) -> &PlayerId {
        match &self.action {
            IntentAction::AllianceRequest { requestor, .. }
            | IntentAction::BreakAlliance { requestor, .. }
            | IntentAction::TargetPlayer { requestor, .. } => requestor,
            IntentAction::AllianceRequestReply { recipient, .. } => recipient,
            IntentAction::Spawn { player_id, .. } => player_id,
            IntentAction::Attack { attacker_id, .. } | IntentAction::Boat { attacker_id, .. } => {
                attacker_id
            }
            IntentAction::Emoji { sender, .. } | IntentAction::Donate { sender, .. } => sender,
            IntentAction::TroopRatio { player, .. } | IntentAction::BuildUnit { player, .. } => {
                player
            }
        }
    }

    /// The wire `type` tag, for logging.
    pub fn type_name(&self) -> &'static str {
        match self.action {
            IntentAction::AllianceRequest { .. } => "allianceRequest",
            IntentAction::AllianceRequestReply { .. } => "allianceRequestReply",
            IntentAction::BreakAlliance { .. } => "breakAlliance",
            IntentAction::Spawn { .. } => "spawn",
            IntentAction::Attack { .. } => "attack",
            IntentAction::Boat { .. } => "boat",
            IntentAction::TargetPlayer { .. } => "targetPlayer",
            IntentAction::Emoji { .. } => "emoji",
            IntentAction::Donate { .. } => "donate",
            IntentAction::TroopRatio { .. } => "troop_ratio",
            IntentAction::BuildUnit { .. } => "build_unit",
        }
    }
}

/// Kind of player behind an id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerType {
    #[serde(rename = "HUMAN")]
    Human,
    #[serde(rename = "BOT")]
    Bot,
    #[serde(rename = "FAKEHUMAN")]
    FakeHuman,
}

/// Buildable and mobile unit kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitType {
    #[serde(rename = "Transport")]
    TransportShip,
    Warship,
    Port,
    City,
    #[serde(rename = "Defense Post")]
    DefensePost,
    #[serde(rename = "Missile Silo")]
    MissileSilo,
}

/// Wire sentinel for "every player" as an emoji recipient.
pub const ALL_PLAYERS: &str = "AllPlayers";

/// Emoji recipient: one player, or everyone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmojiRecipient {
    AllPlayers,
    Player(PlayerId),
}

impl Serialize for EmojiRecipient {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EmojiRecipient::AllPlayers => serializer.serialize_str(ALL_PLAYERS),
            EmojiRecipient::Player(id) => serializer.serialize_str(id.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for EmojiRecipient {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecipientVisitor;

        impl Visitor<'_> for RecipientVisitor {
            type Value = EmojiRecipient;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a player id or \"{ALL_PLAYERS}\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if v == ALL_PLAYERS {
                    Ok(EmojiRecipient::AllPlayers)
                } else {
                    Ok(EmojiRecipient::Player(PlayerId::new(v)))
                }
            }
        }

        deserializer.deserialize_str(RecipientVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> ClientId {
        ClientId::new("Cl1ent00")
    }

    #[test]
    fn boat_intent_wire_shape() {
        let intent = Intent::new(
            client(),
            IntentAction::Boat {
                attacker_id: PlayerId::new("Pl4yer01"),
                target_id: None,
                troops: Some(150),
                x: 12,
                y: 7,
            },
        );
        let value = serde_json::to_value(&intent).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "boat",
                "clientID": "Cl1ent00",
                "attackerID": "Pl4yer01",
                "targetID": null,
                "troops": 150,
                "x": 12,
                "y": 7,
            })
        );
    }

    #[test]
    fn parses_intent_with_missing_nullable_fields() {
        let raw = concat!(
            r#"{"type":"donate","clientID":"Cl1ent00","#,
            r#""sender":"Pl4yer01","recipient":"Pl4yer02"}"#
        );
        let intent: Intent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            intent.action,
            IntentAction::Donate {
                sender: PlayerId::new("Pl4yer01"),
                recipient: PlayerId::new("Pl4yer02"),
                troops: None,
            }
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let raw = r#"{"type":"nuke","clientID":"Cl1ent00"}"#;
        assert!(serde_json::from_str::<Intent>(raw).is_err());
    }

    #[test]
    fn emoji_recipient_sentinel() {
        let all: EmojiRecipient = serde_json::from_str(r#""AllPlayers""#).unwrap();
        assert_eq!(all, EmojiRecipient::AllPlayers);
        let one: EmojiRecipient = serde_json::from_str(r#""Pl4yer02""#).unwrap();
        assert_eq!(one, EmojiRecipient::Player(PlayerId::new("Pl4yer02")));
        assert_eq!(
            serde_json::to_string(&EmojiRecipient::AllPlayers).unwrap(),
            r#""AllPlayers""#
        );
    }

    #[test]
    fn unit_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&UnitType::TransportShip).unwrap(),
            r#""Transport""#
        );
        assert_eq!(
            serde_json::to_string(&UnitType::MissileSilo).unwrap(),
            r#""Missile Silo""#
        );
    }

    #[test]
    fn attribution_follows_the_acting_player() {
        let reply = Intent::new(
            client(),
            IntentAction::AllianceRequestReply {
                requestor: PlayerId::new("Pl4yer01"),
                recipient: PlayerId::new("Pl4yer02"),
                accept: true,
            },
        );
        // The reply is issued by the request's recipient.
        assert_eq!(reply.player(), &PlayerId::new("Pl4yer02"));
        assert_eq!(reply.type_name(), "allianceRequestReply");
    }
}
