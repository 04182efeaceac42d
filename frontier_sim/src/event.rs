// Player-visible simulation events.
//
// Every world mutation that a client might want to display is recorded as a
// `SimEvent` in the world's outgoing log. `SimState::apply_turn` drains the
// log after each tick and hands the events to its caller (renderer, test,
// or replica comparison). Events are output only; the sim never reads them
// back.
//
// `DisplayMessage` events carry an optional recipient player: capacity
// refusals and similar warnings go to the initiating player alone, while
// `None` means everyone.
//
// See also: `world.rs` whose mutation API emits these, `sim.rs` for the
// tick loop that collects them.
//
// **Critical constraint: determinism.** Events are appended in the order
// mutations happen, which is itself deterministic, so two replicas fed the
// same turns produce identical event streams.

use serde::{Deserialize, Serialize};

use crate::types::{PlayerIdx, TileRef, UnitId, UnitType};

/// Severity of a message shown to players.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Info,
    Success,
    Warn,
    Error,
}

/// An event emitted by the simulation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    pub kind: SimEventKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEventKind {
    /// Text for player(s). `player: None` is a broadcast.
    DisplayMessage {
        text: String,
        message_type: MessageType,
        player: Option<PlayerIdx>,
    },
    TileConquered {
        tile: TileRef,
        conqueror: PlayerIdx,
        previous: Option<PlayerIdx>,
    },
    UnitBuilt {
        unit: UnitId,
        unit_type: UnitType,
        owner: PlayerIdx,
        tile: TileRef,
    },
    UnitDeleted {
        unit: UnitId,
        unit_type: UnitType,
        owner: PlayerIdx,
    },
    AllianceFormed {
        a: PlayerIdx,
        b: PlayerIdx,
    },
    AllianceBroken {
        breaker: PlayerIdx,
        other: PlayerIdx,
    },
    /// `recipient: None` is addressed to all players.
    Emoji {
        sender: PlayerIdx,
        recipient: Option<PlayerIdx>,
        emoji: String,
    },
}
