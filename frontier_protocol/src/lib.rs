// frontier_protocol: wire protocol between Frontier clients and authorities.
//
// This crate defines the intents, envelopes, framing, and boundary
// validation shared by the client transport (`frontier_client`), the remote
// authority (`frontier_relay`), and the simulation (`frontier_sim`, which
// turns intents into executions). It has no dependency on any of them.
//
// Module overview:
// - `types.rs`:    Identity newtypes (`ClientId`, `GameId`, `PersistentId`,
//                  `PlayerId`, `TurnNumber`) and `GameType`.
// - `intent.rs`:   `Intent` / `IntentAction`: every player action, tagged by
//                  `type` on the wire.
// - `message.rs`:  `ClientMessage` (join/intent/ping/log), `ServerMessage`
//                  (start/turn/desync/error), `Turn`.
// - `schema.rs`:   Parse-or-reject validation and `ProtocolError`.
// - `framing.rs`:  Length-delimited frames with data and close opcodes over
//                  any `Read`/`Write` stream.
//
// Design decisions:
// - **JSON serialization.** Messages are JSON text so the same payloads work
//   over TCP frames and in-process for single-player games.
// - **Validation is explicit.** serde only checks structure; `schema.rs`
//   decides whether a structurally valid message is trusted.
// - **No async runtime.** Framing uses `std::io::Read`/`Write`, compatible
//   with blocking TCP streams and buffered wrappers.

pub mod framing;
pub mod intent;
pub mod message;
pub mod schema;
pub mod types;

pub use framing::{CloseCode, Frame, MAX_MESSAGE_SIZE, read_frame, write_close, write_message};
pub use intent::{EmojiRecipient, Intent, IntentAction, PlayerType, UnitType};
pub use message::{ClientMessage, LogSeverity, ServerMessage, Turn};
pub use schema::{ProtocolError, parse_client_message, parse_server_message};
pub use types::{ClientId, GameId, GameType, PersistentId, PlayerId, TurnNumber};
