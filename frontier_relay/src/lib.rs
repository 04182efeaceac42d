// frontier_relay: remote authority for multiplayer Frontier games.
//
// The relay is a thin message broker. It accepts TCP connections from game
// clients, validates their messages, collects intents, batches them into
// numbered turns at a fixed cadence, and broadcasts each turn to every
// joined client. It never runs the simulation; all game logic stays on the
// clients.
//
// Module overview:
// - `session.rs`:  Session state: connection roster, client binding, intent
//                  intake, turn history and replay. The core data structure
//                  that `server.rs` drives.
// - `server.rs`:   TCP listener, reader threads (one per connection), and
//                  the main event loop. Uses `std::net` with a
//                  thread-per-reader architecture and an `mpsc` channel to
//                  funnel frames into the single-threaded `Session`.
//
// Dependencies: `frontier_protocol` (shared message types, framing, and
// validation). No dependency on the sim or client crates.
//
// The relay can run as a standalone binary (`main.rs`) or be embedded in a
// process via the library API (`start_relay`).

pub mod server;
pub mod session;

pub use server::{RelayConfig, RelayHandle, start_relay};
pub use session::{ConnId, Session};
