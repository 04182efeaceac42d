// frontier_client: the client side of the Frontier turn protocol.
//
// Everything between the UI and the authority lives here. The UI emits
// intent events on an `EventBus`; the `Transport` turns each one into a
// validated `intent` envelope and sends it, either to the relay over a
// socket or to the in-process `LocalServer` in single-player games. Turns
// come back through the `on_message` callback given to `Transport::connect`
// and are applied to the simulation by the game loop.
//
// Module overview:
// - `event_bus.rs`:    Type-keyed, single-threaded publish/subscribe.
// - `events.rs`:       UI intent events and their mapping to `IntentAction`.
// - `lobby.rs`:        `LobbyConfig`, the session's identity bundle.
// - `socket.rs`:       `Socket`/`Connector` traits and the TCP implementation.
// - `local_server.rs`: The in-process authority for single-player games.
// - `transport.rs`:    Connection lifecycle, reconnects, drop buffer,
//                      heartbeat, and event wiring.
//
// The crate is single-threaded by construction (`Rc`, `RefCell`, poll-driven).
// The only background threads are the TCP socket readers, which hand events
// over a channel.

pub mod event_bus;
pub mod events;
pub mod local_server;
pub mod lobby;
pub mod socket;
pub mod transport;

pub use event_bus::EventBus;
pub use events::{
    BuildUnitIntentEvent, IntentEvent, SendAllianceReplyIntentEvent,
    SendAllianceRequestIntentEvent, SendAttackIntentEvent, SendBoatAttackIntentEvent,
    SendBreakAllianceIntentEvent, SendDonateIntentEvent, SendEmojiIntentEvent, SendLogEvent,
    SendSetTargetTroopRatioEvent, SendSpawnIntentEvent, SendTargetPlayerIntentEvent,
};
pub use local_server::LocalServer;
pub use lobby::LobbyConfig;
pub use socket::{Connector, ReadyState, Socket, SocketEvent, TcpConnector, TcpSocket};
pub use transport::{
    CancellationToken, ReconnectPolicy, Transport, TransportConfig, TransportError,
};
