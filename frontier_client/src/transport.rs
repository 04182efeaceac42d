// Intent/message bridge between the UI and the authority.
//
// `Transport` owns the connection for one game session. In single-player
// games (`LobbyConfig::is_local`) it runs a `LocalServer` in-process; in
// every other game it talks to the relay through a `Socket` obtained from
// its `Connector`. Both paths carry the same JSON messages.
//
// Single-threaded and poll-driven. The game loop calls `poll(now)` once
// per frame; that is where socket events are read, incoming messages are
// validated and handed to `on_message`, reconnects and heartbeats fire, and
// the local server's turn timer runs. Nothing reaches the callbacks from
// inside a send.
//
// Connection behavior (remote):
// - `connect` opens a socket. On its `Open` event, the drop buffer is sent
//   oldest first and then `on_ready` runs.
// - Any close other than `CloseCode::NORMAL`, and any socket error,
//   reconnects with the same callbacks under the `ReconnectPolicy`. The
//   default policy (zero backoff, no attempt cap) retries forever, so a
//   permanently unreachable relay means a retry per close for as long as
//   the transport lives. Cap it in `TransportConfig` where that matters.
// - `leave_game` sets the `CancellationToken` and closes with `NORMAL`.
//   A socket still connecting is discarded, so it can never open. Once
//   cancelled, the transport never opens another socket.
// - `send_msg` on a closed (or missing) socket discards it, opens exactly
//   one new socket, and appends the message to the drop buffer. This is the
//   only way a message enters the buffer.
// - `send_intent` while the socket is not open drops the intent with a
//   warning. Intents are not buffered.
// - While the socket is open, a `ping` goes out every `heartbeat_interval`.
//
// Event wiring: `new` subscribes one handler per `IntentEvent` type plus
// `SendLogEvent`. Handlers hold a `Weak` to the transport internals and
// become no-ops once the transport is dropped.
//
// Re-entrancy: callbacks are stored apart from the connection state and
// are taken out of their slot while they run, so a callback may call back
// into the transport (send, join, leave, even `connect` again).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use frontier_protocol::{
    ClientMessage, CloseCode, Intent, IntentAction, LogSeverity, ProtocolError, ServerMessage,
    TurnNumber, parse_server_message,
};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::event_bus::EventBus;
use crate::events::{
    BuildUnitIntentEvent, IntentEvent, SendAllianceReplyIntentEvent,
    SendAllianceRequestIntentEvent, SendAttackIntentEvent, SendBoatAttackIntentEvent,
    SendBreakAllianceIntentEvent, SendDonateIntentEvent, SendEmojiIntentEvent, SendLogEvent,
    SendSetTargetTroopRatioEvent, SendSpawnIntentEvent, SendTargetPlayerIntentEvent,
};
use crate::local_server::LocalServer;
use crate::lobby::LobbyConfig;
use crate::socket::{Connector, ReadyState, Socket, SocketEvent, TcpConnector};

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:7878";

/// Environment variable overriding the relay address.
pub const SERVER_ADDR_ENV: &str = "FRONTIER_SERVER_ADDR";

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

pub const DEFAULT_TURN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    pub server_addr: String,
    pub heartbeat_interval: Duration,
    /// Turn cadence of the in-process authority (single player only).
    pub turn_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            turn_interval: DEFAULT_TURN_INTERVAL,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl TransportConfig {
    /// Defaults, with the server address taken from `FRONTIER_SERVER_ADDR`
    /// when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var(SERVER_ADDR_ENV) {
            config.server_addr = addr;
        }
        config
    }
}

/// When to reconnect after an unexpected close.
///
/// `attempts` count reconnects since the last successful open.
/// The default retries immediately and forever.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub backoff: Duration,
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    pub fn bounded(backoff: Duration, max_attempts: u32) -> Self {
        Self {
            backoff,
            max_attempts: Some(max_attempts),
        }
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

/// Set once by `leave_game`; suppresses every later connect.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid envelope: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("socket is not open ({0:?})")]
    NotOpen(ReadyState),
    #[error("socket send failed: {0}")]
    Io(#[from] io::Error),
    #[error("transport is not connected")]
    NotConnected,
    #[error("transport was cancelled by leave_game")]
    Cancelled,
}

pub type OnReady = Box<dyn FnMut()>;
pub type OnMessage = Box<dyn FnMut(ServerMessage)>;

enum Delivery {
    Ready,
    Message(ServerMessage),
}

pub struct Transport {
    shared: Rc<Shared>,
}

struct Shared {
    lobby: LobbyConfig,
    state: RefCell<State>,
    on_ready: RefCell<Option<OnReady>>,
    on_message: RefCell<Option<OnMessage>>,
}

struct State {
    config: TransportConfig,
    game_config: Option<serde_json::Value>,
    connector: Box<dyn Connector>,
    socket: Option<Box<dyn Socket>>,
    local: Option<LocalServer>,
    buffer: VecDeque<String>,
    heartbeat_running: bool,
    last_heartbeat: Option<Instant>,
    reconnect_at: Option<Instant>,
    attempts: u32,
    cancel: CancellationToken,
}

impl Transport {
    /// Build a transport and subscribe it to the UI intent events on `bus`.
    /// `game_config` is only used by the in-process authority.
    pub fn new(
        lobby: LobbyConfig,
        game_config: Option<serde_json::Value>,
        bus: &EventBus,
        config: TransportConfig,
        connector: Box<dyn Connector>,
    ) -> Self {
        let shared = Rc::new(Shared {
            lobby,
            state: RefCell::new(State {
                config,
                game_config,
                connector,
                socket: None,
                local: None,
                buffer: VecDeque::new(),
                heartbeat_running: false,
                last_heartbeat: None,
                reconnect_at: None,
                attempts: 0,
                cancel: CancellationToken::new(),
            }),
            on_ready: RefCell::new(None),
            on_message: RefCell::new(None),
        });

        subscribe::<SendAllianceRequestIntentEvent>(bus, &shared);
        subscribe::<SendAllianceReplyIntentEvent>(bus, &shared);
        subscribe::<SendBreakAllianceIntentEvent>(bus, &shared);
        subscribe::<SendSpawnIntentEvent>(bus, &shared);
        subscribe::<SendAttackIntentEvent>(bus, &shared);
        subscribe::<SendBoatAttackIntentEvent>(bus, &shared);
        subscribe::<SendTargetPlayerIntentEvent>(bus, &shared);
        subscribe::<SendEmojiIntentEvent>(bus, &shared);
        subscribe::<SendDonateIntentEvent>(bus, &shared);
        subscribe::<SendSetTargetTroopRatioEvent>(bus, &shared);
        subscribe::<BuildUnitIntentEvent>(bus, &shared);

        let weak = Rc::downgrade(&shared);
        bus.on::<SendLogEvent>(move |event| {
            let Some(shared) = weak.upgrade() else { return };
            if let Err(e) = shared.send_log(event.severity, &event.log) {
                debug!("log not sent: {e}");
            }
        });

        Self { shared }
    }

    /// A remote-capable transport connecting over TCP to
    /// `config.server_addr`.
    pub fn tcp(
        lobby: LobbyConfig,
        game_config: Option<serde_json::Value>,
        bus: &EventBus,
        config: TransportConfig,
    ) -> Self {
        let connector = TcpConnector::new(config.server_addr.clone());
        Self::new(lobby, game_config, bus, config, Box::new(connector))
    }

    pub fn lobby(&self) -> &LobbyConfig {
        &self.shared.lobby
    }

    pub fn is_local(&self) -> bool {
        self.shared.lobby.is_local()
    }

    /// Open the channel. In local mode the in-process authority starts and
    /// `on_ready` runs before this returns; in remote mode `on_ready` runs
    /// from `poll` once the socket opens (and again after every reconnect).
    pub fn connect(
        &self,
        on_ready: impl FnMut() + 'static,
        on_message: impl FnMut(ServerMessage) + 'static,
    ) -> Result<(), TransportError> {
        if self.cancellation_token().is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        *self.shared.on_ready.borrow_mut() = Some(Box::new(on_ready));
        *self.shared.on_message.borrow_mut() = Some(Box::new(on_message));

        let local = self.is_local();
        {
            let mut state = self.shared.state.borrow_mut();
            if local {
                state.connect_local(&self.shared.lobby);
            } else {
                state.connect_remote();
            }
        }
        if local {
            self.shared.deliver(Delivery::Ready);
        }
        Ok(())
    }

    /// Drive the connection: socket events, reconnects, heartbeats, and the
    /// local server's turns.
    pub fn poll(&self, now: Instant) {
        let deliveries = self.shared.state.borrow_mut().poll(&self.shared.lobby, now);
        for delivery in deliveries {
            self.shared.deliver(delivery);
        }
    }

    /// Ask the authority for every turn from `last_turn` on.
    pub fn join_game(&self, last_turn: TurnNumber) -> Result<(), TransportError> {
        let lobby = &self.shared.lobby;
        let msg = ClientMessage::join(
            lobby.game_id.clone(),
            lobby.client_id.clone(),
            lobby.persistent_id.clone(),
            lobby.player_name().to_owned(),
            last_turn,
        )?;
        self.send_msg(msg.to_json()?)
    }

    /// Leave deliberately. Remote: cancel reconnects and close with
    /// `CloseCode::NORMAL`. Local: end the in-process game.
    pub fn leave_game(&self) {
        let local = self.is_local();
        self.shared.state.borrow_mut().leave(local);
    }

    pub fn send_intent(&self, action: IntentAction) -> Result<(), TransportError> {
        self.shared.send_intent(action)
    }

    /// Send one serialized client message.
    pub fn send_msg(&self, raw: String) -> Result<(), TransportError> {
        self.shared.state.borrow_mut().send_msg(raw, self.is_local())
    }

    /// Current socket state. Local transports report `Open` while the
    /// in-process authority exists.
    pub fn ready_state(&self) -> ReadyState {
        self.shared.state.borrow().ready_state()
    }

    /// Messages waiting in the drop buffer.
    pub fn buffered(&self) -> usize {
        self.shared.state.borrow().buffer.len()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.state.borrow().cancel.clone()
    }

    /// Run `f` against the in-process authority, if there is one.
    pub fn with_local_server<R>(&self, f: impl FnOnce(&mut LocalServer) -> R) -> Option<R> {
        self.shared.state.borrow_mut().local.as_mut().map(f)
    }
}

fn subscribe<E: IntentEvent>(bus: &EventBus, shared: &Rc<Shared>) {
    let weak: Weak<Shared> = Rc::downgrade(shared);
    bus.on::<E>(move |event| {
        let Some(shared) = weak.upgrade() else { return };
        let action = event.to_action(&shared.lobby);
        if let Err(e) = shared.send_intent(action) {
            debug!("intent not sent: {e}");
        }
    });
}

impl Shared {
    fn send_intent(&self, action: IntentAction) -> Result<(), TransportError> {
        let local = self.lobby.is_local();
        self.state.borrow_mut().send_intent(&self.lobby, action, local)
    }

    fn send_log(&self, severity: LogSeverity, log: &str) -> Result<(), TransportError> {
        let msg = ClientMessage::log(
            self.lobby.game_id.clone(),
            self.lobby.client_id.clone(),
            self.lobby.persistent_id.clone(),
            log.to_owned(),
            severity,
        )?;
        let local = self.lobby.is_local();
        self.state.borrow_mut().send_msg(msg.to_json()?, local)
    }

    /// Run a callback with its slot emptied, then put it back unless the
    /// callback installed a replacement.
    fn deliver(&self, delivery: Delivery) {
        match delivery {
            Delivery::Ready => {
                let callback = self.on_ready.borrow_mut().take();
                if let Some(mut callback) = callback {
                    callback();
                    let mut slot = self.on_ready.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(callback);
                    }
                }
            }
            Delivery::Message(msg) => {
                let callback = self.on_message.borrow_mut().take();
                if let Some(mut callback) = callback {
                    callback(msg);
                    let mut slot = self.on_message.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(callback);
                    }
                }
            }
        }
    }
}

impl State {
    fn ready_state(&self) -> ReadyState {
        if self.local.is_some() {
            return ReadyState::Open;
        }
        self.socket
            .as_ref()
            .map_or(ReadyState::Closed, |s| s.ready_state())
    }

    fn connect_local(&mut self, lobby: &LobbyConfig) {
        let mut server =
            LocalServer::new(lobby, self.game_config.clone(), self.config.turn_interval);
        server.start();
        self.local = Some(server);
    }

    fn connect_remote(&mut self) {
        if self.cancel.is_cancelled() {
            debug!("not connecting: transport cancelled");
            return;
        }
        self.heartbeat_running = true;
        self.maybe_kill_socket();
        debug!("opening socket to {}", self.config.server_addr);
        self.socket = Some(self.connector.connect());
    }

    /// Discard the current socket, closing it first if it is still open.
    /// Its pending events go with it.
    fn maybe_kill_socket(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if socket.ready_state() == ReadyState::Open {
                socket.close(CloseCode::NORMAL, "replaced");
            }
        }
    }

    fn poll(&mut self, lobby: &LobbyConfig, now: Instant) -> Vec<Delivery> {
        let mut out = Vec::new();
        if let Some(server) = self.local.as_mut() {
            server.poll(now);
            out.extend(server.drain_outbox().into_iter().map(Delivery::Message));
            return out;
        }

        self.poll_socket(now, &mut out);
        if self.reconnect_at.is_some_and(|at| now >= at) {
            self.reconnect_at = None;
            self.connect_remote();
        }
        self.heartbeat(lobby, now);
        out
    }

    fn poll_socket(&mut self, now: Instant, out: &mut Vec<Delivery>) {
        let events = match self.socket.as_mut() {
            Some(socket) => socket.poll_events(),
            None => return,
        };
        for event in events {
            match event {
                SocketEvent::Open if self.cancel.is_cancelled() => {
                    info!("socket opened after leaving the game; closing it");
                    self.maybe_kill_socket();
                    return;
                }
                SocketEvent::Open => {
                    info!("connected to {}", self.config.server_addr);
                    self.attempts = 0;
                    self.flush_buffer();
                    out.push(Delivery::Ready);
                }
                SocketEvent::Message(bytes) => match parse_server_message(&bytes) {
                    Ok(msg) => out.push(Delivery::Message(msg)),
                    Err(e) => warn!("dropping invalid server message: {e}"),
                },
                SocketEvent::Error(err) => {
                    error!("socket error: {err}; closing socket");
                    if let Some(socket) = self.socket.as_mut() {
                        socket.close(CloseCode::INTERNAL_ERROR, "socket error");
                    }
                    self.on_close(CloseCode::ABNORMAL, &err, now);
                    return;
                }
                SocketEvent::Close { code, reason } => {
                    self.on_close(code, &reason, now);
                    return;
                }
            }
        }
    }

    fn on_close(&mut self, code: CloseCode, reason: &str, now: Instant) {
        info!("socket closed: code {}, reason {reason:?}", code.0);
        self.socket = None;
        if self.cancel.is_cancelled() || code.is_normal() {
            return;
        }
        self.attempts += 1;
        if !self.config.reconnect.allows(self.attempts) {
            error!(
                "giving up on {} after {} reconnect attempts",
                self.config.server_addr,
                self.attempts - 1
            );
            return;
        }
        info!("reconnecting (attempt {})", self.attempts);
        if self.config.reconnect.backoff.is_zero() {
            self.connect_remote();
        } else {
            self.reconnect_at = Some(now + self.config.reconnect.backoff);
        }
    }

    fn flush_buffer(&mut self) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        while let Some(msg) = self.buffer.pop_front() {
            info!("sending dropped message");
            if let Err(e) = socket.send(msg.as_bytes()) {
                error!("resending dropped message failed: {e}");
                self.buffer.push_front(msg);
                break;
            }
        }
    }

    fn heartbeat(&mut self, lobby: &LobbyConfig, now: Instant) {
        if !self.heartbeat_running {
            return;
        }
        let due = match self.last_heartbeat {
            None => {
                self.last_heartbeat = Some(now);
                false
            }
            Some(last) => now.duration_since(last) >= self.config.heartbeat_interval,
        };
        if !due {
            return;
        }
        self.last_heartbeat = Some(now);
        if self.ready_state() != ReadyState::Open {
            return;
        }
        let ping = ClientMessage::ping(lobby.client_id.clone(), lobby.game_id.clone())
            .and_then(|msg| msg.to_json());
        match ping {
            Ok(json) => {
                if let Err(e) = self.send_msg(json, false) {
                    warn!("heartbeat failed: {e}");
                }
            }
            Err(e) => error!("cannot build ping: {e}"),
        }
    }

    fn send_intent(
        &mut self,
        lobby: &LobbyConfig,
        action: IntentAction,
        local: bool,
    ) -> Result<(), TransportError> {
        let intent = Intent::new(lobby.client_id.clone(), action);
        let state = self.ready_state();
        if !local && state != ReadyState::Open {
            warn!(
                "socket is not open ({state:?}); dropping {} intent",
                intent.type_name()
            );
            return Err(TransportError::NotOpen(state));
        }
        let msg = ClientMessage::intent(lobby.client_id.clone(), lobby.game_id.clone(), intent)?;
        self.send_msg(msg.to_json()?, local)
    }

    fn send_msg(&mut self, raw: String, local: bool) -> Result<(), TransportError> {
        if local {
            let server = self.local.as_mut().ok_or(TransportError::NotConnected)?;
            server.on_message(&raw);
            return Ok(());
        }

        match self.ready_state() {
            ReadyState::Open => {
                if let Some(socket) = self.socket.as_mut() {
                    socket.send(raw.as_bytes())?;
                }
                Ok(())
            }
            ReadyState::Closed => {
                if self.cancel.is_cancelled() {
                    warn!("transport left the game; dropping message");
                    return Err(TransportError::Cancelled);
                }
                warn!("socket not ready, closing and trying later");
                self.connect_remote();
                self.buffer.push_back(raw);
                Ok(())
            }
            other => {
                warn!("socket is {other:?}; dropping message");
                Err(TransportError::NotOpen(other))
            }
        }
    }

    fn leave(&mut self, local: bool) {
        if local {
            if let Some(server) = self.local.as_mut() {
                server.end_game();
            }
            return;
        }
        self.heartbeat_running = false;
        self.last_heartbeat = None;
        self.reconnect_at = None;
        self.cancel.cancel();
        let state = self.ready_state();
        if state == ReadyState::Open {
            info!("leaving game");
            if let Some(socket) = self.socket.as_mut() {
                socket.close(CloseCode::NORMAL, "leaving game");
            }
        } else {
            info!("socket is not open on leave ({state:?}); discarding it");
            self.maybe_kill_socket();
        }
    }
}
