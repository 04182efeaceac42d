// Test-only game client for multiplayer integration tests.
//
// Wraps a real `Transport` (from `frontier_client`) and a real `SimState`
// (from `frontier_sim`) behind a synchronous, test-friendly API covering the
// whole pipeline:
// UI event -> bus -> transport -> authority -> turn -> sim.apply_turn().
//
// The client behaves like the game loop: it polls the transport, joins (or
// rejoins from its next turn) whenever `on_ready` fires, builds its sim
// from the `start` message, and applies every turn in order. It records a
// world snapshot after each applied turn so replicas can be compared turn
// by turn even though they drain their sockets at different times.
//
// The only test-specific code here is the blocking poll loops. All
// networking and sim logic uses the same code paths as the real game.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use frontier_client::{EventBus, LobbyConfig, ReadyState, Transport, TransportConfig};
use frontier_protocol::{
    ClientId, GameId, GameType, PersistentId, PlayerId, ServerMessage, Turn, TurnNumber,
};
use frontier_sim::event::SimEvent;
use frontier_sim::map::GameMap;
use frontier_sim::{GameConfig, SimState};
use log::info;

/// Default timeout for blocking poll operations.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub fn lobby(client: &str, player: &str, game_id: &str, game_type: GameType) -> LobbyConfig {
    LobbyConfig {
        client_id: ClientId::new(client),
        game_id: GameId::new(game_id),
        persistent_id: PersistentId::new(format!("persist-{client}")),
        player_id: PlayerId::new(player),
        player_name: player.to_owned(),
        game_type,
    }
}

/// A test game client wrapping a real `Transport` and `SimState`.
pub struct TestGameClient {
    bus: Rc<EventBus>,
    transport: Transport,
    map: GameMap,
    ready: Rc<Cell<bool>>,
    inbox: Rc<RefCell<Vec<ServerMessage>>>,
    pub sim: Option<SimState>,
    /// World JSON after each applied turn, keyed by turn number.
    pub snapshots: BTreeMap<u64, String>,
    pub events: Vec<SimEvent>,
    pub errors: Vec<String>,
    next_turn: TurnNumber,
    joins: u32,
}

impl TestGameClient {
    /// Connect to a relay at `addr`. Joins once the socket opens.
    pub fn remote(addr: SocketAddr, lobby: LobbyConfig, map: GameMap) -> Self {
        let config = TransportConfig {
            server_addr: addr.to_string(),
            ..TransportConfig::default()
        };
        let bus = Rc::new(EventBus::new());
        let transport = Transport::tcp(lobby, None, &bus, config);
        Self::connect(bus, transport, map)
    }

    /// Single-player client against the in-process authority.
    pub fn local(lobby: LobbyConfig, game_config: &GameConfig, map: GameMap) -> Self {
        let config = TransportConfig {
            turn_interval: Duration::from_millis(10),
            ..TransportConfig::default()
        };
        let bus = Rc::new(EventBus::new());
        let transport = Transport::tcp(lobby, Some(game_config.to_value()), &bus, config);
        Self::connect(bus, transport, map)
    }

    fn connect(bus: Rc<EventBus>, transport: Transport, map: GameMap) -> Self {
        let ready = Rc::new(Cell::new(false));
        let inbox = Rc::new(RefCell::new(Vec::new()));
        let on_ready = ready.clone();
        let on_message = inbox.clone();
        transport
            .connect(
                move || on_ready.set(true),
                move |msg| on_message.borrow_mut().push(msg),
            )
            .expect("connect failed");
        Self {
            bus,
            transport,
            map,
            ready,
            inbox,
            sim: None,
            snapshots: BTreeMap::new(),
            events: Vec::new(),
            errors: Vec::new(),
            next_turn: TurnNumber(0),
            joins: 0,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Turns applied so far.
    pub fn turns_applied(&self) -> u64 {
        self.next_turn.0
    }

    /// Number of `join` messages sent (one per ready).
    pub fn joins(&self) -> u32 {
        self.joins
    }

    /// One game-loop iteration: poll, (re)join if ready, apply messages.
    pub fn poll_once(&mut self) {
        self.transport.poll(Instant::now());
        if self.ready.replace(false) {
            self.joins += 1;
            info!(
                "{} joining from turn {}",
                self.transport.lobby().client_id,
                self.next_turn.0
            );
            self.transport
                .join_game(self.next_turn)
                .expect("join_game failed");
        }
        let messages: Vec<ServerMessage> = self.inbox.borrow_mut().drain(..).collect();
        for msg in messages {
            self.handle(msg);
        }
    }

    fn handle(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Start { config, turns, .. } => {
                if self.sim.is_none() {
                    let config = GameConfig::from_value(&config).expect("bad game config");
                    self.sim = Some(SimState::new(self.map.clone(), config));
                }
                for turn in &turns {
                    self.apply(turn);
                }
            }
            ServerMessage::Turn { turn } => self.apply(&turn),
            ServerMessage::Desync { turn_number } => {
                self.errors.push(format!("desync at turn {}", turn_number.0));
            }
            ServerMessage::Error { reason } => self.errors.push(reason),
        }
    }

    /// Apply `turn` if it is the next one; replays of turns already applied
    /// are skipped.
    fn apply(&mut self, turn: &Turn) {
        let Some(sim) = self.sim.as_mut() else {
            return;
        };
        if turn.turn_number != self.next_turn {
            assert!(
                turn.turn_number < self.next_turn,
                "gap in turn stream: expected {}, got {}",
                self.next_turn.0,
                turn.turn_number.0
            );
            return;
        }
        let result = sim.apply_turn(turn);
        self.events.extend(result.events);
        let json = sim.world_json().expect("world snapshot failed");
        self.snapshots.insert(turn.turn_number.0, json);
        self.next_turn = turn.turn_number.next();
    }

    /// Poll until `pred` holds or `POLL_TIMEOUT` passes.
    pub fn poll_until(&mut self, what: &str, pred: impl Fn(&Self) -> bool) {
        let start = Instant::now();
        loop {
            self.poll_once();
            if pred(self) {
                return;
            }
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
            thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn poll_until_open(&mut self) {
        self.poll_until("open socket", |c| {
            c.transport.ready_state() == ReadyState::Open && c.sim.is_some()
        });
    }

    pub fn poll_until_turns(&mut self, n: u64) {
        self.poll_until(&format!("{n} turns"), |c| c.turns_applied() >= n);
    }

    pub fn leave(&mut self) {
        self.transport.leave_game();
    }
}

/// Poll several clients round-robin until each has applied `n` turns.
pub fn poll_all_until_turns(clients: &mut [&mut TestGameClient], n: u64) {
    let start = Instant::now();
    loop {
        for client in clients.iter_mut() {
            client.poll_once();
        }
        if clients.iter().all(|c| c.turns_applied() >= n) {
            return;
        }
        assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {n} turns");
        thread::sleep(POLL_INTERVAL);
    }
}

/// Compare two replicas on every turn both have applied. Returns how many
/// turns were compared.
pub fn assert_replicas_agree(a: &TestGameClient, b: &TestGameClient) -> usize {
    let mut compared = 0;
    for (turn, json) in &a.snapshots {
        if let Some(other) = b.snapshots.get(turn) {
            assert_eq!(json, other, "replicas diverged at turn {turn}");
            compared += 1;
        }
    }
    compared
}
