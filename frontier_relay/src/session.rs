// Session state for the relay authority.
//
// `Session` is the central data structure that `server.rs` drives. It holds
// one game: the open connections, which client id is bound to which
// connection, the intents received since the last turn, and the full turn
// history. All mutation happens from the server's single-threaded main loop,
// so there is no internal locking.
//
// Key responsibilities:
// - Connection roster: a connection exists from accept until its reader
//   thread reports a disconnect. It is "joined" once a `join` message binds
//   a client id to it.
// - Join and rejoin: `join` replies `start` carrying the game config and
//   every turn from `lastTurn` on, so a reconnecting client catches up from
//   where it left off. A second `join` with a client id that is already
//   bound replaces the old connection, which is closed.
// - Intent intake: `intent` messages are accepted only from a joined
//   connection, for this game, carrying the client id that connection
//   joined with. Anything else is answered with `error` and dropped.
// - Turn flushing: `flush_turn` packages pending intents (arrival order)
//   into the next numbered `Turn`, appends it to history, and broadcasts it
//   to every joined connection. Turns are numbered from 0.
// - Liveness: every frame a connection sends (heartbeat pings included)
//   refreshes its `last_seen` through `touch`. `close_idle` closes the
//   connections silent for longer than the timeout with `GOING_AWAY`, so a
//   client that is still alive reconnects.
//
// Writing to client streams: `Session` holds cloned `TcpStream` write halves
// wrapped in `BufWriter`. Write errors on one connection are logged and
// otherwise ignored; that connection's reader thread notices the broken
// stream and reports the disconnect.

use std::collections::BTreeMap;
use std::io::BufWriter;
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use frontier_protocol::{
    ClientId, ClientMessage, CloseCode, GameId, Intent, LogSeverity, ServerMessage, Turn,
    TurnNumber, write_close, write_message,
};
use log::{debug, error, info, warn};

/// Relay-assigned id for one accepted TCP connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(pub u64);

/// Relay session managing a single game.
pub struct Session {
    pub game_id: GameId,
    config: serde_json::Value,
    connections: BTreeMap<ConnId, Connection>,
    clients: BTreeMap<ClientId, ConnId>,
    next_conn_id: u64,
    pending: Vec<Intent>,
    turns: Vec<Turn>,
}

struct Connection {
    writer: BufWriter<TcpStream>,
    client_id: Option<ClientId>,
    last_seen: Instant,
}

impl Session {
    /// `config` is sent opaquely to every client in its `start` message.
    pub fn new(game_id: GameId, config: serde_json::Value) -> Self {
        Self {
            game_id,
            config,
            connections: BTreeMap::new(),
            clients: BTreeMap::new(),
            next_conn_id: 0,
            pending: Vec::new(),
            turns: Vec::new(),
        }
    }

    /// Register a freshly accepted connection. `stream` is the write half;
    /// the caller keeps the read half for its reader thread.
    pub fn add_connection(&mut self, stream: TcpStream) -> ConnId {
        let id = ConnId(self.next_conn_id);
        self.next_conn_id += 1;
        self.connections.insert(
            id,
            Connection {
                writer: BufWriter::new(stream),
                client_id: None,
                last_seen: Instant::now(),
            },
        );
        debug!("connection {} opened", id.0);
        id
    }

    /// Forget a connection after its reader has stopped. Unknown ids are
    /// ignored, which covers connections already replaced by a rejoin.
    pub fn remove_connection(&mut self, conn: ConnId) {
        let Some(connection) = self.connections.remove(&conn) else {
            return;
        };
        if let Some(client_id) = connection.client_id {
            if self.clients.get(&client_id) == Some(&conn) {
                self.clients.remove(&client_id);
            }
            info!("client {client_id} disconnected");
        }
    }

    /// Record traffic from `conn` at `now`.
    pub fn touch(&mut self, conn: ConnId, now: Instant) {
        if let Some(connection) = self.connections.get_mut(&conn) {
            connection.last_seen = now;
        }
    }

    pub fn last_seen(&self, conn: ConnId) -> Option<Instant> {
        self.connections.get(&conn).map(|c| c.last_seen)
    }

    /// Close and forget every connection not heard from within `timeout`
    /// of `now`. Returns the closed ids.
    pub fn close_idle(&mut self, now: Instant, timeout: Duration) -> Vec<ConnId> {
        let idle: Vec<ConnId> = self
            .connections
            .iter()
            .filter(|(_, c)| now.saturating_duration_since(c.last_seen) > timeout)
            .map(|(&id, _)| id)
            .collect();
        for &conn in &idle {
            if let Some(mut connection) = self.connections.remove(&conn) {
                info!(
                    "connection {} idle for over {}s; closing",
                    conn.0,
                    timeout.as_secs()
                );
                let _ = write_close(&mut connection.writer, CloseCode::GOING_AWAY, "idle timeout");
                let _ = connection.writer.get_ref().shutdown(Shutdown::Both);
                if let Some(client_id) = connection.client_id {
                    if self.clients.get(&client_id) == Some(&conn) {
                        self.clients.remove(&client_id);
                    }
                }
            }
        }
        idle
    }

    /// Dispatch one validated client message.
    pub fn handle_message(&mut self, conn: ConnId, msg: ClientMessage) {
        if *msg.game_id() != self.game_id {
            warn!(
                "connection {} sent a message for game {}, this is {}",
                conn.0,
                msg.game_id(),
                self.game_id
            );
            self.reject(conn, format!("unknown game {}", msg.game_id()));
            return;
        }

        match msg {
            ClientMessage::Join {
                client_id,
                username,
                last_turn,
                ..
            } => self.join(conn, client_id, &username, last_turn),
            ClientMessage::Intent {
                client_id, intent, ..
            } => self.accept_intent(conn, &client_id, intent),
            ClientMessage::Ping { client_id, .. } => {
                debug!("ping from {client_id}");
            }
            ClientMessage::Log {
                client_id,
                log,
                severity,
                ..
            } => match severity {
                LogSeverity::Debug => debug!("[client {client_id}] {log}"),
                LogSeverity::Info => info!("[client {client_id}] {log}"),
                LogSeverity::Warn => warn!("[client {client_id}] {log}"),
                LogSeverity::Error => error!("[client {client_id}] {log}"),
            },
        }
    }

    fn join(&mut self, conn: ConnId, client_id: ClientId, username: &str, last_turn: TurnNumber) {
        if !self.connections.contains_key(&conn) {
            return;
        }

        if let Some(old) = self.clients.insert(client_id.clone(), conn) {
            if old != conn {
                info!("client {client_id} rejoined; replacing connection {}", old.0);
                if let Some(mut stale) = self.connections.remove(&old) {
                    let _ = write_close(&mut stale.writer, CloseCode::NORMAL, "replaced");
                    let _ = stale.writer.get_ref().shutdown(Shutdown::Both);
                }
            }
        }

        let previous = self
            .connections
            .get_mut(&conn)
            .and_then(|c| c.client_id.replace(client_id.clone()));
        if let Some(previous) = previous {
            if previous != client_id && self.clients.get(&previous) == Some(&conn) {
                self.clients.remove(&previous);
            }
        }

        let from = usize::try_from(last_turn.0)
            .unwrap_or(usize::MAX)
            .min(self.turns.len());
        info!(
            "{username} ({client_id}) joined {} at turn {}, replaying {} turns",
            self.game_id,
            last_turn.0,
            self.turns.len() - from
        );
        let start = ServerMessage::Start {
            game_id: self.game_id.clone(),
            config: self.config.clone(),
            turns: self.turns[from..].to_vec(),
        };
        self.send_to(conn, &start);
    }

    fn accept_intent(&mut self, conn: ConnId, client_id: &ClientId, intent: Intent) {
        let joined_as = self
            .connections
            .get(&conn)
            .and_then(|c| c.client_id.as_ref());
        match joined_as {
            Some(joined) if joined == client_id => {
                debug!("{} intent from {client_id}", intent.type_name());
                self.pending.push(intent);
            }
            Some(joined) => {
                warn!("connection joined as {joined} sent intent as {client_id}");
                self.reject(conn, format!("connection is not client {client_id}"));
            }
            None => {
                warn!("intent from connection {} before join", conn.0);
                self.reject(conn, "join before sending intents".into());
            }
        }
    }

    /// Answer `conn` with an `error` message.
    pub fn reject(&mut self, conn: ConnId, reason: String) {
        self.send_to(conn, &ServerMessage::Error { reason });
    }

    /// Package pending intents into the next turn and broadcast it.
    pub fn flush_turn(&mut self) {
        let turn = Turn {
            turn_number: TurnNumber(self.turns.len() as u64),
            game_id: self.game_id.clone(),
            intents: std::mem::take(&mut self.pending),
        };
        if !turn.intents.is_empty() {
            debug!(
                "turn {} carries {} intents",
                turn.turn_number.0,
                turn.intents.len()
            );
        }
        let msg = ServerMessage::Turn { turn: turn.clone() };
        self.turns.push(turn);

        let joined: Vec<ConnId> = self.clients.values().copied().collect();
        for conn in joined {
            self.send_to(conn, &msg);
        }
    }

    /// Send a close frame to every connection and drop them all.
    pub fn close_all(&mut self, code: CloseCode, reason: &str) {
        for (_, mut connection) in std::mem::take(&mut self.connections) {
            let _ = write_close(&mut connection.writer, code, reason);
            let _ = connection.writer.get_ref().shutdown(Shutdown::Both);
        }
        self.clients.clear();
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn joined_count(&self) -> usize {
        self.clients.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    fn send_to(&mut self, conn: ConnId, msg: &ServerMessage) {
        let Some(connection) = self.connections.get_mut(&conn) else {
            return;
        };
        let result = msg
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| {
                write_message(&mut connection.writer, json.as_bytes()).map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!("write to connection {} failed: {e}", conn.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;
    use std::net::TcpListener;
    use std::time::Duration;

    use frontier_protocol::{
        Frame, IntentAction, PersistentId, PlayerId, parse_server_message, read_frame,
    };

    use super::*;

    const GAME: &str = "G4me0001";

    /// Create a connected TCP pair for testing.
    fn tcp_pair() -> (BufReader<TcpStream>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let (server, _) = listener.accept().unwrap();
        (BufReader::new(client), server)
    }

    fn recv(reader: &mut BufReader<TcpStream>) -> ServerMessage {
        match read_frame(reader).unwrap() {
            Frame::Data(bytes) => parse_server_message(&bytes).unwrap(),
            other => panic!("expected data frame, got {other:?}"),
        }
    }

    fn session() -> Session {
        Session::new(GameId::new(GAME), serde_json::json!({"starting_troops": 500}))
    }

    fn join(client: &str, last_turn: u64) -> ClientMessage {
        ClientMessage::join(
            GameId::new(GAME),
            ClientId::new(client),
            PersistentId::new("persist-1"),
            "Ada".into(),
            TurnNumber(last_turn),
        )
        .unwrap()
    }

    fn intent(client: &str) -> ClientMessage {
        let intent = Intent::new(
            ClientId::new(client),
            IntentAction::TargetPlayer {
                requestor: PlayerId::new("Pl4yer01"),
                target: PlayerId::new("Pl4yer02"),
            },
        );
        ClientMessage::intent(ClientId::new(client), GameId::new(GAME), intent).unwrap()
    }

    #[test]
    fn join_replies_start_with_config() {
        let (mut client, server) = tcp_pair();
        let mut session = session();
        let conn = session.add_connection(server);
        session.handle_message(conn, join("Cl1ent00", 0));
        assert_eq!(session.joined_count(), 1);

        match recv(&mut client) {
            ServerMessage::Start {
                game_id,
                config,
                turns,
            } => {
                assert_eq!(game_id, GameId::new(GAME));
                assert_eq!(config["starting_troops"], 500);
                assert!(turns.is_empty());
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn flush_turn_broadcasts_to_joined_connections() {
        let (mut alice, s1) = tcp_pair();
        let (_lurker, s2) = tcp_pair();
        let mut session = session();
        let a = session.add_connection(s1);
        let _l = session.add_connection(s2);
        session.handle_message(a, join("Cl1ent00", 0));
        let _start = recv(&mut alice);

        session.handle_message(a, intent("Cl1ent00"));
        session.handle_message(a, intent("Cl1ent00"));
        assert_eq!(session.pending_count(), 2);
        session.flush_turn();
        session.flush_turn();
        assert_eq!(session.pending_count(), 0);

        match recv(&mut alice) {
            ServerMessage::Turn { turn } => {
                assert_eq!(turn.turn_number, TurnNumber(0));
                assert_eq!(turn.intents.len(), 2);
            }
            other => panic!("expected Turn, got {other:?}"),
        }
        match recv(&mut alice) {
            ServerMessage::Turn { turn } => {
                assert_eq!(turn.turn_number, TurnNumber(1));
                assert!(turn.intents.is_empty());
            }
            other => panic!("expected Turn, got {other:?}"),
        }
        assert_eq!(session.turns().len(), 2);
    }

    #[test]
    fn join_replays_history_from_last_turn() {
        let (_a, s1) = tcp_pair();
        let (mut late, s2) = tcp_pair();
        let mut session = session();
        let a = session.add_connection(s1);
        session.handle_message(a, join("Cl1ent00", 0));
        for _ in 0..4 {
            session.flush_turn();
        }

        let b = session.add_connection(s2);
        session.handle_message(b, join("Cl1ent01", 2));
        match recv(&mut late) {
            ServerMessage::Start { turns, .. } => {
                let numbers: Vec<u64> = turns.iter().map(|t| t.turn_number.0).collect();
                assert_eq!(numbers, vec![2, 3]);
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn last_turn_past_history_replays_nothing() {
        let (mut client, server) = tcp_pair();
        let mut session = session();
        let conn = session.add_connection(server);
        session.flush_turn();
        session.handle_message(conn, join("Cl1ent00", 99));
        match recv(&mut client) {
            ServerMessage::Start { turns, .. } => assert!(turns.is_empty()),
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn intent_before_join_is_refused() {
        let (mut client, server) = tcp_pair();
        let mut session = session();
        let conn = session.add_connection(server);
        session.handle_message(conn, intent("Cl1ent00"));
        assert_eq!(session.pending_count(), 0);
        assert!(matches!(recv(&mut client), ServerMessage::Error { .. }));
    }

    #[test]
    fn intent_under_another_client_id_is_refused() {
        let (mut client, server) = tcp_pair();
        let mut session = session();
        let conn = session.add_connection(server);
        session.handle_message(conn, join("Cl1ent00", 0));
        let _start = recv(&mut client);
        session.handle_message(conn, intent("Cl1ent99"));
        assert_eq!(session.pending_count(), 0);
        assert!(matches!(recv(&mut client), ServerMessage::Error { .. }));
    }

    #[test]
    fn message_for_another_game_is_refused() {
        let (mut client, server) = tcp_pair();
        let mut session = session();
        let conn = session.add_connection(server);
        let other = ClientMessage::join(
            GameId::new("0therG4m"),
            ClientId::new("Cl1ent00"),
            PersistentId::new("persist-1"),
            "Ada".into(),
            TurnNumber(0),
        )
        .unwrap();
        session.handle_message(conn, other);
        assert_eq!(session.joined_count(), 0);
        match recv(&mut client) {
            ServerMessage::Error { reason } => assert!(reason.contains("0therG4m")),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn rejoin_replaces_old_connection() {
        let (mut old, s1) = tcp_pair();
        let (mut new, s2) = tcp_pair();
        let mut session = session();
        let c1 = session.add_connection(s1);
        session.handle_message(c1, join("Cl1ent00", 0));
        let _start = recv(&mut old);
        session.flush_turn();
        let _turn = recv(&mut old);

        let c2 = session.add_connection(s2);
        session.handle_message(c2, join("Cl1ent00", 1));
        assert_eq!(session.connection_count(), 1);
        assert_eq!(session.joined_count(), 1);
        match read_frame(&mut old).unwrap() {
            Frame::Close { code, .. } => assert_eq!(code, CloseCode::NORMAL),
            other => panic!("expected close frame, got {other:?}"),
        }

        // The stale reader's disconnect must not unbind the new connection.
        session.remove_connection(c1);
        assert_eq!(session.joined_count(), 1);

        let _start = recv(&mut new);
        session.flush_turn();
        match recv(&mut new) {
            ServerMessage::Turn { turn } => assert_eq!(turn.turn_number, TurnNumber(1)),
            other => panic!("expected Turn, got {other:?}"),
        }
    }

    #[test]
    fn remove_connection_unbinds_client() {
        let (_client, server) = tcp_pair();
        let mut session = session();
        let conn = session.add_connection(server);
        session.handle_message(conn, join("Cl1ent00", 0));
        session.remove_connection(conn);
        assert_eq!(session.connection_count(), 0);
        assert_eq!(session.joined_count(), 0);
    }

    #[test]
    fn ping_keeps_a_connection_alive_while_silent_ones_are_closed() {
        let (mut pinger, s1) = tcp_pair();
        let (mut silent, s2) = tcp_pair();
        let mut session = session();
        let a = session.add_connection(s1);
        let b = session.add_connection(s2);
        session.handle_message(a, join("Cl1ent00", 0));
        session.handle_message(b, join("Cl1ent01", 0));
        let _start = recv(&mut pinger);
        let _start = recv(&mut silent);

        let t0 = session.last_seen(a).unwrap();
        let ping = ClientMessage::ping(ClientId::new("Cl1ent00"), GameId::new(GAME)).unwrap();
        session.touch(a, t0 + Duration::from_secs(20));
        session.handle_message(a, ping);
        assert_eq!(session.last_seen(a), Some(t0 + Duration::from_secs(20)));

        let closed = session.close_idle(t0 + Duration::from_secs(40), Duration::from_secs(30));
        assert_eq!(closed, vec![b]);
        assert_eq!(session.connection_count(), 1);
        assert_eq!(session.joined_count(), 1);
        match read_frame(&mut silent).unwrap() {
            Frame::Close { code, reason } => {
                assert_eq!(code, CloseCode::GOING_AWAY);
                assert_eq!(reason, "idle timeout");
            }
            other => panic!("expected close frame, got {other:?}"),
        }

        session.flush_turn();
        assert!(matches!(recv(&mut pinger), ServerMessage::Turn { .. }));
    }

    #[test]
    fn close_all_sends_close_code() {
        let (mut client, server) = tcp_pair();
        let mut session = session();
        let conn = session.add_connection(server);
        session.handle_message(conn, join("Cl1ent00", 0));
        let _start = recv(&mut client);
        session.close_all(CloseCode::GOING_AWAY, "shutting down");
        assert_eq!(session.connection_count(), 0);
        match read_frame(&mut client).unwrap() {
            Frame::Close { code, reason } => {
                assert_eq!(code, CloseCode::GOING_AWAY);
                assert_eq!(reason, "shutting down");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}
