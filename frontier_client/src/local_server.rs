// In-process authority for single-player games.
//
// `LocalServer` speaks the same message contract as the relay: it consumes
// serialized `ClientMessage` JSON, validates it with the same
// parse-or-reject gate, and answers with `ServerMessage`s. The client code
// above the transport cannot tell which authority it is talking to.
//
// Turn production: intents are buffered as they arrive and packaged into a
// numbered `Turn` every `turn_interval` (driven by `poll(now)`), or
// immediately on `end_turn`. Turns start at 0 and are kept so a `join` with
// `lastTurn = n` can be answered with every turn from `n` on.
//
// Nothing is delivered inline. Replies go to an outbox that the transport
// drains on its own `poll`, so state changes are applied by the game loop
// and never from inside a send call.
//
// `end_game` stops turn production; later intents are ignored.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use frontier_protocol::{
    ClientId, ClientMessage, GameId, Intent, LogSeverity, ServerMessage, Turn, TurnNumber,
    parse_client_message,
};
use log::{debug, error, info, warn};

use crate::lobby::LobbyConfig;

#[derive(Debug)]
pub struct LocalServer {
    game_id: GameId,
    game_config: serde_json::Value,
    turn_interval: Duration,
    turns: Vec<Turn>,
    intents: Vec<Intent>,
    outbox: VecDeque<ServerMessage>,
    running: bool,
    joined: bool,
    last_turn_at: Option<Instant>,
}

impl LocalServer {
    /// `game_config` is passed through opaquely in the `start` message;
    /// `None` sends `null`, which the sim reads as its default config.
    pub fn new(
        lobby: &LobbyConfig,
        game_config: Option<serde_json::Value>,
        turn_interval: Duration,
    ) -> Self {
        Self {
            game_id: lobby.game_id.clone(),
            game_config: game_config.unwrap_or(serde_json::Value::Null),
            turn_interval,
            turns: Vec::new(),
            intents: Vec::new(),
            outbox: VecDeque::new(),
            running: false,
            joined: false,
            last_turn_at: None,
        }
    }

    /// Accept intents and produce turns. The `start` message itself answers
    /// each `join`, as the relay does.
    pub fn start(&mut self) {
        info!("local server started for game {}", self.game_id);
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn pending_intents(&self) -> usize {
        self.intents.len()
    }

    /// Handle one serialized client message.
    pub fn on_message(&mut self, raw: &str) {
        let msg = match parse_client_message(raw.as_bytes()) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("local server rejected message: {e}");
                self.reject(e.to_string());
                return;
            }
        };
        if *msg.game_id() != self.game_id {
            warn!(
                "local server for {} got message for {}",
                self.game_id,
                msg.game_id()
            );
            self.reject(format!("unknown game {}", msg.game_id()));
            return;
        }

        match msg {
            ClientMessage::Join {
                username,
                last_turn,
                ..
            } => {
                info!("{username} joined local game {}", self.game_id);
                self.joined = true;
                let from = usize::try_from(last_turn.0)
                    .unwrap_or(usize::MAX)
                    .min(self.turns.len());
                self.outbox.push_back(ServerMessage::Start {
                    game_id: self.game_id.clone(),
                    config: self.game_config.clone(),
                    turns: self.turns[from..].to_vec(),
                });
            }
            ClientMessage::Intent { intent, .. } => {
                if !self.running {
                    debug!("game over, ignoring {} intent", intent.type_name());
                    return;
                }
                self.intents.push(intent);
            }
            ClientMessage::Ping { .. } => {}
            ClientMessage::Log {
                client_id,
                log,
                severity,
                ..
            } => forward_log(&client_id, severity, &log),
        }
    }

    /// End the current turn if `turn_interval` has passed since the last one.
    pub fn poll(&mut self, now: Instant) {
        if !self.running || !self.joined {
            return;
        }
        match self.last_turn_at {
            None => self.last_turn_at = Some(now),
            Some(last) if now.duration_since(last) >= self.turn_interval => {
                self.last_turn_at = Some(now);
                self.end_turn();
            }
            Some(_) => {}
        }
    }

    /// Package buffered intents into the next turn.
    pub fn end_turn(&mut self) {
        if !self.running {
            return;
        }
        let turn = Turn {
            turn_number: TurnNumber(self.turns.len() as u64),
            game_id: self.game_id.clone(),
            intents: std::mem::take(&mut self.intents),
        };
        self.outbox.push_back(ServerMessage::Turn { turn: turn.clone() });
        self.turns.push(turn);
    }

    pub fn end_game(&mut self) {
        if self.running {
            info!(
                "local game {} ended after {} turns",
                self.game_id,
                self.turns.len()
            );
        }
        self.running = false;
        self.intents.clear();
    }

    pub fn drain_outbox(&mut self) -> Vec<ServerMessage> {
        self.outbox.drain(..).collect()
    }

    fn reject(&mut self, reason: String) {
        self.outbox.push_back(ServerMessage::Error { reason });
    }
}

fn forward_log(client: &ClientId, severity: LogSeverity, log: &str) {
    match severity {
        LogSeverity::Debug => debug!("[client {client}] {log}"),
        LogSeverity::Info => info!("[client {client}] {log}"),
        LogSeverity::Warn => warn!("[client {client}] {log}"),
        LogSeverity::Error => error!("[client {client}] {log}"),
    }
}

#[cfg(test)]
mod tests {
    use frontier_protocol::{GameType, IntentAction, PersistentId, PlayerId};

    use super::*;

    fn lobby() -> LobbyConfig {
        LobbyConfig {
            client_id: ClientId::new("Cl1ent00"),
            game_id: GameId::new("G4me0001"),
            persistent_id: PersistentId::new("persist-1"),
            player_id: PlayerId::new("Pl4yer01"),
            player_name: "Ada".into(),
            game_type: GameType::Singleplayer,
        }
    }

    fn join(last_turn: u64) -> String {
        let l = lobby();
        ClientMessage::join(
            l.game_id,
            l.client_id,
            l.persistent_id,
            l.player_name,
            TurnNumber(last_turn),
        )
        .unwrap()
        .to_json()
        .unwrap()
    }

    fn target_intent() -> String {
        let l = lobby();
        let intent = Intent::new(
            l.client_id.clone(),
            IntentAction::TargetPlayer {
                requestor: l.player_id.clone(),
                target: PlayerId::new("Pl4yer02"),
            },
        );
        ClientMessage::intent(l.client_id, l.game_id, intent)
            .unwrap()
            .to_json()
            .unwrap()
    }

    fn server() -> LocalServer {
        let mut server = LocalServer::new(
            &lobby(),
            Some(serde_json::json!({"boat_max_number": 2})),
            Duration::from_millis(100),
        );
        server.start();
        server
    }

    #[test]
    fn join_answers_with_start_and_config() {
        let mut server = server();
        server.on_message(&join(0));
        let out = server.drain_outbox();
        assert_eq!(out.len(), 1);
        match &out[0] {
            ServerMessage::Start { config, turns, .. } => {
                assert_eq!(config["boat_max_number"], 2);
                assert!(turns.is_empty());
            }
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn start_replies_only_to_join() {
        let mut server = server();
        assert!(server.is_running());
        assert!(server.drain_outbox().is_empty());

        server.on_message(&join(0));
        server.on_message(&join(0));
        let out = server.drain_outbox();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|m| matches!(m, ServerMessage::Start { .. })));
    }

    #[test]
    fn intents_are_batched_into_numbered_turns() {
        let mut server = server();
        server.on_message(&join(0));
        server.on_message(&target_intent());
        server.on_message(&target_intent());
        server.end_turn();
        server.end_turn();
        let out = server.drain_outbox();
        let turns: Vec<&Turn> = out
            .iter()
            .filter_map(|m| match m {
                ServerMessage::Turn { turn } => Some(turn),
                _ => None,
            })
            .collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].turn_number, TurnNumber(0));
        assert_eq!(turns[0].intents.len(), 2);
        assert_eq!(turns[1].turn_number, TurnNumber(1));
        assert!(turns[1].intents.is_empty());
    }

    #[test]
    fn rejoin_replays_from_last_turn() {
        let mut server = server();
        server.on_message(&join(0));
        for _ in 0..3 {
            server.end_turn();
        }
        server.drain_outbox();
        server.on_message(&join(1));
        match server.drain_outbox().as_slice() {
            [ServerMessage::Start { turns, .. }] => {
                let numbers: Vec<u64> = turns.iter().map(|t| t.turn_number.0).collect();
                assert_eq!(numbers, vec![1, 2]);
            }
            other => panic!("expected one start, got {other:?}"),
        }
    }

    #[test]
    fn turn_timer_runs_only_after_join() {
        let mut server = server();
        let t0 = Instant::now();
        server.poll(t0);
        server.poll(t0 + Duration::from_secs(1));
        assert!(server.turns().is_empty());

        server.on_message(&join(0));
        server.poll(t0 + Duration::from_secs(1));
        server.poll(t0 + Duration::from_millis(1050));
        assert!(server.turns().is_empty());
        server.poll(t0 + Duration::from_millis(1100));
        assert_eq!(server.turns().len(), 1);
    }

    #[test]
    fn invalid_messages_get_an_error_reply() {
        let mut server = server();
        server.on_message("{\"type\":\"bogus\"}");
        server.on_message("not json");
        let out = server.drain_outbox();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|m| matches!(m, ServerMessage::Error { .. })));
    }

    #[test]
    fn end_game_stops_turns_and_drops_intents() {
        let mut server = server();
        server.on_message(&join(0));
        server.on_message(&target_intent());
        server.end_game();
        assert!(!server.is_running());
        server.on_message(&target_intent());
        server.end_turn();
        assert_eq!(server.pending_intents(), 0);
        assert!(server.turns().is_empty());
    }
}
