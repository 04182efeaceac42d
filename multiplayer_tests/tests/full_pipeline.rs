// End-to-end integration tests for the multiplayer pipeline.
//
// Each remote test starts a real relay, connects real transports (through
// `TestGameClient`), and verifies the full path:
// UI event -> transport -> relay -> turn -> SimState -> identical worlds.
// The single-player test runs the same client code against the in-process
// authority instead.
//
// These tests exercise the same code paths as the live game; the only
// test-specific code is the synchronous polling in `TestGameClient`.

use std::thread;
use std::time::Duration;

use frontier_client::{ReadyState, SendBoatAttackIntentEvent, SendSpawnIntentEvent};
use frontier_protocol::{GameId, GameType, PlayerId};
use frontier_relay::server::{RelayConfig, RelayHandle, start_relay};
use frontier_sim::event::SimEventKind;
use frontier_sim::map::GameMap;
use frontier_sim::types::UnitType;
use frontier_sim::{GameConfig, SimState};
use multiplayer_tests::{TestGameClient, assert_replicas_agree, lobby, poll_all_until_turns};

const GAME: &str = "G4me0001";

const MAP: &[&str] = &[
    "......~~~~~~......",
    "......~~~~~~......",
    "...~~~~~~~~~~~~...",
    "......~~..~~......",
    "......~~..~~......",
    "...~~~~~~~~~~~~...",
    "......~~~~~~......",
];

/// Long enough that spawns sent right after joining land inside it.
const SPAWN_PHASE_TURNS: u64 = 40;

fn game_config() -> GameConfig {
    GameConfig {
        num_spawn_phase_turns: SPAWN_PHASE_TURNS,
        starting_troops: 200,
        ..GameConfig::default()
    }
}

fn start_test_relay() -> (RelayHandle, std::net::SocketAddr) {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = RelayConfig {
        port: 0,
        game_id: GameId::new(GAME),
        turn_interval: Duration::from_millis(10),
        game_config: game_config().to_value(),
        ..RelayConfig::default()
    };
    start_relay(config).unwrap()
}

fn has_player(client: &TestGameClient, id: &str) -> bool {
    client
        .sim
        .as_ref()
        .is_some_and(|sim| sim.world().player_by_id(&PlayerId::new(id)).is_some())
}

fn built_transport_ship(client: &TestGameClient) -> bool {
    client.events.iter().any(|e| {
        matches!(
            e.kind,
            SimEventKind::UnitBuilt {
                unit_type: UnitType::TransportShip,
                ..
            }
        )
    })
}

/// Spawn both players, then send a boat from the first one.
fn play_opening(alice: &mut TestGameClient, bob: &mut TestGameClient) {
    alice.bus().emit(&SendSpawnIntentEvent { x: 2, y: 1 });
    bob.bus().emit(&SendSpawnIntentEvent { x: 15, y: 1 });
    alice.poll_until("alice spawned", |c| has_player(c, "PlayerAA"));
    alice.bus().emit(&SendBoatAttackIntentEvent {
        target_id: None,
        x: 12,
        y: 1,
        troops: Some(50),
    });
}

#[test]
fn two_clients_stay_in_lockstep() {
    let (handle, addr) = start_test_relay();
    let map = GameMap::from_ascii(MAP);
    let mut alice = TestGameClient::remote(
        addr,
        lobby("Cl1entAA", "PlayerAA", GAME, GameType::Public),
        map.clone(),
    );
    let mut bob = TestGameClient::remote(
        addr,
        lobby("Cl1entBB", "PlayerBB", GAME, GameType::Public),
        map,
    );
    alice.poll_until_open();
    bob.poll_until_open();

    play_opening(&mut alice, &mut bob);
    poll_all_until_turns(&mut [&mut alice, &mut bob], SPAWN_PHASE_TURNS + 80);

    let compared = assert_replicas_agree(&alice, &bob);
    assert!(compared as u64 >= SPAWN_PHASE_TURNS + 80);
    assert!(has_player(&bob, "PlayerAA"));
    assert!(has_player(&alice, "PlayerBB"));
    assert!(built_transport_ship(&alice), "boat never launched");

    let shared = alice.events.len().min(bob.events.len());
    assert_eq!(alice.events[..shared], bob.events[..shared]);
    assert!(alice.errors.is_empty(), "errors: {:?}", alice.errors);

    handle.stop();
}

#[test]
fn late_joiner_replays_history_to_the_same_world() {
    let (handle, addr) = start_test_relay();
    let map = GameMap::from_ascii(MAP);
    let mut alice = TestGameClient::remote(
        addr,
        lobby("Cl1entAA", "PlayerAA", GAME, GameType::Public),
        map.clone(),
    );
    let mut bob = TestGameClient::remote(
        addr,
        lobby("Cl1entBB", "PlayerBB", GAME, GameType::Public),
        map.clone(),
    );
    alice.poll_until_open();
    bob.poll_until_open();
    play_opening(&mut alice, &mut bob);
    poll_all_until_turns(&mut [&mut alice, &mut bob], SPAWN_PHASE_TURNS + 20);

    // Bob's replacement rejoins from turn 0 and rebuilds from the replay.
    drop(bob);
    let mut bob = TestGameClient::remote(
        addr,
        lobby("Cl1entBB", "PlayerBB", GAME, GameType::Public),
        map,
    );
    bob.poll_until_open();
    let caught_up = alice.turns_applied();
    poll_all_until_turns(&mut [&mut alice, &mut bob], caught_up + 10);

    let compared = assert_replicas_agree(&alice, &bob);
    assert!(compared as u64 >= caught_up);
    assert_eq!(bob.joins(), 1);

    handle.stop();
}

#[test]
fn leave_game_closes_and_stays_closed() {
    let (handle, addr) = start_test_relay();
    let mut alice = TestGameClient::remote(
        addr,
        lobby("Cl1entAA", "PlayerAA", GAME, GameType::Public),
        GameMap::from_ascii(MAP),
    );
    alice.poll_until_open();
    alice.poll_until_turns(3);

    alice.leave();
    alice.poll_until("closed socket", |c| {
        c.transport().ready_state() == ReadyState::Closed
    });
    let applied = alice.turns_applied();
    for _ in 0..20 {
        alice.poll_once();
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(alice.transport().ready_state(), ReadyState::Closed);
    assert_eq!(alice.turns_applied(), applied);
    assert_eq!(alice.joins(), 1, "leaving must not reconnect");
    assert!(alice.transport().cancellation_token().is_cancelled());

    handle.stop();
}

#[test]
fn relay_shutdown_triggers_reconnect_attempts() {
    let (handle, addr) = start_test_relay();
    let mut alice = TestGameClient::remote(
        addr,
        lobby("Cl1entAA", "PlayerAA", GAME, GameType::Public),
        GameMap::from_ascii(MAP),
    );
    alice.poll_until_open();

    // Going-away is not an intentional leave, so the transport keeps trying.
    handle.stop();
    alice.poll_until("socket to leave open state", |c| {
        c.transport().ready_state() != ReadyState::Open
    });
    assert!(!alice.transport().cancellation_token().is_cancelled());
    alice.leave();
}

#[test]
fn single_player_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = GameConfig {
        num_spawn_phase_turns: 10,
        ..game_config()
    };
    let map = GameMap::from_ascii(MAP);
    let mut solo = TestGameClient::local(
        lobby("Cl1entAA", "PlayerAA", GAME, GameType::Singleplayer),
        &config,
        map.clone(),
    );
    assert!(solo.transport().is_local());

    solo.poll_until_turns(1);
    solo.bus().emit(&SendSpawnIntentEvent { x: 2, y: 1 });
    solo.poll_until("spawn", |c| has_player(c, "PlayerAA"));
    solo.bus().emit(&SendBoatAttackIntentEvent {
        target_id: None,
        x: 12,
        y: 1,
        troops: Some(50),
    });
    solo.poll_until("boat", built_transport_ship);
    let applied = solo.turns_applied();

    // A fresh replica fed the authority's history reaches the same world.
    let turns = solo
        .transport()
        .with_local_server(|server| server.turns()[..applied as usize].to_vec())
        .unwrap();
    let mut replica = SimState::new(map, config);
    for turn in &turns {
        replica.apply_turn(turn);
    }
    assert_eq!(
        replica.world_json().unwrap(),
        solo.snapshots[&(applied - 1)]
    );

    solo.leave();
    let running = solo
        .transport()
        .with_local_server(|server| server.is_running())
        .unwrap();
    assert!(!running);
}
