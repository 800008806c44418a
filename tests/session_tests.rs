//! Session dispatcher integration tests covering auth/move/turn dispatch
//! and cooldown refusal.

use std::sync::Arc;

use dungeon_world::chunkgen::GeneratorVersion;
use dungeon_world::discovery::InMemoryDiscoveryStore;
use dungeon_world::protocol::{ClientEnvelope, Dir4, ServerMessage};
use dungeon_world::session::{Session, SessionDeps};
use dungeon_world::storage::{
    CharacterRecord, InMemoryCharacterStore, InMemorySessionStore, InMemoryWorldRecordStore,
    WorldRecord,
};
use dungeon_world::time::FakeClock;
use dungeon_world::world::WorldModel;

fn envelope(seq: i64, kind: &str, payload: serde_json::Value) -> ClientEnvelope {
    serde_json::from_value(serde_json::json!({"seq": seq, "type": kind, "payload": payload})).unwrap()
}

fn make_deps(clock: Arc<FakeClock>) -> (SessionDeps, Arc<InMemoryCharacterStore>) {
    let sessions = Arc::new(InMemorySessionStore::new());
    sessions.insert("tok-1", "user-1");

    let characters = Arc::new(InMemoryCharacterStore::new());
    characters.seed_character(
        "user-1",
        CharacterRecord {
            character_id: "char-1".to_string(),
            world_id: "world-1".to_string(),
            level: 1,
            x: 0,
            y: 0,
            face: Dir4::N,
            hp: 10,
        },
    );

    let worlds = Arc::new(InMemoryWorldRecordStore::new());
    worlds.insert(
        "world-1",
        WorldRecord {
            seed: 42,
            generator_version: GeneratorVersion::Maze,
        },
    );

    let deps = SessionDeps {
        clock,
        sessions,
        characters: characters.clone(),
        worlds,
        discovery: Arc::new(InMemoryDiscoveryStore::new()),
        world_seed_override: None,
        move_cooldown_ms: 500,
        turn_cooldown_ms: 150,
    };
    (deps, characters)
}

#[test]
fn unauthenticated_message_other_than_auth_is_refused() {
    let clock = Arc::new(FakeClock::new(0));
    let (deps, _) = make_deps(clock);
    let world = WorldModel::new(42, GeneratorVersion::Maze);
    let mut session = Session::new();

    let replies = session
        .handle(&deps, &world, envelope(0, "move", serde_json::json!({"dir": "N"})))
        .unwrap();
    assert!(matches!(replies[0], ServerMessage::AuthErr(_)));
}

#[test]
fn auth_then_move_yields_action_result_and_world_state() {
    let clock = Arc::new(FakeClock::new(1_000));
    let (deps, _) = make_deps(clock);
    let world = WorldModel::new(42, GeneratorVersion::Maze);
    let mut session = Session::new();

    let auth_replies = session
        .handle(
            &deps,
            &world,
            envelope(0, "auth", serde_json::json!({"session_token": "tok-1"})),
        )
        .unwrap();
    assert!(matches!(auth_replies[0], ServerMessage::AuthOk(_)));

    // Hub's east edge is always open, so a move east must succeed.
    let move_replies = session
        .handle(&deps, &world, envelope(1, "move", serde_json::json!({"dir": "E"})))
        .unwrap();
    let ServerMessage::ActionResult(result) = &move_replies[0] else {
        panic!("expected action_result");
    };
    assert!(result.ok);
    assert!(matches!(move_replies.get(1), Some(ServerMessage::WorldState(_))));
}

#[test]
fn second_move_within_cooldown_window_is_refused() {
    let clock = Arc::new(FakeClock::new(1_000));
    let (deps, _) = make_deps(clock.clone());
    let world = WorldModel::new(42, GeneratorVersion::Maze);
    let mut session = Session::new();

    session
        .handle(
            &deps,
            &world,
            envelope(0, "auth", serde_json::json!({"session_token": "tok-1"})),
        )
        .unwrap();

    let first = session
        .handle(&deps, &world, envelope(1, "move", serde_json::json!({"dir": "E"})))
        .unwrap();
    assert!(matches!(&first[0], ServerMessage::ActionResult(r) if r.ok));

    clock.advance(100);
    let second = session
        .handle(&deps, &world, envelope(2, "move", serde_json::json!({"dir": "E"})))
        .unwrap();
    let ServerMessage::ActionResult(result) = &second[0] else {
        panic!("expected action_result");
    };
    assert!(!result.ok);
}

#[test]
fn unknown_type_is_bad_schema_even_when_unauthenticated() {
    let clock = Arc::new(FakeClock::new(0));
    let (deps, _) = make_deps(clock);
    let world = WorldModel::new(42, GeneratorVersion::Maze);
    let mut session = Session::new();

    let replies = session
        .handle(&deps, &world, envelope(0, "teleport", serde_json::json!({})))
        .unwrap();
    let ServerMessage::Error(err) = &replies[0] else {
        panic!("expected error");
    };
    assert_eq!(err.code, "bad_schema");
}

#[test]
fn move_payload_with_unknown_field_is_rejected_as_bad_schema() {
    let clock = Arc::new(FakeClock::new(1_000));
    let (deps, _) = make_deps(clock);
    let world = WorldModel::new(42, GeneratorVersion::Maze);
    let mut session = Session::new();

    session
        .handle(
            &deps,
            &world,
            envelope(0, "auth", serde_json::json!({"session_token": "tok-1"})),
        )
        .unwrap();

    let replies = session
        .handle(
            &deps,
            &world,
            envelope(1, "move", serde_json::json!({"dir": "N", "speed": 9000})),
        )
        .unwrap();
    let ServerMessage::Error(err) = &replies[0] else {
        panic!("expected error");
    };
    assert_eq!(err.code, "bad_schema");
}

#[test]
fn non_monotonic_seq_is_rejected_with_bad_seq() {
    let clock = Arc::new(FakeClock::new(0));
    let (deps, _) = make_deps(clock);
    let world = WorldModel::new(42, GeneratorVersion::Maze);
    let mut session = Session::new();

    session
        .handle(
            &deps,
            &world,
            envelope(5, "auth", serde_json::json!({"session_token": "tok-1"})),
        )
        .unwrap();

    let replies = session
        .handle(&deps, &world, envelope(5, "turn", serde_json::json!({"face": "E"})))
        .unwrap();
    let ServerMessage::Error(err) = &replies[0] else {
        panic!("expected error");
    };
    assert_eq!(err.code, "bad_seq");
}
