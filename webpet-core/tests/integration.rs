//! Integration tests: end-to-end pet flows through the public engine API.
//!
//! Action effects, sleep/wake cycles, stale reverts, settings merges and
//! restarts against both store backends.

use std::sync::Arc;

use webpet_core::activity::Activity;
use webpet_core::config::{PersistenceConfig, WebPetConfig};
use webpet_core::events::{EngineEvent, RecordingSink};
use webpet_core::persistence::{MemoryStore, PetStore, SqliteStore};
use webpet_core::settings::{SettingsBus, SettingsEvent, SettingsWriter};
use webpet_core::state::PetState;
use webpet_core::{Gate, PetEngine};

fn config() -> WebPetConfig {
    WebPetConfig {
        rng_seed: Some(42),
        ..WebPetConfig::default()
    }
}

fn engine_with(state: PetState) -> (PetEngine<Arc<MemoryStore>, RecordingSink>, Arc<MemoryStore>, RecordingSink) {
    let store = Arc::new(MemoryStore::new());
    store.save_state(&state, 1).expect("seed");
    let sink = RecordingSink::new();
    let engine = PetEngine::load(config(), Arc::clone(&store), sink.clone());
    sink.drain();
    (engine, store, sink)
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[test]
fn work_from_half_energy_then_revert() {
    let (mut engine, store, sink) = engine_with(PetState {
        energy: 50,
        ..PetState::default()
    });

    assert_eq!(engine.work(), Gate::Allowed);
    let state = engine.state();
    assert_eq!(state.productivity, 10);
    assert_eq!(state.energy, 40);
    assert_eq!(state.happiness, 95);
    assert_eq!(state.hunger, 95);
    assert_eq!(state.coins, 5);
    assert_eq!(engine.activity(), Activity::Working);
    assert!(
        sink.notifications()
            .contains(&"Work completed! Earned 5 coins!".to_string())
    );

    engine.advance(2_999);
    assert_eq!(engine.activity(), Activity::Working);
    engine.advance(1);
    assert_eq!(engine.activity(), Activity::Idle);

    let stored = store.load_state().expect("load").expect("Some");
    assert_eq!(stored.state.coins, 5);
}

#[test]
fn work_while_sleeping_is_rejected_without_change() {
    let (mut engine, _, sink) = engine_with(PetState {
        energy: 5,
        ..PetState::named("Rex")
    });
    engine.advance(5_000);
    assert_eq!(engine.activity(), Activity::Sleeping);
    let before = engine.state().clone();
    sink.drain();

    assert_eq!(engine.work(), Gate::Asleep);
    assert_eq!(*engine.state(), before);
    assert_eq!(
        sink.notifications(),
        vec!["Rex is sleeping. Let me rest!".to_string()]
    );
}

#[test]
fn too_tired_to_work_falls_asleep() {
    let (mut engine, _, sink) = engine_with(PetState {
        energy: 8,
        ..PetState::named("Rex")
    });

    assert_eq!(engine.work(), Gate::TooTired);
    assert_eq!(engine.activity(), Activity::Sleeping);
    assert_eq!(engine.state().coins, 0);
    assert_eq!(
        sink.notifications(),
        vec![
            "Your pet is too tired to work!".to_string(),
            "Rex is too tired and fell asleep!".to_string(),
        ]
    );
}

#[test]
fn feed_while_sleeping_wakes_then_eats() {
    let (mut engine, _, sink) = engine_with(PetState {
        energy: 5,
        hunger: 50,
        ..PetState::default()
    });
    engine.advance(5_000);
    assert_eq!(engine.activity(), Activity::Sleeping);
    sink.drain();

    assert_eq!(engine.feed(), Gate::Allowed);
    assert_eq!(
        sink.transitions(),
        vec![
            (Activity::Sleeping, Activity::Idle),
            (Activity::Idle, Activity::Eating)
        ]
    );
    assert_eq!(engine.activity(), Activity::Eating);
    assert_eq!(engine.state().hunger, 80);
    assert_eq!(engine.state().energy, 15);
    assert!(!engine.recharge_active());

    engine.advance(3_000);
    assert_eq!(engine.activity(), Activity::Idle);
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[test]
fn hunger_tick_then_happiness_penalty() {
    let (mut engine, _, _) = engine_with(PetState {
        hunger: 25,
        ..PetState::default()
    });

    engine.advance(60_000);
    assert_eq!(engine.state().hunger, 24);
    assert_eq!(engine.state().happiness, 100);

    engine.advance(4 * 60_000);
    assert_eq!(engine.state().hunger, 20);
    assert_eq!(engine.state().happiness, 100);

    engine.advance(60_000);
    assert_eq!(engine.state().hunger, 19);
    assert_eq!(engine.state().happiness, 98);

    engine.advance(60_000);
    assert_eq!(engine.state().happiness, 96);
}

#[test]
fn recharge_wakes_exactly_once_and_stops() {
    let (mut engine, _, sink) = engine_with(PetState {
        energy: 5,
        ..PetState::named("Rex")
    });

    engine.advance(5_000);
    assert_eq!(engine.activity(), Activity::Sleeping);
    assert!(engine.recharge_active());
    assert_eq!(engine.recharge_timer_count(), 1);

    engine.advance(15_000);
    assert_eq!(engine.activity(), Activity::Idle);
    assert_eq!(engine.state().energy, 100);
    assert!(!engine.recharge_active());
    assert_eq!(engine.recharge_timer_count(), 0);

    let wakes = sink
        .transitions()
        .into_iter()
        .filter(|t| *t == (Activity::Sleeping, Activity::Idle))
        .count();
    assert_eq!(wakes, 1);
    let refreshed = sink
        .notifications()
        .into_iter()
        .filter(|m| m == "Rex woke up feeling refreshed!")
        .count();
    assert_eq!(refreshed, 1);
}

#[test]
fn stale_revert_does_not_wake_a_sleeping_pet() {
    let (mut engine, _, _) = engine_with(PetState {
        energy: 15,
        ..PetState::default()
    });

    assert_eq!(engine.work(), Gate::Allowed);
    assert_eq!(engine.state().energy, 5);
    assert_eq!(engine.activity(), Activity::Working);

    engine.advance(1_000);
    assert_eq!(engine.play(), Gate::TooTired);
    assert_eq!(engine.activity(), Activity::Sleeping);

    engine.advance(2_500);
    assert_eq!(engine.activity(), Activity::Sleeping);
}

#[test]
fn at_most_one_recharge_timer() {
    let (mut engine, _, _) = engine_with(PetState {
        energy: 3,
        ..PetState::default()
    });
    engine.play();
    engine.work();
    engine.advance(5_000);
    assert_eq!(engine.activity(), Activity::Sleeping);
    assert_eq!(engine.recharge_timer_count(), 1);
}

// ---------------------------------------------------------------------------
// Settings merge
// ---------------------------------------------------------------------------

#[test]
fn external_rename_is_merged() {
    let (mut engine, store, sink) = engine_with(PetState::default());
    let bus = SettingsBus::default();
    let mut rx = bus.subscribe();
    let writer = SettingsWriter::new(Arc::clone(&store), bus);

    writer.rename_pet("Rex").expect("rename");
    while let Ok(event) = rx.try_recv() {
        engine.handle_settings(&event);
    }

    assert_eq!(engine.state().name, "Rex");
    assert_eq!(engine.revision(), 2);
    assert!(
        sink.events()
            .iter()
            .any(|e| matches!(e, EngineEvent::StateChanged(s) if s.name == "Rex"))
    );

    engine.pet();
    let stored = store.load_state().expect("load").expect("Some");
    assert_eq!(stored.state.name, "Rex");
    assert_eq!(stored.revision, 3);
}

#[test]
fn stale_save_never_clobbers_external_rename() {
    let (mut engine, store, _) = engine_with(PetState {
        energy: 50,
        ..PetState::default()
    });
    let bus = SettingsBus::default();
    let mut rx = bus.subscribe();
    let writer = SettingsWriter::new(Arc::clone(&store), bus);

    // The rename lands in the store before the engine hears about it.
    writer.rename_pet("Rex").expect("rename");
    engine.work();

    let stored = store.load_state().expect("load").expect("Some");
    assert_eq!(stored.state.name, "Rex");
    assert_eq!(stored.state.coins, 5);
    assert_eq!(engine.state().name, "Rex");

    // The late announcement is older than what the engine now holds.
    while let Ok(event) = rx.try_recv() {
        if let SettingsEvent::Store(change) = &event {
            assert!(!engine.apply_store_change(change));
        }
    }
    assert_eq!(engine.revision(), stored.revision);
}

// ---------------------------------------------------------------------------
// Restart
// ---------------------------------------------------------------------------

#[test]
fn sqlite_restart_restores_state_but_not_activity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pet.db");
    let persistence = PersistenceConfig::default();

    {
        let store = SqliteStore::open(&path, &persistence).expect("open");
        let mut engine = PetEngine::load(config(), store, RecordingSink::new());
        engine.work();
        engine.feed();
        assert_eq!(engine.activity(), Activity::Eating);
    }

    let store = SqliteStore::open(&path, &persistence).expect("reopen");
    let engine = PetEngine::load(config(), store, RecordingSink::new());
    assert_eq!(engine.activity(), Activity::Idle);
    assert_eq!(engine.state().coins, 5);
    assert_eq!(engine.state().productivity, 10);
    assert_eq!(engine.revision(), 2);
}

#[test]
fn corrupt_snapshot_starts_fresh() {
    let store = MemoryStore::with_raw_state("{not json", 3);
    let engine = PetEngine::load(config(), store, RecordingSink::new());
    assert_eq!(*engine.state(), PetState::default());
    assert_eq!(engine.revision(), 0);
}

#[test]
fn corrupt_snapshot_is_overwritten_by_the_next_save() {
    let store = Arc::new(MemoryStore::with_raw_state("{not json", 3));
    let mut engine = PetEngine::load(config(), Arc::clone(&store), RecordingSink::new());
    assert_eq!(engine.work(), Gate::Allowed);

    assert!(store.write_count() > 0);
    assert_eq!(engine.revision(), 4);
    let stored = store.load_state().expect("readable again").expect("saved");
    assert_eq!(stored.revision, 4);
    assert_eq!(stored.state.coins, 5);

    engine.feed();
    let reloaded = PetEngine::load(config(), Arc::clone(&store), RecordingSink::new());
    assert_eq!(reloaded.state(), engine.state());
    assert_eq!(reloaded.revision(), 5);
}
