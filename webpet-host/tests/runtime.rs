//! The async driver under paused tokio time.
//!
//! `start_paused` makes the tokio clock jump straight to the next timer once
//! every task is idle, so an hour of pet life runs in microseconds.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

use webpet_core::events::SoundCue;
use webpet_core::{
    Action, Activity, EngineEvent, Gate, MemoryStore, PetStore, SettingsBus, SettingsWriter,
    WebPetConfig,
};
use webpet_host::{RunningPet, VoiceOutcome, spawn};
use webpet_llm::types::GenerateRequest;
use webpet_llm::{ApiStatus, ChatBackend, ChatError, ChatSettings, NoBackend, ReplySource};

/// Replies "Woof!" once it has a credential.
#[derive(Default)]
struct Echo {
    key: Option<String>,
}

impl ChatBackend for Echo {
    async fn generate(&self, _request: &GenerateRequest) -> Result<String, ChatError> {
        Ok("Woof!".into())
    }

    fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    fn set_api_key(&mut self, key: Option<String>) {
        self.key = key;
    }
}

fn config() -> WebPetConfig {
    WebPetConfig {
        rng_seed: Some(42),
        ..WebPetConfig::default()
    }
}

fn start<B: ChatBackend + 'static>(
    store: &Arc<MemoryStore>,
    backend: B,
    bus: &SettingsBus,
) -> RunningPet<MemoryStore, B> {
    spawn(
        config(),
        Arc::clone(store),
        backend,
        ChatSettings::default(),
        bus,
    )
}

fn drain(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn hunger_drains_on_the_wall_clock() {
    let store = Arc::new(MemoryStore::new());
    let bus = SettingsBus::default();
    let running = start(&store, NoBackend, &bus);

    sleep(Duration::from_secs(59)).await;
    assert_eq!(running.handle.snapshot().await.expect("snapshot").state.hunger, 100);

    sleep(Duration::from_secs(2)).await;
    let snap = running.handle.snapshot().await.expect("snapshot");
    assert_eq!(snap.state.hunger, 99);
    assert!(snap.now_ms >= 61_000);

    let stored = store.load_state().expect("load").expect("saved");
    assert_eq!(stored.state.hunger, 99);
}

#[tokio::test(start_paused = true)]
async fn work_reverts_to_idle_after_the_delay() {
    let store = Arc::new(MemoryStore::new());
    let bus = SettingsBus::default();
    let running = start(&store, NoBackend, &bus);

    assert_eq!(
        running.handle.perform(Action::Work).await.expect("perform"),
        Gate::Allowed
    );
    assert_eq!(
        running.handle.snapshot().await.expect("snapshot").activity,
        Activity::Working
    );

    sleep(Duration::from_millis(3_100)).await;
    let snap = running.handle.snapshot().await.expect("snapshot");
    assert_eq!(snap.activity, Activity::Idle);
    assert!(snap.state.coins > 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_pet_falls_asleep_and_refuses_work() {
    let store = Arc::new(MemoryStore::with_raw_state(r#"{"name":"Rex","energy":5}"#, 1));
    let bus = SettingsBus::default();
    let running = start(&store, NoBackend, &bus);

    sleep(Duration::from_millis(5_050)).await;
    assert_eq!(
        running.handle.snapshot().await.expect("snapshot").activity,
        Activity::Sleeping
    );
    assert_eq!(
        running.handle.perform(Action::Work).await.expect("perform"),
        Gate::Asleep
    );
}

#[tokio::test(start_paused = true)]
async fn rename_from_settings_reaches_the_running_pet() {
    let store = Arc::new(MemoryStore::new());
    let bus = SettingsBus::default();
    let running = start(&store, NoBackend, &bus);
    let writer = SettingsWriter::new(Arc::clone(&store), bus.clone());

    writer.rename_pet("Rex").expect("rename");
    sleep(Duration::from_millis(1)).await;
    assert_eq!(
        running.handle.snapshot().await.expect("snapshot").state.name,
        "Rex"
    );

    // The engine's next save builds on the rename instead of clobbering it.
    running.handle.perform(Action::Pet).await.expect("perform");
    let stored = store.load_state().expect("load").expect("saved");
    assert_eq!(stored.state.name, "Rex");
}

#[tokio::test(start_paused = true)]
async fn chat_falls_back_locally_and_barks() {
    let store = Arc::new(MemoryStore::new());
    let bus = SettingsBus::default();
    let mut running = start(&store, NoBackend, &bus);
    drain(&mut running.events);

    let reply = running
        .handle
        .chat("what is your name?")
        .await
        .expect("chat")
        .expect("reply");
    assert_eq!(reply.source, ReplySource::Fallback);
    assert!(reply.text.contains("Buddy"));

    running.handle.snapshot().await.expect("snapshot");
    let events = drain(&mut running.events);
    assert!(events.contains(&EngineEvent::Sound(SoundCue::Bark)));
    assert_eq!(running.handle.chat_history().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn voice_routes_to_actions_greetings_and_chat() {
    let store = Arc::new(MemoryStore::new());
    let bus = SettingsBus::default();
    let running = start(&store, NoBackend, &bus);

    assert_eq!(
        running.handle.voice("time to feed you").await.expect("voice"),
        VoiceOutcome::Acted(Action::Feed, Gate::Allowed)
    );
    assert_eq!(
        running.handle.voice("Hello!").await.expect("voice"),
        VoiceOutcome::Greeted
    );
    match running.handle.voice("tell me a story").await.expect("voice") {
        VoiceOutcome::Chatted(Some(reply)) => assert_eq!(reply.source, ReplySource::Fallback),
        other => panic!("expected a chat reply, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn credential_from_settings_switches_chat_to_backend() {
    let store = Arc::new(MemoryStore::new());
    let bus = SettingsBus::default();
    let running = start(&store, Echo::default(), &bus);
    assert_eq!(running.handle.api_status().await, ApiStatus::Unconfigured);

    let writer = SettingsWriter::new(Arc::clone(&store), bus.clone());
    writer.set_api_key("secret").expect("set key");
    sleep(Duration::from_millis(1)).await;

    assert_eq!(running.handle.api_status().await, ApiStatus::Connected);
    let reply = running.handle.chat("hi").await.expect("chat").expect("reply");
    assert_eq!(reply.source, ReplySource::Backend);
    assert_eq!(reply.text, "Woof!");
}

#[tokio::test(start_paused = true)]
async fn stored_credential_is_loaded_at_start() {
    let store = Arc::new(MemoryStore::new());
    store.save_api_key("secret").expect("save key");
    let bus = SettingsBus::default();
    let running = start(&store, Echo::default(), &bus);

    let reply = running.handle.chat("hi").await.expect("chat").expect("reply");
    assert_eq!(reply.source, ReplySource::Backend);
}

#[tokio::test(start_paused = true)]
async fn engine_stops_when_the_last_handle_drops() {
    let store = Arc::new(MemoryStore::new());
    let bus = SettingsBus::default();
    let RunningPet {
        handle,
        mut events,
        task,
        watcher,
    } = start(&store, NoBackend, &bus);

    let other = handle.clone();
    drop(handle);
    other.greet().await.expect("still running");
    drop(other);

    task.await.expect("engine task");
    drain(&mut events);
    assert!(events.recv().await.is_none());
    watcher.abort();
}
