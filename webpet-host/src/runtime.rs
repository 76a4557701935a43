//! Async driver: runs a [`PetEngine`] on a tokio task against the real clock.
//!
//! The engine task owns the engine outright. It sleeps until the next timer
//! is due, wakes early for commands and settings events, and always advances
//! virtual time to "now" before touching the pet, so timers and commands are
//! applied in the order they happened.
//!
//! Chat runs on the caller's task. It only borrows a snapshot from the engine
//! and reports back with a bark, so a slow backend never stalls the pet.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use webpet_core::events::SoundCue;
use webpet_core::settings::{SettingKey, SettingsBus, SettingsEvent, SettingsMessage, StoreChange};
use webpet_core::{Action, Activity, EngineEvent, EventSink, Friend, Gate, PetEngine, PetState, PetStore, Reward};
use webpet_llm::{ApiStatus, ChatBackend, ChatSession, PetSnapshot, Reply};

use crate::commands::{Intent, route_voice};
use crate::error::{HostError, Result};

/// Forwards engine events to an unbounded channel; never blocks the engine.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelSink {
    /// A sink and the receiver for its events.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: EngineEvent) {
        // A dropped receiver just means nobody is watching.
        let _ = self.tx.send(event);
    }
}

/// The pet as seen from outside the engine task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Persisted attributes.
    pub state: PetState,
    /// Current activity.
    pub activity: Activity,
    /// Engine time in ms since start.
    pub now_ms: u64,
}

/// What a voice transcript ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// An action ran (or was rejected).
    Acted(Action, Gate),
    /// The pet said hello.
    Greeted,
    /// The text went to chat.
    Chatted(Option<Reply>),
}

enum Command {
    Perform(Action, oneshot::Sender<Gate>),
    Greet,
    Reward(Reward),
    AddFriend(Friend),
    VisitFriend(String),
    Sound(SoundCue),
    Snapshot(oneshot::Sender<Snapshot>),
}

const COMMAND_BUFFER: usize = 64;

/// Owns the engine and its inboxes.
struct Driver<S, E> {
    engine: PetEngine<S, E>,
    commands: mpsc::Receiver<Command>,
    settings: Option<broadcast::Receiver<SettingsEvent>>,
    origin: Instant,
}

impl<S: PetStore, E: EventSink> Driver<S, E> {
    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn catch_up(&mut self) {
        let now = self.elapsed_ms();
        self.engine.advance_to(now);
    }

    async fn run(mut self) {
        info!(id = %self.engine.id(), "Pet engine task started");
        loop {
            let deadline = self
                .engine
                .next_due()
                .map(|due| self.origin + Duration::from_millis(due));

            tokio::select! {
                () = sleep_until(deadline) => self.catch_up(),
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        self.catch_up();
                        self.handle(cmd);
                    }
                    None => break,
                },
                event = recv_settings(&mut self.settings) => match event {
                    Ok(event) => {
                        self.catch_up();
                        self.engine.handle_settings(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Settings events dropped; engine may be behind the store");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Settings bus closed");
                        self.settings = None;
                    }
                },
            }
        }
        info!(id = %self.engine.id(), now_ms = self.engine.now(), "Pet engine task stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Perform(action, reply) => {
                let gate = self.engine.perform(action);
                let _ = reply.send(gate);
            }
            Command::Greet => self.engine.greet(),
            Command::Reward(reward) => self.engine.grant_reward(reward),
            Command::AddFriend(friend) => self.engine.add_friend(friend),
            Command::VisitFriend(name) => self.engine.play_with_friend(&name),
            Command::Sound(cue) => self.engine.sound(cue),
            Command::Snapshot(reply) => {
                let _ = reply.send(Snapshot {
                    state: self.engine.state().clone(),
                    activity: self.engine.activity(),
                    now_ms: self.engine.now(),
                });
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn recv_settings(
    rx: &mut Option<broadcast::Receiver<SettingsEvent>>,
) -> std::result::Result<SettingsEvent, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Cloneable front door to a running pet.
pub struct PetHandle<S, B> {
    tx: mpsc::Sender<Command>,
    chat: Arc<Mutex<ChatSession<B>>>,
    store: Arc<S>,
    personality: String,
}

impl<S, B> Clone for PetHandle<S, B> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            chat: Arc::clone(&self.chat),
            store: Arc::clone(&self.store),
            personality: self.personality.clone(),
        }
    }
}

impl<S, B> std::fmt::Debug for PetHandle<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetHandle")
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl<S, B> PetHandle<S, B>
where
    S: PetStore + Send + Sync + 'static,
    B: ChatBackend + 'static,
{
    async fn send(&self, cmd: Command) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| HostError::EngineStopped)
    }

    /// Run a user action.
    ///
    /// # Errors
    /// [`HostError::EngineStopped`] if the engine task is gone.
    pub async fn perform(&self, action: Action) -> Result<Gate> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Perform(action, reply)).await?;
        rx.await.map_err(|_| HostError::EngineStopped)
    }

    /// Say hello.
    ///
    /// # Errors
    /// [`HostError::EngineStopped`] if the engine task is gone.
    pub async fn greet(&self) -> Result<()> {
        self.send(Command::Greet).await
    }

    /// Apply a mini-game reward.
    ///
    /// # Errors
    /// [`HostError::EngineStopped`] if the engine task is gone.
    pub async fn grant_reward(&self, reward: Reward) -> Result<()> {
        self.send(Command::Reward(reward)).await
    }

    /// Record a new friend.
    ///
    /// # Errors
    /// [`HostError::EngineStopped`] if the engine task is gone.
    pub async fn add_friend(&self, friend: Friend) -> Result<()> {
        self.send(Command::AddFriend(friend)).await
    }

    /// Play together with a friend's pet.
    ///
    /// # Errors
    /// [`HostError::EngineStopped`] if the engine task is gone.
    pub async fn play_with_friend(&self, name: impl Into<String>) -> Result<()> {
        self.send(Command::VisitFriend(name.into())).await
    }

    /// Current pet state and activity.
    ///
    /// # Errors
    /// [`HostError::EngineStopped`] if the engine task is gone.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| HostError::EngineStopped)
    }

    /// Chat with the pet. Never fails because of the backend.
    ///
    /// # Errors
    /// [`HostError::EngineStopped`] if the engine task is gone.
    pub async fn chat(&self, prompt: &str) -> Result<Option<Reply>> {
        let snap = self.snapshot().await?;
        let pet = PetSnapshot {
            name: snap.state.name,
            personality: self.personality.clone(),
            happiness: snap.state.happiness,
            energy: snap.state.energy,
            hunger: snap.state.hunger,
            productivity: snap.state.productivity,
        };
        let reply = self.chat.lock().await.send(prompt, &pet).await;
        if reply.is_some() {
            self.send(Command::Sound(SoundCue::Bark)).await?;
        }
        Ok(reply)
    }

    /// Route a voice transcript to an action, a greeting or chat.
    ///
    /// # Errors
    /// [`HostError::EngineStopped`] if the engine task is gone.
    pub async fn voice(&self, transcript: &str) -> Result<VoiceOutcome> {
        debug!(transcript, "Voice command");
        match route_voice(transcript) {
            Intent::Act(action) => Ok(VoiceOutcome::Acted(action, self.perform(action).await?)),
            Intent::Greet => {
                self.greet().await?;
                Ok(VoiceOutcome::Greeted)
            }
            Intent::Chat(text) => Ok(VoiceOutcome::Chatted(self.chat(&text).await?)),
        }
    }

    /// Probe the chat backend.
    pub async fn api_status(&self) -> ApiStatus {
        self.chat.lock().await.status().await
    }

    /// Chat history so far.
    pub async fn chat_history(&self) -> Vec<webpet_llm::ChatMessage> {
        self.chat.lock().await.history().to_vec()
    }

    /// The shared store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

/// A started pet: its handle, its event stream and the engine task.
pub struct RunningPet<S, B> {
    /// Front door.
    pub handle: PetHandle<S, B>,
    /// Everything the engine emits.
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
    /// Engine task; finishes once every handle is dropped.
    pub task: JoinHandle<()>,
    /// Credential watcher task.
    pub watcher: JoinHandle<()>,
}

impl<S, B> std::fmt::Debug for RunningPet<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningPet").finish_non_exhaustive()
    }
}

/// Load the pet, then start its engine task and credential watcher.
///
/// The stored pet and credential are loaded before this returns, so no
/// command can reach a half-initialised engine.
pub fn spawn<S, B>(
    config: webpet_core::WebPetConfig,
    store: Arc<S>,
    mut backend: B,
    chat: webpet_llm::ChatSettings,
    bus: &SettingsBus,
) -> RunningPet<S, B>
where
    S: PetStore + Send + Sync + 'static,
    B: ChatBackend + 'static,
{
    match store.load_api_key() {
        Ok(key) => backend.set_api_key(key),
        Err(e) => warn!(error = %e, "Failed to load chat credential"),
    }

    let personality = config.pet.personality.clone();
    let (sink, events) = ChannelSink::new();
    let engine = PetEngine::load(config, Arc::clone(&store), sink);
    let (tx, commands) = mpsc::channel(COMMAND_BUFFER);

    let driver = Driver {
        engine,
        commands,
        settings: Some(bus.subscribe()),
        origin: Instant::now(),
    };
    let task = tokio::spawn(driver.run());

    let chat = Arc::new(Mutex::new(ChatSession::new(backend, chat)));
    let watcher = tokio::spawn(watch_credentials(
        bus.subscribe(),
        Arc::clone(&chat),
        Arc::clone(&store),
    ));

    RunningPet {
        handle: PetHandle {
            tx,
            chat,
            store,
            personality,
        },
        events,
        task,
        watcher,
    }
}

/// Keep the chat session's credential in step with the settings page.
async fn watch_credentials<S, B>(
    mut rx: broadcast::Receiver<SettingsEvent>,
    chat: Arc<Mutex<ChatSession<B>>>,
    store: Arc<S>,
) where
    S: PetStore + Send + Sync + 'static,
    B: ChatBackend + 'static,
{
    loop {
        let key = match rx.recv().await {
            Ok(SettingsEvent::Store(StoreChange::ApiKey(key))) => Some(key),
            Ok(SettingsEvent::Message(SettingsMessage::SettingsUpdated {
                key: SettingKey::ApiKey,
                ..
            })) => match store.load_api_key() {
                Ok(key) => key,
                Err(e) => {
                    warn!(error = %e, "Failed to reload chat credential");
                    continue;
                }
            },
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Credential watcher lagged, reloading from store");
                store.load_api_key().ok().flatten()
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        info!("Chat credential refreshed");
        chat.lock().await.set_api_key(key);
    }
}
