//! The pet engine: one owner for the attribute store, the activity machine
//! and the timer queue.
//!
//! All mutation goes through `&mut self`, so the engine is a single-threaded
//! event loop. Hosts feed it user actions, settings events and
//! elapsed time; it answers through its [`EventSink`].
//!
//! Every mutation ends in a commit: clamp, persist at the next
//! revision, then emit [`EngineEvent::StateChanged`]. Persistence failures are
//! logged and swallowed.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actions::{self, Action, Gate, Reward};
use crate::activity::{Activity, ActivityMachine, Transition};
use crate::config::WebPetConfig;
use crate::decay::{self, RechargeStep};
use crate::events::{Animation, EngineEvent, EventSink, SoundCue};
use crate::persistence::{PetStore, SaveOutcome};
use crate::scheduler::{Fired, Millis, Scheduler, TimerId, TimerKind};
use crate::settings::{SettingKey, SettingsEvent, SettingsMessage, StatePatch, StoreChange};
use crate::state::{Friend, PetState};

/// The virtual pet.
pub struct PetEngine<S, E> {
    id: Uuid,
    config: WebPetConfig,
    store: S,
    sink: E,
    state: PetState,
    /// Last snapshot known to be in the store; base for merging external writes.
    persisted: PetState,
    revision: u64,
    activity: ActivityMachine,
    scheduler: Scheduler,
    recharge: Option<TimerId>,
    rng: StdRng,
}

impl<S, E> std::fmt::Debug for PetEngine<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetEngine")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("revision", &self.revision)
            .field("activity", &self.activity.current())
            .field("now", &self.scheduler.now())
            .finish_non_exhaustive()
    }
}

impl<S: PetStore, E: EventSink> PetEngine<S, E> {
    /// Load the stored pet (or create a default one) and start the passive timers.
    ///
    /// Loading always completes before the engine accepts actions. A store
    /// that cannot be read yields a fresh pet.
    pub fn load(config: WebPetConfig, store: S, sink: E) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::load_with_rng(config, store, sink, rng)
    }

    /// [`PetEngine::load`] with an explicit RNG.
    pub fn load_with_rng(config: WebPetConfig, store: S, sink: E, rng: StdRng) -> Self {
        let id = Uuid::new_v4();
        let (mut state, revision) = match store.load_state() {
            Ok(Some(stored)) => {
                info!(%id, name = %stored.state.name, revision = stored.revision, "Loaded pet");
                (stored.state, stored.revision)
            }
            Ok(None) => {
                info!(%id, name = %config.pet.default_name, "No stored pet, starting fresh");
                (PetState::named(config.pet.default_name.clone()), 0)
            }
            Err(e) => {
                warn!(%id, error = %e, "Failed to load pet state, starting fresh");
                (PetState::named(config.pet.default_name.clone()), 0)
            }
        };
        state.clamp_all();

        let mut scheduler = Scheduler::new();
        scheduler.schedule_every(config.timers.hunger_interval_ms, TimerKind::HungerDepletion);
        scheduler.schedule_every(config.timers.watchdog_interval_ms, TimerKind::EnergyWatchdog);
        scheduler.schedule_every(config.timers.fidget_interval_ms, TimerKind::IdleFidget);

        let engine = Self {
            id,
            persisted: state.clone(),
            state,
            revision,
            config,
            store,
            sink,
            activity: ActivityMachine::new(),
            scheduler,
            recharge: None,
            rng,
        };
        engine.emit(EngineEvent::StateChanged(engine.state.clone()));
        engine
    }

    // -- accessors ----------------------------------------------------------

    /// Instance id, for telling engines apart in logs.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The live pet.
    #[must_use]
    pub fn state(&self) -> &PetState {
        &self.state
    }

    /// The current activity.
    #[must_use]
    pub fn activity(&self) -> Activity {
        self.activity.current()
    }

    /// Revision of the last snapshot written or merged.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Millis {
        self.scheduler.now()
    }

    /// Virtual time of the next timer, if any.
    pub fn next_due(&mut self) -> Option<Millis> {
        self.scheduler.next_due()
    }

    /// Whether the sleep-recharge timer is running.
    #[must_use]
    pub fn recharge_active(&self) -> bool {
        self.recharge.is_some_and(|id| self.scheduler.is_active(id))
    }

    /// Number of sleep-recharge timers in the queue. Never more than one.
    #[must_use]
    pub fn recharge_timer_count(&self) -> usize {
        self.scheduler
            .count_active(|k| matches!(k, TimerKind::SleepRecharge))
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &WebPetConfig {
        &self.config
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // -- time ---------------------------------------------------------------

    /// Let `elapsed` ms of virtual time pass, firing every timer that falls due.
    pub fn advance(&mut self, elapsed: Millis) {
        let target = self.scheduler.now().saturating_add(elapsed);
        self.advance_to(target);
    }

    /// Fire every timer due at or before `target`, in order, then move the clock there.
    pub fn advance_to(&mut self, target: Millis) {
        while let Some(fired) = self.scheduler.pop_due(target) {
            self.on_timer(fired);
        }
        self.scheduler.set_now(target);
    }

    fn on_timer(&mut self, fired: Fired) {
        match fired.kind {
            TimerKind::HungerDepletion => self.on_hunger_tick(),
            TimerKind::EnergyWatchdog => {
                if decay::needs_sleep(self.state.energy, &self.config.thresholds) {
                    self.fall_asleep();
                }
            }
            TimerKind::IdleFidget => self.on_fidget(),
            TimerKind::SleepRecharge => self.on_recharge(fired.id),
            TimerKind::Revert(token) => match self.activity.try_revert(token) {
                Some(t) => self.transitioned(t),
                None => debug!(
                    expected = %token.expected,
                    current = %self.activity.current(),
                    "Stale revert ignored"
                ),
            },
        }
    }

    fn on_hunger_tick(&mut self) {
        let tick = decay::deplete_hunger(&mut self.state, &self.config.thresholds);
        if !tick.drained {
            return;
        }
        debug!(hunger = self.state.hunger, happiness = self.state.happiness, "Hunger tick");
        self.commit();
        if tick.very_hungry {
            self.notify(format!("{} is very hungry! Please feed me!", self.state.name));
        }
    }

    fn on_fidget(&mut self) {
        if self.activity.current() != Activity::Idle {
            return;
        }
        let roll = decay::roll_fidget(&mut self.rng, self.state.energy, &self.config.thresholds);
        if roll.bounce {
            self.emit(EngineEvent::Animate(Animation::Bounce {
                duration_ms: self.config.timers.bounce_ms,
            }));
            self.emit(EngineEvent::Sound(SoundCue::Idle));
        }
        if roll.doze_off {
            self.fall_asleep();
        }
    }

    fn on_recharge(&mut self, timer: TimerId) {
        if !self.activity.is_sleeping() {
            self.scheduler.cancel(timer);
            self.recharge = None;
            return;
        }
        let step = decay::recharge(&mut self.state);
        self.commit();
        if step == RechargeStep::Full {
            self.wake();
        }
    }

    // -- actions ------------------------------------------------------------

    /// Work: +productivity and coins, costs energy, mood and food.
    pub fn work(&mut self) -> Gate {
        self.perform(Action::Work)
    }

    /// Play: +happiness, costs a little energy and food.
    pub fn play(&mut self) -> Gate {
        self.perform(Action::Play)
    }

    /// Feed: always accepted, wakes a sleeping pet first.
    pub fn feed(&mut self) -> Gate {
        self.perform(Action::Feed)
    }

    /// Pet the pet.
    pub fn pet(&mut self) -> Gate {
        self.perform(Action::Pet)
    }

    /// Run one user action through its gate and effect.
    pub fn perform(&mut self, action: Action) -> Gate {
        let verdict = actions::gate(
            action,
            self.activity.current(),
            self.state.energy,
            &self.config.thresholds,
        );
        debug!(%action, ?verdict, energy = self.state.energy, "Action requested");

        match verdict {
            Gate::Asleep => {
                let msg = match action {
                    Action::Pet => format!("Shh... {} is sleeping.", self.state.name),
                    _ => format!("{} is sleeping. Let me rest!", self.state.name),
                };
                self.notify(msg);
                return verdict;
            }
            Gate::TooTired => {
                let msg = match action {
                    Action::Work => "Your pet is too tired to work!",
                    _ => "Your pet needs rest!",
                };
                self.notify(msg.to_string());
                self.fall_asleep();
                return verdict;
            }
            Gate::Allowed => {}
        }

        match action {
            Action::Work => {
                self.enter_with_revert(Activity::Working);
                actions::apply(&mut self.state, action.effect());
                self.commit();
                self.emit(EngineEvent::Sound(SoundCue::Work));
                self.notify("Work completed! Earned 5 coins!".to_string());
            }
            Action::Play => {
                actions::apply(&mut self.state, action.effect());
                self.commit();
                self.emit(EngineEvent::Sound(SoundCue::Happy));
                self.emit(EngineEvent::Animate(Animation::Bounce {
                    duration_ms: self.config.timers.play_bounce_ms,
                }));
            }
            Action::Feed => {
                self.wake();
                self.enter_with_revert(Activity::Eating);
                actions::apply(&mut self.state, action.effect());
                self.commit();
                self.emit(EngineEvent::Sound(SoundCue::Eat));
            }
            Action::Pet => {
                actions::apply(&mut self.state, action.effect());
                self.commit();
                self.emit(EngineEvent::Sound(SoundCue::Happy));
                self.emit(EngineEvent::Animate(Animation::Bounce {
                    duration_ms: self.config.timers.bounce_ms,
                }));
            }
        }
        verdict
    }

    /// Apply a mini-game reward.
    pub fn grant_reward(&mut self, reward: Reward) {
        reward.apply(&mut self.state);
        debug!(?reward, "Reward granted");
        self.commit();
    }

    /// Append a friend record.
    pub fn add_friend(&mut self, friend: Friend) {
        info!(friend = %friend.name, pet_type = %friend.pet_type, "Friend added");
        self.state.friends.push(friend);
        self.commit();
    }

    /// Play together with a friend's pet.
    pub fn play_with_friend(&mut self, friend: &str) {
        Reward::FRIEND_VISIT.apply(&mut self.state);
        self.commit();
        self.emit(EngineEvent::Sound(SoundCue::Happy));
        self.notify(format!("Playing with {friend} was fun!"));
    }

    /// Say hello back.
    pub fn greet(&mut self) {
        self.emit(EngineEvent::Sound(SoundCue::Happy));
        self.notify("Hello there! How can I help?".to_string());
    }

    /// Emit a free-form notification on behalf of a collaborator.
    pub fn announce(&self, message: impl Into<String>) {
        self.notify(message.into());
    }

    /// Play a sound on behalf of a collaborator, e.g. a chat reply bark.
    pub fn sound(&self, cue: SoundCue) {
        self.emit(EngineEvent::Sound(cue));
    }

    // -- settings merge -----------------------------------------------------

    /// Merge anything arriving on the settings bus.
    ///
    /// Credential changes are left to the host.
    pub fn handle_settings(&mut self, event: &SettingsEvent) {
        match event {
            SettingsEvent::Store(change) => {
                self.apply_store_change(change);
            }
            SettingsEvent::Message(msg) => self.apply_settings_message(msg),
        }
    }

    /// Merge a store write made outside this engine.
    ///
    /// Present fields win. Returns `false` when the change is not newer than
    /// what the engine already holds.
    pub fn apply_store_change(&mut self, change: &StoreChange) -> bool {
        let StoreChange::PetState { patch, revision } = change else {
            return false;
        };
        if *revision <= self.revision {
            debug!(
                revision,
                current = self.revision,
                "Ignoring store change that is not newer"
            );
            return false;
        }
        patch.apply_to(&mut self.state);
        patch.apply_to(&mut self.persisted);
        self.state.clamp_all();
        self.revision = *revision;
        info!(id = %self.id, revision, "Merged external pet update");
        self.emit(EngineEvent::StateChanged(self.state.clone()));
        true
    }

    /// Apply a wire settings message. Only renames touch the engine.
    pub fn apply_settings_message(&mut self, msg: &SettingsMessage) {
        let SettingsMessage::SettingsUpdated { key, name } = msg;
        if *key != SettingKey::PetName {
            return;
        }
        let Some(name) = name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            return;
        };
        if self.state.name != name {
            self.state.name = name.to_string();
            self.emit(EngineEvent::StateChanged(self.state.clone()));
        }
    }

    // -- internals ----------------------------------------------------------

    fn enter_with_revert(&mut self, to: Activity) {
        let t = self.activity.enter(to);
        self.transitioned(t);
        let token = self.activity.revert_token();
        self.scheduler
            .schedule_once(self.config.timers.revert_delay_ms, TimerKind::Revert(token));
    }

    fn fall_asleep(&mut self) {
        let Some(t) = self.activity.fall_asleep() else {
            return;
        };
        self.transitioned(t);
        self.notify(format!("{} is too tired and fell asleep!", self.state.name));
        if !self.recharge_active() {
            self.recharge = Some(self.scheduler.schedule_every(
                self.config.timers.recharge_interval_ms,
                TimerKind::SleepRecharge,
            ));
        }
    }

    fn wake(&mut self) {
        let Some(t) = self.activity.wake() else {
            return;
        };
        if let Some(id) = self.recharge.take() {
            self.scheduler.cancel(id);
        }
        self.transitioned(t);
        self.notify(format!("{} woke up feeling refreshed!", self.state.name));
    }

    fn transitioned(&self, t: Transition) {
        debug!(
            from = %t.from,
            to = %t.to,
            generation = t.generation,
            energy = self.state.energy,
            "Activity changed"
        );
        self.emit(EngineEvent::ActivityChanged { from: t.from, to: t.to });
    }

    /// Clamp, persist at the next revision, and announce the new state.
    fn commit(&mut self) {
        self.state.clamp_all();
        self.persist();
        self.emit(EngineEvent::StateChanged(self.state.clone()));
    }

    fn persist(&mut self) {
        let revision = self.revision + 1;
        match self.store.save_state(&self.state, revision) {
            Ok(SaveOutcome::Saved) => {
                self.revision = revision;
                self.persisted.clone_from(&self.state);
            }
            Ok(SaveOutcome::Stale { stored_revision }) => {
                warn!(
                    revision,
                    stored_revision, "Save rejected as stale, merging newer stored state"
                );
                self.merge_stored(stored_revision);
            }
            Err(e) => warn!(error = %e, revision, "Failed to save pet state"),
        }
    }

    /// Pull in fields changed by another writer since our last save, then save on top.
    ///
    /// A stored snapshot that cannot be read is overwritten at the next
    /// revision, so one bad row never blocks saving for good.
    fn merge_stored(&mut self, stored_revision: u64) {
        match self.store.load_state() {
            Ok(Some(stored)) => {
                let patch = StatePatch::diff(&self.persisted, &stored.state);
                patch.apply_to(&mut self.state);
                self.state.clamp_all();
                self.persisted = stored.state;
                self.revision = stored.revision;
            }
            Ok(None) => self.revision = self.revision.max(stored_revision),
            Err(e) => {
                warn!(
                    error = %e,
                    stored_revision,
                    "Stored pet state unreadable, overwriting it"
                );
                self.revision = self.revision.max(stored_revision);
            }
        }

        let revision = self.revision + 1;
        match self.store.save_state(&self.state, revision) {
            Ok(SaveOutcome::Saved) => {
                self.revision = revision;
                self.persisted.clone_from(&self.state);
            }
            Ok(SaveOutcome::Stale { stored_revision }) => {
                warn!(revision, stored_revision, "Save still stale after merge");
            }
            Err(e) => warn!(error = %e, revision, "Failed to save merged pet state"),
        }
    }

    fn notify(&self, message: String) {
        debug!(%message, "Notify");
        self.sink.emit(EngineEvent::Notify(message));
    }

    fn emit(&self, event: EngineEvent) {
        self.sink.emit(event);
    }
}
