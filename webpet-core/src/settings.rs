//! Settings channel: out-of-band edits to the stored pet and credential.
//!
//! A settings page writes straight to the [`PetStore`] and then announces the
//! write on a [`SettingsBus`]. Every running engine subscribes and merges the
//! change into its live state, last writer wins per field.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{PetError, Result};
use crate::persistence::{PetStore, SaveOutcome, StoredState};
use crate::state::{Attribute, Friend, PetState};

/// Which setting changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingKey {
    /// The chat credential.
    ApiKey,
    /// The pet's display name.
    PetName,
}

/// Wire message broadcast after a settings write.
///
/// ```json
/// {"action":"settingsUpdated","key":"petName","name":"Rex"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum SettingsMessage {
    /// A setting was written to the store.
    #[serde(rename = "settingsUpdated")]
    SettingsUpdated {
        /// The setting that changed.
        key: SettingKey,
        /// New pet name, for `petName`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl SettingsMessage {
    /// The credential changed.
    #[must_use]
    pub fn api_key() -> Self {
        Self::SettingsUpdated {
            key: SettingKey::ApiKey,
            name: None,
        }
    }

    /// The pet was renamed.
    #[must_use]
    pub fn pet_name(name: impl Into<String>) -> Self {
        Self::SettingsUpdated {
            key: SettingKey::PetName,
            name: Some(name.into()),
        }
    }

    /// Decode a wire message.
    ///
    /// # Errors
    /// Returns [`PetError::UnknownSetting`] for anything that is not a known settings message.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| PetError::UnknownSetting(format!("{raw}: {e}")))
    }

    /// Encode for the wire.
    ///
    /// # Errors
    /// Serialization failures.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A partial [`PetState`]; present fields overwrite, absent ones are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatePatch {
    /// New display name.
    pub name: Option<String>,
    /// New happiness; clamped on apply.
    pub happiness: Option<i64>,
    /// New energy; clamped on apply.
    pub energy: Option<i64>,
    /// New productivity; clamped on apply.
    pub productivity: Option<i64>,
    /// New hunger; clamped on apply.
    pub hunger: Option<i64>,
    /// New coin balance.
    pub coins: Option<u64>,
    /// Replacement toy inventory.
    pub toys: Option<Vec<String>>,
    /// Replacement food inventory.
    pub food: Option<Vec<String>>,
    /// Replacement friend list.
    pub friends: Option<Vec<Friend>>,
}

impl StatePatch {
    /// A patch that only renames.
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Fields of `newer` that differ from `base`.
    #[must_use]
    pub fn diff(base: &PetState, newer: &PetState) -> Self {
        fn changed<T: PartialEq + Clone>(a: &T, b: &T) -> Option<T> {
            (a != b).then(|| b.clone())
        }
        let stat = |attr| {
            let (a, b) = (base.get(attr), newer.get(attr));
            (a != b).then_some(i64::from(b))
        };
        Self {
            name: changed(&base.name, &newer.name),
            happiness: stat(Attribute::Happiness),
            energy: stat(Attribute::Energy),
            productivity: stat(Attribute::Productivity),
            hunger: stat(Attribute::Hunger),
            coins: changed(&base.coins, &newer.coins),
            toys: changed(&base.toys, &newer.toys),
            food: changed(&base.food, &newer.food),
            friends: changed(&base.friends, &newer.friends),
        }
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the present fields of `state`, clamping attributes.
    pub fn apply_to(&self, state: &mut PetState) {
        if let Some(name) = &self.name {
            state.name.clone_from(name);
        }
        for (attr, value) in [
            (Attribute::Happiness, self.happiness),
            (Attribute::Energy, self.energy),
            (Attribute::Productivity, self.productivity),
            (Attribute::Hunger, self.hunger),
        ] {
            if let Some(v) = value {
                state.set(attr, v);
            }
        }
        if let Some(coins) = self.coins {
            state.coins = coins;
        }
        if let Some(toys) = &self.toys {
            state.toys.clone_from(toys);
        }
        if let Some(food) = &self.food {
            state.food.clone_from(food);
        }
        if let Some(friends) = &self.friends {
            state.friends.clone_from(friends);
        }
    }
}

/// A change that already landed in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// The pet snapshot was rewritten at `revision`.
    PetState {
        /// Fields that changed.
        patch: StatePatch,
        /// Revision of the new snapshot.
        revision: u64,
    },
    /// The chat credential was replaced.
    ApiKey(String),
}

/// Everything carried on the settings bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsEvent {
    /// A store write, with its content.
    Store(StoreChange),
    /// The wire announcement that follows a write.
    Message(SettingsMessage),
}

/// Fan-out of settings events to every running engine.
#[derive(Debug, Clone)]
pub struct SettingsBus {
    tx: broadcast::Sender<SettingsEvent>,
}

impl Default for SettingsBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl SettingsBus {
    /// A bus buffering up to `capacity` events per slow subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, event: SettingsEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                debug!("Settings event published with no subscribers");
                0
            }
        }
    }
}

const MAX_WRITE_ATTEMPTS: usize = 3;

/// The settings-page side of the channel: writes to the store, then broadcasts.
#[derive(Debug)]
pub struct SettingsWriter<S> {
    store: S,
    bus: SettingsBus,
}

impl<S: PetStore> SettingsWriter<S> {
    /// Wrap a store and a bus.
    pub fn new(store: S, bus: SettingsBus) -> Self {
        Self { store, bus }
    }

    /// Rename the stored pet and announce it.
    ///
    /// Read-modify-write of the stored snapshot at a bumped revision, so a
    /// concurrent engine save of older data is rejected.
    ///
    /// # Errors
    /// [`PetError::InvalidSetting`] for a blank name; storage failures otherwise.
    pub fn rename_pet(&self, name: &str) -> Result<u64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PetError::InvalidSetting {
                key: "petName",
                reason: "Please enter a pet name.".into(),
            });
        }

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let StoredState {
                mut state,
                revision,
            } = self.store.load_state()?.unwrap_or_else(|| StoredState {
                state: PetState::default(),
                revision: 0,
            });
            state.name = name.to_string();
            let revision = revision + 1;

            match self.store.save_state(&state, revision)? {
                SaveOutcome::Saved => {
                    info!(name, revision, "Pet renamed from settings");
                    self.bus.publish(SettingsEvent::Store(StoreChange::PetState {
                        patch: StatePatch::rename(name),
                        revision,
                    }));
                    self.bus
                        .publish(SettingsEvent::Message(SettingsMessage::pet_name(name)));
                    return Ok(revision);
                }
                SaveOutcome::Stale { stored_revision } => {
                    warn!(revision, stored_revision, "Rename raced another save, retrying");
                }
            }
        }
        Err(PetError::InvalidSetting {
            key: "petName",
            reason: "store kept changing underneath the rename".into(),
        })
    }

    /// Replace the chat credential and announce it.
    ///
    /// # Errors
    /// [`PetError::InvalidSetting`] for a blank key; storage failures otherwise.
    pub fn set_api_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(PetError::InvalidSetting {
                key: "apiKey",
                reason: "Please enter a valid API key.".into(),
            });
        }
        self.store.save_api_key(key)?;
        info!("Chat credential updated from settings");
        self.bus
            .publish(SettingsEvent::Store(StoreChange::ApiKey(key.to_string())));
        self.bus
            .publish(SettingsEvent::Message(SettingsMessage::api_key()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn message_wire_format() {
        let json = SettingsMessage::pet_name("Rex").to_json().expect("encode");
        assert_eq!(
            json,
            r#"{"action":"settingsUpdated","key":"petName","name":"Rex"}"#
        );
        let json = SettingsMessage::api_key().to_json().expect("encode");
        assert_eq!(json, r#"{"action":"settingsUpdated","key":"apiKey"}"#);
    }

    #[test]
    fn message_decodes_and_rejects_unknown() {
        let msg = SettingsMessage::from_json(r#"{"action":"settingsUpdated","key":"apiKey"}"#)
            .expect("decode");
        assert_eq!(msg, SettingsMessage::api_key());

        let err = SettingsMessage::from_json(r#"{"action":"settingsUpdated","key":"volume"}"#)
            .expect_err("unknown key");
        assert!(matches!(err, PetError::UnknownSetting(_)));
        assert!(SettingsMessage::from_json(r#"{"action":"reboot"}"#).is_err());
    }

    #[test]
    fn diff_only_reports_changed_fields() {
        let base = PetState::default();
        let mut newer = base.clone();
        newer.name = "Rex".into();
        newer.energy = 40;

        let patch = StatePatch::diff(&base, &newer);
        assert_eq!(patch.name.as_deref(), Some("Rex"));
        assert_eq!(patch.energy, Some(40));
        assert!(patch.happiness.is_none());
        assert!(patch.friends.is_none());
        assert!(StatePatch::diff(&base, &base).is_empty());
    }

    #[test]
    fn patch_clamps_attributes() {
        let mut state = PetState::default();
        StatePatch {
            hunger: Some(-40),
            happiness: Some(400),
            ..StatePatch::default()
        }
        .apply_to(&mut state);
        assert_eq!(state.hunger, 0);
        assert_eq!(state.happiness, 100);
    }

    #[test]
    fn rename_bumps_revision_and_broadcasts() {
        let store = MemoryStore::new();
        store.save_state(&PetState::default(), 4).expect("seed");
        let bus = SettingsBus::default();
        let mut rx = bus.subscribe();
        let writer = SettingsWriter::new(&store, bus);

        assert_eq!(writer.rename_pet("  Rex ").expect("rename"), 5);

        let stored = store.load_state().expect("load").expect("Some");
        assert_eq!(stored.state.name, "Rex");
        assert_eq!(stored.revision, 5);

        assert_eq!(
            rx.try_recv().expect("store event"),
            SettingsEvent::Store(StoreChange::PetState {
                patch: StatePatch::rename("Rex"),
                revision: 5,
            })
        );
        assert_eq!(
            rx.try_recv().expect("message"),
            SettingsEvent::Message(SettingsMessage::pet_name("Rex"))
        );
    }

    #[test]
    fn blank_values_are_rejected() {
        let store = MemoryStore::new();
        let writer = SettingsWriter::new(&store, SettingsBus::default());
        assert!(matches!(
            writer.rename_pet("   "),
            Err(PetError::InvalidSetting { key: "petName", .. })
        ));
        assert!(matches!(
            writer.set_api_key(""),
            Err(PetError::InvalidSetting { key: "apiKey", .. })
        ));
        assert!(store.load_state().expect("load").is_none());
    }

    #[test]
    fn api_key_is_stored_and_announced() {
        let store = MemoryStore::new();
        let bus = SettingsBus::default();
        let mut rx = bus.subscribe();
        SettingsWriter::new(&store, bus)
            .set_api_key("k-123")
            .expect("set");

        assert_eq!(store.load_api_key().expect("load").as_deref(), Some("k-123"));
        assert_eq!(
            rx.try_recv().expect("store event"),
            SettingsEvent::Store(StoreChange::ApiKey("k-123".into()))
        );
    }
}
