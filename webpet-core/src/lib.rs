//! # WebPet Core Library
//!
//! A virtual companion with decaying needs. The [`PetEngine`] owns:
//!
//! - **Attributes**: happiness, energy, productivity and hunger, each held in `[0, 100]`
//! - **Activity**: idle, working, sleeping or eating, with guarded delayed reverts
//! - **Timers**: hunger drain, low-energy watchdog, idle fidget, sleep recharge
//! - **Persistence**: a revisioned snapshot saved after every mutation
//! - **Settings merge**: out-of-band renames and credential changes
//!
//! Time is virtual: hosts call [`PetEngine::advance`] with elapsed
//! milliseconds, so every behaviour is reproducible under test.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actions;
pub mod activity;
pub mod config;
pub mod decay;
pub mod engine;
pub mod error;
pub mod events;
pub mod persistence;
pub mod scheduler;
pub mod settings;
pub mod state;

pub use actions::{Action, Gate, Reward};
pub use activity::Activity;
pub use config::WebPetConfig;
pub use engine::PetEngine;
pub use error::{PetError, Result};
pub use events::{EngineEvent, EventSink, RecordingSink};
pub use persistence::{MemoryStore, PetStore, SqliteStore};
pub use settings::{SettingsBus, SettingsEvent, SettingsMessage, SettingsWriter, StoreChange};
pub use state::{Friend, PetState};
