//! # webpet-host: Async Host for WebPet
//!
//! Runs a [`webpet_core::PetEngine`] on the tokio runtime:
//!
//! ```text
//!  voice / CLI ─▶ PetHandle ──mpsc──▶ engine task ──▶ EngineEvent stream
//!                    │                    ▲
//!                    └─▶ ChatSession      │ SettingsBus (rename, credential)
//! ```
//!
//! The engine task sleeps until the next timer and maps wall-clock time onto
//! the engine's virtual clock, so the core crate never sees a real timer.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;

pub use commands::{Intent, route_voice};
pub use error::{HostError, Result};
pub use runtime::{ChannelSink, PetHandle, RunningPet, Snapshot, VoiceOutcome, spawn};
