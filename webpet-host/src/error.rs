//! Host error types.

use thiserror::Error;
use webpet_core::PetError;
use webpet_llm::ChatError;

/// Errors surfaced by the host layer.
#[derive(Debug, Error)]
pub enum HostError {
    /// Engine-side failure (storage, config, settings).
    #[error(transparent)]
    Pet(#[from] PetError),

    /// Chat backend failure that was not absorbed by the fallback.
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// The engine task has exited; the handle is dead.
    #[error("Pet engine has stopped")]
    EngineStopped,

    /// The log subscriber could not be installed.
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, HostError>;
