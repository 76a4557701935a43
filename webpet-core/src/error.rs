//! Error types for the WebPet core library.
//!
//! Action preconditions are never errors: a rejected action is reported to
//! the user as a notification. These variants cover the collaborators around
//! the engine (storage, configuration, settings messages).

use thiserror::Error;

/// Top-level error type for WebPet core operations.
#[derive(Error, Debug)]
pub enum PetError {
    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A settings message named a key this engine does not understand.
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    /// A settings write was rejected before reaching the store.
    #[error("Invalid setting value for {key}: {reason}")]
    InvalidSetting {
        /// Which setting was being written.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, PetError>;
