//! Turning a config file into a running pet.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use webpet_core::config::ChatConfig;
use webpet_core::{SettingsBus, SqliteStore, WebPetConfig};
use webpet_llm::{ChatSettings, GeminiClient};

use crate::error::Result;
use crate::runtime::{self, RunningPet};

/// Load the config file, or the defaults when `path` is `None`.
///
/// # Errors
/// Unreadable or malformed config files.
pub fn load_config(path: Option<&Path>) -> Result<WebPetConfig> {
    let config = match path {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            WebPetConfig::from_file(path)?
        }
        None => WebPetConfig::default(),
    };
    Ok(config)
}

/// Open the SQLite store named by the config, or `db_override` if given.
///
/// # Errors
/// The database cannot be opened or migrated.
pub fn open_store(config: &WebPetConfig, db_override: Option<&Path>) -> Result<Arc<SqliteStore>> {
    let path = db_override.unwrap_or_else(|| Path::new(&config.persistence.path));
    let store = SqliteStore::open(path, &config.persistence)?;
    Ok(Arc::new(store))
}

/// Chat settings from the `[chat]` config section.
#[must_use]
pub fn chat_settings(config: &ChatConfig) -> ChatSettings {
    ChatSettings {
        base_url: config.base_url.clone(),
        model: config.model.clone(),
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
        history_window: config.history_window,
        request_timeout_ms: config.request_timeout_ms,
    }
}

/// Start a pet backed by SQLite and the Gemini client.
///
/// The credential is read from the store; until one is set the pet answers
/// chat locally.
pub fn start(
    config: WebPetConfig,
    store: Arc<SqliteStore>,
    bus: &SettingsBus,
) -> RunningPet<SqliteStore, GeminiClient> {
    let settings = chat_settings(&config.chat);
    let client = GeminiClient::new(settings.clone(), None);
    runtime::spawn(config, store, client, settings, bus)
}
