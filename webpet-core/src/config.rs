//! Configuration for the WebPet engine and its collaborators.
//!
//! Maps directly to `webpet.toml`. Every field has a default, so an empty file
//! (or no file at all) yields the stock behaviour.

use serde::{Deserialize, Serialize};

/// Top-level WebPet configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebPetConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Identity and personality of a new pet.
    #[serde(default)]
    pub pet: PetConfig,
    /// Timer periods and delays.
    #[serde(default)]
    pub timers: TimerConfig,
    /// Decay and sleep thresholds.
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    /// Persistence settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Chat backend settings.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Seed for the engine RNG; `None` seeds from entropy.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl WebPetConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `PetError::Config` if the TOML is invalid or fails [`Self::validate`].
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| crate::PetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    /// Returns `PetError::Config` for a non-finite probability.
    pub fn validate(&self) -> crate::error::Result<()> {
        for (name, chance) in [
            ("thresholds.fidget_chance", self.thresholds.fidget_chance),
            ("thresholds.drowsy_sleep_chance", self.thresholds.drowsy_sleep_chance),
        ] {
            if !chance.is_finite() {
                return Err(crate::PetError::Config(format!(
                    "{name} must be a finite probability, got {chance}"
                )));
            }
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log format: "pretty" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Defaults for a brand-new pet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetConfig {
    /// Name used when nothing is stored yet.
    #[serde(default = "default_name")]
    pub default_name: String,
    /// Personality description handed to the chat backend.
    #[serde(default = "default_personality")]
    pub personality: String,
}

impl Default for PetConfig {
    fn default() -> Self {
        Self {
            default_name: default_name(),
            personality: default_personality(),
        }
    }
}

/// Timer periods and delays, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Hunger drains by one point per interval.
    #[serde(default = "default_60000")]
    pub hunger_interval_ms: u64,
    /// Low-energy check interval.
    #[serde(default = "default_5000")]
    pub watchdog_interval_ms: u64,
    /// Idle fidget roll interval.
    #[serde(default = "default_10000")]
    pub fidget_interval_ms: u64,
    /// Energy +1 per interval while asleep.
    #[serde(default = "default_100")]
    pub recharge_interval_ms: u64,
    /// Delay before working/eating returns to idle.
    #[serde(default = "default_3000")]
    pub revert_delay_ms: u64,
    /// Short bounce animation (petting, fidget).
    #[serde(default = "default_500")]
    pub bounce_ms: u64,
    /// Long bounce animation after playing.
    #[serde(default = "default_3000")]
    pub play_bounce_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            hunger_interval_ms: 60_000,
            watchdog_interval_ms: 5_000,
            fidget_interval_ms: 10_000,
            recharge_interval_ms: 100,
            revert_delay_ms: 3_000,
            bounce_ms: 500,
            play_bounce_ms: 3_000,
        }
    }
}

/// Decay and sleep thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Below this hunger, each drain tick also costs happiness.
    #[serde(default = "default_20")]
    pub hunger_low: u8,
    /// Below this hunger, each drain tick raises a "very hungry" notification.
    #[serde(default = "default_10")]
    pub hunger_critical: u8,
    /// Happiness lost per drain tick while hungry.
    #[serde(default = "default_2")]
    pub hungry_happiness_penalty: u8,
    /// Below this energy the pet falls asleep; actions need strictly more.
    #[serde(default = "default_10")]
    pub sleep_energy: u8,
    /// Below this energy an idle pet may doze off.
    #[serde(default = "default_30")]
    pub drowsy_energy: u8,
    /// Chance per fidget tick of a cosmetic bounce.
    #[serde(default = "default_0_3")]
    pub fidget_chance: f64,
    /// Chance per fidget tick of dozing off while drowsy.
    #[serde(default = "default_0_2")]
    pub drowsy_sleep_chance: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            hunger_low: 20,
            hunger_critical: 10,
            hungry_happiness_penalty: 2,
            sleep_energy: 10,
            drowsy_energy: 30,
            fidget_chance: 0.3,
            drowsy_sleep_chance: 0.2,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Use WAL journaling.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Store and verify CRC-32 checksums of every value.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            wal_mode: true,
            checksum_enabled: true,
        }
    }
}

/// Chat backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the generative-language API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_0_7")]
    pub temperature: f32,
    /// Maximum output tokens per reply.
    #[serde(default = "default_256")]
    pub max_output_tokens: u32,
    /// Number of prior turns sent with each request.
    #[serde(default = "default_10_usize")]
    pub history_window: usize,
    /// Hard timeout for a backend call.
    #[serde(default = "default_30000")]
    pub request_timeout_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: 0.7,
            max_output_tokens: 256,
            history_window: 10,
            request_timeout_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_name() -> String { crate::state::DEFAULT_NAME.to_string() }
fn default_personality() -> String { "friendly, helpful, playful, enthusiastic".to_string() }
fn default_db_path() -> String { "webpet.db".to_string() }
fn default_base_url() -> String { "https://generativelanguage.googleapis.com/v1beta".to_string() }
fn default_model() -> String { "gemini-2.0-flash".to_string() }
fn default_0_2() -> f64 { 0.2 }
fn default_0_3() -> f64 { 0.3 }
fn default_0_7() -> f32 { 0.7 }
fn default_2() -> u8 { 2 }
fn default_10() -> u8 { 10 }
fn default_20() -> u8 { 20 }
fn default_30() -> u8 { 30 }
fn default_10_usize() -> usize { 10 }
fn default_100() -> u64 { 100 }
fn default_256() -> u32 { 256 }
fn default_500() -> u64 { 500 }
fn default_3000() -> u64 { 3_000 }
fn default_5000() -> u64 { 5_000 }
fn default_10000() -> u64 { 10_000 }
fn default_30000() -> u64 { 30_000 }
fn default_60000() -> u64 { 60_000 }
