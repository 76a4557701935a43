//! The pet's persisted attribute store.
//!
//! Four bounded attributes live in `[STAT_MIN, STAT_MAX]`. Every mutator in
//! this module clamps, so no caller can observe an out-of-range value.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Lower bound of every bounded attribute.
pub const STAT_MIN: u8 = 0;
/// Upper bound of every bounded attribute.
pub const STAT_MAX: u8 = 100;

/// Name given to a pet that has never been renamed.
pub const DEFAULT_NAME: &str = "Buddy";

/// Clamp a signed value into the attribute range.
#[must_use]
pub fn clamp_stat(value: i64) -> u8 {
    // Range is 0..=100 so the cast cannot truncate.
    value.clamp(i64::from(STAT_MIN), i64::from(STAT_MAX)) as u8
}

/// One of the four bounded attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// How content the pet is.
    Happiness,
    /// Stamina; drives the sleep cycle.
    Energy,
    /// Accumulated work output.
    Productivity,
    /// Satiety: 100 is full, 0 is starving.
    Hunger,
}

impl Attribute {
    /// All bounded attributes, in display order.
    pub const ALL: [Attribute; 4] = [
        Self::Happiness,
        Self::Energy,
        Self::Productivity,
        Self::Hunger,
    ];
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Happiness => "happiness",
            Self::Energy => "energy",
            Self::Productivity => "productivity",
            Self::Hunger => "hunger",
        };
        f.write_str(name)
    }
}

/// A friend record, appended by the social feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    /// The friend pet's name.
    pub name: String,
    /// Species label, e.g. "Dog".
    pub pet_type: String,
}

impl Friend {
    /// Create a friend record.
    #[must_use]
    pub fn new(name: impl Into<String>, pet_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pet_type: pet_type.into(),
        }
    }
}

/// Everything about the pet that survives a restart.
///
/// The current activity is not stored: a reloaded pet always starts
/// idle. Missing fields in a stored snapshot take their defaults, and stored
/// attributes outside the valid range are clamped while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PetState {
    /// Display name.
    pub name: String,
    /// Happiness, 0–100.
    #[serde(deserialize_with = "deserialize_stat")]
    pub happiness: u8,
    /// Energy, 0–100.
    #[serde(deserialize_with = "deserialize_stat")]
    pub energy: u8,
    /// Productivity, 0–100.
    #[serde(deserialize_with = "deserialize_stat")]
    pub productivity: u8,
    /// Hunger (satiety), 0–100.
    #[serde(deserialize_with = "deserialize_stat")]
    pub hunger: u8,
    /// Coins earned; there is nothing to spend them on yet.
    pub coins: u64,
    /// Toy inventory.
    pub toys: Vec<String>,
    /// Food inventory.
    pub food: Vec<String>,
    /// Friends found through the social feature.
    pub friends: Vec<Friend>,
}

impl Default for PetState {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            happiness: STAT_MAX,
            energy: STAT_MAX,
            productivity: STAT_MIN,
            hunger: STAT_MAX,
            coins: 0,
            toys: Vec::new(),
            food: vec!["Kibble".to_string()],
            friends: Vec::new(),
        }
    }
}

impl PetState {
    /// A fresh pet with the given name and default attributes.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Read one bounded attribute.
    #[must_use]
    pub fn get(&self, attr: Attribute) -> u8 {
        match attr {
            Attribute::Happiness => self.happiness,
            Attribute::Energy => self.energy,
            Attribute::Productivity => self.productivity,
            Attribute::Hunger => self.hunger,
        }
    }

    /// Overwrite one bounded attribute, clamping the new value.
    pub fn set(&mut self, attr: Attribute, value: i64) {
        let slot = match attr {
            Attribute::Happiness => &mut self.happiness,
            Attribute::Energy => &mut self.energy,
            Attribute::Productivity => &mut self.productivity,
            Attribute::Hunger => &mut self.hunger,
        };
        *slot = clamp_stat(value);
    }

    /// Apply a signed delta to one attribute and return the new value.
    pub fn adjust(&mut self, attr: Attribute, delta: i64) -> u8 {
        self.set(attr, i64::from(self.get(attr)) + delta);
        self.get(attr)
    }

    /// Re-clamp every bounded attribute.
    pub fn clamp_all(&mut self) {
        for attr in Attribute::ALL {
            self.set(attr, i64::from(self.get(attr)));
        }
    }

    /// Whether every bounded attribute is inside the valid range.
    #[must_use]
    pub fn is_within_bounds(&self) -> bool {
        Attribute::ALL
            .iter()
            .all(|&attr| (STAT_MIN..=STAT_MAX).contains(&self.get(attr)))
    }

    /// Add coins, saturating rather than wrapping.
    pub fn earn(&mut self, coins: u64) {
        self.coins = self.coins.saturating_add(coins);
    }
}

/// Accept any JSON integer (including negatives and values above 100) and clamp it.
fn deserialize_stat<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_nan() {
        return Ok(STAT_MIN);
    }
    // Float-to-int casts saturate, then clamp narrows to the stat range.
    Ok(clamp_stat(raw.round() as i64))
}
