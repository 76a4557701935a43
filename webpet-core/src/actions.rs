//! User actions: preconditions and attribute effects.
//!
//! Each action's effect is a fixed table of signed deltas applied through
//! [`PetState::adjust`], so clamping is a post-condition of every action.

use std::fmt;

use crate::activity::Activity;
use crate::config::ThresholdConfig;
use crate::state::{Attribute, PetState};

/// Something the user can ask the pet to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Earn coins and productivity at the cost of energy, mood and food.
    Work,
    /// Cheer up at a small energy cost.
    Play,
    /// Refill hunger; always accepted, wakes a sleeping pet.
    Feed,
    /// Touch the pet directly.
    Pet,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Work => "work",
            Self::Play => "play",
            Self::Feed => "feed",
            Self::Pet => "pet",
        };
        f.write_str(name)
    }
}

/// Attribute deltas and coin reward of a successful action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    /// Signed change per attribute.
    pub deltas: &'static [(Attribute, i64)],
    /// Coins earned.
    pub coins: u64,
}

/// Effect of a completed work action.
pub const WORK_EFFECT: Effect = Effect {
    deltas: &[
        (Attribute::Productivity, 10),
        (Attribute::Energy, -10),
        (Attribute::Happiness, -5),
        (Attribute::Hunger, -5),
    ],
    coins: 5,
};

/// Effect of a play action.
pub const PLAY_EFFECT: Effect = Effect {
    deltas: &[
        (Attribute::Happiness, 10),
        (Attribute::Energy, -5),
        (Attribute::Hunger, -2),
    ],
    coins: 2,
};

/// Effect of feeding.
pub const FEED_EFFECT: Effect = Effect {
    deltas: &[
        (Attribute::Energy, 10),
        (Attribute::Happiness, 5),
        (Attribute::Hunger, 30),
    ],
    coins: 0,
};

/// Effect of petting.
pub const PET_EFFECT: Effect = Effect {
    deltas: &[(Attribute::Happiness, 5)],
    coins: 0,
};

impl Action {
    /// The effect applied when the action goes through.
    #[must_use]
    pub fn effect(self) -> Effect {
        match self {
            Self::Work => WORK_EFFECT,
            Self::Play => PLAY_EFFECT,
            Self::Feed => FEED_EFFECT,
            Self::Pet => PET_EFFECT,
        }
    }

    /// Whether the action requires more than the sleep threshold of energy.
    #[must_use]
    pub fn needs_energy(self) -> bool {
        matches!(self, Self::Work | Self::Play)
    }
}

/// Precondition verdict for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Go ahead.
    Allowed,
    /// Rejected because the pet is asleep.
    Asleep,
    /// Rejected for lack of energy; the pet should fall asleep.
    TooTired,
}

/// Check an action against the current activity and energy.
///
/// Feeding is always allowed; the caller wakes the pet first.
#[must_use]
pub fn gate(action: Action, activity: Activity, energy: u8, thresholds: &ThresholdConfig) -> Gate {
    if action == Action::Feed {
        return Gate::Allowed;
    }
    if activity == Activity::Sleeping {
        return Gate::Asleep;
    }
    if action.needs_energy() && energy <= thresholds.sleep_energy {
        return Gate::TooTired;
    }
    Gate::Allowed
}

/// Apply an effect to the state.
pub fn apply(state: &mut PetState, effect: Effect) {
    for &(attr, delta) in effect.deltas {
        state.adjust(attr, delta);
    }
    state.earn(effect.coins);
}

/// A reward granted by a mini-game or a friend visit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reward {
    /// Happiness change.
    pub happiness: i64,
    /// Energy change.
    pub energy: i64,
    /// Coins earned.
    pub coins: u64,
}

impl Reward {
    /// Returning a thrown ball.
    pub const FETCH: Self = Self {
        happiness: 5,
        energy: -2,
        coins: 0,
    };
    /// Every fifth catch in the chase game.
    pub const CHASE_STREAK: Self = Self {
        happiness: 10,
        energy: -5,
        coins: 3,
    };
    /// Every third level of the pattern game.
    pub const PATTERN_MILESTONE: Self = Self {
        happiness: 15,
        energy: 0,
        coins: 5,
    };
    /// Playing together with a friend's pet.
    pub const FRIEND_VISIT: Self = Self {
        happiness: 15,
        energy: 0,
        coins: 0,
    };

    /// Pattern game over: a run past level 5 pays one coin per level.
    #[must_use]
    pub fn pattern_game_over(level: u32) -> Self {
        Self {
            coins: if level > 5 { u64::from(level) } else { 0 },
            ..Self::default()
        }
    }

    /// Apply the reward to the state.
    pub fn apply(self, state: &mut PetState) {
        state.adjust(Attribute::Happiness, self.happiness);
        state.adjust(Attribute::Energy, self.energy);
        state.earn(self.coins);
    }
}
