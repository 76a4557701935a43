//! Passive, time-driven drift of the pet's needs.
//!
//! Pure functions over [`PetState`]; the engine decides when they run. Time
//! spent while the engine is not running is never applied retroactively.

use rand::Rng;

use crate::config::ThresholdConfig;
use crate::state::{Attribute, PetState, STAT_MAX};

/// What one hunger tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HungerTick {
    /// Hunger went down by one.
    pub drained: bool,
    /// Happiness paid the hungry penalty.
    pub happiness_penalty: bool,
    /// Hunger is now below the critical threshold.
    pub very_hungry: bool,
}

/// Drain one point of hunger.
///
/// Below `hunger_low` a positive happiness also drops by the penalty. Below
/// `hunger_critical` the tick is flagged as very hungry, on every tick with
/// no de-duplication. A pet at zero hunger is left untouched.
pub fn deplete_hunger(state: &mut PetState, thresholds: &ThresholdConfig) -> HungerTick {
    if state.hunger == 0 {
        return HungerTick::default();
    }
    let hunger = state.adjust(Attribute::Hunger, -1);

    let mut tick = HungerTick {
        drained: true,
        ..HungerTick::default()
    };
    if hunger < thresholds.hunger_low && state.happiness > 0 {
        state.adjust(
            Attribute::Happiness,
            -i64::from(thresholds.hungry_happiness_penalty),
        );
        tick.happiness_penalty = true;
    }
    tick.very_hungry = hunger < thresholds.hunger_critical;
    tick
}

/// Outcome of one recharge step while asleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RechargeStep {
    /// Energy went up; still below full.
    Charging(u8),
    /// Energy reached full; time to wake.
    Full,
}

/// Add one point of energy.
pub fn recharge(state: &mut PetState) -> RechargeStep {
    let energy = state.adjust(Attribute::Energy, 1);
    if energy >= STAT_MAX {
        RechargeStep::Full
    } else {
        RechargeStep::Charging(energy)
    }
}

/// Whether energy is low enough to force sleep.
#[must_use]
pub fn needs_sleep(energy: u8, thresholds: &ThresholdConfig) -> bool {
    energy < thresholds.sleep_energy
}

/// Result of one idle fidget roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FidgetRoll {
    /// Do a cosmetic bounce and idle sound.
    pub bounce: bool,
    /// Doze off.
    pub doze_off: bool,
}

/// Roll the idle fidget dice. The bounce and the doze are independent.
pub fn roll_fidget<R: Rng + ?Sized>(
    rng: &mut R,
    energy: u8,
    thresholds: &ThresholdConfig,
) -> FidgetRoll {
    let bounce = rng.gen_bool(probability(thresholds.fidget_chance));
    let doze_off = energy < thresholds.drowsy_energy
        && rng.gen_bool(probability(thresholds.drowsy_sleep_chance));
    FidgetRoll { bounce, doze_off }
}

/// A usable `gen_bool` argument; NaN counts as never.
fn probability(chance: f64) -> f64 {
    if chance.is_nan() {
        0.0
    } else {
        chance.clamp(0.0, 1.0)
    }
}
