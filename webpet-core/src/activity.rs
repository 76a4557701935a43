//! Activity state machine.
//!
//! ```text
//!            work (energy > 10)            feed
//!   ┌──────┐ ─────────────────▶ ┌─────────┐      ┌────────┐
//!   │ idle │ ◀───── revert ──── │ working │      │ eating │
//!   └──────┘ ◀───────────────── revert ─────────  └────────┘
//!      ▲  │                                            ▲
//!  wake│  │ energy < 10 / drowsy                       │ feed (wakes first)
//!      │  ▼                                            │
//!   ┌──────────┐ ──────────────────────────────────────┘
//!   │ sleeping │
//!   └──────────┘
//! ```
//!
//! Every transition bumps a generation counter. Delayed reverts capture a
//! [`RevertToken`] when they are scheduled and only apply if both the
//! expected activity and the generation still match, so a revert scheduled
//! by an older action can never clobber a newer transition.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What the pet is doing right now. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Resting state; the only state in which the pet fidgets.
    #[default]
    Idle,
    /// Busy with a work action; reverts to idle after a delay.
    Working,
    /// Recharging energy; rejects everything except feeding.
    Sleeping,
    /// Eating after a feed action; reverts to idle after a delay.
    Eating,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Sleeping => "sleeping",
            Self::Eating => "eating",
        };
        f.write_str(name)
    }
}

/// A transition that actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Activity before the transition.
    pub from: Activity,
    /// Activity after the transition.
    pub to: Activity,
    /// Generation after the transition.
    pub generation: u64,
}

/// Captured at schedule time by a delayed revert-to-idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevertToken {
    /// The activity the revert expects to still be current.
    pub expected: Activity,
    /// The generation at which the revert was scheduled.
    pub generation: u64,
}

/// Tracks the current activity and its generation.
#[derive(Debug, Clone, Default)]
pub struct ActivityMachine {
    current: Activity,
    generation: u64,
}

impl ActivityMachine {
    /// A machine in the initial `Idle` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current activity.
    #[must_use]
    pub fn current(&self) -> Activity {
        self.current
    }

    /// Number of transitions so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the pet is asleep.
    #[must_use]
    pub fn is_sleeping(&self) -> bool {
        self.current == Activity::Sleeping
    }

    /// Enter `to` unconditionally.
    ///
    /// Re-entering the current activity still counts as a transition, so the
    /// latest action always owns the pending revert.
    pub fn enter(&mut self, to: Activity) -> Transition {
        let from = self.current;
        self.current = to;
        self.generation = self.generation.wrapping_add(1);
        Transition {
            from,
            to,
            generation: self.generation,
        }
    }

    /// Fall asleep unless already sleeping.
    pub fn fall_asleep(&mut self) -> Option<Transition> {
        if self.is_sleeping() {
            return None;
        }
        Some(self.enter(Activity::Sleeping))
    }

    /// Wake to idle if sleeping.
    pub fn wake(&mut self) -> Option<Transition> {
        if !self.is_sleeping() {
            return None;
        }
        Some(self.enter(Activity::Idle))
    }

    /// Token for a revert that should fire only if nothing else happens first.
    #[must_use]
    pub fn revert_token(&self) -> RevertToken {
        RevertToken {
            expected: self.current,
            generation: self.generation,
        }
    }

    /// Apply a delayed revert to idle if `token` is still current.
    ///
    /// Returns `None` for a stale token.
    pub fn try_revert(&mut self, token: RevertToken) -> Option<Transition> {
        if self.current != token.expected || self.generation != token.generation {
            return None;
        }
        Some(self.enter(Activity::Idle))
    }
}
