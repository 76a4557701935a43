//! Deterministic timer queue driven by virtual time.
//!
//! The engine never reads a wall clock. Hosts advance the scheduler with the
//! elapsed time and the engine drains whatever fell due, in due-time order
//! (FIFO among timers due at the same instant). Tests advance it by hand.
//!
//! Cancellation is lazy: a cancelled timer's heap slot is skipped when it
//! reaches the top.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::activity::RevertToken;

/// Milliseconds of virtual engine time.
pub type Millis = u64;

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Periodic hunger drain.
    HungerDepletion,
    /// Periodic low-energy check.
    EnergyWatchdog,
    /// Periodic idle animation / drowsiness roll.
    IdleFidget,
    /// Periodic energy refill while asleep.
    SleepRecharge,
    /// One-shot return to idle after working or eating.
    Revert(RevertToken),
}

/// A timer that fell due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    /// Which timer fired.
    pub id: TimerId,
    /// What it does.
    pub kind: TimerKind,
    /// Virtual time at which it fired.
    pub at: Millis,
}

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    kind: TimerKind,
    period: Option<Millis>,
}

#[derive(Debug, PartialEq, Eq)]
struct Slot {
    due: Millis,
    seq: u64,
    id: TimerId,
}

// BinaryHeap is a max-heap; invert so the earliest due (then oldest seq) pops first.
impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Virtual-time timer queue.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Millis,
    heap: BinaryHeap<Slot>,
    entries: HashMap<TimerId, TimerEntry>,
    next_id: u64,
    next_seq: u64,
}

impl Scheduler {
    /// An empty scheduler at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Millis {
        self.now
    }

    /// Fire `kind` once, `delay` ms from now.
    pub fn schedule_once(&mut self, delay: Millis, kind: TimerKind) -> TimerId {
        self.insert(delay, kind, None)
    }

    /// Fire `kind` every `period` ms, first at `now + period`.
    ///
    /// A zero period is bumped to 1 ms so a periodic timer can never spin.
    pub fn schedule_every(&mut self, period: Millis, kind: TimerKind) -> TimerId {
        let period = period.max(1);
        self.insert(period, kind, Some(period))
    }

    /// Cancel a timer. Returns `true` if it was still active.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Whether `id` will still fire.
    #[must_use]
    pub fn is_active(&self, id: TimerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of active timers matching `pred`.
    pub fn count_active(&self, pred: impl Fn(&TimerKind) -> bool) -> usize {
        self.entries.values().filter(|e| pred(&e.kind)).count()
    }

    /// Due time of the earliest active timer.
    pub fn next_due(&mut self) -> Option<Millis> {
        self.discard_cancelled();
        self.heap.peek().map(|slot| slot.due)
    }

    /// Pop the next timer due at or before `until`, moving the clock to its due time.
    ///
    /// Periodic timers are re-armed one period after their previous due time.
    pub fn pop_due(&mut self, until: Millis) -> Option<Fired> {
        self.discard_cancelled();
        if self.heap.peek()?.due > until {
            return None;
        }
        let slot = self.heap.pop()?;
        let entry = *self.entries.get(&slot.id)?;
        self.now = self.now.max(slot.due);

        match entry.period {
            Some(period) => {
                let seq = self.bump_seq();
                self.heap.push(Slot {
                    due: slot.due.saturating_add(period),
                    seq,
                    id: slot.id,
                });
            }
            None => {
                self.entries.remove(&slot.id);
            }
        }

        Some(Fired {
            id: slot.id,
            kind: entry.kind,
            at: slot.due,
        })
    }

    /// Move the clock forward without firing anything.
    ///
    /// Callers drain [`Scheduler::pop_due`] first; the clock never runs backwards.
    pub fn set_now(&mut self, now: Millis) {
        self.now = self.now.max(now);
    }

    fn insert(&mut self, delay: Millis, kind: TimerKind, period: Option<Millis>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let seq = self.bump_seq();
        self.entries.insert(id, TimerEntry { kind, period });
        self.heap.push(Slot {
            due: self.now.saturating_add(delay),
            seq,
            id,
        });
        id
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn discard_cancelled(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.entries.contains_key(&top.id) {
                break;
            }
            self.heap.pop();
        }
    }
}
