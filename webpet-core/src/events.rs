//! Side effects the engine hands to its host.
//!
//! The engine never renders anything. Notifications, sounds, animations and
//! display refreshes are emitted as [`EngineEvent`]s into an [`EventSink`]
//! supplied at construction.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::activity::Activity;
use crate::state::PetState;

/// A sound the pet makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCue {
    /// Finished a work action.
    Work,
    /// Played, petted, or greeted.
    Happy,
    /// Started eating.
    Eat,
    /// Fidgeting while idle.
    Idle,
    /// Replied in chat.
    Bark,
}

/// A cosmetic animation on the pet sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Animation {
    /// Bounce for the given duration.
    Bounce {
        /// How long the bounce lasts.
        duration_ms: u64,
    },
}

/// Everything the engine tells the outside world.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A user-visible message.
    Notify(String),
    /// Play a sound.
    Sound(SoundCue),
    /// Play an animation.
    Animate(Animation),
    /// The activity changed; hosts swap the sprite.
    ActivityChanged {
        /// Previous activity.
        from: Activity,
        /// New activity.
        to: Activity,
    },
    /// The attribute store changed and was persisted; hosts redraw.
    StateChanged(PetState),
}

/// Receiver of engine side effects.
pub trait EventSink {
    /// Deliver one event. Must not block.
    fn emit(&self, event: EngineEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: EngineEvent) {
        (**self).emit(event);
    }
}

/// Records every event; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl RecordingSink {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every recorded event, leaving the log empty.
    pub fn drain(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Copy of every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    /// Just the notification texts, in order.
    #[must_use]
    pub fn notifications(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Notify(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    /// Just the activity transitions, in order.
    #[must_use]
    pub fn transitions(&self) -> Vec<(Activity, Activity)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::ActivityChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_clones_share_log() {
        let sink = RecordingSink::new();
        let other = sink.clone();
        other.emit(EngineEvent::Notify("hi".into()));
        other.emit(EngineEvent::ActivityChanged {
            from: Activity::Idle,
            to: Activity::Eating,
        });

        assert_eq!(sink.notifications(), vec!["hi".to_string()]);
        assert_eq!(sink.transitions(), vec![(Activity::Idle, Activity::Eating)]);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.events().is_empty());
    }
}
