//! Turning free text into pet commands.

use webpet_core::Action;

/// What a spoken or typed phrase asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Run an action.
    Act(Action),
    /// Say hello back.
    Greet,
    /// Anything else goes to chat.
    Chat(String),
}

const VOICE_RULES: &[(&[&str], Action)] = &[
    (&["work", "task"], Action::Work),
    (&["play", "game"], Action::Play),
    (&["feed", "food"], Action::Feed),
];

/// Route a voice transcript. Keywords are matched as substrings, first rule wins.
#[must_use]
pub fn route_voice(transcript: &str) -> Intent {
    let lower = transcript.to_lowercase();
    if let Some((_, action)) = VOICE_RULES
        .iter()
        .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
    {
        return Intent::Act(*action);
    }
    if lower.contains("hello") || lower.contains("hi") {
        return Intent::Greet;
    }
    Intent::Chat(transcript.trim().to_string())
}
