//! Local replies used when the chat backend is unconfigured or failing.
//!
//! Keyword rules are checked in order against the lowercased prompt; the
//! first match wins. Anything else gets a random generic reply.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::prompt::render_template;

const RULES: &[(&[&str], &str)] = &[
    (
        &["help"],
        "I can help you stay productive and have fun! Try saying 'work', 'play', or 'feed' to interact with me.",
    ),
    (
        &["work", "task", "productive"],
        "Need to be productive? Try using the work button to earn coins and increase your productivity score!",
    ),
    (
        &["play", "game"],
        "Want to have fun? Check out the Games tab for mini-games we can play together!",
    ),
    (
        &["friend", "social"],
        "Looking for some company? Go to the Social tab to find and connect with friends!",
    ),
    (&["hello", "hi"], "Hello there! How can I help you today?"),
    (
        &["who are you", "your name"],
        "I'm {pet_name}, your virtual pet and productivity companion!",
    ),
    (
        &["feed", "food", "hungry"],
        "Feeling hungry? Use the feed button to give me some energy!",
    ),
    (
        &["api", "gemini"],
        "The Gemini API isn't configured yet. Please add your API key in the settings page!",
    ),
];

/// Replies for prompts no rule matches.
pub const GENERIC_REPLIES: [&str; 5] = [
    "That's interesting! Is there anything specific you'd like to do together?",
    "I'm here to help you stay productive and have fun!",
    "Would you like to play a game or get some work done?",
    "I'm still learning, but I'm here to be your companion!",
    "Woof! I mean... I'm here to assist you!",
];

/// Keyword-rule reply for `prompt`, if any rule matches.
#[must_use]
pub fn keyword_reply(prompt: &str, pet_name: &str) -> Option<String> {
    let lower = prompt.to_lowercase();
    RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, reply)| render_template(reply, &[("pet_name", pet_name)]))
}

/// Local reply: a keyword rule, or a random generic line.
pub fn reply<R: Rng + ?Sized>(prompt: &str, pet_name: &str, rng: &mut R) -> String {
    keyword_reply(prompt, pet_name).unwrap_or_else(|| {
        GENERIC_REPLIES
            .choose(rng)
            .copied()
            .unwrap_or(GENERIC_REPLIES[0])
            .to_string()
    })
}

/// Every reply the fallback can produce for a pet.
#[must_use]
pub fn all_replies(pet_name: &str) -> Vec<String> {
    RULES
        .iter()
        .map(|(_, reply)| render_template(reply, &[("pet_name", pet_name)]))
        .chain(GENERIC_REPLIES.iter().map(|s| (*s).to_string()))
        .collect()
}
