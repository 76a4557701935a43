//! Prompt templates and request construction.

use crate::types::{ChatMessage, ChatSettings, Content, GenerateRequest, GenerationConfig, PetSnapshot};

/// System instruction, sent as the first user turn.
pub const PET_SYSTEM: &str = r"You are a virtual pet named {pet_name}. Your personality is {personality}.
Reply as if you are a cute virtual pet helping your owner. Keep responses concise and playful.
Current pet stats: Happiness: {happiness}%, Energy: {energy}%, Hunger: {hunger}%, Productivity: {productivity}%";

/// Connectivity probe text.
pub const PROBE_PROMPT: &str = "Say hello";

/// Render a template by replacing `{key}` placeholders with values.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// The system instruction for a pet.
#[must_use]
pub fn system_prompt(pet: &PetSnapshot) -> String {
    let happiness = pet.happiness.to_string();
    let energy = pet.energy.to_string();
    let hunger = pet.hunger.to_string();
    let productivity = pet.productivity.to_string();
    render_template(
        PET_SYSTEM,
        &[
            ("pet_name", &pet.name),
            ("personality", &pet.personality),
            ("happiness", &happiness),
            ("energy", &energy),
            ("hunger", &hunger),
            ("productivity", &productivity),
        ],
    )
}

/// Build a chat request: system turn, the last `history_window` prior turns, then `prompt`.
///
/// `history` holds only turns that came before `prompt`.
#[must_use]
pub fn chat_request(
    settings: &ChatSettings,
    pet: &PetSnapshot,
    history: &[ChatMessage],
    prompt: &str,
) -> GenerateRequest {
    let window = &history[history.len().saturating_sub(settings.history_window)..];

    let mut contents = Vec::with_capacity(window.len() + 2);
    contents.push(Content::text(Some("user"), system_prompt(pet)));
    contents.extend(
        window
            .iter()
            .map(|m| Content::text(Some(m.role.wire_name()), m.content.clone())),
    );
    contents.push(Content::text(Some("user"), prompt));

    GenerateRequest {
        contents,
        generation_config: generation_config(settings),
    }
}

/// The single-turn connectivity probe.
#[must_use]
pub fn probe_request(settings: &ChatSettings) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content::text(None, PROBE_PROMPT)],
        generation_config: generation_config(settings),
    }
}

fn generation_config(settings: &ChatSettings) -> GenerationConfig {
    GenerationConfig {
        temperature: settings.temperature,
        max_output_tokens: settings.max_output_tokens,
    }
}
