//! Chat types and the Gemini `generateContent` wire format.

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Credential value shipped in stock configs; treated as "no credential".
pub const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY";

/// Whether `key` is a usable credential.
#[must_use]
pub fn is_usable_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != PLACEHOLDER_API_KEY
}

/// Who said a chat line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The owner.
    User,
    /// The pet.
    Assistant,
}

impl ChatRole {
    /// Role name on the Gemini wire.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "model",
        }
    }
}

/// One line of chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker.
    pub role: ChatRole,
    /// Text.
    pub content: String,
}

impl ChatMessage {
    /// A line from the owner.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// A line from the pet.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// What the chat prompt knows about the pet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PetSnapshot {
    /// Display name.
    pub name: String,
    /// Personality traits, comma separated.
    pub personality: String,
    /// Happiness percentage.
    pub happiness: u8,
    /// Energy percentage.
    pub energy: u8,
    /// Hunger percentage.
    pub hunger: u8,
    /// Productivity percentage.
    pub productivity: u8,
}

/// Chat backend settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    /// Base URL of the generative-language API.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum output tokens.
    pub max_output_tokens: u32,
    /// Prior turns sent with each request.
    pub history_window: usize,
    /// Hard timeout per call.
    pub request_timeout_ms: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.0-flash".into(),
            temperature: 0.7,
            max_output_tokens: 256,
            history_window: 10,
            request_timeout_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// A text fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// The text.
    #[serde(default)]
    pub text: String,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// `user` or `model`; omitted on single-shot probes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Text fragments.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A single-text turn.
    #[must_use]
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// Sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum output tokens.
    pub max_output_tokens: u32,
}

/// Body of a `generateContent` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Conversation turns, oldest first.
    pub contents: Vec<Content>,
    /// Sampling parameters.
    pub generation_config: GenerationConfig,
}

/// One candidate reply.
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    /// The reply turn.
    #[serde(default)]
    pub content: Option<Content>,
}

/// Response of a `generateContent` call.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    /// Candidate replies.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate.
    ///
    /// # Errors
    /// [`ChatError::UnexpectedResponse`] if any link in that chain is missing.
    pub fn into_text(self) -> Result<String, ChatError> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ChatError::UnexpectedResponse("no candidate text".into()))
    }
}
