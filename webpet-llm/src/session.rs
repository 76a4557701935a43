//! A chat conversation with the pet.
//!
//! Each accepted prompt adds exactly one user line and one pet line to the
//! history, whether the reply came from the backend or the local fallback.
//! Older exchanges are dropped once they fall well outside the request window.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use crate::client::{ApiStatus, ChatBackend, probe};
use crate::error::ChatError;
use crate::fallback;
use crate::prompt;
use crate::types::{ChatMessage, ChatSettings, PetSnapshot};

/// How many request windows of history a session keeps.
const RETAINED_WINDOWS: usize = 4;

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    /// The remote backend.
    Backend,
    /// The local responder.
    Fallback,
}

/// A pet reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// What the pet says.
    pub text: String,
    /// Who produced it.
    pub source: ReplySource,
}

/// Chat history plus the backend that answers it.
pub struct ChatSession<B> {
    backend: B,
    settings: ChatSettings,
    history: Vec<ChatMessage>,
    rng: StdRng,
}

impl<B> std::fmt::Debug for ChatSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("settings", &self.settings)
            .field("turns", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl<B: ChatBackend> ChatSession<B> {
    /// Start an empty conversation.
    pub fn new(backend: B, settings: ChatSettings) -> Self {
        Self::with_rng(backend, settings, StdRng::from_entropy())
    }

    /// Start an empty conversation with a fixed RNG for the fallback picks.
    pub fn with_rng(backend: B, settings: ChatSettings, rng: StdRng) -> Self {
        Self {
            backend,
            settings,
            history: Vec::new(),
            rng,
        }
    }

    /// Every line so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Forget the conversation.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Swap the credential, e.g. after the settings page saved a new one.
    pub fn set_api_key(&mut self, key: Option<String>) {
        self.backend.set_api_key(key);
    }

    /// Probe the backend.
    pub async fn status(&self) -> ApiStatus {
        probe(&self.backend, &self.settings).await
    }

    /// Send a prompt and record the exchange. Blank prompts are ignored.
    pub async fn send(&mut self, prompt: &str, pet: &PetSnapshot) -> Option<Reply> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }

        // History changes only once the reply is in hand.
        let result = if self.backend.is_configured() {
            let request = prompt::chat_request(&self.settings, pet, &self.history, prompt);
            let timeout_ms = self.settings.request_timeout_ms;
            match tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                self.backend.generate(&request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ChatError::Timeout(timeout_ms)),
            }
        } else {
            Err(ChatError::NotConfigured)
        };

        let reply = match result {
            Ok(text) => Reply {
                text,
                source: ReplySource::Backend,
            },
            Err(e) => {
                match e {
                    ChatError::NotConfigured => debug!("No chat credential, using fallback"),
                    ref other => warn!(error = %other, "Chat backend failed, using fallback"),
                }
                Reply {
                    text: fallback::reply(prompt, &pet.name, &mut self.rng),
                    source: ReplySource::Fallback,
                }
            }
        };

        self.history.push(ChatMessage::user(prompt));
        self.history.push(ChatMessage::assistant(reply.text.clone()));
        self.trim_history();
        Some(reply)
    }

    /// Drop the oldest exchanges beyond what future requests could still send.
    fn trim_history(&mut self) {
        let cap = self.settings.history_window.max(1) * RETAINED_WINDOWS;
        if self.history.len() > cap {
            // Whole exchanges only; history always holds user/pet pairs.
            let excess = (self.history.len() - cap).next_multiple_of(2);
            self.history.drain(..excess);
        }
    }
}
