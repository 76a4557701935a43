//! # webpet-llm: Chat Layer for WebPet
//!
//! Lets the owner talk to the pet:
//!   - **Gemini** `generateContent` over HTTPS when a credential is set
//!   - **Local fallback** keyword replies otherwise, or on any failure
//!
//! A chat never fails from the caller's point of view. Backend errors are
//! logged and answered locally; the only visible trace is [`ApiStatus`].
//!
//! ```text
//! prompt ─▶ ChatSession ─┬─▶ GeminiClient ──ok──▶ reply
//!                        └─▶ fallback (unconfigured / error / timeout)
//! ```

pub mod client;
pub mod error;
pub mod fallback;
pub mod prompt;
pub mod session;
pub mod types;

pub use client::{ApiStatus, ChatBackend, GeminiClient, NoBackend};
pub use error::ChatError;
pub use session::{ChatSession, Reply, ReplySource};
pub use types::{ChatMessage, ChatRole, ChatSettings, PetSnapshot};
