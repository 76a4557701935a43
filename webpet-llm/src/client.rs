//! Chat backends: the Gemini HTTP client and the trait sessions talk through.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::prompt;
use crate::types::{ChatSettings, GenerateRequest, GenerateResponse, is_usable_key};

/// Something that turns a request into reply text.
pub trait ChatBackend: Send + Sync {
    /// Generate a reply.
    ///
    /// Callers fall back to a local reply on any error.
    fn generate(
        &self,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<String, ChatError>> + Send;

    /// Whether a usable credential is set. Unconfigured backends are never called.
    fn is_configured(&self) -> bool;

    /// Replace the credential.
    fn set_api_key(&mut self, key: Option<String>);
}

/// Connectivity as shown in the chat panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiStatus {
    /// No usable credential.
    Unconfigured,
    /// The probe succeeded.
    Connected,
    /// The probe failed.
    Error(String),
}

/// Send the "Say hello" probe and report the result.
pub async fn probe<B: ChatBackend>(backend: &B, settings: &ChatSettings) -> ApiStatus {
    if !backend.is_configured() {
        return ApiStatus::Unconfigured;
    }
    match backend.generate(&prompt::probe_request(settings)).await {
        Ok(_) => {
            debug!("Chat backend probe succeeded");
            ApiStatus::Connected
        }
        Err(e) => {
            warn!(error = %e, "Chat backend probe failed");
            ApiStatus::Error(e.to_string())
        }
    }
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    http: Client,
    settings: ChatSettings,
    api_key: Option<String>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("settings", &self.settings)
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client; `api_key` may be absent or the placeholder.
    #[must_use]
    pub fn new(settings: ChatSettings, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            settings,
            api_key,
        }
    }

    /// The settings this client was built with.
    #[must_use]
    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }

    async fn call(&self, key: &str, request: &GenerateRequest) -> Result<String, ChatError> {
        let timeout_ms = self.settings.request_timeout_ms;
        let start = Instant::now();
        let resp = self
            .http
            .post(self.endpoint())
            .query(&[("key", key)])
            .json(request)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatError::Timeout(timeout_ms)
                } else {
                    ChatError::from(e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Gemini returned error");
            return Err(ChatError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::UnexpectedResponse(e.to_string()))?;
        let text = parsed.into_text()?;

        debug!(
            latency_ms = start.elapsed().as_millis(),
            chars = text.len(),
            model = %self.settings.model,
            "Gemini reply received"
        );
        Ok(text)
    }
}

impl ChatBackend for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ChatError> {
        match self.api_key.as_deref() {
            Some(key) if is_usable_key(key) => self.call(key, request).await,
            _ => Err(ChatError::NotConfigured),
        }
    }

    fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(is_usable_key)
    }

    fn set_api_key(&mut self, key: Option<String>) {
        self.api_key = key;
    }
}

/// A backend with nothing behind it; every chat uses the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackend;

impl ChatBackend for NoBackend {
    async fn generate(&self, _request: &GenerateRequest) -> Result<String, ChatError> {
        Err(ChatError::Unavailable("No chat backend configured".into()))
    }

    fn is_configured(&self) -> bool {
        false
    }

    fn set_api_key(&mut self, _key: Option<String>) {}
}
