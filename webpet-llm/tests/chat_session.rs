//! Chat session behaviour against scripted backends.
//!
//! No network: each backend here answers from memory, fails, or hangs.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;

use webpet_llm::fallback;
use webpet_llm::types::GenerateRequest;
use webpet_llm::{
    ApiStatus, ChatBackend, ChatError, ChatRole, ChatSession, ChatSettings, NoBackend,
    PetSnapshot, ReplySource,
};

/// Answers with a canned reply and records every request.
#[derive(Default)]
struct Scripted {
    reply: String,
    key: Option<String>,
    seen: Arc<Mutex<Vec<GenerateRequest>>>,
}

impl ChatBackend for Scripted {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ChatError> {
        self.seen.lock().push(request.clone());
        Ok(self.reply.clone())
    }

    fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    fn set_api_key(&mut self, key: Option<String>) {
        self.key = key;
    }
}

/// Always fails with an HTTP error.
struct Failing;

impl ChatBackend for Failing {
    async fn generate(&self, _request: &GenerateRequest) -> Result<String, ChatError> {
        Err(ChatError::Http {
            status: 500,
            body: "boom".into(),
        })
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn set_api_key(&mut self, _key: Option<String>) {}
}

/// Never answers.
struct Hanging;

impl ChatBackend for Hanging {
    async fn generate(&self, _request: &GenerateRequest) -> Result<String, ChatError> {
        std::future::pending::<()>().await;
        Ok(String::new())
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn set_api_key(&mut self, _key: Option<String>) {}
}

fn pet() -> PetSnapshot {
    PetSnapshot {
        name: "Rex".into(),
        personality: "friendly".into(),
        happiness: 90,
        energy: 70,
        hunger: 50,
        productivity: 20,
    }
}

fn rng() -> StdRng {
    StdRng::seed_from_u64(9)
}

#[tokio::test]
async fn backend_failure_falls_back_with_one_exchange() {
    let mut session = ChatSession::with_rng(Failing, ChatSettings::default(), rng());
    let reply = session.send("tell me a story", &pet()).await.expect("reply");

    assert_eq!(reply.source, ReplySource::Fallback);
    assert!(fallback::all_replies("Rex").contains(&reply.text));

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, ChatRole::User);
    assert_eq!(history[0].content, "tell me a story");
    assert_eq!(history[1].role, ChatRole::Assistant);
    assert_eq!(history[1].content, reply.text);
}

#[tokio::test]
async fn unconfigured_backend_is_never_called() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let backend = Scripted {
        reply: "remote".into(),
        key: None,
        seen: Arc::clone(&seen),
    };
    let mut session = ChatSession::with_rng(backend, ChatSettings::default(), rng());

    let reply = session.send("who are you?", &pet()).await.expect("reply");
    assert_eq!(reply.source, ReplySource::Fallback);
    assert_eq!(
        reply.text,
        "I'm Rex, your virtual pet and productivity companion!"
    );
    assert!(seen.lock().is_empty());
    assert_eq!(session.status().await, ApiStatus::Unconfigured);
}

#[tokio::test]
async fn configured_backend_gets_windowed_history() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let backend = Scripted {
        reply: "Woof!".into(),
        key: Some("k".into()),
        seen: Arc::clone(&seen),
    };
    let settings = ChatSettings {
        history_window: 2,
        ..ChatSettings::default()
    };
    let mut session = ChatSession::with_rng(backend, settings, rng());

    for prompt in ["one", "two", "three"] {
        let reply = session.send(prompt, &pet()).await.expect("reply");
        assert_eq!(reply.source, ReplySource::Backend);
        assert_eq!(reply.text, "Woof!");
    }
    assert_eq!(session.history().len(), 6);

    let last = seen.lock().last().cloned().expect("request");
    // system + two prior turns + prompt
    assert_eq!(last.contents.len(), 4);
    assert_eq!(last.contents[1].role.as_deref(), Some("user"));
    assert_eq!(last.contents[1].parts[0].text, "two");
    assert_eq!(last.contents[2].role.as_deref(), Some("model"));
    assert_eq!(last.contents[3].parts[0].text, "three");
    assert!(last.contents[0].parts[0].text.contains("named Rex"));
}

#[tokio::test]
async fn new_api_key_switches_to_backend() {
    let backend = Scripted {
        reply: "Hi from the cloud".into(),
        ..Scripted::default()
    };
    let mut session = ChatSession::with_rng(backend, ChatSettings::default(), rng());

    let before = session.send("hello", &pet()).await.expect("reply");
    assert_eq!(before.source, ReplySource::Fallback);

    session.set_api_key(Some("new-key".into()));
    let after = session.send("hello", &pet()).await.expect("reply");
    assert_eq!(after.source, ReplySource::Backend);
    assert_eq!(session.status().await, ApiStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn hung_backend_times_out_into_fallback() {
    let settings = ChatSettings {
        request_timeout_ms: 1_000,
        ..ChatSettings::default()
    };
    let mut session = ChatSession::with_rng(Hanging, settings, rng());
    let reply = session.send("feed me", &pet()).await.expect("reply");
    assert_eq!(reply.source, ReplySource::Fallback);
    assert_eq!(
        reply.text,
        "Feeling hungry? Use the feed button to give me some energy!"
    );
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn blank_prompt_is_ignored() {
    let mut session = ChatSession::with_rng(NoBackend, ChatSettings::default(), rng());
    assert!(session.send("   ", &pet()).await.is_none());
    assert!(session.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn abandoned_send_leaves_no_unpaired_line() {
    let settings = ChatSettings {
        request_timeout_ms: 60_000,
        ..ChatSettings::default()
    };
    let mut session = ChatSession::with_rng(Hanging, settings, rng());

    let abandoned = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        session.send("hello", &pet()),
    )
    .await;
    assert!(abandoned.is_err());
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn history_keeps_only_recent_exchanges() {
    let backend = Scripted {
        reply: "Woof!".into(),
        key: Some("k".into()),
        ..Scripted::default()
    };
    let settings = ChatSettings {
        history_window: 2,
        ..ChatSettings::default()
    };
    let mut session = ChatSession::with_rng(backend, settings, rng());

    for i in 0..20 {
        session.send(&format!("message {i}"), &pet()).await.expect("reply");
    }
    let history = session.history();
    assert_eq!(history.len(), 8);
    assert_eq!(history[0].role, ChatRole::User);
    assert_eq!(history[0].content, "message 16");
    assert_eq!(history[7].role, ChatRole::Assistant);
}
