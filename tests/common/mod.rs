//! Shared fixtures for widget tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ai_helper::ChatWidget;
use ai_helper::client::AssistantClient;
use ai_helper::config::TimingConfig;
use ai_helper::error::{Error, Result};
use ai_helper::storage::{CREDENTIAL_KEY, KeyValueStore, MemoryStore};
use ai_helper::view::Elements;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// What the scripted client does on its next call.
pub enum Reply {
    Ok(String),
    Err(Error),
    Panic,
}

/// Assistant that answers from a script and records every request.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedClient {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Hold every reply until `gate` is notified.
    pub fn gated(replies: impl IntoIterator<Item = Reply>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(replies)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AssistantClient for ScriptedClient {
    async fn ask(&self, text: &str, api_key: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .push((text.to_string(), api_key.to_string()));

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = self.replies.lock().pop_front();
        match reply {
            Some(Reply::Ok(markup)) => Ok(markup),
            Some(Reply::Err(e)) => Err(e),
            Some(Reply::Panic) => panic!("assistant blew up"),
            None => Err(Error::Status(500)),
        }
    }
}

pub struct Harness {
    pub widget: ChatWidget,
    pub store: Arc<MemoryStore>,
    pub client: Arc<ScriptedClient>,
}

pub fn harness(client: ScriptedClient) -> Harness {
    harness_with(client, Elements::default())
}

pub fn harness_with(client: ScriptedClient, elements: Elements) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let client = Arc::new(client);
    let widget = ChatWidget::new(
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
        Arc::clone(&client) as Arc<dyn AssistantClient>,
        elements,
        TimingConfig::default(),
    );
    Harness {
        widget,
        store,
        client,
    }
}

/// Harness with a stored key and the chat already open.
pub fn chatting(client: ScriptedClient) -> Harness {
    let h = harness(client);
    h.store.set(CREDENTIAL_KEY, "sk-test").unwrap();
    h.widget.init();
    h
}
