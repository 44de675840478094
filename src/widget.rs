//! The assistant chat widget.
//!
//! [`ChatWidget`] gates the chat behind a stored credential, replays and
//! persists the transcript, and runs at most one request to the assistant at
//! a time. All of its timers and flags live on the instance, so a widget can
//! be built, driven and disposed repeatedly without a page around it.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ai_helper::client::HttpAssistantClient;
//! use ai_helper::config::TimingConfig;
//! use ai_helper::storage::MemoryStore;
//! use ai_helper::view::Elements;
//! use ai_helper::widget::ChatWidget;
//!
//! # async fn example() -> ai_helper::Result<()> {
//! let client = HttpAssistantClient::new("http://127.0.0.1:5000", "/ai/ask")?;
//! let widget = ChatWidget::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(client),
//!     Elements::default(),
//!     TimingConfig::default(),
//! );
//! widget.init();
//! widget.submit_key("sk-or-...");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::client::AssistantClient;
use crate::config::TimingConfig;
use crate::error::Error;
use crate::indicator::LoadingIndicator;
use crate::storage::{CREDENTIAL_KEY, KeyValueStore, TRANSCRIPT_KEY};
use crate::transcript::{Message, Transcript};
use crate::view::{Elements, Mode, NoticeKind, ViewEvent, ViewState, render_page};

pub const EMPTY_KEY_NOTICE: &str = "Enter a key";
pub const KEY_SAVED_NOTICE: &str = "✅ Key saved!";
pub const KEY_SAVE_FAILED_NOTICE: &str = "Could not save the key";
pub const KEY_REMOVED_NOTICE: &str = "✅ Key removed";
pub const GREETING: &str = "API key saved. How can I help?";
pub const MISSING_KEY_ERROR: &str = "API key not found. Please enter your key again.";
pub const INVALID_KEY_ERROR: &str = "Invalid API key. Please enter your key again.";

/// Result of [`ChatWidget::submit_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySubmission {
    /// Input was blank; an error notice is showing.
    Rejected,
    /// Key stored; the chat opens after the switch delay.
    Saved,
    /// Storage refused the write.
    StorageFailed,
}

/// Result of [`ChatWidget::submit_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No handler attached, chat hidden, or a request is already in flight.
    Ignored,
    /// Blank input; nothing happened.
    Empty,
    /// No credential stored; an error bubble was added and the key form shown.
    MissingCredential,
    /// The assistant answered.
    Answered,
    /// The request failed; an error bubble was added.
    Failed {
        /// The failure looked credential-related and the key was dropped.
        credential_rejected: bool,
    },
    /// The widget was disposed while the request was in flight; the result
    /// was dropped and nothing was persisted.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Char(char),
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    #[must_use]
    pub fn any(self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// A key press in the message text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyPress {
    #[must_use]
    pub fn enter() -> Self {
        Self {
            key: Key::Enter,
            modifiers: Modifiers::default(),
        }
    }

    #[must_use]
    pub fn shift_enter() -> Self {
        Self {
            key: Key::Enter,
            modifiers: Modifiers {
                shift: true,
                ..Modifiers::default()
            },
        }
    }
}

/// What the host should do with a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Swallow the key and submit the form.
    Submit,
    /// Let the text field handle it (Shift+Enter inserts a newline).
    Default,
}

/// Whether a failure text looks like a credential problem.
///
/// This is a keyword heuristic over arbitrary server text, not a contract:
/// `401`, `API`, or any casing of `auth` / `key` counts.
#[must_use]
pub fn is_credential_failure(text: &str) -> bool {
    let lower = text.to_lowercase();
    text.contains("401") || text.contains("API") || lower.contains("auth") || lower.contains("key")
}

#[derive(Debug, Default)]
struct Lifecycle {
    chat_attached: bool,
    in_flight: bool,
    /// Bumped by `dispose`; results from an older epoch are dropped.
    epoch: u64,
    notice_generation: u64,
    timers: Vec<JoinHandle<()>>,
}

struct WidgetInner {
    store: Arc<dyn KeyValueStore>,
    client: Arc<dyn AssistantClient>,
    timing: TimingConfig,
    view: Arc<Mutex<ViewState>>,
    transcript: Mutex<Transcript>,
    lifecycle: Mutex<Lifecycle>,
}

/// The chat widget. Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct ChatWidget {
    inner: Arc<WidgetInner>,
}

impl fmt::Debug for ChatWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatWidget")
            .field("mode", &self.mode())
            .field("transcript_len", &self.inner.transcript.lock().len())
            .field("lifecycle", &*self.inner.lifecycle.lock())
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag on every exit path.
struct InFlight<'a>(&'a Mutex<Lifecycle>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.lock().in_flight = false;
    }
}

impl ChatWidget {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        client: Arc<dyn AssistantClient>,
        elements: Elements,
        timing: TimingConfig,
    ) -> Self {
        Self {
            inner: Arc::new(WidgetInner {
                store,
                client,
                timing,
                view: Arc::new(Mutex::new(ViewState::new(elements))),
                transcript: Mutex::new(Transcript::new()),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Mode gate: open the chat if a credential is stored, otherwise show the
    /// key form and do nothing else.
    pub fn init(&self) -> Mode {
        let has_key = self.has_credential();
        tracing::info!(saved_key = has_key, "Initializing chat widget");

        if has_key {
            self.show_chat();
            self.init_chat();
            Mode::Chat
        } else {
            self.show_key_entry();
            Mode::KeyEntry
        }
    }

    /// Replay the stored transcript, attach the submit handler and focus the
    /// text field. Safe to call on every switch into chat mode.
    ///
    /// Returns `false` when the page lacks the message list, form or text
    /// field.
    pub fn init_chat(&self) -> bool {
        let elements = self.inner.view.lock().elements();
        if !elements.has_chat_elements() {
            tracing::error!(?elements, "Chat elements missing, skipping chat initialization");
            return false;
        }

        let loaded = Transcript::load(self.inner.store.as_ref());
        {
            let mut transcript = self.inner.transcript.lock();
            *transcript = loaded;
            self.inner.view.lock().replay_messages(transcript.messages());
        }

        self.inner.lifecycle.lock().chat_attached = true;
        self.inner.view.lock().focus_input();
        tracing::debug!(message_count = self.transcript_len(), "Chat initialized");
        true
    }

    /// Cancel pending timers, detach the chat handler and reset the view.
    ///
    /// Stored credential and transcript are left alone. A request already in
    /// flight cannot be aborted, but its result is dropped when it resolves.
    pub fn dispose(&self) {
        let timers = {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.chat_attached = false;
            lifecycle.epoch += 1;
            lifecycle.notice_generation += 1;
            std::mem::take(&mut lifecycle.timers)
        };
        for timer in timers {
            timer.abort();
        }

        self.inner.transcript.lock().clear();
        let mut view = self.inner.view.lock();
        view.hide_notice();
        view.clear_messages();
        view.set_mode(Mode::Uninitialized);
        tracing::debug!("Chat widget disposed");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Key form
    // ─────────────────────────────────────────────────────────────────────────

    /// Put text into the key field.
    pub fn type_key(&self, text: impl Into<String>) {
        self.inner.view.lock().set_key_input(text);
    }

    /// Save button: submit whatever is in the key field.
    pub fn save_key(&self) -> KeySubmission {
        let raw = self.inner.view.lock().key_input().to_string();
        self.submit_key(&raw)
    }

    /// Handle the key form's save button.
    pub fn submit_key(&self, raw: &str) -> KeySubmission {
        let key = raw.trim();
        if key.is_empty() {
            self.show_notice(EMPTY_KEY_NOTICE, NoticeKind::Error);
            return KeySubmission::Rejected;
        }

        if let Err(e) = self.inner.store.set(CREDENTIAL_KEY, key) {
            tracing::error!(error = %e, "Failed to store API key");
            self.show_notice(KEY_SAVE_FAILED_NOTICE, NoticeKind::Error);
            return KeySubmission::StorageFailed;
        }
        tracing::info!("API key saved");
        self.show_notice(KEY_SAVED_NOTICE, NoticeKind::Success);

        self.schedule(self.inner.timing.chat_switch(), |widget| {
            widget.show_chat();
            widget.init_chat();
            widget.add_message(Message::assistant_html(GREETING));
        });

        KeySubmission::Saved
    }

    /// Drop the stored credential and transcript and go back to the key form.
    pub fn clear_credential(&self) {
        for key in [CREDENTIAL_KEY, TRANSCRIPT_KEY] {
            if let Err(e) = self.inner.store.remove(key) {
                tracing::error!(key, error = %e, "Failed to remove stored value");
            }
        }
        self.inner.transcript.lock().clear();

        {
            let mut view = self.inner.view.lock();
            view.set_mode(Mode::KeyEntry);
            view.clear_messages();
            view.clear_key_input();
        }
        tracing::info!("API key removed");
        self.show_notice(KEY_REMOVED_NOTICE, NoticeKind::Success);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chat
    // ─────────────────────────────────────────────────────────────────────────

    /// Put text into the message field, as typing would.
    pub fn type_text(&self, text: impl Into<String>) {
        self.inner.view.lock().set_input(text);
    }

    /// Key handler for the message field. Only bound once the chat is
    /// initialized.
    pub fn handle_key(&self, press: KeyPress) -> KeyAction {
        if !self.inner.lifecycle.lock().chat_attached {
            return KeyAction::Default;
        }
        match press.key {
            Key::Enter if !press.modifiers.any() => KeyAction::Submit,
            _ => KeyAction::Default,
        }
    }

    /// Submit the message form.
    ///
    /// Appends exactly one user message before the request and exactly one
    /// assistant message (answer or error) after it.
    pub async fn submit_message(&self) -> SubmitOutcome {
        let Some((_in_flight, epoch)) = self.admit() else {
            return SubmitOutcome::Ignored;
        };

        let raw = self.inner.view.lock().input().to_string();
        let text = raw.trim();
        if text.is_empty() {
            return SubmitOutcome::Empty;
        }

        let Some(api_key) = self.credential() else {
            tracing::warn!("Message submitted without a stored API key");
            self.add_message(Message::assistant_error(MISSING_KEY_ERROR));
            self.show_key_entry();
            return SubmitOutcome::MissingCredential;
        };

        self.add_message(Message::user(text));
        self.inner.view.lock().clear_input();

        let _indicator = LoadingIndicator::start(
            Arc::clone(&self.inner.view),
            self.inner.timing.indicator_tick(),
        );

        tracing::info!(text_length = text.len(), "Sending question to assistant");
        let result = self.inner.client.ask(text, &api_key).await;

        if self.inner.lifecycle.lock().epoch != epoch {
            tracing::debug!(ok = result.is_ok(), "Widget disposed, dropping assistant result");
            return SubmitOutcome::Discarded;
        }

        match result {
            Ok(markup) => {
                tracing::debug!(response_length = markup.len(), "Assistant answered");
                self.add_message(Message::assistant_html(markup));
                SubmitOutcome::Answered
            }
            Err(e) => self.handle_failure(&e),
        }
    }

    /// Wipe the rendered and stored transcript. No undo.
    pub fn clear_transcript(&self) {
        self.inner.transcript.lock().clear();
        if let Err(e) = self.inner.store.remove(TRANSCRIPT_KEY) {
            tracing::error!(error = %e, "Failed to remove chat history");
        }
        self.inner.view.lock().clear_messages();
        tracing::info!("Chat history cleared");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.inner.view.lock().mode()
    }

    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    /// Snapshot of the transcript.
    #[must_use]
    pub fn transcript(&self) -> Transcript {
        self.inner.transcript.lock().clone()
    }

    #[must_use]
    pub fn transcript_len(&self) -> usize {
        self.inner.transcript.lock().len()
    }

    /// Shared handle to the view state.
    #[must_use]
    pub fn view(&self) -> Arc<Mutex<ViewState>> {
        Arc::clone(&self.inner.view)
    }

    /// Subscribe to view changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.inner.view.lock().subscribe()
    }

    /// Render the widget fragment for the current state.
    #[must_use]
    pub fn render(&self) -> String {
        render_page(&self.inner.view.lock())
    }

    /// Number of scheduled timers that have not fired yet.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner
            .lifecycle
            .lock()
            .timers
            .iter()
            .filter(|t| !t.is_finished())
            .count()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn credential(&self) -> Option<String> {
        self.inner
            .store
            .get(CREDENTIAL_KEY)
            .filter(|key| !key.is_empty())
    }

    fn admit(&self) -> Option<(InFlight<'_>, u64)> {
        let chat_visible = self.mode() == Mode::Chat;
        let mut lifecycle = self.inner.lifecycle.lock();
        if !lifecycle.chat_attached || lifecycle.in_flight || !chat_visible {
            return None;
        }
        lifecycle.in_flight = true;
        Some((InFlight(&self.inner.lifecycle), lifecycle.epoch))
    }

    fn handle_failure(&self, error: &Error) -> SubmitOutcome {
        let mut text = error.to_string();
        tracing::error!(error = %text, "Assistant request failed");

        let credential_rejected = is_credential_failure(&text);
        if credential_rejected {
            if let Err(e) = self.inner.store.remove(CREDENTIAL_KEY) {
                tracing::error!(error = %e, "Failed to remove rejected API key");
            }
            tracing::warn!("API key rejected, asking for a new one");
            text = INVALID_KEY_ERROR.to_string();
            self.schedule(self.inner.timing.rekey(), ChatWidget::show_key_entry);
        }

        self.add_message(Message::assistant_error(&text));
        SubmitOutcome::Failed {
            credential_rejected,
        }
    }

    /// Append to the transcript, persist the whole transcript, render.
    fn add_message(&self, message: Message) {
        {
            let mut transcript = self.inner.transcript.lock();
            transcript.push(message.clone());
            if let Err(e) = transcript.persist(self.inner.store.as_ref()) {
                tracing::error!(error = %e, "Failed to persist chat history");
            }
        }
        self.inner.view.lock().append_message(message);
    }

    fn show_chat(&self) {
        self.inner.view.lock().set_mode(Mode::Chat);
    }

    fn show_key_entry(&self) {
        self.inner.view.lock().set_mode(Mode::KeyEntry);
    }

    fn show_notice(&self, text: &str, kind: NoticeKind) {
        let generation = {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.notice_generation += 1;
            lifecycle.notice_generation
        };
        self.inner.view.lock().show_notice(text, kind);

        self.schedule(self.inner.timing.notice(), move |widget| {
            // A newer notice owns the slot now.
            if widget.inner.lifecycle.lock().notice_generation == generation {
                widget.inner.view.lock().hide_notice();
            }
        });
    }

    fn schedule<F>(&self, delay: Duration, f: F)
    where
        F: FnOnce(&ChatWidget) + Send + 'static,
    {
        let weak: Weak<WidgetInner> = Arc::downgrade(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                f(&ChatWidget { inner });
            }
        });

        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.timers.retain(|t| !t.is_finished());
        lifecycle.timers.push(timer);
    }
}
