//! Render projection of the widget.
//!
//! [`ViewState`] is what the host page shows: which section is visible, the
//! rendered messages, the key-status notice and the loading indicator. It is
//! driven entirely by [`crate::widget::ChatWidget`]; every change is also
//! published as a [`ViewEvent`] so a host can mirror it (the terminal
//! front-end prints them, a browser host would patch the DOM).

use serde::Serialize;
use tokio::sync::broadcast;

use crate::transcript::{Message, escape_html};

/// Element identifiers the host page is expected to provide.
pub mod ids {
    pub const KEY_SECTION: &str = "api-key-section";
    pub const CHAT_SECTION: &str = "chat-section";
    pub const KEY_INPUT: &str = "api-key-input";
    pub const KEY_STATUS: &str = "key-status";
    pub const SAVE_KEY_BUTTON: &str = "save-key-btn";
    pub const MESSAGE_LIST: &str = "chat-container";
    pub const FORM: &str = "ai-form";
    pub const TEXT_INPUT: &str = "user_text";
    pub const SUBMIT_BUTTON: &str = "submit-btn";
    pub const LOADING_INDICATOR: &str = "loading-indicator";
    pub const DOTS: &str = "dots";
}

const EVENT_CAPACITY: usize = 256;

/// Which of the widget's elements exist on the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Elements {
    pub message_list: bool,
    pub form: bool,
    pub text_input: bool,
    pub submit_button: bool,
    pub loading_indicator: bool,
}

impl Default for Elements {
    fn default() -> Self {
        Self {
            message_list: true,
            form: true,
            text_input: true,
            submit_button: true,
            loading_indicator: true,
        }
    }
}

impl Elements {
    /// Chat initialization cannot proceed without these.
    #[must_use]
    pub fn has_chat_elements(&self) -> bool {
        self.message_list && self.form && self.text_input
    }

    /// The busy state needs both the indicator and the submit control.
    #[must_use]
    pub fn has_indicator(&self) -> bool {
        self.loading_indicator && self.submit_button
    }
}

/// Mutually exclusive UI modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Nothing shown yet; `init` has not run.
    Uninitialized,
    /// Key-entry form visible, chat hidden.
    KeyEntry,
    /// Chat visible, key-entry form hidden.
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient inline notice under the key form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
}

/// Changes published by [`ViewState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    ModeChanged(Mode),
    MessageAppended(Message),
    /// The message list was rebuilt from a stored transcript.
    MessagesReplayed(Vec<Message>),
    MessagesCleared,
    NoticeShown(Notice),
    NoticeHidden,
    Busy(bool),
    Dots(usize),
    InputCleared,
    KeyInputCleared,
    Focused,
}

/// Current state of everything the widget renders.
#[derive(Debug)]
pub struct ViewState {
    elements: Elements,
    mode: Mode,
    messages: Vec<Message>,
    notice: Option<Notice>,
    busy: bool,
    dots: usize,
    input: String,
    key_input: String,
    focused: bool,
    events: broadcast::Sender<ViewEvent>,
}

impl ViewState {
    #[must_use]
    pub fn new(elements: Elements) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            elements,
            mode: Mode::Uninitialized,
            messages: Vec::new(),
            notice: None,
            busy: false,
            dots: 0,
            input: String::new(),
            key_input: String::new(),
            focused: false,
            events,
        }
    }

    /// Subscribe to future changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: ViewEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    #[must_use]
    pub fn elements(&self) -> Elements {
        self.elements
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            tracing::debug!(from = ?self.mode, to = ?mode, "Switching widget mode");
            self.mode = mode;
            self.publish(ViewEvent::ModeChanged(mode));
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message.clone());
        self.publish(ViewEvent::MessageAppended(message));
    }

    pub fn replay_messages(&mut self, messages: &[Message]) {
        self.messages = messages.to_vec();
        self.publish(ViewEvent::MessagesReplayed(self.messages.clone()));
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.publish(ViewEvent::MessagesCleared);
    }

    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn show_notice(&mut self, text: impl Into<String>, kind: NoticeKind) {
        let notice = Notice {
            text: text.into(),
            kind,
        };
        self.notice = Some(notice.clone());
        self.publish(ViewEvent::NoticeShown(notice));
    }

    pub fn hide_notice(&mut self) {
        if self.notice.take().is_some() {
            self.publish(ViewEvent::NoticeHidden);
        }
    }

    /// Whether a request is in flight: submit disabled, indicator shown.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn set_busy(&mut self, busy: bool) {
        if self.busy != busy {
            self.busy = busy;
            if !busy {
                self.dots = 0;
            }
            self.publish(ViewEvent::Busy(busy));
        }
    }

    #[must_use]
    pub fn dots(&self) -> usize {
        self.dots
    }

    pub fn set_dots(&mut self, dots: usize) {
        self.dots = dots;
        self.publish(ViewEvent::Dots(dots));
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the text field's content, as typing would.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.publish(ViewEvent::InputCleared);
    }

    #[must_use]
    pub fn key_input(&self) -> &str {
        &self.key_input
    }

    pub fn set_key_input(&mut self, text: impl Into<String>) {
        self.key_input = text.into();
    }

    pub fn clear_key_input(&mut self) {
        self.key_input.clear();
        self.publish(ViewEvent::KeyInputCleared);
    }

    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn focus_input(&mut self) {
        self.focused = true;
        self.publish(ViewEvent::Focused);
    }
}

/// Render one message row.
#[must_use]
pub fn render_message(message: &Message) -> String {
    format!(
        r#"<div class="chat-message {role}"><div class="chat-avatar">{avatar}</div><div class="chat-bubble">{content}</div></div>"#,
        role = message.role.as_str(),
        avatar = message.role.avatar(),
        content = message.content,
    )
}

/// Render the whole widget fragment for the current state.
///
/// Before the mode gate has run both sections render hidden.
#[must_use]
pub fn render_page(state: &ViewState) -> String {
    let hidden = |visible: bool| if visible { "" } else { " hidden" };
    let key_visible = state.mode == Mode::KeyEntry;
    let chat_visible = state.mode == Mode::Chat;

    let notice = state.notice.as_ref().map_or_else(
        || format!(r#"<div id="{}" style="display: none"></div>"#, ids::KEY_STATUS),
        |n| {
            let class = match n.kind {
                NoticeKind::Success => "key-status success",
                NoticeKind::Error => "key-status error",
            };
            format!(
                r#"<div id="{}" class="{class}">{}</div>"#,
                ids::KEY_STATUS,
                escape_html(&n.text)
            )
        },
    );

    let messages: String = state.messages.iter().map(render_message).collect();
    let disabled = if state.busy { " disabled" } else { "" };
    let indicator_style = if state.busy { "block" } else { "none" };

    format!(
        r#"<section id="{key_section}" class="api-key-section{key_hidden}">
  <input id="{key_input}" type="password" value="{key_value}">
  <button id="{save_key}" type="button">Save key</button>
  {notice}
</section>
<section id="{chat_section}" class="chat-section{chat_hidden}">
  <div id="{list}" class="chat-container">{messages}</div>
  <div id="{indicator}" style="display: {indicator_style}">Thinking<span id="{dots}">{dot_text}</span></div>
  <form id="{form}">
    <textarea id="{text_input}" name="text">{input}</textarea>
    <button id="{submit}" type="submit"{disabled}>Send</button>
  </form>
</section>"#,
        key_section = ids::KEY_SECTION,
        key_hidden = hidden(key_visible),
        key_input = ids::KEY_INPUT,
        key_value = escape_html(&state.key_input),
        save_key = ids::SAVE_KEY_BUTTON,
        chat_section = ids::CHAT_SECTION,
        chat_hidden = hidden(chat_visible),
        list = ids::MESSAGE_LIST,
        indicator = ids::LOADING_INDICATOR,
        dots = ids::DOTS,
        dot_text = ".".repeat(state.dots),
        form = ids::FORM,
        text_input = ids::TEXT_INPUT,
        input = escape_html(&state.input),
        submit = ids::SUBMIT_BUTTON,
    )
}
