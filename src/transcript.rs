//! Chat transcript: the ordered message history of one widget.
//!
//! The in-memory [`Transcript`] is the single source of truth. The view is
//! rendered from it and persistence serializes it directly, so replaying a
//! stored transcript never needs to touch storage.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{KeyValueStore, TRANSCRIPT_KEY};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing into the widget.
    User,
    /// The remote assistant, or the widget speaking on its behalf.
    Assistant,
}

impl Role {
    /// CSS class used for this role's message row.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Avatar label shown next to the bubble.
    #[must_use]
    pub fn avatar(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "AI",
        }
    }
}

/// A single chat message. `content` is markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: Role,
    /// Markup shown inside the bubble.
    pub content: String,
}

impl Message {
    /// User message built from raw typed text. The text is escaped.
    #[must_use]
    pub fn user(raw: &str) -> Self {
        Self {
            role: Role::User,
            content: escape_user_text(raw),
        }
    }

    /// Assistant message carrying pre-rendered markup, stored as-is.
    #[must_use]
    pub fn assistant_html(markup: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: markup.into(),
        }
    }

    /// Assistant message rendered as an error bubble.
    #[must_use]
    pub fn assistant_error(text: &str) -> Self {
        Self::assistant_html(error_markup(text))
    }
}

/// Append-only chronological list of messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted transcript.
    ///
    /// A corrupt blob is logged and removed from storage, and an empty
    /// transcript is returned in its place.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let Some(raw) = store.get(TRANSCRIPT_KEY) else {
            return Self::new();
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => {
                tracing::debug!(message_count = messages.len(), "Transcript loaded");
                Self { messages }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable chat history");
                if let Err(e) = store.remove(TRANSCRIPT_KEY) {
                    tracing::error!(error = %e, "Failed to remove corrupt chat history");
                }
                Self::new()
            }
        }
    }

    /// Overwrite the persisted blob with the full transcript.
    pub fn persist(&self, store: &dyn KeyValueStore) -> Result<()> {
        let raw = serde_json::to_string(&self.messages)?;
        store.set(TRANSCRIPT_KEY, &raw)
    }

    /// Append a message at the end.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages in chronological order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript has no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Escape typed text for display: HTML-escape, then newlines become `<br>`.
#[must_use]
pub fn escape_user_text(raw: &str) -> String {
    escape_html(raw).replace("\r\n", "\n").replace('\n', "<br>")
}

/// Wrap error text in the error bubble markup. The text is escaped.
#[must_use]
pub fn error_markup(text: &str) -> String {
    format!(
        r#"<div class="error-message"><strong>Error:</strong> {}</div>"#,
        escape_html(text)
    )
}

/// Minimal HTML escaping for text nodes and attribute values.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
