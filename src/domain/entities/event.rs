use super::{Chat, User};
use chrono::{DateTime, Utc};

/// One inbound update, decoded once at the transport boundary. Everything
/// downstream branches on this closed set instead of sniffing optional
/// fields out of the raw payload.
#[derive(Debug, Clone)]
pub enum Event {
    Message(IncomingMessage),
    EditedMessage(IncomingMessage),
    CallbackQuery(CallbackEvent),
}

impl Event {
    /// The chat the update originated from. Every update carries one; the
    /// registry touches it unconditionally.
    pub fn chat(&self) -> &Chat {
        match self {
            Event::Message(m) | Event::EditedMessage(m) => &m.chat,
            Event::CallbackQuery(c) => &c.chat,
        }
    }
}

/// A user reference inside a message. `Direct` is a plain `@handle` that
/// still needs resolution; `Tagged` carries the full user (used for people
/// without a handle).
#[derive(Debug, Clone)]
pub enum Mention {
    Direct(String),
    Tagged(User),
}

/// Pointer to an earlier message, carried on replies. Keeps just enough to
/// resolve a target user and to replicate the message elsewhere.
#[derive(Debug, Clone)]
pub struct ReplyRef {
    pub chat_id: i64,
    pub message_id: i64,
    pub sender: Option<User>,
    pub has_forward_origin: bool,
}

/// A new or edited chat message.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: i64,
    pub chat: Chat,
    pub sender: User,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub mentions: Vec<Mention>,
    pub reply_to: Option<ReplyRef>,
    pub has_forward_origin: bool,
    pub timestamp: DateTime<Utc>,
    pub raw: Option<serde_json::Value>,
}

impl IncomingMessage {
    pub fn new(id: i64, chat: Chat, sender: User) -> Self {
        Self {
            id,
            chat,
            sender,
            text: None,
            caption: None,
            mentions: Vec::new(),
            reply_to: None,
            has_forward_origin: false,
            timestamp: Utc::now(),
            raw: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_mentions(mut self, mentions: Vec<Mention>) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn with_reply_to(mut self, reply: ReplyRef) -> Self {
        self.reply_to = Some(reply);
        self
    }

    pub fn with_forward_origin(mut self) -> Self {
        self.has_forward_origin = true;
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Text or caption, whichever carries the payload.
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

/// An inline-button press. The core only uses it to keep the registry warm.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub id: String,
    pub chat: Chat,
    pub sender: User,
    pub data: Option<String>,
}
