//! Test utilities & fixtures.
//! A recording mock of the platform API plus builders for the event shapes
//! the scenario tests feed through the dispatcher.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use warden_bot::application::errors::BotError;
use warden_bot::application::messaging::EventDispatcher;
use warden_bot::application::services::{
    AccessControl, BroadcastEngine, ChatRegistry, ModerationGate, PresenceTracker,
};
use warden_bot::domain::entities::{Chat, ChatKind, IncomingMessage, ReplyRef, User};
use warden_bot::domain::traits::ChatApi;
use warden_bot::infrastructure::database::Database;

/// Everything the mock was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Sent {
        chat_id: i64,
        text: String,
    },
    Deleted {
        chat_id: i64,
        message_id: i64,
    },
    Forwarded {
        from_chat_id: i64,
        message_id: i64,
        dest_chat_id: i64,
    },
    Copied {
        from_chat_id: i64,
        message_id: i64,
        dest_chat_id: i64,
    },
}

/// Recording platform API. Deliveries to chats in the failure set error
/// like an unreachable recipient would.
#[derive(Default)]
pub struct MockApi {
    calls: Mutex<Vec<Outbound>>,
    failing_chats: Mutex<HashSet<i64>>,
    chat_admins: Mutex<HashSet<(i64, i64)>>,
    known_users: Mutex<Vec<User>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery to this chat fail from now on.
    pub fn fail_chat(&self, chat_id: i64) {
        self.failing_chats.lock().unwrap().insert(chat_id);
    }

    pub fn unfail_chat(&self, chat_id: i64) {
        self.failing_chats.lock().unwrap().remove(&chat_id);
    }

    pub fn make_chat_admin(&self, chat_id: i64, user_id: i64) {
        self.chat_admins.lock().unwrap().insert((chat_id, user_id));
    }

    /// Let `resolve_user` find this user by handle.
    pub fn add_known_user(&self, user: User) {
        self.known_users.lock().unwrap().push(user);
    }

    pub fn calls(&self) -> Vec<Outbound> {
        self.calls.lock().unwrap().clone()
    }

    /// Text messages sent to one chat, in order.
    pub fn sent_texts(&self, chat_id: i64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Outbound::Sent {
                    chat_id: id, text, ..
                } if id == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn deletions(&self) -> Vec<(i64, i64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Outbound::Deleted {
                    chat_id,
                    message_id,
                } => Some((chat_id, message_id)),
                _ => None,
            })
            .collect()
    }

    fn deliver(&self, chat_id: i64, call: Outbound) -> Result<(), BotError> {
        if self.failing_chats.lock().unwrap().contains(&chat_id) {
            return Err(BotError::Delivery(format!("chat {} unreachable", chat_id)));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, BotError> {
        self.deliver(
            chat_id,
            Outbound::Sent {
                chat_id,
                text: text.to_string(),
            },
        )?;
        Ok(1)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), BotError> {
        self.deliver(
            chat_id,
            Outbound::Deleted {
                chat_id,
                message_id,
            },
        )
    }

    async fn forward_message(
        &self,
        from_chat_id: i64,
        message_id: i64,
        dest_chat_id: i64,
    ) -> Result<i64, BotError> {
        self.deliver(
            dest_chat_id,
            Outbound::Forwarded {
                from_chat_id,
                message_id,
                dest_chat_id,
            },
        )?;
        Ok(2)
    }

    async fn copy_message(
        &self,
        from_chat_id: i64,
        message_id: i64,
        dest_chat_id: i64,
    ) -> Result<i64, BotError> {
        self.deliver(
            dest_chat_id,
            Outbound::Copied {
                from_chat_id,
                message_id,
                dest_chat_id,
            },
        )?;
        Ok(3)
    }

    async fn resolve_user(&self, handle_or_id: &str) -> Result<User, BotError> {
        if let Ok(id) = handle_or_id.parse::<i64>() {
            return Ok(User::new(id));
        }
        let handle = handle_or_id.trim_start_matches('@');
        self.known_users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username.as_deref() == Some(handle))
            .cloned()
            .ok_or(BotError::TargetUnresolved)
    }

    async fn is_chat_admin(&self, chat_id: i64, user_id: i64) -> Result<bool, BotError> {
        Ok(self.chat_admins.lock().unwrap().contains(&(chat_id, user_id)))
    }
}

pub const OWNER: i64 = 1000;

/// A fully wired bot over an in-memory store and the recording API.
pub struct TestBot {
    pub db: Arc<Database>,
    pub api: Arc<MockApi>,
    pub access: Arc<AccessControl>,
    pub registry: Arc<ChatRegistry>,
    pub presence: Arc<PresenceTracker>,
    pub moderation: Arc<ModerationGate>,
    pub broadcast: Arc<BroadcastEngine>,
    pub dispatcher: EventDispatcher,
}

pub fn test_bot() -> TestBot {
    let db = Arc::new(Database::in_memory().expect("in-memory db"));
    let api = Arc::new(MockApi::new());
    let api_dyn: Arc<dyn ChatApi> = api.clone();

    let access = Arc::new(AccessControl::new(OWNER, db.clone(), api_dyn.clone()));
    let registry = Arc::new(ChatRegistry::new(db.clone()));
    let presence = Arc::new(PresenceTracker::new(db.clone()));
    let moderation = Arc::new(ModerationGate::new(
        db.clone(),
        access.clone(),
        api_dyn.clone(),
    ));
    let broadcast = Arc::new(BroadcastEngine::new(
        db.clone(),
        access.clone(),
        registry.clone(),
        api_dyn.clone(),
    ));
    let dispatcher = EventDispatcher::new(
        api_dyn,
        db.clone(),
        registry.clone(),
        presence.clone(),
        moderation.clone(),
        broadcast.clone(),
        access.clone(),
        "/",
    );

    TestBot {
        db,
        api,
        access,
        registry,
        presence,
        moderation,
        broadcast,
        dispatcher,
    }
}

pub fn group_chat(id: i64) -> Chat {
    Chat::new(id, ChatKind::Group).with_title("test group")
}

pub fn private_chat(id: i64) -> Chat {
    Chat::new(id, ChatKind::Private)
}

pub fn member(id: i64, name: &str) -> User {
    User::new(id)
        .with_name(name, None::<String>)
        .with_username(name.to_lowercase())
}

pub fn text_message(id: i64, chat: Chat, sender: User, text: &str) -> IncomingMessage {
    IncomingMessage::new(id, chat, sender).with_text(text)
}

pub fn reply_ref(chat_id: i64, message_id: i64, sender: Option<User>) -> ReplyRef {
    ReplyRef {
        chat_id,
        message_id,
        sender,
        has_forward_origin: false,
    }
}

pub fn forwarded_reply_ref(chat_id: i64, message_id: i64) -> ReplyRef {
    ReplyRef {
        chat_id,
        message_id,
        sender: None,
        has_forward_origin: true,
    }
}
