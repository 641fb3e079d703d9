//! Telegram adapter
//!
//! Long-poll client for the Telegram Bot API. Inbound updates are decoded
//! exactly once into the domain [`Event`] variant; outbound traffic goes
//! through the [`ChatApi`] implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::application::errors::BotError;
use crate::domain::entities::{
    CallbackEvent, Chat as DomainChat, ChatKind, Event, IncomingMessage, Mention, ReplyRef,
    User as DomainUser,
};
use crate::domain::traits::{BotInfo, ChatApi};

/// Telegram API base URL
const API_BASE: &str = "https://api.telegram.org";

/// Telegram update type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub edited_message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub caption: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    pub reply_to_message: Option<Box<Message>>,
    /// Present when the message was forwarded from elsewhere. Carried
    /// opaquely; only its presence matters to us.
    pub forward_origin: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl User {
    fn into_domain(self) -> DomainUser {
        DomainUser {
            id: self.id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            is_bot: self.is_bot,
        }
    }
}

impl Chat {
    fn into_domain(self) -> DomainChat {
        let kind = ChatKind::from_platform(&self.kind);
        let title = self.title.or(self.first_name);
        DomainChat {
            id: self.id,
            kind,
            title,
        }
    }
}

/// Telegram entity offsets count UTF-16 code units, not bytes or chars.
fn utf16_slice(text: &str, offset: usize, length: usize) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let end = offset.checked_add(length)?;
    if end > units.len() {
        return None;
    }
    String::from_utf16(&units[offset..end]).ok()
}

fn collect_mentions(msg: &Message) -> Vec<Mention> {
    let Some(text) = msg.text.as_deref() else {
        return Vec::new();
    };

    let mut mentions = Vec::new();
    for entity in &msg.entities {
        match entity.kind.as_str() {
            "mention" => {
                if let Some(slice) = utf16_slice(text, entity.offset, entity.length) {
                    let handle = slice.trim_start_matches('@').to_string();
                    if !handle.is_empty() {
                        mentions.push(Mention::Direct(handle));
                    }
                }
            }
            "text_mention" => {
                if let Some(user) = entity.user.clone() {
                    mentions.push(Mention::Tagged(user.into_domain()));
                }
            }
            _ => {}
        }
    }
    mentions
}

fn decode_message(msg: Message) -> Option<IncomingMessage> {
    let sender = msg.from.clone()?.into_domain();
    let chat = msg.chat.clone().into_domain();
    let mentions = collect_mentions(&msg);

    let reply_to = msg.reply_to_message.as_deref().map(|r| ReplyRef {
        chat_id: r.chat.id,
        message_id: r.message_id,
        sender: r.from.clone().map(User::into_domain),
        has_forward_origin: r.forward_origin.is_some(),
    });

    let mut out = IncomingMessage::new(msg.message_id, chat, sender).with_mentions(mentions);
    if let Some(text) = msg.text.clone() {
        out = out.with_text(text);
    }
    if let Some(caption) = msg.caption.clone() {
        out = out.with_caption(caption);
    }
    if let Some(reply) = reply_to {
        out = out.with_reply_to(reply);
    }
    if msg.forward_origin.is_some() {
        out = out.with_forward_origin();
    }
    if let Ok(raw) = serde_json::to_value(&msg) {
        out = out.with_raw(raw);
    }
    Some(out)
}

/// Telegram bot adapter
pub struct TelegramAdapter {
    token: String,
    client: Client,
    info: BotInfo,
}

impl TelegramAdapter {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: Client::new(),
            info: BotInfo {
                id: 0,
                name: "warden-bot".to_string(),
                username: "warden_bot".to_string(),
            },
        }
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }

    /// POST one Bot API method and unwrap the `{ok, result}` envelope.
    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        payload: &impl Serialize,
    ) -> Result<R, BotError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        let data: ApiResponse<R> = response
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;

        if !data.ok {
            let why = data.description.unwrap_or_else(|| "unknown error".to_string());
            return Err(BotError::Delivery(format!("{}: {}", method, why)));
        }
        data.result
            .ok_or_else(|| BotError::Parse(format!("{}: empty result", method)))
    }

    /// Fetch bot info from Telegram API
    pub async fn fetch_bot_info(&mut self) -> Result<(), BotError> {
        #[derive(Deserialize)]
        struct Me {
            id: i64,
            first_name: String,
            username: String,
        }

        let me: Me = self.call("getMe", &serde_json::json!({})).await?;
        self.info = BotInfo {
            id: me.id,
            name: me.first_name,
            username: me.username,
        };
        Ok(())
    }

    pub fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }

    /// Get updates from Telegram using the getUpdates API
    pub async fn get_updates(&self, offset: i64, timeout: i64) -> Result<Vec<Update>, BotError> {
        #[derive(Serialize)]
        struct GetUpdatesRequest {
            offset: i64,
            timeout: i64,
            allowed_updates: Vec<String>,
        }

        let request = GetUpdatesRequest {
            offset,
            timeout,
            allowed_updates: vec![
                "message".to_string(),
                "edited_message".to_string(),
                "callback_query".to_string(),
            ],
        };

        self.call("getUpdates", &request).await
    }

    /// Get the next update offset
    pub fn get_next_offset(updates: &[Update]) -> i64 {
        updates.iter().map(|u| u.update_id + 1).max().unwrap_or(0)
    }

    /// Decode one update into a domain event. Updates without a usable
    /// payload (no sender, unknown type) decode to `None` and are skipped.
    pub fn decode_update(update: Update) -> Option<Event> {
        if let Some(msg) = update.message {
            return decode_message(msg).map(Event::Message);
        }
        if let Some(msg) = update.edited_message {
            return decode_message(msg).map(Event::EditedMessage);
        }
        if let Some(cb) = update.callback_query {
            let chat = cb.message.as_ref().map(|m| m.chat.clone().into_domain())?;
            return Some(Event::CallbackQuery(CallbackEvent {
                id: cb.id,
                chat,
                sender: cb.from.into_domain(),
                data: cb.data,
            }));
        }
        None
    }

    /// Register bot commands with Telegram
    pub async fn register_commands(&self) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct Command {
            command: String,
            description: String,
        }

        #[derive(Serialize)]
        struct SetMyCommandsRequest {
            commands: Vec<Command>,
        }

        let commands = vec![
            Command {
                command: "start".to_string(),
                description: "Start the bot".to_string(),
            },
            Command {
                command: "help".to_string(),
                description: "Show help message".to_string(),
            },
            Command {
                command: "afk".to_string(),
                description: "Mark yourself away".to_string(),
            },
            Command {
                command: "broadcast".to_string(),
                description: "Broadcast the replied-to message".to_string(),
            },
            Command {
                command: "auth".to_string(),
                description: "Allow edits for the replied-to user".to_string(),
            },
            Command {
                command: "unauth".to_string(),
                description: "Disallow edits for the replied-to user".to_string(),
            },
            Command {
                command: "stats".to_string(),
                description: "Show store counters".to_string(),
            },
        ];

        let _: bool = self
            .call("setMyCommands", &SetMyCommandsRequest { commands })
            .await?;
        tracing::info!("Registered bot commands with Telegram");
        Ok(())
    }
}

#[async_trait]
impl ChatApi for TelegramAdapter {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, BotError> {
        #[derive(Serialize)]
        struct SendMessageRequest<'a> {
            chat_id: i64,
            text: &'a str,
        }

        #[derive(Deserialize)]
        struct MessageResult {
            message_id: i64,
        }

        tracing::debug!("Sending to {}: {}", chat_id, text);
        let result: MessageResult = self
            .call("sendMessage", &SendMessageRequest { chat_id, text })
            .await?;
        Ok(result.message_id)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct DeleteMessageRequest {
            chat_id: i64,
            message_id: i64,
        }

        let _: bool = self
            .call(
                "deleteMessage",
                &DeleteMessageRequest {
                    chat_id,
                    message_id,
                },
            )
            .await?;
        Ok(())
    }

    async fn forward_message(
        &self,
        from_chat_id: i64,
        message_id: i64,
        dest_chat_id: i64,
    ) -> Result<i64, BotError> {
        #[derive(Serialize)]
        struct ForwardMessageRequest {
            chat_id: i64,
            from_chat_id: i64,
            message_id: i64,
        }

        #[derive(Deserialize)]
        struct MessageResult {
            message_id: i64,
        }

        let result: MessageResult = self
            .call(
                "forwardMessage",
                &ForwardMessageRequest {
                    chat_id: dest_chat_id,
                    from_chat_id,
                    message_id,
                },
            )
            .await?;
        Ok(result.message_id)
    }

    async fn copy_message(
        &self,
        from_chat_id: i64,
        message_id: i64,
        dest_chat_id: i64,
    ) -> Result<i64, BotError> {
        #[derive(Serialize)]
        struct CopyMessageRequest {
            chat_id: i64,
            from_chat_id: i64,
            message_id: i64,
        }

        #[derive(Deserialize)]
        struct CopyResult {
            message_id: i64,
        }

        let result: CopyResult = self
            .call(
                "copyMessage",
                &CopyMessageRequest {
                    chat_id: dest_chat_id,
                    from_chat_id,
                    message_id,
                },
            )
            .await?;
        Ok(result.message_id)
    }

    async fn resolve_user(&self, handle_or_id: &str) -> Result<DomainUser, BotError> {
        // Numeric ids need no lookup.
        if let Ok(id) = handle_or_id.parse::<i64>() {
            return Ok(DomainUser::new(id));
        }

        #[derive(Serialize)]
        struct GetChatRequest {
            chat_id: String,
        }

        let handle = handle_or_id.trim_start_matches('@');
        let chat: Chat = self
            .call(
                "getChat",
                &GetChatRequest {
                    chat_id: format!("@{}", handle),
                },
            )
            .await?;

        Ok(DomainUser {
            id: chat.id,
            username: chat.username,
            first_name: chat.first_name,
            last_name: chat.last_name,
            is_bot: false,
        })
    }

    async fn is_chat_admin(&self, chat_id: i64, user_id: i64) -> Result<bool, BotError> {
        #[derive(Serialize)]
        struct GetChatMemberRequest {
            chat_id: i64,
            user_id: i64,
        }

        #[derive(Deserialize)]
        struct ChatMember {
            status: String,
        }

        let member: ChatMember = self
            .call("getChatMember", &GetChatMemberRequest { chat_id, user_id })
            .await?;
        Ok(matches!(member.status.as_str(), "creator" | "administrator"))
    }
}
