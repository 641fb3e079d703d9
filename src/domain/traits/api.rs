use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::domain::entities::User;

/// ChatApi trait - the outbound surface of the messaging platform.
///
/// Everything the core ever asks the platform to do goes through here, so
/// services stay testable against a recording mock and the Telegram client
/// stays an infrastructure detail.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send plain text to a chat. Returns the new message id.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, BotError>;

    /// Delete a message from a chat.
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), BotError>;

    /// Forward a message, keeping the original-author attribution.
    async fn forward_message(
        &self,
        from_chat_id: i64,
        message_id: i64,
        dest_chat_id: i64,
    ) -> Result<i64, BotError>;

    /// Copy a message without attribution.
    async fn copy_message(
        &self,
        from_chat_id: i64,
        message_id: i64,
        dest_chat_id: i64,
    ) -> Result<i64, BotError>;

    /// Resolve an `@handle` or numeric id to a concrete user.
    async fn resolve_user(&self, handle_or_id: &str) -> Result<User, BotError>;

    /// Whether the user holds an administrative role in the chat itself
    /// (creator or admin). This is a per-chat role, unrelated to the bot's
    /// own owner/sudo tiers.
    async fn is_chat_admin(&self, chat_id: i64, user_id: i64) -> Result<bool, BotError>;
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: i64,
    pub name: String,
    pub username: String,
}
