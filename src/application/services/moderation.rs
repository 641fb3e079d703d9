//! Edit moderation: unauthorized edits in group chats get deleted.

use std::sync::Arc;

use crate::application::errors::BotError;
use crate::application::services::AccessControl;
use crate::domain::entities::{Chat, IncomingMessage, ReplyRef, User};
use crate::domain::traits::ChatApi;
use crate::infrastructure::database::Database;

/// Deletes edited messages in group chats unless the editor holds an
/// allowlist entry for that chat. The allowlist itself is managed here too.
pub struct ModerationGate {
    db: Arc<Database>,
    access: Arc<AccessControl>,
    api: Arc<dyn ChatApi>,
}

impl ModerationGate {
    pub fn new(db: Arc<Database>, access: Arc<AccessControl>, api: Arc<dyn ChatApi>) -> Self {
        Self { db, access, api }
    }

    /// Handle an edited message. Applies only in group chats and only when
    /// the edit carries text or a caption; attachment-only edits pass
    /// through. Delete and notice are both best-effort: a platform failure
    /// is logged, never escalated.
    pub async fn on_edit(&self, msg: &IncomingMessage) -> Result<(), BotError> {
        if !msg.chat.is_group() {
            return Ok(());
        }
        let has_payload = msg.body().map(|b| !b.is_empty()).unwrap_or(false);
        if !has_payload {
            return Ok(());
        }
        if self.db.is_authorized(msg.sender.id, msg.chat.id)? {
            return Ok(());
        }

        if let Err(e) = self.api.delete_message(msg.chat.id, msg.id).await {
            tracing::warn!(
                "Could not delete edited message {} in chat {}: {}",
                msg.id,
                msg.chat.id,
                e
            );
        }

        let notice = format!(
            "✏️ {}, edited messages are not allowed here. Your edit was removed.",
            msg.sender.display_name()
        );
        if let Err(e) = self.api.send_message(msg.chat.id, &notice).await {
            tracing::warn!("Could not send edit notice to chat {}: {}", msg.chat.id, e);
        }

        Ok(())
    }

    /// Whether the requester may manage the allowlist for this chat: bot
    /// owner, sudo, or an admin of the chat itself.
    async fn can_manage(&self, requester: &User, chat: &Chat) -> Result<bool, BotError> {
        if self.access.has_elevated(requester.id)? {
            return Ok(true);
        }
        self.api.is_chat_admin(chat.id, requester.id).await
    }

    fn target_from_reply(reply: Option<&ReplyRef>) -> Result<User, BotError> {
        reply
            .and_then(|r| r.sender.clone())
            .ok_or(BotError::TargetUnresolved)
    }

    /// Exempt the replied-to user from edit moderation in this chat.
    /// Idempotent.
    pub async fn grant(
        &self,
        requester: &User,
        chat: &Chat,
        reply: Option<&ReplyRef>,
    ) -> Result<User, BotError> {
        if !self.can_manage(requester, chat).await? {
            return Err(BotError::PermissionDenied);
        }
        let target = Self::target_from_reply(reply)?;
        self.db.grant_authorized(target.id, chat.id)?;
        tracing::info!(
            "Edit authorization granted to {} in chat {}",
            target.id,
            chat.id
        );
        Ok(target)
    }

    /// Remove the replied-to user's exemption in this chat. Idempotent.
    pub async fn revoke(
        &self,
        requester: &User,
        chat: &Chat,
        reply: Option<&ReplyRef>,
    ) -> Result<User, BotError> {
        if !self.can_manage(requester, chat).await? {
            return Err(BotError::PermissionDenied);
        }
        let target = Self::target_from_reply(reply)?;
        if self.db.revoke_authorized(target.id, chat.id)? {
            tracing::info!(
                "Edit authorization revoked from {} in chat {}",
                target.id,
                chat.id
            );
        }
        Ok(target)
    }
}
