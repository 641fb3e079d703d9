//! Event dispatcher - routes each inbound event through the core services.
//!
//! Every event touches the chat registry first. Text messages then go
//! through the presence pass (clear the sender, then notify about mentioned
//! away users), edited messages go to the moderation gate, and commands are
//! routed to their service. A failure in any one event is logged and never
//! takes down the loop or other events.

use std::sync::Arc;

use crate::application::errors::BotError;
use crate::application::services::{
    AccessControl, BroadcastEngine, ChatRegistry, ModerationGate, PresenceTracker,
};
use crate::domain::entities::{ChatKind, Event, IncomingMessage, Mention, User};
use crate::domain::traits::ChatApi;
use crate::infrastructure::database::Database;

use super::parser::CommandParser;

pub struct EventDispatcher {
    api: Arc<dyn ChatApi>,
    db: Arc<Database>,
    registry: Arc<ChatRegistry>,
    presence: Arc<PresenceTracker>,
    moderation: Arc<ModerationGate>,
    broadcast: Arc<BroadcastEngine>,
    access: Arc<AccessControl>,
    parser: CommandParser,
}

impl EventDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn ChatApi>,
        db: Arc<Database>,
        registry: Arc<ChatRegistry>,
        presence: Arc<PresenceTracker>,
        moderation: Arc<ModerationGate>,
        broadcast: Arc<BroadcastEngine>,
        access: Arc<AccessControl>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            api,
            db,
            registry,
            presence,
            moderation,
            broadcast,
            access,
            parser: CommandParser::new(prefix),
        }
    }

    /// Process one inbound event to completion. Never propagates an error:
    /// anything that goes wrong is logged and confined to this event.
    pub async fn dispatch(&self, event: Event) {
        if let Err(e) = self.registry.observe(event.chat()) {
            tracing::error!("Chat registry observation failed: {}", e);
        }

        match event {
            Event::Message(msg) => self.on_message(msg).await,
            Event::EditedMessage(msg) => {
                if let Err(e) = self.moderation.on_edit(&msg).await {
                    tracing::error!("Edit moderation failed in chat {}: {}", msg.chat.id, e);
                }
            }
            Event::CallbackQuery(cb) => {
                // Registry touch above is all a callback gets.
                tracing::debug!("Ignoring callback query {} from {}", cb.id, cb.sender.id);
            }
        }
    }

    async fn on_message(&self, msg: IncomingMessage) {
        if let Some((name, args)) = msg.text.as_deref().and_then(|t| self.parser.parse(t)) {
            if let Some(reply) = self.handle_command(&msg, &name, &args).await {
                if let Err(e) = self.api.send_message(msg.chat.id, &reply).await {
                    tracing::error!("Could not reply in chat {}: {}", msg.chat.id, e);
                }
            }
            return;
        }

        // Plain text in a group: presence pass. The sender's own record is
        // cleared before mentions are resolved, so someone mentioning a
        // just-returned user never races a stale record.
        if msg.chat.kind == ChatKind::Group && msg.text.is_some() {
            match self.presence.clear_on_activity(&msg.sender) {
                Ok(Some(notice)) => {
                    if let Err(e) = self.api.send_message(msg.chat.id, &notice).await {
                        tracing::warn!("Could not send return notice: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::error!("Presence clear failed for {}: {}", msg.sender.id, e),
            }

            for user in self.resolve_mentioned_users(&msg).await {
                match self.presence.mention_notice(&user) {
                    Ok(Some(notice)) => {
                        if let Err(e) = self.api.send_message(msg.chat.id, &notice).await {
                            tracing::warn!("Could not send away notice: {}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::error!("Presence lookup failed for {}: {}", user.id, e),
                }
            }
        }
    }

    /// Turn mention entities into concrete users. Tagged mentions already
    /// carry the user; plain `@handle` mentions are resolved through the
    /// platform and silently skipped when resolution fails.
    async fn resolve_mentioned_users(&self, msg: &IncomingMessage) -> Vec<User> {
        let mut users = Vec::new();
        for mention in &msg.mentions {
            match mention {
                Mention::Tagged(user) => users.push(user.clone()),
                Mention::Direct(handle) => match self.api.resolve_user(handle).await {
                    Ok(user) => users.push(user),
                    Err(e) => tracing::debug!("Could not resolve mention @{}: {}", handle, e),
                },
            }
        }
        users
    }

    /// Route one command. Returns the reply text to send, or `None` when
    /// the command warrants no response in this chat.
    async fn handle_command(
        &self,
        msg: &IncomingMessage,
        name: &str,
        args: &[String],
    ) -> Option<String> {
        let sender = &msg.sender;
        match name {
            "start" => {
                if msg.chat.kind == ChatKind::Private {
                    Some("🚀 warden-bot is alive!\nUse /afk in groups; /help lists everything.".to_string())
                } else {
                    None
                }
            }

            "help" => Some(
                "Available commands:\n\
                 /afk [1d2h30m] [reason] - Mark yourself away (groups)\n\
                 /broadcast - Reply to a message to send it everywhere\n\
                 /auth, /unauth - Allow or disallow edits (reply, groups)\n\
                 /addsudo, /delsudo - Manage elevated access (owner)\n\
                 /stats - Store counters (elevated)"
                    .to_string(),
            ),

            "afk" | "away" => {
                if msg.chat.kind != ChatKind::Group {
                    return Some("Away status only works in group chats.".to_string());
                }
                match self.presence.set_away(sender, &args.join(" ")) {
                    Ok(ack) => Some(ack),
                    Err(e) => {
                        tracing::error!("Could not store away state for {}: {}", sender.id, e);
                        Some("Could not save your away status, try again later.".to_string())
                    }
                }
            }

            "broadcast" => match self.broadcast.run(sender.id, msg.reply_to.as_ref()).await {
                Ok(report) => Some(format!(
                    "📣 Broadcast finished.\n• Groups: {}\n• Users: {}\n• Failed: {}",
                    report.groups, report.users, report.failed
                )),
                Err(BotError::PermissionDenied) => {
                    Some("❌ You are not allowed to broadcast.".to_string())
                }
                Err(BotError::NoSourceMessage) => {
                    Some("Reply to the message you want to broadcast with /broadcast.".to_string())
                }
                Err(e) => {
                    tracing::error!("Broadcast failed: {}", e);
                    Some("Broadcast failed, try again later.".to_string())
                }
            },

            "addsudo" => {
                let arg = args.first().map(|s| s.as_str());
                match self
                    .access
                    .grant_sudo(sender.id, msg.reply_to.as_ref(), arg)
                    .await
                {
                    Ok(user) => Some(format!(
                        "🔑 {} can now use elevated commands.",
                        user.display_name()
                    )),
                    Err(BotError::PermissionDenied) => {
                        Some("❌ Only the owner can manage sudo access.".to_string())
                    }
                    Err(BotError::TargetUnresolved) => {
                        Some("Reply to the user or pass a handle: /addsudo @name".to_string())
                    }
                    Err(e) => {
                        tracing::error!("Sudo grant failed: {}", e);
                        Some("Could not update sudo access, try again later.".to_string())
                    }
                }
            }

            "delsudo" => {
                let arg = args.first().map(|s| s.as_str());
                match self
                    .access
                    .revoke_sudo(sender.id, msg.reply_to.as_ref(), arg)
                    .await
                {
                    Ok(user) => Some(format!(
                        "🔒 {} no longer has elevated access.",
                        user.display_name()
                    )),
                    Err(BotError::PermissionDenied) => {
                        Some("❌ Only the owner can manage sudo access.".to_string())
                    }
                    Err(BotError::TargetUnresolved) => {
                        Some("Reply to the user or pass a handle: /delsudo @name".to_string())
                    }
                    Err(e) => {
                        tracing::error!("Sudo revoke failed: {}", e);
                        Some("Could not update sudo access, try again later.".to_string())
                    }
                }
            }

            "auth" => {
                if msg.chat.kind != ChatKind::Group {
                    return Some("Edit authorization only applies to group chats.".to_string());
                }
                match self
                    .moderation
                    .grant(sender, &msg.chat, msg.reply_to.as_ref())
                    .await
                {
                    Ok(user) => Some(format!(
                        "✅ {} may edit messages in this chat.",
                        user.display_name()
                    )),
                    Err(BotError::PermissionDenied) => {
                        Some("❌ Only chat admins or bot staff can do that.".to_string())
                    }
                    Err(BotError::TargetUnresolved) => {
                        Some("Reply to a message from the user you want to allow.".to_string())
                    }
                    Err(e) => {
                        tracing::error!("Authorization grant failed: {}", e);
                        Some("Could not update the allowlist, try again later.".to_string())
                    }
                }
            }

            "unauth" => {
                if msg.chat.kind != ChatKind::Group {
                    return Some("Edit authorization only applies to group chats.".to_string());
                }
                match self
                    .moderation
                    .revoke(sender, &msg.chat, msg.reply_to.as_ref())
                    .await
                {
                    Ok(user) => Some(format!(
                        "🚫 {} may no longer edit messages here.",
                        user.display_name()
                    )),
                    Err(BotError::PermissionDenied) => {
                        Some("❌ Only chat admins or bot staff can do that.".to_string())
                    }
                    Err(BotError::TargetUnresolved) => {
                        Some("Reply to a message from the user you want to restrict.".to_string())
                    }
                    Err(e) => {
                        tracing::error!("Authorization revoke failed: {}", e);
                        Some("Could not update the allowlist, try again later.".to_string())
                    }
                }
            }

            "stats" => match self.access.has_elevated(sender.id) {
                Ok(true) => Some(self.stats_text()),
                Ok(false) => Some("❌ You are not allowed to view stats.".to_string()),
                Err(e) => {
                    tracing::error!("Stats access check failed: {}", e);
                    Some("Could not read stats, try again later.".to_string())
                }
            },

            other => {
                tracing::debug!("Ignoring unknown command /{}", other);
                None
            }
        }
    }

    fn stats_text(&self) -> String {
        let groups = self.db.count_chats(ChatKind::Group).unwrap_or(0);
        let users = self.db.count_chats(ChatKind::Private).unwrap_or(0);
        let sudoers = self.db.count_sudoers().unwrap_or(0);
        let blocked = self.db.count_blocked().unwrap_or(0);
        format!(
            "📊 Stats\n• Groups: {}\n• Private chats: {}\n• Sudoers: {}\n• Blocked chats: {}",
            groups, users, sudoers, blocked
        )
    }
}
