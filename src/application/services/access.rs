//! Owner/sudo access tiers.

use std::sync::Arc;

use crate::application::errors::BotError;
use crate::domain::entities::{ReplyRef, User};
use crate::domain::traits::ChatApi;
use crate::infrastructure::database::Database;

/// Two-tier access model: a single configured owner, plus a mutable set of
/// sudo users the owner maintains. The owner passes every sudo check without
/// needing an entry of their own.
pub struct AccessControl {
    owner_id: i64,
    db: Arc<Database>,
    api: Arc<dyn ChatApi>,
}

impl AccessControl {
    pub fn new(owner_id: i64, db: Arc<Database>, api: Arc<dyn ChatApi>) -> Self {
        Self { owner_id, db, api }
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        user_id == self.owner_id
    }

    pub fn is_sudo(&self, user_id: i64) -> Result<bool, BotError> {
        Ok(self.db.is_sudoer(user_id)?)
    }

    pub fn has_elevated(&self, user_id: i64) -> Result<bool, BotError> {
        Ok(self.is_owner(user_id) || self.is_sudo(user_id)?)
    }

    /// Pick the subject of a sudo mutation: the replied-to sender wins,
    /// otherwise an explicit `@handle`/id argument is resolved through the
    /// platform.
    async fn resolve_target(
        &self,
        reply: Option<&ReplyRef>,
        arg: Option<&str>,
    ) -> Result<User, BotError> {
        if let Some(user) = reply.and_then(|r| r.sender.clone()) {
            return Ok(user);
        }
        if let Some(arg) = arg {
            return self
                .api
                .resolve_user(arg)
                .await
                .map_err(|_| BotError::TargetUnresolved);
        }
        Err(BotError::TargetUnresolved)
    }

    /// Add a user to the sudo set. Owner only; granting an existing sudoer
    /// again succeeds without complaint.
    pub async fn grant_sudo(
        &self,
        requester_id: i64,
        reply: Option<&ReplyRef>,
        arg: Option<&str>,
    ) -> Result<User, BotError> {
        if !self.is_owner(requester_id) {
            return Err(BotError::PermissionDenied);
        }
        let target = self.resolve_target(reply, arg).await?;
        self.db.add_sudoer(target.id, target.username.as_deref())?;
        tracing::info!("Sudo granted to {} ({})", target.display_name(), target.id);
        Ok(target)
    }

    /// Remove a user from the sudo set. Owner only; revoking a non-member
    /// succeeds without complaint.
    pub async fn revoke_sudo(
        &self,
        requester_id: i64,
        reply: Option<&ReplyRef>,
        arg: Option<&str>,
    ) -> Result<User, BotError> {
        if !self.is_owner(requester_id) {
            return Err(BotError::PermissionDenied);
        }
        let target = self.resolve_target(reply, arg).await?;
        if self.db.remove_sudoer(target.id)? {
            tracing::info!("Sudo revoked from {} ({})", target.display_name(), target.id);
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Resolves numeric ids only; enough for target resolution tests.
    struct NumericApi;

    #[async_trait]
    impl ChatApi for NumericApi {
        async fn send_message(&self, _chat_id: i64, _text: &str) -> Result<i64, BotError> {
            Ok(1)
        }
        async fn delete_message(&self, _chat_id: i64, _message_id: i64) -> Result<(), BotError> {
            Ok(())
        }
        async fn forward_message(&self, _f: i64, _m: i64, _d: i64) -> Result<i64, BotError> {
            Ok(1)
        }
        async fn copy_message(&self, _f: i64, _m: i64, _d: i64) -> Result<i64, BotError> {
            Ok(1)
        }
        async fn resolve_user(&self, handle_or_id: &str) -> Result<User, BotError> {
            handle_or_id
                .parse::<i64>()
                .map(User::new)
                .map_err(|_| BotError::TargetUnresolved)
        }
        async fn is_chat_admin(&self, _chat_id: i64, _user_id: i64) -> Result<bool, BotError> {
            Ok(false)
        }
    }

    const OWNER: i64 = 10;

    fn access() -> AccessControl {
        AccessControl::new(OWNER, Arc::new(Database::in_memory().unwrap()), Arc::new(NumericApi))
    }

    fn reply_from(user_id: i64) -> ReplyRef {
        ReplyRef {
            chat_id: -1,
            message_id: 5,
            sender: Some(User::new(user_id).with_name("Yuki", None::<String>)),
            has_forward_origin: false,
        }
    }

    #[tokio::test]
    async fn owner_passes_every_check() {
        let access = access();
        assert!(access.is_owner(OWNER));
        assert!(access.has_elevated(OWNER).unwrap());
        // No sudoers entry behind it.
        assert!(!access.is_sudo(OWNER).unwrap());
    }

    #[tokio::test]
    async fn grant_and_revoke_are_owner_only() {
        let access = access();
        let reply = reply_from(55);

        let err = access.grant_sudo(99, Some(&reply), None).await.unwrap_err();
        assert!(matches!(err, BotError::PermissionDenied));
        assert!(!access.is_sudo(55).unwrap());

        access.grant_sudo(OWNER, Some(&reply), None).await.unwrap();
        assert!(access.is_sudo(55).unwrap());
        assert!(access.has_elevated(55).unwrap());

        let err = access.revoke_sudo(55, Some(&reply), None).await.unwrap_err();
        assert!(matches!(err, BotError::PermissionDenied));

        access.revoke_sudo(OWNER, Some(&reply), None).await.unwrap();
        assert!(!access.is_sudo(55).unwrap());
    }

    #[tokio::test]
    async fn grant_is_idempotent() {
        let access = access();
        let reply = reply_from(55);

        access.grant_sudo(OWNER, Some(&reply), None).await.unwrap();
        access.grant_sudo(OWNER, Some(&reply), None).await.unwrap();
        assert!(access.is_sudo(55).unwrap());

        // Revoking twice is also fine.
        access.revoke_sudo(OWNER, Some(&reply), None).await.unwrap();
        access.revoke_sudo(OWNER, Some(&reply), None).await.unwrap();
        assert!(!access.is_sudo(55).unwrap());
    }

    #[tokio::test]
    async fn target_comes_from_reply_or_argument() {
        let access = access();

        // Argument fallback when there is no reply.
        let granted = access.grant_sudo(OWNER, None, Some("314")).await.unwrap();
        assert_eq!(granted.id, 314);

        // Neither reply nor argument: unresolved.
        let err = access.grant_sudo(OWNER, None, None).await.unwrap_err();
        assert!(matches!(err, BotError::TargetUnresolved));

        // Unresolvable argument: unresolved.
        let err = access
            .grant_sudo(OWNER, None, Some("@nobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::TargetUnresolved));
    }
}
