//! Broadcast fan-out: replicate one message to every registered chat.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::errors::BotError;
use crate::application::services::{AccessControl, ChatRegistry};
use crate::domain::entities::{ChatKind, ReplyRef};
use crate::domain::traits::ChatApi;
use crate::infrastructure::database::Database;

/// Outcome of one broadcast run. Successes are tallied by recipient kind;
/// the three counters always sum to the snapshot size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub groups: u64,
    pub users: u64,
    pub failed: u64,
}

impl BroadcastReport {
    pub fn total(&self) -> u64 {
        self.groups + self.users + self.failed
    }
}

/// Replicates a source message to every chat in the registry snapshot.
/// Deliveries are attempted sequentially and independently; one failure
/// marks the chat blocked and moves on.
pub struct BroadcastEngine {
    db: Arc<Database>,
    access: Arc<AccessControl>,
    registry: Arc<ChatRegistry>,
    api: Arc<dyn ChatApi>,
}

impl BroadcastEngine {
    pub fn new(
        db: Arc<Database>,
        access: Arc<AccessControl>,
        registry: Arc<ChatRegistry>,
        api: Arc<dyn ChatApi>,
    ) -> Self {
        Self {
            db,
            access,
            registry,
            api,
        }
    }

    /// Run a broadcast of the given source message on behalf of the
    /// requester. A source that already carries forward provenance is
    /// forwarded (keeping attribution); anything else is copied.
    pub async fn run(
        &self,
        requester_id: i64,
        source: Option<&ReplyRef>,
    ) -> Result<BroadcastReport, BotError> {
        if !self.access.has_elevated(requester_id)? {
            return Err(BotError::PermissionDenied);
        }
        let source = source.ok_or(BotError::NoSourceMessage)?;

        let run_id = Uuid::new_v4();
        let snapshot = self.registry.snapshot()?;
        tracing::info!(
            "Broadcast {} by {}: {} recipients",
            run_id,
            requester_id,
            snapshot.len()
        );

        let mut report = BroadcastReport::default();
        for chat in &snapshot {
            let delivery = if source.has_forward_origin {
                self.api
                    .forward_message(source.chat_id, source.message_id, chat.id)
                    .await
            } else {
                self.api
                    .copy_message(source.chat_id, source.message_id, chat.id)
                    .await
            };

            match delivery {
                Ok(_) => match chat.kind {
                    ChatKind::Group => report.groups += 1,
                    ChatKind::Private => report.users += 1,
                },
                Err(e) => {
                    tracing::warn!("Broadcast {}: delivery to {} failed: {}", run_id, chat.id, e);
                    report.failed += 1;
                    if let Err(e) = self.db.mark_blocked(chat.id, Utc::now()) {
                        tracing::error!("Could not mark chat {} blocked: {}", chat.id, e);
                    }
                }
            }
        }

        tracing::info!(
            "Broadcast {} done: {} groups, {} users, {} failed",
            run_id,
            report.groups,
            report.users,
            report.failed
        );
        Ok(report)
    }
}
