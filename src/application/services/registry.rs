//! Chat registry - the directory of every chat the bot has seen.

use std::sync::Arc;

use crate::application::errors::StorageError;
use crate::domain::entities::Chat;
use crate::infrastructure::database::Database;

/// Idempotent directory of known chats. `observe` runs for every inbound
/// update regardless of type; `snapshot` is the broadcast recipient set.
pub struct ChatRegistry {
    db: Arc<Database>,
}

impl ChatRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record the chat if it is new. Concurrent first observations of the
    /// same chat are tolerated; the row content is identical either way.
    pub fn observe(&self, chat: &Chat) -> Result<(), StorageError> {
        if self.db.observe_chat(chat)? {
            tracing::info!(
                "Registered {} chat {}{}",
                chat.kind,
                chat.id,
                chat.title
                    .as_deref()
                    .map(|t| format!(" ({})", t))
                    .unwrap_or_default()
            );
        }
        Ok(())
    }

    /// The full set of known chats at call time. Chats registered after the
    /// call are not part of the returned set.
    pub fn snapshot(&self) -> Result<Vec<Chat>, StorageError> {
        self.db.snapshot_chats()
    }
}
