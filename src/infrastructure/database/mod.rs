//! SQLite persistence for the bot's five stores.
//!
//! Every mutation is a single statement keyed by the row's natural key, so
//! concurrent event handlers never need a multi-step transaction. Handed out
//! as `Arc<Database>`; the inner connection is guarded by a mutex.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::application::errors::StorageError;
use crate::domain::entities::{Chat, ChatKind};

/// Stored away-state for one user. Exists only while the user is away.
#[derive(Debug, Clone)]
pub struct PresenceRecord {
    pub user_id: i64,
    pub reason: String,
    pub declared_secs: u64,
    pub since: DateTime<Utc>,
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_tables()?;
        Ok(db)
    }

    /// Private throwaway database, used by tests.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_tables()?;
        Ok(db)
    }

    fn init_tables(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chats (
                chat_id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL,
                title TEXT,
                first_seen TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS presence (
                user_id INTEGER PRIMARY KEY,
                reason TEXT NOT NULL DEFAULT '',
                declared_secs INTEGER NOT NULL DEFAULT 0,
                since TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sudoers (
                user_id INTEGER PRIMARY KEY,
                username TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS authorized (
                user_id INTEGER NOT NULL,
                chat_id INTEGER NOT NULL,
                PRIMARY KEY (user_id, chat_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocked (
                chat_id INTEGER PRIMARY KEY,
                marked_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    // Chat registry

    /// Record a chat if it is new. Returns true when a row was inserted.
    /// Duplicate observations (including racing ones) are no-ops.
    pub fn observe_chat(&self, chat: &Chat) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO chats (chat_id, kind, title) VALUES (?1, ?2, ?3)",
            params![chat.id, chat.kind.as_str(), chat.title],
        )?;
        Ok(inserted > 0)
    }

    pub fn get_chat(&self, chat_id: i64) -> Result<Option<Chat>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT chat_id, kind, title FROM chats WHERE chat_id = ?1",
                [chat_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, kind, title)| {
            let kind = ChatKind::parse(&kind)
                .ok_or_else(|| StorageError::Corrupt(format!("unknown chat kind '{}'", kind)))?;
            Ok(Chat { id, kind, title })
        })
        .transpose()
    }

    /// All known chats at call time.
    pub fn snapshot_chats(&self) -> Result<Vec<Chat>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT chat_id, kind, title FROM chats ORDER BY first_seen, chat_id")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut chats = Vec::new();
        for row in rows {
            let (id, kind, title) = row?;
            let kind = ChatKind::parse(&kind)
                .ok_or_else(|| StorageError::Corrupt(format!("unknown chat kind '{}'", kind)))?;
            chats.push(Chat { id, kind, title });
        }
        Ok(chats)
    }

    pub fn count_chats(&self, kind: ChatKind) -> Result<u64, StorageError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chats WHERE kind = ?1",
            [kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // Presence

    pub fn set_presence(
        &self,
        user_id: i64,
        reason: &str,
        declared_secs: u64,
        since: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO presence (user_id, reason, declared_secs, since)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, reason, declared_secs as i64, since.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_presence(&self, user_id: i64) -> Result<Option<PresenceRecord>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT user_id, reason, declared_secs, since FROM presence WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(user_id, reason, declared_secs, since)| {
            let since = DateTime::parse_from_rfc3339(&since)
                .map_err(|e| StorageError::Corrupt(format!("presence timestamp: {}", e)))?
                .with_timezone(&Utc);
            Ok(PresenceRecord {
                user_id,
                reason,
                declared_secs: declared_secs.max(0) as u64,
                since,
            })
        })
        .transpose()
    }

    /// Returns true when a record existed and was removed.
    pub fn clear_presence(&self, user_id: i64) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM presence WHERE user_id = ?1", [user_id])?;
        Ok(rows > 0)
    }

    // Sudoers

    pub fn add_sudoer(&self, user_id: i64, username: Option<&str>) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO sudoers (user_id, username) VALUES (?1, ?2)",
            params![user_id, username],
        )?;
        Ok(())
    }

    pub fn remove_sudoer(&self, user_id: i64) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM sudoers WHERE user_id = ?1", [user_id])?;
        Ok(rows > 0)
    }

    pub fn is_sudoer(&self, user_id: i64) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sudoers WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count_sudoers(&self) -> Result<u64, StorageError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sudoers", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // Edit-authorization allowlist

    pub fn grant_authorized(&self, user_id: i64, chat_id: i64) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO authorized (user_id, chat_id) VALUES (?1, ?2)",
            params![user_id, chat_id],
        )?;
        Ok(())
    }

    pub fn revoke_authorized(&self, user_id: i64, chat_id: i64) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "DELETE FROM authorized WHERE user_id = ?1 AND chat_id = ?2",
            params![user_id, chat_id],
        )?;
        Ok(rows > 0)
    }

    pub fn is_authorized(&self, user_id: i64, chat_id: i64) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM authorized WHERE user_id = ?1 AND chat_id = ?2",
            params![user_id, chat_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Blocked marks

    /// Note a failed delivery to a chat. Upsert; the newest failure wins.
    pub fn mark_blocked(&self, chat_id: i64, at: DateTime<Utc>) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO blocked (chat_id, marked_at) VALUES (?1, ?2)",
            params![chat_id, at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn is_blocked(&self, chat_id: i64) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM blocked WHERE chat_id = ?1",
            [chat_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count_blocked(&self) -> Result<u64, StorageError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM blocked", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
