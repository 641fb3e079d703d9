//! warden-bot - a moderation and presence bot for group chats.
//!
//! Layers follow the dependency direction: `domain` knows nothing of the
//! outside world, `application` holds the services and dispatching,
//! `infrastructure` carries the Telegram client, SQLite store and config.

pub mod application;
pub mod domain;
pub mod infrastructure;
