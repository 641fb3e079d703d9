//! Application layer errors

use thiserror::Error;

/// General bot errors
///
/// `PermissionDenied`, `TargetUnresolved` and `NoSourceMessage` are
/// user-visible rejections; `Delivery` is recovered wherever a single
/// recipient failing must not sink the wider operation; `Storage` is fatal
/// for the invoked operation only.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Could not resolve a target user")]
    TargetUnresolved,

    #[error("No source message to replicate")]
    NoSourceMessage,

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
