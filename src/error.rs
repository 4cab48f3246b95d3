/// Error types for the OmniOne chat client.
/// Provides comprehensive error handling for all client operations.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Server communication error: {0}")]
    ServerError(String),

    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),

    #[error("Invalid user: {0}")]
    InvalidUser(String),

    #[error("Message error: {0}")]
    MessageError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Database error: {0}")]
    DbError(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
