use thiserror::Error;

use crate::beacon::database::DatabaseError;
use crate::beacon::token_provider::TokenError;
use crate::platform::PlatformError;

pub type Result<T> = core::result::Result<T, BeaconError>;

#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("Failed to initialize Beacon")]
    Initialization,

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Account not found")]
    AccountNotFound,

    #[error("Account is not synced with the platform")]
    AccountNotSynced,

    #[error("Notification feed subscription was declined by the platform")]
    SubscribeDeclined,

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Event processor error: {0}")]
    EventProcessor(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for BeaconError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        BeaconError::Other(anyhow::anyhow!(err.to_string()))
    }
}
