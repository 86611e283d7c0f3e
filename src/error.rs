//! Error types for RelayBot.

use thiserror::Error;

use crate::providers::ProviderError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Transport error: {0}")]
    Transport(String),

    /// The drain observed queue state that its own lock should have made impossible.
    #[error("Queue state violation: {0}")]
    QueueState(String),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Web error: {0}")]
    Web(String),

    #[error("{0}")]
    Other(String),
}

impl From<teloxide::RequestError> for Error {
    fn from(e: teloxide::RequestError) -> Self {
        Error::Telegram(e.to_string())
    }
}
