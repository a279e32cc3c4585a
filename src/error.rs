use crate::state::TicketKind;
use thiserror::Error;

/// Startup configuration problems. These are the only errors that stop the bot.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tickets file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("tickets file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind}-ticket-{number:03} is already registered")]
    Duplicate { kind: TicketKind, number: u32 },
}

/// Failures reported by the chat platform adapter.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("chat platform request failed: {0}")]
    Transport(String),
    #[error("{0} not found")]
    NotFound(String),
}

impl PlatformError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        PlatformError::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum TicketError {
    /// The command or button was used outside a ticket channel.
    #[error("`{0}` is not a ticket channel")]
    NotATicketChannel(String),
    #[error("user {0} is not allowed to close tickets")]
    Denied(u64),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("discord client failed: {0}")]
    Client(#[from] serenity::Error),
}
