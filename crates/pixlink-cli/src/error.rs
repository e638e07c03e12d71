use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] pixlink_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Text cannot be empty")]
    EmptyText,
    #[error("Invalid id '{0}'")]
    InvalidId(String),
    #[error("Image not found: {0}")]
    ImageNotFound(String),
    #[error("Only the owner can delete '{0}'")]
    NotOwner(String),
    #[error("Failed to load gallery: {0}")]
    Gallery(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl CliError {
    /// Exit status: 2 when the input was rejected before any backend call.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::EmptyText | Self::InvalidId(_) | Self::NotOwner(_) => 2,
            Self::Core(error) if error.is_validation() => 2,
            _ => 1,
        }
    }
}
