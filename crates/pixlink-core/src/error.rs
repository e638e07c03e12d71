//! Error types for pixlink-core

use thiserror::Error;

use crate::auth::AuthError;

/// Result type alias using pixlink-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pixlink-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Error message returned by the hosted backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Media/object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Realtime change feed error
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Auth collaborator error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Operation needs a signed-in user
    #[error("Sign in to continue")]
    AuthRequired,

    /// Signed-in user may not touch this record
    #[error("Not allowed: {0}")]
    Forbidden(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint rejected a write
    #[error("Already exists: {0}")]
    UniqueViolation(String),

    /// Username unique constraint rejected a profile save
    #[error("This username is already taken")]
    UsernameTaken,

    /// AI generation failed or returned nothing
    #[error("Image generation failed: {0}")]
    Generation(String),

    /// Input rejected before any network call
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// Whether the error was raised locally before reaching a backend.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::AuthRequired)
    }
}

/// Inline validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Text must not be empty")]
    EmptyContent,
    #[error("Username must not be empty")]
    UsernameEmpty,
    #[error("Username must be 3-20 characters long")]
    UsernameLength,
    #[error("Username may only contain letters, digits and underscores")]
    UsernameCharset,
    #[error("Only image files are accepted")]
    NotAnImage,
    #[error("Image must be at most 2 MiB")]
    FileTooLarge,
    #[error("Select an image first")]
    NoImageSelected,
    #[error("Add at least one tag")]
    NoTags,
    #[error("Enter a prompt")]
    EmptyPrompt,
    #[error("Generate an image before publishing")]
    NothingGenerated,
    #[error("Select a conversation first")]
    NoConversationSelected,
    #[error("You cannot start a chat with yourself")]
    SelfChat,
}
