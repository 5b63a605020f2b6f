//! Error types for the harvesting orchestrator
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the harvesting orchestrator
#[derive(Error, Debug)]
pub enum Error {
    /// Resource driver-related errors
    #[error("driver error: {0}")]
    Driver(String),

    /// Rarity storage-related errors
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The service reported a fatal error while creating a resource.
    /// Maps to process exit code 2.
    #[error("fatal create error: {0}")]
    FatalCreate(String),

    /// The service reported a fatal error while deleting a resource.
    /// Maps to process exit code 3.
    #[error("fatal delete error: {0}")]
    FatalDelete(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a driver error
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a fatal-create error
    pub fn fatal_create(msg: impl Into<String>) -> Self {
        Self::FatalCreate(msg.into())
    }

    /// Create a fatal-delete error
    pub fn fatal_delete(msg: impl Into<String>) -> Self {
        Self::FatalDelete(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True for errors that must abort the whole process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalCreate(_) | Self::FatalDelete(_))
    }

    /// Process exit code for this error
    ///
    /// Fatal create failures exit 2, fatal delete failures exit 3,
    /// everything else is an unclassified error and exits 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::FatalCreate(_) => 2,
            Self::FatalDelete(_) => 3,
            _ => 1,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
