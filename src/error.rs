//! Error types for the style imitator

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Transcript parse error: {0}")]
    Parse(String),

    #[error("Insufficient data for {target}: {found}/{required} messages")]
    InsufficientData {
        target: String,
        found: usize,
        required: usize,
    },

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Inconsistent imitation state: {0}")]
    StateInconsistency(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Failures of the remote model, including timeouts.
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, Error::Generation(_) | Error::GenerationTimeout(_))
    }
}

impl From<mysql_async::Error> for Error {
    fn from(err: mysql_async::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
