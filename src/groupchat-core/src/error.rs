//! Error types for the group chat system.

use thiserror::Error;

/// Errors that abort a discussion before it starts, or a surface request.
#[derive(Error, Debug)]
pub enum GroupChatError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Session error: {0}")]
    SessionError(String),
}

/// A single failed completion call.
///
/// Never fatal to a discussion: the orchestrator records it inline as a
/// failure turn and moves on to the next speaker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable description embedded into failure turns.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<async_openai::error::OpenAIError> for BackendError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}
