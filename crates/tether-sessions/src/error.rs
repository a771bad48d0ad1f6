use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested session does not exist (never issued, or evicted).
    #[error("Session not found: {id}")]
    NotFound { id: String },

    /// Required credentials or environment are missing, or the agent for the
    /// new session could not be built. Never retried automatically.
    #[error("{0}")]
    Configuration(String),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NotFound { .. } => "SESSION_NOT_FOUND",
            SessionError::Configuration(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
