use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Failed to reach the completion API: {0}")]
    Connection(String),

    #[error("Completion API returned status {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Stream interrupted before completion: {0}")]
    StreamInterrupted(String),

    #[error("Generation was cancelled")]
    Cancelled,

    #[error("A generation is already in progress for this session")]
    GenerationActive,

    #[error("This session has already finished; start a new session")]
    SessionFinished,

    #[error("Invalid trip request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to save trip history: {0}")]
    Store(String),

    #[error("Failed to look up trip context: {0}")]
    Fact(String),
}

impl PlannerError {
    /// HTTP status of a server refusal, if any.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether retrying the same request in a new session may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::StreamInterrupted(_) => true,
            Self::Server { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for PlannerError {
    fn from(error: reqwest::Error) -> Self {
        PlannerError::Connection(error.to_string())
    }
}

impl From<serde_json::Error> for PlannerError {
    fn from(error: serde_json::Error) -> Self {
        PlannerError::Store(format!("serialization failed: {error}"))
    }
}

impl From<std::io::Error> for PlannerError {
    fn from(error: std::io::Error) -> Self {
        PlannerError::Store(error.to_string())
    }
}
