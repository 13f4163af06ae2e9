//! Error types for hirehiker-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Problem not found: {0}")]
    ProblemNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Analysis not found for session: {0}")]
    AnalysisNotFound(String),

    #[error("Invalid state transition: {0} -> {1}")]
    InvalidStateTransition(String, String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error means the requested entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ProblemNotFound(_) | Error::SessionNotFound(_) | Error::AnalysisNotFound(_)
        )
    }
}

impl From<chrono::ParseError> for Error {
    fn from(err: chrono::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
