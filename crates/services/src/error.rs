//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuestionError, QuizConfigError, SessionError};
use storage::repository::StorageError;

/// Errors emitted by `CountdownTimer`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimerError {
    #[error("timer already started")]
    AlreadyStarted,
    #[error("timer has been stopped")]
    Stopped,
    #[error("timer needs a running tokio runtime")]
    NoRuntime,
}

/// Errors emitted by `HttpBackend`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("backend request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    InvalidQuestion(#[from] QuestionError),
}

impl From<BackendError> for StorageError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::InvalidQuestion(inner) => StorageError::Serialization(inner.to_string()),
            other => StorageError::Connection(other.to_string()),
        }
    }
}

/// Errors emitted by `QuizEngine`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to fetch questions: {0}")]
    Fetch(#[source] StorageError),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error("session state lock poisoned")]
    Poisoned,
}

impl QuizError {
    /// True when configuration failed for lack of a course.
    #[must_use]
    pub fn is_missing_course(&self) -> bool {
        matches!(
            self,
            QuizError::Session(SessionError::Config(QuizConfigError::MissingCourse))
        )
    }
}
