use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// A remote command was rejected or could not be completed.
///
/// This is the only failure kind the session layer takes from the backend; the
/// carried `ApiError` is surfaced to callers but never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote command `{command}` failed: {error}")]
pub struct RemoteCommandError {
    pub command: &'static str,
    #[source]
    pub error: ApiError,
}

impl RemoteCommandError {
    pub fn new(command: &'static str, error: ApiError) -> Self {
        Self { command, error }
    }

    pub fn code(&self) -> ErrorCode {
        self.error.code
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Remote(#[from] RemoteCommandError),
    #[error("cannot {operation}: no database is open")]
    NotOpen { operation: &'static str },
    #[error("cannot {operation}: another session operation is still in flight")]
    Busy { operation: &'static str },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SessionError {
    pub fn remote_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Remote(err) => Some(err.code()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.remote_code() == Some(ErrorCode::NotFound)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
