use serde::{Deserialize, Serialize};

/// Errors returned by every arena operation.
///
/// The first four variants are caller-facing outcomes; `Internal` covers
/// persistence and collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ArenaError {
    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ArenaError::NotFound(_) => "NOT_FOUND",
            ArenaError::AlreadyExists(_) => "ALREADY_EXISTS",
            ArenaError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ArenaError::FailedPrecondition(_) => "FAILED_PRECONDITION",
            ArenaError::Internal(_) => "INTERNAL",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ArenaError::NotFound(m)
            | ArenaError::AlreadyExists(m)
            | ArenaError::InvalidArgument(m)
            | ArenaError::FailedPrecondition(m)
            | ArenaError::Internal(m) => m,
        }
    }

    pub fn session_not_found(id: i64) -> Self {
        ArenaError::NotFound(format!("session {} not found", id))
    }
}

/// Error body returned by the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&ArenaError> for ErrorBody {
    fn from(err: &ArenaError) -> Self {
        ErrorBody {
            code: err.code().to_string(),
            message: err.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = ArenaError::session_not_found(42);
        assert_eq!(err.to_string(), "not found: session 42 not found");
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn error_body_carries_code() {
        let err = ArenaError::FailedPrecondition("session 3 is already finished".into());
        let body = ErrorBody::from(&err);
        assert_eq!(body.code, "FAILED_PRECONDITION");
        assert_eq!(body.message, "session 3 is already finished");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ArenaError>();
    }
}
