//! Error types shared by the manager components
//!
//! Every failure carries an [`ErrorKind`] so callers (HTTP handlers, the CLI)
//! can decide presentation by matching on the kind alone.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The container engine or cluster could not be reached
    Connection,
    /// The requested object does not exist
    NotFound,
    /// The request cannot be satisfied with the supplied input
    Validation,
    /// The object changed underneath the request
    Conflict,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of rollback target selection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevisionError {
    #[error("no revision history available")]
    NoHistoryAvailable,
    #[error("revision {0} not found")]
    RevisionNotFound(u64),
    #[error("no previous revision to roll back to")]
    NoPreviousRevision,
}

impl RevisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RevisionError::NoHistoryAvailable | RevisionError::RevisionNotFound(_) => {
                ErrorKind::NotFound
            }
            RevisionError::NoPreviousRevision => ErrorKind::Validation,
        }
    }
}

/// Error returned by the platform-facing operations
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ManagerError {
    kind: ErrorKind,
    message: String,
}

impl ManagerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<RevisionError> for ManagerError {
    fn from(err: RevisionError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<kube::Error> for ManagerError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(response) => {
                let kind = match response.code {
                    404 => ErrorKind::NotFound,
                    409 => ErrorKind::Conflict,
                    400 | 422 => ErrorKind::Validation,
                    _ => ErrorKind::Connection,
                };
                Self::new(kind, response.message.clone())
            }
            _ => Self::connection(err.to_string()),
        }
    }
}

impl From<bollard::errors::Error> for ManagerError {
    fn from(err: bollard::errors::Error) -> Self {
        match &err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => Self::not_found(message.clone()),
            _ => Self::connection(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_error_kinds() {
        assert_eq!(RevisionError::NoHistoryAvailable.kind(), ErrorKind::NotFound);
        assert_eq!(RevisionError::RevisionNotFound(5).kind(), ErrorKind::NotFound);
        assert_eq!(RevisionError::NoPreviousRevision.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_revision_error_converts_with_message() {
        let err: ManagerError = RevisionError::RevisionNotFound(5).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "revision 5 not found");
    }

    #[test]
    fn test_kube_api_error_mapping() {
        let api_error = |code: u16| {
            kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("status {}", code),
                reason: String::new(),
                code,
            })
        };

        assert_eq!(ManagerError::from(api_error(404)).kind(), ErrorKind::NotFound);
        assert_eq!(ManagerError::from(api_error(409)).kind(), ErrorKind::Conflict);
        assert_eq!(ManagerError::from(api_error(422)).kind(), ErrorKind::Validation);
        assert_eq!(ManagerError::from(api_error(500)).kind(), ErrorKind::Connection);
    }

    #[test]
    fn test_docker_not_found_mapping() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container: web".to_string(),
        };
        let err = ManagerError::from(err);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "No such container: web");
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
        assert_eq!(ErrorKind::Connection.to_string(), "connection");
    }
}
