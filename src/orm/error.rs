//! Error types shared by the query builder, record helpers and backends

use std::fmt;
use thiserror::Error;

/// Failure raised by a storage adapter.
///
/// The builder and the record helpers hand these back unchanged; nothing in
/// the core retries or recovers from them.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Record not found on write: {0}")]
    NotFoundOnWrite(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    Query(String),
}

/// Discriminant of a [`BackendError`], for logging and matching without the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    Connection,
    Constraint,
    NotFoundOnWrite,
    Unavailable,
    Query,
}

impl BackendErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendErrorKind::Connection => "connection",
            BackendErrorKind::Constraint => "constraint",
            BackendErrorKind::NotFoundOnWrite => "not_found_on_write",
            BackendErrorKind::Unavailable => "unavailable",
            BackendErrorKind::Query => "query",
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl BackendError {
    pub fn kind(&self) -> BackendErrorKind {
        match self {
            BackendError::Connection(_) => BackendErrorKind::Connection,
            BackendError::Constraint(_) => BackendErrorKind::Constraint,
            BackendError::NotFoundOnWrite(_) => BackendErrorKind::NotFoundOnWrite,
            BackendError::Unavailable(_) => BackendErrorKind::Unavailable,
            BackendError::Query(_) => BackendErrorKind::Query,
        }
    }

    pub(crate) fn not_connected(backend: &str) -> Self {
        BackendError::Connection(format!("{} backend is not connected", backend))
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::ConstraintViolation => BackendError::Constraint(err.to_string()),
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    BackendError::Unavailable(err.to_string())
                }
                ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::PermissionDenied => {
                    BackendError::Connection(err.to_string())
                }
                _ => BackendError::Query(err.to_string()),
            },
            _ => BackendError::Query(err.to_string()),
        }
    }
}

impl From<r2d2::Error> for BackendError {
    fn from(err: r2d2::Error) -> Self {
        BackendError::Connection(err.to_string())
    }
}

/// Top-level error for every fallible operation in the crate
#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl OrmError {
    /// The backend error kind, if this error came from a storage adapter
    pub fn backend_kind(&self) -> Option<BackendErrorKind> {
        match self {
            OrmError::Backend(err) => Some(err.kind()),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for OrmError {
    fn from(err: rusqlite::Error) -> Self {
        OrmError::Backend(err.into())
    }
}

impl From<r2d2::Error> for OrmError {
    fn from(err: r2d2::Error) -> Self {
        OrmError::Backend(err.into())
    }
}

pub type OrmResult<T> = std::result::Result<T, OrmError>;
