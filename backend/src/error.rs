//! Error taxonomy of the validation engine.
//!
//! Client errors (bad input, unknown entities) and server errors (failing
//! validators or stores) are distinguished so the transport layer can map
//! them onto status codes without inspecting messages.

use uuid::Uuid;

use crate::db::repository::RepositoryError;
use crate::models::{PolygonUuid, SiteUuid, ValidationType};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The requested check has no criteria id or no validator.
    #[error("Unknown validation type: {0}")]
    UnknownValidationType(String),

    #[error("Polygon not found: {0}")]
    PolygonNotFound(PolygonUuid),

    #[error("Site not found: {0}")]
    SiteNotFound(SiteUuid),

    #[error("Invalid page size {0}: must be between 1 and {max}", max = crate::services::MAX_PAGE_SIZE)]
    InvalidPageSize(i64),

    #[error("Invalid page number {0}: must be at least 1")]
    InvalidPageNumber(i64),

    /// A validator could not reach or read its underlying data.
    #[error("Validator {validation_type} failed: {message}")]
    ValidatorExecutionFailure {
        validation_type: ValidationType,
        message: String,
    },

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// The job queue is closed and no longer accepts work.
    #[error("Job queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub fn unknown_type(validation_type: impl ToString) -> Self {
        Self::UnknownValidationType(validation_type.to_string())
    }

    /// Wrap a store failure raised while `validation_type` was running.
    pub fn validator_failure(validation_type: ValidationType, err: impl ToString) -> Self {
        Self::ValidatorExecutionFailure {
            validation_type,
            message: err.to_string(),
        }
    }

    /// Whether the caller caused the error.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// HTTP-equivalent status code, also stored on failed job records.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownValidationType(_)
            | Self::InvalidPageSize(_)
            | Self::InvalidPageNumber(_) => 400,
            Self::PolygonNotFound(_) | Self::SiteNotFound(_) | Self::JobNotFound(_) => 404,
            Self::ValidatorExecutionFailure { .. } => 500,
            Self::Repository(e) if e.is_not_found() => 404,
            Self::QueueUnavailable(_) => 503,
            Self::Repository(RepositoryError::ConnectionError { .. })
            | Self::Repository(RepositoryError::TimeoutError { .. }) => 503,
            Self::Repository(_) => 500,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownValidationType(_) => "UNKNOWN_VALIDATION_TYPE",
            Self::PolygonNotFound(_) => "POLYGON_NOT_FOUND",
            Self::SiteNotFound(_) => "SITE_NOT_FOUND",
            Self::InvalidPageSize(_) => "INVALID_PAGE_SIZE",
            Self::InvalidPageNumber(_) => "INVALID_PAGE_NUMBER",
            Self::ValidatorExecutionFailure { .. } => "VALIDATOR_EXECUTION_FAILURE",
            Self::JobNotFound(_) => "JOB_NOT_FOUND",
            Self::QueueUnavailable(_) => "QUEUE_UNAVAILABLE",
            Self::Repository(_) => "REPOSITORY_ERROR",
        }
    }
}
