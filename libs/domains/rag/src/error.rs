use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use core_lifecycle::CancelCause;
use thiserror::Error;

/// Failure of a query, tagged with the stage that produced it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RagError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Canceled(#[from] CancelCause),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Reranker error: {0}")]
    Reranker(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type RagResult<T> = Result<T, RagError>;

impl RagError {
    /// Canceled by the caller rather than failed; not worth an error log.
    pub fn is_canceled(&self) -> bool {
        matches!(self, RagError::Canceled(_))
    }
}

impl From<validator::ValidationErrors> for RagError {
    fn from(err: validator::ValidationErrors) -> Self {
        RagError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Internal(format!("JSON error: {}", err))
    }
}

impl From<core_config::ConfigError> for RagError {
    fn from(err: core_config::ConfigError) -> Self {
        RagError::Config(err.to_string())
    }
}

impl From<RagError> for tonic::Status {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Validation(msg) => tonic::Status::invalid_argument(msg),
            RagError::Canceled(cause) => match cause {
                CancelCause::Canceled => tonic::Status::cancelled(cause.to_string()),
                CancelCause::DeadlineExceeded => tonic::Status::deadline_exceeded(cause.to_string()),
            },
            RagError::Config(msg) => {
                tonic::Status::failed_precondition(format!("Config error: {}", msg))
            }
            other => tonic::Status::internal(other.to_string()),
        }
    }
}

/// Convert RagError to AppError for standardized HTTP error responses
impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Validation(msg) => AppError::BadRequest(msg),
            RagError::Canceled(CancelCause::Canceled) => {
                AppError::Canceled(CancelCause::Canceled.to_string())
            }
            RagError::Canceled(cause) => AppError::GatewayTimeout(cause.to_string()),
            RagError::Config(msg) => AppError::ServiceUnavailable(format!("Config error: {}", msg)),
            other @ (RagError::Embedding(_)
            | RagError::VectorStore(_)
            | RagError::Reranker(_)
            | RagError::Completion(_)) => AppError::BadGateway(other.to_string()),
            RagError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for RagError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
