//! Type-safe error codes for API responses.
//!
//! Each code has a string form for clients, an integer form for logs and
//! monitoring, and a default message.
//!
//! ```rust
//! use axum_helpers::errors::ErrorCode;
//!
//! let code = ErrorCode::ValidationError;
//! assert_eq!(code.as_str(), "VALIDATION_ERROR");
//! assert_eq!(code.code(), 1001);
//! ```

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (1000-1999)
    /// Request validation failed
    ValidationError,
    /// JSON extraction from request body failed
    JsonExtraction,
    /// Requested resource was not found
    NotFound,
    /// The client went away or the request was canceled
    Canceled,

    // Server errors (2000-2999)
    /// An unexpected internal server error occurred
    InternalError,
    /// An upstream dependency failed
    UpstreamError,
    /// Service is not configured or not ready to serve
    ServiceUnavailable,
    /// Upstream did not answer in time
    GatewayTimeout,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::JsonExtraction => "JSON_EXTRACTION",
            Self::NotFound => "NOT_FOUND",
            Self::Canceled => "CANCELED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::GatewayTimeout => "GATEWAY_TIMEOUT",
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::ValidationError => 1001,
            Self::JsonExtraction => 1003,
            Self::NotFound => 1004,
            Self::Canceled => 1010,
            Self::InternalError => 2001,
            Self::UpstreamError => 2002,
            Self::ServiceUnavailable => 2003,
            Self::GatewayTimeout => 2004,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ValidationError => "Request validation failed",
            Self::JsonExtraction => "Invalid JSON request body",
            Self::NotFound => "The requested resource was not found",
            Self::Canceled => "The request was canceled",
            Self::InternalError => "An internal server error occurred",
            Self::UpstreamError => "An upstream service failed",
            Self::ServiceUnavailable => "Service temporarily unavailable",
            Self::GatewayTimeout => "Upstream service timed out",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
