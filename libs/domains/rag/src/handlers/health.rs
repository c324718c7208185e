use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_helpers::{AppError, ErrorResponse};
use grpc_client::{ServingStatus, check_health};
use serde::{Deserialize, Serialize};
use tonic::transport::Channel;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `SERVING`, `NOT_SERVING` or `UNKNOWN`
    pub status: String,
}

/// Report whether the gRPC endpoint is serving
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses(
        (status = 200, description = "Backend is serving", body = HealthResponse),
        (status = 503, description = "Backend is not serving", body = ErrorResponse)
    )
)]
pub async fn healthz(State(channel): State<Channel>) -> Response {
    match check_health(channel, "").await {
        Ok(ServingStatus::Serving) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: ServingStatus::Serving.as_str_name().to_string(),
            }),
        )
            .into_response(),
        Ok(status) => AppError::ServiceUnavailable(format!(
            "gRPC health status: {}",
            status.as_str_name()
        ))
        .into_response(),
        Err(e) => AppError::ServiceUnavailable(e.to_string()).into_response(),
    }
}
