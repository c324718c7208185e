use std::convert::Infallible;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::sse::{Event, KeepAlive, Sse},
};
use axum_helpers::{AppError, ErrorResponse};
use futures::Stream;
use rpc::rag::{QueryRequest, QueryStreamRequest, QueryStreamResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use super::GatewayState;
use crate::conversions::stop_reason_from_proto;
use crate::models::{QueryInput, QueryResult, StopReason};

/// Gateway handlers answer with the generic HTTP error body.
pub type GatewayResult<T> = Result<T, AppError>;

// ===== HTTP Request/Response Types =====

/// One server-sent event of a streaming query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryStreamEvent {
    pub content: String,
    pub created_at_ms: i64,
    pub stop_reason: StopReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<QueryStreamResponse> for QueryStreamEvent {
    fn from(proto: QueryStreamResponse) -> Self {
        Self {
            content: proto.content,
            created_at_ms: proto.created_at_ms,
            stop_reason: stop_reason_from_proto(proto.stop_reason),
            error: Some(proto.error).filter(|e| !e.is_empty()),
        }
    }
}

impl QueryStreamEvent {
    /// Terminal event for a stream that broke below the pipeline.
    fn transport_error(status: tonic::Status) -> Self {
        Self {
            content: String::new(),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
            stop_reason: StopReason::Error,
            error: Some(status.message().to_string()),
        }
    }

    fn is_terminal(&self) -> bool {
        self.stop_reason != StopReason::Unspecified
    }

    fn to_sse(&self) -> Event {
        Event::default()
            .json_data(self)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
    }
}

// ===== Handler Functions =====

/// Answer a question and return the full text
#[utoipa::path(
    post,
    path = "/v1/query",
    tag = "rag",
    request_body = QueryInput,
    responses(
        (status = 200, description = "Generated answer", body = QueryResult),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 499, description = "Client went away", body = ErrorResponse),
        (status = 502, description = "A collaborator failed", body = ErrorResponse)
    )
)]
pub async fn query(
    State(mut state): State<GatewayState>,
    payload: Result<Json<QueryInput>, JsonRejection>,
) -> GatewayResult<Json<QueryResult>> {
    let Json(input) = payload?;

    let response = state.client.query(QueryRequest::from(input)).await?;

    Ok(Json(response.into_inner().into()))
}

/// Answer a question as a stream of server-sent events.
///
/// Each event carries one JSON [`QueryStreamEvent`]; the last one has a
/// `done` or `error` stop reason. Failures after the stream started arrive
/// in-band rather than as an HTTP status.
#[utoipa::path(
    post,
    path = "/v1/query/stream",
    tag = "rag",
    request_body = QueryInput,
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream", body = QueryStreamEvent),
        (status = 400, description = "Malformed body", body = ErrorResponse)
    )
)]
pub async fn query_stream(
    State(mut state): State<GatewayState>,
    payload: Result<Json<QueryInput>, JsonRejection>,
) -> GatewayResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let Json(input) = payload?;

    let mut upstream = state
        .client
        .query_stream(QueryStreamRequest::from(input))
        .await?
        .into_inner();

    // Dropping this stream (client disconnect) drops `upstream`, which
    // cancels the RPC and with it the generation.
    let events = async_stream::stream! {
        loop {
            let event = match upstream.message().await {
                Ok(Some(message)) => QueryStreamEvent::from(message),
                Ok(None) => break,
                Err(status) => {
                    debug!(code = ?status.code(), "Upstream stream failed");
                    QueryStreamEvent::transport_error(status)
                }
            };

            let terminal = event.is_terminal();
            yield Ok::<_, Infallible>(event.to_sse());
            if terminal {
                break;
            }
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
